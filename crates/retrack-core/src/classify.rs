//! Failure classification: independent boolean predicates over a failure
//! record.
//!
//! Each predicate is exposed on its own so a host-level custom retry
//! predicate can compose them; [`Classification::of`] evaluates the whole
//! set at once. The method-sensitive predicates use the fixed safe and
//! idempotent sets, not the configured method table.

use crate::failure::{ErrorCode, Failure};
use crate::policy::{StatusRange, IDEMPOTENT_METHODS, SAFE_METHODS};

/// No response came back, an error code is present, the code is not a
/// client-side abort, and the code is safe to retry. Cancelled requests
/// carry no code and therefore never qualify.
pub fn is_network_error(failure: &Failure) -> bool {
    failure.response.is_none()
        && failure
            .code
            .is_some_and(|code| code != ErrorCode::Aborted && code.retry_allowed())
}

/// Client-side abort whose error text mentions a timeout. An abort without
/// that text (e.g. user-initiated cancellation) does not qualify.
pub fn is_timeout(failure: &Failure) -> bool {
    failure.code == Some(ErrorCode::Aborted) && failure.message.contains("timeout")
}

/// No response and not a client-side abort; the bucket for connection-level
/// failures, deliberately excluding timeouts.
pub fn is_retryable_error(failure: &Failure) -> bool {
    failure.code != Some(ErrorCode::Aborted) && failure.response.is_none()
}

/// A response arrived with a 5xx status and the attempt was not aborted
/// client-side.
pub fn is_server_error(failure: &Failure) -> bool {
    failure.code != Some(ErrorCode::Aborted)
        && failure
            .response
            .as_ref()
            .is_some_and(|r| r.status.is_server_error())
}

/// Whether the failure's status falls inside the configured table. A missing
/// response counts as status 0, which always matches.
pub fn matches_retryable_status(failure: &Failure, ranges: &[StatusRange]) -> bool {
    let status = failure.status_code();
    if status == 0 {
        return true;
    }
    ranges.iter().any(|range| range.contains(status))
}

/// [`is_retryable_error`] on a request with a safe method (GET, HEAD,
/// OPTIONS).
pub fn is_safe_request_error(failure: &Failure) -> bool {
    match &failure.request {
        Some(request) => is_retryable_error(failure) && SAFE_METHODS.contains(&request.method),
        None => false,
    }
}

/// [`is_retryable_error`] on a request with an idempotent method (safe
/// methods plus PUT, DELETE).
pub fn is_idempotent_request_error(failure: &Failure) -> bool {
    match &failure.request {
        Some(request) => {
            is_retryable_error(failure) && IDEMPOTENT_METHODS.contains(&request.method)
        }
        None => false,
    }
}

/// The default retry predicate: network-level failures of safe requests
/// whose status matches the configured table, and never server errors.
///
/// 5xx statuses sit in the default range table yet are excluded here; a host
/// that wants server errors retried installs a custom predicate.
pub fn default_should_retry(failure: &Failure, ranges: &[StatusRange]) -> bool {
    is_network_error(failure)
        && is_safe_request_error(failure)
        && matches_retryable_status(failure, ranges)
        && !is_server_error(failure)
}

/// All classification verdicts for one failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub is_network_error: bool,
    pub is_timeout: bool,
    pub is_retryable_error: bool,
    pub is_server_error: bool,
    pub is_safe_request_error: bool,
    pub is_idempotent_request_error: bool,
    pub matches_retryable_status: bool,
}

impl Classification {
    pub fn of(failure: &Failure, ranges: &[StatusRange]) -> Self {
        Self {
            is_network_error: is_network_error(failure),
            is_timeout: is_timeout(failure),
            is_retryable_error: is_retryable_error(failure),
            is_server_error: is_server_error(failure),
            is_safe_request_error: is_safe_request_error(failure),
            is_idempotent_request_error: is_idempotent_request_error(failure),
            matches_retryable_status: matches_retryable_status(failure, ranges),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::RequestDescriptor;
    use crate::policy::default_status_ranges;
    use http::{Method, StatusCode};
    use url::Url;

    fn request(method: Method) -> RequestDescriptor {
        RequestDescriptor::new(method, Url::parse("http://example.com/a").unwrap())
    }

    fn connection_failure(method: Method) -> Failure {
        Failure::from_error(ErrorCode::ConnectionReset, "connection reset by peer")
            .with_request(request(method))
    }

    #[test]
    fn network_error_requires_a_code() {
        // Cancellation carries no code.
        let cancelled = Failure {
            code: None,
            response: None,
            request: None,
            message: "request cancelled".into(),
        };
        assert!(!is_network_error(&cancelled));
        assert!(is_network_error(&connection_failure(Method::GET)));
    }

    #[test]
    fn network_error_excludes_aborts_and_permanent_codes() {
        let aborted = Failure::from_error(ErrorCode::Aborted, "timeout of 3000ms exceeded");
        assert!(!is_network_error(&aborted));
        let dns = Failure::from_error(ErrorCode::HostNotFound, "host not found");
        assert!(!is_network_error(&dns));
    }

    #[test]
    fn timeout_requires_abort_code_and_timeout_text() {
        let timeout = Failure::from_error(ErrorCode::Aborted, "timeout of 3000ms exceeded");
        assert!(is_timeout(&timeout));
        // Abort without the text: a user hit cancel, not a deadline.
        let cancelled = Failure::from_error(ErrorCode::Aborted, "request aborted by caller");
        assert!(!is_timeout(&cancelled));
        let os_timeout = Failure::from_error(ErrorCode::TimedOut, "connect timeout");
        assert!(!is_timeout(&os_timeout));
    }

    #[test]
    fn retryable_error_excludes_timeouts_and_responses() {
        assert!(is_retryable_error(&connection_failure(Method::GET)));
        assert!(!is_retryable_error(&Failure::from_error(
            ErrorCode::Aborted,
            "timeout of 3000ms exceeded"
        )));
        assert!(!is_retryable_error(&Failure::from_status(
            StatusCode::SERVICE_UNAVAILABLE
        )));
    }

    #[test]
    fn server_error_needs_a_5xx_response() {
        assert!(is_server_error(&Failure::from_status(
            StatusCode::INTERNAL_SERVER_ERROR
        )));
        assert!(is_server_error(&Failure::from_status(
            StatusCode::SERVICE_UNAVAILABLE
        )));
        assert!(!is_server_error(&Failure::from_status(
            StatusCode::NOT_FOUND
        )));
        assert!(!is_server_error(&connection_failure(Method::GET)));
    }

    #[test]
    fn retryable_status_table_under_defaults() {
        let ranges = default_status_ranges();
        let by_status = |status: StatusCode| {
            matches_retryable_status(&Failure::from_status(status), &ranges)
        };
        assert!(by_status(StatusCode::SERVICE_UNAVAILABLE)); // 503
        assert!(by_status(StatusCode::TOO_MANY_REQUESTS)); // 429
        assert!(!by_status(StatusCode::NOT_FOUND)); // 404
        // No response at all: status 0 always matches.
        let no_response = Failure::from_error(ErrorCode::ConnectionReset, "reset");
        assert!(matches_retryable_status(&no_response, &ranges));
    }

    #[test]
    fn safe_and_idempotent_request_errors_by_method() {
        assert!(is_safe_request_error(&connection_failure(Method::GET)));
        assert!(!is_safe_request_error(&connection_failure(Method::PUT)));
        assert!(is_idempotent_request_error(&connection_failure(Method::PUT)));
        assert!(is_idempotent_request_error(&connection_failure(Method::DELETE)));
        assert!(!is_idempotent_request_error(&connection_failure(Method::POST)));
        // No descriptor at all: neither bucket.
        let anonymous = Failure::from_error(ErrorCode::ConnectionReset, "reset");
        assert!(!is_safe_request_error(&anonymous));
        assert!(!is_idempotent_request_error(&anonymous));
    }

    #[test]
    fn default_predicate_retries_safe_network_failures() {
        let ranges = default_status_ranges();
        assert!(default_should_retry(&connection_failure(Method::GET), &ranges));
        assert!(!default_should_retry(&connection_failure(Method::PUT), &ranges));
        assert!(!default_should_retry(&connection_failure(Method::POST), &ranges));
    }

    #[test]
    fn default_predicate_excludes_server_errors_despite_range_match() {
        let ranges = default_status_ranges();
        let failure =
            Failure::from_status(StatusCode::SERVICE_UNAVAILABLE).with_request(request(Method::GET));
        // 503 is in the default range table...
        assert!(matches_retryable_status(&failure, &ranges));
        // ...but the default policy still refuses it.
        assert!(!default_should_retry(&failure, &ranges));
    }

    #[test]
    fn classification_summarizes_all_predicates() {
        let ranges = default_status_ranges();
        let verdicts = Classification::of(&connection_failure(Method::GET), &ranges);
        assert!(verdicts.is_network_error);
        assert!(verdicts.is_retryable_error);
        assert!(verdicts.is_safe_request_error);
        assert!(verdicts.is_idempotent_request_error);
        assert!(verdicts.matches_retryable_status);
        assert!(!verdicts.is_timeout);
        assert!(!verdicts.is_server_error);
    }
}
