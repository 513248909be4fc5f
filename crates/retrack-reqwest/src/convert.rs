//! Conversions between reqwest types and the core's descriptors and failure
//! records.

use reqwest::Request;
use reqwest_middleware::Error;
use retrack_core::{ErrorCode, Failure, RequestDescriptor, ResponseParts};
use std::collections::BTreeMap;

/// Identity descriptor for an outgoing request. Query parameters are split
/// out of the URL so equality over them is key/value deep rather than
/// string-wise; header names are lowercased.
pub(crate) fn descriptor_for(request: &Request) -> RequestDescriptor {
    let mut url = request.url().clone();
    let params: BTreeMap<String, String> = url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    url.set_query(None);
    let headers: BTreeMap<String, String> = request
        .headers()
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_ascii_lowercase(), v.to_owned()))
        })
        .collect();
    let body = request
        .body()
        .and_then(|body| body.as_bytes())
        .map(|bytes| bytes.to_vec());
    RequestDescriptor {
        url,
        method: request.method().clone(),
        body,
        params,
        headers,
        transport: None,
        correlation_id: None,
        retry_count: 0,
    }
}

/// Failure record for a completed attempt, or `None` when the outcome is
/// terminal success. Statuses below 400 never enter the failure path.
pub(crate) fn failure_for(
    outcome: &reqwest_middleware::Result<reqwest::Response>,
) -> Option<Failure> {
    match outcome {
        Ok(response) if response.status().as_u16() < 400 => None,
        Ok(response) => Some(Failure {
            code: None,
            response: Some(ResponseParts {
                status: response.status(),
                headers: response.headers().clone(),
            }),
            request: None,
            message: format!("HTTP {}", response.status()),
        }),
        Err(error) => Some(failure_from_error(error)),
    }
}

fn failure_from_error(error: &Error) -> Failure {
    let code = match error {
        Error::Reqwest(e) => error_code(e),
        Error::Middleware(_) => None,
    };
    let message = match code {
        // Keep "timeout" in the text: the timeout predicate matches on it.
        Some(ErrorCode::Aborted) => format!("timeout exceeded: {error}"),
        _ => error.to_string(),
    };
    Failure {
        code,
        response: None,
        request: None,
        message,
    }
}

/// Map transport errors into the core's categories. reqwest exposes no finer
/// detail than these groups, so request-level errors that are neither a
/// deadline nor a connect failure land on connection-reset.
fn error_code(error: &reqwest::Error) -> Option<ErrorCode> {
    if error.is_timeout() {
        Some(ErrorCode::Aborted)
    } else if error.is_connect() {
        Some(ErrorCode::ConnectionRefused)
    } else if error.is_builder() || error.is_redirect() {
        None
    } else {
        Some(ErrorCode::ConnectionReset)
    }
}
