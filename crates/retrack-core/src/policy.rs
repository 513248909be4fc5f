//! Retry policy: the active rule set consulted by every decision.
//!
//! A policy is mutated only through [`RetryPolicy::apply`], which merges a
//! caller-supplied [`PolicyOverrides`] field by field. Invalid fields are
//! dropped, leaving the prior value in place; misconfiguration degrades to
//! defaults instead of failing request flow.

use http::Method;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::failure::Failure;

/// Methods with no side effects, safe to retry unconditionally.
pub const SAFE_METHODS: [Method; 3] = [Method::GET, Method::HEAD, Method::OPTIONS];

/// Safe methods plus the methods whose repeated execution has the same
/// effect as a single execution.
pub const IDEMPOTENT_METHODS: [Method; 5] = [
    Method::GET,
    Method::HEAD,
    Method::OPTIONS,
    Method::PUT,
    Method::DELETE,
];

/// One entry in the retryable-status table: a single code or an inclusive
/// range. Deserializes from a bare number or a two-element array, so a config
/// file can carry `[[100, 199], 429, [500, 599]]` verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StatusRange {
    Single(u16),
    Range(u16, u16),
}

impl StatusRange {
    /// Whether `status` falls on this entry. Range bounds may be given in
    /// either order.
    pub fn contains(&self, status: u16) -> bool {
        match *self {
            StatusRange::Single(code) => status == code,
            StatusRange::Range(a, b) => status >= a.min(b) && status <= a.max(b),
        }
    }
}

/// Host-supplied retry predicate over a failure record.
pub type RetryPredicate = Arc<dyn Fn(&Failure) -> bool + Send + Sync>;

/// Lifecycle hook invoked around a scheduled retry.
pub type RetryHook = Arc<dyn Fn(&Failure) + Send + Sync>;

/// The resolved, always-valid policy. One per [`crate::Tracker`] instance.
#[derive(Clone)]
pub struct RetryPolicy {
    /// Maximum number of additional attempts per logical request.
    pub max_retries: u32,
    /// Fixed delay applied before every resubmission (no backoff).
    pub retry_delay: Duration,
    /// Configured method table. Stored and validated, but the predicates use
    /// the fixed safe/idempotent sets; see `classify`.
    pub retryable_methods: Vec<Method>,
    /// Status codes considered retryable by the range check.
    pub retryable_status_ranges: Vec<StatusRange>,
    /// Custom retry predicate; `None` means the default composite.
    pub should_retry: Option<RetryPredicate>,
    /// Advisory cap for custom predicates. Reserved: stored but not enforced.
    pub should_retry_limit: Option<u32>,
    /// Invoked when a retry is scheduled (entering the delay).
    pub on_will_retry: Option<RetryHook>,
    /// Invoked when the delayed resubmission begins.
    pub on_start_retry: Option<RetryHook>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay: Duration::ZERO,
            retryable_methods: IDEMPOTENT_METHODS.to_vec(),
            retryable_status_ranges: default_status_ranges(),
            should_retry: None,
            should_retry_limit: None,
            on_will_retry: None,
            on_start_retry: None,
        }
    }
}

impl std::fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_retries", &self.max_retries)
            .field("retry_delay", &self.retry_delay)
            .field("retryable_methods", &self.retryable_methods)
            .field("retryable_status_ranges", &self.retryable_status_ranges)
            .field("should_retry", &self.should_retry.is_some())
            .field("should_retry_limit", &self.should_retry_limit)
            .field("on_will_retry", &self.on_will_retry.is_some())
            .field("on_start_retry", &self.on_start_retry.is_some())
            .finish()
    }
}

/// Default retryable-status table: informational, throttling, server errors.
pub fn default_status_ranges() -> Vec<StatusRange> {
    vec![
        StatusRange::Range(100, 199),
        StatusRange::Single(429),
        StatusRange::Range(500, 599),
    ]
}

impl RetryPolicy {
    /// Merge caller-supplied overrides onto this policy, validating each
    /// field independently. Invalid fields are dropped (a debug event, not
    /// an error) and the prior value kept.
    pub fn apply(&mut self, overrides: PolicyOverrides) {
        if let Some(n) = overrides.max_retries {
            self.max_retries = n;
        }
        match overrides.retry_delay_ms {
            Some(ms) if ms > 0 => self.retry_delay = Duration::from_millis(ms),
            Some(_) => tracing::debug!("dropping non-positive retry_delay_ms override"),
            None => {}
        }
        if let Some(methods) = overrides.retryable_methods {
            match parse_methods(&methods) {
                Some(parsed) => self.retryable_methods = parsed,
                None => tracing::debug!("dropping retryable_methods override with invalid method"),
            }
        }
        if let Some(ranges) = overrides.retryable_status_ranges {
            self.retryable_status_ranges = ranges;
        }
        match overrides.should_retry_limit {
            Some(n) if n > 0 => self.should_retry_limit = Some(n),
            Some(_) => tracing::debug!("dropping zero should_retry_limit override"),
            None => {}
        }
        if let Some(predicate) = overrides.should_retry {
            self.should_retry = Some(predicate);
        }
        if let Some(hook) = overrides.on_will_retry {
            self.on_will_retry = Some(hook);
        }
        if let Some(hook) = overrides.on_start_retry {
            self.on_start_retry = Some(hook);
        }
    }
}

fn parse_methods(methods: &[String]) -> Option<Vec<Method>> {
    methods
        .iter()
        .map(|m| Method::from_str(&m.to_ascii_uppercase()).ok())
        .collect()
}

/// Caller-supplied partial policy. Every field is optional; whatever is
/// absent or invalid keeps its current value when applied.
///
/// The plain-data fields deserialize from host config files (e.g. a
/// `[retry]` TOML table); the callback fields can only be set from code.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyOverrides {
    pub max_retries: Option<u32>,
    /// Strictly positive; zero cannot unset a previously configured delay.
    pub retry_delay_ms: Option<u64>,
    pub retryable_methods: Option<Vec<String>>,
    pub retryable_status_ranges: Option<Vec<StatusRange>>,
    /// Strictly positive.
    pub should_retry_limit: Option<u32>,
    #[serde(skip)]
    pub should_retry: Option<RetryPredicate>,
    #[serde(skip)]
    pub on_will_retry: Option<RetryHook>,
    #[serde(skip)]
    pub on_start_retry: Option<RetryHook>,
}

impl std::fmt::Debug for PolicyOverrides {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyOverrides")
            .field("max_retries", &self.max_retries)
            .field("retry_delay_ms", &self.retry_delay_ms)
            .field("retryable_methods", &self.retryable_methods)
            .field("retryable_status_ranges", &self.retryable_status_ranges)
            .field("should_retry_limit", &self.should_retry_limit)
            .field("should_retry", &self.should_retry.is_some())
            .field("on_will_retry", &self.on_will_retry.is_some())
            .field("on_start_retry", &self.on_start_retry.is_some())
            .finish()
    }
}
