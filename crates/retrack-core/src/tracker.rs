//! In-flight request registry and the retry decision protocol.
//!
//! One `Tracker` per host client instance, shared across concurrent tasks
//! via `Arc`. Correlation lookup followed by mutation must be atomic, so the
//! registry sits behind a mutex and every operation takes it exactly once;
//! the policy sits behind its own read-mostly lock.

use std::sync::{Mutex, RwLock};
use std::time::{Duration, Instant};

use crate::classify::{self, Classification};
use crate::descriptor::{RequestDescriptor, TransportBinding};
use crate::failure::Failure;
use crate::policy::{PolicyOverrides, RetryPolicy};

/// One logical request: the original attempt plus its retries, matched
/// across attempts by the stamped correlation id (or structural equality on
/// the first attempt, before any stamp exists).
#[derive(Debug, Clone)]
pub struct TrackedRequest {
    /// Unique for the process lifetime, monotonically increasing.
    pub id: u64,
    /// Attempts so far beyond the first.
    pub retry_count: u32,
    pub last_attempt: Instant,
    /// Append-only history of admission times.
    pub attempts: Vec<Instant>,
    /// The stamped descriptor copy used for matching.
    pub descriptor: RequestDescriptor,
}

#[derive(Default)]
struct Registry {
    entries: Vec<TrackedRequest>,
    last_id: u64,
}

impl Registry {
    /// Id match wins; structural equality is the fallback for descriptors
    /// that were never stamped.
    fn find(&self, descriptor: &RequestDescriptor) -> Option<usize> {
        if let Some(id) = descriptor.correlation_id {
            if let Some(i) = self.entries.iter().position(|e| e.id == id) {
                return Some(i);
            }
        }
        self.entries
            .iter()
            .position(|e| e.descriptor.same_request(descriptor))
    }
}

/// The retry engine: policy store plus the registry of in-flight logical
/// requests. Construct one per host client; decisions read the policy,
/// admissions and removals mutate the registry.
pub struct Tracker {
    policy: RwLock<RetryPolicy>,
    registry: Mutex<Registry>,
}

impl Default for Tracker {
    fn default() -> Self {
        Self::new()
    }
}

impl Tracker {
    /// Tracker with the default policy.
    pub fn new() -> Self {
        Self {
            policy: RwLock::new(RetryPolicy::default()),
            registry: Mutex::new(Registry::default()),
        }
    }

    /// Tracker with `overrides` applied on top of the default policy.
    pub fn with_policy(overrides: PolicyOverrides) -> Self {
        let tracker = Self::new();
        tracker.configure(overrides);
        tracker
    }

    /// Merge a partial policy onto the active one. Invalid fields are
    /// dropped, never an error; subsequent decisions see the new values.
    pub fn configure(&self, overrides: PolicyOverrides) {
        self.policy.write().unwrap().apply(overrides);
    }

    /// Snapshot of the active policy.
    pub fn policy(&self) -> RetryPolicy {
        self.policy.read().unwrap().clone()
    }

    /// Admit one outgoing attempt. A request with no existing correlation is
    /// registered and the returned copy carries a fresh correlation id;
    /// re-admission of a known request bumps its retry count in place and
    /// restamps the tracked descriptor. Always succeeds.
    pub fn admit(&self, descriptor: &RequestDescriptor) -> RequestDescriptor {
        let mut registry = self.registry.lock().unwrap();
        let now = Instant::now();
        if let Some(i) = registry.find(descriptor) {
            let entry = &mut registry.entries[i];
            entry.retry_count += 1;
            entry.last_attempt = now;
            entry.attempts.push(now);
            entry.descriptor.retry_count = entry.retry_count;
            tracing::debug!(
                id = entry.id,
                retry_count = entry.retry_count,
                "re-admitted tracked request"
            );
            return entry.descriptor.clone();
        }
        registry.last_id += 1;
        let id = registry.last_id;
        let mut stamped = descriptor.clone();
        stamped.correlation_id = Some(id);
        stamped.retry_count = 0;
        registry.entries.push(TrackedRequest {
            id,
            retry_count: 0,
            last_attempt: now,
            attempts: vec![now],
            descriptor: stamped.clone(),
        });
        tracing::debug!(id, method = %stamped.method, url = %stamped.url, "tracking new request");
        stamped
    }

    /// Whether the failed request has budget left and the policy wants it
    /// retried. A failure with no descriptor, a zero budget, and a request
    /// the registry has already forgotten all short-circuit to false.
    pub fn should_retry(&self, failure: &Failure) -> bool {
        let Some(request) = &failure.request else {
            return false;
        };
        let (max_retries, predicate, ranges) = {
            let policy = self.policy.read().unwrap();
            (
                policy.max_retries,
                policy.should_retry.clone(),
                policy.retryable_status_ranges.clone(),
            )
        };
        if max_retries == 0 {
            return false;
        }
        let retry_count = {
            let registry = self.registry.lock().unwrap();
            match registry.find(request) {
                Some(i) => registry.entries[i].retry_count,
                None => return false,
            }
        };
        if retry_count >= max_retries {
            tracing::debug!(retry_count, max_retries, "retry budget exhausted");
            return false;
        }
        match predicate {
            Some(predicate) => predicate(failure),
            None => classify::default_should_retry(failure, &ranges),
        }
    }

    /// Classify a failure against the active status table.
    pub fn classify(&self, failure: &Failure) -> Classification {
        let ranges = self.policy.read().unwrap().retryable_status_ranges.clone();
        Classification::of(failure, &ranges)
    }

    /// The configured delay before resubmission, uniform per attempt.
    pub fn delay(&self) -> Duration {
        self.policy.read().unwrap().retry_delay
    }

    /// Strip a per-request transport binding that merely restates the host
    /// default, so the retried request re-resolves fresh transport state
    /// instead of staying pinned to whatever the failed attempt used.
    pub fn sanitize(&self, descriptor: &mut RequestDescriptor, host_default: &TransportBinding) {
        if descriptor.transport.as_ref() == Some(host_default) {
            descriptor.transport = None;
        }
    }

    /// Invoke the will-retry hook, if configured (a retry was scheduled and
    /// the delay is starting).
    pub fn notify_will_retry(&self, failure: &Failure) {
        let hook = self.policy.read().unwrap().on_will_retry.clone();
        if let Some(hook) = hook {
            hook(failure);
        }
    }

    /// Invoke the start-retry hook, if configured (the delay elapsed and the
    /// resubmission is about to go out).
    pub fn notify_start_retry(&self, failure: &Failure) {
        let hook = self.policy.read().unwrap().on_start_retry.clone();
        if let Some(hook) = hook {
            hook(failure);
        }
    }

    /// Remove the tracked request matched by correlation id; reports whether
    /// anything was removed. A descriptor the registry has already forgotten
    /// (or one that was never stamped) is treated as already resolved.
    pub fn remove(&self, descriptor: &RequestDescriptor) -> bool {
        let Some(id) = descriptor.correlation_id else {
            return false;
        };
        let mut registry = self.registry.lock().unwrap();
        match registry.entries.iter().position(|e| e.id == id) {
            Some(i) => {
                registry.entries.remove(i);
                tracing::debug!(id, "request resolved, dropped from registry");
                true
            }
            None => false,
        }
    }

    /// Tracked snapshot for a descriptor, if any.
    pub fn lookup(&self, descriptor: &RequestDescriptor) -> Option<TrackedRequest> {
        let registry = self.registry.lock().unwrap();
        registry.find(descriptor).map(|i| registry.entries[i].clone())
    }

    /// Number of in-flight logical requests.
    pub fn len(&self) -> usize {
        self.registry.lock().unwrap().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
