//! The interceptor adapter: admits outgoing requests with the tracker,
//! classifies failed outcomes, and resubmits after the configured delay.

use http::Extensions;
use reqwest::{Request, Response};
use reqwest_middleware::{Middleware, Next, Result};
use retrack_core::{PolicyOverrides, RequestDescriptor, Tracker, TransportBinding};
use std::sync::Arc;

use crate::convert;

/// Retry middleware for a [`reqwest_middleware`] client stack.
///
/// Owns (or shares) the [`Tracker`] that correlates attempts, decides
/// retries, and holds the in-flight registry. One tracker per host client
/// keeps policies independent across clients in the same process.
pub struct RetryMiddleware {
    tracker: Arc<Tracker>,
    transport_defaults: TransportBinding,
}

impl Default for RetryMiddleware {
    fn default() -> Self {
        Self::new()
    }
}

impl RetryMiddleware {
    /// Middleware with the default policy.
    pub fn new() -> Self {
        Self::with_tracker(Arc::new(Tracker::new()))
    }

    /// Middleware with `overrides` applied on top of the default policy.
    pub fn with_policy(overrides: PolicyOverrides) -> Self {
        Self::with_tracker(Arc::new(Tracker::with_policy(overrides)))
    }

    /// Share an externally owned tracker (e.g. one policy across several
    /// clients).
    pub fn with_tracker(tracker: Arc<Tracker>) -> Self {
        Self {
            tracker,
            transport_defaults: TransportBinding::default(),
        }
    }

    /// Declare the host transport's default binding; a retried request drops
    /// a per-request binding that merely restates it.
    pub fn transport_defaults(mut self, defaults: TransportBinding) -> Self {
        self.transport_defaults = defaults;
        self
    }

    /// The tracker driving this middleware.
    pub fn tracker(&self) -> &Arc<Tracker> {
        &self.tracker
    }
}

/// Releases the tracked entry if the request future is dropped mid-flight
/// (e.g. cancelled during the retry delay). Removal is idempotent, so the
/// terminal paths that already removed explicitly make this a no-op.
struct Deregister {
    tracker: Arc<Tracker>,
    descriptor: RequestDescriptor,
}

impl Drop for Deregister {
    fn drop(&mut self) {
        self.tracker.remove(&self.descriptor);
    }
}

#[async_trait::async_trait]
impl Middleware for RetryMiddleware {
    async fn handle(
        &self,
        req: Request,
        extensions: &mut Extensions,
        next: Next<'_>,
    ) -> Result<Response> {
        let mut descriptor = self.tracker.admit(&convert::descriptor_for(&req));
        let _guard = Deregister {
            tracker: Arc::clone(&self.tracker),
            descriptor: descriptor.clone(),
        };
        let mut request = req;
        loop {
            let replay = request.try_clone();
            let outcome = next.clone().run(request, extensions).await;
            let failure = match convert::failure_for(&outcome) {
                None => {
                    self.tracker.remove(&descriptor);
                    return outcome;
                }
                Some(failure) => failure.with_request(descriptor.clone()),
            };
            // Streaming bodies cannot be replayed; surface those as-is.
            let Some(replay_request) = replay else {
                self.tracker.remove(&descriptor);
                return outcome;
            };
            if !self.tracker.should_retry(&failure) {
                self.tracker.remove(&descriptor);
                return outcome;
            }
            let delay = self.tracker.delay();
            self.tracker
                .sanitize(&mut descriptor, &self.transport_defaults);
            self.tracker.notify_will_retry(&failure);
            tokio::time::sleep(delay).await;
            self.tracker.notify_start_retry(&failure);
            descriptor = self.tracker.admit(&descriptor);
            tracing::debug!(
                retry_count = descriptor.retry_count,
                method = %descriptor.method,
                url = %descriptor.url,
                "resubmitting request"
            );
            request = replay_request;
        }
    }
}
