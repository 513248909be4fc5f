//! Retry middleware for [`reqwest`] built on [`reqwest_middleware`], driven
//! by the `retrack-core` tracking engine.
//!
//! The middleware admits every outgoing request with a
//! [`retrack_core::Tracker`], classifies failed outcomes, and, when the
//! policy grants a retry, resubmits after the configured delay. Successful
//! and terminally failed requests are dropped from the tracker's registry;
//! a request cancelled mid-delay is cleaned up as well.
//!
//! ```no_run
//! use reqwest_middleware::ClientBuilder;
//! use retrack_core::PolicyOverrides;
//! use retrack_reqwest::RetryMiddleware;
//!
//! # async fn run() {
//! let retry = RetryMiddleware::with_policy(PolicyOverrides {
//!     max_retries: Some(2),
//!     retry_delay_ms: Some(50),
//!     ..Default::default()
//! });
//! let client = ClientBuilder::new(reqwest::Client::new())
//!     .with(retry)
//!     .build();
//!
//! client.get("http://example.com").send().await.unwrap();
//! # }
//! ```

mod convert;
mod middleware;

pub use middleware::RetryMiddleware;
pub use retrack_core::{PolicyOverrides, StatusRange, Tracker, TransportBinding};
