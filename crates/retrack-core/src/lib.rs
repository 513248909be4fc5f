//! Retry decision and tracking core.
//!
//! Correlates retries with their original request, classifies failures into
//! retryable categories, enforces a per-request retry budget, and hands the
//! host the delay to apply before resubmission. Transport-neutral: failures
//! come in as data ([`Failure`]), decisions go out as plain values, and the
//! host pipeline (e.g. a client middleware) does the actual resubmitting.

pub mod classify;
pub mod descriptor;
pub mod failure;
pub mod policy;
pub mod tracker;

pub use classify::Classification;
pub use descriptor::{RequestDescriptor, TransportBinding};
pub use failure::{ErrorCode, Failure, ResponseParts};
pub use policy::{PolicyOverrides, RetryPolicy, StatusRange};
pub use tracker::{TrackedRequest, Tracker};
