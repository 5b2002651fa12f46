//! Structured cancellation.
//!
//! The engine owns a root [`CancellationToken`] per service. Every request
//! that leaves the core toward the host derives a child token from the scope
//! it was issued under, so cancelling the root tears down all outstanding
//! exchanges at once.

pub use tokio_util::sync::{CancellationToken, DropGuard, WaitForCancellationFuture};
