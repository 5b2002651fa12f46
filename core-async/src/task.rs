//! Task spawning and execution abstractions.
//!
//! Thin wrappers over `tokio::task`. `spawn` is used for the cancellation
//! watchers and engine tasks, `spawn_blocking` for host callbacks that may
//! block the calling thread.

pub use tokio::task::{spawn_blocking, yield_now, JoinError, JoinHandle};

/// Spawns a new asynchronous task on the current runtime.
///
/// # Panics
///
/// Panics when called outside of a runtime context, like `tokio::spawn`.
///
/// # Examples
///
/// ```rust
/// use core_async::task::spawn;
///
/// # async fn example() {
/// let handle = spawn(async { 42 });
/// assert_eq!(handle.await.unwrap(), 42);
/// # }
/// ```
pub fn spawn<F>(future: F) -> JoinHandle<F::Output>
where
    F: std::future::Future + Send + 'static,
    F::Output: Send + 'static,
{
    tokio::task::spawn(future)
}

/// Result type for task operations.
pub type Result<T> = std::result::Result<T, JoinError>;
