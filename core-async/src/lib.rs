//! Runtime abstraction layer for the tunnel bridge.
//!
//! Every other crate in the workspace goes through this crate instead of
//! naming Tokio directly. That keeps the executor choice in one place and
//! gives the bridge a single definition of the cancellation primitive that
//! crosses from the engine into host-bound requests.
//!
//! # Modules
//!
//! - `task`: Task spawning and execution
//! - `time`: Time-related operations (sleep, timeout, instant)
//! - `sync`: Synchronization primitives (Mutex, RwLock, channels)
//! - `runtime`: Runtime construction and `block_on`
//! - `cancel`: Structured cancellation scopes
//!
//! # Examples
//!
//! ```rust
//! use core_async::cancel::CancellationToken;
//! use core_async::task;
//!
//! async fn example() {
//!     let scope = CancellationToken::new();
//!     let child = scope.child_token();
//!
//!     let handle = task::spawn(async move {
//!         child.cancelled().await;
//!         "stopped"
//!     });
//!
//!     scope.cancel();
//!     assert_eq!(handle.await.unwrap(), "stopped");
//! }
//! ```

pub use core_async_macros::test;

pub mod cancel;
pub mod runtime;
pub mod sync;
pub mod task;
pub mod time;

pub use cancel::CancellationToken;
pub use task::spawn;
pub use time::{sleep, Duration, Instant};
