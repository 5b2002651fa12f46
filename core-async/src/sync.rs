//! Synchronization primitives.
//!
//! Async-aware primitives from `tokio::sync`. Short critical sections that
//! never cross an `.await` use `parking_lot` in the calling crates instead.
//!
//! # Examples
//!
//! ```rust
//! use core_async::sync::watch;
//!
//! # async fn example() {
//! let (tx, mut rx) = watch::channel(0u8);
//! tx.send_replace(1);
//! rx.changed().await.unwrap();
//! assert_eq!(*rx.borrow(), 1);
//! # }
//! ```

pub use tokio::sync::{
    broadcast, mpsc, oneshot, watch, Mutex, MutexGuard, Notify, RwLock, RwLockReadGuard,
    RwLockWriteGuard, Semaphore, SemaphorePermit,
};
