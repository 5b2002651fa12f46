//! Time-related abstractions.
//!
//! # Examples
//!
//! ```rust
//! use core_async::time::{timeout, Duration};
//!
//! # async fn example() {
//! let result = timeout(Duration::from_millis(10), async { 7 }).await;
//! assert_eq!(result.unwrap(), 7);
//! # }
//! ```

pub use tokio::time::{error::Elapsed, interval, sleep, sleep_until, timeout, Interval, Sleep, Timeout};

pub use std::time::{Duration, Instant};
