//! Time-related abstractions.
//!
//! Thin re-exports of `tokio::time` so that pacing delays (strategy pauses,
//! preload spacing, janitor ticks) all run on the same timer and can be
//! driven deterministically with Tokio's paused clock in tests.
//!
//! # Examples
//!
//! ```rust
//! use core_async::time::{sleep, Duration, Instant};
//!
//! async fn example() {
//!     let start = Instant::now();
//!     sleep(Duration::from_millis(500)).await;
//!     println!("Took {:?}", start.elapsed());
//! }
//! ```

pub use std::time::Duration;
pub use tokio::time::{interval, interval_at, sleep, timeout, Instant, Interval, MissedTickBehavior};
