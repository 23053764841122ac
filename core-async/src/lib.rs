//! Async abstraction layer for Music Platform Core.
//!
//! Downstream crates depend on this crate instead of reaching for Tokio
//! directly, which keeps the executor choice in one place and gives every
//! crate the same set of primitives.
//!
//! # Modules
//!
//! - `task`: Task spawning and background task handles
//! - `time`: Time-related operations (sleep, timeout, interval)
//! - `sync`: Synchronization primitives, including [`sync::BoundedMutex`],
//!   a mutex whose acquisition fails with [`sync::LockTimeout`] instead of
//!   waiting forever
//!
//! # Examples
//!
//! ```rust
//! use core_async::sync::BoundedMutex;
//! use core_async::time::Duration;
//!
//! # async fn example() -> Result<(), core_async::sync::LockTimeout> {
//! let counter = BoundedMutex::new("counter", 0u32);
//! {
//!     let mut guard = counter.lock_timeout(Duration::from_secs(1)).await?;
//!     *guard += 1;
//! } // released here, on every exit path
//! # Ok(())
//! # }
//! ```

pub mod sync;
pub mod task;
pub mod time;

// Re-export commonly used types at crate root for convenience
pub use sync::{BoundedMutex, LockTimeout};
pub use task::spawn;
pub use time::{sleep, Duration, Instant};
