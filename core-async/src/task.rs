//! Task spawning and execution abstractions.
//!
//! Background work in the workspace (the cache janitor, preload batches) is
//! spawned through this module and always hands back a [`JoinHandle`], so
//! callers and tests can await completion instead of sleeping.
//!
//! # Examples
//!
//! ```rust
//! use core_async::task;
//!
//! async fn example() {
//!     let handle = task::spawn(async { 42 });
//!     let result = handle.await.unwrap();
//!     assert_eq!(result, 42);
//! }
//! ```

pub use tokio::task::{yield_now, JoinError, JoinHandle};

/// Spawns a new asynchronous task on the Tokio runtime.
///
/// The spawned task may run on a different thread, so the future must be
/// `Send + 'static`.
pub fn spawn<F>(future: F) -> JoinHandle<F::Output>
where
    F: std::future::Future + Send + 'static,
    F::Output: Send + 'static,
{
    tokio::spawn(future)
}
