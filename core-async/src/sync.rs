//! Synchronization primitives.
//!
//! Re-exports the Tokio primitives used across the workspace and adds
//! [`BoundedMutex`], the lock that guards all shared cache/playback state.
//!
//! # Bounded waits
//!
//! A plain async mutex waits forever. A stuck holder (for example a slow
//! upstream call made while holding the lock) then silently stalls every other
//! caller. `BoundedMutex` converts that stall into an observable
//! [`LockTimeout`] error, which callers either surface or log and skip.
//!
//! ```rust
//! use core_async::sync::BoundedMutex;
//! use core_async::time::Duration;
//!
//! # async fn example() {
//! let state = BoundedMutex::new("state", vec![1, 2, 3]);
//!
//! let locked = state.lock_timeout(Duration::from_millis(250)).await;
//! match locked {
//!     Ok(guard) => println!("len = {}", guard.len()),
//!     Err(err) => eprintln!("{err}"),
//! }
//! # }
//! ```

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::time::Duration;
use tokio::time::Instant;

pub use tokio::sync::{mpsc, oneshot, watch, Mutex, MutexGuard, Notify, RwLock, Semaphore};
pub use tokio_util::sync::CancellationToken;

/// Default wait bound used by [`BoundedMutex::lock`].
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(30);

/// Error returned when a [`BoundedMutex`] could not be acquired in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockTimeout {
    /// Name of the lock, for diagnostics.
    pub name: &'static str,
    /// How long the caller actually waited.
    pub waited: Duration,
}

impl fmt::Display for LockTimeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "failed to acquire lock '{}' within {:.2}s",
            self.name,
            self.waited.as_secs_f64()
        )
    }
}

impl std::error::Error for LockTimeout {}

/// An async mutex whose acquisition is bounded by a timeout.
///
/// The returned [`BoundedMutexGuard`] releases the lock when dropped, so the
/// lock is released on success, on `?` early returns and on panics alike.
/// The mutex never retries on its own; a timeout is reported once to the
/// caller and the caller decides what to do.
pub struct BoundedMutex<T> {
    name: &'static str,
    inner: Mutex<T>,
}

impl<T> BoundedMutex<T> {
    /// Creates a new bounded mutex with a diagnostic name.
    pub fn new(name: &'static str, value: T) -> Self {
        Self {
            name,
            inner: Mutex::new(value),
        }
    }

    /// Name given at construction time.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Acquires the lock, waiting at most [`DEFAULT_LOCK_TIMEOUT`].
    pub async fn lock(&self) -> Result<BoundedMutexGuard<'_, T>, LockTimeout> {
        self.lock_timeout(DEFAULT_LOCK_TIMEOUT).await
    }

    /// Acquires the lock, waiting at most `timeout`.
    pub async fn lock_timeout(
        &self,
        timeout: Duration,
    ) -> Result<BoundedMutexGuard<'_, T>, LockTimeout> {
        let started = Instant::now();
        match tokio::time::timeout(timeout, self.inner.lock()).await {
            Ok(inner) => Ok(BoundedMutexGuard { inner }),
            Err(_) => Err(LockTimeout {
                name: self.name,
                waited: started.elapsed(),
            }),
        }
    }

    /// Attempts to acquire the lock without waiting.
    pub fn try_lock(&self) -> Option<BoundedMutexGuard<'_, T>> {
        self.inner
            .try_lock()
            .ok()
            .map(|inner| BoundedMutexGuard { inner })
    }
}

impl<T: Default> Default for BoundedMutex<T> {
    fn default() -> Self {
        Self::new("unnamed", T::default())
    }
}

impl<T> fmt::Debug for BoundedMutex<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundedMutex")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// A guard that releases the [`BoundedMutex`] when dropped.
pub struct BoundedMutexGuard<'a, T> {
    inner: MutexGuard<'a, T>,
}

impl<'a, T> Deref for BoundedMutexGuard<'a, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl<'a, T> DerefMut for BoundedMutexGuard<'a, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.inner
    }
}

impl<'a, T: fmt::Debug> fmt::Debug for BoundedMutexGuard<'a, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}
