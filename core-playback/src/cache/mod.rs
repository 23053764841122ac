//! # Resolution Cache
//!
//! Keeps resolved direct-stream URLs in memory so repeated plays and preloaded
//! tracks skip the resolution chain.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                        CacheStore                        │
//! │  BoundedMutex<SharedState>                               │
//! │   ├─ entries: media_id → CacheEntry                      │
//! │   ├─ current: Option<CurrentTrack>                       │
//! │   └─ queued:  HashSet<media_id>                          │
//! └───────▲───────────────────▲──────────────────▲───────────┘
//!         │ take_for_serve    │ get_fresh / put  │ retain
//!   StreamService     PreloadOrchestrator     Janitor
//! ```
//!
//! Freshness is decided per call site. Each consumer passes its own threshold
//! and the store caps it at the global expiry, so no entry older than the
//! expiry is ever handed out.

pub mod config;
pub mod entry;
pub mod janitor;
pub mod stats;
pub mod store;

pub use config::CacheConfig;
pub use entry::{CacheEntry, PreloadContext};
pub use janitor::{classify, Janitor, SweepBucket, SweepReport, SweepSchedule};
pub use stats::CacheInfo;
pub use store::{CacheStore, CurrentTrack};
