//! # Cache, Preload & Streaming
//!
//! Everything between a resolved URL and the bytes a client receives.
//!
//! ## Overview
//!
//! This crate handles:
//! - The shared resolution cache with per-consumer freshness ([`cache`])
//! - Periodic cleanup of stale entries ([`cache::Janitor`])
//! - Speculative resolution of upcoming tracks ([`preload`])
//! - Upstream relay and local range serving ([`streaming`])
//!
//! Resolution itself lives in `core-resolver`; this crate only sees it
//! through the [`MediaResolver`](core_resolver::MediaResolver) trait.

pub mod cache;
pub mod error;
pub mod preload;
pub mod streaming;

pub use cache::{
    CacheConfig, CacheEntry, CacheInfo, CacheStore, CurrentTrack, Janitor, PreloadContext,
    SweepReport, SweepSchedule,
};
pub use error::{PlaybackError, Result};
pub use preload::{
    PreloadConfig, PreloadOrchestrator, PreloadOutcome, PreloadPlan, PreloadRequest,
    PreloadTicket,
};
pub use streaming::{
    parse_byte_range, AcquiredUrl, ByteRange, LocalMedia, MediaResponse, StreamConfig,
    StreamService, UrlSource,
};
