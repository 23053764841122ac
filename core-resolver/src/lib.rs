//! # Media Resolver
//!
//! Turns opaque media IDs into time-limited direct-stream URLs.
//!
//! ## Overview
//!
//! Resolution goes through a [`StrategyChain`]: an ordered list of
//! [`ResolveStrategy`] implementations tried one after another with pacing
//! between attempts. The built-in strategies ([`StrategyKind`]) differ only in
//! the request profile they hand to an [`Extractor`]; the stock extractor is
//! [`CommandExtractor`], which shells out to `yt-dlp`.
//!
//! After extraction, [`select_best_format`] picks an audio format (preferred
//! container first, then any audio by bitrate).
//!
//! ## Usage
//!
//! ```ignore
//! use core_resolver::{ChainConfig, CommandExtractor, MediaResolver, StrategyChain, StrategyKind};
//! use std::sync::Arc;
//!
//! let chain = StrategyChain::from_kinds(
//!     StrategyKind::default_order(Some("cookies.txt".into()), None),
//!     Arc::new(CommandExtractor::default()),
//!     ChainConfig::default(),
//! );
//! let result = chain.resolve("dQw4w9WgXcQ").await?;
//! ```

pub mod chain;
pub mod command;
pub mod cookies;
pub mod error;
pub mod format;
pub mod strategy;
pub mod types;

pub use chain::{ChainConfig, MediaResolver, StrategyChain};
pub use command::CommandExtractor;
pub use cookies::validate_cookie_file;
pub use error::{ResolutionError, Result};
pub use format::{select_best_format, DEFAULT_CONTAINER};
pub use strategy::{Extractor, ExtractorStrategy, RequestProfile, ResolveStrategy, StrategyKind};
pub use types::{MediaFormat, MediaInfo, ResolutionResult, TitleMeta};
