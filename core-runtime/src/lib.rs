//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the stream daemon:
//! - Logging and tracing infrastructure
//! - Configuration management
//!
//! ## Overview
//!
//! This crate contains the runtime utilities that other modules depend on.
//! It establishes the logging conventions (structured fields, URL redaction)
//! and the fail-fast configuration builder used by the service layer.

pub mod config;
pub mod error;
pub mod logging;

pub use config::{CoreConfig, CoreConfigBuilder};
pub use error::{Error, Result};
pub use logging::{init_logging, redact_url, LogFormat, LoggingConfig};
