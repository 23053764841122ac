//! # Host Bridge Traits
//!
//! Abstractions the core crates need from their host but do not implement
//! themselves.
//!
//! ## Traits
//!
//! - [`HttpClient`](http::HttpClient) - Streamed HTTP GET used to relay media bytes
//! - [`Clock`](time::Clock) - Time source for cache ages and deterministic testing
//!
//! ## Implementations
//!
//! | Host | Implementation Crate |
//! |------|---------------------|
//! | Desktop / server | `bridge-desktop` |
//! | Tests | `mockall` mocks, [`ManualClock`](time::ManualClock) |
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type. Host
//! implementations convert their own errors into it and keep messages
//! actionable (include the URL host or path involved).
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` bounds; one instance is shared by
//! every request handler and background task.
//!
//! ## Examples
//!
//! ### Implementing HttpClient
//!
//! ```ignore
//! use bridge_traits::http::{HttpClient, HttpRequest, StreamingResponse};
//! use bridge_traits::error::Result;
//! use async_trait::async_trait;
//!
//! pub struct MyHttpClient {
//!     client: reqwest::Client,
//! }
//!
//! #[async_trait]
//! impl HttpClient for MyHttpClient {
//!     async fn get_stream(&self, request: HttpRequest) -> Result<StreamingResponse> {
//!         // Implementation
//!         todo!()
//!     }
//! }
//! ```

pub mod error;
pub mod http;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use http::{ByteStream, HttpClient, HttpRequest, StreamingResponse};
pub use time::{Clock, LogLevel, ManualClock, SystemClock};
