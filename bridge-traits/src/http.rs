//! HTTP Client Abstraction
//!
//! Provides streamed HTTP GET for relaying remote media bytes. Bodies are never
//! buffered in full: the response exposes a chunk stream that callers forward
//! as it arrives.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, BoxStream};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use crate::error::Result;

/// HTTP request builder
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub url: String,
    pub headers: HashMap<String, String>,
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: HashMap::new(),
            timeout: None,
        }
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Adds the header only when a value is present.
    pub fn header_opt(self, key: impl Into<String>, value: Option<impl Into<String>>) -> Self {
        match value {
            Some(value) => self.header(key, value),
            None => self,
        }
    }

    pub fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }
}

/// Chunked response body.
pub type ByteStream = BoxStream<'static, Result<Bytes>>;

/// HTTP response whose body is consumed as a stream.
///
/// Header names are stored lowercased.
pub struct StreamingResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: ByteStream,
}

impl StreamingResponse {
    pub fn new(status: u16, headers: HashMap<String, String>, body: ByteStream) -> Self {
        let headers = headers
            .into_iter()
            .map(|(k, v)| (k.to_ascii_lowercase(), v))
            .collect();
        Self {
            status,
            headers,
            body,
        }
    }

    /// Builds a response from in-memory chunks. Handy for hosts that already
    /// hold the payload, and for tests.
    pub fn from_chunks(
        status: u16,
        headers: HashMap<String, String>,
        chunks: Vec<Bytes>,
    ) -> Self {
        let body = Box::pin(stream::iter(chunks.into_iter().map(Ok)));
        Self::new(status, headers, body)
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Check if response status is successful (2xx)
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

impl fmt::Debug for StreamingResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamingResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// Async HTTP client trait
///
/// Implementations must not retry on their own and must return non-2xx
/// responses as `Ok` so callers can decide how to treat the status.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::http::{HttpClient, HttpRequest};
///
/// async fn relay(client: &dyn HttpClient, url: &str) -> Result<u16> {
///     let request = HttpRequest::get(url).header("Range", "bytes=0-1023");
///     let response = client.get_stream(request).await?;
///     Ok(response.status)
/// }
/// ```
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Send a GET request and return as soon as the response head arrives.
    ///
    /// # Errors
    ///
    /// Returns error if the connection fails, TLS validation fails or the
    /// request times out before headers are received.
    async fn get_stream(&self, request: HttpRequest) -> Result<StreamingResponse>;
}
