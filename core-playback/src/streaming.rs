//! # Stream Server Core
//!
//! Turns a media ID into bytes for the HTTP layer, either by relaying the
//! upstream direct URL or by reading a local file.
//!
//! ## Architecture
//!
//! ```text
//!                  ┌──────────────────────────────┐
//!  proxy(id, rng) ─►  acquire_url(id)             │
//!                  │   cache hit ─► flip flags    │
//!                  │   miss ─► resolve (unlocked) │
//!                  │         ─► put(used = true)  │
//!                  └──────────────┬───────────────┘
//!                                 │ direct URL
//!                                 ▼
//!                  ┌──────────────────────────────┐
//!                  │  HttpClient::get_stream      │
//!                  │  User-Agent + Range          │
//!                  └──────────────┬───────────────┘
//!                                 │ 200/206 + headers + chunks
//!                                 ▼
//!                           MediaResponse
//! ```
//!
//! Local files (`<media_dir>/<id>.mp3`) go through [`LocalMedia`] with
//! single-range support.
//!
//! Neither path retries. Upstream URLs expire, so a failed relay is reported
//! to the client, which asks again and gets a fresh resolution if needed.

use bridge_traits::error::BridgeError;
use bridge_traits::http::{ByteStream, HttpClient, HttpRequest};
use bytes::Bytes;
use core_resolver::MediaResolver;
use core_runtime::logging::redact_url;
use futures::stream::{StreamExt, TryStreamExt};
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;
use tracing::{debug, info, instrument, warn};

use crate::cache::{CacheEntry, CacheStore};
use crate::error::{PlaybackError, Result};

/// Headers copied from the upstream response.
pub const RELAYED_HEADERS: &[&str] = &["content-length", "content-range", "accept-ranges"];

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

// ============================================================================
// Byte ranges
// ============================================================================

/// Inclusive byte range within a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

#[allow(clippy::len_without_is_empty)]
impl ByteRange {
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// `Content-Range` value for a file of `size` bytes.
    pub fn content_range(&self, size: u64) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, size)
    }
}

/// Parse a `Range: bytes=start-end` header against a file of `size` bytes.
///
/// A missing start means 0, a missing end means the last byte, and an end
/// past the file is clamped. Only the first range of a multi-range header
/// is honoured.
pub fn parse_byte_range(header: &str, size: u64) -> Result<ByteRange> {
    let unsatisfiable = || PlaybackError::RangeNotSatisfiable { size };

    let spec = header
        .trim()
        .strip_prefix("bytes=")
        .ok_or_else(unsatisfiable)?;
    let first = spec.split(',').next().unwrap_or_default().trim();
    let (start, end) = first.split_once('-').ok_or_else(unsatisfiable)?;

    if size == 0 {
        return Err(unsatisfiable());
    }
    let last = size - 1;

    let start = match start.trim() {
        "" => 0,
        s => s.parse::<u64>().map_err(|_| unsatisfiable())?,
    };
    let end = match end.trim() {
        "" => last,
        e => e.parse::<u64>().map_err(|_| unsatisfiable())?.min(last),
    };

    if start > end {
        return Err(unsatisfiable());
    }

    Ok(ByteRange { start, end })
}

// ============================================================================
// Responses
// ============================================================================

/// Status, headers and streamed body handed to the HTTP layer.
pub struct MediaResponse {
    pub status: u16,
    /// Lowercase header names
    pub headers: Vec<(String, String)>,
    pub body: ByteStream,
}

impl MediaResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Collect the whole body. Meant for tests and small payloads.
    pub async fn collect_body(self) -> Result<Bytes> {
        let chunks: Vec<Bytes> = self
            .body
            .try_collect()
            .await
            .map_err(|e| PlaybackError::UpstreamFetch(e.to_string()))?;
        Ok(chunks.concat().into())
    }
}

impl std::fmt::Debug for MediaResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Local files
// ============================================================================

/// Whether `id` can be used as a single file-name component.
pub fn is_safe_media_id(id: &str) -> bool {
    !id.is_empty()
        && id != "."
        && id != ".."
        && !id.chars().any(|c| matches!(c, '/' | '\\' | '\0'))
}

/// Range-aware reader over `<root>/<id>.<extension>`.
#[derive(Debug, Clone)]
pub struct LocalMedia {
    root: PathBuf,
    extension: String,
}

impl LocalMedia {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            extension: "mp3".to_string(),
        }
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, id: &str) -> Result<PathBuf> {
        if !is_safe_media_id(id) {
            return Err(PlaybackError::InvalidMediaId(id.to_string()));
        }
        Ok(self.root.join(format!("{}.{}", id, self.extension)))
    }

    /// Open a local file, honouring `range` when present.
    #[instrument(skip(self))]
    pub async fn open(&self, id: &str, range: Option<&str>) -> Result<MediaResponse> {
        let path = self.path_for(id)?;

        let mut file = match tokio::fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(PlaybackError::NotFound(id.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        let size = file.metadata().await?.len();

        let mut headers = vec![
            ("content-type".to_string(), "audio/mpeg".to_string()),
            ("accept-ranges".to_string(), "bytes".to_string()),
        ];

        // Unknown range units are ignored and the whole file is sent.
        let range = range.filter(|r| r.trim_start().starts_with("bytes="));

        let Some(range) = range else {
            headers.push(("content-length".to_string(), size.to_string()));
            return Ok(MediaResponse {
                status: 200,
                headers,
                body: reader_body(file),
            });
        };

        let range = parse_byte_range(range, size)?;
        debug!(start = range.start, end = range.end, size, "Serving byte range");

        file.seek(SeekFrom::Start(range.start)).await?;
        headers.push(("content-length".to_string(), range.len().to_string()));
        headers.push(("content-range".to_string(), range.content_range(size)));

        Ok(MediaResponse {
            status: 206,
            headers,
            body: reader_body(file.take(range.len())),
        })
    }
}

fn reader_body<R>(reader: R) -> ByteStream
where
    R: tokio::io::AsyncRead + Send + 'static,
{
    ReaderStream::new(reader).map_err(BridgeError::from).boxed()
}

// ============================================================================
// Remote streaming
// ============================================================================

/// Settings for [`StreamService`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamConfig {
    /// User agent sent to the upstream media host
    pub user_agent: String,
    /// Directory holding local media files
    pub media_dir: PathBuf,
    /// Bound on the upstream request, headers included (default: none)
    pub upstream_timeout: Option<Duration>,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            media_dir: PathBuf::from("media"),
            upstream_timeout: None,
        }
    }
}

impl StreamConfig {
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_media_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.media_dir = dir.into();
        self
    }

    pub fn with_upstream_timeout(mut self, timeout: Duration) -> Self {
        self.upstream_timeout = Some(timeout);
        self
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.user_agent.trim().is_empty() {
            return Err("user_agent cannot be empty".to_string());
        }
        if self.media_dir.as_os_str().is_empty() {
            return Err("media_dir cannot be empty".to_string());
        }
        if self.upstream_timeout.is_some_and(|t| t.is_zero()) {
            return Err("upstream_timeout must be greater than 0".to_string());
        }
        Ok(())
    }
}

/// Where a served URL came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlSource {
    /// Fresh cache entry that had already been served
    Cached,
    /// Fresh cache entry written by a preload and served for the first time
    Preloaded,
    /// Resolved for this request
    Resolved,
}

impl UrlSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            UrlSource::Cached => "cached",
            UrlSource::Preloaded => "preloaded",
            UrlSource::Resolved => "resolved",
        }
    }

    pub fn is_cache_hit(&self) -> bool {
        !matches!(self, UrlSource::Resolved)
    }
}

/// A direct URL ready to serve.
#[derive(Debug, Clone, PartialEq)]
pub struct AcquiredUrl {
    pub url: String,
    pub source: UrlSource,
    pub format_label: String,
}

/// Cache-aware URL acquisition plus upstream relay and local serving.
pub struct StreamService {
    store: Arc<CacheStore>,
    resolver: Arc<dyn MediaResolver>,
    http: Arc<dyn HttpClient>,
    local: LocalMedia,
    config: StreamConfig,
}

impl StreamService {
    pub fn new(
        store: Arc<CacheStore>,
        resolver: Arc<dyn MediaResolver>,
        http: Arc<dyn HttpClient>,
        config: StreamConfig,
    ) -> Self {
        Self {
            store,
            resolver,
            http,
            local: LocalMedia::new(config.media_dir.clone()),
            config,
        }
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    pub fn local(&self) -> &LocalMedia {
        &self.local
    }

    /// Direct URL for `media_id`, from cache when fresh.
    ///
    /// The cache lock covers only the lookup-and-flip and the final write.
    /// Resolution runs unlocked, so concurrent misses for the same ID may
    /// both resolve; the later write wins.
    #[instrument(skip(self))]
    pub async fn acquire_url(&self, media_id: &str) -> Result<AcquiredUrl> {
        if media_id.trim().is_empty() {
            return Err(PlaybackError::InvalidMediaId(media_id.to_string()));
        }

        if let Some(hit) = self.store.take_for_serve(media_id).await? {
            let source = if hit.preloaded {
                UrlSource::Preloaded
            } else {
                UrlSource::Cached
            };
            debug!(source = source.as_str(), url = %redact_url(&hit.direct_url), "Cache hit");
            return Ok(AcquiredUrl {
                url: hit.direct_url,
                source,
                format_label: hit.format_label,
            });
        }

        let result = self
            .resolver
            .resolve(media_id)
            .await
            .map_err(PlaybackError::NoPlayableUrl)?;

        let entry = CacheEntry::from_resolution(media_id, &result, self.store.now()).into_used();
        self.store.put(entry).await?;

        info!(format = %result.format_label, url = %redact_url(&result.direct_url), "Resolved on demand");

        Ok(AcquiredUrl {
            url: result.direct_url,
            source: UrlSource::Resolved,
            format_label: result.format_label,
        })
    }

    /// Relay the upstream media for `media_id`, forwarding `range`.
    #[instrument(skip(self))]
    pub async fn proxy(&self, media_id: &str, range: Option<&str>) -> Result<MediaResponse> {
        let acquired = self.acquire_url(media_id).await?;

        let mut request = HttpRequest::get(&acquired.url)
            .header("User-Agent", &self.config.user_agent)
            .header_opt("Range", range);
        if let Some(timeout) = self.config.upstream_timeout {
            request = request.timeout(timeout);
        }

        let response = self.http.get_stream(request).await.map_err(|e| {
            warn!(error = %e, "Upstream request failed");
            PlaybackError::UpstreamFetch(e.to_string())
        })?;

        if response.status != 200 && response.status != 206 {
            warn!(status = response.status, source = acquired.source.as_str(), "Upstream rejected request");
            return Err(PlaybackError::UpstreamStatus(response.status));
        }

        let headers = RELAYED_HEADERS
            .iter()
            .filter_map(|name| {
                response
                    .header(name)
                    .map(|value| (name.to_string(), value.to_string()))
            })
            .collect();

        debug!(status = response.status, source = acquired.source.as_str(), "Relaying upstream body");

        Ok(MediaResponse {
            status: response.status,
            headers,
            body: response.body,
        })
    }

    /// Serve `<media_dir>/<id>.mp3`.
    pub async fn serve_local(&self, media_id: &str, range: Option<&str>) -> Result<MediaResponse> {
        self.local.open(media_id, range).await
    }
}
