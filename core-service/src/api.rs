//! HTTP surface of the stream daemon.
//!
//! | Route | Handler |
//! |-------|---------|
//! | `GET /stream/{platform}?id=` | [`stream`] |
//! | `GET, OPTIONS /fast-stream/{platform}?id=` | [`fast_stream`] |
//! | `POST /preload` | [`preload`] |
//! | `GET /cache/info` | [`cache_info`] |
//! | `POST /cache/clear` | [`cache_clear`] |
//! | `GET, POST /current-track` | [`current_track`], [`set_current_track`] |
//! | `GET, POST /queue` | [`queue`], [`set_queue`] |

use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use core_playback::{
    CacheInfo, CurrentTrack, MediaResponse, PlaybackError, PreloadContext, PreloadRequest,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{ApiError, ApiResult};
use crate::{CoreService, LOCAL_PLATFORM};

const CORS_HEADERS: [(header::HeaderName, &str); 4] = [
    (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
    (header::ACCESS_CONTROL_ALLOW_METHODS, "GET, OPTIONS"),
    (header::ACCESS_CONTROL_ALLOW_HEADERS, "Range"),
    (header::CACHE_CONTROL, "public, max-age=3600"),
];

/// Build the router over a shared [`CoreService`].
pub fn router(core: CoreService) -> Router {
    Router::new()
        .route("/stream/{platform}", get(stream))
        .route(
            "/fast-stream/{platform}",
            get(fast_stream).options(fast_stream_preflight),
        )
        .route("/preload", post(preload))
        .route("/cache/info", get(cache_info))
        .route("/cache/clear", post(cache_clear))
        .route(
            "/current-track",
            get(current_track).post(set_current_track),
        )
        .route("/queue", get(queue).post(set_queue))
        .with_state(core)
}

// ============================================================================
// Streaming
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct StreamQuery {
    pub id: Option<String>,
}

impl StreamQuery {
    fn require_id(self) -> ApiResult<String> {
        self.id
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| ApiError::bad_request("Missing id parameter"))
    }
}

enum Platform {
    Local,
    Remote,
}

fn platform(core: &CoreService, name: &str) -> Result<Platform, PlaybackError> {
    if name == LOCAL_PLATFORM {
        Ok(Platform::Local)
    } else if core.config().is_remote(name) {
        Ok(Platform::Remote)
    } else {
        Err(PlaybackError::UnsupportedPlatform(name.to_string()))
    }
}

fn range_header(headers: &HeaderMap) -> Option<&str> {
    headers.get(header::RANGE).and_then(|v| v.to_str().ok())
}

fn into_http(media: MediaResponse) -> ApiResult<Response> {
    let status = StatusCode::from_u16(media.status)
        .map_err(|_| ApiError::new(StatusCode::BAD_GATEWAY, "Invalid upstream status"))?;

    let mut builder = Response::builder().status(status);
    for (name, value) in &media.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
        .body(Body::from_stream(media.body))
        .map_err(|e| ApiError::internal(e.to_string()))
}

/// Local files are served directly; remote tracks redirect to the direct URL.
pub async fn stream(
    State(core): State<CoreService>,
    Path(name): Path<String>,
    Query(query): Query<StreamQuery>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let id = query.require_id()?;

    match platform(&core, &name)? {
        Platform::Local => {
            let media = core.stream().serve_local(&id, range_header(&headers)).await?;
            into_http(media)
        }
        Platform::Remote => {
            let acquired = core.stream().acquire_url(&id).await?;
            debug!(platform = %name, id = %id, source = acquired.source.as_str(), "Redirecting to direct URL");
            let location = HeaderValue::from_str(&acquired.url).map_err(|_| {
                ApiError::new(StatusCode::BAD_GATEWAY, "Resolved URL is not a valid header")
            })?;
            Ok((StatusCode::FOUND, [(header::LOCATION, location)]).into_response())
        }
    }
}

/// Same-origin relay of the media bytes, with CORS for browser players.
pub async fn fast_stream(
    State(core): State<CoreService>,
    Path(name): Path<String>,
    Query(query): Query<StreamQuery>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let id = query.require_id()?;
    let range = range_header(&headers);

    let media = match platform(&core, &name)? {
        Platform::Local => core.stream().serve_local(&id, range).await?,
        Platform::Remote => core.stream().proxy(&id, range).await?,
    };

    let mut response = into_http(media)?;
    for (header_name, value) in CORS_HEADERS {
        response
            .headers_mut()
            .insert(header_name, HeaderValue::from_static(value));
    }
    Ok(response)
}

pub async fn fast_stream_preflight() -> Response {
    (StatusCode::NO_CONTENT, CORS_HEADERS).into_response()
}

// ============================================================================
// Preload
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreloadBody {
    #[serde(default, alias = "track_ids")]
    pub track_ids: Vec<String>,
    #[serde(default, alias = "current_track_id")]
    pub current_track_id: Option<String>,
    #[serde(default)]
    pub context: Option<PreloadContext>,
}

#[derive(Debug, Serialize)]
pub struct PreloadResponse {
    pub success: bool,
    pub accepted: usize,
    pub skipped: usize,
    pub context: PreloadContext,
    pub message: String,
}

/// Queue a preload batch and answer before any resolution runs.
pub async fn preload(
    State(core): State<CoreService>,
    Json(body): Json<PreloadBody>,
) -> ApiResult<Json<PreloadResponse>> {
    if body.track_ids.is_empty() {
        return Err(ApiError::bad_request("trackIds must be a non-empty list"));
    }

    let mut request = PreloadRequest::new(body.track_ids)
        .with_context(body.context.unwrap_or_default());
    if let Some(current) = body.current_track_id.filter(|id| !id.is_empty()) {
        request = request.with_current_track(current);
    }

    let ticket = core.preload().start(request).await?;

    let message = if ticket.accepted == 0 {
        "All tracks already cached".to_string()
    } else {
        format!("Preloading {} tracks in background", ticket.accepted)
    };

    Ok(Json(PreloadResponse {
        success: true,
        accepted: ticket.accepted,
        skipped: ticket.skipped,
        context: ticket.context,
        message,
    }))
}

// ============================================================================
// Cache
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheInfoResponse {
    #[serde(flatten)]
    pub counts: CacheInfo,
    pub cache_expiry_seconds: u64,
    /// `null` until the janitor runs
    pub next_sweep_seconds: Option<u64>,
}

pub async fn cache_info(State(core): State<CoreService>) -> ApiResult<Json<CacheInfoResponse>> {
    let counts = core.store().info().await?;
    Ok(Json(CacheInfoResponse {
        counts,
        cache_expiry_seconds: core.store().config().expiry.as_secs(),
        next_sweep_seconds: core.next_sweep_secs(),
    }))
}

#[derive(Debug, Serialize)]
pub struct ClearResponse {
    pub success: bool,
    pub cleared: usize,
}

pub async fn cache_clear(State(core): State<CoreService>) -> ApiResult<Json<ClearResponse>> {
    let cleared = core.store().clear().await?;
    Ok(Json(ClearResponse {
        success: true,
        cleared,
    }))
}

// ============================================================================
// Playback signal
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentTrackBody {
    pub platform: String,
    #[serde(alias = "track_id")]
    pub track_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentTrackResponse {
    pub success: bool,
    pub current_track: Option<CurrentTrack>,
}

pub async fn set_current_track(
    State(core): State<CoreService>,
    Json(body): Json<CurrentTrackBody>,
) -> ApiResult<Json<CurrentTrackResponse>> {
    if body.track_id.trim().is_empty() {
        return Err(ApiError::bad_request("trackId cannot be empty"));
    }

    let current = core
        .store()
        .set_current_track(body.platform, body.track_id)
        .await?;
    info!(platform = %current.platform, track_id = %current.track_id, "Current track updated");

    Ok(Json(CurrentTrackResponse {
        success: true,
        current_track: Some(current),
    }))
}

pub async fn current_track(
    State(core): State<CoreService>,
) -> ApiResult<Json<CurrentTrackResponse>> {
    let current = core.store().current_track().await?;
    Ok(Json(CurrentTrackResponse {
        success: true,
        current_track: current,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueBody {
    #[serde(default, alias = "track_ids")]
    pub track_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueResponse {
    pub success: bool,
    pub queued: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub track_ids: Option<Vec<String>>,
}

/// Replace the queued set. Informational only.
pub async fn set_queue(
    State(core): State<CoreService>,
    Json(body): Json<QueueBody>,
) -> ApiResult<Json<QueueResponse>> {
    let queued = core.store().replace_queue(body.track_ids).await?;
    Ok(Json(QueueResponse {
        success: true,
        queued,
        track_ids: None,
    }))
}

pub async fn queue(State(core): State<CoreService>) -> ApiResult<Json<QueueResponse>> {
    let ids = core.store().queued_tracks().await?;
    Ok(Json(QueueResponse {
        success: true,
        queued: ids.len(),
        track_ids: Some(ids),
    }))
}
