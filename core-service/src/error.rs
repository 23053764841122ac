use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use core_playback::PlaybackError;
use thiserror::Error;
use tracing::{error, warn};

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Capability missing: {capability} - {message}")]
    CapabilityMissing { capability: String, message: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Runtime error: {0}")]
    Runtime(#[from] core_runtime::Error),

    #[error("Playback error: {0}")]
    Playback(#[from] PlaybackError),
}

pub type Result<T> = std::result::Result<T, CoreError>;

/// Error returned by HTTP handlers, rendered as `{"error": "..."}`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    content_range: Option<String>,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            content_range: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl From<PlaybackError> for ApiError {
    fn from(err: PlaybackError) -> Self {
        match err {
            PlaybackError::NoPlayableUrl(cause) => {
                warn!(error = %cause, "No playable URL");
                Self::new(
                    StatusCode::SERVICE_UNAVAILABLE,
                    "No playable URL for this track",
                )
            }
            PlaybackError::UpstreamFetch(_) | PlaybackError::UpstreamStatus(_) => {
                Self::new(StatusCode::BAD_GATEWAY, err.to_string())
            }
            PlaybackError::RangeNotSatisfiable { size } => Self {
                status: StatusCode::RANGE_NOT_SATISFIABLE,
                message: err.to_string(),
                content_range: Some(format!("bytes */{}", size)),
            },
            PlaybackError::InvalidMediaId(_) | PlaybackError::InvalidRequest(_) => {
                Self::bad_request(err.to_string())
            }
            PlaybackError::NotFound(_) | PlaybackError::UnsupportedPlatform(_) => {
                Self::not_found(err.to_string())
            }
            PlaybackError::LockTimeout(_)
            | PlaybackError::Io(_)
            | PlaybackError::InvalidConfig(_) => {
                error!(error = %err, "Internal error while handling request");
                Self::internal(err.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": self.message,
        });
        let mut response = (self.status, Json(body)).into_response();
        if let Some(range) = self
            .content_range
            .and_then(|value| HeaderValue::from_str(&value).ok())
        {
            response.headers_mut().insert(header::CONTENT_RANGE, range);
        }
        response
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;
