//! `yt-dlp` subprocess extractor
//!
//! Runs the extractor binary in JSON-dump mode and parses its output into
//! [`MediaInfo`]. Nothing is downloaded; only metadata and format URLs are
//! requested.

use async_trait::async_trait;
use core_async::time::{timeout, Duration};
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, instrument, warn};

use crate::error::{ResolutionError, Result};
use crate::strategy::{Extractor, RequestProfile};
use crate::types::MediaInfo;

const WATCH_URL: &str = "https://www.youtube.com/watch?v=";
const FORMAT_SELECTOR: &str = "bestaudio[ext=m4a]/bestaudio/best";

/// Extractor backed by a `yt-dlp` executable.
#[derive(Debug, Clone)]
pub struct CommandExtractor {
    program: PathBuf,
    timeout: Duration,
    ffmpeg_location: Option<PathBuf>,
}

impl Default for CommandExtractor {
    fn default() -> Self {
        Self::new("yt-dlp")
    }
}

impl CommandExtractor {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            timeout: Duration::from_secs(45),
            ffmpeg_location: None,
        }
    }

    /// Upper bound for one extractor run. The child is killed when exceeded.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_ffmpeg_location(mut self, dir: impl Into<PathBuf>) -> Self {
        self.ffmpeg_location = Some(dir.into());
        self
    }

    /// Command-line arguments for one extraction.
    pub fn build_args(&self, media_id: &str, profile: &RequestProfile) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "-J".into(),
            "--skip-download".into(),
            "--no-playlist".into(),
            "--no-warnings".into(),
            "--no-check-certificates".into(),
            "-f".into(),
            FORMAT_SELECTOR.into(),
            "--user-agent".into(),
            profile.user_agent.clone().into(),
        ];

        for (key, value) in &profile.headers {
            args.push("--add-header".into());
            args.push(format!("{}:{}", key, value).into());
        }

        if let Some(cookie_file) = &profile.cookie_file {
            args.push("--cookies".into());
            args.push(cookie_file.clone().into_os_string());
        }

        for extractor_arg in &profile.extractor_args {
            args.push("--extractor-args".into());
            args.push(extractor_arg.clone().into());
        }

        if let Some(ffmpeg) = &self.ffmpeg_location {
            args.push("--ffmpeg-location".into());
            args.push(ffmpeg.clone().into_os_string());
        }

        args.push("--".into());
        args.push(format!("{}{}", WATCH_URL, media_id).into());
        args
    }
}

#[async_trait]
impl Extractor for CommandExtractor {
    #[instrument(skip(self, profile))]
    async fn extract(&self, media_id: &str, profile: &RequestProfile) -> Result<MediaInfo> {
        let args = self.build_args(media_id, profile);

        let child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = match timeout(self.timeout, child).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                warn!(program = %self.program.display(), error = %e, "Failed to run extractor");
                return Err(ResolutionError::Unknown(format!(
                    "failed to run {}: {}",
                    self.program.display(),
                    e
                )));
            }
            Err(_) => {
                return Err(ResolutionError::Unknown(format!(
                    "extractor timed out after {}s",
                    self.timeout.as_secs()
                )));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = stderr
                .lines()
                .rev()
                .find(|line| !line.trim().is_empty())
                .unwrap_or("extractor exited with an error")
                .trim()
                .to_string();
            debug!(status = ?output.status.code(), message = %message, "Extractor failed");
            return Err(ResolutionError::classify(message));
        }

        serde_json::from_slice::<MediaInfo>(&output.stdout).map_err(|e| {
            ResolutionError::Unknown(format!("extractor returned unparsable JSON: {}", e))
        })
    }
}
