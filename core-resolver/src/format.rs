//! Two-tier audio format selection
//!
//! ```text
//! formats ──► tier 1: ext == preferred && has audio ──► rank by abr (else tbr, else 0)
//!                │ (empty)
//!                ▼
//!             tier 2: has audio ──► rank by max(abr, tbr)
//!                │ (empty)
//!                ▼
//!             NoAudioFormats
//! ```
//!
//! Ranking is stable: among equal scores the format listed first wins.

use crate::error::{ResolutionError, Result};
use crate::types::{MediaFormat, MediaInfo, ResolutionResult, TitleMeta};

/// Container preferred by default.
pub const DEFAULT_CONTAINER: &str = "m4a";

/// Pick the best audio format and build the resolution result.
pub fn select_best_format(info: &MediaInfo, preferred_container: &str) -> Result<ResolutionResult> {
    let preferred: Vec<&MediaFormat> = info
        .formats
        .iter()
        .filter(|f| f.has_audio() && f.ext.as_deref() == Some(preferred_container))
        .collect();

    let (best, container, fallback_label) =
        if let Some(best) = pick_highest(&preferred, preferred_score) {
            (best, preferred_container.to_string(), preferred_container)
        } else {
            let audio: Vec<&MediaFormat> = info.formats.iter().filter(|f| f.has_audio()).collect();
            let best = pick_highest(&audio, fallback_score).ok_or(ResolutionError::NoAudioFormats)?;
            let container = best.ext.clone().unwrap_or_else(|| "unknown".to_string());
            (best, container, "unknown")
        };

    let direct_url = best.url.clone().unwrap_or_default();
    let format_label = best
        .format_note
        .clone()
        .unwrap_or_else(|| fallback_label.to_string());

    Ok(ResolutionResult {
        direct_url,
        format_label,
        container,
        duration_seconds: info.duration.unwrap_or(0.0),
        title_meta: TitleMeta {
            title: info.title.clone().unwrap_or_else(|| "Unknown".to_string()),
            uploader: info
                .uploader
                .clone()
                .unwrap_or_else(|| "Unknown".to_string()),
        },
    })
}

fn preferred_score(format: &MediaFormat) -> f64 {
    format.abr.or(format.tbr).unwrap_or(0.0)
}

fn fallback_score(format: &MediaFormat) -> f64 {
    format.abr.unwrap_or(0.0).max(format.tbr.unwrap_or(0.0))
}

/// First format with the strictly highest score.
fn pick_highest<'a>(
    formats: &[&'a MediaFormat],
    score: fn(&MediaFormat) -> f64,
) -> Option<&'a MediaFormat> {
    let mut best: Option<(&MediaFormat, f64)> = None;
    for format in formats {
        let s = score(format);
        match best {
            Some((_, top)) if s <= top => {}
            _ => best = Some((format, s)),
        }
    }
    best.map(|(f, _)| f)
}
