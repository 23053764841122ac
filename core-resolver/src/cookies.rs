//! Stored-credential checks
//!
//! A cookie file is only worth handing to the extractor when it exists, is
//! non-empty, and carries at least one session cookie the upstream actually
//! honours.

use crate::error::{ResolutionError, Result};
use core_runtime::logging::strip_path;
use std::path::Path;
use tracing::debug;

/// Cookie names that indicate a usable signed-in or visitor session.
pub const ESSENTIAL_COOKIES: &[&str] = &["LOGIN_INFO", "VISITOR_INFO1_LIVE", "SAPISID", "APISID"];

/// Whether the cookie file contents mention any essential cookie.
pub fn contains_essential_cookie(contents: &str) -> bool {
    ESSENTIAL_COOKIES.iter().any(|name| contents.contains(name))
}

/// Validate a cookie file, reporting failures as `AuthRequired`.
pub async fn validate_cookie_file(path: &Path) -> Result<()> {
    let display = path.to_string_lossy();
    let file = strip_path(&display);

    let contents = match tokio::fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(e) => {
            debug!(file = %file, error = %e, "Cookie file unreadable");
            return Err(ResolutionError::AuthRequired(format!(
                "cookie file {} is missing or unreadable",
                file
            )));
        }
    };

    if contents.trim().is_empty() {
        return Err(ResolutionError::AuthRequired(format!(
            "cookie file {} is empty",
            file
        )));
    }

    if !contains_essential_cookie(&contents) {
        return Err(ResolutionError::AuthRequired(format!(
            "cookie file {} has no session cookies",
            file
        )));
    }

    Ok(())
}
