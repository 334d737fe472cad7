use std::fs;
use std::path::PathBuf;

use tracing::debug;

const STORE_FILE_NAME: &str = "bookmarks.json";

/// Preferred parent directory for the bookmark store, by platform.
///
/// Resolved once at startup; the fallback is the config directory, which
/// always exists by the time anything writes bookmarks.
fn preferred_parent() -> Option<PathBuf> {
    match std::env::consts::OS {
        "linux" | "macos" | "windows" => dirs::data_dir().map(|d| d.join("prscout")),
        _ => None,
    }
}

/// Resolve where the bookmark store lives. Tries the platform's preferred
/// location first and falls back to the config directory rather than
/// failing outright.
pub fn resolve_store_path() -> PathBuf {
    if let Some(parent) = preferred_parent() {
        if fs::create_dir_all(&parent).is_ok() {
            debug!(path = %parent.display(), "using preferred bookmark location");
            return parent.join(STORE_FILE_NAME);
        }
    }
    debug!("preferred bookmark location unavailable; falling back to config dir");
    crate::config::get_config_dir().join(STORE_FILE_NAME)
}
