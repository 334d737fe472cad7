use anyhow::{Context, Result};
use atomic_write_file::AtomicWriteFile;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

/// Durable watcher state: the set of PR URLs considered assigned as of the
/// last successful cycle, plus the cached authenticated user.
///
/// `known_urls` is replaced wholesale at the end of every successful
/// reconciliation cycle and is written by the engine's commit step only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchState {
    pub version: u32,
    #[serde(default)]
    pub known_urls: Vec<String>,
    #[serde(default)]
    pub user: Option<CachedUser>,
    #[serde(default)]
    pub assigned_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedUser {
    pub login: String,
    pub id: u64,
}

impl Default for WatchState {
    fn default() -> Self {
        Self::new()
    }
}

impl WatchState {
    pub fn new() -> Self {
        WatchState {
            version: 1,
            known_urls: Vec::new(),
            user: None,
            assigned_count: 0,
        }
    }

    /// The known URLs as a set, for diffing.
    pub fn known_set(&self) -> HashSet<String> {
        self.known_urls.iter().cloned().collect()
    }

    /// Wholesale replacement of the known set plus the derived count.
    pub fn commit_known(&mut self, urls: Vec<String>) {
        self.assigned_count = urls.len();
        self.known_urls = urls;
    }
}

/// Get the default state file path (~/.config/prscout/state.json)
pub fn get_state_path() -> PathBuf {
    crate::config::get_config_dir().join("state.json")
}

/// Load watcher state from a JSON file.
///
/// If the file doesn't exist, returns a new empty state.
/// If the file exists but has an unsupported version, returns an error.
pub fn load_state(path: &Path) -> Result<WatchState> {
    if !path.exists() {
        return Ok(WatchState::new());
    }

    let file = File::open(path)
        .with_context(|| format!("Failed to open state file at {}", path.display()))?;

    let state: WatchState = serde_json::from_reader(file).context("Failed to load watcher state")?;

    if state.version != 1 {
        anyhow::bail!("Unsupported state file version: {}", state.version);
    }

    Ok(state)
}

/// Save watcher state to a JSON file atomically, so an interrupted write
/// never leaves a corrupt known set behind.
pub fn save_state(path: &Path, state: &WatchState) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory at {}", parent.display()))?;
    }

    let mut file = AtomicWriteFile::open(path)
        .with_context(|| format!("Failed to open atomic write file at {}", path.display()))?;

    serde_json::to_writer_pretty(&mut file, state).context("Failed to serialize watcher state")?;

    file.commit().context("Failed to save watcher state")?;

    Ok(())
}
