mod settings;

pub use settings::{Settings, Theme};

use anyhow::{Context, Result};
use atomic_write_file::AtomicWriteFile;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_POLLING_INTERVAL_SECS: u64 = 60;
pub const MIN_POLLING_INTERVAL_SECS: u64 = 10;

/// Get the config directory path (~/.config/prscout/)
pub fn get_config_dir() -> PathBuf {
    let home = dirs::home_dir().expect("Could not determine home directory");
    home.join(".config").join("prscout")
}

/// Get the default settings file path (~/.config/prscout/settings.json)
pub fn get_settings_path() -> PathBuf {
    get_config_dir().join("settings.json")
}

/// Ensure the config directory exists
pub fn ensure_config_dir() -> Result<()> {
    let config_dir = get_config_dir();
    if !config_dir.exists() {
        fs::create_dir_all(&config_dir).with_context(|| {
            format!("Failed to create config directory at {}", config_dir.display())
        })?;
    }
    Ok(())
}

/// Load settings from a JSON file. A missing file yields the defaults;
/// a present-but-unreadable file is an error rather than a silent reset.
pub fn load_settings(path: &Path) -> Result<Settings> {
    if !path.exists() {
        return Ok(Settings::default());
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read settings file at {}", path.display()))?;

    let settings: Settings = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse settings file at {}", path.display()))?;

    Ok(settings)
}

/// Save settings atomically so a crash mid-write never corrupts them.
pub fn save_settings(path: &Path, settings: &Settings) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory at {}", parent.display()))?;
    }

    let mut file = AtomicWriteFile::open(path)
        .with_context(|| format!("Failed to open atomic write file at {}", path.display()))?;

    serde_json::to_writer_pretty(&mut file, settings).context("Failed to serialize settings")?;

    file.commit().context("Failed to save settings")?;

    Ok(())
}
