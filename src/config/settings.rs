use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::{DEFAULT_POLLING_INTERVAL_SECS, MIN_POLLING_INTERVAL_SECS};

/// Persisted user settings. The token lives in the system keyring, not here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_polling_interval")]
    pub polling_interval_secs: u64,
    #[serde(default)]
    pub theme: Theme,
    #[serde(default = "default_show_footer")]
    pub show_footer: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    System,
    Light,
    Dark,
}

fn default_polling_interval() -> u64 {
    DEFAULT_POLLING_INTERVAL_SECS
}

fn default_show_footer() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            polling_interval_secs: DEFAULT_POLLING_INTERVAL_SECS,
            theme: Theme::System,
            show_footer: true,
        }
    }
}

impl Settings {
    /// Set the polling interval, rejecting values below the floor.
    /// On rejection the previous value is left untouched.
    pub fn set_polling_interval(&mut self, secs: u64) -> Result<()> {
        if secs < MIN_POLLING_INTERVAL_SECS {
            anyhow::bail!(
                "Polling interval must be at least {} seconds (got {})",
                MIN_POLLING_INTERVAL_SECS,
                secs
            );
        }
        self.polling_interval_secs = secs;
        Ok(())
    }
}
