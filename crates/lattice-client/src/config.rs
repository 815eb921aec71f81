//! Sync tuning, loadable from RON.
//!
//! ```ron
//! (
//!     refresh_quiet_window_ms: 400,
//!     disconnect_notice: "Reconnecting to Lattice...",
//! )
//! ```
//!
//! Missing fields fall back to the values in [`constants`](crate::constants).

use std::time::Duration;

use serde::Deserialize;

use crate::constants::{DISCONNECT_NOTICE, REFRESH_QUIET_WINDOW};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid sync config: {0}")]
    Parse(#[from] ron::error::SpannedError),
    #[error("refresh quiet window must be greater than zero")]
    ZeroQuietWindow,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyncConfig {
    /// Debounce window for coalesced refreshes, in milliseconds.
    pub refresh_quiet_window_ms: u64,
    /// Warning shown while the live feed is retrying.
    pub disconnect_notice: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            refresh_quiet_window_ms: REFRESH_QUIET_WINDOW.as_millis() as u64,
            disconnect_notice: DISCONNECT_NOTICE.to_string(),
        }
    }
}

impl SyncConfig {
    pub fn from_ron(source: &str) -> Result<Self, ConfigError> {
        let config: Self = ron::from_str(source)?;
        if config.refresh_quiet_window_ms == 0 {
            return Err(ConfigError::ZeroQuietWindow);
        }
        Ok(config)
    }

    pub fn quiet_window(&self) -> Duration {
        Duration::from_millis(self.refresh_quiet_window_ms)
    }
}
