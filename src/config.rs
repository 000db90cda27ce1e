// snipt/src/config.rs

use std::time::Duration;

use snipt_core::config::ClientConfig;
use tracing::{debug, info};

pub const DEFAULT_SELECT_CMD: &str = "fzf";
pub const DEFAULT_EDITOR: &str = "vi";

/// Everything the CLI needs after loading: local tool settings plus the
/// resolved backend connections.
#[derive(Debug, Clone)]
pub struct Config {
    pub general: GeneralConfig,
    pub client: ClientConfig,
}

impl Config {
    pub fn trace_loaded(&self) {
        self.general.trace_loaded();
        self.client.trace_loaded();
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneralConfig {
    pub editor: String,
    /// Interactive filter, run through `sh -c`.
    pub select_cmd: String,
    pub timeout: Duration,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            editor: std::env::var("EDITOR")
                .ok()
                .filter(|e| !e.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_EDITOR.to_string()),
            select_cmd: DEFAULT_SELECT_CMD.to_string(),
            timeout: snipt_core::config::DEFAULT_TIMEOUT,
        }
    }
}

impl GeneralConfig {
    pub fn trace_loaded(&self) {
        info!(
            editor = %self.editor,
            select_cmd = %self.select_cmd,
            timeout_secs = self.timeout.as_secs(),
            "Loaded general settings"
        );
        debug!(?self, "General settings (full debug)");
    }
}
