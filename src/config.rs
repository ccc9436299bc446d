use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How cross-column hover events affect the board
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HoverMode {
    /// Hovering over another column moves the card there immediately
    #[default]
    Preview,
    /// Hover never touches the board; only the floating proxy follows the pointer
    Overlay,
}

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub hover_mode: HoverMode,
    pub persistence_timeout_ms: u64,
}

impl EngineConfig {
    const DEFAULT_PERSISTENCE_TIMEOUT_MS: u64 = 10_000;

    /// Parses a JSON configuration document; missing keys take defaults
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_hover_mode(mut self, mode: HoverMode) -> Self {
        self.hover_mode = mode;
        self
    }

    pub fn with_persistence_timeout(mut self, timeout: Duration) -> Self {
        self.persistence_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn persistence_timeout(&self) -> Duration {
        Duration::from_millis(self.persistence_timeout_ms)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            hover_mode: HoverMode::Preview,
            persistence_timeout_ms: Self::DEFAULT_PERSISTENCE_TIMEOUT_MS,
        }
    }
}
