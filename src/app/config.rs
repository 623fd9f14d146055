use std::path::Path;

use chrono::Duration;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// User editable settings, stored as `config.json` in the data directory.
/// There is no settings UI, the file is the interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Hard cap on a single session in minutes. When exceeded the timer is
    /// stopped implicitly, as if the user had clicked stop.
    pub max_session_minutes: Option<u32>,
    /// Fire a notification once a running session crosses this many minutes.
    pub notify_after_minutes: Option<u32>,
}

impl AppConfig {
    /// Loads the config, writing a default file on first run so there is
    /// something discoverable to edit. A malformed file degrades to the
    /// defaults with a warning instead of refusing to start.
    pub async fn load_or_init(path: &Path) -> AppConfig {
        match tokio::fs::read(path).await {
            Ok(content) => match serde_json::from_slice(&content) {
                Ok(config) => config,
                Err(e) => {
                    warn!("Config file {path:?} is malformed, using defaults: {e}");
                    AppConfig::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No config file yet, writing defaults");
                let config = AppConfig::default();
                let encoded = serde_json::to_vec_pretty(&config)
                    .expect("default config always serializes");
                if let Err(e) = tokio::fs::write(path, encoded).await {
                    warn!("Couldn't write default config: {e}");
                }
                config
            }
            Err(e) => {
                warn!("Couldn't read config file {path:?}, using defaults: {e}");
                AppConfig::default()
            }
        }
    }

    pub fn max_session(&self) -> Option<Duration> {
        self.max_session_minutes
            .map(|minutes| Duration::minutes(minutes as i64))
    }

    pub fn notify_after(&self) -> Option<Duration> {
        self.notify_after_minutes
            .map(|minutes| Duration::minutes(minutes as i64))
    }
}
