use anyhow::Result;
use serde::Deserialize;
use std::time::Duration;

use crate::recording::RecordingConfig;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub service: ServiceConfig,
    pub recording: RecordingConfig,
    pub downloads: DownloadConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Backend root, e.g. `http://localhost:8000`
    pub base_url: String,
    /// Bound on every remote call
    pub request_timeout_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            request_timeout_secs: 60,
        }
    }
}

impl ServiceConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// Where exported visualizations are written
    pub dir: String,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            dir: "downloads".to_string(),
        }
    }
}

impl Config {
    /// Load `path` (extension optional, file optional) layered with
    /// `INTELLIML__SECTION__KEY` environment variables
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix("INTELLIML")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
