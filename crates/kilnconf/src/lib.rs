//! Minimal configuration loading for kiln.
//!
//! # Config File Locations
//!
//! Files are loaded in order (later wins):
//! 1. `/etc/kiln/config.toml` (system)
//! 2. `~/.config/kiln/config.toml` (user)
//! 3. `./kiln.toml` (local override, or the `--config` path)
//! 4. Environment variables (`KILN_*`)
//!
//! Files merge key by key, so a local file only needs the values it changes.
//!
//! # Example Config
//!
//! ```toml
//! [blender]
//! host = "localhost"
//! port = 9876
//! recv_timeout_ms = 15000
//!
//! [trellis]
//! base_url = "http://localhost:8000"
//! poll_interval_ms = 1000
//! max_poll_attempts = 5
//!
//! [telemetry]
//! log_level = "info"
//! otlp_endpoint = ""
//! ```

pub mod loader;
pub mod sections;

pub use loader::{discover_config_files_with_override, ConfigSources};
pub use sections::{BlenderConfig, TelemetryConfig, TrellisConfig};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

/// Complete kiln configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct KilnConfig {
    #[serde(default)]
    pub blender: BlenderConfig,

    #[serde(default)]
    pub trellis: TrellisConfig,

    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl KilnConfig {
    /// Load configuration from all sources.
    pub fn load() -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(None)?;
        Ok(config)
    }

    /// Load configuration with `config_path` standing in for `./kiln.toml`.
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(config_path)?;
        Ok(config)
    }

    /// Load configuration from optional path and return information about sources.
    pub fn load_with_sources_from(
        config_path: Option<&Path>,
    ) -> Result<(Self, ConfigSources), ConfigError> {
        let mut sources = ConfigSources::default();
        let mut merged = toml::Table::new();

        for path in loader::discover_config_files_with_override(config_path) {
            let table = loader::load_from_file(&path)?;
            loader::merge_tables(&mut merged, table);
            sources.files.push(path);
        }

        let origin = sources
            .files
            .last()
            .cloned()
            .unwrap_or_else(|| PathBuf::from("<defaults>"));
        let mut config = loader::resolve(merged, &origin)?;

        loader::apply_env_overrides(&mut config, &mut sources);

        Ok((config, sources))
    }

    /// Serialize config to TOML string.
    pub fn to_toml(&self) -> String {
        let body = toml::to_string_pretty(self).unwrap_or_default();
        format!("# kiln configuration\n\n{}", body)
    }
}
