//! Config file discovery, loading, and environment variable overlay.

use crate::{ConfigError, KilnConfig};
use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Information about where config values came from.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    /// Config files that were loaded (in order)
    pub files: Vec<PathBuf>,
    /// Environment variables that overrode config values
    pub env_overrides: Vec<String>,
}

/// Discover config files in standard locations.
///
/// Returns paths in load order (system, user, local).
/// Only returns files that exist.
pub fn discover_config_files() -> Vec<PathBuf> {
    discover_config_files_with_override(None)
}

/// Discover config files, optionally with a CLI override path.
///
/// If `cli_path` is provided and exists, it replaces the local override.
pub fn discover_config_files_with_override(cli_path: Option<&Path>) -> Vec<PathBuf> {
    let mut files = Vec::new();

    let system = PathBuf::from("/etc/kiln/config.toml");
    if system.exists() {
        files.push(system);
    }

    // User config (XDG_CONFIG_HOME or ~/.config)
    if let Some(config_dir) = directories::BaseDirs::new().map(|d| d.config_dir().to_path_buf()) {
        let user = config_dir.join("kiln/config.toml");
        if user.exists() {
            files.push(user);
        }
    }

    if let Some(path) = cli_path {
        if path.exists() {
            files.push(path.to_path_buf());
            return files;
        }
    }

    let local = PathBuf::from("kiln.toml");
    if local.exists() {
        files.push(local);
    }

    files
}

/// Read a TOML file into a raw table. Sections are resolved after merging.
pub fn load_from_file(path: &Path) -> Result<toml::Table, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    parse_table(&contents, path)
}

pub(crate) fn parse_table(contents: &str, path: &Path) -> Result<toml::Table, ConfigError> {
    contents
        .parse::<toml::Table>()
        .map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
}

/// Merge `overlay` into `base` key by key; nested tables merge recursively.
pub fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge_tables(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

/// Resolve a merged table into typed config; missing keys take defaults.
pub fn resolve(table: toml::Table, path: &Path) -> Result<KilnConfig, ConfigError> {
    toml::Value::Table(table)
        .try_into()
        .map_err(|e: toml::de::Error| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
}

/// Apply environment variable overrides to config.
pub fn apply_env_overrides(config: &mut KilnConfig, sources: &mut ConfigSources) {
    apply_overrides_from(config, sources, |key| env::var(key).ok());
}

/// Same as [`apply_env_overrides`] but reads values through `lookup`.
///
/// A variable is recorded in `sources.env_overrides` only when its value
/// parsed and was applied.
pub fn apply_overrides_from<F>(config: &mut KilnConfig, sources: &mut ConfigSources, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let mut env = Overrides {
        lookup,
        applied: &mut sources.env_overrides,
    };

    // Blender socket
    if let Some(v) = env.get("KILN_BLENDER_HOST") {
        config.blender.host = v;
    }
    if let Some(port) = env.get("KILN_BLENDER_PORT") {
        config.blender.port = port;
    }
    if let Some(ms) = env.get("KILN_RECV_TIMEOUT_MS") {
        config.blender.recv_timeout_ms = ms;
    }

    // Trellis job service
    if let Some(v) = env.get("KILN_TRELLIS_URL") {
        config.trellis.base_url = v;
    }
    if let Some(ms) = env.get("KILN_POLL_INTERVAL_MS") {
        config.trellis.poll_interval_ms = ms;
    }
    if let Some(n) = env.get("KILN_MAX_POLL_ATTEMPTS") {
        config.trellis.max_poll_attempts = n;
    }

    // Telemetry
    if let Some(v) = env.get("KILN_LOG_LEVEL") {
        config.telemetry.log_level = v;
    }
    // Also support RUST_LOG
    if let Some(v) = env.get("RUST_LOG") {
        config.telemetry.log_level = v;
    }
    if let Some(v) = env.get("KILN_OTLP_ENDPOINT") {
        config.telemetry.otlp_endpoint = v;
    }
    // Also support standard OTEL env var
    if let Some(v) = env.get("OTEL_EXPORTER_OTLP_ENDPOINT") {
        config.telemetry.otlp_endpoint = v;
    }
}

struct Overrides<'a, F> {
    lookup: F,
    applied: &'a mut Vec<String>,
}

impl<F> Overrides<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get<T: FromStr>(&mut self, key: &str) -> Option<T> {
        let value = (self.lookup)(key)?.parse().ok()?;
        self.applied.push(key.to_string());
        Some(value)
    }
}
