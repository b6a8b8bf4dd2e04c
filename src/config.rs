//! Server configuration
//!
//! Layers, lowest precedence first:
//! 1. Built-in defaults
//! 2. `I18N_KEYS_SOURCES` environment variable
//! 3. Command-line flags
//! 4. `initializationOptions` sent with `initialize`
//! 5. `workspace/didChangeConfiguration` settings

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::lsp::features::completion::DetectorOptions;
use crate::translations::{is_json_file, DEFAULT_STALE_THRESHOLD_MS};

/// Environment variable holding a platform path-list of translation sources.
pub const SOURCES_ENV_VAR: &str = "I18N_KEYS_SOURCES";

/// Settings section name used by clients that nest the settings object.
pub const SETTINGS_SECTION: &str = "i18nKeys";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid settings: {0}")]
    Invalid(#[from] serde_json::Error),

    #[error("settings must be a JSON object, got {0}")]
    NotAnObject(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerConfig {
    /// Ordered translation sources: JSON files or directories scanned recursively.
    pub sources: Vec<PathBuf>,
    /// Age after which a request schedules a background rebuild.
    pub stale_threshold_ms: u64,
    /// Rebuild when a watched source changes on disk.
    pub watch: bool,
    /// See [`DetectorOptions::member_call_fallback`].
    pub member_call_fallback: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            stale_threshold_ms: DEFAULT_STALE_THRESHOLD_MS,
            watch: true,
            member_call_fallback: true,
        }
    }
}

/// Partial settings; absent fields keep their current value.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsPatch {
    sources: Option<Vec<PathBuf>>,
    stale_threshold_ms: Option<u64>,
    watch: Option<bool>,
    member_call_fallback: Option<bool>,
}

impl ServerConfig {
    /// Defaults, with sources taken from `I18N_KEYS_SOURCES` if set.
    pub fn from_env_or_default() -> Self {
        let mut config = Self::default();
        if let Some(paths) = std::env::var_os(SOURCES_ENV_VAR) {
            config.sources = std::env::split_paths(&paths)
                .filter(|path| !path.as_os_str().is_empty())
                .collect();
        }
        config
    }

    /// Returns a copy with the fields present in `settings` applied.
    ///
    /// Accepts either the settings object itself or one nested under
    /// `"i18nKeys"`. `null` leaves the configuration unchanged.
    pub fn with_settings(&self, settings: &Value) -> Result<Self, ConfigError> {
        let section = match settings {
            Value::Null => return Ok(self.clone()),
            Value::Object(map) => map.get(SETTINGS_SECTION).unwrap_or(settings),
            other => return Err(ConfigError::NotAnObject(other.to_string())),
        };
        if !section.is_object() {
            return Err(ConfigError::NotAnObject(section.to_string()));
        }

        let patch: SettingsPatch = serde_json::from_value(section.clone())?;
        let mut config = self.clone();
        if let Some(sources) = patch.sources {
            config.sources = sources;
        }
        if let Some(threshold) = patch.stale_threshold_ms {
            config.stale_threshold_ms = threshold;
        }
        if let Some(watch) = patch.watch {
            config.watch = watch;
        }
        if let Some(fallback) = patch.member_call_fallback {
            config.member_call_fallback = fallback;
        }
        Ok(config)
    }

    /// Sources with relative paths resolved against `root`.
    pub fn resolved_sources(&self, root: Option<&Path>) -> Vec<PathBuf> {
        self.sources.iter().map(|source| resolve_path(source, root)).collect()
    }

    pub fn detector_options(&self) -> DetectorOptions {
        DetectorOptions {
            member_call_fallback: self.member_call_fallback,
        }
    }
}

pub fn resolve_path(path: &Path, root: Option<&Path>) -> PathBuf {
    match root {
        Some(root) if path.is_relative() => root.join(path),
        _ => path.to_path_buf(),
    }
}

/// Filters a user selection down to directories and `.json` files,
/// dropping duplicates while keeping the first occurrence.
pub fn normalize_selection<I>(paths: I) -> Vec<PathBuf>
where
    I: IntoIterator<Item = PathBuf>,
{
    let mut seen = HashSet::new();
    paths
        .into_iter()
        .filter(|path| path.is_dir() || is_json_file(path))
        .filter(|path| seen.insert(path.clone()))
        .collect()
}

/// Display names of the configured sources.
pub fn source_basenames(sources: &[PathBuf]) -> Vec<String> {
    sources
        .iter()
        .map(|source| {
            source
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| source.display().to_string())
        })
        .collect()
}
