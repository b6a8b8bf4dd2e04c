//! Immutable translation store built from JSON locale sources
//!
//! A store is produced in one go by [`TranslationStore::build`] and never
//! mutated afterwards. Failures on individual files are collected as
//! [`SourceError`] warnings so one broken locale file does not prevent the
//! remaining keys from being served.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, trace, warn};
use walkdir::WalkDir;

use super::flatten::flatten_entries;

/// Staleness threshold used when none is configured (5 minutes).
pub const DEFAULT_STALE_THRESHOLD_MS: u64 = 300_000;

/// Recoverable failure tied to a single source file or directory.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("translation source {} does not exist", .path.display())]
    Missing { path: PathBuf },

    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to scan {}: {source}", .path.display())]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
}

impl SourceError {
    /// The file or directory the failure refers to.
    pub fn path(&self) -> &Path {
        match self {
            SourceError::Missing { path }
            | SourceError::Read { path, .. }
            | SourceError::Parse { path, .. }
            | SourceError::Walk { path, .. } => path,
        }
    }
}

/// Failure that aborts a whole build. The previously published store stays active.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("source enumeration task failed: {0}")]
    Enumeration(#[from] tokio::task::JoinError),
}

/// Result of a build: the new store plus the per-file warnings it produced.
#[derive(Debug)]
pub struct BuildReport {
    pub store: TranslationStore,
    pub warnings: Vec<SourceError>,
    pub files_loaded: usize,
}

/// Flattened `key -> value` snapshot of every configured locale file.
#[derive(Debug, Clone)]
pub struct TranslationStore {
    values: HashMap<String, String>,
    keys: Vec<String>,
    last_update: DateTime<Utc>,
}

impl TranslationStore {
    /// A store with no keys. Its timestamp is the Unix epoch, so it is stale
    /// for any threshold.
    pub fn empty() -> Self {
        Self {
            values: HashMap::new(),
            keys: Vec::new(),
            last_update: DateTime::<Utc>::default(),
        }
    }

    /// Builds a fresh store from the given files and directories.
    ///
    /// Sources are processed in order; within a directory files are visited
    /// sorted by name. Later files overwrite earlier ones on key collision.
    pub async fn build(sources: &[PathBuf]) -> Result<BuildReport, BuildError> {
        let owned = sources.to_vec();
        let (files, mut warnings) =
            tokio::task::spawn_blocking(move || collect_json_files(&owned)).await?;

        debug!("Collected {} JSON files from {} sources", files.len(), sources.len());

        let mut builder = StoreBuilder::new();
        let mut files_loaded = 0;

        for path in files {
            match load_document(&path).await {
                Ok(document) => {
                    builder.add_document(&document);
                    files_loaded += 1;
                    trace!("Loaded translations from {}", path.display());
                }
                Err(e) => {
                    warn!("Skipping translation file: {}", e);
                    warnings.push(e);
                }
            }
        }

        let store = builder.finish();
        info!(
            "Built translation store: {} keys from {} files ({} warnings)",
            store.len(),
            files_loaded,
            warnings.len()
        );

        Ok(BuildReport { store, warnings, files_loaded })
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// All known key paths. Order carries no meaning.
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn last_update(&self) -> DateTime<Utc> {
        self.last_update
    }

    /// Whether more than `threshold_ms` has elapsed since the store was built.
    pub fn is_stale(&self, threshold_ms: u64) -> bool {
        self.is_stale_at(Utc::now(), threshold_ms)
    }

    pub fn is_stale_at(&self, now: DateTime<Utc>, threshold_ms: u64) -> bool {
        let elapsed = (now - self.last_update).num_milliseconds();
        let threshold = i64::try_from(threshold_ms).unwrap_or(i64::MAX);
        elapsed > threshold
    }
}

impl Default for TranslationStore {
    fn default() -> Self {
        Self::empty()
    }
}

/// Accumulates flattened documents, keeping `keys` and `values` in lockstep.
#[derive(Debug, Default)]
pub struct StoreBuilder {
    values: HashMap<String, String>,
    keys: Vec<String>,
}

impl StoreBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges every string leaf of `document`, overwriting existing keys.
    pub fn add_document(&mut self, document: &Value) -> &mut Self {
        for entry in flatten_entries(document) {
            let key = entry.path.render();
            if self.values.insert(key.clone(), entry.value).is_none() {
                self.keys.push(key);
            }
        }
        self
    }

    pub fn finish(self) -> TranslationStore {
        self.finish_at(Utc::now())
    }

    pub fn finish_at(self, last_update: DateTime<Utc>) -> TranslationStore {
        TranslationStore {
            values: self.values,
            keys: self.keys,
            last_update,
        }
    }
}

/// Case-insensitive `.json` extension check.
pub fn is_json_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

/// Expands sources into the ordered list of JSON files to load.
fn collect_json_files(sources: &[PathBuf]) -> (Vec<PathBuf>, Vec<SourceError>) {
    let mut files = Vec::new();
    let mut warnings = Vec::new();

    for source in sources {
        if source.is_dir() {
            for result in WalkDir::new(source).follow_links(true).sort_by_file_name() {
                match result {
                    Ok(entry) => {
                        if entry.file_type().is_file() && is_json_file(entry.path()) {
                            files.push(entry.into_path());
                        }
                    }
                    Err(e) => {
                        let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| source.clone());
                        warn!("Failed to scan translation directory {}: {}", path.display(), e);
                        warnings.push(SourceError::Walk { path, source: e });
                    }
                }
            }
        } else if source.is_file() {
            if is_json_file(source) {
                files.push(source.clone());
            } else {
                debug!("Ignoring non-JSON translation source {}", source.display());
            }
        } else {
            warnings.push(SourceError::Missing { path: source.clone() });
        }
    }

    (files, warnings)
}

async fn load_document(path: &Path) -> Result<Value, SourceError> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| SourceError::Read { path: path.to_path_buf(), source })?;
    serde_json::from_str(&text).map_err(|source| SourceError::Parse { path: path.to_path_buf(), source })
}
