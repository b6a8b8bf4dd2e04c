use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::{Mutex, RwLock};
use tokio::sync::{broadcast, mpsc};
use tower_lsp::Client;
use tower_lsp::lsp_types::MessageType;
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::lsp::features::completion::DetectorOptions;
use crate::translations::{is_json_file, RebuildTicket, StoreHandle, TranslationStore};

mod commands;
mod handlers;
mod state;

pub use commands::{COMMANDS, REFRESH_CACHE, SET_SOURCE_FILES, SHOW_SOURCE_FILES};
pub use state::TranslationBackend;
use state::RebuildReason;

/// Quiet period after the last file event before a batch is processed.
const FILE_EVENT_BATCH_MS: u64 = 100;

impl TranslationBackend {
    /// Creates the backend and spawns the file-event batcher.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(client: Client, config: ServerConfig) -> Self {
        let (file_sender, file_events) = mpsc::unbounded_channel();
        let (shutdown_tx, _) = broadcast::channel::<()>(1);

        let backend = Self {
            client,
            documents: Arc::new(DashMap::new()),
            config: Arc::new(RwLock::new(config)),
            root_dir: Arc::new(RwLock::new(None)),
            store: Arc::new(StoreHandle::default()),
            file_watcher: Arc::new(Mutex::new(None)),
            file_sender,
            shutdown_tx: Arc::new(shutdown_tx),
        };

        Self::spawn_file_watcher(backend.clone(), file_events);

        backend
    }

    /// The currently published translation snapshot.
    pub fn snapshot(&self) -> Arc<TranslationStore> {
        self.store.current()
    }

    fn resolved_sources(&self) -> Vec<PathBuf> {
        let root = self.root_dir.read().clone();
        self.config.read().resolved_sources(root.as_deref())
    }

    fn detector_options(&self) -> DetectorOptions {
        self.config.read().detector_options()
    }

    /// Takes a generation ticket, then reads the sources it will build from.
    /// A newer ticket therefore never carries an older configuration.
    fn prepare_rebuild(&self) -> (RebuildTicket, Vec<PathBuf>) {
        let ticket = self.store.begin_rebuild();
        (ticket, self.resolved_sources())
    }

    /// Rebuilds the store from the configured sources and publishes it.
    ///
    /// Per-file failures are shown as warnings; a failed rebuild keeps the
    /// previous snapshot. Returns the key count of the published store, or
    /// `None` if nothing was published.
    async fn rebuild(&self, reason: RebuildReason) -> Option<usize> {
        let (ticket, sources) = self.prepare_rebuild();
        info!(
            "Rebuilding translation store (generation {}, {}, {} sources)",
            ticket.generation(),
            reason,
            sources.len()
        );

        match TranslationStore::build(&sources).await {
            Ok(report) => {
                for warning in &report.warnings {
                    self.client
                        .show_message(MessageType::WARNING, format!("Skipped translation source: {}", warning))
                        .await;
                }
                let keys = report.store.len();
                if self.store.publish(ticket, report.store) {
                    info!("Published {} translation keys from {} files", keys, report.files_loaded);
                    Some(keys)
                } else {
                    None
                }
            }
            Err(e) => {
                error!("Translation store rebuild failed: {}", e);
                self.client
                    .show_message(
                        MessageType::ERROR,
                        format!("Failed to refresh translation keys, keeping previous keys: {}", e),
                    )
                    .await;
                None
            }
        }
    }

    /// Schedules a background rebuild when the snapshot is older than the
    /// configured threshold. Never waits for the rebuild. Returns whether a
    /// rebuild was scheduled.
    fn refresh_if_stale(&self) -> bool {
        let threshold = self.config.read().stale_threshold_ms;
        if !self.store.current().is_stale(threshold) {
            return false;
        }
        if !self.store.try_claim_background() {
            debug!("Stale snapshot; background rebuild already running");
            return false;
        }

        let backend = self.clone();
        tokio::spawn(async move {
            backend.rebuild(RebuildReason::Stale).await;
            backend.store.release_background();
        });
        true
    }

    /// Replaces the file watcher so it covers the current sources.
    fn rewatch(&self) {
        if !self.config.read().watch {
            *self.file_watcher.lock() = None;
            debug!("File watching disabled");
            return;
        }

        let tx = self.file_sender.clone();
        let mut watcher = match RecommendedWatcher::new(
            move |res| {
                let _ = tx.send(res);
            },
            notify::Config::default(),
        ) {
            Ok(watcher) => watcher,
            Err(e) => {
                warn!("Failed to create file watcher: {}", e);
                return;
            }
        };

        for (path, mode) in watch_targets(&self.resolved_sources()) {
            match watcher.watch(&path, mode) {
                Ok(()) => debug!("Watching {:?} ({:?})", path, mode),
                Err(e) => warn!("Failed to watch {:?}: {}", path, e),
            }
        }

        *self.file_watcher.lock() = Some(watcher);
    }

    /// Spawns the file-event batcher: events are collected until the watcher
    /// has been quiet for FILE_EVENT_BATCH_MS, then one rebuild runs.
    fn spawn_file_watcher(
        backend: TranslationBackend,
        mut file_events: mpsc::UnboundedReceiver<notify::Result<notify::Event>>,
    ) {
        let mut shutdown_rx = backend.shutdown_tx.subscribe();

        tokio::spawn(async move {
            use tokio::time::{sleep, Duration};

            let mut pending_paths: HashSet<PathBuf> = HashSet::new();
            let batch_duration = Duration::from_millis(FILE_EVENT_BATCH_MS);

            loop {
                tokio::select! {
                    event = file_events.recv() => match event {
                        Some(Ok(event)) => {
                            if event.kind.is_access() {
                                continue;
                            }
                            let sources = backend.resolved_sources();
                            for path in event.paths {
                                if is_relevant_change(&path, &sources) {
                                    pending_paths.insert(path);
                                }
                            }
                        }
                        Some(Err(e)) => warn!("File watcher error: {}", e),
                        None => break,
                    },
                    _ = sleep(batch_duration), if !pending_paths.is_empty() => {
                        info!("Processing batch of {} translation file changes", pending_paths.len());
                        pending_paths.clear();
                        backend.rebuild(RebuildReason::FileChange).await;
                    }
                    _ = shutdown_rx.recv() => {
                        info!("File watcher received shutdown signal, exiting gracefully");
                        break;
                    }
                }
            }
            debug!("File watcher task terminated");
        });
    }
}

/// Directories to hand to the watcher for the given sources.
///
/// Directory sources are watched recursively. File sources are watched
/// through their parent directory, since saving by rename replaces the
/// file's inode and a watch on the file itself stops firing.
fn watch_targets(sources: &[PathBuf]) -> Vec<(PathBuf, RecursiveMode)> {
    let mut targets: Vec<(PathBuf, RecursiveMode)> = Vec::new();
    for source in sources {
        let (path, mode) = if source.is_dir() {
            (source.clone(), RecursiveMode::Recursive)
        } else {
            let parent = match source.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
                _ => PathBuf::from("."),
            };
            (parent, RecursiveMode::NonRecursive)
        };

        match targets.iter_mut().find(|(existing, _)| *existing == path) {
            Some(target) => {
                if mode == RecursiveMode::Recursive {
                    target.1 = RecursiveMode::Recursive;
                }
            }
            None => targets.push((path, mode)),
        }
    }
    targets
}

/// Whether a watcher event on `path` affects any of `sources`.
///
/// A file source matches only itself. Under a directory source, JSON files
/// count, as do paths that are no longer regular files (removed or renamed
/// subdirectories).
fn is_relevant_change(path: &Path, sources: &[PathBuf]) -> bool {
    sources.iter().any(|source| {
        path == source || (path.starts_with(source) && (is_json_file(path) || !path.is_file()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::Duration;

    use futures::StreamExt;
    use tempfile::TempDir;
    use tower_lsp::{ClientSocket, LspService};

    fn drain(mut socket: ClientSocket) {
        tokio::spawn(async move { while socket.next().await.is_some() {} });
    }

    #[test]
    fn test_file_sources_are_watched_through_parent() {
        let dir = TempDir::new().unwrap();
        let locales = dir.path().join("locales");
        fs::create_dir(&locales).unwrap();
        let en = dir.path().join("en.json");
        let fr = dir.path().join("fr.json");
        fs::write(&en, "{}").unwrap();

        let targets = watch_targets(&[en, fr, locales.clone()]);
        assert_eq!(
            targets,
            vec![
                (dir.path().to_path_buf(), RecursiveMode::NonRecursive),
                (locales, RecursiveMode::Recursive),
            ]
        );
    }

    #[test]
    fn test_directory_source_upgrades_shared_parent_to_recursive() {
        let dir = TempDir::new().unwrap();
        let en = dir.path().join("en.json");
        fs::write(&en, "{}").unwrap();

        let targets = watch_targets(&[en, dir.path().to_path_buf()]);
        assert_eq!(targets, vec![(dir.path().to_path_buf(), RecursiveMode::Recursive)]);
        assert_eq!(watch_targets(&[PathBuf::from("en.json")]), vec![(PathBuf::from("."), RecursiveMode::NonRecursive)]);
    }

    #[test]
    fn test_relevant_changes_for_file_and_directory_sources() {
        let dir = TempDir::new().unwrap();
        let locales = dir.path().join("locales");
        fs::create_dir_all(locales.join("en")).unwrap();
        fs::write(locales.join("en/notes.txt"), "").unwrap();
        let en = dir.path().join("en.json");
        let sources = vec![en.clone(), locales.clone()];

        assert!(is_relevant_change(&en, &sources));
        assert!(!is_relevant_change(&dir.path().join("other.json"), &sources));
        assert!(!is_relevant_change(&dir.path().join("en.json.tmp"), &sources));
        assert!(is_relevant_change(&locales.join("en/auth.json"), &sources));
        assert!(is_relevant_change(&locales.join("fr"), &sources));
        assert!(!is_relevant_change(&locales.join("en/notes.txt"), &sources));
    }

    #[tokio::test]
    async fn test_newer_ticket_sees_newer_sources() {
        let config = ServerConfig {
            sources: vec![PathBuf::from("/locales/old.json")],
            watch: false,
            ..ServerConfig::default()
        };
        let (service, socket) = LspService::new(|client| TranslationBackend::new(client, config));
        drain(socket);
        let backend = service.inner();

        let (first, first_sources) = backend.prepare_rebuild();
        backend.config.write().sources = vec![PathBuf::from("/locales/new.json")];
        let (second, second_sources) = backend.prepare_rebuild();

        assert!(second > first);
        assert_eq!(first_sources, vec![PathBuf::from("/locales/old.json")]);
        assert_eq!(second_sources, vec![PathBuf::from("/locales/new.json")]);
    }

    #[tokio::test]
    async fn test_stale_snapshot_schedules_one_background_rebuild() {
        let dir = TempDir::new().unwrap();
        let en = dir.path().join("en.json");
        fs::write(&en, r#"{"greeting": "Hello"}"#).unwrap();
        let config = ServerConfig {
            sources: vec![en],
            watch: false,
            ..ServerConfig::default()
        };
        let (service, socket) = LspService::new(|client| TranslationBackend::new(client, config));
        drain(socket);
        let backend = service.inner();

        assert!(backend.refresh_if_stale());
        assert!(!backend.refresh_if_stale());

        tokio::time::timeout(Duration::from_secs(5), async {
            while backend.store.published_generation() == 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("background rebuild should publish");
        assert_eq!(backend.snapshot().get("greeting"), Some("Hello"));

        tokio::time::timeout(Duration::from_secs(5), async {
            while !backend.store.try_claim_background() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("background slot should be released");
        backend.store.release_background();
        assert!(!backend.refresh_if_stale(), "fresh snapshot should not rebuild");
    }
}
