//! Backend state management
//!
//! This module defines the TranslationBackend struct, which holds the open
//! documents, the configuration, the published translation snapshot and the
//! file-watching plumbing.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use notify::RecommendedWatcher;
use parking_lot::{Mutex, RwLock};
use tokio::sync::{broadcast, mpsc};
use tower_lsp::Client;
use tower_lsp::lsp_types::Url;

use crate::config::ServerConfig;
use crate::lsp::document::TextDocument;
use crate::translations::StoreHandle;

/// What triggered a store rebuild, for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum RebuildReason {
    Startup,
    Command,
    Configuration,
    FileChange,
    Stale,
}

impl fmt::Display for RebuildReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            RebuildReason::Startup => "startup",
            RebuildReason::Command => "command",
            RebuildReason::Configuration => "configuration change",
            RebuildReason::FileChange => "file change",
            RebuildReason::Stale => "stale snapshot",
        };
        f.write_str(reason)
    }
}

/// The translation-key language server backend.
#[derive(Clone)]
pub struct TranslationBackend {
    pub(super) client: Client,
    pub(super) documents: Arc<DashMap<Url, TextDocument>>,
    pub(super) config: Arc<RwLock<ServerConfig>>,
    pub(super) root_dir: Arc<RwLock<Option<PathBuf>>>,
    pub(super) store: Arc<StoreHandle>,
    pub(super) file_watcher: Arc<Mutex<Option<RecommendedWatcher>>>,
    pub(super) file_sender: mpsc::UnboundedSender<notify::Result<notify::Event>>,
    pub(super) shutdown_tx: Arc<broadcast::Sender<()>>,
}

impl fmt::Debug for TranslationBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TranslationBackend")
            .field("documents_count", &self.documents.len())
            .field("keys", &self.store.current().len())
            .field("generation", &self.store.published_generation())
            .finish()
    }
}
