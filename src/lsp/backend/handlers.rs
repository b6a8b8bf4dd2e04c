//! LSP protocol handler implementations
//!
//! This module contains the `tower_lsp::LanguageServer` implementation for
//! the translation backend:
//! - Lifecycle handlers (initialize, initialized, shutdown)
//! - Document lifecycle (did_open, did_change, did_close)
//! - Configuration and file notifications
//! - Information providers (completion, hover)
//! - Commands (execute_command)

use serde_json::Value;
use tower_lsp::{LanguageServer, jsonrpc};
use tower_lsp::lsp_types::{
    CompletionOptions, CompletionParams, CompletionResponse, DidChangeConfigurationParams,
    DidChangeTextDocumentParams, DidChangeWatchedFilesParams, DidCloseTextDocumentParams,
    DidOpenTextDocumentParams, ExecuteCommandOptions, ExecuteCommandParams, Hover, HoverParams,
    HoverProviderCapability, InitializeParams, InitializeResult, InitializedParams, MessageType,
    ServerCapabilities, ServerInfo, TextDocumentSyncCapability, TextDocumentSyncKind,
};
use tower_lsp::jsonrpc::Result as LspResult;
use tracing::{debug, error, info, warn};

use super::commands::COMMANDS;
use super::state::{RebuildReason, TranslationBackend};
use crate::lsp::document::TextDocument;
use crate::lsp::features::{completion_items, hover};
use crate::translations::is_json_file;

#[tower_lsp::async_trait]
impl LanguageServer for TranslationBackend {
    /// Handles the LSP initialize request: records the workspace root and
    /// applies `initializationOptions` on top of the startup configuration.
    async fn initialize(&self, params: InitializeParams) -> jsonrpc::Result<InitializeResult> {
        info!("Received initialize from {:?}", params.client_info.as_ref().map(|c| &c.name));

        let root = params
            .root_uri
            .as_ref()
            .and_then(|uri| uri.to_file_path().ok())
            .or_else(|| {
                params
                    .workspace_folders
                    .as_ref()
                    .and_then(|folders| folders.first())
                    .and_then(|folder| folder.uri.to_file_path().ok())
            });
        if root.is_none() {
            debug!("No file-system workspace root; relative sources resolve against the process directory");
        }
        *self.root_dir.write() = root;

        if let Some(options) = params.initialization_options.as_ref() {
            let updated = self.config.read().with_settings(options);
            match updated {
                Ok(config) => *self.config.write() = config,
                Err(e) => warn!("Ignoring invalid initializationOptions: {}", e),
            }
        }

        Ok(InitializeResult {
            capabilities: ServerCapabilities {
                text_document_sync: Some(TextDocumentSyncCapability::Kind(TextDocumentSyncKind::INCREMENTAL)),
                completion_provider: Some(CompletionOptions {
                    trigger_characters: Some(
                        ["\"", "'", "`", "."].iter().map(|c| c.to_string()).collect(),
                    ),
                    resolve_provider: Some(false),
                    ..Default::default()
                }),
                hover_provider: Some(HoverProviderCapability::Simple(true)),
                execute_command_provider: Some(ExecuteCommandOptions {
                    commands: COMMANDS.iter().map(|c| c.to_string()).collect(),
                    work_done_progress_options: Default::default(),
                }),
                ..Default::default()
            },
            server_info: Some(ServerInfo {
                name: env!("CARGO_PKG_NAME").to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
        })
    }

    /// Builds the first snapshot and starts watching the sources.
    async fn initialized(&self, _params: InitializedParams) {
        info!("Initialized");
        self.rewatch();
        self.rebuild(RebuildReason::Startup).await;
    }

    async fn shutdown(&self) -> jsonrpc::Result<()> {
        info!("Received shutdown request");
        let _ = self.shutdown_tx.send(());
        *self.file_watcher.lock() = None;
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let item = params.text_document;
        debug!("Opening document: URI={}, version={}", item.uri, item.version);
        self.documents
            .insert(item.uri.clone(), TextDocument::new(item.uri, &item.text, item.version));
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        let uri = params.text_document.uri;
        let version = params.text_document.version;
        match self.documents.get_mut(&uri) {
            Some(mut document) => {
                if let Err(e) = document.apply(params.content_changes, version) {
                    warn!("Failed to apply changes to {}: {}", uri, e);
                }
            }
            None => warn!("Failed to find document with URI={}", uri),
        }
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        let uri = params.text_document.uri;
        if self.documents.remove(&uri).is_none() {
            warn!("Failed to find document with URI={}", uri);
        }
    }

    /// Applies new settings; invalid settings leave the current configuration
    /// and snapshot in place.
    async fn did_change_configuration(&self, params: DidChangeConfigurationParams) {
        let updated = self.config.read().with_settings(&params.settings);
        let config = match updated {
            Ok(config) => config,
            Err(e) => {
                error!("Rejected configuration change: {}", e);
                self.client
                    .show_message(MessageType::ERROR, format!("Invalid translation settings: {}", e))
                    .await;
                return;
            }
        };

        let changed = {
            let mut current = self.config.write();
            let changed = *current != config;
            *current = config;
            changed
        };
        if changed {
            self.rewatch();
            self.rebuild(RebuildReason::Configuration).await;
        }
    }

    /// Client-side file watching; rebuilds once per notification batch.
    async fn did_change_watched_files(&self, params: DidChangeWatchedFilesParams) {
        let relevant = params.changes.iter().any(|change| {
            change
                .uri
                .to_file_path()
                .map(|path| is_json_file(&path))
                .unwrap_or(false)
        });
        if relevant {
            self.rebuild(RebuildReason::FileChange).await;
        }
    }

    async fn completion(&self, params: CompletionParams) -> LspResult<Option<CompletionResponse>> {
        let uri = params.text_document_position.text_document.uri;
        let position = params.text_document_position.position;
        debug!("Completion request at {}:{:?}", uri, position);

        self.refresh_if_stale();

        let Some(text) = self.documents.get(&uri).map(|document| document.text.clone()) else {
            debug!("Document not found: {}", uri);
            return Ok(None);
        };

        let store = self.snapshot();
        let items = completion_items(&text, position, &store, &self.detector_options());
        debug!("Returning {} completion items", items.len());

        if items.is_empty() {
            Ok(None)
        } else {
            Ok(Some(CompletionResponse::Array(items)))
        }
    }

    async fn hover(&self, params: HoverParams) -> LspResult<Option<Hover>> {
        let uri = params.text_document_position_params.text_document.uri;
        let position = params.text_document_position_params.position;
        debug!("Hover request at {}:{:?}", uri, position);

        self.refresh_if_stale();

        let Some(text) = self.documents.get(&uri).map(|document| document.text.clone()) else {
            debug!("Document not found: {}", uri);
            return Ok(None);
        };

        let store = self.snapshot();
        Ok(hover(&text, position, &store, &self.detector_options()))
    }

    async fn execute_command(&self, params: ExecuteCommandParams) -> LspResult<Option<Value>> {
        info!("Executing command {}", params.command);
        self.run_command(&params.command, &params.arguments).await
    }
}
