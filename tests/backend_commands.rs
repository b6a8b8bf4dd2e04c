//! Backend tests driving the language server in-process
//!
//! Tests verify:
//! - Startup builds a snapshot from sources relative to the workspace root
//! - i18nKeys.setSourceFiles filters, dedupes and rebuilds
//! - i18nKeys.refreshCache reports the new key count
//! - Skipped files surface as WARNING messages
//! - Invalid settings are rejected and leave the previous state in place

use std::fs;
use std::time::Duration;

use futures::StreamExt;
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::sync::mpsc;
use tower_lsp::lsp_types::notification::{Notification, ShowMessage};
use tower_lsp::lsp_types::{
    DidChangeConfigurationParams, ExecuteCommandParams, InitializeParams, InitializedParams, MessageType,
    ShowMessageParams, Url,
};
use tower_lsp::{ClientSocket, LanguageServer, LspService};

use i18n_keys_language_server::config::ServerConfig;
use i18n_keys_language_server::lsp::backend::{
    TranslationBackend, REFRESH_CACHE, SET_SOURCE_FILES, SHOW_SOURCE_FILES,
};

struct TestServer {
    dir: TempDir,
    service: LspService<TranslationBackend>,
    messages: mpsc::UnboundedReceiver<ShowMessageParams>,
}

/// Forwards every `window/showMessage` notification sent to the client.
fn collect_messages(mut socket: ClientSocket) -> mpsc::UnboundedReceiver<ShowMessageParams> {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        while let Some(request) = socket.next().await {
            if request.method() != ShowMessage::METHOD {
                continue;
            }
            let params = request.params().cloned().unwrap_or(Value::Null);
            if let Ok(message) = serde_json::from_value::<ShowMessageParams>(params) {
                let _ = tx.send(message);
            }
        }
    });
    rx
}

impl TestServer {
    fn new(config: ServerConfig) -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let config = ServerConfig { watch: false, ..config };
        let (service, socket) = LspService::new(|client| TranslationBackend::new(client, config));
        Self {
            dir,
            service,
            messages: collect_messages(socket),
        }
    }

    fn backend(&self) -> &TranslationBackend {
        self.service.inner()
    }

    fn write(&self, name: &str, contents: &str) {
        let path = self.dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create directory");
        }
        fs::write(path, contents).expect("Failed to write file");
    }

    #[allow(deprecated)]
    async fn start(&self, initialization_options: Option<Value>) {
        let params = InitializeParams {
            root_uri: Some(Url::from_file_path(self.dir.path()).expect("Temp dir should be absolute")),
            initialization_options,
            ..Default::default()
        };
        self.backend().initialize(params).await.expect("Initialize should succeed");
        self.backend().initialized(InitializedParams {}).await;
    }

    async fn command(&self, command: &str, arguments: Vec<Value>) -> Value {
        let params = ExecuteCommandParams {
            command: command.to_string(),
            arguments,
            work_done_progress_params: Default::default(),
        };
        self.backend()
            .execute_command(params)
            .await
            .expect("Command should succeed")
            .expect("Command should return a value")
    }

    async fn next_message(&mut self) -> ShowMessageParams {
        tokio::time::timeout(Duration::from_secs(5), self.messages.recv())
            .await
            .expect("Timed out waiting for showMessage")
            .expect("Message channel closed")
    }
}

#[tokio::test]
async fn test_startup_builds_snapshot_from_relative_sources() {
    let config = ServerConfig {
        sources: vec!["locales".into()],
        ..ServerConfig::default()
    };
    let server = TestServer::new(config);
    server.write("locales/en/common.json", r#"{"common": {"ok": "OK"}}"#);

    server.start(Some(json!({"staleThresholdMs": 60000}))).await;

    let store = server.backend().snapshot();
    assert_eq!(store.get("common.ok"), Some("OK"));
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn test_set_source_files_filters_dedupes_and_rebuilds() {
    let mut server = TestServer::new(ServerConfig::default());
    server.write("en.json", r#"{"home": {"title": "Home"}}"#);
    server.write("notes.txt", "not a locale");
    server.write("locales/fr.json", r#"{"menu": {"open": "Ouvrir"}}"#);
    server.start(None).await;
    assert!(server.backend().snapshot().is_empty());

    let result = server
        .command(SET_SOURCE_FILES, vec![json!(["en.json", "notes.txt"]), json!("locales"), json!("en.json")])
        .await;
    assert_eq!(result, json!({"sources": ["en.json", "locales"], "keys": 2}));

    let store = server.backend().snapshot();
    assert_eq!(store.get("home.title"), Some("Home"));
    assert_eq!(store.get("menu.open"), Some("Ouvrir"));

    let shown = server.command(SHOW_SOURCE_FILES, vec![]).await;
    assert_eq!(shown, json!(["en.json", "locales"]));
    let message = server.next_message().await;
    assert_eq!(message.typ, MessageType::INFO);
    assert_eq!(message.message, "Translation sources: en.json, locales");
}

#[tokio::test]
async fn test_refresh_cache_reports_new_key_count() {
    let server = TestServer::new(ServerConfig::default());
    server.write("en.json", r#"{"greeting": "Hello"}"#);
    server.start(None).await;
    server.command(SET_SOURCE_FILES, vec![json!("en.json")]).await;

    server.write("en.json", r#"{"greeting": "Hello", "farewell": "Bye"}"#);
    let result = server.command(REFRESH_CACHE, vec![]).await;

    assert_eq!(result, json!({"keys": 2}));
    assert_eq!(server.backend().snapshot().get("farewell"), Some("Bye"));
}

#[tokio::test]
async fn test_skipped_source_is_shown_as_warning() {
    let mut server = TestServer::new(ServerConfig::default());
    server.write("good.json", r#"{"home": {"title": "Home"}}"#);
    server.write("bad.json", r#"{"home": "#);
    server.start(None).await;

    let result = server.command(SET_SOURCE_FILES, vec![json!(["good.json", "bad.json"])]).await;
    assert_eq!(result["keys"], json!(1));

    let message = server.next_message().await;
    assert_eq!(message.typ, MessageType::WARNING);
    assert!(message.message.contains("bad.json"), "got {:?}", message.message);
    assert_eq!(server.backend().snapshot().get("home.title"), Some("Home"));
}

#[tokio::test]
async fn test_invalid_configuration_keeps_previous_settings_and_keys() {
    let mut server = TestServer::new(ServerConfig::default());
    server.write("en.json", r#"{"greeting": "Hello"}"#);
    server.write("locales/fr.json", r#"{"salut": "Bonjour"}"#);
    server.start(None).await;
    server.command(SET_SOURCE_FILES, vec![json!("en.json")]).await;

    server
        .backend()
        .did_change_configuration(DidChangeConfigurationParams {
            settings: json!({"i18nKeys": {"sources": "locales"}}),
        })
        .await;

    let message = server.next_message().await;
    assert_eq!(message.typ, MessageType::ERROR);
    assert_eq!(server.backend().snapshot().get("greeting"), Some("Hello"));
    assert_eq!(server.command(SHOW_SOURCE_FILES, vec![]).await, json!(["en.json"]));
    assert_eq!(server.next_message().await.typ, MessageType::INFO);

    server
        .backend()
        .did_change_configuration(DidChangeConfigurationParams {
            settings: json!({"i18nKeys": {"sources": ["locales"]}}),
        })
        .await;

    let store = server.backend().snapshot();
    assert_eq!(store.get("salut"), Some("Bonjour"));
    assert_eq!(store.get("greeting"), None);
}
