//! `workspace/executeCommand` support
//!
//! The editor side owns the pickers and the persistent settings; the server
//! receives the selected paths as command arguments.

use std::path::PathBuf;

use serde_json::{json, Value};
use tower_lsp::jsonrpc;
use tower_lsp::lsp_types::MessageType;
use tracing::info;

use super::state::{RebuildReason, TranslationBackend};
use crate::config::{normalize_selection, resolve_path, source_basenames};

pub const SET_SOURCE_FILES: &str = "i18nKeys.setSourceFiles";
pub const SHOW_SOURCE_FILES: &str = "i18nKeys.showSourceFiles";
pub const REFRESH_CACHE: &str = "i18nKeys.refreshCache";

pub const COMMANDS: [&str; 3] = [SET_SOURCE_FILES, SHOW_SOURCE_FILES, REFRESH_CACHE];

/// Collects path arguments given either as separate strings or as one array.
pub(super) fn path_arguments(arguments: &[Value]) -> jsonrpc::Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for argument in arguments {
        match argument {
            Value::String(path) => paths.push(PathBuf::from(path)),
            Value::Array(items) => paths.extend(path_arguments(items)?),
            other => {
                return Err(jsonrpc::Error::invalid_params(format!(
                    "expected a path or an array of paths, got {}",
                    other
                )));
            }
        }
    }
    Ok(paths)
}

impl TranslationBackend {
    pub(super) async fn run_command(&self, command: &str, arguments: &[Value]) -> jsonrpc::Result<Option<Value>> {
        match command {
            SET_SOURCE_FILES => self.set_source_files(arguments).await,
            SHOW_SOURCE_FILES => Ok(Some(self.show_source_files().await)),
            REFRESH_CACHE => {
                let keys = self.rebuild(RebuildReason::Command).await.unwrap_or_else(|| self.snapshot().len());
                Ok(Some(json!({ "keys": keys })))
            }
            other => Err(jsonrpc::Error::invalid_params(format!("unknown command {}", other))),
        }
    }

    async fn set_source_files(&self, arguments: &[Value]) -> jsonrpc::Result<Option<Value>> {
        let root = self.root_dir.read().clone();
        let selection = path_arguments(arguments)?
            .into_iter()
            .map(|path| resolve_path(&path, root.as_deref()));
        let sources = normalize_selection(selection);
        info!("Setting {} translation sources", sources.len());

        let names = source_basenames(&sources);
        self.config.write().sources = sources;
        self.rewatch();

        let keys = self.rebuild(RebuildReason::Command).await.unwrap_or_else(|| self.snapshot().len());
        Ok(Some(json!({ "sources": names, "keys": keys })))
    }

    async fn show_source_files(&self) -> Value {
        let names = source_basenames(&self.config.read().sources);
        let message = if names.is_empty() {
            "No translation sources configured".to_string()
        } else {
            format!("Translation sources: {}", names.join(", "))
        };
        self.client.show_message(MessageType::INFO, message).await;
        json!(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_arguments_accept_strings_and_arrays() {
        let args = vec![json!("a.json"), json!(["b.json", "locales"])];
        assert_eq!(
            path_arguments(&args).unwrap(),
            vec![PathBuf::from("a.json"), PathBuf::from("b.json"), PathBuf::from("locales")]
        );
    }

    #[test]
    fn test_path_arguments_reject_other_values() {
        assert!(path_arguments(&[json!(42)]).is_err());
        assert!(path_arguments(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_command_names_are_unique() {
        let mut names = COMMANDS.to_vec();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), COMMANDS.len());
    }
}
