//! Translation-key completion
//!
//! This module provides:
//! - Namespace detection from `useTranslation(...)` call sites
//! - Trigger detection for `t("...")`-style call arguments
//! - Ranking of candidate keys by match quality
//! - Conversion of ranked keys into LSP completion items

pub mod context;
pub mod ranking;

pub use context::{
    detect_namespace, hover_key_at, is_key_char, is_translation_call, word_range_at, DetectorOptions,
    KeySpan,
};
pub use ranking::{compare, filter_by_namespace, locale_compare, rank};

use ropey::Rope;
use tower_lsp::lsp_types::{
    CompletionItem, CompletionItemKind, CompletionTextEdit, Documentation, MarkupContent, MarkupKind,
    Position, Range, TextEdit,
};
use tracing::debug;

use crate::lsp::document::{line_text, text_through_line};
use crate::translations::TranslationStore;

/// Completion items for the cursor at `position`, best match first.
///
/// Returns nothing unless the cursor sits inside the key argument of a
/// translation call.
pub fn completion_items(
    text: &Rope,
    position: Position,
    store: &TranslationStore,
    options: &DetectorOptions,
) -> Vec<CompletionItem> {
    let line_idx = position.line as usize;
    let Some(line) = line_text(text, line_idx) else {
        return Vec::new();
    };
    let character = (position.character as usize).min(line.chars().count());
    let line_prefix: String = line.chars().take(character).collect();

    if !is_translation_call(&line_prefix) {
        debug!("No translation call before {}:{}", position.line, character);
        return Vec::new();
    }

    let namespace = detect_namespace(&namespace_scan_text(text, line_idx, &line_prefix), options);
    let word = word_range_at(&line, character);
    let query: String = match word {
        Some((start, end)) => line.chars().skip(start).take(end - start).collect(),
        None => String::new(),
    };
    let (start, end) = word.unwrap_or((character, character));
    let replace = Range::new(
        Position::new(position.line, start as u32),
        Position::new(position.line, end as u32),
    );

    let ranked = rank(store.keys(), namespace.as_deref(), &query);
    debug!(
        "Ranked {} keys for query {:?} (namespace {:?})",
        ranked.len(),
        query,
        namespace
    );

    ranked
        .into_iter()
        .enumerate()
        .map(|(index, label)| {
            let full_key = match namespace.as_deref() {
                Some(namespace) => format!("{}.{}", namespace, label),
                None => label.clone(),
            };
            let value = store.get(&full_key).unwrap_or_default().to_string();
            completion_item(index, label, &full_key, value, replace)
        })
        .collect()
}

/// Document text up to the opening quote of the key literal at the cursor.
///
/// The literal being typed is left out, so `i18n.t("auth.lo")` never reads its
/// own partial key as a namespace through the member-call pattern.
fn namespace_scan_text(text: &Rope, line_idx: usize, line_prefix: &str) -> String {
    let cut = line_prefix.rfind(['"', '\'', '`']).unwrap_or(line_prefix.len());
    let mut scan = match line_idx.checked_sub(1) {
        Some(previous) => text_through_line(text, previous) + "\n",
        None => String::new(),
    };
    scan.push_str(&line_prefix[..cut]);
    scan
}

/// Label with path separators turned into spaces so clients can match on
/// segment names.
pub fn filter_text(label: &str) -> String {
    label.replace(['.', '['], " ").replace(']', "")
}

fn completion_item(index: usize, label: String, full_key: &str, value: String, range: Range) -> CompletionItem {
    CompletionItem {
        kind: Some(CompletionItemKind::VALUE),
        detail: Some(value.clone()),
        documentation: Some(Documentation::MarkupContent(MarkupContent {
            kind: MarkupKind::Markdown,
            value: format!("`{}`\n\n```text\n{}\n```", full_key, value),
        })),
        filter_text: Some(filter_text(&label)),
        sort_text: Some(format!("{:06}", index)),
        text_edit: Some(CompletionTextEdit::Edit(TextEdit {
            range,
            new_text: label.clone(),
        })),
        label,
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translations::StoreBuilder;
    use serde_json::json;

    fn store() -> TranslationStore {
        let mut builder = StoreBuilder::new();
        builder.add_document(&json!({
            "auth": {"login": {"title": "Login"}, "logout": "Log out"},
            "home": {"title": "Home"}
        }));
        builder.finish()
    }

    fn labels(items: &[CompletionItem]) -> Vec<&str> {
        items.iter().map(|item| item.label.as_str()).collect()
    }

    #[test]
    fn test_completion_outside_call_is_empty() {
        let text = Rope::from_str("const x = \"\"");
        let items = completion_items(&text, Position::new(0, 11), &store(), &DetectorOptions::default());
        assert!(items.is_empty());
    }

    #[test]
    fn test_completion_lists_all_keys_without_namespace() {
        let text = Rope::from_str("t(\"\")");
        let items = completion_items(&text, Position::new(0, 3), &store(), &DetectorOptions::default());
        assert_eq!(labels(&items), vec!["auth.login.title", "auth.logout", "home.title"]);
        assert_eq!(items[0].detail.as_deref(), Some("Login"));
        assert_eq!(items[0].filter_text.as_deref(), Some("auth login title"));
        assert_eq!(items[0].sort_text.as_deref(), Some("000000"));
    }

    #[test]
    fn test_completion_replaces_partial_key() {
        let text = Rope::from_str("t(\"auth.lo\")");
        let items = completion_items(&text, Position::new(0, 10), &store(), &DetectorOptions::default());
        let first = &items[0];
        assert_eq!(first.label, "auth.login.title");
        match &first.text_edit {
            Some(CompletionTextEdit::Edit(edit)) => {
                assert_eq!(edit.range, Range::new(Position::new(0, 3), Position::new(0, 10)));
                assert_eq!(edit.new_text, "auth.login.title");
            }
            other => panic!("unexpected text edit: {:?}", other),
        }
    }

    #[test]
    fn test_completion_strips_namespace() {
        let text = Rope::from_str("const { t } = useTranslation(\"auth\")\nt(\"\")");
        let items = completion_items(&text, Position::new(1, 3), &store(), &DetectorOptions::default());
        assert_eq!(labels(&items), vec!["login.title", "logout"]);
        assert_eq!(items[1].detail.as_deref(), Some("Log out"));
    }

    #[test]
    fn test_member_call_being_typed_is_not_its_own_namespace() {
        let text = Rope::from_str("i18n.t(\"auth.lo\")");
        let items = completion_items(&text, Position::new(0, 15), &store(), &DetectorOptions::default());
        assert_eq!(labels(&items), vec!["auth.login.title", "auth.logout", "home.title"]);
    }

    #[test]
    fn test_earlier_member_call_still_sets_namespace() {
        let text = Rope::from_str("i18n.t(\"auth\")\nt(\"\")");
        let items = completion_items(&text, Position::new(1, 3), &store(), &DetectorOptions::default());
        assert_eq!(labels(&items), vec!["login.title", "logout"]);
    }

    #[test]
    fn test_chained_hook_on_cursor_line_sets_namespace() {
        let text = Rope::from_str("useTranslation(\"auth\").t(\"\")");
        let items = completion_items(&text, Position::new(0, 26), &store(), &DetectorOptions::default());
        assert_eq!(labels(&items), vec!["login.title", "logout"]);
    }

    #[test]
    fn test_filter_text_handles_brackets() {
        assert_eq!(filter_text("items[0].name"), "items 0 name");
        assert_eq!(filter_text("plain"), "plain");
    }
}
