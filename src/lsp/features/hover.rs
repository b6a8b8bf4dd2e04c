//! Hover previews of translation values

use ropey::Rope;
use tower_lsp::lsp_types::{Hover, HoverContents, MarkupContent, MarkupKind, Position, Range};
use tracing::debug;

use crate::lsp::document::{line_text, text_through_line};
use crate::lsp::features::completion::{detect_namespace, hover_key_at, DetectorOptions};
use crate::translations::TranslationStore;

/// Resolves the key literal under the cursor to its translation value.
///
/// With an active namespace `ns`, `ns.KEY` is tried first and the bare `KEY`
/// second, so fully qualified keys still resolve inside a namespaced file.
pub fn hover(
    text: &Rope,
    position: Position,
    store: &TranslationStore,
    options: &DetectorOptions,
) -> Option<Hover> {
    let line_idx = position.line as usize;
    let line = line_text(text, line_idx)?;
    let span = hover_key_at(&line, position.character as usize)?;

    let namespace = detect_namespace(&text_through_line(text, line_idx), options);
    let (key, value) = resolve(store, namespace.as_deref(), &span.key)?;
    debug!("Hover resolved {:?} to {:?}", span.key, key);

    Some(Hover {
        contents: HoverContents::Markup(MarkupContent {
            kind: MarkupKind::Markdown,
            value: format!("```text\n{}\n```\n\n`{}`", value, key),
        }),
        range: Some(Range::new(
            Position::new(position.line, span.start as u32),
            Position::new(position.line, span.end as u32),
        )),
    })
}

fn resolve<'s>(store: &'s TranslationStore, namespace: Option<&str>, key: &str) -> Option<(String, &'s str)> {
    if let Some(namespace) = namespace {
        let qualified = format!("{}.{}", namespace, key);
        if let Some(value) = store.get(&qualified) {
            return Some((qualified, value));
        }
    }
    store.get(key).map(|value| (key.to_string(), value))
}
