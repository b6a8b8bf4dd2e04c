//! Context detection for translation-key completion
//!
//! Everything here is a pure function of a text snapshot. The detectors are
//! re-run on every request since the document may change between keystrokes.
//!
//! Three questions are answered:
//! 1. Which namespace is active (`useTranslation("ns")` and friends)?
//! 2. Is the cursor inside the string argument of a translation call?
//! 3. Which dotted key word surrounds the cursor?

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::trace;

/// Tuning knobs for [`detect_namespace`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectorOptions {
    /// Treat the argument of a member call such as `i18n.t("common.ok")` as
    /// a namespace when no `useTranslation` pattern matched. The captured text
    /// is a key, not a namespace; the fallback is kept for compatibility.
    pub member_call_fallback: bool,
}

impl Default for DetectorOptions {
    fn default() -> Self {
        Self { member_call_fallback: true }
    }
}

struct NamespacePattern {
    regex: Regex,
    description: &'static str,
    /// Whether the capture group holds a key rather than a namespace.
    captures_key: bool,
}

impl NamespacePattern {
    fn new(pattern: &str, description: &'static str, captures_key: bool) -> Self {
        Self {
            regex: Regex::new(pattern).expect("failed to compile namespace pattern"),
            description,
            captures_key,
        }
    }

    fn first_capture(&self, text: &str) -> Option<String> {
        self.regex
            .captures(text)
            .and_then(|captures| captures.get(1))
            .map(|m| m.as_str().to_string())
    }
}

/// Namespace patterns in precedence order.
static NAMESPACE_PATTERNS: Lazy<Vec<NamespacePattern>> = Lazy::new(|| {
    vec![
        NamespacePattern::new(
            r#"const\s*\{\s*t\s*\}\s*=\s*useTranslation\(\s*["'`]([^"'`]+)["'`]"#,
            "destructured hook",
            false,
        ),
        NamespacePattern::new(
            r#"const\s+t\s*=\s*useTranslation\(\s*["'`]([^"'`]+)["'`]"#,
            "direct assignment",
            false,
        ),
        NamespacePattern::new(
            r#"useTranslation\(\s*["'`]([^"'`]+)["'`]"#,
            "bare hook call",
            false,
        ),
        NamespacePattern::new(
            r#"useTranslation\(\s*["'`]([^"'`]+)["'`]\s*\)\.t\b"#,
            "chained accessor",
            false,
        ),
        NamespacePattern::new(
            r#"\.(?:t|translate)\(\s*["'`]([^"'`]+)["'`]"#,
            "member call",
            true,
        ),
    ]
});

/// Call-site patterns that put the cursor inside a translation key literal.
/// Each is anchored at the end of the line prefix, so the literal must still
/// be open at the cursor.
static TRIGGER_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r#"\bt\(\s*["'`][^"'`]*$"#,
        r#"\$t\(\s*["'`][^"'`]*$"#,
        r#"\bi18n\.t\(\s*["'`][^"'`]*$"#,
        r#"\.t\(\s*["'`][^"'`]*$"#,
        r#"useTranslation\([^)]*\)\.t\(\s*["'`][^"'`]*$"#,
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("failed to compile trigger pattern"))
    .collect()
});

/// A complete `t("KEY")` call; group 1 is the key.
static HOVER_CALL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?:\$t|\bt)\(\s*["'`]([^"'`]+)["'`]"#).expect("failed to compile hover pattern")
});

/// Infers the active namespace from the source text up to the cursor line.
///
/// Patterns are tried in precedence order; the first one that matches
/// anywhere in `text` wins and its first match supplies the namespace.
pub fn detect_namespace(text: &str, options: &DetectorOptions) -> Option<String> {
    for pattern in NAMESPACE_PATTERNS.iter() {
        if pattern.captures_key && !options.member_call_fallback {
            continue;
        }
        if let Some(namespace) = pattern.first_capture(text) {
            trace!("Namespace {:?} detected via {} pattern", namespace, pattern.description);
            return Some(namespace);
        }
    }
    None
}

/// Whether `line_prefix` (the cursor line up to the cursor) ends inside the
/// key argument of a translation call.
pub fn is_translation_call(line_prefix: &str) -> bool {
    TRIGGER_PATTERNS.iter().any(|regex| regex.is_match(line_prefix))
}

/// Character allowed inside a dotted translation key word.
pub fn is_key_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '-'
}

/// Char-offset range of the key word touching `character`, if any.
pub fn word_range_at(line: &str, character: usize) -> Option<(usize, usize)> {
    let chars: Vec<char> = line.chars().collect();
    let cursor = character.min(chars.len());

    let mut start = cursor;
    while start > 0 && is_key_char(chars[start - 1]) {
        start -= 1;
    }

    let mut end = cursor;
    while end < chars.len() && is_key_char(chars[end]) {
        end += 1;
    }

    (start < end).then_some((start, end))
}

/// Key literal of a translation call, with char offsets within its line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySpan {
    pub key: String,
    pub start: usize,
    pub end: usize,
}

/// Finds the `t("KEY")` call on `line` whose key literal contains the cursor.
pub fn hover_key_at(line: &str, character: usize) -> Option<KeySpan> {
    HOVER_CALL.captures_iter(line).find_map(|captures| {
        let key = captures.get(1)?;
        let start = char_offset(line, key.start());
        let end = char_offset(line, key.end());
        (start <= character && character <= end).then(|| KeySpan {
            key: key.as_str().to_string(),
            start,
            end,
        })
    })
}

fn char_offset(line: &str, byte: usize) -> usize {
    line[..byte].chars().count()
}
