//! Namespace filtering and ordering of translation-key completions
//!
//! Ordering (in order of priority):
//! 1. Exact match with the query
//! 2. Keys starting with the query
//! 3. Locale-style alphabetical order (case-insensitive, lowercase first on ties)

use std::cmp::Ordering;

/// Keeps keys under `namespace` and strips the `namespace.` prefix.
///
/// The namespace key itself, and a bare `namespace.`, are excluded. Without a
/// namespace every key passes through unchanged.
pub fn filter_by_namespace(keys: &[String], namespace: Option<&str>) -> Vec<String> {
    match namespace {
        None => keys.to_vec(),
        Some(namespace) => {
            let prefix = format!("{}.", namespace);
            keys.iter()
                .filter_map(|key| key.strip_prefix(prefix.as_str()))
                .filter(|rest| !rest.is_empty())
                .map(str::to_string)
                .collect()
        }
    }
}

/// Three-way comparison of two display keys against the query token.
pub fn compare(a: &str, b: &str, query: &str) -> Ordering {
    let exact_a = a == query;
    let exact_b = b == query;
    if exact_a != exact_b {
        return if exact_a { Ordering::Less } else { Ordering::Greater };
    }

    let prefix_a = a.starts_with(query);
    let prefix_b = b.starts_with(query);
    if prefix_a != prefix_b {
        return if prefix_a { Ordering::Less } else { Ordering::Greater };
    }

    locale_compare(a, b)
}

/// Alphabetical comparison that ignores case first and puts lowercase before
/// uppercase when two strings differ only in case.
///
/// This approximates a locale collation by comparing lowercased code points,
/// so punctuation and digits keep their ASCII order: `a-b` < `a1` < `a_b`.
/// ICU collation would sort `_` and `-` before digits.
pub fn locale_compare(a: &str, b: &str) -> Ordering {
    let folded_a = a.chars().flat_map(char::to_lowercase);
    let folded_b = b.chars().flat_map(char::to_lowercase);
    folded_a.cmp(folded_b).then_with(|| b.cmp(a))
}

/// Filters `keys` by namespace and orders them for display.
pub fn rank(keys: &[String], namespace: Option<&str>, query: &str) -> Vec<String> {
    let mut candidates = filter_by_namespace(keys, namespace);
    candidates.sort_by(|a, b| compare(a, b, query));
    candidates
}
