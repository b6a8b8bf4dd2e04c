//! Flattening of nested JSON locale documents into dot/bracket key paths
//!
//! A document such as `{"auth": {"login": {"title": "Login"}}, "items": [{"name": "A"}]}`
//! yields the entries `auth.login.title = Login` and `items[0].name = A`.
//! Only string leaves produce entries; numbers, booleans, null and empty
//! containers are skipped.

use std::collections::HashMap;
use std::fmt;

use serde_json::Value;

/// One step in a key path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    /// Object member name
    Key(String),
    /// Array element index
    Index(usize),
}

/// Ordered sequence of segments identifying a leaf inside a JSON tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct KeyPath {
    segments: Vec<PathSegment>,
}

impl KeyPath {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    pub fn push(&mut self, segment: PathSegment) {
        self.segments.push(segment);
    }

    pub fn pop(&mut self) -> Option<PathSegment> {
        self.segments.pop()
    }

    /// Renders the path in dot/bracket notation.
    ///
    /// The separator is decided by the rendered prefix, not by the segment
    /// position: an empty member name at the root leaves the prefix empty, so
    /// the next segment is rendered without a leading `.` or brackets.
    pub fn render(&self) -> String {
        let mut rendered = String::new();
        for segment in &self.segments {
            match segment {
                PathSegment::Key(key) => {
                    if !rendered.is_empty() {
                        rendered.push('.');
                    }
                    rendered.push_str(key);
                }
                PathSegment::Index(index) => {
                    if rendered.is_empty() {
                        rendered.push_str(&index.to_string());
                    } else {
                        rendered.push('[');
                        rendered.push_str(&index.to_string());
                        rendered.push(']');
                    }
                }
            }
        }
        rendered
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// A string leaf and the path that leads to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationEntry {
    pub path: KeyPath,
    pub value: String,
}

impl TranslationEntry {
    pub fn key(&self) -> String {
        self.path.render()
    }
}

/// Collects every string leaf of `value` in depth-first visit order.
///
/// Object members are visited in document order.
pub fn flatten_entries(value: &Value) -> Vec<TranslationEntry> {
    let mut entries = Vec::new();
    let mut path = KeyPath::new();
    visit(value, &mut path, &mut entries);
    entries
}

/// Flattens `value` into a `key path -> value` mapping.
///
/// If two branches render to the same key path the later-visited one wins.
pub fn flatten(value: &Value) -> HashMap<String, String> {
    flatten_entries(value)
        .into_iter()
        .map(|entry| (entry.path.render(), entry.value))
        .collect()
}

fn visit(value: &Value, path: &mut KeyPath, entries: &mut Vec<TranslationEntry>) {
    match value {
        Value::Object(members) => {
            for (key, member) in members {
                path.push(PathSegment::Key(key.clone()));
                visit(member, path, entries);
                path.pop();
            }
        }
        Value::Array(elements) => {
            for (index, element) in elements.iter().enumerate() {
                path.push(PathSegment::Index(index));
                visit(element, path, entries);
                path.pop();
            }
        }
        Value::String(text) => entries.push(TranslationEntry {
            path: path.clone(),
            value: text.clone(),
        }),
        Value::Number(_) | Value::Bool(_) | Value::Null => {}
    }
}
