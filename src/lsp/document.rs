use ropey::Rope;

use thiserror::Error;

use tower_lsp::lsp_types::{Position, TextDocumentContentChangeEvent, Url};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DocumentError {
    #[error("version {received} not newer than {current}")]
    StaleVersion { received: i32, current: i32 },
}

/// Text of a document opened by the client.
#[derive(Debug, Clone)]
pub struct TextDocument {
    pub uri: Url,
    pub text: Rope,
    pub version: i32,
}

/// Converts an LSP position to a char index in the Rope, clamped to the text.
fn position_to_char_index(position: &Position, text: &Rope) -> usize {
    let line = (position.line as usize).min(text.len_lines().saturating_sub(1));
    let line_start = text.line_to_char(line);
    let line_len = line_length(text, line);
    line_start + (position.character as usize).min(line_len)
}

/// Number of chars on `line`, excluding the line terminator.
fn line_length(text: &Rope, line: usize) -> usize {
    let slice = text.line(line);
    let mut len = slice.len_chars();
    if len > 0 && slice.char(len - 1) == '\n' {
        len -= 1;
        if len > 0 && slice.char(len - 1) == '\r' {
            len -= 1;
        }
    }
    len
}

/// Text of `line` without its terminator, or `None` past the end of the document.
pub fn line_text(text: &Rope, line: usize) -> Option<String> {
    if line >= text.len_lines() {
        return None;
    }
    let len = line_length(text, line);
    Some(text.line(line).slice(..len).to_string())
}

/// Everything from the start of the document through the end of `line`.
pub fn text_through_line(text: &Rope, line: usize) -> String {
    if text.len_lines() == 0 {
        return String::new();
    }
    let line = line.min(text.len_lines() - 1);
    let end = text.line_to_char(line) + line_length(text, line);
    text.slice(..end).to_string()
}

impl TextDocument {
    pub fn new(uri: Url, text: &str, version: i32) -> Self {
        Self {
            uri,
            text: Rope::from_str(text),
            version,
        }
    }

    /// Applies a list of content changes. Changes with a range are applied
    /// incrementally; a change without one replaces the whole text.
    pub fn apply(
        &mut self,
        changes: Vec<TextDocumentContentChangeEvent>,
        version: i32,
    ) -> Result<(), DocumentError> {
        if version <= self.version {
            return Err(DocumentError::StaleVersion { received: version, current: self.version });
        }
        for change in changes {
            if let Some(range) = change.range {
                let start = position_to_char_index(&range.start, &self.text);
                let end = position_to_char_index(&range.end, &self.text).max(start);
                self.text.remove(start..end);
                self.text.insert(start, &change.text);
            } else {
                self.text = Rope::from_str(&change.text);
            }
        }
        self.version = version;
        Ok(())
    }
}
