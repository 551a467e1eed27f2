//! Entity document front matter and the HTML snippets embedded in enriched bodies.
//!
//! An entity document is `---\n` + `key: value` lines + `\n---\n` + body.
//! [`EntityDocument`] reads keys out of that block and supports append-only
//! mutation: new keys go after the existing lines, new `## ` sections go
//! ahead of the existing body, and nothing already present is rewritten.

mod widgets;

use std::fmt::Display;

pub use widgets::{coverage_bar, coverage_color, list_items, symbol_line};

const OPEN: &str = "---\n";
const CLOSE: &str = "\n---\n";

// ---------------------------------------------------------------------------
// EntityDocument
// ---------------------------------------------------------------------------

/// A parsed entity document with pending additions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityDocument {
    block: String,
    body: String,
    appended: Vec<String>,
    sections: Vec<String>,
}

impl EntityDocument {
    /// Split `content` into metadata block and body.
    ///
    /// Returns `None` when the document does not open with `---\n` or has no
    /// closing `\n---\n`.
    pub fn parse(content: &str) -> Option<Self> {
        let rest = content.strip_prefix(OPEN)?;
        let end = rest.find(CLOSE)?;
        Some(Self {
            block: rest[..end].to_string(),
            body: rest[end + CLOSE.len()..].to_string(),
            appended: Vec::new(),
            sections: Vec::new(),
        })
    }

    /// Value of `key`, with surrounding whitespace and quotes trimmed.
    ///
    /// The first line whose trimmed text starts with `key:` wins. Empty values
    /// read as absent.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.lines()
            .find_map(|line| value_of(line, key))
            .filter(|v| !v.is_empty())
    }

    /// Whether any metadata line (original or appended) defines `key`.
    pub fn has_key(&self, key: &str) -> bool {
        self.lines().any(|line| value_of(line, key).is_some())
    }

    /// Append `key: value` unless the key already exists. Returns whether it was added.
    pub fn insert(&mut self, key: &str, value: impl Display) -> bool {
        if self.has_key(key) {
            return false;
        }
        self.appended.push(format!("{key}: {value}"));
        true
    }

    /// Append `key: "value"` unless the key already exists.
    pub fn insert_quoted(&mut self, key: &str, value: &str) -> bool {
        self.insert(key, format_args!("\"{value}\""))
    }

    /// Queue a level-2 section to be placed before the existing body.
    ///
    /// Sections keep the order they were added in.
    pub fn add_section(&mut self, heading: &str, content: &str) {
        self.sections.push(format!("## {heading}\n\n{content}"));
    }

    pub fn is_modified(&self) -> bool {
        !self.appended.is_empty() || !self.sections.is_empty()
    }

    /// Number of metadata lines added since parsing.
    pub fn added_keys(&self) -> usize {
        self.appended.len()
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    /// Serialize. An unmodified document renders byte-for-byte as parsed.
    pub fn render(&self) -> String {
        let mut out = String::with_capacity(
            OPEN.len() + self.block.len() + CLOSE.len() + self.body.len() + 256,
        );
        out.push_str(OPEN);
        out.push_str(&self.block);
        if !self.appended.is_empty() {
            if !self.block.is_empty() {
                out.push('\n');
            }
            out.push_str(&self.appended.join("\n"));
        }
        out.push_str(CLOSE);
        if !self.sections.is_empty() {
            out.push_str(&self.sections.join("\n\n"));
            out.push_str("\n\n");
        }
        out.push_str(&self.body);
        out
    }

    fn lines(&self) -> impl Iterator<Item = &str> {
        self.block
            .split('\n')
            .chain(self.appended.iter().map(String::as_str))
    }
}

fn value_of<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    let value = line.trim().strip_prefix(key)?.strip_prefix(':')?;
    Some(value.trim().trim_matches(|c| c == '"' || c == '\''))
}
