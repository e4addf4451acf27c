//! Core data models used throughout the assistant.
//!
//! These types represent the loaded documents, search matches, and
//! conversation turns that flow between the loader, the router, and the
//! generative-model collaborator.

use std::fmt;
use std::path::Path;

/// Source format of a loaded document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Markdown,
    Word,
    Spreadsheet,
    Pdf,
}

impl DocumentFormat {
    /// Maps a file extension (case-insensitive) to a format.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "md" | "markdown" => Some(Self::Markdown),
            "docx" => Some(Self::Word),
            "xlsx" => Some(Self::Spreadsheet),
            "pdf" => Some(Self::Pdf),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Markdown => "markdown",
            Self::Word => "word",
            Self::Spreadsheet => "spreadsheet",
            Self::Pdf => "pdf",
        }
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// A normalized document held in the knowledge base.
///
/// `raw_content` keeps the original form (markdown source, or flattened
/// text for binary formats); `rendered_text` is the plain-text form that
/// generic search scans. For non-markdown formats both are identical.
#[derive(Debug, Clone)]
pub struct Document {
    pub topic: String,
    pub format: DocumentFormat,
    pub raw_content: String,
    pub rendered_text: String,
}

impl Document {
    /// Text the section extractor runs over. Markdown keeps its heading
    /// markers only in the raw form, so that is used for markdown.
    pub fn section_text(&self) -> &str {
        match self.format {
            DocumentFormat::Markdown => &self.raw_content,
            _ => &self.rendered_text,
        }
    }
}

/// A search result. `relevance` is only meaningful relative to other
/// matches from the same search.
#[derive(Debug, Clone, PartialEq)]
pub struct Match {
    pub topic: Option<String>,
    pub content: String,
    pub relevance: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One prior conversation message, supplied by the chat shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}
