//! Error types for the knowledge-base core.
//!
//! Only conditions that callers act on are errors. A missing section or an
//! empty search result is an ordinary `None` / empty `Vec`.

use std::path::PathBuf;

/// Failures raised by the knowledge-base core.
#[derive(Debug, thiserror::Error)]
pub enum KbError {
    /// The knowledge-base directory does not exist. Fatal at startup.
    #[error("knowledge base directory not found: {}", .0.display())]
    KnowledgeBaseNotFound(PathBuf),

    /// A single document could not be read or parsed. The loader logs and
    /// skips these; they never abort a load.
    #[error("failed to parse {}: {reason}", path.display())]
    DocumentParse { path: PathBuf, reason: String },

    /// The generative-model collaborator failed (probe, HTTP, or stream).
    #[error("generation failed: {0}")]
    Generation(String),
}

pub type Result<T> = std::result::Result<T, KbError>;
