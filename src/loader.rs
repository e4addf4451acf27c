//! Knowledge-base directory loader.
//!
//! Scans one directory (non-recursively), converts every recognised file
//! into a [`Document`], and builds the [`KnowledgeBase`]. A file that fails
//! to read or parse is logged and skipped; only a missing directory is
//! fatal.

use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::Path;
use walkdir::WalkDir;

use crate::config::KnowledgeBaseConfig;
use crate::error::{KbError, Result};
use crate::extract::{self, ExtractError};
use crate::markdown;
use crate::models::{Document, DocumentFormat};
use crate::store::KnowledgeBase;

/// Counts from one load, for status output.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LoadReport {
    pub loaded: usize,
    pub replaced: usize,
    pub skipped: usize,
    pub unsupported: usize,
}

/// Loads `directory` with the default include globs and size limit.
pub fn load(directory: &Path) -> Result<KnowledgeBase> {
    let config = KnowledgeBaseConfig {
        dir: directory.to_path_buf(),
        ..KnowledgeBaseConfig::default()
    };
    load_with_report(&config).map(|(kb, _)| kb)
}

/// Loads the configured directory and reports what was loaded or skipped.
pub fn load_with_report(config: &KnowledgeBaseConfig) -> Result<(KnowledgeBase, LoadReport)> {
    let root = &config.dir;
    if !root.is_dir() {
        return Err(KbError::KnowledgeBaseNotFound(root.clone()));
    }

    let include_set = build_globset(&config.include_globs).map_err(|e| KbError::DocumentParse {
        path: root.clone(),
        reason: format!("invalid include glob: {}", e),
    })?;

    let mut paths = Vec::new();
    let walker = WalkDir::new(root).min_depth(1).max_depth(1).sort_by_file_name();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(error = %e, "skipping unreadable directory entry");
                continue;
            }
        };
        if entry.file_type().is_file() {
            paths.push(entry.into_path());
        }
    }

    let mut kb = KnowledgeBase::new();
    let mut report = LoadReport::default();

    for path in paths {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let format = match DocumentFormat::from_path(&path) {
            Some(format) if include_set.is_match(&name) => format,
            _ => {
                tracing::debug!(file = %name, "ignoring unsupported file");
                report.unsupported += 1;
                continue;
            }
        };

        match load_document(&path, format, config.max_file_bytes) {
            Ok(doc) => {
                tracing::debug!(topic = %doc.topic, format = %format, "loaded document");
                if let Some(old) = kb.insert(doc) {
                    tracing::warn!(
                        topic = %old.topic,
                        file = %name,
                        "topic loaded twice; keeping the later file"
                    );
                    report.replaced += 1;
                } else {
                    report.loaded += 1;
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "skipping document");
                report.skipped += 1;
            }
        }
    }

    tracing::info!(
        dir = %root.display(),
        documents = kb.len(),
        skipped = report.skipped,
        "knowledge base loaded"
    );
    Ok((kb, report))
}

/// Reads and normalizes a single file.
pub fn load_document(path: &Path, format: DocumentFormat, max_bytes: u64) -> Result<Document> {
    let parse_error = |reason: String| KbError::DocumentParse {
        path: path.to_path_buf(),
        reason,
    };

    let topic = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| parse_error("file has no stem".to_string()))?;

    let size = std::fs::metadata(path)
        .map_err(|e| parse_error(e.to_string()))?
        .len();
    if size > max_bytes {
        return Err(parse_error(
            ExtractError::TooLarge {
                size,
                limit: max_bytes,
            }
            .to_string(),
        ));
    }

    let bytes = std::fs::read(path).map_err(|e| parse_error(e.to_string()))?;
    let text = extract::extract_text(&bytes, format).map_err(|e| parse_error(e.to_string()))?;

    let rendered_text = match format {
        DocumentFormat::Markdown => markdown::render_plain_text(&text),
        _ => text.clone(),
    };

    Ok(Document {
        topic,
        format,
        raw_content: text,
        rendered_text,
    })
}

fn build_globset(patterns: &[String]) -> std::result::Result<GlobSet, globset::Error> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    builder.build()
}
