//! Generic relevance search over every loaded document.
//!
//! Each document's rendered text is split into blank-line separated
//! paragraphs. A paragraph is a candidate when it contains the whole
//! lower-cased query as a substring, and is scored by match density:
//!
//! ```text
//! relevance = occurrences(query, paragraph) / chars(paragraph)
//! ```
//!
//! Only the best paragraph per document is kept. Results are sorted by
//! descending relevance; the sort is stable, so equal scores keep the
//! knowledge base's load order.
//!
//! The score favours very short paragraphs that mention the query once
//! over longer ones with more context. There is no length floor.

use crate::models::Match;
use crate::store::KnowledgeBase;

/// Searches all documents for `query`. An empty result is not an error.
pub fn search(kb: &KnowledgeBase, query: &str) -> Vec<Match> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return Vec::new();
    }

    let mut matches: Vec<Match> = kb
        .documents()
        .filter_map(|doc| {
            best_paragraph(&doc.rendered_text, &needle).map(|(content, relevance)| Match {
                topic: Some(doc.topic.clone()),
                content: content.to_string(),
                relevance,
            })
        })
        .collect();

    matches.sort_by(|a, b| {
        b.relevance
            .partial_cmp(&a.relevance)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    matches
}

/// The highest-density paragraph containing `needle` (already lower-case).
/// The first paragraph wins ties.
fn best_paragraph<'a>(text: &'a str, needle: &str) -> Option<(&'a str, f64)> {
    let mut best: Option<(&str, f64)> = None;
    for para in paragraphs(text) {
        let score = relevance(para, needle);
        if score <= 0.0 {
            continue;
        }
        if best.map_or(true, |(_, top)| score > top) {
            best = Some((para, score));
        }
    }
    best
}

/// Blank-line separated blocks, trimmed, empty blocks dropped.
pub fn paragraphs(text: &str) -> impl Iterator<Item = &str> {
    text.split("\n\n").map(str::trim).filter(|p| !p.is_empty())
}

/// Non-overlapping occurrences of `needle` per character of `para`.
pub fn relevance(para: &str, needle: &str) -> f64 {
    let chars = para.chars().count();
    if chars == 0 || needle.is_empty() {
        return 0.0;
    }
    let occurrences = para.to_lowercase().matches(needle).count();
    occurrences as f64 / chars as f64
}

/// Joins the top `k` match contents into a context block.
pub fn context_block(matches: &[Match], k: usize) -> String {
    matches
        .iter()
        .take(k)
        .map(|m| m.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}
