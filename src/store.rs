//! In-memory, read-only document store.
//!
//! Built once by the [`loader`](crate::loader) and then shared by reference
//! with the router and handlers. Documents keep their load order, which is
//! the tie-break order for search results.

use std::collections::HashMap;

use crate::models::Document;
use crate::section;

/// The loaded knowledge base, keyed by topic.
#[derive(Debug, Default)]
pub struct KnowledgeBase {
    docs: Vec<Document>,
    index: HashMap<String, usize>,
}

impl KnowledgeBase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a document. A document with the same topic is replaced in
    /// place, so the last one loaded wins and keeps the original position.
    pub fn insert(&mut self, doc: Document) -> Option<Document> {
        match self.index.get(&doc.topic) {
            Some(&pos) => Some(std::mem::replace(&mut self.docs[pos], doc)),
            None => {
                self.index.insert(doc.topic.clone(), self.docs.len());
                self.docs.push(doc);
                None
            }
        }
    }

    pub fn get(&self, topic: &str) -> Option<&Document> {
        self.index.get(topic).map(|&pos| &self.docs[pos])
    }

    /// Documents in load order.
    pub fn documents(&self) -> impl Iterator<Item = &Document> {
        self.docs.iter()
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// Original-format content for a topic, or `""` when unknown.
    pub fn topic_content(&self, topic: &str) -> &str {
        self.get(topic).map(|d| d.raw_content.as_str()).unwrap_or("")
    }

    /// Documents to consult for a handler: the preferred topic first (when
    /// loaded), then every other document in load order.
    pub fn preferred_order<'a>(&'a self, preferred: &str) -> Vec<&'a Document> {
        let mut ordered: Vec<&Document> = Vec::with_capacity(self.docs.len());
        if let Some(doc) = self.get(preferred) {
            ordered.push(doc);
        }
        ordered.extend(self.docs.iter().filter(|d| d.topic != preferred));
        ordered
    }

    /// Extracts `label` from the first document that has it, looking at
    /// `preferred` first. Each document uses its own format's boundaries.
    pub fn find_section(&self, label: &str, preferred: &str) -> Option<String> {
        self.preferred_order(preferred).into_iter().find_map(|doc| {
            section::extract(
                doc.section_text(),
                label,
                section::boundaries_for(doc.format),
            )
        })
    }
}
