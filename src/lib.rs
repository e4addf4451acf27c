//! # KB Assistant
//!
//! A small question-answering assistant over a local directory of
//! documents (markdown, Word, spreadsheet and PDF files), with keyword
//! routing for recurring questions and an LLM fallback for everything else.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌───────────────┐   ┌─────────────┐
//! │   Loader    │──▶│ KnowledgeBase │◀──│  Handlers   │
//! │ md/docx/... │   │  (read-only)  │   │ + Sections  │
//! └─────────────┘   └───────┬───────┘   └──────▲──────┘
//!                           │                  │
//!                           ▼                  │
//!                     ┌──────────┐       ┌─────┴─────┐
//!                     │  Search  │──────▶│  Router   │──▶ Generator (LLM)
//!                     └──────────┘       └───────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! kba topics                              # list loaded documents
//! kba ask "When is the next meeting?"     # one question
//! kba chat                                # conversation loop
//! kba search "dues"                       # raw relevance search
//! kba section handbook "## Dues"          # run the section extractor
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Library error type |
//! | [`models`] | Core data types |
//! | [`extract`] | Text extraction from docx, xlsx and PDF |
//! | [`markdown`] | Markdown to plain text |
//! | [`loader`] | Knowledge-base directory loader |
//! | [`store`] | In-memory document store |
//! | [`section`] | Section extraction with per-format boundaries |
//! | [`schedule`] | Meeting schedule parsing |
//! | [`handlers`] | Keyword-triggered handlers |
//! | [`search`] | Generic relevance search |
//! | [`generate`] | Generative-model collaborator |
//! | [`router`] | Query routing |
//! | [`commands`] | CLI command implementations |

pub mod commands;
pub mod config;
pub mod error;
pub mod extract;
pub mod generate;
pub mod handlers;
pub mod loader;
pub mod markdown;
pub mod models;
pub mod router;
pub mod schedule;
pub mod search;
pub mod section;
pub mod store;
