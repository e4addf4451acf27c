//! Query routing.
//!
//! One query runs through three stages, strictly in order:
//!
//! 1. **Specialized handlers**: the first matching trigger in
//!    [`handlers::RULES`] answers directly from extracted text. No model call
//!    follows.
//! 2. **Generic relevance search**: the top `context_k` matches become the
//!    context block for the model.
//! 3. **Generation**: the configured [`Generator`] is called with a
//!    constrained system prompt and a bounded window of prior turns.
//!
//! A query with no trigger, no search match and no prior turns gets a fixed
//! "no information" reply without touching the model.
//!
//! The router never surfaces errors to the caller. Generation failures are
//! logged and replaced by [`FAILURE_MESSAGE`].

use chrono::{Local, NaiveDateTime};

use crate::config::{Config, HandlersConfig, RoutingConfig};
use crate::generate::{GenerationRequest, Generator, TokenStream};
use crate::handlers::{self, HandlerContext, HandlerOutcome};
use crate::models::Turn;
use crate::search;
use crate::store::KnowledgeBase;

/// Shown when the model call fails before or during streaming.
pub const FAILURE_MESSAGE: &str =
    "Sorry, I couldn't reach the answer service right now. Please try again later.";

const NO_INFO_PREFIX: &str = "Apologies, I'm not trained on that information just yet.";

const SYSTEM_PROMPT: &str = "You are a friendly assistant for chapter and national policies, \
events and membership. Answer clearly and concisely using only the information in the context \
below. If the context does not answer the question, reply exactly: \"Apologies, I'm not trained \
on that information just yet.\" Never make up information and never answer questions outside \
the provided context.";

/// Text answers arrive whole; generated answers arrive as fragments.
pub enum Answer {
    Text(String),
    Stream(Box<dyn Iterator<Item = String>>),
}

impl Answer {
    /// Drains a streamed answer into one string.
    pub fn into_text(self) -> String {
        match self {
            Answer::Text(text) => text,
            Answer::Stream(tokens) => tokens.collect(),
        }
    }
}

impl std::fmt::Debug for Answer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Answer::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Answer::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

pub struct Router<'a> {
    kb: &'a KnowledgeBase,
    generator: &'a dyn Generator,
    routing: RoutingConfig,
    handlers: HandlersConfig,
    temperature: f32,
}

impl<'a> Router<'a> {
    pub fn new(kb: &'a KnowledgeBase, generator: &'a dyn Generator, config: &Config) -> Self {
        Self {
            kb,
            generator,
            routing: config.routing.clone(),
            handlers: config.handlers.clone(),
            temperature: config.generation.temperature,
        }
    }

    /// Answers `query` against the local clock.
    pub fn answer(&self, query: &str, history: &[Turn]) -> Answer {
        self.answer_at(query, history, Local::now().naive_local())
    }

    /// Answers `query` as if the current time were `now`.
    pub fn answer_at(&self, query: &str, history: &[Turn], now: NaiveDateTime) -> Answer {
        let lower = query.to_lowercase();

        if let Some(kind) = handlers::route(&lower) {
            let ctx = HandlerContext {
                kb: self.kb,
                config: &self.handlers,
                query: &lower,
                now,
            };
            match kind.run(&ctx) {
                HandlerOutcome::Found(text) => {
                    tracing::debug!(handler = kind.name(), "answered by handler");
                    return Answer::Text(normalize_bullets(&text));
                }
                HandlerOutcome::Missing(text) if !self.routing.fallthrough_on_handler_miss => {
                    tracing::debug!(handler = kind.name(), "handler found nothing");
                    return Answer::Text(normalize_bullets(&text));
                }
                HandlerOutcome::Missing(_) => {
                    tracing::debug!(handler = kind.name(), "handler found nothing; searching");
                }
            }
        }

        let matches = search::search(self.kb, query);
        if matches.is_empty() && history.is_empty() {
            tracing::debug!("no context and no history; skipping generation");
            return Answer::Text(no_info_message(&self.handlers.contact));
        }

        let context = search::context_block(&matches, self.routing.context_k);
        tracing::debug!(
            matches = matches.len(),
            context_chars = context.len(),
            "delegating to generator"
        );
        self.generate(query, history, &context)
    }

    fn generate(&self, query: &str, history: &[Turn], context: &str) -> Answer {
        let system_prompt = system_prompt(context);
        let skip = history.len().saturating_sub(self.routing.history_window);
        let mut messages: Vec<Turn> = history[skip..].to_vec();
        messages.push(Turn::user(query));

        let request = GenerationRequest {
            system_prompt: &system_prompt,
            messages: &messages,
            temperature: self.temperature,
        };
        match self.generator.generate(&request) {
            Ok(tokens) => Answer::Stream(Box::new(GuardedStream {
                inner: tokens,
                failed: false,
            })),
            Err(e) => {
                tracing::error!(generator = self.generator.name(), error = %e, "generation failed");
                Answer::Text(FAILURE_MESSAGE.to_string())
            }
        }
    }
}

/// The reply for a first-turn query with nothing to go on.
pub fn no_info_message(contact: &str) -> String {
    format!(
        "{} Please contact {} for more information.",
        NO_INFO_PREFIX, contact
    )
}

fn system_prompt(context: &str) -> String {
    if context.is_empty() {
        format!("{}\n\nContext: (none)", SYSTEM_PROMPT)
    } else {
        format!("{}\n\nContext:\n{}", SYSTEM_PROMPT, context)
    }
}

/// Rewrites `*`, `+` and `•` bullets as `- `, right-trims every line and
/// trims the whole text.
pub fn normalize_bullets(text: &str) -> String {
    text.lines()
        .map(|line| {
            let line = line.trim_end();
            let body = line.trim_start();
            let indent = &line[..line.len() - body.len()];
            let rest = ["* ", "+ ", "• ", "•"]
                .iter()
                .find_map(|marker| body.strip_prefix(marker));
            match rest {
                Some(rest) => format!("{}- {}", indent, rest.trim_start()),
                None => line.to_string(),
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// Converts a mid-stream failure into the failure message and ends the
/// stream.
struct GuardedStream {
    inner: TokenStream,
    failed: bool,
}

impl Iterator for GuardedStream {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        if self.failed {
            return None;
        }
        match self.inner.next()? {
            Ok(token) => Some(token),
            Err(e) => {
                tracing::error!(error = %e, "generation stream failed");
                self.failed = true;
                Some(format!("\n\n{}", FAILURE_MESSAGE))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{KbError, Result};
    use crate::models::{Document, DocumentFormat};
    use chrono::NaiveDate;
    use std::cell::{Cell, RefCell};

    /// Records calls and replays a fixed reply.
    struct MockGenerator {
        calls: Cell<usize>,
        last_prompt: RefCell<String>,
        last_messages: RefCell<Vec<Turn>>,
        fail: bool,
    }

    impl MockGenerator {
        fn new() -> Self {
            Self {
                calls: Cell::new(0),
                last_prompt: RefCell::new(String::new()),
                last_messages: RefCell::new(Vec::new()),
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::new()
            }
        }
    }

    impl Generator for MockGenerator {
        fn name(&self) -> &str {
            "mock"
        }

        fn generate(&self, request: &GenerationRequest<'_>) -> Result<TokenStream> {
            self.calls.set(self.calls.get() + 1);
            *self.last_prompt.borrow_mut() = request.system_prompt.to_string();
            *self.last_messages.borrow_mut() = request.messages.to_vec();
            if self.fail {
                return Err(KbError::Generation("offline".to_string()));
            }
            let tokens: Vec<Result<String>> =
                vec![Ok("Dues are ".to_string()), Ok("$50.".to_string())];
            Ok(Box::new(tokens.into_iter()))
        }
    }

    struct BrokenStream;

    impl Generator for BrokenStream {
        fn name(&self) -> &str {
            "broken"
        }

        fn generate(&self, _request: &GenerationRequest<'_>) -> Result<TokenStream> {
            let tokens: Vec<Result<String>> = vec![
                Ok("Partial".to_string()),
                Err(KbError::Generation("reset".to_string())),
                Ok("never seen".to_string()),
            ];
            Ok(Box::new(tokens.into_iter()))
        }
    }

    fn kb() -> KnowledgeBase {
        let mut kb = KnowledgeBase::new();
        let schedule = "# Spring 2025 Meeting Schedule\n\n* 2/5/25 6:00PM Resume Workshop\n";
        kb.insert(Document {
            topic: "meeting_schedule".to_string(),
            format: DocumentFormat::Markdown,
            raw_content: schedule.to_string(),
            rendered_text: "Spring 2025 Meeting Schedule\n\n2/5/25 6:00PM Resume Workshop"
                .to_string(),
        });
        kb.insert(Document {
            topic: "dues".to_string(),
            format: DocumentFormat::Markdown,
            raw_content: "Dues are $50 per semester.".to_string(),
            rendered_text: "Dues are $50 per semester.".to_string(),
        });
        kb
    }

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, 25)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
    }

    #[test]
    fn handler_answer_never_calls_generator() {
        let kb = kb();
        let generator = MockGenerator::new();
        let config = Config::minimal();
        let router = Router::new(&kb, &generator, &config);

        let text = router
            .answer_at("When is the next meeting?", &[], now())
            .into_text();
        assert_eq!(text, "Next meeting:\n- 2/5/25 6:00PM Resume Workshop");

        let miss = router
            .answer_at("reflection paper due date", &[], now())
            .into_text();
        assert!(miss.starts_with("I couldn't find"));
        assert_eq!(generator.calls.get(), 0);
    }

    #[test]
    fn handler_miss_falls_through_when_enabled() {
        let kb = kb();
        let generator = MockGenerator::new();
        let mut config = Config::minimal();
        config.routing.fallthrough_on_handler_miss = true;
        let router = Router::new(&kb, &generator, &config);

        let text = router
            .answer_at("reflection paper due date", &[], now())
            .into_text();
        assert_eq!(text, no_info_message("chapter leadership"));
        assert_eq!(generator.calls.get(), 0);

        let history = vec![Turn::user("hi"), Turn::assistant("hello")];
        router
            .answer_at("reflection paper due date", &history, now())
            .into_text();
        assert_eq!(generator.calls.get(), 1);
    }

    #[test]
    fn empty_context_first_turn_skips_generator() {
        let kb = KnowledgeBase::new();
        let generator = MockGenerator::new();
        let config = Config::minimal();
        let router = Router::new(&kb, &generator, &config);

        let text = router.answer_at("xyzzy", &[], now()).into_text();
        assert_eq!(text, no_info_message("chapter leadership"));
        assert_eq!(generator.calls.get(), 0);
    }

    #[test]
    fn search_hits_are_injected_as_context() {
        let kb = kb();
        let generator = MockGenerator::new();
        let config = Config::minimal();
        let router = Router::new(&kb, &generator, &config);

        let answer = router.answer_at("dues", &[], now());
        assert!(matches!(answer, Answer::Stream(_)));
        assert_eq!(answer.into_text(), "Dues are $50.");
        assert_eq!(generator.calls.get(), 1);
        let prompt = generator.last_prompt.borrow();
        assert!(prompt.contains("Dues are $50 per semester."));
        assert!(prompt.contains("Never make up information"));
    }

    #[test]
    fn history_is_windowed() {
        let kb = KnowledgeBase::new();
        let generator = MockGenerator::new();
        let config = Config::minimal();
        let router = Router::new(&kb, &generator, &config);

        let history = vec![
            Turn::user("one"),
            Turn::assistant("two"),
            Turn::user("three"),
            Turn::assistant("four"),
        ];
        router.answer_at("xyzzy", &history, now()).into_text();
        let sent = generator.last_messages.borrow();
        let contents: Vec<&str> = sent.iter().map(|t| t.content.as_str()).collect();
        assert_eq!(contents, vec!["three", "four", "xyzzy"]);
        assert!(generator.last_prompt.borrow().contains("Context: (none)"));
    }

    #[test]
    fn generator_failure_becomes_message() {
        let kb = kb();
        let generator = MockGenerator::failing();
        let config = Config::minimal();
        let router = Router::new(&kb, &generator, &config);
        assert_eq!(router.answer_at("dues", &[], now()).into_text(), FAILURE_MESSAGE);
    }

    #[test]
    fn stream_failure_ends_with_message() {
        let kb = kb();
        let config = Config::minimal();
        let router = Router::new(&kb, &BrokenStream, &config);
        let text = router.answer_at("dues", &[], now()).into_text();
        assert_eq!(text, format!("Partial\n\n{}", FAILURE_MESSAGE));
    }

    #[test]
    fn bullets_are_normalized() {
        let text = "  \n* one  \n  + two\n•three\n**Bold:**\n- four\n";
        assert_eq!(
            normalize_bullets(text),
            "- one\n  - two\n- three\n**Bold:**\n- four"
        );
    }
}
