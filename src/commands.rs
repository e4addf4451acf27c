//! CLI command implementations.
//!
//! Each `run_*` function backs one `kba` subcommand and writes its output
//! to the supplied writer. Logs go to stderr through `tracing`, so stdout
//! carries only answers and listings.

use anyhow::{bail, Context, Result};
use chrono::{Local, NaiveDate, NaiveDateTime};
use std::io::{BufRead, Write};

use crate::config::Config;
use crate::generate::{self, DisabledGenerator, Generator};
use crate::loader::{self, LoadReport};
use crate::models::Turn;
use crate::router::{Answer, Router};
use crate::search;
use crate::section;
use crate::store::KnowledgeBase;

/// Loads the configured knowledge base. A missing directory is fatal.
pub fn open_knowledge_base(config: &Config) -> Result<(KnowledgeBase, LoadReport)> {
    loader::load_with_report(&config.knowledge_base).with_context(|| {
        format!(
            "Failed to load knowledge base from {}",
            config.knowledge_base.dir.display()
        )
    })
}

/// Builds the configured generator. When it cannot be built (for example
/// the API key is missing) the assistant keeps working on local answers
/// and reports generation failures per query.
pub fn build_generator(config: &Config) -> Box<dyn Generator> {
    match generate::create_generator(&config.generation) {
        Ok(generator) => generator,
        Err(e) => {
            tracing::warn!(error = %e, "generation unavailable; answering from documents only");
            Box::new(DisabledGenerator)
        }
    }
}

/// Parses `--now` as `YYYY-MM-DDTHH:MM` or `YYYY-MM-DD` (midnight).
pub fn parse_now(value: &str) -> Result<NaiveDateTime> {
    if let Ok(dt) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M") {
        return Ok(dt);
    }
    match NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        Ok(date) => Ok(date.and_time(chrono::NaiveTime::MIN)),
        Err(_) => bail!(
            "Invalid --now value '{}'. Expected YYYY-MM-DDTHH:MM or YYYY-MM-DD.",
            value
        ),
    }
}

/// Prints an answer as it arrives and returns the full text.
fn write_answer(answer: Answer, out: &mut impl Write) -> Result<String> {
    let text = match answer {
        Answer::Text(text) => {
            write!(out, "{}", text)?;
            text
        }
        Answer::Stream(tokens) => {
            let mut text = String::new();
            for token in tokens {
                write!(out, "{}", token)?;
                out.flush()?;
                text.push_str(&token);
            }
            text
        }
    };
    writeln!(out)?;
    Ok(text)
}

/// Answers one question with no conversation history.
pub fn run_ask(
    router: &Router<'_>,
    query: &str,
    now: Option<NaiveDateTime>,
    out: &mut impl Write,
) -> Result<()> {
    let now = now.unwrap_or_else(|| Local::now().naive_local());
    write_answer(router.answer_at(query, &[], now), out)?;
    Ok(())
}

/// Line-oriented conversation loop. Ends on EOF, `exit` or `quit`.
pub fn run_chat(
    router: &Router<'_>,
    input: impl BufRead,
    out: &mut impl Write,
    now: Option<NaiveDateTime>,
) -> Result<()> {
    let mut history: Vec<Turn> = Vec::new();
    write!(out, "> ")?;
    out.flush()?;
    for line in input.lines() {
        let line = line?;
        let query = line.trim();
        if query.eq_ignore_ascii_case("exit") || query.eq_ignore_ascii_case("quit") {
            break;
        }
        if !query.is_empty() {
            let now = now.unwrap_or_else(|| Local::now().naive_local());
            let reply = write_answer(router.answer_at(query, &history, now), out)?;
            history.push(Turn::user(query));
            history.push(Turn::assistant(reply));
        }
        write!(out, "> ")?;
        out.flush()?;
    }
    writeln!(out)?;
    Ok(())
}

pub fn run_search(
    kb: &KnowledgeBase,
    query: &str,
    limit: Option<usize>,
    out: &mut impl Write,
) -> Result<()> {
    let mut matches = search::search(kb, query);
    if let Some(limit) = limit {
        matches.truncate(limit);
    }
    if matches.is_empty() {
        writeln!(out, "No results.")?;
        return Ok(());
    }
    for (i, m) in matches.iter().enumerate() {
        writeln!(
            out,
            "{}. [{:.4}] {}",
            i + 1,
            m.relevance,
            m.topic.as_deref().unwrap_or("(unknown)")
        )?;
        writeln!(out, "    excerpt: \"{}\"", m.content.replace('\n', " ").trim())?;
        writeln!(out)?;
    }
    Ok(())
}

pub fn run_topics(kb: &KnowledgeBase, report: &LoadReport, out: &mut impl Write) -> Result<()> {
    writeln!(out, "{:<32} {:<12} CHARS", "TOPIC", "FORMAT")?;
    for doc in kb.documents() {
        writeln!(
            out,
            "{:<32} {:<12} {}",
            doc.topic,
            doc.format,
            doc.raw_content.chars().count()
        )?;
    }
    writeln!(out)?;
    writeln!(
        out,
        "{} loaded, {} replaced, {} skipped, {} unsupported",
        report.loaded, report.replaced, report.skipped, report.unsupported
    )?;
    Ok(())
}

/// Runs the section extractor on one document.
pub fn run_section(
    kb: &KnowledgeBase,
    topic: &str,
    header: &str,
    out: &mut impl Write,
) -> Result<()> {
    let Some(doc) = kb.get(topic) else {
        bail!("Unknown topic: {}", topic);
    };
    match section::extract(doc.section_text(), header, section::boundaries_for(doc.format)) {
        Some(text) => writeln!(out, "{}", text)?,
        None => writeln!(out, "No section found.")?,
    }
    Ok(())
}
