//! # KB Assistant CLI (`kba`)
//!
//! The `kba` binary loads a knowledge-base directory once and answers
//! questions against it.
//!
//! ## Usage
//!
//! ```bash
//! kba --config ./config/kba.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `kba ask "<query>"` | Answer one question (streamed to stdout) |
//! | `kba chat` | Conversation loop on stdin, keeps prior turns |
//! | `kba search "<query>"` | Show generic relevance search matches |
//! | `kba topics` | List loaded documents and load counts |
//! | `kba section <topic> "<header>"` | Run the section extractor on one document |
//!
//! ## Examples
//!
//! ```bash
//! # Ask with the generator switched off
//! kba ask "What GPA do I need?" --provider disabled
//!
//! # Pin the clock for schedule questions
//! kba ask "When is the next meeting?" --now 2025-01-25T09:00
//!
//! # Point at another directory
//! kba topics --kb-dir ./docs
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::io;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use kb_assistant::commands;
use kb_assistant::config::{self, Config};
use kb_assistant::router::Router;

const DEFAULT_CONFIG: &str = "./config/kba.toml";

/// KB Assistant CLI: answers questions from a local knowledge base.
///
/// Reads `./config/kba.toml` when present; every setting has a default, so
/// the file is optional. See `config/kba.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "kba",
    about = "KB Assistant: answers questions from a local knowledge base",
    version,
    long_about = "KB Assistant loads markdown, Word, spreadsheet and PDF files from one directory, \
    answers recurring questions from extracted sections, and falls back to an LLM with the most \
    relevant passages as context."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/kba.toml` if it exists, otherwise built-in
    /// defaults are used.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override `[knowledge_base].dir`.
    #[arg(long, global = true)]
    kb_dir: Option<PathBuf>,

    /// Override `[generation].provider` (`openai` or `disabled`).
    #[arg(long, global = true)]
    provider: Option<String>,

    /// Pretend the current time is this (`YYYY-MM-DDTHH:MM` or `YYYY-MM-DD`).
    #[arg(long, global = true)]
    now: Option<String>,

    /// Log at debug level.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Answer one question.
    ///
    /// Keyword handlers answer directly from the documents; anything else
    /// goes through relevance search and the configured generator.
    Ask {
        /// The question.
        query: String,
    },

    /// Start a conversation loop on stdin.
    ///
    /// Prior turns are kept and the most recent ones are sent with each
    /// generated answer. Type `exit` or `quit` to stop.
    Chat,

    /// Show generic relevance search matches with scores.
    Search {
        /// The search query string.
        query: String,

        /// Maximum number of results to show.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// List loaded documents.
    Topics,

    /// Extract one section from a document.
    Section {
        /// Topic (file name without extension).
        topic: String,

        /// Header label, e.g. `"## Dues"` or `"GPA Requirements:"`.
        header: String,
    },
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        "kb_assistant=debug,kba=debug"
    } else {
        "kb_assistant=info,kba=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn resolve_config(cli: &Cli) -> Result<Config> {
    let mut cfg = match &cli.config {
        Some(path) => config::load_config(path)?,
        None if Path::new(DEFAULT_CONFIG).exists() => config::load_config(Path::new(DEFAULT_CONFIG))?,
        None => Config::minimal(),
    };
    if let Some(dir) = &cli.kb_dir {
        cfg.knowledge_base.dir = dir.clone();
    }
    if let Some(provider) = &cli.provider {
        cfg.generation.provider = provider.clone();
    }
    config::validate(&cfg)?;
    Ok(cfg)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let cfg = resolve_config(&cli)?;
    let now = cli.now.as_deref().map(commands::parse_now).transpose()?;
    let (kb, report) = commands::open_knowledge_base(&cfg)?;
    let mut stdout = io::stdout().lock();

    match cli.command {
        Commands::Ask { query } => {
            let generator = commands::build_generator(&cfg);
            let router = Router::new(&kb, generator.as_ref(), &cfg);
            commands::run_ask(&router, &query, now, &mut stdout)?;
        }
        Commands::Chat => {
            let generator = commands::build_generator(&cfg);
            let router = Router::new(&kb, generator.as_ref(), &cfg);
            commands::run_chat(&router, io::stdin().lock(), &mut stdout, now)?;
        }
        Commands::Search { query, limit } => {
            commands::run_search(&kb, &query, limit, &mut stdout)?;
        }
        Commands::Topics => {
            commands::run_topics(&kb, &report, &mut stdout)?;
        }
        Commands::Section { topic, header } => {
            commands::run_section(&kb, &topic, &header, &mut stdout)?;
        }
    }

    Ok(())
}
