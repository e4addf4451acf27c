//! TOML configuration parsing and validation.
//!
//! Every section is optional; missing values fall back to the defaults
//! below. See `config/kba.example.toml` for a full example.

use anyhow::{Context, Result};
use globset::Glob;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Most prior turns ever sent with a generated answer.
pub const MAX_HISTORY_WINDOW: usize = 2;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub knowledge_base: KnowledgeBaseConfig,
    #[serde(default)]
    pub routing: RoutingConfig,
    #[serde(default)]
    pub handlers: HandlersConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct KnowledgeBaseConfig {
    #[serde(default = "default_kb_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,
}

impl Default for KnowledgeBaseConfig {
    fn default() -> Self {
        Self {
            dir: default_kb_dir(),
            include_globs: default_include_globs(),
            max_file_bytes: default_max_file_bytes(),
        }
    }
}

fn default_kb_dir() -> PathBuf {
    PathBuf::from("./knowledge_base")
}
fn default_include_globs() -> Vec<String> {
    vec![
        "*.md".to_string(),
        "*.docx".to_string(),
        "*.xlsx".to_string(),
        "*.pdf".to_string(),
    ]
}
fn default_max_file_bytes() -> u64 {
    10 * 1024 * 1024
}

#[derive(Debug, Deserialize, Clone)]
pub struct RoutingConfig {
    #[serde(default)]
    pub fallthrough_on_handler_miss: bool,
    #[serde(default = "default_context_k")]
    pub context_k: usize,
    #[serde(default = "default_history_window")]
    pub history_window: usize,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            fallthrough_on_handler_miss: false,
            context_k: default_context_k(),
            history_window: default_history_window(),
        }
    }
}

fn default_context_k() -> usize {
    3
}
fn default_history_window() -> usize {
    2
}

#[derive(Debug, Deserialize, Clone)]
pub struct HandlersConfig {
    #[serde(default = "default_schedule_topic")]
    pub schedule_topic: String,
    #[serde(default = "default_schedule_heading")]
    pub schedule_heading: String,
    #[serde(default = "default_requirements_topic")]
    pub requirements_topic: String,
    #[serde(default = "default_contact")]
    pub contact: String,
}

impl Default for HandlersConfig {
    fn default() -> Self {
        Self {
            schedule_topic: default_schedule_topic(),
            schedule_heading: default_schedule_heading(),
            requirements_topic: default_requirements_topic(),
            contact: default_contact(),
        }
    }
}

fn default_schedule_topic() -> String {
    "meeting_schedule".to_string()
}
fn default_schedule_heading() -> String {
    "Spring 2025 Meeting Schedule".to_string()
}
fn default_requirements_topic() -> String {
    "membership_requirements".to_string()
}
fn default_contact() -> String {
    "chapter leadership".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_fallback_model")]
    pub fallback_model: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_api_base")]
    pub api_base: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            fallback_model: default_fallback_model(),
            temperature: default_temperature(),
            timeout_secs: default_timeout_secs(),
            api_base: default_api_base(),
        }
    }
}

fn default_provider() -> String {
    "openai".to_string()
}
fn default_model() -> String {
    "gpt-4o".to_string()
}
fn default_fallback_model() -> Option<String> {
    Some("gpt-3.5-turbo".to_string())
}
fn default_temperature() -> f32 {
    0.7
}
fn default_timeout_secs() -> u64 {
    60
}
fn default_api_base() -> String {
    "https://api.openai.com/v1".to_string()
}

impl GenerationConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

impl Config {
    /// All-defaults configuration, used when no config file is present.
    pub fn minimal() -> Self {
        Self::default()
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    let kb = &config.knowledge_base;
    if kb.include_globs.is_empty() {
        anyhow::bail!("knowledge_base.include_globs must not be empty");
    }
    for pattern in &kb.include_globs {
        Glob::new(pattern)
            .with_context(|| format!("knowledge_base.include_globs: invalid glob '{}'", pattern))?;
    }
    if kb.max_file_bytes == 0 {
        anyhow::bail!("knowledge_base.max_file_bytes must be > 0");
    }

    if config.routing.context_k < 1 {
        anyhow::bail!("routing.context_k must be >= 1");
    }
    if config.routing.history_window > MAX_HISTORY_WINDOW {
        anyhow::bail!("routing.history_window must be <= {}", MAX_HISTORY_WINDOW);
    }

    let generation = &config.generation;
    if !(0.0..=2.0).contains(&generation.temperature) {
        anyhow::bail!("generation.temperature must be in [0.0, 2.0]");
    }
    match generation.provider.as_str() {
        "disabled" | "openai" => {}
        other => anyhow::bail!(
            "Unknown generation provider: '{}'. Must be disabled or openai.",
            other
        ),
    }
    if generation.is_enabled() && generation.model.trim().is_empty() {
        anyhow::bail!(
            "generation.model must be specified when provider is '{}'",
            generation.provider
        );
    }

    Ok(())
}
