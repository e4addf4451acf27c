//! Generative-model collaborator abstraction and implementations.
//!
//! Defines the [`Generator`] trait and concrete implementations:
//! - **[`DisabledGenerator`]**: always fails; used when generation is not
//!   configured or no API key is available.
//! - **[`OpenAiGenerator`]**: calls an OpenAI-compatible chat completions
//!   endpoint with `stream: true` and yields text fragments as they arrive.
//!
//! # Capability tiers
//!
//! The OpenAI generator never hard-depends on one model. Before the first
//! real call it probes `GET {api_base}/models/{model}`; if the preferred
//! model is unavailable it probes and uses `fallback_model` instead. The
//! choice is cached for the life of the generator.
//!
//! # Streams
//!
//! A [`TokenStream`] is consumed once. Dropping it part-way abandons the
//! HTTP response; nothing is retried.

use std::cell::OnceCell;
use std::io::{BufRead, BufReader};
use std::time::Duration;

use reqwest::blocking::{Client, Response};
use serde::Serialize;

use crate::config::GenerationConfig;
use crate::error::{KbError, Result};
use crate::models::Turn;

/// Lazy sequence of generated text fragments.
pub type TokenStream = Box<dyn Iterator<Item = Result<String>>>;

/// Everything the model needs for one answer.
pub struct GenerationRequest<'a> {
    pub system_prompt: &'a str,
    /// Prior turns (already windowed) followed by the current user turn.
    pub messages: &'a [Turn],
    pub temperature: f32,
}

/// The generative-model capability consumed by the router.
pub trait Generator {
    /// Identifier used in logs.
    fn name(&self) -> &str;

    fn generate(&self, request: &GenerationRequest<'_>) -> Result<TokenStream>;
}

// ============ Disabled Generator ============

/// A generator that always returns an error.
pub struct DisabledGenerator;

impl Generator for DisabledGenerator {
    fn name(&self) -> &str {
        "disabled"
    }

    fn generate(&self, _request: &GenerationRequest<'_>) -> Result<TokenStream> {
        Err(KbError::Generation(
            "generation provider is disabled".to_string(),
        ))
    }
}

// ============ OpenAI Generator ============

/// Streaming chat-completions client for OpenAI-compatible APIs.
///
/// Requires the `OPENAI_API_KEY` environment variable.
pub struct OpenAiGenerator {
    client: Client,
    api_key: String,
    api_base: String,
    model: String,
    fallback_model: Option<String>,
    selected: OnceCell<String>,
}

impl OpenAiGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| {
            KbError::Generation("OPENAI_API_KEY environment variable not set".to_string())
        })?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| KbError::Generation(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            api_key,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            fallback_model: config.fallback_model.clone(),
            selected: OnceCell::new(),
        })
    }

    /// Returns the model to use, probing tiers on first call.
    fn resolve_model(&self) -> Result<String> {
        if let Some(model) = self.selected.get() {
            return Ok(model.clone());
        }
        let mut tiers = vec![self.model.as_str()];
        if let Some(fallback) = self.fallback_model.as_deref() {
            if fallback != self.model {
                tiers.push(fallback);
            }
        }
        for model in tiers {
            match self.probe(model) {
                Ok(()) => {
                    tracing::info!(model, "selected generation model");
                    let _ = self.selected.set(model.to_string());
                    return Ok(model.to_string());
                }
                Err(e) => tracing::warn!(model, error = %e, "model probe failed"),
            }
        }
        Err(KbError::Generation(
            "no configured model is available".to_string(),
        ))
    }

    fn probe(&self, model: &str) -> Result<()> {
        let resp = self
            .client
            .get(format!("{}/models/{}", self.api_base, model))
            .bearer_auth(&self.api_key)
            .send()
            .map_err(|e| KbError::Generation(e.to_string()))?;
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(KbError::Generation(format!("probe returned {}", resp.status())))
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    stream: bool,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

impl Generator for OpenAiGenerator {
    fn name(&self) -> &str {
        "openai"
    }

    fn generate(&self, request: &GenerationRequest<'_>) -> Result<TokenStream> {
        let model = self.resolve_model()?;
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        messages.push(ChatMessage {
            role: "system",
            content: request.system_prompt,
        });
        messages.extend(request.messages.iter().map(|t| ChatMessage {
            role: t.role.as_str(),
            content: &t.content,
        }));
        let body = ChatRequest {
            model: &model,
            temperature: request.temperature,
            stream: true,
            messages,
        };

        let resp = self
            .client
            .post(format!("{}/chat/completions", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .map_err(|e| KbError::Generation(format!("chat completions request failed: {}", e)))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp
                .text()
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(KbError::Generation(format!(
                "chat completions returned {}: {}",
                status, text
            )));
        }

        Ok(Box::new(SseStream::new(resp)))
    }
}

/// One parsed server-sent-events line.
#[derive(Debug, PartialEq)]
pub enum SseEvent {
    Token(String),
    Done,
    Skip,
}

/// Interprets a single SSE line from a streaming chat completion.
pub fn parse_sse_line(line: &str) -> Result<SseEvent> {
    let line = line.trim();
    let Some(payload) = line.strip_prefix("data:") else {
        return Ok(SseEvent::Skip);
    };
    let payload = payload.trim();
    if payload == "[DONE]" {
        return Ok(SseEvent::Done);
    }
    let json: serde_json::Value = serde_json::from_str(payload)
        .map_err(|e| KbError::Generation(format!("invalid stream chunk: {}", e)))?;
    if let Some(err) = json.get("error") {
        return Err(KbError::Generation(format!("stream error: {}", err)));
    }
    let content = json
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("delta"))
        .and_then(|d| d.get("content"))
        .and_then(|c| c.as_str())
        .unwrap_or_default();
    if content.is_empty() {
        Ok(SseEvent::Skip)
    } else {
        Ok(SseEvent::Token(content.to_string()))
    }
}

struct SseStream {
    reader: BufReader<Response>,
    finished: bool,
}

impl SseStream {
    fn new(resp: Response) -> Self {
        Self {
            reader: BufReader::new(resp),
            finished: false,
        }
    }
}

impl Iterator for SseStream {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut line = String::new();
        while !self.finished {
            line.clear();
            match self.reader.read_line(&mut line) {
                Ok(0) => self.finished = true,
                Ok(_) => match parse_sse_line(&line) {
                    Ok(SseEvent::Token(token)) => return Some(Ok(token)),
                    Ok(SseEvent::Done) => self.finished = true,
                    Ok(SseEvent::Skip) => {}
                    Err(e) => {
                        self.finished = true;
                        return Some(Err(e));
                    }
                },
                Err(e) => {
                    self.finished = true;
                    return Some(Err(KbError::Generation(format!(
                        "stream interrupted: {}",
                        e
                    ))));
                }
            }
        }
        None
    }
}

/// Builds the configured generator.
///
/// | Config Value | Generator |
/// |-------------|-----------|
/// | `"disabled"` | [`DisabledGenerator`] |
/// | `"openai"` | [`OpenAiGenerator`] |
pub fn create_generator(config: &GenerationConfig) -> Result<Box<dyn Generator>> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(DisabledGenerator)),
        "openai" => Ok(Box::new(OpenAiGenerator::new(config)?)),
        other => Err(KbError::Generation(format!(
            "unknown generation provider: {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sse_token_line() {
        let line = r#"data: {"choices":[{"delta":{"content":"Hel"}}]}"#;
        assert_eq!(parse_sse_line(line).unwrap(), SseEvent::Token("Hel".to_string()));
    }

    #[test]
    fn sse_done_and_noise() {
        assert_eq!(parse_sse_line("data: [DONE]\n").unwrap(), SseEvent::Done);
        assert_eq!(parse_sse_line("").unwrap(), SseEvent::Skip);
        assert_eq!(parse_sse_line(": keep-alive").unwrap(), SseEvent::Skip);
        let role_only = r#"data: {"choices":[{"delta":{"role":"assistant"}}]}"#;
        assert_eq!(parse_sse_line(role_only).unwrap(), SseEvent::Skip);
    }

    #[test]
    fn sse_error_payload_fails() {
        let line = r#"data: {"error":{"message":"overloaded"}}"#;
        assert!(parse_sse_line(line).is_err());
        assert!(parse_sse_line("data: {not json").is_err());
    }

    #[test]
    fn disabled_generator_errors() {
        let request = GenerationRequest {
            system_prompt: "s",
            messages: &[],
            temperature: 0.7,
        };
        let err = DisabledGenerator.generate(&request).err().unwrap();
        assert!(matches!(err, KbError::Generation(_)));
    }

    #[test]
    fn create_disabled_from_config() {
        let config = GenerationConfig {
            provider: "disabled".to_string(),
            ..GenerationConfig::default()
        };
        let generator = create_generator(&config).unwrap();
        assert_eq!(generator.name(), "disabled");
    }
}
