//! Conversation log and the text-completion backend.
//!
//! The log is owned by the caller and passed into every narration call, so
//! later prompts see the earlier exchanges in order.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{ReportError, ReportResult};

/// Connection settings for the completion backend.
#[derive(Debug, Clone)]
pub struct CompletionConfig {
    pub ollama_url: String,
    pub model_name: String,
    pub temperature: f32,
    pub connect_timeout_seconds: u64,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            ollama_url: "http://localhost:11434".to_string(),
            model_name: "llama3.2:latest".to_string(),
            temperature: 0.2,
            connect_timeout_seconds: 10,
        }
    }
}

/// One role-tagged turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: String,
    pub content: String,
}

impl ChatTurn {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// Append-only list of turns exchanged during one report run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConversationLog {
    turns: Vec<ChatTurn>,
}

impl ConversationLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the system prompt if nothing has been exchanged yet.
    pub fn ensure_system(&mut self, prompt: &str) {
        if self.turns.is_empty() {
            self.turns.push(ChatTurn::system(prompt));
        }
    }

    pub fn push(&mut self, turn: ChatTurn) {
        self.turns.push(turn);
    }

    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// User turns in the order they were sent.
    pub fn prompts(&self) -> impl Iterator<Item = &str> {
        self.turns
            .iter()
            .filter(|t| t.role == "user")
            .map(|t| t.content.as_str())
    }
}

/// A backend answering the latest user turn given the whole conversation.
#[async_trait]
pub trait TextCompletion: Send + Sync {
    async fn complete(&self, turns: &[ChatTurn]) -> ReportResult<String>;
}

/// Ollama chat API request.
#[derive(Debug, Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatTurn],
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
}

/// Ollama chat API response.
#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: String,
}

/// Non-streaming `/api/chat` client.
pub struct OllamaCompletion {
    config: CompletionConfig,
    http_client: reqwest::Client,
}

impl OllamaCompletion {
    pub fn new(config: CompletionConfig) -> ReportResult<Self> {
        info!(
            "Initializing narrative backend with model {} at {}",
            config.model_name, config.ollama_url
        );

        // The per-call deadline is enforced by the caller, so only connecting is bounded here.
        let http_client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_seconds))
            .build()
            .map_err(|e| ReportError::NarrativeBackend(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            config,
            http_client,
        })
    }
}

#[async_trait]
impl TextCompletion for OllamaCompletion {
    async fn complete(&self, turns: &[ChatTurn]) -> ReportResult<String> {
        let url = format!("{}/api/chat", self.config.ollama_url.trim_end_matches('/'));

        let request = OllamaChatRequest {
            model: &self.config.model_name,
            messages: turns,
            stream: false,
            options: OllamaOptions {
                temperature: self.config.temperature,
            },
        };

        debug!("Sending chat request with {} turns", turns.len());

        let response = self
            .http_client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    ReportError::NarrativeBackend(format!(
                        "Cannot connect to Ollama at {}. Is Ollama running?",
                        self.config.ollama_url
                    ))
                } else {
                    ReportError::NarrativeBackend(format!("Failed to send request: {}", e))
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ReportError::NarrativeBackend(format!(
                "Ollama API error {}: {}",
                status, body
            )));
        }

        let chat_response: OllamaChatResponse = response.json().await.map_err(|e| {
            ReportError::NarrativeBackend(format!("Failed to parse Ollama response: {}", e))
        })?;

        Ok(chat_response.message.content)
    }
}
