//! Upstream text-generation proxy.
//!
//! The provider is fixed at configuration time. Each [`ProviderKind`] owns its
//! request body, auth placement and a typed response envelope, so extraction
//! never guesses between shapes.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::config::UpstreamConfig;
use crate::errors::{AppError, Result};

/// Something that turns a prompt into generated text.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderKind {
    /// OpenAI-style `/chat/completions` (OpenRouter).
    ChatCompletions,
    /// Gemini-style `models/{model}:generateContent`.
    GenerateContent,
}

impl ProviderKind {
    pub fn default_base_url(&self) -> &'static str {
        match self {
            ProviderKind::ChatCompletions => "https://openrouter.ai/api/v1",
            ProviderKind::GenerateContent => "https://generativelanguage.googleapis.com/v1beta",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderKind::ChatCompletions => "nex-agi/deepseek-v3.1-nex-n1:free",
            ProviderKind::GenerateContent => "gemini-2.0-flash",
        }
    }

    fn endpoint(&self, base_url: &str, model: &str) -> String {
        let base = base_url.trim_end_matches('/');
        match self {
            ProviderKind::ChatCompletions => format!("{}/chat/completions", base),
            ProviderKind::GenerateContent => format!("{}/models/{}:generateContent", base, model),
        }
    }

    fn request_body(&self, model: &str, prompt: &str) -> Value {
        match self {
            ProviderKind::ChatCompletions => json!({
                "model": model,
                "messages": [{ "role": "user", "content": prompt }]
            }),
            ProviderKind::GenerateContent => json!({
                "contents": [{ "role": "user", "parts": [{ "text": prompt }] }]
            }),
        }
    }

    /// Pulls the generated text out of a successful response body.
    pub fn extract_text(&self, body: &str) -> Option<String> {
        let text = match self {
            ProviderKind::ChatCompletions => serde_json::from_str::<ChatCompletionResponse>(body)
                .ok()?
                .choices
                .into_iter()
                .next()?
                .message
                .content?,
            ProviderKind::GenerateContent => {
                serde_json::from_str::<GenerateContentResponse>(body)
                    .ok()?
                    .candidates
                    .into_iter()
                    .next()?
                    .content
                    .parts
                    .into_iter()
                    .filter(|part| !part.thought)
                    .find_map(|part| part.text)?
            }
        };

        let text = text.trim();
        (!text.is_empty()).then(|| text.to_string())
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openrouter" | "openai" | "chat-completions" => Ok(ProviderKind::ChatCompletions),
            "gemini" | "google" | "generate-content" => Ok(ProviderKind::GenerateContent),
            other => Err(format!("unknown upstream provider '{}'", other)),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ContentPart>,
}

#[derive(Debug, Deserialize)]
struct ContentPart {
    text: Option<String>,
    #[serde(default)]
    thought: bool,
}

/// Authenticated HTTPS client for the configured provider. No retries.
#[derive(Clone)]
pub struct UpstreamClient {
    client: Client,
    config: UpstreamConfig,
}

impl std::fmt::Debug for UpstreamClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamClient")
            .field("provider", &self.config.provider)
            .field("base_url", &self.config.base_url)
            .field("model", &self.config.model)
            .finish()
    }
}

impl UpstreamClient {
    pub fn new(config: UpstreamConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    pub fn provider(&self) -> ProviderKind {
        self.config.provider
    }

    fn request(&self, prompt: &str) -> reqwest::RequestBuilder {
        let provider = self.config.provider;
        let request = self
            .client
            .post(provider.endpoint(&self.config.base_url, &self.config.model))
            .json(&provider.request_body(&self.config.model, prompt));

        match provider {
            ProviderKind::ChatCompletions => request
                .bearer_auth(&self.config.api_key)
                .header("HTTP-Referer", &self.config.referer)
                .header("X-Title", &self.config.app_title),
            ProviderKind::GenerateContent => {
                request.header("x-goog-api-key", &self.config.api_key)
            }
        }
    }
}

#[async_trait]
impl TextGenerator for UpstreamClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        tracing::debug!(provider = ?self.config.provider, model = %self.config.model, "Upstream request");

        let response = self
            .request(prompt)
            .send()
            .await
            .map_err(|e| AppError::upstream(e.status().map(|s| s.as_u16()), e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AppError::upstream(Some(status.as_u16()), e.to_string()))?;

        if !status.is_success() {
            return Err(AppError::upstream(Some(status.as_u16()), body));
        }

        self.config
            .provider
            .extract_text(&body)
            .ok_or_else(|| AppError::upstream(Some(status.as_u16()), body))
    }
}
