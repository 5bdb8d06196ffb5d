//! Generation service client.
//!
//! The pipelines talk to a [`Generator`]; production uses
//! [`ChatCompletionsClient`], an OpenAI-compatible `chat/completions`
//! client (the Hugging Face router by default). One non-streaming request
//! per call, bounded by `generation.timeout_secs`, never retried.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::{GenerationConfig, Secrets};
use crate::error::{check_status, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
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
}

/// Produces the answer text for a prompt.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, messages: &[ChatMessage]) -> Result<String>;
}

pub struct ChatCompletionsClient {
    http: reqwest::Client,
    url: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
    api_key: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl ChatCompletionsClient {
    pub fn new(config: &GenerationConfig, api_key: &str) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            url: config.url.clone(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            api_key: api_key.to_string(),
        })
    }

    /// Build from environment secrets. Fails when `HF_API_KEY` is unset.
    pub fn from_secrets(config: &GenerationConfig, secrets: &Secrets) -> anyhow::Result<Self> {
        let key = secrets
            .generation_api_key
            .as_deref()
            .context("HF_API_KEY environment variable not set")?;
        Self::new(config, key)
    }
}

#[async_trait]
impl Generator for ChatCompletionsClient {
    async fn generate(&self, messages: &[ChatMessage]) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        let response = self
            .http
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;
        let parsed: ChatResponse = check_status(response).await?.json().await?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .context("generation response has no choices")?;
        Ok(content)
    }
}
