//! Gateway abstraction for the reasoning service.
//!
//! The [`Gateway`] trait decouples the loop from the actual backend (the
//! Anthropic Messages API). Tests use scripted gateways that return
//! predetermined replies without touching the network.

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::io::config::LoopConfig;

/// Abstraction over text-completion backends.
///
/// Calls are not cancellable: once issued, a request runs to completion or
/// failure.
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Send `prompt` and return the reply text, bounded by `max_output_tokens`.
    async fn complete(&self, prompt: &str, max_output_tokens: u32) -> Result<String>;
}

/// Gateway backed by the Anthropic Messages API.
pub struct AnthropicGateway {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    version: String,
    model: String,
}

impl AnthropicGateway {
    pub fn new(config: &LoopConfig, api_key: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .context("build http client")?;
        Ok(Self {
            client,
            endpoint: format!(
                "{}/v1/messages",
                config.api.base_url.trim_end_matches('/')
            ),
            api_key: api_key.into(),
            version: config.api.version.clone(),
            model: config.model.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Gateway for AnthropicGateway {
    #[instrument(skip_all, fields(model = %self.model, max_output_tokens))]
    async fn complete(&self, prompt: &str, max_output_tokens: u32) -> Result<String> {
        let body = MessagesRequest::single_user(&self.model, max_output_tokens, prompt);
        debug!(prompt_bytes = prompt.len(), "sending messages request");

        let response = self
            .client
            .post(&self.endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", &self.version)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("send request to {}", self.endpoint))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), body = %error_body, "messages request failed");
            bail!("reasoning service returned {status}: {error_body}");
        }

        let reply: MessagesResponse = response
            .json()
            .await
            .context("parse messages response")?;
        if let Some(reason) = reply.stop_reason.as_deref() {
            debug!(stop_reason = reason, "messages request completed");
        }
        reply.into_text()
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<RequestMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestMessage<'a> {
    role: &'static str,
    content: &'a str,
}

impl<'a> MessagesRequest<'a> {
    fn single_user(model: &'a str, max_tokens: u32, prompt: &'a str) -> Self {
        Self {
            model,
            max_tokens,
            messages: vec![RequestMessage {
                role: "user",
                content: prompt,
            }],
        }
    }
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

impl MessagesResponse {
    /// Concatenate the text blocks of the reply. A reply with no text block is
    /// unusable and reported as an error.
    fn into_text(self) -> Result<String> {
        let texts: Vec<String> = self
            .content
            .into_iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text),
                ContentBlock::Other => None,
            })
            .collect();
        if texts.is_empty() {
            return Err(anyhow!("reasoning service reply contained no text"));
        }
        Ok(texts.concat())
    }
}
