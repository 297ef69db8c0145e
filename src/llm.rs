//! LLM Provider Client
//!
//! OpenAI-compatible chat completions client (Groq by default). One request
//! per call with a bounded timeout and a small retry budget for transient
//! failures.

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::ProviderError;

/// Message in the chat request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: &str, content: &str) -> Self {
        Self {
            role: role.to_string(),
            content: content.to_string(),
        }
    }
}

/// Sampling policy, fixed per deployment
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingParams {
    pub temperature: f32,
    pub max_tokens: u32,
    pub top_p: f32,
    pub frequency_penalty: f32,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            temperature: 0.75,
            max_tokens: 220,
            top_p: 0.88,
            frequency_penalty: 0.4,
        }
    }
}

/// Anything that can turn a chat into one completion
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Text of the first choice; `None` when the provider returned no content
    async fn complete(
        &self,
        messages: &[ChatMessage],
        params: &SamplingParams,
    ) -> Result<Option<String>, ProviderError>;
}

/// API request
#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
    top_p: f32,
    frequency_penalty: f32,
}

/// API response
#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: usize,
    #[serde(default)]
    completion_tokens: usize,
}

/// Chat completions client
#[derive(Clone)]
pub struct ChatCompletionsClient {
    client: Client,
    api_url: String,
    api_key: String,
    model: String,
    max_retries: u32,
}

impl ChatCompletionsClient {
    pub fn new(
        api_url: &str,
        api_key: &str,
        model: &str,
        timeout: Duration,
        max_retries: u32,
    ) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_url: api_url.to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            max_retries,
        })
    }

    /// Create from config
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            &config.api_url,
            &config.api_key,
            &config.model,
            config.request_timeout,
            config.max_retries,
        )
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn send_once(
        &self,
        messages: &[ChatMessage],
        params: &SamplingParams,
    ) -> Result<Option<String>, ProviderError> {
        let request = CompletionRequest {
            model: &self.model,
            messages,
            temperature: params.temperature,
            max_tokens: params.max_tokens,
            top_p: params.top_p,
            frequency_penalty: params.frequency_penalty,
        };

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(ProviderError::from_reqwest)?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(status, body));
        }

        let result: CompletionResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Decode(e.to_string()))?;

        if let Some(usage) = &result.usage {
            info!(
                "Completion: model={}, in={}, out={}",
                self.model, usage.prompt_tokens, usage.completion_tokens
            );
        }

        Ok(result
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content))
    }
}

#[async_trait]
impl CompletionProvider for ChatCompletionsClient {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        params: &SamplingParams,
    ) -> Result<Option<String>, ProviderError> {
        debug!("Calling provider: model={}, messages={}", self.model, messages.len());

        let mut attempt = 0;
        loop {
            match self.send_once(messages, params).await {
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    warn!("Provider attempt {} failed: {} - retrying", attempt, e);
                    tokio::time::sleep(Duration::from_millis(500 * u64::from(attempt))).await;
                }
                result => return result,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_shape() {
        let messages = vec![ChatMessage::new("system", "be brief"), ChatMessage::new("user", "hi")];
        let params = SamplingParams::default();
        let request = CompletionRequest {
            model: "llama",
            messages: &messages,
            temperature: params.temperature,
            max_tokens: params.max_tokens,
            top_p: params.top_p,
            frequency_penalty: params.frequency_penalty,
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "llama");
        assert_eq!(json["max_tokens"], 220);
        assert_eq!(json["messages"][1]["role"], "user");
        assert_eq!(json["messages"][1]["content"], "hi");
    }

    #[test]
    fn test_response_parsing() {
        let raw = r#"{"choices":[{"message":{"role":"assistant","content":"hello"}}],"usage":{"prompt_tokens":5,"completion_tokens":1}}"#;
        let parsed: CompletionResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.choices[0].message.content.as_deref(), Some("hello"));

        let empty: CompletionResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(empty.choices.is_empty());
    }
}
