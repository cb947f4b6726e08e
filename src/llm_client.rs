use crate::errors::AppError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Client for the Anthropic-style messages API.
#[derive(Clone)]
pub struct LlmClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: [Message<'a>; 1],
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

impl LlmClient {
    /// Creates a new `LlmClient`.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Provider origin, without the `/v1/messages` path.
    /// * `api_key` - Sent as `x-api-key`.
    /// * `model` - Model identifier sent with every request.
    /// * `timeout` - Per-request timeout.
    pub fn new(
        base_url: String,
        api_key: String,
        model: String,
        timeout: Duration,
    ) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                AppError::UpstreamUnavailable(format!("Failed to create LLM client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Sends a single-turn prompt and returns the trimmed text of the first
    /// content block.
    pub async fn complete(
        &self,
        prompt: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String, AppError> {
        let url = format!("{}/v1/messages", self.base_url);
        tracing::debug!(
            "LLM request: model={} max_tokens={} temperature={} prompt_chars={}",
            self.model,
            max_tokens,
            temperature,
            prompt.len()
        );

        let body = MessagesRequest {
            model: &self.model,
            max_tokens,
            temperature,
            messages: [Message {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::UpstreamUnavailable(format!("LLM request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::UpstreamUnavailable(format!(
                "LLM provider returned {}: {}",
                status, error_text
            )));
        }

        let data: MessagesResponse = response.json().await.map_err(|e| {
            AppError::UpstreamUnavailable(format!("Failed to decode LLM response: {}", e))
        })?;

        let text = data
            .content
            .into_iter()
            .next()
            .and_then(|block| block.text)
            .ok_or_else(|| {
                AppError::UpstreamUnavailable("LLM response has no text content".to_string())
            })?;

        tracing::info!("✓ LLM completion received ({} chars)", text.len());
        Ok(text.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation_trims_trailing_slash() {
        let client = LlmClient::new(
            "https://api.example.com/".to_string(),
            "key".to_string(),
            "test-model".to_string(),
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(client.base_url, "https://api.example.com");
        assert_eq!(client.model(), "test-model");
    }
}
