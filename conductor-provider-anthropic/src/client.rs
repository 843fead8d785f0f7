//! Anthropic API client struct implementing [`LmClient`].

use crate::error::{map_http_status, map_reqwest_error};
use crate::mapping::{from_api_response, to_api_request};
use async_trait::async_trait;
use conductor_protocol::{LmClient, LmError, LmMessage};

/// Default model used when the client isn't configured with one.
const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

/// Default Anthropic API base URL.
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

/// Default response token budget for a ReAct reasoning call.
const DEFAULT_MAX_TOKENS: u32 = 1024;

/// Anthropic API version header value.
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// [`LmClient`] over the Anthropic Messages API, used non-streaming: the
/// ReAct loop only ever needs the final text reply (§4.3, §6 "ReAct
/// action format").
pub struct Anthropic {
    api_key: String,
    model: String,
    base_url: String,
    max_tokens: u32,
    client: reqwest::Client,
}

impl Anthropic {
    /// Create a new client with the given API key and sensible defaults.
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.into(),
            base_url: DEFAULT_BASE_URL.into(),
            max_tokens: DEFAULT_MAX_TOKENS,
            client: reqwest::Client::new(),
        }
    }

    /// Override the default model.
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Override the API base URL (for testing or a proxy).
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Override the response token budget.
    #[must_use]
    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    fn messages_url(&self) -> String {
        format!("{}/v1/messages", self.base_url)
    }
}

#[async_trait]
impl LmClient for Anthropic {
    async fn invoke(&self, messages: &[LmMessage]) -> Result<String, LmError> {
        let body = to_api_request(messages, &self.model, self.max_tokens);

        tracing::debug!(url = %self.messages_url(), model = %self.model, "sending reasoning request");

        let response = self
            .client
            .post(self.messages_url())
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        let response_text = response.text().await.map_err(map_reqwest_error)?;

        if !status.is_success() {
            return Err(map_http_status(status, &response_text));
        }

        let json: serde_json::Value = serde_json::from_str(&response_text)
            .map_err(|e| LmError::InvalidRequest(format!("invalid JSON response: {e}")))?;

        from_api_response(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_model_and_base_url_are_set() {
        let client = Anthropic::new("test-key");
        assert_eq!(client.model, DEFAULT_MODEL);
        assert_eq!(client.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn builders_override_defaults() {
        let client = Anthropic::new("test-key")
            .model("claude-opus-4-5")
            .base_url("http://localhost:9999")
            .max_tokens(256);
        assert_eq!(client.model, "claude-opus-4-5");
        assert_eq!(client.base_url, "http://localhost:9999");
        assert_eq!(client.max_tokens, 256);
    }

    #[test]
    fn messages_url_includes_path() {
        let client = Anthropic::new("test-key").base_url("http://localhost:9999");
        assert_eq!(client.messages_url(), "http://localhost:9999/v1/messages");
    }
}
