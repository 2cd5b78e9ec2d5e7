//! AI provider client
//!
//! One bounded, single-shot HTTP call per generation. The provider is a
//! black box: prompt in, text out. Failures surface the provider's own
//! message where available and are never retried here; the caller decides.

use std::time::Duration;

use serde_json::Value;
use thiserror::Error;

use super::prompts::Prompt;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider returned {status}: {message}")]
    Upstream { status: u16, message: String },
    #[error("provider request timed out")]
    Timeout,
    #[error("provider unreachable: {0}")]
    Network(String),
    #[error("provider response missing generated text")]
    MalformedResponse,
}

#[derive(Clone)]
pub struct ProviderClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
}

impl ProviderClient {
    pub fn new(base_url: &str, model: &str, timeout_secs: u64) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_default();

        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        }
    }

    /// Run one completion with the account's own API key.
    pub async fn complete(&self, api_key: &str, prompt: &Prompt) -> Result<String, ProviderError> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": prompt.system },
                { "role": "user", "content": prompt.user },
            ],
        });

        let response = self
            .http
            .post(&url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout
                } else {
                    ProviderError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        let payload = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(ProviderError::Upstream {
                status: status.as_u16(),
                message: extract_upstream_message(&payload),
            });
        }

        let parsed: Value =
            serde_json::from_str(&payload).map_err(|_| ProviderError::MalformedResponse)?;

        parsed["choices"][0]["message"]["content"]
            .as_str()
            .map(|s| s.to_string())
            .filter(|s| !s.is_empty())
            .ok_or(ProviderError::MalformedResponse)
    }
}

/// Pull the human-readable message out of an error body, falling back to a
/// truncated raw body so logs stay bounded.
fn extract_upstream_message(payload: &str) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(payload) {
        if let Some(msg) = value["error"]["message"].as_str() {
            return msg.to_string();
        }
        if let Some(msg) = value["message"].as_str() {
            return msg.to_string();
        }
    }
    payload.chars().take(200).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::prompts::Prompt;

    fn test_prompt() -> Prompt {
        Prompt {
            system: "You are a helpful assistant.".to_string(),
            user: "Say hi.".to_string(),
        }
    }

    #[tokio::test]
    async fn test_successful_completion() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .match_header("authorization", "Bearer sk-test")
            .with_status(200)
            .with_body(
                r#"{"choices": [{"message": {"role": "assistant", "content": "Hi there."}}]}"#,
            )
            .create_async()
            .await;

        let client = ProviderClient::new(&server.url(), "gpt-4o-mini", 5);
        let output = client.complete("sk-test", &test_prompt()).await.unwrap();

        assert_eq!(output, "Hi there.");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_upstream_error_surfaces_provider_message() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/chat/completions")
            .with_status(401)
            .with_body(r#"{"error": {"message": "Incorrect API key provided"}}"#)
            .create_async()
            .await;

        let client = ProviderClient::new(&server.url(), "gpt-4o-mini", 5);
        let err = client.complete("sk-bad", &test_prompt()).await.unwrap_err();

        match err {
            ProviderError::Upstream { status, message } => {
                assert_eq!(status, 401);
                assert_eq!(message, "Incorrect API key provided");
            }
            other => panic!("expected Upstream, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_malformed_success_body_is_an_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_body(r#"{"choices": []}"#)
            .create_async()
            .await;

        let client = ProviderClient::new(&server.url(), "gpt-4o-mini", 5);
        let err = client.complete("sk-test", &test_prompt()).await.unwrap_err();
        assert!(matches!(err, ProviderError::MalformedResponse));
    }

    #[test]
    fn test_extract_upstream_message_fallback() {
        assert_eq!(
            extract_upstream_message(r#"{"error":{"message":"quota exceeded"}}"#),
            "quota exceeded"
        );
        assert_eq!(extract_upstream_message("plain text error"), "plain text error");
        let long = "x".repeat(500);
        assert_eq!(extract_upstream_message(&long).len(), 200);
    }
}
