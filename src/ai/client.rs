//! Completion service client.
//!
//! The bridge only depends on [`CompletionService`]; [`OpenAiClient`] is the
//! implementation used in production and speaks the OpenAI chat-completions
//! wire format.

use std::time::Duration;

use futures::future::BoxFuture;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::transcript::ChatTurn;
use crate::config::AiConfig;
use crate::error::{HuddleError, Result};

/// Connect timeout in seconds.
const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Longest error body echoed into an error message.
const MAX_ERROR_BODY: usize = 240;

/// User agent string for completion requests.
const USER_AGENT: &str = "huddle/0.1 (chat relay)";

/// A text-completion backend.
pub trait CompletionService: Send + Sync {
    /// Produce the next assistant message for `transcript`.
    fn complete<'a>(&'a self, transcript: &'a [ChatTurn]) -> BoxFuture<'a, Result<String>>;
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatTurn],
    seed: i64,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Client for an OpenAI-compatible `/chat/completions` endpoint.
pub struct OpenAiClient {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
    seed: i64,
}

impl OpenAiClient {
    /// Create a client from configuration.
    pub fn new(config: &AiConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(config.timeout())
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| HuddleError::Completion(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: completions_endpoint(&config.base_url),
            api_key: config.api_key.trim().to_string(),
            model: config.model.clone(),
            seed: config.seed,
        })
    }

    /// Full URL requests are posted to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn request(&self, transcript: &[ChatTurn]) -> Result<String> {
        let body = serde_json::to_vec(&CompletionRequest {
            model: &self.model,
            messages: transcript,
            seed: self.seed,
        })
        .map_err(|e| HuddleError::Completion(format!("failed to encode request: {e}")))?;

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| HuddleError::Completion(format!("request failed: {e}")))?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| HuddleError::Completion(format!("failed to read response: {e}")))?;

        if !status.is_success() {
            let text = String::from_utf8_lossy(&bytes);
            let snippet: String = text.chars().take(MAX_ERROR_BODY).collect();
            return Err(HuddleError::Completion(format!(
                "HTTP error: {status}: {snippet}"
            )));
        }

        parse_response(&bytes)
    }
}

impl CompletionService for OpenAiClient {
    fn complete<'a>(&'a self, transcript: &'a [ChatTurn]) -> BoxFuture<'a, Result<String>> {
        Box::pin(self.request(transcript))
    }
}

fn completions_endpoint(base_url: &str) -> String {
    format!("{}/chat/completions", base_url.trim_end_matches('/'))
}

/// Extract the first choice's text from a response body.
fn parse_response(bytes: &[u8]) -> Result<String> {
    let response: CompletionResponse = serde_json::from_slice(bytes)
        .map_err(|e| HuddleError::Completion(format!("invalid response: {e}")))?;

    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| HuddleError::Completion("response contained no message".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completions_endpoint() {
        assert_eq!(
            completions_endpoint("https://api.openai.com/v1"),
            "https://api.openai.com/v1/chat/completions"
        );
        assert_eq!(
            completions_endpoint("http://localhost:8080/v1/"),
            "http://localhost:8080/v1/chat/completions"
        );
    }

    #[test]
    fn test_client_from_config() {
        let config = AiConfig {
            api_key: " sk-test ".to_string(),
            base_url: "http://127.0.0.1:9/v1/".to_string(),
            ..AiConfig::default()
        };
        let client = OpenAiClient::new(&config).unwrap();
        assert_eq!(client.endpoint(), "http://127.0.0.1:9/v1/chat/completions");
        assert_eq!(client.api_key, "sk-test");
        assert_eq!(client.model, "gpt-4.1-mini");
    }

    #[test]
    fn test_request_body_shape() {
        let turns = vec![ChatTurn::system("be brief"), ChatTurn::user("Alice", "hi")];
        let request = CompletionRequest {
            model: "gpt-4.1-mini",
            messages: &turns,
            seed: 0,
        };

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "model": "gpt-4.1-mini",
                "seed": 0,
                "messages": [
                    {"role": "system", "content": "be brief"},
                    {"role": "user", "content": "Alice: hi"}
                ]
            })
        );
    }

    #[test]
    fn test_parse_response() {
        let body = br#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":"lowkey fire"}}]}"#;
        assert_eq!(parse_response(body).unwrap(), "lowkey fire");
    }

    #[test]
    fn test_parse_response_without_choices() {
        let result = parse_response(br#"{"choices":[]}"#);
        assert!(matches!(result, Err(HuddleError::Completion(_))));
    }

    #[test]
    fn test_parse_response_null_content() {
        let body = br#"{"choices":[{"message":{"role":"assistant","content":null}}]}"#;
        assert!(parse_response(body).is_err());
    }

    #[test]
    fn test_parse_response_garbage() {
        assert!(parse_response(b"<html>bad gateway</html>").is_err());
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_an_error() {
        let config = AiConfig {
            api_key: "sk-test".to_string(),
            base_url: "http://127.0.0.1:9/v1".to_string(),
            timeout_secs: 2,
            ..AiConfig::default()
        };
        let client = OpenAiClient::new(&config).unwrap();

        let result = client.complete(&[ChatTurn::user("Alice", "hi")]).await;
        assert!(matches!(result, Err(HuddleError::Completion(_))));
    }
}
