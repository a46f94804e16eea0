//! OpenAI API client implementation
//!
//! Implements the LlmClient trait for OpenAI's Chat Completions API. Each call
//! makes exactly one HTTP attempt; retry policy belongs to the caller.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{CompletionRequest, CompletionResponse, LlmClient, LlmError, StopReason, TokenUsage};
use crate::config::LlmConfig;
use crate::credentials::CredentialStore;

/// OpenAI API client
pub struct OpenAIClient {
    model: String,
    base_url: String,
    http: Client,
    max_tokens: u32,
    timeout: Duration,
    credentials: Arc<dyn CredentialStore>,
}

impl OpenAIClient {
    /// Create a new client from configuration
    ///
    /// The API key is not read here; it is fetched from `credentials` per request.
    pub fn from_config(config: &LlmConfig, credentials: Arc<dyn CredentialStore>) -> Result<Self, LlmError> {
        debug!(model = %config.model, base_url = %config.base_url, "from_config: called");
        let timeout = Duration::from_millis(config.timeout_ms);

        let http = Client::builder().timeout(timeout).build().map_err(LlmError::Network)?;

        Ok(Self {
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            http,
            max_tokens: config.max_tokens,
            timeout,
            credentials,
        })
    }

    /// Chat Completions body for `request`
    fn build_request_body<'a>(&'a self, request: &'a CompletionRequest) -> ChatBody<'a> {
        debug!(%self.model, %request.max_tokens, json_mode = %request.json_mode, "build_request_body: called");

        let messages = std::iter::once(ChatMessage {
            role: "system",
            content: &request.system_prompt,
        })
        .chain(request.messages.iter().map(|m| ChatMessage {
            role: m.role.as_str(),
            content: &m.content,
        }))
        .collect();

        let limit = request.max_tokens.min(self.max_tokens);
        // Reasoning models only accept max_completion_tokens
        let (max_tokens, max_completion_tokens) = if uses_completion_tokens(&self.model) {
            (None, Some(limit))
        } else {
            (Some(limit), None)
        };

        ChatBody {
            model: &self.model,
            messages,
            max_tokens,
            max_completion_tokens,
            response_format: request.json_mode.then_some(ResponseFormat { kind: "json_object" }),
        }
    }

    /// Parse the OpenAI API response
    fn parse_response(&self, api_response: OpenAIResponse) -> CompletionResponse {
        debug!(choices = %api_response.choices.len(), "parse_response: called");
        let (content, stop_reason) = match api_response.choices.into_iter().next() {
            Some(c) => (c.message.content, StopReason::from_openai(c.finish_reason.as_deref())),
            None => (None, StopReason::EndTurn),
        };

        let usage = api_response
            .usage
            .map(|u| TokenUsage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
            })
            .unwrap_or_default();

        CompletionResponse {
            content,
            stop_reason,
            usage,
        }
    }
}

#[async_trait]
impl LlmClient for OpenAIClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        debug!(%self.model, %request.max_tokens, "complete: called");
        let api_key = self.credentials.api_key().ok_or(LlmError::MissingApiKey)?;
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = self.build_request_body(&request);

        let response = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {}", api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    debug!("complete: request timed out");
                    LlmError::Timeout(self.timeout)
                } else {
                    debug!(error = %e, "complete: network error");
                    LlmError::Network(e)
                }
            })?;

        let status = response.status().as_u16();

        if status == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(60);
            warn!(retry_after, "complete: rate limited (429)");

            return Err(LlmError::RateLimited {
                retry_after: Duration::from_secs(retry_after),
            });
        }

        if !response.status().is_success() {
            debug!(%status, "complete: API error");
            let text = response.text().await.unwrap_or_default();
            return Err(LlmError::ApiError { status, message: text });
        }

        let text = response.text().await?;
        let api_response = decode_response(&text)?;
        let parsed = self.parse_response(api_response);
        debug!(
            input_tokens = parsed.usage.input_tokens,
            output_tokens = parsed.usage.output_tokens,
            "complete: success"
        );
        Ok(parsed)
    }
}

/// A 2xx body that is not a chat completion is a bad answer, not a network fault
fn decode_response(text: &str) -> Result<OpenAIResponse, LlmError> {
    serde_json::from_str(text).map_err(|e| {
        debug!(error = %e, "decode_response: unexpected body");
        LlmError::InvalidResponse(format!("undecodable completion body: {}", e))
    })
}

fn uses_completion_tokens(model: &str) -> bool {
    ["gpt-5", "o1", "o3", "o4"].iter().any(|prefix| model.starts_with(prefix))
}

// Chat Completions wire types

#[derive(Debug, Serialize)]
struct ChatBody<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_completion_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::StaticCredentials;
    use crate::llm::Message;

    fn client(model: &str, max_tokens: u32) -> OpenAIClient {
        let config = LlmConfig {
            model: model.to_string(),
            max_tokens,
            base_url: "https://api.openai.com/".to_string(),
            ..Default::default()
        };
        OpenAIClient::from_config(&config, Arc::new(StaticCredentials::new("sk-test"))).unwrap()
    }

    #[test]
    fn test_undecodable_body_is_invalid_response() {
        let err = decode_response("<html>gateway maintenance</html>").unwrap_err();
        assert!(matches!(err, LlmError::InvalidResponse(_)));
        assert!(!err.is_transient());

        let err = decode_response(r#"{"choices": "none"}"#).unwrap_err();
        assert!(matches!(err, LlmError::InvalidResponse(_)));
    }

    #[test]
    fn test_decode_well_formed_body() {
        let body = r#"{"choices":[{"message":{"content":"{\"intents\":[]}"},"finish_reason":"stop"}],
            "usage":{"prompt_tokens":12,"completion_tokens":3}}"#;
        let parsed = client("gpt-4o", 1000).parse_response(decode_response(body).unwrap());
        assert_eq!(parsed.content.as_deref(), Some(r#"{"intents":[]}"#));
    }

    #[test]
    fn test_build_request_body_basic() {
        let client = client("gpt-4o", 8192);

        let request = CompletionRequest {
            system_prompt: "You are helpful".to_string(),
            messages: vec![Message::user("Hello"), Message::assistant("Hi"), Message::user("List venues")],
            max_tokens: 1000,
            json_mode: false,
        };

        let body = serde_json::to_value(client.build_request_body(&request)).unwrap();

        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["max_tokens"], 1000);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][0]["content"], "You are helpful");
        assert_eq!(body["messages"][2]["role"], "assistant");
        assert_eq!(body["messages"][3]["content"], "List venues");
        assert!(body.get("response_format").is_none());
    }

    #[test]
    fn test_json_mode_sets_response_format() {
        let client = client("gpt-4o-mini", 4096);
        let request = CompletionRequest {
            system_prompt: "Schema".to_string(),
            messages: vec![Message::user("List venues")],
            max_tokens: 500,
            json_mode: true,
        };

        let body = serde_json::to_value(client.build_request_body(&request)).unwrap();
        assert_eq!(body["response_format"]["type"], "json_object");
    }

    #[test]
    fn test_max_tokens_capped() {
        let client = client("gpt-4o", 1000);
        let request = CompletionRequest {
            system_prompt: "Test".to_string(),
            messages: vec![],
            max_tokens: 5000,
            json_mode: false,
        };

        let body = serde_json::to_value(client.build_request_body(&request)).unwrap();
        assert_eq!(body["max_tokens"], 1000);
    }

    #[test]
    fn test_completion_tokens_for_newer_models() {
        let client = client("gpt-5-mini", 4096);
        let request = CompletionRequest {
            system_prompt: "Test".to_string(),
            messages: vec![],
            max_tokens: 100,
            json_mode: false,
        };

        let body = serde_json::to_value(client.build_request_body(&request)).unwrap();
        assert_eq!(body["max_completion_tokens"], 100);
        assert!(body.get("max_tokens").is_none());
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = client("gpt-4o", 1000);
        assert_eq!(client.base_url, "https://api.openai.com");
    }

    #[test]
    fn test_parse_response() {
        let client = client("gpt-4o", 1000);
        let api_response: OpenAIResponse = serde_json::from_value(serde_json::json!({
            "choices": [{
                "message": { "role": "assistant", "content": "{\"intents\": []}" },
                "finish_reason": "stop"
            }],
            "usage": { "prompt_tokens": 120, "completion_tokens": 8, "total_tokens": 128 }
        }))
        .unwrap();

        let response = client.parse_response(api_response);
        assert_eq!(response.content.as_deref(), Some("{\"intents\": []}"));
        assert_eq!(response.stop_reason, StopReason::EndTurn);
        assert_eq!(response.usage.input_tokens, 120);
        assert_eq!(response.usage.output_tokens, 8);
    }

    #[tokio::test]
    async fn test_missing_key_fails_before_network() {
        let config = LlmConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            ..Default::default()
        };
        let client = OpenAIClient::from_config(&config, Arc::new(StaticCredentials::none())).unwrap();
        let request = CompletionRequest {
            system_prompt: "Test".to_string(),
            messages: vec![],
            max_tokens: 10,
            json_mode: true,
        };

        let err = client.complete(request).await.unwrap_err();
        assert!(matches!(err, LlmError::MissingApiKey));
    }
}
