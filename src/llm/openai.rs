//! Client for OpenAI-compatible chat completions endpoints.
//!
//! OpenAI itself, OpenRouter, vLLM and similar gateways all accept the same
//! `POST {base_url}/chat/completions` body.

use super::provider::{CompletionOptions, LlmError, LlmProvider};
use super::types::{Completion, Message};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

/// Where the bearer token comes from.
#[derive(Debug, Clone)]
pub enum ApiKeySource {
    None,
    Static(String),
    /// Read from the environment before each request.
    Env(String),
}

impl ApiKeySource {
    fn resolve(&self) -> Result<Option<String>, LlmError> {
        match self {
            ApiKeySource::None => Ok(None),
            ApiKeySource::Static(key) => Ok(Some(key.clone())),
            ApiKeySource::Env(var) => std::env::var(var)
                .ok()
                .map(|key| key.trim().to_string())
                .filter(|key| !key.is_empty())
                .map(Some)
                .ok_or_else(|| {
                    LlmError::Connection(format!("API key environment variable {} is not set", var))
                }),
        }
    }

    fn authorize(&self, request: RequestBuilder) -> Result<RequestBuilder, LlmError> {
        Ok(match self.resolve()? {
            Some(key) => request.bearer_auth(key),
            None => request,
        })
    }
}

pub struct OpenAIProvider {
    client: Client,
    base_url: String,
    model: String,
    api_key: ApiKeySource,
}

impl OpenAIProvider {
    /// `base_url` is the API root, e.g. `https://api.openai.com/v1`.
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: ApiKeySource,
    ) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key,
        }
    }

    fn request_body(&self, messages: &[Message], options: &CompletionOptions) -> serde_json::Value {
        let mut body = json!({
            "model": self.model,
            "messages": messages,
            "temperature": options.temperature,
        });
        if let Some(max_tokens) = options.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }
        if options.json_response {
            body["response_format"] = json!({ "type": "json_object" });
        }
        body
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

impl ChatResponse {
    fn into_completion(self) -> Result<Completion, LlmError> {
        let choice = self
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::InvalidResponse("response has no choices".to_string()))?;
        Ok(Completion {
            content: choice.message.content.unwrap_or_default(),
            truncated: choice.finish_reason.as_deref() == Some("length"),
        })
    }
}

fn transport_error(e: reqwest::Error) -> LlmError {
    if e.is_timeout() {
        LlmError::Timeout
    } else if e.is_decode() {
        LlmError::InvalidResponse(e.to_string())
    } else {
        LlmError::Connection(e.to_string())
    }
}

#[async_trait]
impl LlmProvider for OpenAIProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(
        &self,
        messages: &[Message],
        options: &CompletionOptions,
    ) -> Result<Completion, LlmError> {
        let request = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .json(&self.request_body(messages, options))
            .timeout(options.timeout);

        debug!(model = %self.model, messages = messages.len(), "Sending chat completion request");
        let response = self
            .api_key
            .authorize(request)?
            .send()
            .await
            .map_err(transport_error)?;

        match response.status() {
            StatusCode::TOO_MANY_REQUESTS => return Err(LlmError::RateLimited),
            status if !status.is_success() => {
                return Err(LlmError::Api {
                    status: status.as_u16(),
                    message: response.text().await.unwrap_or_default(),
                });
            }
            _ => {}
        }

        let completion = response
            .json::<ChatResponse>()
            .await
            .map_err(transport_error)?
            .into_completion()?;
        debug!(
            truncated = completion.truncated,
            chars = completion.content.len(),
            "Chat completion received"
        );
        Ok(completion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn provider() -> OpenAIProvider {
        OpenAIProvider::new("http://localhost:8000/v1/", "m", ApiKeySource::None)
    }

    #[test]
    fn body_carries_optional_fields_only_when_set() {
        let options = CompletionOptions {
            temperature: 0.3,
            max_tokens: None,
            timeout: Duration::from_secs(1),
            json_response: true,
        };
        let body = provider().request_body(&[Message::user("hi")], &options);
        assert_eq!(body["response_format"]["type"], "json_object");
        assert_eq!(body["messages"][0]["role"], "user");
        assert!(body.get("max_tokens").is_none());
    }

    #[test]
    fn length_finish_is_truncated() {
        let raw = r#"{"choices": [{"message": {"content": "{\"tracks\": ["},
                       "finish_reason": "length"}]}"#;
        let parsed: ChatResponse = serde_json::from_str(raw).unwrap();
        let completion = parsed.into_completion().unwrap();
        assert!(completion.truncated);

        let empty: ChatResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        assert!(matches!(empty.into_completion(), Err(LlmError::InvalidResponse(_))));
    }

    #[test]
    fn missing_env_key_is_connection_error() {
        let source = ApiKeySource::Env("CHOREO_TEST_KEY_THAT_IS_NEVER_SET".to_string());
        assert!(matches!(source.resolve(), Err(LlmError::Connection(_))));
        assert!(ApiKeySource::None.resolve().unwrap().is_none());
    }

    #[test]
    fn base_url_trailing_slash_is_dropped() {
        let provider = provider();
        assert_eq!(provider.base_url, "http://localhost:8000/v1");
        assert_eq!(provider.model(), "m");
    }
}
