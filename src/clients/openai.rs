//! OpenAI-compatible chat-completions client

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::clients::traits::{ChatMessage, ClientError, Completion, CompletionOptions, LlmClient};

pub struct OpenAiClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    timeout_ms: u64,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatUsage {
    #[serde(default)]
    total_tokens: u64,
}

impl OpenAiClient {
    pub fn new(base_url: &str, api_key: String, timeout_ms: u64) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .map_err(|e| ClientError::Transport(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            timeout_ms,
        })
    }

    fn map_send_error(&self, e: reqwest::Error) -> ClientError {
        if e.is_timeout() {
            ClientError::Timeout {
                timeout_ms: self.timeout_ms,
            }
        } else {
            ClientError::Transport(e.to_string())
        }
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(
        &self,
        model: &str,
        messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> Result<Completion, ClientError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = ChatRequest {
            model,
            messages,
            max_tokens: options.max_tokens,
            temperature: options.temperature,
            response_format: options.json_mode.then_some(ResponseFormat {
                kind: "json_object",
            }),
        };
        debug!(
            "chat completion request (model={}, messages={}, max_tokens={})",
            model,
            messages.len(),
            options.max_tokens
        );

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read response body".to_string());
            return Err(ClientError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = resp
            .json()
            .await
            .map_err(|e| ClientError::Parse(e.to_string()))?;
        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .ok_or_else(|| ClientError::Parse("completion carried no choices".to_string()))?;

        Ok(Completion {
            text,
            total_tokens: parsed.usage.map(|u| u.total_tokens).unwrap_or(0),
            model: parsed.model.unwrap_or_else(|| model.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_sets_json_format_only_when_asked() {
        let messages = vec![ChatMessage::user("hi")];
        let with_json = ChatRequest {
            model: "m",
            messages: &messages,
            max_tokens: 10,
            temperature: 0.0,
            response_format: Some(ResponseFormat {
                kind: "json_object",
            }),
        };
        let v = serde_json::to_value(&with_json).unwrap();
        assert_eq!(v["response_format"]["type"], "json_object");
        assert_eq!(v["messages"][0]["role"], "user");

        let plain = ChatRequest {
            response_format: None,
            ..with_json
        };
        let v = serde_json::to_value(&plain).unwrap();
        assert!(v.get("response_format").is_none());
    }

    #[test]
    fn response_tolerates_missing_usage() {
        let raw = r#"{"choices":[{"message":{"content":" {\"a\":1} "}}]}"#;
        let parsed: ChatResponse = serde_json::from_str(raw).unwrap();
        assert!(parsed.usage.is_none());
        assert_eq!(
            parsed.choices[0].message.content.as_deref(),
            Some(" {\"a\":1} ")
        );
    }
}
