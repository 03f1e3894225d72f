//! Model transport (§4.5.1): a single non-streaming POST per call, with a
//! small retry budget for transient failures and OpenRouter-style
//! truncated-JSON decode errors. Grounded on `openRouterRequest` /
//! `openRouterToolStep` / `shouldRetryOpenRouter` / `isJSONTruncated`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use wsa_domain::config::ModelConfig;
use wsa_domain::error::{Error, Result};

#[derive(Debug, Clone, Serialize)]
pub struct ToolDefinition {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub function: ToolFunction,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolFunction {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    #[serde(default)]
    pub r#type: String,
    pub function: ToolCallFunction,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallFunction {
    pub name: String,
    pub arguments: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".into(),
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
            name: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
            name: None,
        }
    }

    pub fn assistant(content: Option<String>) -> Self {
        Self {
            role: "assistant".into(),
            content,
            tool_calls: None,
            tool_call_id: None,
            name: None,
        }
    }

    pub fn assistant_with_tool_calls(content: Option<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: "assistant".into(),
            content,
            tool_calls: Some(tool_calls),
            tool_call_id: None,
            name: None,
        }
    }

    pub fn tool_result(tool_call_id: String, name: String, content: String) -> Self {
        Self {
            role: "tool".into(),
            content: Some(content),
            tool_calls: None,
            tool_call_id: Some(tool_call_id),
            name: Some(name),
        }
    }
}

#[derive(Debug, Default)]
pub struct ModelReply {
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
    pub reasoning: String,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<ToolCall>,
    #[serde(default)]
    reasoning: Option<String>,
    #[serde(default)]
    reasoning_details: Vec<ReasoningDetail>,
}

#[derive(Deserialize)]
struct ReasoningDetail {
    #[serde(default)]
    summary: String,
    #[serde(default)]
    text: String,
    #[serde(default)]
    encrypted: String,
}

pub struct ModelTransport {
    client: reqwest::Client,
    config: ModelConfig,
}

impl ModelTransport {
    pub fn new(config: ModelConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .expect("reqwest client build");
        Self { client, config }
    }

    pub async fn chat(
        &self,
        model: &str,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> Result<ModelReply> {
        let mut body = serde_json::json!({
            "model": model,
            "stream": false,
            "messages": messages,
            "tools": tools,
        });
        if self.config.reasoning_enabled {
            body["reasoning"] = serde_json::json!({
                "effort": self.config.reasoning_effort,
                "exclude": false,
            });
        }

        let raw = self.post_with_retry(&body).await?;
        let parsed: ChatCompletionResponse = serde_json::from_slice(&raw)
            .map_err(|e| Error::Model(format!("decode: {e}")))?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| Error::Model("empty response".to_string()))?;

        let mut reasoning = choice
            .message
            .reasoning
            .unwrap_or_default()
            .trim()
            .to_string();
        if reasoning.is_empty() && !choice.message.reasoning_details.is_empty() {
            let parts: Vec<String> = choice
                .message
                .reasoning_details
                .into_iter()
                .filter_map(|d| {
                    if !d.summary.is_empty() {
                        Some(d.summary)
                    } else if !d.text.is_empty() {
                        Some(d.text)
                    } else if !d.encrypted.is_empty() {
                        Some(d.encrypted)
                    } else {
                        None
                    }
                })
                .collect();
            reasoning = parts.join("\n");
        }

        Ok(ModelReply {
            content: choice.message.content.unwrap_or_default(),
            tool_calls: choice.message.tool_calls,
            reasoning,
        })
    }

    async fn post_with_retry(&self, body: &Value) -> Result<bytes::Bytes> {
        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        let mut last_err = None;

        for attempt in 0..=self.config.retry_count {
            if attempt > 0 {
                tokio::time::sleep(Duration::from_millis(500)).await;
            }

            let api_key = self.config.api_key.as_deref().unwrap_or_default();
            let send_result = self
                .client
                .post(&url)
                .header("Authorization", format!("Bearer {api_key}"))
                .header("Content-Type", "application/json")
                .json(body)
                .send()
                .await;

            let resp = match send_result {
                Ok(r) => r,
                Err(e) => {
                    let retryable = e.is_timeout() || e.is_connect();
                    last_err = Some(Error::Model(e.to_string()));
                    if retryable && attempt < self.config.retry_count {
                        continue;
                    }
                    return Err(last_err.unwrap());
                }
            };

            let status = resp.status();
            if !status.is_success() {
                let retryable = status.as_u16() == 408 || status.as_u16() == 429 || status.is_server_error();
                let text = resp.text().await.unwrap_or_default();
                last_err = Some(Error::Model(format!("status {status}: {text}")));
                if retryable && attempt < self.config.retry_count {
                    continue;
                }
                return Err(last_err.unwrap());
            }

            let bytes = resp.bytes().await.map_err(|e| Error::Model(e.to_string()))?;
            // A premature JSON truncation from the upstream is retried like
            // a transient failure rather than surfaced to the caller.
            if serde_json::from_slice::<Value>(&bytes).is_err() && attempt < self.config.retry_count {
                last_err = Some(Error::Model("unexpected end of JSON input".to_string()));
                continue;
            }
            return Ok(bytes);
        }

        Err(last_err.unwrap_or_else(|| Error::Model("retry budget exhausted".to_string())))
    }
}
