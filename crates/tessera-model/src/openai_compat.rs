// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Client for OpenAI-compatible chat completion APIs.
//!
//! Speaks the non-streaming `/chat/completions` wire format used by OpenAI
//! and by most gateways and local servers (LiteLLM, vLLM, Ollama).
//!
//! # Auth styles
//! - `Bearer` — `Authorization: Bearer <key>` (most providers)
//! - `None` — no authentication header (local servers)

use std::time::Duration;

use anyhow::{bail, Context};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::{CompletionRequest, CompletionResponse, Message, Usage};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// How to send the API key in HTTP requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthStyle {
    Bearer,
    None,
}

/// OpenAI-compatible chat completion client.
pub struct OpenAiClient {
    /// Full chat completions URL, e.g. `https://api.openai.com/v1/chat/completions`.
    chat_url: String,
    /// API key (pre-resolved from config or env).
    api_key: Option<String>,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
    auth_style: AuthStyle,
    client: reqwest::Client,
}

impl OpenAiClient {
    /// `base_url` ends **before** `/chat/completions`; `None` selects the
    /// public OpenAI endpoint. A missing key on a custom base URL switches
    /// to unauthenticated requests.
    pub fn new(
        api_key: Option<String>,
        base_url: Option<&str>,
        max_tokens: Option<u32>,
        temperature: Option<f32>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let base = base_url.unwrap_or(DEFAULT_BASE_URL).trim_end_matches('/');
        let auth_style = if api_key.is_none() && base_url.is_some() {
            AuthStyle::None
        } else {
            AuthStyle::Bearer
        };
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("building HTTP client")?;
        Ok(Self {
            chat_url: format!("{base}/chat/completions"),
            api_key,
            max_tokens,
            temperature,
            auth_style,
            client,
        })
    }

    pub fn chat_url(&self) -> &str {
        &self.chat_url
    }

    fn build_body(&self, req: &CompletionRequest) -> anyhow::Result<Value> {
        let mut body = json!({
            "model": req.model,
            "messages": serde_json::to_value(&req.messages).context("encoding messages")?,
        });
        if let Some(tools) = req.tools.as_ref().filter(|t| !t.is_empty()) {
            body["tools"] = json!(tools);
        }
        if let Some(max) = self.max_tokens {
            body["max_tokens"] = json!(max);
        }
        if let Some(t) = self.temperature {
            body["temperature"] = json!(t);
        }
        Ok(body)
    }
}

// ─── Wire response ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
    #[serde(default)]
    finish_reason: Option<String>,
}

/// Decode a raw chat-completions body into the first choice.
fn parse_response(raw: &str) -> anyhow::Result<CompletionResponse> {
    let parsed: ChatResponse =
        serde_json::from_str(raw).context("decoding chat completion response")?;
    let Some(choice) = parsed.choices.into_iter().next() else {
        bail!("chat completion response has no choices");
    };
    Ok(CompletionResponse {
        message: choice.message,
        finish_reason: choice.finish_reason.unwrap_or_else(|| "stop".into()),
        usage: parsed.usage,
    })
}

#[async_trait]
impl crate::CompletionClient for OpenAiClient {
    fn name(&self) -> &str {
        "openai"
    }

    async fn complete(&self, req: CompletionRequest) -> anyhow::Result<CompletionResponse> {
        let body = self.build_body(&req)?;

        debug!(
            model = %req.model,
            tool_count = req.tools.as_ref().map_or(0, Vec::len),
            message_count = req.messages.len(),
            "sending completion request"
        );
        tracing::trace!(request_body = ?body, "full completion request");

        let mut http_req = self.client.post(&self.chat_url).json(&body);
        if self.auth_style == AuthStyle::Bearer {
            let key = self
                .api_key
                .as_deref()
                .context("API key not set; provide api_key or api_key_env in config")?;
            http_req = http_req.bearer_auth(key);
        }

        let resp = http_req.send().await.context("completion request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            bail!("completion error {status}: {text}");
        }

        let text = resp.text().await.context("reading completion response body")?;
        parse_response(&text)
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Role, ToolCall};

    fn client() -> OpenAiClient {
        OpenAiClient::new(Some("k".into()), None, Some(256), Some(0.5), Duration::from_secs(5))
            .unwrap()
    }

    #[test]
    fn chat_url_appends_path_and_trims_slash() {
        let c = OpenAiClient::new(None, Some("http://localhost:8080/v1/"), None, None, Duration::from_secs(1))
            .unwrap();
        assert_eq!(c.chat_url(), "http://localhost:8080/v1/chat/completions");
        assert_eq!(c.auth_style, AuthStyle::None);
    }

    #[test]
    fn default_base_uses_bearer() {
        assert_eq!(client().auth_style, AuthStyle::Bearer);
        assert!(client().chat_url().starts_with(DEFAULT_BASE_URL));
    }

    #[test]
    fn body_omits_tools_when_none() {
        let req = CompletionRequest { model: "gpt-4".into(), messages: vec![Message::user("hi")], tools: None };
        let body = client().build_body(&req).unwrap();
        assert!(body.get("tools").is_none());
        assert_eq!(body["max_tokens"], 256);
        assert_eq!(body["messages"][0]["content"], "hi");
    }

    #[test]
    fn body_includes_tools_when_present() {
        let schema = json!({"type": "function", "function": {"name": "f"}});
        let req = CompletionRequest {
            model: "gpt-4".into(),
            messages: vec![],
            tools: Some(vec![schema.clone()]),
        };
        let body = client().build_body(&req).unwrap();
        assert_eq!(body["tools"][0], schema);
    }

    #[test]
    fn parse_response_with_tool_calls_and_usage() {
        let raw = r#"{
            "choices": [{
                "message": {"role": "assistant", "content": null, "tool_calls": [
                    {"id": "call_1", "type": "function",
                     "function": {"name": "get_memories", "arguments": "{}"}}
                ]},
                "finish_reason": "tool_calls"
            }],
            "usage": {"prompt_tokens": 12, "completion_tokens": 3, "total_tokens": 15}
        }"#;
        let resp = parse_response(raw).unwrap();
        assert!(resp.wants_tools());
        assert_eq!(resp.message.role, Role::Assistant);
        assert_eq!(resp.message.calls(), &[ToolCall::new("call_1", "get_memories", "{}")]);
        assert_eq!(resp.usage, Some(Usage::new(12, 3)));
    }

    #[test]
    fn parse_response_without_usage() {
        let raw = r#"{"choices":[{"message":{"role":"assistant","content":"hi"},"finish_reason":"stop"}]}"#;
        let resp = parse_response(raw).unwrap();
        assert_eq!(resp.message.as_text(), Some("hi"));
        assert!(resp.usage.is_none());
    }

    #[test]
    fn parse_response_rejects_empty_choices() {
        assert!(parse_response(r#"{"choices":[]}"#).is_err());
    }
}
