// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Default length, in characters, of a summary derived from a raw value.
pub const DEFAULT_SUMMARY_LIMIT: usize = 100;

/// Normalised result of a tool call.
///
/// `summary` is what the model sees; `content` carries the structured
/// payload for programmatic callers.  A set `error` marks the call as failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResponse {
    pub summary: String,
    #[serde(default)]
    pub content: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ToolResponse {
    pub fn ok(summary: impl Into<String>, content: Value) -> Self {
        Self { summary: summary.into(), content: Some(content), error: None }
    }

    /// Successful call with nothing beyond the summary.
    pub fn text(summary: impl Into<String>) -> Self {
        Self { summary: summary.into(), content: None, error: None }
    }

    /// Failed call whose summary is the error text itself.
    pub fn error(msg: impl Into<String>) -> Self {
        let msg = msg.into();
        Self { summary: msg.clone(), content: None, error: Some(msg) }
    }

    /// Failed call with a summary distinct from the raw error.
    pub fn failure(summary: impl Into<String>, error: impl Into<String>) -> Self {
        Self { summary: summary.into(), content: None, error: Some(error.into()) }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Text placed in the `tool` role message answering this call.
    pub fn message_text(&self) -> String {
        match &self.error {
            Some(e) => format!("Error executing tool: {e}"),
            None => self.summary.clone(),
        }
    }
}

/// What a tool body hands back before normalisation.
#[derive(Debug, Clone)]
pub enum ToolValue {
    /// Already normalised; passed through untouched.
    Response(ToolResponse),
    Text(String),
    Json(Value),
}

impl ToolValue {
    /// Turn the raw value into a [`ToolResponse`].  Non-response values use
    /// their string form, cut to `limit` characters plus `...`, as summary and
    /// keep the full value as content.
    pub fn normalize(self, limit: usize) -> ToolResponse {
        match self {
            ToolValue::Response(r) => r,
            ToolValue::Text(s) => ToolResponse::ok(truncate_summary(&s, limit), Value::String(s)),
            ToolValue::Json(v) => {
                let text = match &v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                ToolResponse::ok(truncate_summary(&text, limit), v)
            }
        }
    }
}

impl From<ToolResponse> for ToolValue {
    fn from(r: ToolResponse) -> Self {
        ToolValue::Response(r)
    }
}

impl From<String> for ToolValue {
    fn from(s: String) -> Self {
        ToolValue::Text(s)
    }
}

impl From<&str> for ToolValue {
    fn from(s: &str) -> Self {
        ToolValue::Text(s.to_string())
    }
}

impl From<Value> for ToolValue {
    fn from(v: Value) -> Self {
        ToolValue::Json(v)
    }
}

fn truncate_summary(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(limit).collect();
    cut.push_str("...");
    cut
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
