// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! YAML-configured mock completion client for end-to-end runs.
//!
//! The client reads a YAML file that maps input patterns to canned
//! responses (text only, or a tool-call round followed by a final
//! text reply).
//!
//! # YAML format
//!
//! ```yaml
//! responses:
//!   - match_type: contains       # contains | equals | starts_with | regex | default
//!     pattern: "ping"
//!     reply: "pong"
//!
//!   - match_type: contains
//!     pattern: "remember"
//!     tool_calls:
//!       - id: tc-1
//!         tool: add_memory
//!         args:
//!           content: "likes tea"
//!           importance: 7
//!     after_tool_reply: "Noted."
//!
//!   - match_type: default
//!     reply: "I understand your request."
//! ```
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{CompletionRequest, CompletionResponse, Role, ToolCall, Usage};

// ─── YAML schema ─────────────────────────────────────────────────────────────

/// Root document.
#[derive(Debug, Deserialize)]
pub struct MockConfig {
    pub responses: Vec<ResponseRule>,
}

/// One entry in the responses list.
#[derive(Debug, Deserialize)]
pub struct ResponseRule {
    /// How to match the last user message.
    pub match_type: MatchType,
    /// Pattern string (ignored for `default` match type).
    #[serde(default)]
    pub pattern: String,
    /// Simple text reply (used when there are no tool_calls, or as the
    /// after-tool reply when tool_calls is also set).
    pub reply: Option<String>,
    /// Tool calls to emit in the first round.
    #[serde(default)]
    pub tool_calls: Vec<ToolCallDef>,
    /// Text reply to send after tool results arrive (second round).
    pub after_tool_reply: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    Contains,
    Equals,
    StartsWith,
    Regex,
    Default,
}

/// A single tool call defined in the YAML.
#[derive(Debug, Deserialize)]
pub struct ToolCallDef {
    pub id: String,
    pub tool: String,
    /// YAML map that is serialized to a JSON string for the tool arguments.
    pub args: serde_json::Value,
}

// ─── Client ──────────────────────────────────────────────────────────────────

/// A completion client whose responses are driven by a YAML configuration
/// file.  Lets the CLI run end-to-end without network access.
pub struct YamlMockClient {
    config: Arc<MockConfig>,
    call_count: AtomicU32,
}

impl YamlMockClient {
    /// Load a client from a YAML file at `path`.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading mock responses file: {}", path.display()))?;
        Self::load(&text)
    }

    /// Load a client from a YAML string.
    pub fn load(yaml: &str) -> anyhow::Result<Self> {
        let config: MockConfig = serde_yaml::from_str(yaml)
            .context("parsing mock responses YAML")?;
        Ok(Self {
            config: Arc::new(config),
            call_count: AtomicU32::new(0),
        })
    }

    fn find_rule<'a>(&'a self, user_text: &str) -> Option<&'a ResponseRule> {
        let lower = user_text.to_lowercase();
        let mut default_rule = None;

        for rule in &self.config.responses {
            let hit = match rule.match_type {
                MatchType::Default => {
                    default_rule = Some(rule);
                    false
                }
                MatchType::Contains => lower.contains(&rule.pattern.to_lowercase()),
                MatchType::Equals => lower == rule.pattern.to_lowercase(),
                MatchType::StartsWith => lower.starts_with(&rule.pattern.to_lowercase()),
                MatchType::Regex => regex::Regex::new(&rule.pattern)
                    .map(|re| re.is_match(user_text))
                    .unwrap_or(false),
            };
            if hit {
                return Some(rule);
            }
        }

        default_rule
    }
}

#[async_trait]
impl crate::CompletionClient for YamlMockClient {
    fn name(&self) -> &str {
        "yaml-mock"
    }

    async fn complete(&self, req: CompletionRequest) -> anyhow::Result<CompletionResponse> {
        let call_num = self.call_count.fetch_add(1, Ordering::Relaxed) + 1;

        // The current turn starts at the last user message; tool results
        // after it mean the first round already ran.
        let last_user = req.messages.iter().rposition(|m| m.role == Role::User);
        let has_tool_results = last_user
            .map(|i| req.messages[i..].iter().any(|m| m.role == Role::Tool))
            .unwrap_or(false);

        let last_user_text = last_user
            .and_then(|i| req.messages[i].as_text())
            .unwrap_or("[no user message]")
            .to_string();

        debug!(call_num, has_tool_results, last_user = %last_user_text, "yaml mock complete()");

        let rule = self.find_rule(&last_user_text);

        let resp = if has_tool_results {
            let text = rule
                .and_then(|r| r.after_tool_reply.as_deref().or(r.reply.as_deref()))
                .unwrap_or("[no after-tool reply configured]");
            text_response(text)
        } else {
            match rule {
                None => text_response("[no mock rule matched]"),
                Some(r) if r.tool_calls.is_empty() => {
                    text_response(r.reply.as_deref().unwrap_or("[no reply configured]"))
                }
                Some(r) => CompletionResponse::tool_calls(
                    r.tool_calls
                        .iter()
                        .map(|tc| ToolCall::new(tc.id.clone(), tc.tool.clone(), tc.args.to_string()))
                        .collect(),
                ),
            }
        };
        Ok(resp)
    }
}

fn text_response(text: &str) -> CompletionResponse {
    CompletionResponse::text(text).with_usage(Usage::new(5, text.len() as u64 / 4 + 1))
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
