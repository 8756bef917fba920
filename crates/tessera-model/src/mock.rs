// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use async_trait::async_trait;

use crate::{CompletionRequest, CompletionResponse, Role, ToolCall, Usage};

/// Deterministic mock client for tests.  Echoes the last user message
/// back as the assistant response.
#[derive(Default)]
pub struct MockClient;

#[async_trait]
impl crate::CompletionClient for MockClient {
    fn name(&self) -> &str {
        "mock"
    }

    async fn complete(&self, req: CompletionRequest) -> anyhow::Result<CompletionResponse> {
        let reply = req
            .messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .and_then(|m| m.as_text())
            .unwrap_or("[no input]")
            .to_string();
        Ok(CompletionResponse::text(format!("MOCK: {reply}")).with_usage(Usage::new(10, 10)))
    }
}

/// One scripted outcome of a `complete` call.
#[derive(Debug, Clone)]
pub enum Script {
    Reply(CompletionResponse),
    /// The call fails with this message.
    Fail(String),
}

/// A pre-scripted mock client.  Each call to `complete` pops the next
/// script from the front of the queue.  This lets tests specify exact
/// response sequences – including tool calls and failures – without
/// network access.
pub struct ScriptedClient {
    scripts: Arc<Mutex<VecDeque<Script>>>,
    /// Every request seen by this client, in call order.
    pub requests: Arc<Mutex<Vec<CompletionRequest>>>,
}

impl ScriptedClient {
    pub fn new(scripts: Vec<Script>) -> Self {
        Self {
            scripts: Arc::new(Mutex::new(scripts.into())),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Build from a list of replies, none of which fail.
    pub fn replies(replies: Vec<CompletionResponse>) -> Self {
        Self::new(replies.into_iter().map(Script::Reply).collect())
    }

    /// Convenience: client that returns a single text reply.
    pub fn always_text(reply: impl Into<String>) -> Self {
        Self::replies(vec![CompletionResponse::text(reply).with_usage(Usage::new(5, 5))])
    }

    /// Convenience: one tool call round followed by a text reply.
    pub fn tool_then_text(
        tool_id: impl Into<String>,
        tool_name: impl Into<String>,
        args_json: impl Into<String>,
        final_text: impl Into<String>,
    ) -> Self {
        Self::replies(vec![
            CompletionResponse::tool_calls(vec![ToolCall::new(tool_id, tool_name, args_json)]),
            CompletionResponse::text(final_text),
        ])
    }

    /// Convenience: the first call fails.
    pub fn failing(message: impl Into<String>) -> Self {
        Self::new(vec![Script::Fail(message.into())])
    }

    /// Snapshot of the recorded requests.
    pub fn recorded(&self) -> Vec<CompletionRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }
}

#[async_trait]
impl crate::CompletionClient for ScriptedClient {
    fn name(&self) -> &str {
        "scripted-mock"
    }

    async fn complete(&self, req: CompletionRequest) -> anyhow::Result<CompletionResponse> {
        if let Ok(mut seen) = self.requests.lock() {
            seen.push(req);
        }
        let next = self
            .scripts
            .lock()
            .map_err(|_| anyhow!("script queue poisoned"))?
            .pop_front();
        match next {
            Some(Script::Reply(resp)) => Ok(resp),
            Some(Script::Fail(msg)) => Err(anyhow!(msg)),
            // Default fallback when all scripts are consumed
            None => Ok(CompletionResponse::text("[no more scripts]")),
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CompletionClient, Message};

    fn req() -> CompletionRequest {
        CompletionRequest { model: "m".into(), messages: vec![Message::user("hi")], tools: None }
    }

    #[tokio::test]
    async fn mock_echoes_last_user_message() {
        let resp = MockClient.complete(req()).await.unwrap();
        assert_eq!(resp.message.as_text(), Some("MOCK: hi"));
        assert_eq!(resp.usage.unwrap().total_tokens, 20);
    }

    #[tokio::test]
    async fn scripted_tool_then_text_two_rounds() {
        let c = ScriptedClient::tool_then_text("call-1", "get_memories", "{}", "done");
        let first = c.complete(req()).await.unwrap();
        assert!(first.wants_tools());
        assert_eq!(first.message.calls()[0].function.name, "get_memories");
        let second = c.complete(req()).await.unwrap();
        assert_eq!(second.message.as_text(), Some("done"));
        assert_eq!(c.call_count(), 2);
    }

    #[tokio::test]
    async fn scripted_failure_surfaces_as_error() {
        let c = ScriptedClient::failing("boom");
        let err = c.complete(req()).await.unwrap_err();
        assert!(err.to_string().contains("boom"));
    }

    #[tokio::test]
    async fn scripted_fallback_when_scripts_exhausted() {
        let c = ScriptedClient::new(vec![]);
        let resp = c.complete(req()).await.unwrap();
        assert!(resp.message.as_text().unwrap().contains("no more scripts"));
    }

    #[tokio::test]
    async fn scripted_records_requests() {
        let c = ScriptedClient::always_text("ok");
        c.complete(req()).await.unwrap();
        let seen = c.recorded();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].messages[0].as_text(), Some("hi"));
    }
}
