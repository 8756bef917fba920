// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::Arc;

use anyhow::Context as _;
use serde_json::Value;
use tracing::{debug, error, warn};

use tessera_config::AgentConfig;
use tessera_model::{CompletionClient, CompletionRequest, CompletionResponse, Message, ToolCall, Usage};
use tessera_tools::{AgentIdentity, Tool, ToolCtx, ToolObserver, ToolRegistry, ToolResponse};

use crate::context::{Context, ContextData};
use crate::error::AgentError;
use crate::prompts::{context_prompt, system_prompt, CONSTITUTION, TURN_FAILED_REPLY};

const TOOL_ROUND_LIMIT_REACHED: &str = "tool round limit reached";

/// The core agent.  Owns identity, message log, contexts and tools, and
/// drives the completion ↔ tool loop.
pub struct Agent {
    pub(crate) identity: AgentIdentity,
    pub(crate) model: String,
    pub(crate) token_budget: u64,
    pub(crate) token_usage: Usage,
    pub(crate) message_log: Vec<Message>,
    /// Registration order is the order instructions and snapshots are
    /// rendered in.
    pub(crate) contexts: Vec<Box<dyn Context>>,
    tools: ToolRegistry,
    /// Observers tagged with the id of the context that supplied them.
    observers: Vec<(String, Arc<dyn ToolObserver>)>,
    client: Arc<dyn CompletionClient>,
    constitution: String,
    /// 0 means no limit.
    max_tool_rounds: u32,
}

impl Agent {
    pub fn new(
        name: impl Into<String>,
        model: impl Into<String>,
        token_budget: u64,
        client: Arc<dyn CompletionClient>,
    ) -> Self {
        Self::with_identity(AgentIdentity::new(name), model, token_budget, client)
    }

    pub fn with_identity(
        identity: AgentIdentity,
        model: impl Into<String>,
        token_budget: u64,
        client: Arc<dyn CompletionClient>,
    ) -> Self {
        Self {
            identity,
            model: model.into(),
            token_budget,
            token_usage: Usage::default(),
            message_log: Vec::new(),
            contexts: Vec::new(),
            tools: ToolRegistry::new(),
            observers: Vec::new(),
            client,
            constitution: CONSTITUTION.to_string(),
            max_tool_rounds: 0,
        }
    }

    pub fn with_config(mut self, config: &AgentConfig) -> Self {
        self.configure(config);
        self
    }

    /// Apply the agent section of the config file.
    pub fn configure(&mut self, config: &AgentConfig) {
        if let Some(text) = &config.constitution {
            self.constitution = text.clone();
        }
        self.max_tool_rounds = config.max_tool_rounds;
    }

    pub fn with_constitution(mut self, text: impl Into<String>) -> Self {
        self.constitution = text.into();
        self
    }

    pub fn with_max_tool_rounds(mut self, rounds: u32) -> Self {
        self.max_tool_rounds = rounds;
        self
    }

    pub fn identity(&self) -> &AgentIdentity { &self.identity }

    pub fn id(&self) -> &str { &self.identity.id }

    pub fn name(&self) -> &str { &self.identity.name }

    pub fn model(&self) -> &str { &self.model }

    pub fn token_budget(&self) -> u64 { self.token_budget }

    pub fn message_log(&self) -> &[Message] { &self.message_log }

    pub fn set_client(&mut self, client: Arc<dyn CompletionClient>) {
        self.client = client;
    }

    pub fn get_token_usage(&self) -> Usage {
        self.token_usage
    }

    pub fn clear_message_log(&mut self) {
        self.message_log.clear();
    }

    // ── Tools ─────────────────────────────────────────────────────────────────

    pub fn register_tool(&mut self, tool: Arc<dyn Tool>) {
        debug!(agent_id = %self.identity.id, tool_name = %tool.name(), "registering tool");
        if let Some(old) = self.tools.register(tool) {
            debug!(agent_id = %self.identity.id, tool_name = %old.name(), "replaced existing tool");
        }
    }

    pub fn unregister_tool(&mut self, name: &str) -> Result<Arc<dyn Tool>, AgentError> {
        self.tools.unregister(name).ok_or_else(|| AgentError::not_found("tool", name))
    }

    pub fn tool(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name)
    }

    /// Names of every tool the agent can call, in registration order.
    pub fn tool_names(&self) -> Vec<String> {
        self.tools.names()
    }

    /// Function schemas, or `None` when no tool is registered.
    pub fn get_tool_schemas(&self) -> Option<Vec<Value>> {
        if self.tools.is_empty() {
            None
        } else {
            Some(self.tools.schemas())
        }
    }

    /// Static tools contributed by the registered contexts.
    pub fn get_all_tools(&self) -> Vec<Arc<dyn Tool>> {
        self.contexts.iter().flat_map(|c| c.tools()).collect()
    }

    pub fn get_all_tool_names(&self) -> Vec<String> {
        self.get_all_tools().iter().map(|t| t.name().to_string()).collect()
    }

    // ── Contexts ──────────────────────────────────────────────────────────────

    /// Add `context` and register its tools.  A context with the same id
    /// is replaced in place.
    pub fn register_context(&mut self, context: Box<dyn Context>) {
        let id = context.id().to_string();
        debug!(agent_id = %self.identity.id, context_id = %id, kind = context.kind(), "registering context");

        for tool in context.tools() {
            self.register_tool(tool);
        }

        self.observers.retain(|(owner, _)| owner != &id);
        if let Some(observer) = context.observer() {
            self.observers.push((id.clone(), observer));
        }

        match self.contexts.iter().position(|c| c.id() == id) {
            Some(i) => {
                warn!(agent_id = %self.identity.id, context_id = %id, "context id already registered; replacing");
                self.contexts[i] = context;
            }
            None => self.contexts.push(context),
        }
    }

    /// Remove a context.  Tools it registered stay on the agent.
    pub fn unregister_context(&mut self, id: &str) -> Result<Box<dyn Context>, AgentError> {
        let pos = self
            .contexts
            .iter()
            .position(|c| c.id() == id)
            .ok_or_else(|| AgentError::not_found("context", id))?;
        self.observers.retain(|(owner, _)| owner != id);
        Ok(self.contexts.remove(pos))
    }

    pub fn context(&self, id: &str) -> Option<&dyn Context> {
        self.contexts.iter().find(|c| c.id() == id).map(|c| c.as_ref())
    }

    /// First registered context of the given type.
    pub fn context_of_kind(&self, kind: &str) -> Option<&dyn Context> {
        self.contexts.iter().find(|c| c.kind() == kind).map(|c| c.as_ref())
    }

    pub fn contexts(&self) -> impl Iterator<Item = &dyn Context> + '_ {
        self.contexts.iter().map(|c| c.as_ref())
    }

    /// Instructions of every context in registration order, skipping the
    /// empty ones.
    pub fn get_context_instructions(&self) -> Vec<String> {
        self.contexts
            .iter()
            .filter_map(|c| c.get_context_instructions(&self.identity))
            .filter(|text| !text.trim().is_empty())
            .collect()
    }

    pub fn get_all_context_data(&self) -> Vec<ContextData> {
        self.contexts.iter().filter_map(|c| c.get_context(&self.identity)).collect()
    }

    /// Snapshots of every context rendered as flat strings.
    pub fn get_context(&self) -> Vec<String> {
        self.get_all_context_data().iter().map(context_to_string).collect()
    }

    pub fn system_prompt(&self) -> String {
        system_prompt(&self.constitution, &self.get_context_instructions())
    }

    /// Run `deserialize` on one registered context and register whatever
    /// tools it rebuilt.
    pub(crate) fn deserialize_context(&mut self, id: &str, state: &Value) -> anyhow::Result<()> {
        let ctx = ToolCtx::new(self.identity.clone());
        let context = self
            .contexts
            .iter_mut()
            .find(|c| c.id() == id)
            .ok_or_else(|| AgentError::not_found("context", id))?;
        context
            .deserialize(state, &ctx)
            .with_context(|| format!("restoring context {id}"))?;
        self.tools.apply(ctx.effects.drain());
        Ok(())
    }

    // ── Execution ─────────────────────────────────────────────────────────────

    /// Call a tool by name.  Never fails: a missing tool, a failing body
    /// and a panicking body all come back as a [`ToolResponse`] error.
    pub async fn execute_tool(&mut self, name: &str, args: Value) -> ToolResponse {
        for (_, observer) in &self.observers {
            observer.before_call(&self.identity, name, &args);
        }

        let ctx = ToolCtx::new(self.identity.clone());
        let response = match self.tools.get(name) {
            None => ToolResponse::error(format!("Tool {name} not found")),
            Some(tool) => {
                let call_ctx = ctx.clone();
                match tokio::spawn(async move { tool.call(call_ctx, args).await }).await {
                    Ok(response) => response,
                    Err(e) => {
                        let error = format!("tool task failed: {e}");
                        ToolResponse::failure(format!("Error executing tool: {error}"), error)
                    }
                }
            }
        };

        let effects = ctx.effects.drain();
        if !effects.is_empty() {
            debug!(agent_id = %self.identity.id, tool_name = %name, count = effects.len(), "applying tool effects");
            self.tools.apply(effects);
        }

        for (_, observer) in &self.observers {
            observer.after_call(&self.identity, name, &response);
        }
        response
    }

    /// Execute one model-requested call and render the text of its `tool`
    /// message.
    pub async fn execute_tool_call(&mut self, call: &ToolCall) -> String {
        let raw = call.function.arguments.trim();
        let args = if raw.is_empty() {
            Value::Object(Default::default())
        } else {
            match serde_json::from_str::<Value>(raw) {
                Ok(v) => v,
                Err(e) => {
                    warn!(
                        tool_name = %call.function.name,
                        tool_call_id = %call.id,
                        error = %e,
                        "model sent tool call with invalid JSON arguments"
                    );
                    return format!("Error executing tool: {e}");
                }
            }
        };
        self.execute_tool(&call.function.name, args).await.message_text()
    }

    /// Process one user message.  Returns the messages produced this turn
    /// (assistant turns and tool results), which are also appended to the
    /// message log after the user message.
    ///
    /// Never fails: a completion error yields a single apology message and
    /// leaves the log untouched.
    pub async fn run_loop(&mut self, user_input: &str) -> Vec<Message> {
        match self.drive(user_input).await {
            Ok(history) => history,
            Err(e) => {
                error!(agent_id = %self.identity.id, error = %format!("{e:#}"), "agent run loop failed");
                vec![Message::assistant(TURN_FAILED_REPLY)]
            }
        }
    }

    async fn drive(&mut self, user_input: &str) -> anyhow::Result<Vec<Message>> {
        let user_message = Message::user(user_input);
        let system_message = Message::system(self.system_prompt());
        let context_message = Message::system(context_prompt(&self.get_context()));

        let mut messages = Vec::with_capacity(self.message_log.len() + 3);
        messages.push(system_message.clone());
        messages.extend(self.message_log.iter().cloned());
        messages.push(context_message);
        messages.push(user_message.clone());

        debug!(agent_id = %self.identity.id, "making completion request");
        let mut response = self.complete(messages).await?;
        let mut history = vec![response.message.clone()];
        let mut rounds = 0u32;

        while response.wants_tools() {
            if self.max_tool_rounds > 0 && rounds >= self.max_tool_rounds {
                warn!(
                    agent_id = %self.identity.id,
                    rounds,
                    "tool round limit reached; ending turn"
                );
                // Every tool_call id in the log needs an answer or later
                // requests are rejected.
                for call in response.message.calls() {
                    history.push(Message::tool_result(
                        &call.id,
                        &call.function.name,
                        format!("Error executing tool: {TOOL_ROUND_LIMIT_REACHED}"),
                    ));
                }
                break;
            }
            rounds += 1;

            // Sequential: later calls may depend on effects of earlier ones.
            let calls = response.message.calls().to_vec();
            for call in &calls {
                let content = self.execute_tool_call(call).await;
                history.push(Message::tool_result(&call.id, &call.function.name, content));
            }

            let context_message = Message::system(context_prompt(&self.get_context()));
            let mut messages = Vec::with_capacity(self.message_log.len() + history.len() + 3);
            messages.push(system_message.clone());
            messages.extend(self.message_log.iter().cloned());
            messages.push(user_message.clone());
            messages.push(context_message);
            messages.extend(history.iter().cloned());

            debug!(agent_id = %self.identity.id, rounds, "making follow-up completion request");
            response = self.complete(messages).await?;
            history.push(response.message.clone());
        }

        self.message_log.push(user_message);
        self.message_log.extend(history.iter().cloned());
        Ok(history)
    }

    async fn complete(&mut self, messages: Vec<Message>) -> anyhow::Result<CompletionResponse> {
        let req = CompletionRequest {
            model: self.model.clone(),
            messages,
            tools: self.get_tool_schemas(),
        };
        let response = self
            .client
            .complete(req)
            .await
            .with_context(|| format!("completion via {} failed", self.client.name()))?;

        if let Some(usage) = &response.usage {
            self.token_usage.accumulate(usage);
            if self.token_budget > 0 && self.token_usage.total_tokens > self.token_budget {
                warn!(
                    agent_id = %self.identity.id,
                    total_tokens = self.token_usage.total_tokens,
                    token_budget = self.token_budget,
                    "token budget exceeded"
                );
            }
        }
        Ok(response)
    }
}

/// Render a snapshot as `key: value; key: value`.  Arrays are joined with
/// `", "`; strings appear without quotes.
pub fn context_to_string(data: &ContextData) -> String {
    data.iter()
        .map(|(key, value)| {
            let rendered = match value {
                Value::Array(items) => items.iter().map(scalar_text).collect::<Vec<_>>().join(", "),
                other => scalar_text(other),
            };
            format!("{key}: {rendered}")
        })
        .collect::<Vec<_>>()
        .join("; ")
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
