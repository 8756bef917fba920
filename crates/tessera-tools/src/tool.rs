// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::fmt;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use crate::{AgentIdentity, ToolResponse};

/// Trait that every tool must implement.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    /// Full function schema sent to the completion client.
    fn schema(&self) -> Value;
    /// Execute the tool.  Failures are reported through
    /// [`ToolResponse::error`], never as a panic or `Err`.
    async fn call(&self, ctx: ToolCtx, args: Value) -> ToolResponse;
}

/// A change to the calling agent's tool map requested from inside a tool.
#[derive(Clone)]
pub enum ToolEffect {
    Register(Arc<dyn Tool>),
    Unregister(String),
}

impl fmt::Debug for ToolEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolEffect::Register(t) => f.debug_tuple("Register").field(&t.name()).finish(),
            ToolEffect::Unregister(n) => f.debug_tuple("Unregister").field(n).finish(),
        }
    }
}

/// Queue of [`ToolEffect`]s.  Clones share the same queue, so a tool can
/// push through its copy of the [`ToolCtx`] and the agent drains it after
/// the call returns.
#[derive(Clone, Default)]
pub struct ToolEffects {
    queue: Arc<Mutex<Vec<ToolEffect>>>,
}

impl ToolEffects {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, tool: Arc<dyn Tool>) {
        self.push(ToolEffect::Register(tool));
    }

    pub fn unregister(&self, name: impl Into<String>) {
        self.push(ToolEffect::Unregister(name.into()));
    }

    fn push(&self, effect: ToolEffect) {
        self.queue.lock().unwrap_or_else(|p| p.into_inner()).push(effect);
    }

    /// Take every queued effect, oldest first.
    pub fn drain(&self) -> Vec<ToolEffect> {
        std::mem::take(&mut *self.queue.lock().unwrap_or_else(|p| p.into_inner()))
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().map(|q| q.is_empty()).unwrap_or(true)
    }
}

/// Per-call environment handed to a tool.
#[derive(Clone)]
pub struct ToolCtx {
    pub identity: AgentIdentity,
    pub effects: ToolEffects,
}

impl ToolCtx {
    pub fn new(identity: AgentIdentity) -> Self {
        Self { identity, effects: ToolEffects::new() }
    }

    pub fn agent_id(&self) -> &str {
        &self.identity.id
    }
}

/// Hook notified around every tool execution an agent performs.
pub trait ToolObserver: Send + Sync {
    fn before_call(&self, _identity: &AgentIdentity, _tool: &str, _args: &Value) {}
    fn after_call(&self, _identity: &AgentIdentity, _tool: &str, _response: &ToolResponse) {}
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
