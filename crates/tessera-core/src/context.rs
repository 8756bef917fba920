// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::Arc;

use serde_json::{Map, Value};

use tessera_tools::{AgentIdentity, Tool, ToolCtx, ToolObserver};

/// Key/value snapshot a context surfaces to the model each turn.
pub type ContextData = Map<String, Value>;

/// A pluggable capability bundle: instructions, live state and tools.
///
/// Per-agent state inside a context is keyed by [`AgentIdentity::id`], so a
/// single instance can serve several agents.
pub trait Context: Send + Sync {
    /// Per-instance id, unique within one agent.
    fn id(&self) -> &str;

    /// Replace the id.  Used when restoring a saved agent.
    fn set_id(&mut self, id: String);

    /// Stable type identifier used to find the constructor on load.
    fn kind(&self) -> &'static str;

    /// Tools registered on the agent together with the context.
    fn tools(&self) -> Vec<Arc<dyn Tool>>;

    /// Current observable state.  Must not mutate anything.
    fn get_context(&self, identity: &AgentIdentity) -> Option<ContextData>;

    /// Guidance text for the system prompt.  Must not mutate anything.
    fn get_context_instructions(&self, identity: &AgentIdentity) -> Option<String>;

    /// Full persistable state, including `id`.
    fn serialize(&self) -> Value;

    /// Restore from a [`Context::serialize`] document.  Tools that were
    /// created at runtime are rebuilt from the stored data and queued on
    /// `ctx.effects` for registration on the agent.
    fn deserialize(&mut self, state: &Value, ctx: &ToolCtx) -> anyhow::Result<()>;

    /// Hook notified around every tool call of the owning agent.
    fn observer(&self) -> Option<Arc<dyn ToolObserver>> {
        None
    }
}
