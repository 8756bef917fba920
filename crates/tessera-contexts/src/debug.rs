// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Tool call tracing.
//!
//! The agent notifies this context's observer around every tool call; for
//! tools on the trace list the observer logs arguments and results.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use serde_json::{json, Map, Value};
use tracing::{error, info};

use tessera_core::{Context, ContextData};
use tessera_tools::{
    AgentIdentity, FnTool, ParamType, SchemaError, Tool, ToolCtx, ToolObserver, ToolResponse,
    ToolSignature, DEFAULT_SUMMARY_LIMIT,
};

use crate::{dedent, finish_tools, lock, new_context_id, restore_id, tool_names};

const INSTRUCTIONS: &str = "
    Debug Context Instructions:
    - Use 'trace_tool' to start debugging a tool
    - Use 'untrace_tool' to stop debugging a tool
    - Use 'list_traced_tools' to see which tools are being traced
";

/// tool name → currently traced
type TraceSet = BTreeMap<String, bool>;
type Shared = Arc<Mutex<TraceSet>>;

pub struct DebugContext {
    id: String,
    traced: Shared,
    tools: Vec<Arc<dyn Tool>>,
}

impl DebugContext {
    pub const KIND: &'static str = "debug";

    pub fn new() -> Result<Self, SchemaError> {
        Self::with_summary_limit(DEFAULT_SUMMARY_LIMIT)
    }

    pub fn with_summary_limit(summary_limit: usize) -> Result<Self, SchemaError> {
        let traced: Shared = Arc::default();
        let tools = vec![trace_tool(&traced)?, untrace_tool(&traced)?, list_traced_tools(&traced)?];
        Ok(Self { id: new_context_id(), traced, tools: finish_tools(tools, summary_limit) })
    }

    pub fn is_traced(&self, tool: &str) -> bool {
        is_traced(&lock(&self.traced), tool)
    }
}

fn is_traced(set: &TraceSet, tool: &str) -> bool {
    set.get(tool).copied().unwrap_or(false)
}

fn traced_names(set: &TraceSet) -> Vec<String> {
    set.iter().filter(|(_, on)| **on).map(|(name, _)| name.clone()).collect()
}

// ── Tools ─────────────────────────────────────────────────────────────────────

fn trace_tool(traced: &Shared) -> Result<FnTool, SchemaError> {
    let sig = ToolSignature::new(
        "trace_tool",
        "Start tracing a tool's execution for debugging.\n\ntool_name: name of the tool to trace",
    )
    .required("tool_name", ParamType::String);
    let traced = traced.clone();
    FnTool::sync(sig, move |_ctx, args| {
        let name = args.str("tool_name")?;
        let mut set = lock(&traced);
        if is_traced(&set, name) {
            return Ok(format!("Tool {name} is already being traced").into());
        }
        set.insert(name.to_string(), true);
        Ok(format!("Now tracing {name}").into())
    })
}

fn untrace_tool(traced: &Shared) -> Result<FnTool, SchemaError> {
    let sig = ToolSignature::new(
        "untrace_tool",
        "Stop tracing a tool's execution.\n\ntool_name: name of the tool to stop tracing",
    )
    .required("tool_name", ParamType::String);
    let traced = traced.clone();
    FnTool::sync(sig, move |_ctx, args| {
        let name = args.str("tool_name")?;
        let mut set = lock(&traced);
        if !is_traced(&set, name) {
            return Ok(format!("Tool {name} is not being traced").into());
        }
        set.insert(name.to_string(), false);
        Ok(format!("Stopped tracing {name}").into())
    })
}

fn list_traced_tools(traced: &Shared) -> Result<FnTool, SchemaError> {
    let sig = ToolSignature::new("list_traced_tools", "List all tools currently being traced.");
    let traced = traced.clone();
    FnTool::sync(sig, move |_ctx, _args| {
        let names = traced_names(&lock(&traced));
        if names.is_empty() {
            return Ok("No tools are currently being traced".into());
        }
        Ok(format!("Currently tracing: {}", names.join(", ")).into())
    })
}

// ── Observer ──────────────────────────────────────────────────────────────────

struct TraceObserver {
    traced: Shared,
}

impl ToolObserver for TraceObserver {
    fn before_call(&self, identity: &AgentIdentity, tool: &str, args: &Value) {
        if is_traced(&lock(&self.traced), tool) {
            info!(agent_id = %identity.id, tool_name = %tool, %args, "traced tool called");
        }
    }

    fn after_call(&self, identity: &AgentIdentity, tool: &str, response: &ToolResponse) {
        if !is_traced(&lock(&self.traced), tool) {
            return;
        }
        match &response.error {
            Some(e) => error!(agent_id = %identity.id, tool_name = %tool, error = %e, "traced tool failed"),
            None => info!(
                agent_id = %identity.id,
                tool_name = %tool,
                summary = %response.summary,
                "traced tool returned"
            ),
        }
    }
}

impl Context for DebugContext {
    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn tools(&self) -> Vec<Arc<dyn Tool>> {
        self.tools.clone()
    }

    fn get_context(&self, _identity: &AgentIdentity) -> Option<ContextData> {
        let mut data = Map::new();
        data.insert("traced_tools".into(), json!(traced_names(&lock(&self.traced))));
        data.insert("tools".into(), tool_names(&self.tools));
        Some(data)
    }

    fn get_context_instructions(&self, _identity: &AgentIdentity) -> Option<String> {
        Some(dedent(INSTRUCTIONS))
    }

    fn serialize(&self) -> Value {
        json!({"id": self.id, "traced_tools": *lock(&self.traced)})
    }

    fn deserialize(&mut self, state: &Value, _ctx: &ToolCtx) -> anyhow::Result<()> {
        restore_id(&mut self.id, state);
        let traced: TraceSet = match state.get("traced_tools") {
            Some(v) => serde_json::from_value(v.clone())?,
            None => TraceSet::new(),
        };
        *lock(&self.traced) = traced;
        Ok(())
    }

    fn observer(&self) -> Option<Arc<dyn ToolObserver>> {
        Some(Arc::new(TraceObserver { traced: self.traced.clone() }))
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use tessera_core::Agent;
    use tessera_model::MockClient;

    use super::*;

    fn agent() -> Agent {
        let mut agent = Agent::new("tester", "gpt-4", 1000, Arc::new(MockClient));
        agent.register_context(Box::new(DebugContext::new().unwrap()));
        agent
    }

    async fn call(agent: &mut Agent, tool: &str, target: &str) -> String {
        agent.execute_tool(tool, json!({"tool_name": target})).await.summary
    }

    #[tokio::test]
    async fn trace_and_untrace_messages() {
        let mut agent = agent();
        assert_eq!(call(&mut agent, "trace_tool", "add_memory").await, "Now tracing add_memory");
        assert_eq!(
            call(&mut agent, "trace_tool", "add_memory").await,
            "Tool add_memory is already being traced"
        );
        assert_eq!(call(&mut agent, "untrace_tool", "add_memory").await, "Stopped tracing add_memory");
        assert_eq!(
            call(&mut agent, "untrace_tool", "add_memory").await,
            "Tool add_memory is not being traced"
        );
        assert_eq!(call(&mut agent, "trace_tool", "add_memory").await, "Now tracing add_memory");
    }

    #[tokio::test]
    async fn list_reflects_trace_set() {
        let mut agent = agent();
        let listed = agent.execute_tool("list_traced_tools", json!({})).await;
        assert_eq!(listed.summary, "No tools are currently being traced");

        call(&mut agent, "trace_tool", "b_tool").await;
        call(&mut agent, "trace_tool", "a_tool").await;
        let listed = agent.execute_tool("list_traced_tools", json!({})).await;
        assert_eq!(listed.summary, "Currently tracing: a_tool, b_tool");
    }

    #[tokio::test]
    async fn trace_set_survives_round_trip() {
        let mut agent = agent();
        call(&mut agent, "trace_tool", "get_memories").await;
        call(&mut agent, "trace_tool", "remove_memory").await;
        call(&mut agent, "untrace_tool", "remove_memory").await;
        let state = agent.contexts().next().unwrap().serialize();
        assert_eq!(state["traced_tools"], json!({"get_memories": true, "remove_memory": false}));

        let mut fresh = DebugContext::new().unwrap();
        fresh.deserialize(&state, &ToolCtx::new(agent.identity().clone())).unwrap();
        assert!(fresh.is_traced("get_memories"));
        assert!(!fresh.is_traced("remove_memory"));
    }

    #[test]
    fn context_provides_an_observer() {
        let debug = DebugContext::new().unwrap();
        assert!(debug.observer().is_some());
    }
}
