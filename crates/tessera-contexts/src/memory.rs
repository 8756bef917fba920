// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Long-term memory.
//!
//! Memories are short facts with an importance score, stored per agent and
//! keyed by a generated id.  The snapshot lists them most important first so
//! the model sees the key facts even when the list grows.

use std::collections::{BTreeMap, HashMap};
use std::ops::RangeInclusive;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::debug;

use tessera_core::{Context, ContextData};
use tessera_tools::{
    AgentIdentity, FnTool, ParamType, SchemaError, Tool, ToolCtx, ToolResponse, ToolSignature,
    DEFAULT_SUMMARY_LIMIT,
};

use crate::{dedent, finish_tools, lock, new_context_id, restore_id};

const IMPORTANCE: RangeInclusive<i64> = 1..=10;

const INSTRUCTIONS: &str = "
    # Memory
    You have access to a persistent memory system. Use it to maintain important
    information across conversations. Use memory proactively - anything you think
    is relevant to remember, you should add to memory. Follow these guidelines:

    1. Memory Management:
       - Store concise, important facts about users and conversations
       - Add new insights as you learn them
       - Update outdated information
       - Remove irrelevant memories

    2. When to Add Memories:
       - User preferences and characteristics
       - Important goals or tasks
       - Key facts learned during conversation
       - Significant context that might be useful later

    3. Memory Quality:
       - Keep memories concise and specific
       - Rate importance appropriately (1-10)
       - More important memories (8-10) should be key facts that significantly impact interactions
       - Less important memories (1-4) can be minor preferences or temporary context

    Only mention memory capabilities if relevant to the conversation.
";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub content: String,
    /// Unix seconds of the last write.
    pub timestamp: f64,
    pub importance: i64,
    /// Position among the agent's memories; kept across updates.
    #[serde(default)]
    pub seq: u64,
}

impl MemoryEntry {
    fn to_json(&self, id: &str) -> Value {
        json!({
            "id": id,
            "content": self.content,
            "timestamp": self.timestamp,
            "importance": self.importance,
        })
    }
}

/// agent id → memory id → entry
type MemoryStore = HashMap<String, BTreeMap<String, MemoryEntry>>;
type Shared = Arc<Mutex<MemoryStore>>;

pub struct MemoryContext {
    id: String,
    store: Shared,
    tools: Vec<Arc<dyn Tool>>,
}

impl MemoryContext {
    pub const KIND: &'static str = "memory";

    pub fn new() -> Result<Self, SchemaError> {
        Self::with_summary_limit(DEFAULT_SUMMARY_LIMIT)
    }

    pub fn with_summary_limit(summary_limit: usize) -> Result<Self, SchemaError> {
        let store: Shared = Arc::default();
        let tools = vec![
            add_memory(&store)?,
            get_memories(&store)?,
            update_memory(&store)?,
            remove_memory(&store)?,
        ];
        Ok(Self {
            id: new_context_id(),
            store,
            tools: finish_tools(tools, summary_limit),
        })
    }

    /// Memories of one agent, in the order they were written.
    pub fn memories(&self, agent_id: &str) -> Vec<(String, MemoryEntry)> {
        let store = lock(&self.store);
        store
            .get(agent_id)
            .map(|m| ordered(m).into_iter().map(|(id, e)| (id.clone(), e.clone())).collect())
            .unwrap_or_default()
    }
}

fn now_secs() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

/// Creation order; ties broken by timestamp then id so the order is stable
/// across reloads.
fn ordered(memories: &BTreeMap<String, MemoryEntry>) -> Vec<(&String, &MemoryEntry)> {
    let mut list: Vec<_> = memories.iter().collect();
    list.sort_by(|a, b| {
        a.1.seq
            .cmp(&b.1.seq)
            .then_with(|| a.1.timestamp.total_cmp(&b.1.timestamp))
            .then_with(|| a.0.cmp(b.0))
    });
    list
}

fn next_seq(memories: &BTreeMap<String, MemoryEntry>) -> u64 {
    memories.values().map(|m| m.seq + 1).max().unwrap_or(0)
}

// ── Tools ─────────────────────────────────────────────────────────────────────

fn add_memory(store: &Shared) -> Result<FnTool, SchemaError> {
    let sig = ToolSignature::new(
        "add_memory",
        "Add a new memory for the agent.\n\n\
         content: the memory content (keep concise and specific)\n\
         importance: importance score (1-10)",
    )
    .required("content", ParamType::String)
    .required("importance", ParamType::Integer);
    let store = store.clone();
    FnTool::sync(sig, move |ctx, args| {
        let content = args.str("content")?;
        let importance = args.i64("importance")?;
        if !IMPORTANCE.contains(&importance) {
            return Ok(ToolResponse::error(
                "Failed to add memory: Importance must be between 1 and 10",
            )
            .into());
        }

        let memory_id = uuid::Uuid::new_v4().to_string();
        let mut store = lock(&store);
        let memories = store.entry(ctx.agent_id().to_string()).or_default();
        let entry = MemoryEntry {
            content: content.to_string(),
            timestamp: now_secs(),
            importance,
            seq: next_seq(memories),
        };
        let memory = entry.to_json(&memory_id);
        memories.insert(memory_id, entry);

        Ok(ToolResponse::ok(
            format!("Added new memory: {content} (Importance: {importance})"),
            json!({"status": "success", "memory": memory}),
        )
        .into())
    })
}

fn get_memories(store: &Shared) -> Result<FnTool, SchemaError> {
    let sig = ToolSignature::new("get_memories", "Retrieve all memories.");
    let store = store.clone();
    FnTool::sync(sig, move |ctx, _args| {
        let store = lock(&store);
        let Some(memories) = store.get(ctx.agent_id()).filter(|m| !m.is_empty()) else {
            return Ok(ToolResponse::ok("No memories found", json!({"memories": []})).into());
        };

        let list = ordered(memories);
        let lines: Vec<String> = list
            .iter()
            .map(|(_, m)| format!("- {} (Importance: {})", m.content, m.importance))
            .collect();
        let entries: Vec<Value> = list.iter().map(|(id, m)| m.to_json(id)).collect();

        Ok(ToolResponse::ok(
            format!("Found {} memories:\n{}", list.len(), lines.join("\n")),
            json!({"count": list.len(), "memories": entries}),
        )
        .into())
    })
}

fn update_memory(store: &Shared) -> Result<FnTool, SchemaError> {
    let sig = ToolSignature::new(
        "update_memory",
        "Update an existing memory.\n\n\
         memory_id: ID of the memory to update\n\
         content: new memory content\n\
         importance: new importance score (optional)",
    )
    .required("memory_id", ParamType::String)
    .required("content", ParamType::String)
    .optional("importance", ParamType::Integer, Value::Null);
    let store = store.clone();
    FnTool::sync(sig, move |ctx, args| {
        let memory_id = args.str("memory_id")?;
        let content = args.str("content")?;
        let importance = args.opt_i64("importance")?;

        let mut store = lock(&store);
        let Some(memory) = store.get_mut(ctx.agent_id()).and_then(|m| m.get_mut(memory_id)) else {
            return Ok(ToolResponse::error(format!(
                "Failed to update: Memory {memory_id} not found"
            ))
            .into());
        };
        if importance.is_some_and(|i| !IMPORTANCE.contains(&i)) {
            return Ok(ToolResponse::error(
                "Failed to update: Importance must be between 1 and 10",
            )
            .into());
        }

        let old = memory.to_json(memory_id);
        memory.content = content.to_string();
        memory.timestamp = now_secs();
        if let Some(i) = importance {
            memory.importance = i;
        }

        let mut summary = format!("Updated memory: {content}");
        if let Some(i) = importance {
            summary.push_str(&format!(" (Importance: {i})"));
        }
        Ok(ToolResponse::ok(
            summary,
            json!({
                "status": "success",
                "memory_id": memory_id,
                "changes": {"old": old, "new": memory.to_json(memory_id)},
            }),
        )
        .into())
    })
}

fn remove_memory(store: &Shared) -> Result<FnTool, SchemaError> {
    let sig = ToolSignature::new(
        "remove_memory",
        "Remove a memory.\n\nmemory_id: ID of the memory to remove",
    )
    .required("memory_id", ParamType::String);
    let store = store.clone();
    FnTool::sync(sig, move |ctx, args| {
        let memory_id = args.str("memory_id")?;
        let removed = lock(&store)
            .get_mut(ctx.agent_id())
            .and_then(|m| m.remove(memory_id));
        let Some(memory) = removed else {
            return Ok(ToolResponse::error(format!(
                "Failed to remove: Memory {memory_id} not found"
            ))
            .into());
        };
        Ok(ToolResponse::ok(
            format!("Removed memory: {}", memory.content),
            json!({"status": "success", "removed_memory": memory.to_json(memory_id)}),
        )
        .into())
    })
}

// ── Context ───────────────────────────────────────────────────────────────────

impl Context for MemoryContext {
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

    fn get_context(&self, identity: &AgentIdentity) -> Option<ContextData> {
        let store = lock(&self.store);
        let mut data = Map::new();
        let Some(memories) = store.get(&identity.id).filter(|m| !m.is_empty()) else {
            return Some(data);
        };

        let mut list = ordered(memories);
        list.sort_by(|a, b| b.1.importance.cmp(&a.1.importance));
        let mut lines = vec![Value::from("Current memories:")];
        lines.extend(list.iter().map(|(id, m)| {
            Value::from(format!("- {} (ID: {id}, Importance: {})", m.content, m.importance))
        }));
        data.insert("memories".into(), Value::Array(lines));
        Some(data)
    }

    fn get_context_instructions(&self, _identity: &AgentIdentity) -> Option<String> {
        Some(dedent(INSTRUCTIONS))
    }

    fn serialize(&self) -> Value {
        json!({"id": self.id, "agent_memories": *lock(&self.store)})
    }

    fn deserialize(&mut self, state: &Value, _ctx: &ToolCtx) -> anyhow::Result<()> {
        restore_id(&mut self.id, state);
        let memories: MemoryStore = match state.get("agent_memories") {
            Some(v) => serde_json::from_value(v.clone())?,
            None => MemoryStore::new(),
        };
        debug!(context_id = %self.id, agents = memories.len(), "restored memories");
        *lock(&self.store) = memories;
        Ok(())
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
        agent.register_context(Box::new(MemoryContext::new().unwrap()));
        agent
    }

    async fn add(agent: &mut Agent, content: &str, importance: i64) -> ToolResponse {
        agent
            .execute_tool("add_memory", json!({"content": content, "importance": importance}))
            .await
    }

    #[tokio::test]
    async fn add_get_remove_scenario() {
        let mut agent = agent();
        let added = add(&mut agent, "likes tea", 7).await;
        assert_eq!(added.summary, "Added new memory: likes tea (Importance: 7)");

        let listed = agent.execute_tool("get_memories", json!({})).await;
        assert!(listed.summary.contains("likes tea"));
        let content = listed.content.unwrap();
        let memories = content["memories"].as_array().unwrap();
        assert_eq!(memories.len(), 1);
        assert_eq!(memories[0]["importance"], 7);

        let id = memories[0]["id"].as_str().unwrap().to_string();
        let removed = agent.execute_tool("remove_memory", json!({"memory_id": id})).await;
        assert_eq!(removed.summary, "Removed memory: likes tea");

        let empty = agent.execute_tool("get_memories", json!({})).await;
        assert_eq!(empty.summary, "No memories found");
        assert_eq!(empty.content, Some(json!({"memories": []})));
    }

    #[tokio::test]
    async fn importance_out_of_range_is_rejected() {
        let mut agent = agent();
        let resp = add(&mut agent, "too much", 11).await;
        assert_eq!(
            resp.error.as_deref(),
            Some("Failed to add memory: Importance must be between 1 and 10")
        );
        assert!(resp.content.is_none());
    }

    #[tokio::test]
    async fn missing_ids_are_reported() {
        let mut agent = agent();
        let resp = agent
            .execute_tool("update_memory", json!({"memory_id": "nope", "content": "x"}))
            .await;
        assert_eq!(resp.summary, "Failed to update: Memory nope not found");
        let resp = agent.execute_tool("remove_memory", json!({"memory_id": "nope"})).await;
        assert_eq!(resp.summary, "Failed to remove: Memory nope not found");
    }

    #[tokio::test]
    async fn update_keeps_importance_unless_given() {
        let mut agent = agent();
        let added = add(&mut agent, "likes tea", 4).await;
        let id = added.content.unwrap()["memory"]["id"].as_str().unwrap().to_string();

        let resp = agent
            .execute_tool("update_memory", json!({"memory_id": id, "content": "likes green tea"}))
            .await;
        assert_eq!(resp.summary, "Updated memory: likes green tea");
        assert_eq!(resp.content.unwrap()["changes"]["new"]["importance"], 4);

        let bad = agent
            .execute_tool("update_memory", json!({"memory_id": id, "content": "x", "importance": 0}))
            .await;
        assert!(bad.is_error());
        let listed = agent.execute_tool("get_memories", json!({})).await;
        assert!(listed.summary.contains("likes green tea (Importance: 4)"));
    }

    #[tokio::test]
    async fn update_keeps_position_in_listing() {
        let mut agent = agent();
        let first = add(&mut agent, "first", 5).await;
        add(&mut agent, "second", 5).await;
        let id = first.content.unwrap()["memory"]["id"].as_str().unwrap().to_string();

        agent
            .execute_tool("update_memory", json!({"memory_id": id, "content": "first, edited"}))
            .await;
        let listed = agent.execute_tool("get_memories", json!({})).await;
        assert_eq!(
            listed.summary,
            "Found 2 memories:\n- first, edited (Importance: 5)\n- second (Importance: 5)"
        );
        add(&mut agent, "third", 5).await;
        let memories = agent.execute_tool("get_memories", json!({})).await.content.unwrap();
        assert_eq!(memories["memories"][2]["content"], "third");
    }

    #[tokio::test]
    async fn snapshot_sorts_by_importance() {
        let mut agent = agent();
        add(&mut agent, "minor", 2).await;
        add(&mut agent, "major", 9).await;
        let data = agent.get_all_context_data().remove(0);
        let lines = data["memories"].as_array().unwrap();
        assert_eq!(lines[0], "Current memories:");
        assert!(lines[1].as_str().unwrap().starts_with("- major (ID: "));
        assert!(lines[2].as_str().unwrap().ends_with("Importance: 2)"));
    }

    #[test]
    fn empty_snapshot_is_empty_map() {
        let ctx = MemoryContext::new().unwrap();
        let data = ctx.get_context(&AgentIdentity::new("a")).unwrap();
        assert!(data.is_empty());
    }

    #[tokio::test]
    async fn memories_are_scoped_per_agent() {
        let ctx = MemoryContext::new().unwrap();
        let tool = ctx.tools().into_iter().find(|t| t.name() == "add_memory").unwrap();
        let alice = ToolCtx::new(AgentIdentity::new("alice"));
        let bob = AgentIdentity::new("bob");
        tool.call(alice.clone(), json!({"content": "a", "importance": 1})).await;
        assert_eq!(ctx.memories(alice.agent_id()).len(), 1);
        assert!(ctx.memories(&bob.id).is_empty());
    }

    #[tokio::test]
    async fn state_survives_serialize_round_trip() {
        let mut agent = agent();
        add(&mut agent, "likes tea", 7).await;
        add(&mut agent, "owns a cat", 5).await;
        let state = agent.contexts().next().unwrap().serialize();

        let mut fresh = MemoryContext::new().unwrap();
        fresh.deserialize(&state, &ToolCtx::new(agent.identity().clone())).unwrap();
        assert_eq!(fresh.id(), state["id"].as_str().unwrap());
        let restored: Vec<_> = fresh.memories(agent.id()).into_iter().map(|(_, m)| m).collect();
        assert_eq!(restored.len(), 2);
        assert_eq!(restored[0].content, "likes tea");
        assert_eq!(restored[1].importance, 5);
    }
}
