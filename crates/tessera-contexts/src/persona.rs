// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::{Arc, Mutex};

use serde_json::{json, Map, Value};

use tessera_core::{Context, ContextData};
use tessera_tools::{
    AgentIdentity, FnTool, ParamType, SchemaError, Tool, ToolCtx, ToolResponse, ToolSignature,
    DEFAULT_SUMMARY_LIMIT,
};

use crate::directive::{slug, Directive, DirectiveBook};
use crate::{dedent, finish_tools, lock, new_context_id, restore_id};

const INSTRUCTIONS: &str = "
    Persona Context Instructions:
    - Maintain consistent personality traits
    - Follow defined behavioral patterns
    - Use persona-specific language and tone
";

type Shared = Arc<Mutex<DirectiveBook>>;

/// Personas the agent can create and then switch into.  Each persona gets
/// its own `become_*` tool.
pub struct PersonaContext {
    id: String,
    book: Shared,
    summary_limit: usize,
    tools: Vec<Arc<dyn Tool>>,
}

impl PersonaContext {
    pub const KIND: &'static str = "persona";

    pub fn new() -> Result<Self, SchemaError> {
        Self::with_summary_limit(DEFAULT_SUMMARY_LIMIT)
    }

    pub fn with_summary_limit(summary_limit: usize) -> Result<Self, SchemaError> {
        let book: Shared = Arc::default();
        let tools = vec![create_persona(&book, summary_limit)?];
        Ok(Self {
            id: new_context_id(),
            book,
            summary_limit,
            tools: finish_tools(tools, summary_limit),
        })
    }
}

/// `become_<slug>_<first 16 id chars>`, at most 64 characters.
pub(crate) fn switch_tool_name(persona: &Directive) -> String {
    let prefix: String = persona.id.chars().take(16).collect();
    format!("become_{}_{prefix}", slug(&persona.name, 40))
}

fn switch_tool(book: &Shared, persona: &Directive, limit: usize) -> Result<Arc<dyn Tool>, SchemaError> {
    let sig = ToolSignature::new(
        switch_tool_name(persona),
        format!(
            "Switch to the {} persona. Only one persona switch can be called at a time \
             and it must be the last call in the sequence.",
            persona.name
        ),
    );
    let book = book.clone();
    let persona_id = persona.id.clone();
    let tool = FnTool::sync(sig, move |ctx, _args| {
        let mut book = lock(&book);
        let resp = match book.activate(ctx.agent_id(), &persona_id) {
            Ok(persona) => ToolResponse::ok(
                format!("Now acting as {}", persona.name),
                json!({
                    "status": "success",
                    "persona": {"id": persona.id, "name": persona.name},
                }),
            ),
            Err(e) => ToolResponse::error(format!("Failed to switch persona: {e}")),
        };
        Ok(resp.into())
    })?;
    Ok(tool.with_summary_limit(limit).into_arc())
}

fn create_persona(book: &Shared, limit: usize) -> Result<FnTool, SchemaError> {
    let sig = ToolSignature::new(
        "create_persona",
        "Register a new persona with the agent.\n\n\
         A persona defines a specific personality and role for the agent through a system \
         prompt. When registered, the persona becomes available for the agent to embody.\n\n\
         persona: the system prompt text that defines the personality and behavior\n\
         description: what this persona is like and what it is for\n\
         name: a short descriptive name, used in the name of the become_* switch tool",
    )
    .required("persona", ParamType::String)
    .required("description", ParamType::String)
    .required("name", ParamType::String);
    let book = book.clone();
    FnTool::sync(sig, move |ctx, args| {
        let (persona, existed) = lock(&book).add(
            args.str("name")?,
            args.str("persona")?,
            args.str("description")?,
        );
        let tool = switch_tool(&book, &persona, limit)?;
        let switch_function = tool.name().to_string();
        ctx.effects.register(tool);

        let mut summary = format!("Created persona with switch function name: {switch_function}");
        if existed {
            summary.push_str(" (already existed)");
        }
        Ok(ToolResponse::ok(
            summary,
            json!({
                "status": "success",
                "persona": {
                    "id": persona.id,
                    "name": persona.name,
                    "description": persona.description,
                    "switch_function": switch_function,
                },
            }),
        )
        .into())
    })
}

impl Context for PersonaContext {
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
        let book = lock(&self.book);
        let mut data = Map::new();
        let active = book.active(&identity.id).map(|p| p.name.clone());
        data.insert("active_persona".into(), active.map_or(Value::Null, Value::String));
        data.insert("personas".into(), json!(book.names()));
        let mut tools: Vec<String> = self.tools.iter().map(|t| t.name().to_string()).collect();
        tools.extend(book.ordered().into_iter().map(switch_tool_name));
        data.insert("tools".into(), json!(tools));
        Some(data)
    }

    fn get_context_instructions(&self, identity: &AgentIdentity) -> Option<String> {
        let mut text = dedent(INSTRUCTIONS);
        if let Some(persona) = lock(&self.book).active(&identity.id) {
            text.push_str(&format!(
                "\n\nYou are currently acting as {}:\n{}",
                persona.name, persona.instruction
            ));
        }
        Some(text)
    }

    fn serialize(&self) -> Value {
        let book = lock(&self.book);
        json!({
            "id": self.id,
            "agent_persona": book.active,
            "persona_collection": book.collection,
        })
    }

    fn deserialize(&mut self, state: &Value, ctx: &ToolCtx) -> anyhow::Result<()> {
        restore_id(&mut self.id, state);
        let mut restored = DirectiveBook::default();
        if let Some(collection) = state.get("persona_collection") {
            restored.collection = serde_json::from_value(collection.clone())?;
        }
        if let Some(active) = state.get("agent_persona") {
            restored.active = serde_json::from_value(active.clone())?;
        }
        let personas: Vec<Directive> = restored.ordered().into_iter().cloned().collect();
        *lock(&self.book) = restored;

        for persona in &personas {
            ctx.effects.register(switch_tool(&self.book, persona, self.summary_limit)?);
        }
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
        agent.register_context(Box::new(PersonaContext::new().unwrap()));
        agent
    }

    async fn create(agent: &mut Agent, name: &str, text: &str) -> ToolResponse {
        agent
            .execute_tool(
                "create_persona",
                json!({"persona": text, "description": "test persona", "name": name}),
            )
            .await
    }

    #[tokio::test]
    async fn create_registers_switch_tool() {
        let mut agent = agent();
        let resp = create(&mut agent, "Pirate Captain", "Talk like a pirate.").await;
        let switch = resp.content.unwrap()["persona"]["switch_function"]
            .as_str()
            .unwrap()
            .to_string();
        assert!(switch.starts_with("become_pirate_captain_"));
        assert_eq!(switch.len(), "become_pirate_captain_".len() + 16);
        assert!(agent.tool(&switch).is_some());

        let switched = agent.execute_tool(&switch, json!({})).await;
        assert_eq!(switched.summary, "Now acting as Pirate Captain");
        assert!(agent.system_prompt().contains("Talk like a pirate."));
    }

    #[tokio::test]
    async fn duplicate_persona_is_idempotent() {
        let mut agent = agent();
        let first = create(&mut agent, "Pirate", "Arr.").await;
        let second = create(&mut agent, "Pirate", "Arr.").await;
        assert!(second.summary.ends_with("(already existed)"));
        assert_eq!(
            first.content.unwrap()["persona"]["id"],
            second.content.unwrap()["persona"]["id"]
        );
        let switches = agent.tool_names().into_iter().filter(|n| n.starts_with("become_")).count();
        assert_eq!(switches, 1);
    }

    #[tokio::test]
    async fn active_persona_is_per_agent() {
        let ctx = PersonaContext::new().unwrap();
        let create = ctx.tools().remove(0);
        let alice = ToolCtx::new(AgentIdentity::new("alice"));
        let resp = create
            .call(alice.clone(), json!({"persona": "Be kind.", "description": "", "name": "Kind"}))
            .await;
        assert!(!resp.is_error());
        let switch = match alice.effects.drain().pop() {
            Some(tessera_tools::ToolEffect::Register(tool)) => tool,
            other => panic!("expected a registered switch tool, got {other:?}"),
        };
        switch.call(alice.clone(), json!({})).await;

        let bob = AgentIdentity::new("bob");
        assert_eq!(ctx.get_context(&alice.identity).unwrap()["active_persona"], "Kind");
        assert_eq!(ctx.get_context(&bob).unwrap()["active_persona"], Value::Null);
        assert!(!ctx.get_context_instructions(&bob).unwrap().contains("Be kind."));
    }

    #[tokio::test]
    async fn deserialize_rebuilds_switch_tools_with_stored_ids() {
        let mut agent = agent();
        let resp = create(&mut agent, "Sage", "Speak wisely.").await;
        let switch = resp.content.unwrap()["persona"]["switch_function"]
            .as_str()
            .unwrap()
            .to_string();
        agent.execute_tool(&switch, json!({})).await;
        let state = agent.contexts().next().unwrap().serialize();

        let mut fresh = PersonaContext::new().unwrap();
        let ctx = ToolCtx::new(agent.identity().clone());
        fresh.deserialize(&state, &ctx).unwrap();
        let rebuilt: Vec<String> = ctx
            .effects
            .drain()
            .into_iter()
            .filter_map(|e| match e {
                tessera_tools::ToolEffect::Register(tool) => Some(tool.name().to_string()),
                _ => None,
            })
            .collect();
        assert_eq!(rebuilt, vec![switch]);
        assert!(fresh
            .get_context_instructions(agent.identity())
            .unwrap()
            .contains("Speak wisely."));
    }
}
