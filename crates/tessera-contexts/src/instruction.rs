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
    Instruction Context Instructions:
    - Use create_instruction to define a named behavior mode
    - Call the matching switch_to_<name>_mode tool to adopt a mode
";

type Shared = Arc<Mutex<DirectiveBook>>;

/// Behaviour modes.  Works like personas, but the active mode's text
/// replaces the context's instructions outright.
pub struct InstructionContext {
    id: String,
    book: Shared,
    summary_limit: usize,
    tools: Vec<Arc<dyn Tool>>,
}

impl InstructionContext {
    pub const KIND: &'static str = "instruction";

    pub fn new() -> Result<Self, SchemaError> {
        Self::with_summary_limit(DEFAULT_SUMMARY_LIMIT)
    }

    pub fn with_summary_limit(summary_limit: usize) -> Result<Self, SchemaError> {
        let book: Shared = Arc::default();
        let tools = vec![create_instruction(&book, summary_limit)?];
        Ok(Self {
            id: new_context_id(),
            book,
            summary_limit,
            tools: finish_tools(tools, summary_limit),
        })
    }
}

fn switch_tool_name(mode: &Directive) -> String {
    format!("switch_to_{}_mode", slug(&mode.name, 49))
}

fn switch_tool(book: &Shared, mode: &Directive, limit: usize) -> Result<Arc<dyn Tool>, SchemaError> {
    let sig = ToolSignature::new(
        switch_tool_name(mode),
        format!("Switch to the {} mode: {}", mode.name, mode.description),
    );
    let book = book.clone();
    let mode_id = mode.id.clone();
    let tool = FnTool::sync(sig, move |ctx, _args| {
        let mut book = lock(&book);
        let resp = match book.activate(ctx.agent_id(), &mode_id) {
            Ok(mode) => ToolResponse::ok(
                format!("Switched to {} mode", mode.name),
                json!({"status": "success", "instruction": {"id": mode.id, "name": mode.name}}),
            ),
            Err(e) => ToolResponse::error(format!("Failed to switch mode: {e}")),
        };
        Ok(resp.into())
    })?;
    Ok(tool.with_summary_limit(limit).into_arc())
}

fn create_instruction(book: &Shared, limit: usize) -> Result<FnTool, SchemaError> {
    let sig = ToolSignature::new(
        "create_instruction",
        "Create a named behavior mode the agent can switch into.\n\n\
         instruction: the text that directs behavior while the mode is active\n\
         description: what the mode is for\n\
         name: short name, used in the switch_to_<name>_mode tool",
    )
    .required("instruction", ParamType::String)
    .required("description", ParamType::String)
    .required("name", ParamType::String);
    let book = book.clone();
    FnTool::sync(sig, move |ctx, args| {
        let (mode, existed) = lock(&book).add(
            args.str("name")?,
            args.str("instruction")?,
            args.str("description")?,
        );
        let tool = switch_tool(&book, &mode, limit)?;
        let switch_function = tool.name().to_string();
        ctx.effects.register(tool);

        let mut summary = format!("Created instruction with switch function name: {switch_function}");
        if existed {
            summary.push_str(" (already existed)");
        }
        Ok(ToolResponse::ok(
            summary,
            json!({
                "status": "success",
                "instruction": {
                    "id": mode.id,
                    "name": mode.name,
                    "description": mode.description,
                    "switch_function": switch_function,
                },
            }),
        )
        .into())
    })
}

impl Context for InstructionContext {
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
        let active = book.active(&identity.id).map(|m| m.name.clone());
        data.insert("active_instruction".into(), active.map_or(Value::Null, Value::String));
        data.insert("instructions".into(), json!(book.names()));
        Some(data)
    }

    fn get_context_instructions(&self, identity: &AgentIdentity) -> Option<String> {
        match lock(&self.book).active(&identity.id) {
            Some(mode) => Some(mode.instruction.clone()),
            None => Some(dedent(INSTRUCTIONS)),
        }
    }

    fn serialize(&self) -> Value {
        let book = lock(&self.book);
        json!({
            "id": self.id,
            "agent_instruction": book.active,
            "instruction_collection": book.collection,
        })
    }

    fn deserialize(&mut self, state: &Value, ctx: &ToolCtx) -> anyhow::Result<()> {
        restore_id(&mut self.id, state);
        let mut restored = DirectiveBook::default();
        if let Some(collection) = state.get("instruction_collection") {
            restored.collection = serde_json::from_value(collection.clone())?;
        }
        if let Some(active) = state.get("agent_instruction") {
            restored.active = serde_json::from_value(active.clone())?;
        }
        let modes: Vec<Directive> = restored.ordered().into_iter().cloned().collect();
        *lock(&self.book) = restored;

        for mode in &modes {
            ctx.effects.register(switch_tool(&self.book, mode, self.summary_limit)?);
        }
        Ok(())
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
