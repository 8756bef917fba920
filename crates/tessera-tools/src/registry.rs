// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::{Tool, ToolCtx, ToolEffect, ToolResponse};

/// Name-keyed tool map that remembers registration order.
///
/// Registering a name that already exists replaces the tool but keeps its
/// original position.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    order: Vec<String>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `tool`, returning the one it replaced.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Option<Arc<dyn Tool>> {
        let name = tool.name().to_string();
        let previous = self.tools.insert(name.clone(), tool);
        if previous.is_none() {
            self.order.push(name);
        }
        previous
    }

    pub fn unregister(&mut self, name: &str) -> Option<Arc<dyn Tool>> {
        let removed = self.tools.remove(name)?;
        self.order.retain(|n| n != name);
        Some(removed)
    }

    /// Apply effects queued by a tool call, in order.
    pub fn apply(&mut self, effects: Vec<ToolEffect>) {
        for effect in effects {
            match effect {
                ToolEffect::Register(tool) => {
                    self.register(tool);
                }
                ToolEffect::Unregister(name) => {
                    self.unregister(&name);
                }
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.order.clone()
    }

    /// Tools in registration order.
    pub fn tools(&self) -> Vec<Arc<dyn Tool>> {
        self.order.iter().filter_map(|n| self.tools.get(n).cloned()).collect()
    }

    /// Function schemas in registration order.
    pub fn schemas(&self) -> Vec<Value> {
        self.order.iter().filter_map(|n| self.tools.get(n)).map(|t| t.schema()).collect()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub async fn execute(&self, name: &str, ctx: ToolCtx, args: Value) -> ToolResponse {
        match self.tools.get(name) {
            Some(tool) => tool.call(ctx, args).await,
            None => ToolResponse::error(format!("Tool {name} not found")),
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
