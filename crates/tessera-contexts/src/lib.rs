// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Built-in contexts.
//!
//! Each context owns its private per-agent state behind a shared lock and
//! exposes a fixed set of [`FnTool`](tessera_tools::FnTool)s whose bodies
//! capture that state.  Contexts that mint tools at runtime (personas,
//! behaviour modes, agent-authored scripts) hand them to the invoking agent
//! through the call's effect buffer and rebuild them the same way on load.

use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::Value;
use tessera_config::Config;
use tessera_core::{Context, ContextRegistry};
use tessera_tools::{FnTool, SchemaError, Tool};

mod crypto;
mod debug;
mod directive;
mod instruction;
mod memory;
mod persona;
mod search;
mod time;
mod tool_creation;

pub use crypto::{CryptoContext, UnconfiguredWallet, WalletBackend, MAX_FAUCET_AMOUNT};
pub use debug::DebugContext;
pub use instruction::InstructionContext;
pub use memory::{MemoryContext, MemoryEntry};
pub use persona::PersonaContext;
pub use search::{GoogleSearch, SearchBackend, SearchContext, SearchHit};
pub use time::TimeContext;
pub use tool_creation::{ToolCreationContext, ToolCreationSettings, ToolManifest};

/// Register a constructor for every built-in context type, configured
/// from `config`.
pub fn register_builtin_contexts(registry: &mut ContextRegistry, config: &Config) {
    let limit = config.agent.summary_limit;

    registry.register(MemoryContext::KIND, move || boxed(MemoryContext::with_summary_limit(limit)));
    registry.register(PersonaContext::KIND, move || boxed(PersonaContext::with_summary_limit(limit)));
    registry.register(InstructionContext::KIND, move || {
        boxed(InstructionContext::with_summary_limit(limit))
    });
    registry.register(TimeContext::KIND, move || boxed(TimeContext::with_summary_limit(limit)));
    registry.register(DebugContext::KIND, move || boxed(DebugContext::with_summary_limit(limit)));

    let settings = ToolCreationSettings::from_config(&config.tools, limit);
    registry.register(ToolCreationContext::KIND, move || {
        boxed(ToolCreationContext::new(settings.clone()))
    });

    let search = Arc::new(GoogleSearch::from_config(&config.tools));
    let fetch_max_chars = config.tools.fetch_max_chars;
    registry.register(SearchContext::KIND, move || {
        boxed(SearchContext::with_summary_limit(search.clone(), fetch_max_chars, limit))
    });

    registry.register(CryptoContext::KIND, move || {
        boxed(CryptoContext::with_summary_limit(Arc::new(UnconfiguredWallet), limit))
    });
}

fn boxed<C: Context + 'static>(context: Result<C, SchemaError>) -> anyhow::Result<Box<dyn Context>> {
    Ok(Box::new(context?))
}

// ── Shared helpers ───────────────────────────────────────────────────────────

pub(crate) fn new_context_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Lock context state.  A panic inside a tool body must not make the
/// context unusable, so poisoning is ignored.
pub(crate) fn lock<T>(state: &Mutex<T>) -> MutexGuard<'_, T> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Apply the summary limit and erase the concrete tool type.
pub(crate) fn finish_tools(tools: Vec<FnTool>, summary_limit: usize) -> Vec<Arc<dyn Tool>> {
    tools
        .into_iter()
        .map(|t| t.with_summary_limit(summary_limit).into_arc())
        .collect()
}

/// Tool names as a JSON list for context snapshots.
pub(crate) fn tool_names(tools: &[Arc<dyn Tool>]) -> Value {
    Value::Array(tools.iter().map(|t| Value::String(t.name().to_string())).collect())
}

/// Take the saved instance id, if the state carries one.
pub(crate) fn restore_id(id: &mut String, state: &Value) {
    if let Some(saved) = state.get("id").and_then(Value::as_str) {
        *id = saved.to_string();
    }
}

/// Strip the common leading indentation of a multi-line text block.
pub(crate) fn dedent(text: &str) -> String {
    let indent = text
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.len() - l.trim_start().len())
        .min()
        .unwrap_or(0);
    text.lines()
        .map(|l| if l.len() >= indent { &l[indent..] } else { l.trim_start() })
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedent_strips_common_indent() {
        let text = "\n        # Title\n          - item\n        end\n    ";
        assert_eq!(dedent(text), "# Title\n  - item\nend");
    }

    #[test]
    fn restore_id_keeps_current_without_saved_id() {
        let mut id = "current".to_string();
        restore_id(&mut id, &serde_json::json!({}));
        assert_eq!(id, "current");
        restore_id(&mut id, &serde_json::json!({"id": "saved"}));
        assert_eq!(id, "saved");
    }

    #[test]
    fn builtin_registry_knows_every_kind() {
        let mut registry = ContextRegistry::new();
        register_builtin_contexts(&mut registry, &Config::default());
        for kind in [
            "memory",
            "persona",
            "instruction",
            "time",
            "debug",
            "tool_creation",
            "search",
            "crypto",
        ] {
            let context = registry.create(kind).unwrap();
            assert_eq!(context.kind(), kind);
        }
    }

    #[tokio::test]
    async fn builtin_crypto_tools_use_configured_summary_limit() {
        let mut config = Config::default();
        config.agent.summary_limit = 12;
        let mut registry = ContextRegistry::new();
        register_builtin_contexts(&mut registry, &config);

        let crypto = registry.create("crypto").unwrap();
        let balance = crypto.tools().into_iter().find(|t| t.name() == "get_balance").unwrap();
        let ctx = tessera_tools::ToolCtx::new(tessera_tools::AgentIdentity::new("a"));
        let resp = balance.call(ctx, serde_json::json!({})).await;
        assert_eq!(resp.summary, "Failed to ge...");
        assert_eq!(
            resp.content,
            Some(Value::from("Failed to get balance: no wallet backend configured"))
        );
    }
}
