// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Saving agents to JSON and rebuilding them.
//!
//! A state document holds the identity, accounting, message log and one
//! `{id, type, state}` entry per context, in registration order.  Loading
//! puts the agent into the [`AgentDirectory`] first, then registers fresh
//! contexts under their saved ids, and only then restores each context's
//! state, so tools rebuilt during restore land on a fully wired agent.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context as _;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info};

use tessera_model::{CompletionClient, Message, Usage};
use tessera_tools::AgentIdentity;

use crate::{Agent, AgentDirectory, AgentError, ContextRegistry, SharedAgent};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentState {
    pub identity: AgentIdentity,
    pub token_budget: u64,
    pub model: String,
    #[serde(default)]
    pub token_usage: Usage,
    #[serde(default)]
    pub message_log: Vec<Message>,
    #[serde(default)]
    pub contexts: Vec<SavedContext>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedContext {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub state: Value,
}

impl Agent {
    pub fn to_state(&self) -> AgentState {
        AgentState {
            identity: self.identity.clone(),
            token_budget: self.token_budget,
            model: self.model.clone(),
            token_usage: self.token_usage,
            message_log: self.message_log.clone(),
            contexts: self
                .contexts
                .iter()
                .map(|c| SavedContext {
                    id: c.id().to_string(),
                    kind: c.kind().to_string(),
                    state: c.serialize(),
                })
                .collect(),
        }
    }
}

pub fn decode_state(text: &str) -> Result<AgentState, AgentError> {
    serde_json::from_str(text).map_err(|e| AgentError::Persistence(e.to_string()))
}

/// Write `agent` to `path`, creating parent directories.  The file is
/// replaced atomically.
pub async fn save(agent: &Agent, path: &Path) -> anyhow::Result<()> {
    let text = serde_json::to_string_pretty(&agent.to_state()).context("encoding agent state")?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("creating {}", parent.display()))?;
    }

    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, text)
        .await
        .with_context(|| format!("writing {}", tmp.display()))?;
    tokio::fs::rename(&tmp, path)
        .await
        .with_context(|| format!("replacing {}", path.display()))?;

    debug!(agent_id = %agent.id(), path = %path.display(), "saved agent state");
    Ok(())
}

pub async fn read_state(path: &Path) -> anyhow::Result<AgentState> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    let state = decode_state(&text).with_context(|| format!("decoding {}", path.display()))?;
    Ok(state)
}

/// Load an agent from `path` and add it to `directory`.
pub async fn load(
    path: &Path,
    registry: &ContextRegistry,
    directory: &AgentDirectory,
    client: Arc<dyn CompletionClient>,
) -> anyhow::Result<SharedAgent> {
    let state = read_state(path).await?;
    let handle = restore(state, registry, directory, client).await?;
    info!(path = %path.display(), "loaded agent state");
    Ok(handle)
}

/// Rebuild an agent from a decoded document.  On failure the half-built
/// agent is taken out of `directory` again and any agent it displaced is
/// put back.
pub async fn restore(
    state: AgentState,
    registry: &ContextRegistry,
    directory: &AgentDirectory,
    client: Arc<dyn CompletionClient>,
) -> anyhow::Result<SharedAgent> {
    let AgentState { identity, token_budget, model, token_usage, message_log, contexts } = state;

    let mut agent = Agent::with_identity(identity, model, token_budget, client);
    agent.token_usage = token_usage;
    agent.message_log = message_log;
    let id = agent.id().to_string();

    let handle: SharedAgent = Arc::new(Mutex::new(agent));
    let previous = directory.insert_shared(id.clone(), handle.clone());
    if let Err(e) = rebuild_contexts(&handle, &contexts, registry).await {
        match previous {
            Some(previous) => {
                directory.insert_shared(id, previous);
            }
            None => {
                directory.remove(&id);
            }
        }
        return Err(e);
    }
    Ok(handle)
}

async fn rebuild_contexts(
    handle: &SharedAgent,
    saved: &[SavedContext],
    registry: &ContextRegistry,
) -> anyhow::Result<()> {
    let mut agent = handle.lock().await;

    for entry in saved {
        let mut context = registry.create(&entry.kind)?;
        context.set_id(entry.id.clone());
        agent.register_context(context);
    }

    for entry in saved {
        agent.deserialize_context(&entry.id, &entry.state)?;
    }
    Ok(())
}
