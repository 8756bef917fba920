// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::Mutex;

use crate::{Agent, AgentError};

/// Handle to a live agent.
pub type SharedAgent = Arc<Mutex<Agent>>;

/// Lookup from agent id to live agent.
///
/// Cloning yields another handle to the same map.  Entries are added and
/// removed explicitly by whoever owns the agents; nothing is evicted.
#[derive(Clone, Default)]
pub struct AgentDirectory {
    agents: Arc<RwLock<HashMap<String, SharedAgent>>>,
}

impl AgentDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap `agent` and add it under its own id.
    pub fn insert(&self, agent: Agent) -> SharedAgent {
        let id = agent.id().to_string();
        let handle = Arc::new(Mutex::new(agent));
        self.insert_shared(id, handle.clone());
        handle
    }

    /// Add `agent` under `id`, returning the entry it replaced.
    pub fn insert_shared(&self, id: impl Into<String>, agent: SharedAgent) -> Option<SharedAgent> {
        self.agents.write().unwrap_or_else(PoisonError::into_inner).insert(id.into(), agent)
    }

    pub fn get_agent(&self, id: &str) -> Result<SharedAgent, AgentError> {
        self.agents
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
            .ok_or_else(|| AgentError::not_found("agent", id))
    }

    pub fn remove(&self, id: &str) -> Option<SharedAgent> {
        self.agents.write().unwrap_or_else(PoisonError::into_inner).remove(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.agents.read().unwrap_or_else(PoisonError::into_inner).contains_key(id)
    }

    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> =
            self.agents.read().unwrap_or_else(PoisonError::into_inner).keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.agents.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use tessera_model::MockClient;

    use super::*;

    fn agent(name: &str) -> Agent {
        Agent::new(name, "gpt-4", 1000, Arc::new(MockClient))
    }

    #[tokio::test]
    async fn insert_then_get() {
        let dir = AgentDirectory::new();
        let handle = dir.insert(agent("a"));
        let id = handle.lock().await.id().to_string();
        let found = dir.get_agent(&id).unwrap();
        assert!(Arc::ptr_eq(&handle, &found));
    }

    #[test]
    fn missing_agent_is_not_found() {
        let err = AgentDirectory::new().get_agent("nope").err().unwrap();
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "agent 'nope' not found");
    }

    #[test]
    fn clones_share_entries() {
        let dir = AgentDirectory::new();
        let other = dir.clone();
        dir.insert(agent("a"));
        assert_eq!(other.len(), 1);
    }

    #[tokio::test]
    async fn remove_drops_entry() {
        let dir = AgentDirectory::new();
        let id = dir.insert(agent("a")).lock().await.id().to_string();
        assert!(dir.remove(&id).is_some());
        assert!(!dir.contains(&id));
        assert!(dir.is_empty());
    }
}
