// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Per-user agent lifecycle: creation, lookup, persistence and autosave.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use tessera_config::{AgentConfig, Config};
use tessera_model::CompletionClient;
use tessera_tools::AgentIdentity;

use crate::{persistence, Agent, AgentDirectory, ContextRegistry, SharedAgent};

/// Context types given to every new agent, in registration order.
pub const DEFAULT_CONTEXTS: &[&str] =
    &["persona", "memory", "time", "crypto", "debug", "tool_creation", "search"];

pub struct AgentManager {
    agents: Mutex<HashMap<String, SharedAgent>>,
    save_dir: PathBuf,
    tools_dir: PathBuf,
    model: String,
    agent_config: AgentConfig,
    default_contexts: Vec<String>,
    directory: AgentDirectory,
    registry: ContextRegistry,
    client: Arc<dyn CompletionClient>,
    stop: Notify,
    autosave: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl AgentManager {
    pub fn new(
        config: &Config,
        registry: ContextRegistry,
        directory: AgentDirectory,
        client: Arc<dyn CompletionClient>,
    ) -> Self {
        Self {
            agents: Mutex::new(HashMap::new()),
            save_dir: config.manager.resolved_save_dir(),
            tools_dir: config.tools.resolved_tools_dir(),
            model: config.model.name.clone(),
            agent_config: config.agent.clone(),
            default_contexts: DEFAULT_CONTEXTS.iter().map(|s| s.to_string()).collect(),
            directory,
            registry,
            client,
            stop: Notify::new(),
            autosave: std::sync::Mutex::new(None),
        }
    }

    /// Replace the context types given to new agents.
    pub fn with_default_contexts<I, S>(mut self, kinds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.default_contexts = kinds.into_iter().map(Into::into).collect();
        self
    }

    pub fn directory(&self) -> &AgentDirectory {
        &self.directory
    }

    pub fn agent_path(&self, user_id: &str) -> PathBuf {
        self.save_dir.join(format!("agent_{user_id}.json"))
    }

    /// Build a fresh agent for `user_id` with the default contexts.
    pub async fn create_agent(&self, user_id: &str) -> anyhow::Result<SharedAgent> {
        let mut agents = self.agents.lock().await;
        let handle = self.build_agent(user_id).await?;
        agents.insert(user_id.to_string(), handle.clone());
        Ok(handle)
    }

    async fn build_agent(&self, user_id: &str) -> anyhow::Result<SharedAgent> {
        let identity = AgentIdentity::with_user(format!("User_{user_id}"), user_id);
        let mut agent = Agent::with_identity(
            identity,
            self.model.clone(),
            self.agent_config.token_budget,
            self.client.clone(),
        )
        .with_config(&self.agent_config);

        for kind in &self.default_contexts {
            match self.registry.create(kind) {
                Ok(context) => agent.register_context(context),
                Err(e) => warn!(user_id, error = %e, "skipping default context"),
            }
        }

        self.ensure_tools_dir(agent.id()).await?;
        let handle = self.directory.insert(agent);
        info!(user_id, "created agent");
        Ok(handle)
    }

    /// Cached agent, else the saved one, else a new one.  A saved file that
    /// fails to load is replaced by a new agent.
    ///
    /// The user map stays locked until the agent is cached, so concurrent
    /// calls for one user share a single agent.
    pub async fn get_or_create_agent(&self, user_id: &str) -> anyhow::Result<SharedAgent> {
        let mut agents = self.agents.lock().await;
        if let Some(handle) = agents.get(user_id) {
            return Ok(handle.clone());
        }

        let handle = self.load_or_build(user_id).await?;
        agents.insert(user_id.to_string(), handle.clone());
        Ok(handle)
    }

    async fn load_or_build(&self, user_id: &str) -> anyhow::Result<SharedAgent> {
        let path = self.agent_path(user_id);
        if !path.is_file() {
            return self.build_agent(user_id).await;
        }

        match persistence::load(&path, &self.registry, &self.directory, self.client.clone()).await {
            Ok(handle) => {
                let agent_id = {
                    let mut agent = handle.lock().await;
                    agent.configure(&self.agent_config);
                    agent.id().to_string()
                };
                self.ensure_tools_dir(&agent_id).await?;
                info!(user_id, "loaded agent");
                Ok(handle)
            }
            Err(e) => {
                error!(user_id, error = %format!("{e:#}"), "failed to load agent; creating a new one");
                self.build_agent(user_id).await
            }
        }
    }

    pub async fn save_agent(&self, user_id: &str) -> anyhow::Result<()> {
        let Some(handle) = self.agents.lock().await.get(user_id).cloned() else {
            return Ok(());
        };
        let agent = handle.lock().await;
        persistence::save(&agent, &self.agent_path(user_id))
            .await
            .with_context(|| format!("saving agent for user {user_id}"))
    }

    /// Save every cached agent.  Failures are logged and do not stop the
    /// remaining saves.
    pub async fn save_all_agents(&self) {
        let user_ids: Vec<String> = self.agents.lock().await.keys().cloned().collect();
        for user_id in user_ids {
            if let Err(e) = self.save_agent(&user_id).await {
                error!(user_id, error = %format!("{e:#}"), "failed to save agent");
            }
        }
    }

    /// Forget the agent and delete its saved file.
    pub async fn remove_agent(&self, user_id: &str) -> anyhow::Result<()> {
        let Some(handle) = self.agents.lock().await.remove(user_id) else {
            return Ok(());
        };
        let agent_id = handle.lock().await.id().to_string();
        self.directory.remove(&agent_id);

        let path = self.agent_path(user_id);
        if path.exists() {
            tokio::fs::remove_file(&path)
                .await
                .with_context(|| format!("deleting {}", path.display()))?;
        }
        info!(user_id, "removed agent");
        Ok(())
    }

    pub async fn user_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.agents.lock().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Start saving every agent each `interval` until [`shutdown`] runs.
    ///
    /// [`shutdown`]: AgentManager::shutdown
    pub fn spawn_autosave(self: &Arc<Self>, interval: Duration) {
        let manager = Arc::clone(self);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        debug!("autosaving agents");
                        manager.save_all_agents().await;
                    }
                    _ = manager.stop.notified() => break,
                }
            }
        });
        let mut slot = self.autosave.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(old) = slot.replace(task) {
            old.abort();
        }
    }

    /// Stop autosaving and save everything one last time.
    pub async fn shutdown(&self) {
        info!("shutting down agent manager");
        let task = self.autosave.lock().unwrap_or_else(|p| p.into_inner()).take();
        if let Some(task) = task {
            self.stop.notify_one();
            if let Err(e) = task.await {
                warn!(error = %e, "autosave task ended abnormally");
            }
        }
        self.save_all_agents().await;
        info!("agent manager shutdown complete");
    }

    async fn ensure_tools_dir(&self, agent_id: &str) -> anyhow::Result<()> {
        let dir = self.tools_dir.join(agent_id);
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("creating {}", dir.display()))
    }
}
