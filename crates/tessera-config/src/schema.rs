// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Environment variable that overrides [`ToolsConfig::tools_dir`].
pub const TOOLS_DIR_ENV: &str = "AGENT_TOOLS_DIRECTORY";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub manager: ManagerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Completion backend: "openai" (any OpenAI-compatible endpoint) or "mock"
    pub provider: String,
    /// Model name forwarded to the provider API
    pub name: String,
    /// Environment variable that holds the API key (read at runtime)
    pub api_key_env: Option<String>,
    /// Explicit API key; prefer api_key_env in config files to avoid secrets
    /// in version-controlled files
    pub api_key: Option<String>,
    /// Base URL override for local proxies or self-hosted gateways.
    pub base_url: Option<String>,
    /// Maximum tokens to request in a single completion
    pub max_tokens: Option<u32>,
    /// Sampling temperature (0.0–2.0)
    pub temperature: Option<f32>,
    /// HTTP request timeout for one completion call
    pub timeout_secs: u64,
    /// Path to a YAML mock-responses file (used when provider = "mock").
    /// Can also be set via the TESSERA_MOCK_RESPONSES environment variable.
    pub mock_responses_file: Option<String>,
}

fn default_model_timeout_secs() -> u64 {
    120
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: "openai".into(),
            name: "gpt-4".into(),
            api_key_env: None,
            api_key: None,
            base_url: None,
            max_tokens: None,
            temperature: None,
            timeout_secs: default_model_timeout_secs(),
            mock_responses_file: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Token budget recorded on newly created agents
    #[serde(default = "default_token_budget")]
    pub token_budget: u64,
    /// Upper bound on completion rounds that end in tool calls.
    /// 0 keeps dispatching until the model stops asking for tools.
    #[serde(default)]
    pub max_tool_rounds: u32,
    /// Characters of a plain tool result kept in its summary
    #[serde(default = "default_summary_limit")]
    pub summary_limit: usize,
    /// Replaces the built-in constitution when set
    #[serde(default)]
    pub constitution: Option<String>,
}

fn default_token_budget() -> u64 {
    100_000
}
fn default_summary_limit() -> usize {
    100
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            token_budget: default_token_budget(),
            max_tool_rounds: 0,
            summary_limit: default_summary_limit(),
            constitution: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// Root directory for agent-authored tool manifests.
    /// `AGENT_TOOLS_DIRECTORY` takes precedence when set.
    pub tools_dir: String,
    /// Interpreters an agent-authored tool may name
    pub allowed_interpreters: Vec<String>,
    /// Timeout in seconds for a single agent-authored tool run
    pub timeout_secs: u64,
    /// Search endpoint override (defaults to the Google Custom Search API)
    pub search_endpoint: Option<String>,
    /// Environment variable holding the search API key
    pub search_api_key_env: String,
    /// Environment variable holding the search engine id
    pub search_engine_id_env: String,
    /// Default maximum characters returned by read_webpage
    pub fetch_max_chars: usize,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            tools_dir: "agent_tools".into(),
            allowed_interpreters: vec!["python3".into(), "bash".into(), "sh".into()],
            timeout_secs: 30,
            search_endpoint: None,
            search_api_key_env: "GOOGLE_API_KEY".into(),
            search_engine_id_env: "GOOGLE_SEARCH_ENGINE_ID".into(),
            fetch_max_chars: 50_000,
        }
    }
}

impl ToolsConfig {
    /// Effective tools root: the env override, else the configured path with
    /// `~` expanded.
    pub fn resolved_tools_dir(&self) -> PathBuf {
        match std::env::var(TOOLS_DIR_ENV) {
            Ok(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => PathBuf::from(shellexpand::tilde(&self.tools_dir).into_owned()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Directory holding one `agent_<user>.json` state file per user
    pub save_dir: String,
    /// Seconds between background saves of every live agent
    pub autosave_interval_secs: u64,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            save_dir: "data/agents".into(),
            autosave_interval_secs: 20,
        }
    }
}

impl ManagerConfig {
    pub fn resolved_save_dir(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.save_dir).into_owned())
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    // ── Defaults ──────────────────────────────────────────────────────────────

    #[test]
    fn config_defaults_match_original_agent_shape() {
        let c = Config::default();
        assert_eq!(c.model.provider, "openai");
        assert_eq!(c.model.name, "gpt-4");
        assert_eq!(c.agent.token_budget, 100_000);
        assert_eq!(c.agent.summary_limit, 100);
        assert_eq!(c.agent.max_tool_rounds, 0);
    }

    #[test]
    fn tools_defaults_allow_common_interpreters() {
        let t = ToolsConfig::default();
        assert!(t.allowed_interpreters.iter().any(|i| i == "python3"));
        assert_eq!(t.tools_dir, "agent_tools");
        assert_eq!(t.timeout_secs, 30);
    }

    #[test]
    fn manager_defaults() {
        let m = ManagerConfig::default();
        assert_eq!(m.save_dir, "data/agents");
        assert_eq!(m.autosave_interval_secs, 20);
    }

    #[test]
    fn resolved_save_dir_keeps_relative_paths() {
        let m = ManagerConfig::default();
        assert_eq!(m.resolved_save_dir(), PathBuf::from("data/agents"));
    }

    // ── YAML round-trip ───────────────────────────────────────────────────────

    #[test]
    fn config_serialises_to_valid_yaml() {
        let c = Config::default();
        let yaml_str = serde_yaml::to_string(&c).unwrap();
        assert!(yaml_str.contains("provider"));
        assert!(yaml_str.contains("save_dir"));
    }

    #[test]
    fn config_partial_yaml_fills_in_defaults() {
        let yaml_str = "model:\n  name: gpt-4o-mini\n  provider: openai\n";
        let c: Config = serde_yaml::from_str(yaml_str).unwrap();
        assert_eq!(c.model.name, "gpt-4o-mini");
        assert_eq!(c.model.timeout_secs, 120);
        assert_eq!(c.agent.token_budget, AgentConfig::default().token_budget);
        assert_eq!(c.manager.autosave_interval_secs, 20);
    }

    #[test]
    fn agent_section_overrides() {
        let yaml_str = "agent:\n  max_tool_rounds: 4\n  constitution: be terse\n";
        let c: Config = serde_yaml::from_str(yaml_str).unwrap();
        assert_eq!(c.agent.max_tool_rounds, 4);
        assert_eq!(c.agent.constitution.as_deref(), Some("be terse"));
        assert_eq!(c.agent.summary_limit, 100);
    }
}
