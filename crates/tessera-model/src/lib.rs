// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
mod types;
mod client;
mod openai_compat;
mod mock;
mod yaml_mock;

pub use types::*;
pub use client::CompletionClient;
pub use openai_compat::{OpenAiClient, DEFAULT_BASE_URL};
pub use mock::{MockClient, Script, ScriptedClient};
pub use yaml_mock::YamlMockClient;

use std::sync::Arc;
use std::time::Duration;

use anyhow::bail;
use tessera_config::ModelConfig;

/// Environment variable naming a YAML mock-responses file.
pub const MOCK_RESPONSES_ENV: &str = "TESSERA_MOCK_RESPONSES";

/// Construct a shared [`CompletionClient`] from configuration.
///
/// Provider selection:
/// - `"openai"` → [`OpenAiClient`] (any OpenAI-compatible endpoint)
/// - `"mock"` → [`YamlMockClient`] if a responses file is configured,
///   otherwise [`MockClient`] (echo-back)
pub fn client_from_config(cfg: &ModelConfig) -> anyhow::Result<Arc<dyn CompletionClient>> {
    match cfg.provider.as_str() {
        "openai" => Ok(Arc::new(OpenAiClient::new(
            resolve_api_key(cfg),
            cfg.base_url.as_deref(),
            cfg.max_tokens,
            cfg.temperature,
            Duration::from_secs(cfg.timeout_secs),
        )?)),
        "mock" => {
            let responses_path = std::env::var(MOCK_RESPONSES_ENV)
                .ok()
                .or_else(|| cfg.mock_responses_file.clone());
            if let Some(path) = responses_path {
                Ok(Arc::new(YamlMockClient::from_file(&path)?))
            } else {
                Ok(Arc::new(MockClient))
            }
        }
        other => bail!("unknown model provider: {other}"),
    }
}

fn resolve_api_key(cfg: &ModelConfig) -> Option<String> {
    if let Some(k) = &cfg.api_key {
        return Some(k.clone());
    }
    cfg.api_key_env
        .as_ref()
        .and_then(|env| std::env::var(env).ok())
        .or_else(|| std::env::var("OPENAI_API_KEY").ok())
}
