// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
mod agent;
mod context;
mod context_registry;
mod create_agent_tool;
mod directory;
mod error;
mod manager;
pub mod persistence;
mod prompts;

pub use agent::{context_to_string, Agent};
pub use context::{Context, ContextData};
pub use context_registry::{ContextFactory, ContextRegistry};
pub use create_agent_tool::CreateAgentTool;
pub use directory::{AgentDirectory, SharedAgent};
pub use error::AgentError;
pub use manager::{AgentManager, DEFAULT_CONTEXTS};
pub use persistence::{AgentState, SavedContext};
pub use prompts::{context_prompt, system_prompt, CONSTITUTION, TURN_FAILED_REPLY};

pub use tessera_tools::AgentIdentity;
