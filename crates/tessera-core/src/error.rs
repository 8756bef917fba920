// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    /// A lookup by key found nothing.  `kind` names the map searched
    /// (`"tool"`, `"context"`, `"agent"`, `"context type"`).
    #[error("{kind} '{key}' not found")]
    NotFound { kind: &'static str, key: String },

    /// A saved state document could not be decoded.
    #[error("invalid agent state: {0}")]
    Persistence(String),
}

impl AgentError {
    pub fn not_found(kind: &'static str, key: impl Into<String>) -> Self {
        AgentError::NotFound { kind, key: key.into() }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, AgentError::NotFound { .. })
    }
}
