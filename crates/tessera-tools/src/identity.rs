// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Who is calling.  Every tool and context receives this and keys its
/// per-agent state by [`AgentIdentity::id`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgentIdentity {
    pub id: String,
    pub user_id: String,
    pub name: String,
}

impl AgentIdentity {
    /// Fresh identity with random `id` and `user_id`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: Uuid::new_v4().to_string(),
            name: name.into(),
        }
    }

    pub fn with_user(name: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self { user_id: user_id.into(), ..Self::new(name) }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
