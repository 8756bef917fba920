// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Named prompt texts an agent can switch into: personas and behaviour
//! modes share this storage.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Directive {
    pub id: String,
    pub name: String,
    pub instruction: String,
    pub description: String,
    /// Only used to spot duplicates, never as a key.
    pub content_hash: String,
    /// Creation order within the book.
    #[serde(default)]
    pub seq: u64,
}

impl Directive {
    pub fn new(name: &str, instruction: &str, description: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().simple().to_string(),
            name: name.to_string(),
            instruction: instruction.to_string(),
            description: description.to_string(),
            content_hash: content_hash(name, instruction),
            seq: 0,
        }
    }
}

pub(crate) fn content_hash(name: &str, instruction: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(name.as_bytes());
    hasher.update(b":::");
    hasher.update(instruction.as_bytes());
    hex::encode(hasher.finalize())
}

/// Lowercase identifier fragment usable inside a tool name.
pub(crate) fn slug(name: &str, max_len: usize) -> String {
    let mut out = String::new();
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.is_empty() && !out.ends_with('_') {
            out.push('_');
        }
    }
    out.truncate(max_len);
    let out = out.trim_end_matches('_').to_string();
    if out.is_empty() {
        "unnamed".to_string()
    } else {
        out
    }
}

/// All directives of one context plus the one each agent has active.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct DirectiveBook {
    /// directive id → directive
    pub collection: BTreeMap<String, Directive>,
    /// agent id → directive id
    pub active: BTreeMap<String, String>,
}

impl DirectiveBook {
    /// Store a new directive, or return the existing one with the same name
    /// and text.  The flag is true when it already existed.
    pub fn add(&mut self, name: &str, instruction: &str, description: &str) -> (Directive, bool) {
        let hash = content_hash(name, instruction);
        if let Some(existing) = self.collection.values().find(|d| d.content_hash == hash) {
            return (existing.clone(), true);
        }
        let mut directive = Directive::new(name, instruction, description);
        directive.seq = self.collection.values().map(|d| d.seq + 1).max().unwrap_or(0);
        self.collection.insert(directive.id.clone(), directive.clone());
        (directive, false)
    }

    pub fn activate(&mut self, agent_id: &str, directive_id: &str) -> anyhow::Result<&Directive> {
        let directive = self
            .collection
            .get(directive_id)
            .ok_or_else(|| anyhow::anyhow!("no directive with id {directive_id}"))?;
        self.active.insert(agent_id.to_string(), directive_id.to_string());
        Ok(directive)
    }

    pub fn active(&self, agent_id: &str) -> Option<&Directive> {
        self.active.get(agent_id).and_then(|id| self.collection.get(id))
    }

    /// Directives in creation order.  Switch tools are registered in this
    /// order, so the newest directive owns a shared switch name.
    pub fn ordered(&self) -> Vec<&Directive> {
        let mut list: Vec<&Directive> = self.collection.values().collect();
        list.sort_by(|a, b| a.seq.cmp(&b.seq).then_with(|| a.id.cmp(&b.id)));
        list
    }

    pub fn names(&self) -> Vec<String> {
        self.ordered().into_iter().map(|d| d.name.clone()).collect()
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
