// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::Arc;

use crate::{AgentError, Context};

pub type ContextFactory = Arc<dyn Fn() -> anyhow::Result<Box<dyn Context>> + Send + Sync>;

/// Maps stable context type ids to constructors, so a saved agent can
/// rebuild its contexts.
#[derive(Clone, Default)]
pub struct ContextRegistry {
    factories: Vec<(String, ContextFactory)>,
}

impl ContextRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the constructor for `kind`.
    pub fn register<F>(&mut self, kind: impl Into<String>, factory: F)
    where
        F: Fn() -> anyhow::Result<Box<dyn Context>> + Send + Sync + 'static,
    {
        let kind = kind.into();
        let factory: ContextFactory = Arc::new(factory);
        match self.factories.iter_mut().find(|(k, _)| *k == kind) {
            Some(slot) => slot.1 = factory,
            None => self.factories.push((kind, factory)),
        }
    }

    /// Build a fresh instance with a new id.  An unknown `kind` fails with
    /// [`AgentError::NotFound`].
    pub fn create(&self, kind: &str) -> anyhow::Result<Box<dyn Context>> {
        let (_, factory) = self
            .factories
            .iter()
            .find(|(k, _)| k == kind)
            .ok_or_else(|| AgentError::not_found("context type", kind))?;
        factory()
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.factories.iter().any(|(k, _)| k == kind)
    }

    /// Registered type ids, in registration order.
    pub fn kinds(&self) -> Vec<&str> {
        self.factories.iter().map(|(k, _)| k.as_str()).collect()
    }
}
