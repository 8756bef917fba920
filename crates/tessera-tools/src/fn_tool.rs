// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Closure-backed tools.
//!
//! [`FnTool`] is the wrapper every context uses to expose a tool.  It binds
//! the signature, the derived schema and the body together, and it is the
//! one place where raw body results are normalised and failures turned
//! into [`ToolResponse`] errors.

use std::future::Future;
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::{
    function_to_schema, SchemaError, Tool, ToolArgs, ToolCtx, ToolResponse, ToolSignature,
    ToolValue, DEFAULT_SUMMARY_LIMIT,
};

pub type ToolFuture = BoxFuture<'static, anyhow::Result<ToolValue>>;
pub type PrepareFuture = BoxFuture<'static, anyhow::Result<()>>;

type Body = Arc<dyn Fn(ToolCtx, ToolArgs) -> ToolFuture + Send + Sync>;
type Prepare = Arc<dyn Fn() -> PrepareFuture + Send + Sync>;

pub struct FnTool {
    signature: ToolSignature,
    description: String,
    schema: Value,
    body: Body,
    prepare: Option<Prepare>,
    prepared: OnceCell<()>,
    summary_limit: usize,
}

impl FnTool {
    /// Wrap an async body.  Fails if the signature cannot produce a schema.
    pub fn new<F, Fut>(signature: ToolSignature, body: F) -> Result<Self, SchemaError>
    where
        F: Fn(ToolCtx, ToolArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<ToolValue>> + Send + 'static,
    {
        let schema = function_to_schema(&signature)?;
        let body: Body = Arc::new(move |ctx, args| -> ToolFuture { Box::pin(body(ctx, args)) });
        Ok(Self {
            description: signature.doc.trim().to_string(),
            signature,
            schema,
            body,
            prepare: None,
            prepared: OnceCell::new(),
            summary_limit: DEFAULT_SUMMARY_LIMIT,
        })
    }

    /// Wrap a body that does not await anything.
    pub fn sync<F>(signature: ToolSignature, body: F) -> Result<Self, SchemaError>
    where
        F: Fn(ToolCtx, ToolArgs) -> anyhow::Result<ToolValue> + Send + Sync + 'static,
    {
        Self::new(signature, move |ctx, args| std::future::ready(body(ctx, args)))
    }

    /// Run `prepare` once before the first call.  A failed preparation is
    /// reported as that call's error and attempted again on the next one.
    pub fn with_prepare<F, Fut>(mut self, prepare: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.prepare = Some(Arc::new(move || -> PrepareFuture { Box::pin(prepare()) }));
        self
    }

    pub fn with_summary_limit(mut self, limit: usize) -> Self {
        self.summary_limit = limit;
        self
    }

    pub fn signature(&self) -> &ToolSignature {
        &self.signature
    }

    pub fn into_arc(self) -> Arc<dyn Tool> {
        Arc::new(self)
    }

    async fn run(&self, ctx: ToolCtx, raw: Value) -> anyhow::Result<ToolValue> {
        if let Some(prepare) = &self.prepare {
            self.prepared
                .get_or_try_init(|| prepare())
                .await
                .context("preparing tool dependencies")?;
        }
        let args = ToolArgs::bind(&self.signature, raw)?;
        (self.body)(ctx, args).await
    }
}

#[async_trait]
impl Tool for FnTool {
    fn name(&self) -> &str {
        &self.signature.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn schema(&self) -> Value {
        self.schema.clone()
    }

    async fn call(&self, ctx: ToolCtx, args: Value) -> ToolResponse {
        match self.run(ctx, args).await {
            Ok(value) => value.normalize(self.summary_limit),
            Err(e) => {
                let error = format!("{e:#}");
                debug!(tool_name = %self.signature.name, %error, "tool body failed");
                ToolResponse::failure(format!("Error executing tool: {error}"), error)
            }
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
