// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
mod args;
mod fn_tool;
mod identity;
mod registry;
mod response;
mod schema;
mod tool;

pub use args::ToolArgs;
pub use fn_tool::{FnTool, PrepareFuture, ToolFuture};
pub use identity::AgentIdentity;
pub use registry::ToolRegistry;
pub use response::{ToolResponse, ToolValue, DEFAULT_SUMMARY_LIMIT};
pub use schema::{function_to_schema, Param, ParamType, SchemaError, ToolSignature, IDENTITY_PARAM};
pub use tool::{Tool, ToolCtx, ToolEffect, ToolEffects, ToolObserver};
