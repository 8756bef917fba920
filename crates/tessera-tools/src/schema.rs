// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Derivation of function-call schemas from declared tool signatures.
//!
//! A [`ToolSignature`] lists the user-visible parameters of a tool.  The
//! calling agent's identity is never one of them: it reaches the tool
//! through [`crate::ToolCtx`], so a parameter named [`IDENTITY_PARAM`] is
//! dropped from the schema.

use std::fmt;
use std::str::FromStr;

use serde_json::{json, Map, Value};
use thiserror::Error;

/// Name of the identity slot, which never appears in a schema.
pub const IDENTITY_PARAM: &str = "agent_identity";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("tool name must not be empty")]
    EmptyName,
    #[error("tool '{tool}' declares parameter '{param}' more than once")]
    DuplicateParam { tool: String, param: String },
    #[error("tool '{tool}' has an empty parameter name")]
    EmptyParamName { tool: String },
    #[error("unsupported parameter type '{0}'")]
    UnsupportedType(String),
}

/// The restricted set of argument types a tool may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamType {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
    Null,
}

impl ParamType {
    pub fn as_str(self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Integer => "integer",
            ParamType::Number => "number",
            ParamType::Boolean => "boolean",
            ParamType::Array => "array",
            ParamType::Object => "object",
            ParamType::Null => "null",
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ParamType {
    type Err = SchemaError;

    /// Accepts the schema names as well as the short spellings used in
    /// hand-written tool manifests (`str`, `int`, `float`, `bool`, `list`,
    /// `dict`, `none`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "string" | "str" => Ok(ParamType::String),
            "integer" | "int" => Ok(ParamType::Integer),
            "number" | "float" => Ok(ParamType::Number),
            "boolean" | "bool" => Ok(ParamType::Boolean),
            "array" | "list" => Ok(ParamType::Array),
            "object" | "dict" => Ok(ParamType::Object),
            "null" | "none" => Ok(ParamType::Null),
            _ => Err(SchemaError::UnsupportedType(s.to_string())),
        }
    }
}

/// One declared parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    /// `None` means unannotated; the schema then says `string`.
    pub ty: Option<ParamType>,
    /// Value used when the caller omits the argument.  A parameter with a
    /// default is optional.
    pub default: Option<Value>,
}

impl Param {
    pub fn required(name: impl Into<String>, ty: ParamType) -> Self {
        Self { name: name.into(), ty: Some(ty), default: None }
    }

    pub fn optional(name: impl Into<String>, ty: ParamType, default: Value) -> Self {
        Self { name: name.into(), ty: Some(ty), default: Some(default) }
    }

    pub fn untyped(name: impl Into<String>) -> Self {
        Self { name: name.into(), ty: None, default: None }
    }

    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }

    pub fn schema_type(&self) -> ParamType {
        self.ty.unwrap_or(ParamType::String)
    }
}

/// Name, doc text and parameters of a tool.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolSignature {
    pub name: String,
    pub doc: String,
    pub params: Vec<Param>,
}

impl ToolSignature {
    pub fn new(name: impl Into<String>, doc: impl Into<String>) -> Self {
        Self { name: name.into(), doc: doc.into(), params: Vec::new() }
    }

    pub fn param(mut self, param: Param) -> Self {
        self.params.push(param);
        self
    }

    pub fn required(self, name: impl Into<String>, ty: ParamType) -> Self {
        self.param(Param::required(name, ty))
    }

    pub fn optional(self, name: impl Into<String>, ty: ParamType, default: Value) -> Self {
        self.param(Param::optional(name, ty, default))
    }

    /// Parameters that appear in the schema, in declaration order.
    pub fn visible_params(&self) -> impl Iterator<Item = &Param> {
        self.params.iter().filter(|p| p.name != IDENTITY_PARAM)
    }
}

/// Build the `{type: "function", function: {...}}` schema for `sig`.
///
/// The doc text is trimmed into the description.  A parameter is listed in
/// `required` iff it has no default.  The output depends only on the
/// signature, so repeated calls give identical values.
pub fn function_to_schema(sig: &ToolSignature) -> Result<Value, SchemaError> {
    if sig.name.trim().is_empty() {
        return Err(SchemaError::EmptyName);
    }

    let mut properties = Map::new();
    let mut required = Vec::new();

    for param in sig.visible_params() {
        if param.name.is_empty() {
            return Err(SchemaError::EmptyParamName { tool: sig.name.clone() });
        }
        if properties.contains_key(&param.name) {
            return Err(SchemaError::DuplicateParam {
                tool: sig.name.clone(),
                param: param.name.clone(),
            });
        }
        properties.insert(param.name.clone(), json!({ "type": param.schema_type().as_str() }));
        if !param.has_default() {
            required.push(Value::String(param.name.clone()));
        }
    }

    Ok(json!({
        "type": "function",
        "function": {
            "name": sig.name,
            "description": sig.doc.trim(),
            "parameters": {
                "type": "object",
                "properties": properties,
                "required": required,
            },
        },
    }))
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
