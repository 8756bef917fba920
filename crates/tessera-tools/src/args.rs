// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use anyhow::{anyhow, bail};
use serde_json::{Map, Value};

use crate::ToolSignature;

/// Arguments of one call, checked against the tool's signature.
///
/// Missing optional parameters are filled with their defaults, so bodies
/// can read every declared parameter.  Unknown keys are kept.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolArgs {
    values: Map<String, Value>,
}

impl ToolArgs {
    pub fn bind(sig: &ToolSignature, raw: Value) -> anyhow::Result<Self> {
        let mut values = match raw {
            Value::Null => Map::new(),
            Value::Object(map) => map,
            other => bail!("arguments must be a JSON object, got {other}"),
        };
        for param in sig.visible_params() {
            let present = values.get(&param.name).is_some_and(|v| !v.is_null());
            if present {
                continue;
            }
            match &param.default {
                Some(default) => {
                    values.insert(param.name.clone(), default.clone());
                }
                None => bail!("missing required argument '{}'", param.name),
            }
        }
        Ok(Self { values })
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key).filter(|v| !v.is_null())
    }

    pub fn str(&self, key: &str) -> anyhow::Result<&str> {
        let v = self.get(key).ok_or_else(|| missing(key))?;
        v.as_str().ok_or_else(|| anyhow!("argument '{key}' must be a string"))
    }

    pub fn opt_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn i64(&self, key: &str) -> anyhow::Result<i64> {
        self.opt_i64(key)?.ok_or_else(|| missing(key))
    }

    /// Integers may arrive as whole floats or numeric strings.
    pub fn opt_i64(&self, key: &str) -> anyhow::Result<Option<i64>> {
        let Some(v) = self.get(key) else { return Ok(None) };
        let n = match v {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        };
        n.map(Some).ok_or_else(|| anyhow!("argument '{key}' must be an integer"))
    }

    pub fn f64(&self, key: &str) -> anyhow::Result<f64> {
        self.opt_f64(key)?.ok_or_else(|| missing(key))
    }

    pub fn opt_f64(&self, key: &str) -> anyhow::Result<Option<f64>> {
        let Some(v) = self.get(key) else { return Ok(None) };
        let n = match v {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        };
        n.map(Some).ok_or_else(|| anyhow!("argument '{key}' must be a number"))
    }

    pub fn bool(&self, key: &str) -> anyhow::Result<bool> {
        let v = self.get(key).ok_or_else(|| missing(key))?;
        v.as_bool().ok_or_else(|| anyhow!("argument '{key}' must be a boolean"))
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.values.clone())
    }
}

fn missing(key: &str) -> anyhow::Error {
    anyhow!("missing required argument '{key}'")
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
