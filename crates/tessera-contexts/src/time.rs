// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::Arc;

use anyhow::anyhow;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Map, Value};

use tessera_core::{Context, ContextData};
use tessera_tools::{
    AgentIdentity, FnTool, ParamType, SchemaError, Tool, ToolCtx, ToolResponse, ToolSignature,
    DEFAULT_SUMMARY_LIMIT,
};

use crate::{dedent, finish_tools, new_context_id, restore_id, tool_names};

const HUMAN_FORMAT: &str = "%B %d, %Y %H:%M:%S";

const INSTRUCTIONS: &str = "
    Time Context Instructions:
    - Use time-related tools to track and manage time
    - Available tools: get_current_time, format_timestamp, get_time_difference
";

/// Stateless clock and timestamp arithmetic, always in UTC.
pub struct TimeContext {
    id: String,
    tools: Vec<Arc<dyn Tool>>,
}

impl TimeContext {
    pub const KIND: &'static str = "time";

    pub fn new() -> Result<Self, SchemaError> {
        Self::with_summary_limit(DEFAULT_SUMMARY_LIMIT)
    }

    pub fn with_summary_limit(summary_limit: usize) -> Result<Self, SchemaError> {
        let tools = vec![get_current_time()?, format_timestamp()?, get_time_difference()?];
        Ok(Self { id: new_context_id(), tools: finish_tools(tools, summary_limit) })
    }
}

fn iso(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::AutoSi, false)
}

fn from_unix(timestamp: f64) -> anyhow::Result<DateTime<Utc>> {
    if !timestamp.is_finite() {
        return Err(anyhow!("timestamp {timestamp} is not a finite number"));
    }
    DateTime::from_timestamp_micros((timestamp * 1_000_000.0).round() as i64)
        .ok_or_else(|| anyhow!("timestamp {timestamp} is out of range"))
}

/// Split a duration into whole days, hours, minutes and seconds.
fn components(seconds: f64) -> (u64, u64, u64, u64) {
    let total = seconds as u64;
    (total / 86_400, total % 86_400 / 3_600, total % 3_600 / 60, total % 60)
}

fn human_difference(days: u64, hours: u64, minutes: u64, seconds: u64) -> String {
    let mut parts = Vec::new();
    if days > 0 {
        parts.push(format!("{days} days"));
    }
    if hours > 0 {
        parts.push(format!("{hours} hours"));
    }
    if minutes > 0 {
        parts.push(format!("{minutes} minutes"));
    }
    if seconds > 0 || parts.is_empty() {
        parts.push(format!("{seconds} seconds"));
    }
    parts.join(", ")
}

// ── Tools ─────────────────────────────────────────────────────────────────────

fn get_current_time() -> Result<FnTool, SchemaError> {
    let sig = ToolSignature::new(
        "get_current_time",
        "Get the current time in UTC.\n\nformat: output format ('iso', 'unix', or 'human')",
    )
    .optional("format", ParamType::String, json!("iso"));
    FnTool::sync(sig, |_ctx, args| {
        let now = Utc::now();
        let resp = match args.str("format")? {
            "unix" => {
                let ts = now.timestamp();
                ToolResponse::ok(
                    format!("Current Unix timestamp: {ts}"),
                    json!({"timestamp": ts, "format": "unix"}),
                )
            }
            "human" => {
                let text = now.format(HUMAN_FORMAT).to_string();
                ToolResponse::ok(
                    format!("Current time (UTC): {text}"),
                    json!({"time": text, "format": "human"}),
                )
            }
            _ => {
                let text = iso(&now);
                ToolResponse::ok(
                    format!("Current ISO time: {text}"),
                    json!({"time": text, "format": "iso"}),
                )
            }
        };
        Ok(resp.into())
    })
}

fn format_timestamp() -> Result<FnTool, SchemaError> {
    let sig = ToolSignature::new(
        "format_timestamp",
        "Format a Unix timestamp into a human-readable string.\n\n\
         timestamp: Unix timestamp to format\n\
         format: output format ('iso' or 'human')",
    )
    .required("timestamp", ParamType::Number)
    .optional("format", ParamType::String, json!("human"));
    FnTool::sync(sig, |_ctx, args| {
        let timestamp = args.f64("timestamp")?;
        let dt = match from_unix(timestamp) {
            Ok(dt) => dt,
            Err(e) => {
                return Ok(ToolResponse::error(format!("Error formatting timestamp: {e}")).into())
            }
        };
        let resp = if args.str("format")? == "iso" {
            let text = iso(&dt);
            ToolResponse::ok(
                format!("Formatted time: {text}"),
                json!({"time": text, "format": "iso", "input_timestamp": timestamp}),
            )
        } else {
            let text = dt.format(HUMAN_FORMAT).to_string();
            ToolResponse::ok(
                format!("Formatted time: {text} UTC"),
                json!({"time": text, "format": "human", "input_timestamp": timestamp}),
            )
        };
        Ok(resp.into())
    })
}

fn get_time_difference() -> Result<FnTool, SchemaError> {
    let sig = ToolSignature::new(
        "get_time_difference",
        "Calculate the difference between two Unix timestamps.\n\n\
         timestamp1: first Unix timestamp\n\
         timestamp2: second Unix timestamp",
    )
    .required("timestamp1", ParamType::Number)
    .required("timestamp2", ParamType::Number);
    FnTool::sync(sig, |_ctx, args| {
        let first = args.f64("timestamp1")?;
        let second = args.f64("timestamp2")?;
        let diff = (second - first).abs();
        if !diff.is_finite() {
            return Ok(ToolResponse::error(
                "Error calculating time difference: timestamps must be finite numbers",
            )
            .into());
        }
        let (days, hours, minutes, seconds) = components(diff);
        let human = human_difference(days, hours, minutes, seconds);
        Ok(ToolResponse::ok(
            format!("Time difference: {human}"),
            json!({
                "difference_seconds": diff,
                "human_readable": human,
                "components": {
                    "days": days,
                    "hours": hours,
                    "minutes": minutes,
                    "seconds": seconds,
                },
                "timestamps": {"first": first, "second": second},
            }),
        )
        .into())
    })
}

impl Context for TimeContext {
    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn tools(&self) -> Vec<Arc<dyn Tool>> {
        self.tools.clone()
    }

    fn get_context(&self, _identity: &AgentIdentity) -> Option<ContextData> {
        let mut data = Map::new();
        data.insert("current_time".into(), Value::String(iso(&Utc::now())));
        data.insert("timezone".into(), Value::from("UTC"));
        data.insert("tools".into(), tool_names(&self.tools));
        Some(data)
    }

    fn get_context_instructions(&self, _identity: &AgentIdentity) -> Option<String> {
        Some(dedent(INSTRUCTIONS))
    }

    fn serialize(&self) -> Value {
        json!({"id": self.id})
    }

    fn deserialize(&mut self, state: &Value, _ctx: &ToolCtx) -> anyhow::Result<()> {
        restore_id(&mut self.id, state);
        Ok(())
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn tool(name: &str) -> Arc<dyn Tool> {
        TimeContext::new().unwrap().tools().into_iter().find(|t| t.name() == name).unwrap()
    }

    fn ctx() -> ToolCtx {
        ToolCtx::new(AgentIdentity::new("tester"))
    }

    #[test]
    fn human_difference_omits_zero_parts() {
        assert_eq!(human_difference(1, 0, 5, 0), "1 days, 5 minutes");
        assert_eq!(human_difference(0, 0, 0, 0), "0 seconds");
        assert_eq!(human_difference(0, 2, 0, 7), "2 hours, 7 seconds");
    }

    #[test]
    fn components_split_seconds() {
        assert_eq!(components(90_061.9), (1, 1, 1, 1));
    }

    #[tokio::test]
    async fn time_difference_is_absolute() {
        let resp = tool("get_time_difference")
            .call(ctx(), json!({"timestamp1": 3_720.0, "timestamp2": 0}))
            .await;
        assert_eq!(resp.summary, "Time difference: 1 hours, 2 minutes");
        assert_eq!(resp.content.unwrap()["components"]["minutes"], 2);
    }

    #[tokio::test]
    async fn format_timestamp_human_and_iso() {
        let human = tool("format_timestamp").call(ctx(), json!({"timestamp": 0})).await;
        assert_eq!(human.summary, "Formatted time: January 01, 1970 00:00:00 UTC");

        let iso = tool("format_timestamp")
            .call(ctx(), json!({"timestamp": 86_400.5, "format": "iso"}))
            .await;
        assert_eq!(iso.summary, "Formatted time: 1970-01-02T00:00:00.500+00:00");
    }

    #[tokio::test]
    async fn out_of_range_timestamp_is_an_error() {
        let resp = tool("format_timestamp").call(ctx(), json!({"timestamp": 1e300})).await;
        assert!(resp.error.unwrap().starts_with("Error formatting timestamp:"));
    }

    #[tokio::test]
    async fn current_time_formats() {
        let unix = tool("get_current_time").call(ctx(), json!({"format": "unix"})).await;
        assert!(unix.summary.starts_with("Current Unix timestamp: "));
        assert_eq!(unix.content.unwrap()["format"], "unix");

        let iso = tool("get_current_time").call(ctx(), json!({})).await;
        assert!(iso.summary.starts_with("Current ISO time: "));
        assert!(iso.summary.ends_with("+00:00"));
    }

    #[test]
    fn snapshot_lists_tools_in_utc() {
        let time = TimeContext::new().unwrap();
        let data = time.get_context(&AgentIdentity::new("a")).unwrap();
        assert_eq!(data["timezone"], "UTC");
        assert_eq!(
            data["tools"],
            json!(["get_current_time", "format_timestamp", "get_time_difference"])
        );
        assert_eq!(time.serialize(), json!({"id": time.id()}));
    }
}
