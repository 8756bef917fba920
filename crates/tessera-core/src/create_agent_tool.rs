// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::info;

use tessera_model::CompletionClient;
use tessera_tools::{
    function_to_schema, ParamType, SchemaError, Tool, ToolArgs, ToolCtx, ToolResponse,
    ToolSignature,
};

use crate::{Agent, AgentDirectory};

/// Tool that creates a new, context-free agent and adds it to the
/// directory.
pub struct CreateAgentTool {
    signature: ToolSignature,
    schema: Value,
    directory: AgentDirectory,
    client: Arc<dyn CompletionClient>,
}

impl CreateAgentTool {
    pub fn new(directory: AgentDirectory, client: Arc<dyn CompletionClient>) -> Result<Self, SchemaError> {
        let signature = ToolSignature::new("create_agent", "Create a new agent instance.")
            .required("name", ParamType::String)
            .required("token_budget", ParamType::Integer)
            .required("model", ParamType::String);
        let schema = function_to_schema(&signature)?;
        Ok(Self { signature, schema, directory, client })
    }

    fn create(&self, args: &ToolArgs) -> anyhow::Result<ToolResponse> {
        let name = args.str("name")?;
        let budget = args.i64("token_budget")?;
        let budget = u64::try_from(budget)
            .map_err(|_| anyhow::anyhow!("token_budget must not be negative"))?;
        let model = args.str("model")?;

        let agent = Agent::new(name, model, budget, self.client.clone());
        let id = agent.id().to_string();
        self.directory.insert(agent);
        info!(agent_id = %id, name, "created agent");

        Ok(ToolResponse::ok(format!("Created new agent '{name}' with ID: {id}"), json!(id)))
    }
}

#[async_trait]
impl Tool for CreateAgentTool {
    fn name(&self) -> &str { &self.signature.name }

    fn description(&self) -> &str { &self.signature.doc }

    fn schema(&self) -> Value { self.schema.clone() }

    async fn call(&self, _ctx: ToolCtx, args: Value) -> ToolResponse {
        let result = ToolArgs::bind(&self.signature, args).and_then(|args| self.create(&args));
        match result {
            Ok(response) => response,
            Err(e) => ToolResponse::failure(format!("Error executing tool: {e}"), e.to_string()),
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use tessera_model::MockClient;
    use tessera_tools::AgentIdentity;

    use super::*;

    fn tool(dir: &AgentDirectory) -> CreateAgentTool {
        CreateAgentTool::new(dir.clone(), Arc::new(MockClient)).unwrap()
    }

    fn ctx() -> ToolCtx {
        ToolCtx::new(AgentIdentity::new("caller"))
    }

    #[tokio::test]
    async fn creates_and_registers_agent() {
        let dir = AgentDirectory::new();
        let resp = tool(&dir)
            .call(ctx(), json!({"name": "helper", "token_budget": 5000, "model": "gpt-4"}))
            .await;
        assert!(resp.error.is_none());
        let id = resp.content.unwrap().as_str().unwrap().to_string();
        assert_eq!(resp.summary, format!("Created new agent 'helper' with ID: {id}"));

        let agent = dir.get_agent(&id).unwrap();
        let agent = agent.lock().await;
        assert_eq!(agent.name(), "helper");
        assert_eq!(agent.token_budget(), 5000);
    }

    #[tokio::test]
    async fn negative_budget_is_an_error() {
        let dir = AgentDirectory::new();
        let resp = tool(&dir)
            .call(ctx(), json!({"name": "x", "token_budget": -1, "model": "m"}))
            .await;
        assert!(resp.error.is_some());
        assert!(dir.is_empty());
    }

    #[test]
    fn schema_requires_all_three_arguments() {
        let t = tool(&AgentDirectory::new());
        assert_eq!(
            t.schema()["function"]["parameters"]["required"],
            json!(["name", "token_budget", "model"])
        );
    }
}
