// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::Arc;

use anyhow::bail;
use async_trait::async_trait;
use serde_json::{json, Map, Value};

use tessera_core::{Context, ContextData};
use tessera_tools::{
    AgentIdentity, FnTool, ParamType, SchemaError, Tool, ToolCtx, ToolSignature, ToolValue,
    DEFAULT_SUMMARY_LIMIT,
};

use crate::{dedent, finish_tools, new_context_id, restore_id};

/// Largest faucet payout, in ETH.
pub const MAX_FAUCET_AMOUNT: f64 = 0.1;

/// Access to the agent's on-chain wallet.  Keys never pass through the
/// context; the backend resolves everything from the agent id.
#[async_trait]
pub trait WalletBackend: Send + Sync {
    fn address(&self, agent_id: &str) -> anyhow::Result<String>;

    /// Balance in whole token units.
    async fn balance(&self, agent_id: &str, token: &str) -> anyhow::Result<f64>;

    /// Send `amount` ETH from the faucet to the agent; returns the
    /// transaction id.
    async fn faucet(&self, agent_id: &str, amount: f64) -> anyhow::Result<String>;
}

/// Placeholder used when no wallet is configured.
pub struct UnconfiguredWallet;

#[async_trait]
impl WalletBackend for UnconfiguredWallet {
    fn address(&self, _agent_id: &str) -> anyhow::Result<String> {
        bail!("no wallet backend configured")
    }

    async fn balance(&self, _agent_id: &str, _token: &str) -> anyhow::Result<f64> {
        bail!("no wallet backend configured")
    }

    async fn faucet(&self, _agent_id: &str, _amount: f64) -> anyhow::Result<String> {
        bail!("no wallet backend configured")
    }
}

const INSTRUCTIONS: &str = "
    You have access to crypto capabilities through:
    1. Balance checking
    2. Requesting test funds from the faucet

    Use simple token symbols like 'eth', 'usdc', 'dai'.
    Before attempting any transfer, check your balance to ensure you have sufficient funds.
";

pub struct CryptoContext {
    id: String,
    wallet: Arc<dyn WalletBackend>,
    tools: Vec<Arc<dyn Tool>>,
}

impl CryptoContext {
    pub const KIND: &'static str = "crypto";

    pub fn new(wallet: Arc<dyn WalletBackend>) -> Result<Self, SchemaError> {
        Self::with_summary_limit(wallet, DEFAULT_SUMMARY_LIMIT)
    }

    pub fn with_summary_limit(
        wallet: Arc<dyn WalletBackend>,
        summary_limit: usize,
    ) -> Result<Self, SchemaError> {
        let tools = vec![get_balance(wallet.clone())?, request_faucet(wallet.clone())?];
        Ok(Self { id: new_context_id(), wallet, tools: finish_tools(tools, summary_limit) })
    }
}

fn get_balance(wallet: Arc<dyn WalletBackend>) -> Result<FnTool, SchemaError> {
    let sig = ToolSignature::new(
        "get_balance",
        "Get the token balance of the agent's address.\n\ntoken: token symbol (default 'eth')",
    )
    .optional("token", ParamType::String, json!("eth"));
    FnTool::new(sig, move |ctx, args| {
        let wallet = wallet.clone();
        async move {
            let token = args.str("token")?.to_lowercase();
            let symbol = token.to_uppercase();
            let text = match wallet.balance(ctx.agent_id(), &token).await {
                Ok(amount) => format!("{symbol} Balance: {amount} {symbol}"),
                Err(e) => format!("Failed to get balance: {e:#}"),
            };
            anyhow::Ok(ToolValue::from(text))
        }
    })
}

fn request_faucet(wallet: Arc<dyn WalletBackend>) -> Result<FnTool, SchemaError> {
    let sig = ToolSignature::new(
        "request_faucet",
        "Request ETH from the faucet.\n\namount: amount of ETH to request (max 0.1)",
    )
    .optional("amount", ParamType::Number, json!(MAX_FAUCET_AMOUNT));
    FnTool::new(sig, move |ctx, args| {
        let wallet = wallet.clone();
        async move {
            let requested = args.f64("amount")?;
            if requested.is_nan() || requested <= 0.0 {
                return anyhow::Ok(ToolValue::from("Faucet request failed: amount must be positive"));
            }
            let amount = requested.min(MAX_FAUCET_AMOUNT);
            let text = match wallet.faucet(ctx.agent_id(), amount).await {
                Ok(tx) => format!("Faucet sent {amount} ETH. Transaction: {tx}"),
                Err(e) => format!("Faucet request failed: {e:#}"),
            };
            anyhow::Ok(ToolValue::from(text))
        }
    })
}

impl Context for CryptoContext {
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

    fn get_context(&self, identity: &AgentIdentity) -> Option<ContextData> {
        let address = self.wallet.address(&identity.id).ok()?;
        let mut data = Map::new();
        data.insert("ethereum_address".into(), Value::String(address));
        Some(data)
    }

    fn get_context_instructions(&self, identity: &AgentIdentity) -> Option<String> {
        let mut text = dedent(INSTRUCTIONS);
        match self.wallet.address(&identity.id) {
            Ok(address) => text.push_str(&format!(
                "\n\nYour Ethereum address is: {address}\n\
                 When discussing transactions or balances, always reference this address."
            )),
            Err(_) => text.push_str("\n\nNo wallet is configured yet, so these tools will report errors."),
        }
        Some(text)
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
