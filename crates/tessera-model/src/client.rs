use async_trait::async_trait;

use crate::{CompletionRequest, CompletionResponse};

/// Stateless request/response boundary to a chat-completions model.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Human-readable backend name for logs.
    fn name(&self) -> &str;

    /// Send one request and wait for the full assistant message.
    async fn complete(&self, req: CompletionRequest) -> anyhow::Result<CompletionResponse>;
}
