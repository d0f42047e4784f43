use anyhow::Result;
use async_trait::async_trait;
use orchestrator_core::{RouterContext, RoutingDecision};

/// An LLM-backed (or scripted, for tests) classifier. Implementations are
/// wrapped by `orchestrator-adapters` to satisfy `orchestrator_core::RouterPort`.
#[async_trait]
pub trait LLMProvider: Send + Sync {
    async fn initialize(&mut self, config: serde_json::Value) -> Result<()>;
    async fn route(&self, text: &str, context: RouterContext) -> Result<RoutingDecision>;
    fn name(&self) -> &str;
    fn is_ready(&self) -> bool;
}
