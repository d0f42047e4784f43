use anyhow::Result;
use async_trait::async_trait;
use orchestrator_core::{RouterContext, RoutingDecision};

use crate::traits::LLMProvider;

/// Keyword classifier used by `examples/test_model.rs` and by crates that
/// want a `LLMProvider` without a live Groq key. Does not call memory.
#[derive(Default)]
pub struct MockProvider;

#[async_trait]
impl LLMProvider for MockProvider {
    async fn initialize(&mut self, _config: serde_json::Value) -> Result<()> {
        Ok(())
    }

    async fn route(&self, text: &str, context: RouterContext) -> Result<RoutingDecision> {
        let lower = text.to_lowercase();
        if context.has_active_session && (lower.contains("status") || lower.contains("happening") || lower.contains("progress")) {
            return Ok(RoutingDecision::QueryStatus);
        }
        if lower.contains("build") || lower.contains("fix") || lower.contains("implement") || lower.contains("refactor") {
            return Ok(RoutingDecision::LaunchExecutor { kind: "claude".to_string(), prompt: text.to_string() });
        }
        Ok(RoutingDecision::CannotParse { reason: "mock provider did not recognize the request".to_string() })
    }

    fn name(&self) -> &str {
        "MockProvider"
    }

    fn is_ready(&self) -> bool {
        true
    }
}
