use anyhow::Result;
use async_trait::async_trait;
use orchestrator_core::{RouterContext, RouterPort, RoutingDecision};
use router::traits::LLMProvider;

/// Wraps a `router::traits::LLMProvider` (Groq by default) to satisfy
/// `orchestrator_core::RouterPort`. The core calls this under its own
/// 15 s timeout, so this adapter does not impose one of its own.
pub struct RouterAdapter<P: LLMProvider> {
    provider: P,
}

impl<P: LLMProvider> RouterAdapter<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl<P: LLMProvider> RouterPort for RouterAdapter<P> {
    async fn route(&self, text: &str, context: RouterContext) -> Result<RoutingDecision> {
        self.provider.route(text, context).await
    }
}

impl RouterAdapter<router::providers::GroqProvider> {
    /// Builds and initializes the Groq-backed router from `GROQ_API_KEY`.
    pub async fn from_env() -> Result<Self> {
        let mut provider = router::providers::GroqProvider::new();
        provider.initialize(serde_json::Value::Null).await?;
        Ok(Self::new(provider))
    }
}
