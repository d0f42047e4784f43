use anyhow::Result;
use async_trait::async_trait;
use orchestrator_core::{RouterContext, RoutingDecision};
use tokio::sync::Mutex;

use crate::memory::ConversationMemory;
use crate::traits::LLMProvider;
use crate::types::RouterResponseWire;

const BASE_SYSTEM_PROMPT: &str = r#"You are a voice command router for a development assistant.

Classify the user's voice command into exactly one action:
- launch_executor: the user wants to start or redirect a coding/development task (fix, build, write, refactor, implement, debug, review, set up). Include the exact request in "prompt".
- query_status: the user is asking what is happening, what's the progress, or whether it's done.
- pass_through: there is an active executor session and the utterance is better forwarded to it verbatim than routed (clarifications, follow-up instructions mid-task). Put the utterance in "text".
- respond: the request needs a short direct reply with no executor involvement (a yes/no question about the system itself, a greeting). Put the reply in "text".
- cannot_parse: unclear speech, silence, or a request with no sensible mapping to the above. Explain briefly in "reason".

Context markers in the prompt tell you whether a session is currently active.

Respond with JSON only, matching:
{"action": "launch_executor|query_status|pass_through|respond|cannot_parse", "prompt": "...", "text": "...", "reason": "...", "executor_kind": "claude"}
Omit fields that do not apply to the chosen action. Preserve the user's exact wording in "prompt" and "text"."#;

pub struct GroqProvider {
    client: Option<llm::Client>,
    ready: bool,
    model: String,
    memory: Mutex<ConversationMemory>,
}

impl GroqProvider {
    pub fn new() -> Self {
        let model = std::env::var("GROQ_MODEL").unwrap_or_else(|_| "llama-3.1-8b-instant".to_string());
        Self { client: None, ready: false, model, memory: Mutex::new(ConversationMemory::new()) }
    }

    fn context_marker(context: &RouterContext) -> String {
        match &context.session_kind {
            Some(kind) if context.has_active_session => format!("[ACTIVE_SESSION: {kind}]"),
            _ => "[NO_ACTIVE_SESSION]".to_string(),
        }
    }
}

impl Default for GroqProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LLMProvider for GroqProvider {
    async fn initialize(&mut self, _config: serde_json::Value) -> Result<()> {
        let client = llm::Client::from_env_groq(&self.model)?;
        self.client = Some(client);
        self.ready = true;
        tracing::info!(model = %self.model, "router: groq provider initialized");
        Ok(())
    }

    async fn route(&self, text: &str, context: RouterContext) -> Result<RoutingDecision> {
        let client = self.client.as_ref().ok_or_else(|| anyhow::anyhow!("GroqProvider not initialized"))?;

        let mut memory = self.memory.lock().await;
        let history_context = memory.get_context_for_llm();
        let system_prompt = if history_context.is_empty() {
            BASE_SYSTEM_PROMPT.to_string()
        } else {
            format!("{BASE_SYSTEM_PROMPT}\n\n{history_context}")
        };

        let marker = Self::context_marker(&context);
        let messages = vec![
            llm::ChatMessage { role: llm::Role::System, content: system_prompt },
            llm::ChatMessage { role: llm::Role::User, content: format!("{marker} Voice command: \"{text}\"") },
        ];
        let options = llm::ChatOptions { temperature: Some(0.1), json_object: true };

        memory.add_user_message(text);
        let response = client.chat(&messages, options).await?;
        let wire: RouterResponseWire = serde_json::from_str(&response)?;
        let decision = wire.into_decision();
        memory.add_assistant_message(format!("{decision:?}"));
        Ok(decision)
    }

    fn name(&self) -> &str {
        "GroqProvider"
    }

    fn is_ready(&self) -> bool {
        self.ready
    }
}
