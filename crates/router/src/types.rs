use orchestrator_core::RoutingDecision;
use serde::{Deserialize, Serialize};

/// Five-way intent the wire prompt is instructed to pick from, mirroring
/// `orchestrator_core::RoutingDecision` one-for-one but kept distinct: this
/// shape is what the LLM actually emits as JSON, not a core concern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouterActionWire {
    LaunchExecutor,
    QueryStatus,
    PassThrough,
    Respond,
    CannotParse,
}

/// The raw JSON contract the Groq adapter asks the model to return. Fields
/// are all optional except `action` because a smaller model will sometimes
/// omit one depending on which branch it took.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterResponseWire {
    pub action: RouterActionWire,
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub executor_kind: Option<String>,
}

impl RouterResponseWire {
    /// Maps the wire shape into the core's `RoutingDecision`, substituting
    /// safe defaults for any field a weaker model left out rather than
    /// failing the whole routing call over a missing optional field.
    pub fn into_decision(self) -> RoutingDecision {
        match self.action {
            RouterActionWire::LaunchExecutor => RoutingDecision::LaunchExecutor {
                kind: self.executor_kind.unwrap_or_else(|| "claude".to_string()),
                prompt: self.prompt.unwrap_or_default(),
            },
            RouterActionWire::QueryStatus => RoutingDecision::QueryStatus,
            RouterActionWire::PassThrough => RoutingDecision::PassThrough { text: self.text.unwrap_or_default() },
            RouterActionWire::Respond => RoutingDecision::Respond { text: self.text.unwrap_or_default() },
            RouterActionWire::CannotParse => {
                RoutingDecision::CannotParse { reason: self.reason.unwrap_or_else(|| "unclear command".to_string()) }
            }
        }
    }
}
