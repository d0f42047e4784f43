use crate::session::SessionSnapshot;
use anyhow::Result;
use async_trait::async_trait;

/// Rebuilt on every routing call; never stored by the Router itself.
#[derive(Debug, Clone, Default)]
pub struct RouterContext {
    pub has_active_session: bool,
    pub session_kind: Option<String>,
    pub last_prompt: Option<String>,
    /// Bounded (role, text) window; oldest first.
    pub recent_messages: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RoutingDecision {
    LaunchExecutor { kind: String, prompt: String },
    QueryStatus,
    PassThrough { text: String },
    Respond { text: String },
    CannotParse { reason: String },
}

/// Stateless from the core's perspective; may call an LLM. Must return
/// within the configured timeout or the effect runtime treats it as failure.
#[async_trait]
pub trait RouterPort: Send + Sync {
    async fn route(&self, text: &str, context: RouterContext) -> Result<RoutingDecision>;
}

/// A single line read from a running executor's output stream.
#[derive(Debug, Clone)]
pub struct ExecutorLine {
    pub kind: crate::session::LogKind,
    pub text: String,
}

/// Launches a coding-agent process, streams its output, and accepts
/// best-effort stop/send requests. The output stream is lazy and finite;
/// once it ends the port guarantees no further lines.
#[async_trait]
pub trait ExecutorPort: Send + Sync {
    async fn launch(&self, kind: &str, prompt: &str, session_id: &str) -> Result<()>;
    async fn stop(&self, session_id: &str) -> Result<()>;
    async fn send(&self, session_id: &str, text: &str) -> Result<()>;
    /// Pulls the next available output lines (non-blocking drain), or an
    /// empty vec with `finished = true` once the stream has ended.
    async fn poll(&self, session_id: &str) -> Result<(Vec<ExecutorLine>, bool)>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummarizePurpose {
    ActiveStatus,
    Completion,
}

/// Deterministic timeouts; no retries inside the port.
#[async_trait]
pub trait SummarizerPort: Send + Sync {
    async fn summarize(&self, logs: &[String], purpose: SummarizePurpose) -> Result<String>;
}

/// One-way. Never blocks more than a bounded time.
#[async_trait]
pub trait OutboundPort: Send + Sync {
    async fn send(&self, message: protocol::Message) -> Result<()>;
}

/// Writes must be atomic (temp file + rename) with rotating backups of at
/// most N=10 per artifact.
#[async_trait]
pub trait SessionStorePort: Send + Sync {
    async fn save(&self, snapshot: &SessionSnapshot) -> Result<()>;
    async fn load(&self, session_id: &str) -> Result<Option<SessionSnapshot>>;
    async fn list_recent(&self, n: usize) -> Result<Vec<SessionSnapshot>>;
}
