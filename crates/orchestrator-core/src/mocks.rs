//! In-crate test doubles for the five ports. Used by this crate's own test
//! suite and by `orchestrator-adapters`/`orchestrator` integration tests.

use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;

use crate::ports::{
    ExecutorLine, ExecutorPort, OutboundPort, RouterContext, RouterPort, RoutingDecision,
    SessionStorePort, SummarizePurpose, SummarizerPort,
};
use crate::session::{LogKind, SessionSnapshot};

/// Routes anything mentioning a coding verb to `LaunchExecutor`, "status"
/// queries to `QueryStatus`, and everything else to `CannotParse`.
pub struct ScriptedRouter;

#[async_trait]
impl RouterPort for ScriptedRouter {
    async fn route(&self, text: &str, _context: RouterContext) -> Result<RoutingDecision> {
        let lower = text.to_lowercase();
        if lower.contains("status") || lower.contains("happening") {
            Ok(RoutingDecision::QueryStatus)
        } else if lower.contains("build") || lower.contains("fix") || lower.contains("refactor") || lower.contains("cli") {
            Ok(RoutingDecision::LaunchExecutor { kind: "claude".to_string(), prompt: text.to_string() })
        } else {
            Ok(RoutingDecision::CannotParse { reason: String::new() })
        }
    }
}

/// Emits a fixed line then finishes immediately after `launch`.
pub struct InstantExecutor;

#[async_trait]
impl ExecutorPort for InstantExecutor {
    async fn launch(&self, _kind: &str, _prompt: &str, _session_id: &str) -> Result<()> {
        Ok(())
    }

    async fn stop(&self, _session_id: &str) -> Result<()> {
        Ok(())
    }

    async fn send(&self, _session_id: &str, _text: &str) -> Result<()> {
        Ok(())
    }

    async fn poll(&self, _session_id: &str) -> Result<(Vec<ExecutorLine>, bool)> {
        Ok((vec![ExecutorLine { kind: LogKind::AssistantMessage, text: "done".to_string() }], true))
    }
}

pub struct EchoSummarizer;

#[async_trait]
impl SummarizerPort for EchoSummarizer {
    async fn summarize(&self, logs: &[String], purpose: SummarizePurpose) -> Result<String> {
        let verb = match purpose {
            SummarizePurpose::ActiveStatus => "working on",
            SummarizePurpose::Completion => "finished",
        };
        Ok(format!("{verb} {} lines of output", logs.len()))
    }
}

#[derive(Clone)]
pub struct ChannelOutbound(pub tokio::sync::mpsc::Sender<protocol::Message>);

#[async_trait]
impl OutboundPort for ChannelOutbound {
    async fn send(&self, message: protocol::Message) -> Result<()> {
        self.0.send(message).await.map_err(|e| anyhow::anyhow!(e.to_string()))
    }
}

#[derive(Default)]
pub struct InMemoryStore(Mutex<Vec<SessionSnapshot>>);

#[async_trait]
impl SessionStorePort for InMemoryStore {
    async fn save(&self, snapshot: &SessionSnapshot) -> Result<()> {
        self.0.lock().unwrap().push(snapshot.clone());
        Ok(())
    }

    async fn load(&self, session_id: &str) -> Result<Option<SessionSnapshot>> {
        Ok(self.0.lock().unwrap().iter().rev().find(|s| s.id == session_id).cloned())
    }

    async fn list_recent(&self, n: usize) -> Result<Vec<SessionSnapshot>> {
        let guard = self.0.lock().unwrap();
        Ok(guard.iter().rev().take(n).cloned().collect())
    }
}
