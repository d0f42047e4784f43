use anyhow::{anyhow, Result};
use async_trait::async_trait;
use control_center::{ControlCenter, ExecutorConfig, ExecutorOutput, ExecutorType};
use orchestrator_core::session::LogKind;
use orchestrator_core::ports::ExecutorLine;
use orchestrator_core::ExecutorPort;
use tokio::sync::Mutex;

/// Wraps a `control_center::ControlCenter` (currently: the Claude Code CLI)
/// to satisfy `orchestrator_core::ExecutorPort`. Only one session runs at a
/// time, mirroring the state machine's own invariant that `Starting`/
/// `Running`/`Completing` never overlap.
pub struct ExecutorAdapter {
    center: Mutex<ControlCenter>,
    config: ExecutorConfig,
    active_session_id: Mutex<Option<String>>,
}

impl ExecutorAdapter {
    pub fn new(config: ExecutorConfig) -> Self {
        Self { center: Mutex::new(ControlCenter::new()), config, active_session_id: Mutex::new(None) }
    }

    fn map_output(output: ExecutorOutput) -> ExecutorLine {
        match output {
            ExecutorOutput::Stdout(text) => ExecutorLine { kind: LogKind::AssistantMessage, text },
            ExecutorOutput::Stderr(text) => ExecutorLine { kind: LogKind::Error, text },
            ExecutorOutput::Status(text) => ExecutorLine { kind: LogKind::Status, text },
            ExecutorOutput::Progress(pct, text) => {
                ExecutorLine { kind: LogKind::Status, text: format!("{:.0}% {}", pct * 100.0, text) }
            }
        }
    }
}

impl Default for ExecutorAdapter {
    fn default() -> Self {
        Self::new(ExecutorConfig::default())
    }
}

#[async_trait]
impl ExecutorPort for ExecutorAdapter {
    async fn launch(&self, kind: &str, prompt: &str, session_id: &str) -> Result<()> {
        let executor_type = match kind {
            "claude" | "" => ExecutorType::Claude,
            other => ExecutorType::Custom(other.to_string()),
        };
        let mut center = self.center.lock().await;
        center.executor = executor_type;
        center.launch(prompt, Some(self.config.clone())).await?;
        *self.active_session_id.lock().await = Some(session_id.to_string());
        Ok(())
    }

    async fn stop(&self, session_id: &str) -> Result<()> {
        let mut active = self.active_session_id.lock().await;
        if active.as_deref() != Some(session_id) {
            return Ok(());
        }
        self.center.lock().await.terminate().await?;
        *active = None;
        Ok(())
    }

    async fn send(&self, session_id: &str, text: &str) -> Result<()> {
        let active = self.active_session_id.lock().await;
        if active.as_deref() != Some(session_id) {
            return Err(anyhow!("no active executor session {session_id}"));
        }
        let mut center = self.center.lock().await;
        match center.session.as_mut() {
            Some(session) => session.send_input(text).await,
            None => Err(anyhow!("no running executor session")),
        }
    }

    async fn poll(&self, session_id: &str) -> Result<(Vec<ExecutorLine>, bool)> {
        let active = self.active_session_id.lock().await;
        if active.as_deref() != Some(session_id) {
            return Ok((Vec::new(), true));
        }
        let mut center = self.center.lock().await;
        let outputs = center.poll_executor_output(64).await;
        let lines = outputs.into_iter().map(Self::map_output).collect();
        let finished = !center.is_running();
        Ok((lines, finished))
    }
}
