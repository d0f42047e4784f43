use anyhow::{bail, Result};

use super::claude::{self, ClaudeExecutorSession};
use super::traits::{ExecutorConfig, ExecutorSession, ExecutorType};

/// Dispatches on [`ExecutorType`] to construct the matching session. Devin
/// and Codex are recognized but not yet wired to a concrete CLI.
pub struct ExecutorFactory;

impl ExecutorFactory {
    pub fn default_executor() -> ExecutorType {
        ExecutorType::Claude
    }

    pub async fn create(kind: ExecutorType, prompt: &str, config: Option<ExecutorConfig>) -> Result<Box<dyn ExecutorSession>> {
        let config = config.unwrap_or_default();
        match kind {
            ExecutorType::Claude => ClaudeExecutorSession::launch(prompt, config).await,
            ExecutorType::Devin => bail!("Devin executor is not implemented yet"),
            ExecutorType::Codex => bail!("Codex executor is not implemented yet"),
            ExecutorType::Custom(name) => bail!("unknown custom executor '{name}'"),
        }
    }

    pub async fn create_with_resume(
        kind: ExecutorType,
        prompt: &str,
        resume_session_id: &str,
        config: Option<ExecutorConfig>,
    ) -> Result<Box<dyn ExecutorSession>> {
        let config = config.unwrap_or_default();
        match kind {
            ExecutorType::Claude => claude::launch_with_resume(prompt, resume_session_id, config).await,
            ExecutorType::Devin => bail!("Devin executor is not implemented yet"),
            ExecutorType::Codex => bail!("Codex executor is not implemented yet"),
            ExecutorType::Custom(name) => bail!("unknown custom executor '{name}'"),
        }
    }
}
