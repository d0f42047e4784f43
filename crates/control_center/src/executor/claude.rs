use std::process::Stdio;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin};
use tokio::sync::mpsc;

use super::traits::{ExecutorConfig, ExecutorOutput, ExecutorSession, ExecutorType};

/// Drives the `claude` CLI as a subprocess and streams its stdout/stderr
/// back through a bounded channel. Each session owns exactly one child
/// process; `terminate` kills it, `is_running` reports whether it has
/// exited via `try_wait`.
pub struct ClaudeExecutorSession {
    child: Child,
    stdin: Option<ChildStdin>,
    output_rx: mpsc::Receiver<ExecutorOutput>,
    session_id: Option<String>,
}

impl ClaudeExecutorSession {
    async fn spawn(prompt: &str, resume_session_id: Option<&str>, config: ExecutorConfig) -> Result<Self> {
        let mut cmd = tokio::process::Command::new("claude");
        cmd.arg("--print").arg(prompt);
        if config.skip_permissions {
            cmd.arg("--dangerously-skip-permissions");
        }
        if let Some(sid) = resume_session_id {
            cmd.arg("--resume").arg(sid);
        }
        for flag in &config.custom_flags {
            cmd.arg(flag);
        }
        cmd.current_dir(&config.working_dir);
        cmd.stdin(Stdio::piped()).stdout(Stdio::piped()).stderr(Stdio::piped());

        let mut child = cmd.spawn().context("failed to spawn claude CLI; is it on PATH?")?;
        let stdout = child.stdout.take().ok_or_else(|| anyhow!("claude child missing stdout"))?;
        let stderr = child.stderr.take().ok_or_else(|| anyhow!("claude child missing stderr"))?;
        let stdin = child.stdin.take();

        let (tx, rx) = mpsc::channel(256);

        let out_tx = tx.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if out_tx.send(ExecutorOutput::Stdout(line)).await.is_err() {
                    break;
                }
            }
        });

        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if tx.send(ExecutorOutput::Stderr(line)).await.is_err() {
                    break;
                }
            }
        });

        Ok(Self { child, stdin, output_rx: rx, session_id: resume_session_id.map(str::to_string) })
    }
}

#[async_trait]
impl ExecutorSession for ClaudeExecutorSession {
    fn executor_type(&self) -> ExecutorType {
        ExecutorType::Claude
    }

    fn session_id(&self) -> Option<String> {
        self.session_id.clone()
    }

    async fn launch(prompt: &str, config: ExecutorConfig) -> Result<Box<dyn ExecutorSession>> {
        Ok(Box::new(Self::spawn(prompt, None, config).await?))
    }

    async fn read_output(&mut self) -> Result<Option<ExecutorOutput>> {
        Ok(self.output_rx.try_recv().ok())
    }

    fn is_running(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    async fn send_input(&mut self, input: &str) -> Result<()> {
        let stdin = self.stdin.as_mut().ok_or_else(|| anyhow!("claude session has no open stdin"))?;
        stdin.write_all(input.as_bytes()).await?;
        stdin.write_all(b"\n").await?;
        Ok(())
    }

    async fn terminate(&mut self) -> Result<()> {
        self.child.kill().await.context("failed to kill claude child process")
    }
}

/// Variant of [`ClaudeExecutorSession::spawn`] used by the factory's
/// resume path; kept separate so `ExecutorSession::launch` (which the
/// trait requires as a bare associated function) stays a plain launch.
pub async fn launch_with_resume(prompt: &str, resume_session_id: &str, config: ExecutorConfig) -> Result<Box<dyn ExecutorSession>> {
    Ok(Box::new(ClaudeExecutorSession::spawn(prompt, Some(resume_session_id), config).await?))
}
