use anyhow::Result;
use async_trait::async_trait;
use orchestrator_core::ports::SummarizePurpose;
use orchestrator_core::SummarizerPort;

/// Turns a window of raw executor log lines into a short spoken sentence via
/// Groq. Grounded on the orchestrator's old `summarize_with_groq` helper.
pub struct SummarizerAdapter {
    client: llm::Client,
}

impl SummarizerAdapter {
    pub fn from_env() -> Result<Self> {
        Ok(Self { client: llm::Client::from_env_groq("llama-3.1-8b-instant")? })
    }

    fn system_prompt(purpose: SummarizePurpose) -> &'static str {
        match purpose {
            SummarizePurpose::ActiveStatus => {
                "You summarize a coding agent's in-progress log output into one short, \
                 spoken-friendly sentence describing what it is currently doing. No code, \
                 no bullet points, present tense."
            }
            SummarizePurpose::Completion => {
                "You summarize a coding agent's finished session log into one short, \
                 spoken-friendly sentence describing what it accomplished. No code, \
                 no bullet points, past tense."
            }
        }
    }
}

#[async_trait]
impl SummarizerPort for SummarizerAdapter {
    async fn summarize(&self, logs: &[String], purpose: SummarizePurpose) -> Result<String> {
        if logs.is_empty() {
            return Ok(match purpose {
                SummarizePurpose::ActiveStatus => "Still getting started, nothing to report yet.".to_string(),
                SummarizePurpose::Completion => "Finished, but produced no output.".to_string(),
            });
        }
        let messages = vec![
            llm::ChatMessage { role: llm::Role::System, content: Self::system_prompt(purpose).to_string() },
            llm::ChatMessage { role: llm::Role::User, content: logs.join("\n") },
        ];
        let options = llm::ChatOptions { temperature: Some(0.3), json_object: false };
        let summary = self.client.chat(&messages, options).await?;
        Ok(summary.trim().to_string())
    }
}
