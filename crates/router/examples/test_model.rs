use anyhow::Result;
use orchestrator_core::RouterContext;
use router::providers::GroqProvider;
use router::traits::LLMProvider;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::from_path(".env").ok();

    let model = std::env::var("GROQ_MODEL").unwrap_or_else(|_| "llama-3.1-8b-instant (default)".to_string());
    println!("Testing with model: {}", model);

    let mut provider = GroqProvider::new();
    provider.initialize(serde_json::Value::Null).await?;

    let test_commands = vec![
        "Help me fix this bug in my code",
        "What's the weather today?",
        "Write a Python script to parse JSON",
        "What's happening with my session?",
    ];

    for cmd in test_commands {
        println!("\nCommand: \"{}\"", cmd);
        let start = std::time::Instant::now();

        match provider.route(cmd, RouterContext::default()).await {
            Ok(decision) => println!("Decision ({}ms): {:?}", start.elapsed().as_millis(), decision),
            Err(e) => println!("Error: {}", e),
        }
    }

    Ok(())
}
