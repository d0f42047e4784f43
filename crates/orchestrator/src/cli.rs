use clap::Parser;

/// Voice-driven coding workstation orchestrator.
#[derive(Debug, Parser)]
#[command(name = "codewalk", version, about)]
pub struct Cli {
    /// Resume a prior session instead of starting a fresh one.
    #[arg(long, value_name = "SESSION_ID")]
    pub resume: Option<String>,

    /// Run headless: no terminal UI, status lines go to stdout.
    #[arg(long)]
    pub no_tui: bool,
}
