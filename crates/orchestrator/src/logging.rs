use tracing_subscriber::EnvFilter;

/// Structured logging via `tracing`, matching the rest of the workspace
/// (`orchestrator-core`, `orchestrator-adapters`). Defaults to `info` and
/// respects `RUST_LOG` when set. Writes to stderr so stdout stays free for
/// `--no-tui` headless status lines.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).try_init();
}
