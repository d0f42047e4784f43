mod cli;
mod config;
mod logging;
mod relay_client;

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use orchestrator_adapters::{
    session_store::ArtifactStore, BroadcastOutbound, Bridge, ExecutorAdapter, RouterAdapter, SummarizerAdapter,
};
use orchestrator_core::runtime::{EventLoop, Ports};
use orchestrator_core::SessionStorePort;
use tokio::sync::mpsc;

use crate::cli::Cli;
use crate::config::Config;
use crate::relay_client::RelayEvent;

/// Exit codes per `spec.md` §6: 0 clean shutdown, 1 fatal init error, 2
/// unrecoverable loop error.
const EXIT_INIT_ERROR: i32 = 1;

#[tokio::main]
async fn main() {
    logging::init();
    config::load_dotenv();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            tracing::error!("fatal init error: {e:#}");
            eprintln!("error: {e:#}");
            std::process::exit(EXIT_INIT_ERROR);
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::from_env()?;

    let store = Arc::new(ArtifactStore::new(config.artifacts_root.clone(), config.registry.clone()));
    let outbound = Arc::new(BroadcastOutbound::new(256));

    let router = Arc::new(build_router(&config).await?);
    let executor = Arc::new(ExecutorAdapter::default());
    let summarizer = Arc::new(build_summarizer(&config)?);

    let ports = Ports { router, executor, summarizer, outbound: outbound.clone(), store: store.clone() };
    let mut event_loop = EventLoop::new(ports);

    if let Some(session_id) = &cli.resume {
        if !orchestrator_core::session::is_valid_session_id(session_id) {
            // Malformed --resume id is a warning, not a fatal init error: the
            // process still starts, just without a resumed session.
            tracing::warn!("'{session_id}' is not a valid session id (expected YYYYMMDD_HHMMSS_XXXXXX); starting fresh");
        } else if let Some(snapshot) = store.load(session_id).await? {
            event_loop.seed_resumed_session(snapshot);
        } else {
            tracing::warn!("no stored session found for --resume {session_id}; starting fresh");
        }
    }

    let events_tx = event_loop.sender();
    let (inbound_tx, mut inbound_rx) = mpsc::channel::<protocol::Message>(256);

    let bridge = Arc::new(Bridge::new(events_tx.clone(), bridge_ack_sink(outbound.clone()), store.clone()));
    let bridge_task = tokio::spawn({
        let bridge = bridge.clone();
        async move {
            while let Some(message) = inbound_rx.recv().await {
                if let Err(e) = bridge.handle_inbound(message).await {
                    tracing::warn!("bridge dropped an inbound message: {e}");
                }
            }
        }
    });

    let relay_task = config.relay.clone().map(|relay_config| {
        let inbound_tx = inbound_tx.clone();
        let events_tx = events_tx.clone();
        let mut outbound_rx = outbound.subscribe();
        tokio::spawn(async move {
            let mut handle = relay_client::connect(relay_config);
            loop {
                tokio::select! {
                    event = handle.events.recv() => {
                        match event {
                            Some(RelayEvent::Frame(message)) => {
                                let _ = inbound_tx.send(message).await;
                            }
                            Some(RelayEvent::PeerJoined { role }) => {
                                let _ = events_tx.send(orchestrator_core::Event::PeerJoined { role }).await;
                            }
                            Some(RelayEvent::PeerLeft { role }) => {
                                let _ = events_tx.send(orchestrator_core::Event::PeerLeft { role }).await;
                            }
                            Some(RelayEvent::SessionKilled) => return,
                            Some(RelayEvent::Status(status)) => tracing::info!("relay: {status}"),
                            None => return,
                        }
                    }
                    outbound = outbound_rx.recv() => {
                        if let Ok(message) = outbound {
                            let _ = handle.outbound.send(message).await;
                        }
                    }
                }
            }
        })
    });

    // The loop must be live for the whole interactive session, not just
    // during teardown: run_headless/run_tui block until shutdown, and the
    // bridge/relay feed events in continuously while they run.
    let event_loop_task = tokio::spawn(event_loop.run());
    drop(events_tx);

    if cli.no_tui {
        run_headless(outbound.subscribe()).await;
    } else {
        run_tui(inbound_tx.clone(), outbound.subscribe()).await?;
    }

    drop(bridge);
    bridge_task.abort();
    if let Some(task) = relay_task {
        task.abort();
    }
    let _ = event_loop_task.await;
    Ok(())
}

/// `Bridge` wants a plain `mpsc::Sender<protocol::Message>` for the acks and
/// side-channel replies it emits directly; this relays those onto the same
/// `BroadcastOutbound` every other outbound message goes through, so O3
/// (single serialized outbound channel) still holds.
fn bridge_ack_sink(outbound: Arc<BroadcastOutbound>) -> mpsc::Sender<protocol::Message> {
    let (tx, mut rx) = mpsc::channel(64);
    tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            let _ = orchestrator_core::OutboundPort::send(outbound.as_ref(), message).await;
        }
    });
    tx
}

async fn build_router(config: &Config) -> Result<RouterAdapter<router::providers::GroqProvider>> {
    if config.groq_api_key.is_none() {
        tracing::warn!("GROQ_API_KEY not set; routing falls back to a keyword-only classifier");
    }
    RouterAdapter::from_env().await
}

fn build_summarizer(config: &Config) -> Result<SummarizerAdapter> {
    let _ = config;
    SummarizerAdapter::from_env()
}

/// No UI: status lines go to stdout, the process otherwise just drives the
/// event loop and relay/bridge tasks until shutdown.
async fn run_headless(mut outbound: tokio::sync::broadcast::Receiver<protocol::Message>) {
    loop {
        match outbound.recv().await {
            Ok(protocol::Message::Status(status)) => println!("[{}] {}", status.level, status.text),
            Ok(_) => {}
            Err(tokio::sync::broadcast::error::RecvError::Closed) => return,
            Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
        }
        if should_exit_headless() {
            return;
        }
    }
}

fn should_exit_headless() -> bool {
    false
}

/// Drives the `ratatui` front end: subscribes to outbound protocol messages
/// and forwards its own user input back in as `user_text`, per
/// `orchestrator_tui`'s contract of never reading core state directly.
async fn run_tui(
    inbound_tx: mpsc::Sender<protocol::Message>,
    mut outbound: tokio::sync::broadcast::Receiver<protocol::Message>,
) -> Result<()> {
    use crossterm::{
        execute,
        terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    };
    use orchestrator_tui::{Tab, TuiState};
    use ratatui::{backend::CrosstermBackend, Terminal};
    use std::io;

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut state = TuiState::new(inbound_tx);
    let result = tui_loop(&mut terminal, &mut state, &mut outbound).await;

    state.switch_tab(Tab::Output);
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    result
}

async fn tui_loop<B: ratatui::backend::Backend>(
    terminal: &mut ratatui::Terminal<B>,
    state: &mut orchestrator_tui::TuiState,
    outbound: &mut tokio::sync::broadcast::Receiver<protocol::Message>,
) -> Result<()> {
    use crossterm::event::{self, Event as CtEvent, KeyCode};
    use orchestrator_tui::draw_ui;

    loop {
        while let Ok(message) = outbound.try_recv() {
            apply_outbound(state, message);
        }

        draw_ui(terminal, state)?;

        if event::poll(std::time::Duration::from_millis(100))? {
            if let CtEvent::Key(key) = event::read()? {
                match key.code {
                    KeyCode::Char('c') if key.modifiers.contains(event::KeyModifiers::CONTROL) => return Ok(()),
                    KeyCode::Enter => {
                        let text = state.take_input();
                        if !text.is_empty() {
                            state.append_output(format!("> {text}"));
                            state.send_user_text(text).await?;
                        }
                    }
                    KeyCode::Backspace => state.handle_backspace(),
                    KeyCode::Tab => state.next_tab(),
                    KeyCode::Char('?') => state.toggle_help(),
                    KeyCode::Char(c) => state.handle_input_char(c),
                    _ => {}
                }
            }
        }
    }
}

fn apply_outbound(state: &mut orchestrator_tui::TuiState, message: protocol::Message) {
    match message {
        protocol::Message::Status(status) => state.append_output(format!("[{}] {}", status.level, status.text)),
        protocol::Message::PromptConfirmation(pc) => {
            state.append_output(format!("Confirm: launch {} for \"{}\"? (yes/no)", pc.executor, pc.prompt))
        }
        protocol::Message::Ack(ack) => state.append_log(format!("ack: {}", ack.text)),
        protocol::Message::Logs(logs) => {
            for line in logs.logs {
                state.append_log(line);
            }
        }
        _ => {}
    }
}
