use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};

use crate::config::RelayConfig;

const RECONNECT_BASE_SECS: u64 = 1;
const RECONNECT_CAP_SECS: u64 = 30;

/// Transport-level occurrences the caller folds into bridge events; kept
/// distinct from `protocol::Message` since peer/session lifecycle isn't part
/// of the wire schema the bridge maps.
#[derive(Debug, Clone)]
pub enum RelayEvent {
    Frame(protocol::Message),
    PeerJoined { role: String },
    PeerLeft { role: String },
    SessionKilled,
    Status(String),
}

/// A live relay connection: inbound events flow out through `events`,
/// outbound frames are handed in through the returned sender. No part of
/// this is a global singleton; the caller owns both ends.
pub struct RelayHandle {
    pub events: mpsc::Receiver<RelayEvent>,
    pub outbound: mpsc::Sender<protocol::Message>,
}

/// Connects with exponential backoff (base 1 s, cap 30 s per §7), performs
/// the `hello`/`hello-ack` handshake, and maintains a heartbeat at the
/// configured interval. Runs until the returned handles are dropped.
pub fn connect(config: RelayConfig) -> RelayHandle {
    let (events_tx, events_rx) = mpsc::channel(200);
    let (outbound_tx, outbound_rx) = mpsc::channel::<protocol::Message>(200);
    tokio::spawn(run(config, events_tx, outbound_rx));
    RelayHandle { events: events_rx, outbound: outbound_tx }
}

async fn run(config: RelayConfig, events_tx: mpsc::Sender<RelayEvent>, mut outbound_rx: mpsc::Receiver<protocol::Message>) {
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        let _ = events_tx.send(RelayEvent::Status(format!("connecting (attempt {attempt}): {}", config.ws_url))).await;

        match connect_async(&config.ws_url).await {
            Ok((stream, _)) => {
                attempt = 0;
                let (write, read) = stream.split();
                let write = Arc::new(Mutex::new(write));

                let hello = json!({
                    "type": protocol::relay::TYPE_HELLO,
                    "s": config.session_id,
                    "t": config.auth_token,
                    "r": "workstation",
                })
                .to_string();
                if write.lock().await.send(WsMessage::Text(hello)).await.is_err() {
                    continue;
                }

                let (shutdown_tx, _) = broadcast::channel::<()>(1);

                let hb_task = spawn_heartbeat(write.clone(), config.heartbeat_secs, shutdown_tx.subscribe());
                let forward_task = spawn_outbound_forwarder(write.clone(), &mut outbound_rx, shutdown_tx.subscribe());

                read_loop(read, write.clone(), &events_tx).await;

                let _ = shutdown_tx.send(());
                hb_task.abort();
                forward_task.abort();
            }
            Err(e) => {
                let _ = events_tx.send(RelayEvent::Status(format!("connect failed: {e}"))).await;
            }
        }

        if events_tx.is_closed() {
            return;
        }
        let delay = RECONNECT_BASE_SECS.saturating_mul(1 << attempt.min(5)).min(RECONNECT_CAP_SECS);
        let _ = events_tx.send(RelayEvent::Status(format!("reconnecting in {delay}s"))).await;
        tokio::time::sleep(Duration::from_secs(delay)).await;
    }
}

type WsWrite = futures_util::stream::SplitSink<tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>, WsMessage>;

fn spawn_heartbeat(write: Arc<Mutex<WsWrite>>, interval_secs: u64, mut shutdown: broadcast::Receiver<()>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(interval_secs)) => {
                    let frame = json!({ "type": protocol::relay::TYPE_HEARTBEAT }).to_string();
                    if write.lock().await.send(WsMessage::Text(frame)).await.is_err() {
                        return;
                    }
                }
                _ = shutdown.recv() => return,
            }
        }
    })
}

fn spawn_outbound_forwarder(
    write: Arc<Mutex<WsWrite>>,
    outbound_rx: &mut mpsc::Receiver<protocol::Message>,
    mut shutdown: broadcast::Receiver<()>,
) -> tokio::task::JoinHandle<()> {
    // `recv` needs &mut access for the lifetime of the task, so the channel
    // moves in; the caller keeps sending into the clone it held onto.
    let mut outbound_rx = std::mem::replace(outbound_rx, mpsc::channel(1).1);
    tokio::spawn(async move {
        loop {
            tokio::select! {
                message = outbound_rx.recv() => {
                    let Some(message) = message else { return };
                    let Ok(payload) = serde_json::to_string(&message) else { continue };
                    let frame = json!({ "type": protocol::relay::TYPE_FRAME, "frame": payload }).to_string();
                    if write.lock().await.send(WsMessage::Text(frame)).await.is_err() {
                        return;
                    }
                }
                _ = shutdown.recv() => return,
            }
        }
    })
}

async fn read_loop(
    mut read: futures_util::stream::SplitStream<tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>>,
    write: Arc<Mutex<WsWrite>>,
    events_tx: &mpsc::Sender<RelayEvent>,
) {
    while let Some(message) = read.next().await {
        match message {
            Ok(WsMessage::Text(text)) => handle_text_frame(&text, &write, events_tx).await,
            Ok(WsMessage::Close(_)) => {
                let _ = events_tx.send(RelayEvent::Status("closed".to_string())).await;
                return;
            }
            Err(e) => {
                let _ = events_tx.send(RelayEvent::Status(format!("ws error: {e}"))).await;
                return;
            }
            _ => {}
        }
    }
}

async fn handle_text_frame(text: &str, write: &Arc<Mutex<WsWrite>>, events_tx: &mpsc::Sender<RelayEvent>) {
    let Ok(value) = serde_json::from_str::<Value>(text) else { return };
    let Some(msg_type) = value.get("type").and_then(Value::as_str) else { return };

    match msg_type {
        t if t == protocol::relay::TYPE_HELLO_ACK => {
            let _ = events_tx.send(RelayEvent::Status("hello-ack".to_string())).await;
        }
        t if t == protocol::relay::TYPE_PEER_JOINED => {
            let role = value.get("role").and_then(Value::as_str).unwrap_or("peer").to_string();
            let _ = events_tx.send(RelayEvent::PeerJoined { role }).await;
        }
        t if t == protocol::relay::TYPE_PEER_LEFT => {
            let role = value.get("role").and_then(Value::as_str).unwrap_or("peer").to_string();
            let _ = events_tx.send(RelayEvent::PeerLeft { role }).await;
        }
        t if t == protocol::relay::TYPE_SESSION_KILLED => {
            let _ = events_tx.send(RelayEvent::SessionKilled).await;
        }
        t if t == protocol::relay::TYPE_FRAME => {
            let Some(inner) = value.get("frame").and_then(Value::as_str) else { return };
            match serde_json::from_str::<protocol::Message>(inner) {
                Ok(message) => {
                    let _ = events_tx.send(RelayEvent::Frame(message)).await;
                }
                Err(_) => {
                    // ProtocolError: malformed frames are dropped silently here;
                    // the bridge itself rate-limits any warn status it emits.
                }
            }
        }
        _ => {}
    }
}

/// Best-effort: returns `Ok(None)` when `RELAY_SESSION_ID` is unset, since
/// that just means the relay transport isn't configured for this run.
pub fn load_config_from_env() -> Result<Option<RelayConfig>> {
    Ok(RelayConfig::from_env())
}
