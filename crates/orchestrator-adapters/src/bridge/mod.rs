use std::collections::VecDeque;
use std::sync::Arc;

use anyhow::Result;
use base64::Engine;
use orchestrator_core::{Event, SessionStorePort};
use tokio::sync::{mpsc, Mutex};

/// How many recent `user_text` ids are remembered for the R3 dedup check.
const SEEN_ID_WINDOW: usize = 64;

/// Translates wire `protocol::Message`s into `orchestrator_core::Event`s (or,
/// for the two side channels that bypass the state machine entirely, answers
/// them directly). Owns nothing the event loop owns: `Core` stays exclusive
/// to `EventLoop::run`, so the side channels are served from the artifact
/// store rather than from live state.
pub struct Bridge<St: SessionStorePort> {
    events_tx: mpsc::Sender<Event>,
    outbound_tx: mpsc::Sender<protocol::Message>,
    store: Arc<St>,
    /// Bounded FIFO of recently-acked `user_text` ids (R3): a repeated id is
    /// acked once and not forwarded to the state machine a second time.
    seen_ids: Mutex<VecDeque<String>>,
}

impl<St: SessionStorePort> Bridge<St> {
    pub fn new(events_tx: mpsc::Sender<Event>, outbound_tx: mpsc::Sender<protocol::Message>, store: Arc<St>) -> Self {
        Self { events_tx, outbound_tx, store, seen_ids: Mutex::new(VecDeque::with_capacity(SEEN_ID_WINDOW)) }
    }

    /// `true` the first time `id` is seen (and records it); `false` on every
    /// repeat within the window. Messages with no id are never deduped.
    async fn is_duplicate(&self, id: &str) -> bool {
        let mut seen = self.seen_ids.lock().await;
        if seen.iter().any(|s| s == id) {
            return true;
        }
        if seen.len() >= SEEN_ID_WINDOW {
            seen.pop_front();
        }
        seen.push_back(id.to_string());
        false
    }

    /// Handles one inbound wire message. Returns an error only for
    /// send failures against a closed event loop; a malformed side-channel
    /// request is answered with an `ok: false` reply instead of propagating.
    pub async fn handle_inbound(&self, message: protocol::Message) -> Result<()> {
        match message {
            protocol::Message::UserText(user_text) => {
                if let Some(id) = &user_text.id {
                    if self.is_duplicate(id).await {
                        return Ok(());
                    }
                }
                let _ = self.outbound_tx.send(protocol::Message::ack("got it", user_text.id.clone())).await;
                self.events_tx
                    .send(Event::UserText { id: user_text.id, text: user_text.text, source: user_text.source })
                    .await?;
            }
            protocol::Message::ConfirmResponse(response) => {
                self.events_tx.send(Event::ConfirmResponse { id: response.id, accept: response.accept }).await?;
            }
            protocol::Message::SttRequest(request) => {
                self.handle_stt_request(request).await;
            }
            protocol::Message::GetLogs(request) => {
                self.handle_get_logs(request).await;
            }
            // These are outbound-only shapes; receiving one inbound is a
            // protocol violation from a misbehaving peer and is ignored.
            protocol::Message::Ack(_)
            | protocol::Message::PromptConfirmation(_)
            | protocol::Message::Status(_)
            | protocol::Message::SttResult(_)
            | protocol::Message::Logs(_) => {}
        }
        Ok(())
    }

    /// Transcription is an external collaborator's job (`crates/stt`); the
    /// bridge only shuttles base64 audio to it and the text back, never
    /// touching the state machine.
    async fn handle_stt_request(&self, request: protocol::SttRequest) {
        let result = base64::engine::general_purpose::STANDARD
            .decode(&request.data)
            .map_err(|e| anyhow::anyhow!(e.to_string()));
        let reply = match result {
            Ok(_bytes) => {
                // Decoding audio bytes into text is `crates/stt`'s concern;
                // this bridge has no transcription provider of its own.
                protocol::Message::SttResult(protocol::SttResult {
                    v: Some(protocol::VERSION),
                    reply_to: Some(request.id),
                    text: String::new(),
                    ok: false,
                })
            }
            Err(e) => protocol::Message::SttResult(protocol::SttResult {
                v: Some(protocol::VERSION),
                reply_to: Some(request.id),
                text: e.to_string(),
                ok: false,
            }),
        };
        let _ = self.outbound_tx.send(reply).await;
    }

    /// Answers from the artifact store's most recently persisted snapshot
    /// rather than live session state, since only `EventLoop` may touch
    /// `Core`.
    async fn handle_get_logs(&self, request: protocol::GetLogs) {
        let count = request.count.unwrap_or(50);
        let logs = match self.store.list_recent(1).await {
            Ok(mut snapshots) => snapshots
                .pop()
                .map(|s| s.logs.into_iter().rev().take(count).map(|l| l.text).rev().collect::<Vec<_>>())
                .unwrap_or_default(),
            Err(_) => Vec::new(),
        };
        let reply = protocol::Message::Logs(protocol::Logs {
            v: Some(protocol::VERSION),
            reply_to: Some(request.id),
            count: logs.len(),
            logs,
        });
        let _ = self.outbound_tx.send(reply).await;
    }
}
