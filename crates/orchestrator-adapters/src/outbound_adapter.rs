use anyhow::Result;
use async_trait::async_trait;
use orchestrator_core::OutboundPort;
use tokio::sync::broadcast;

/// Fans a single outbound `protocol::Message` stream out to every
/// subscriber (the TUI presentation layer, the relay transport). Satisfies
/// O3 (outbound is a single serialized port) while still letting several
/// consumers each get every message.
#[derive(Clone)]
pub struct BroadcastOutbound {
    tx: broadcast::Sender<protocol::Message>,
}

impl BroadcastOutbound {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<protocol::Message> {
        self.tx.subscribe()
    }
}

#[async_trait]
impl OutboundPort for BroadcastOutbound {
    async fn send(&self, message: protocol::Message) -> Result<()> {
        // A lagging or absent subscriber (no TUI attached, relay not yet
        // connected) is not itself an error; only report genuine failures.
        let _ = self.tx.send(message);
        Ok(())
    }
}
