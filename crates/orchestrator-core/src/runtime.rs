use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::time::timeout;

use crate::ports::{ExecutorPort, OutboundPort, RouterPort, SessionStorePort, SummarizerPort};
use crate::session::LogKind;
use crate::state::{Event, ExecutorOutcome};

const ROUTER_TIMEOUT: Duration = Duration::from_secs(15);
const SUMMARIZER_TIMEOUT: Duration = Duration::from_secs(10);
const EXECUTOR_POLL_INTERVAL: Duration = Duration::from_millis(200);
const BACKPRESSURE_BOUND: Duration = Duration::from_secs(5);

/// Bounded FIFO capacity for the event loop's inbound queue.
pub const EVENT_QUEUE_CAPACITY: usize = 1024;

/// The live port implementations the effect runtime dispatches against.
/// Cloning is cheap (an `Arc` bundle); each effect task gets its own clone.
pub struct Ports<R, E, S, O, St> {
    pub router: Arc<R>,
    pub executor: Arc<E>,
    pub summarizer: Arc<S>,
    pub outbound: Arc<O>,
    pub store: Arc<St>,
}

impl<R, E, S, O, St> Clone for Ports<R, E, S, O, St> {
    fn clone(&self) -> Self {
        Self {
            router: self.router.clone(),
            executor: self.executor.clone(),
            summarizer: self.summarizer.clone(),
            outbound: self.outbound.clone(),
            store: self.store.clone(),
        }
    }
}

/// Sends `event` on `tx`, applying the bounded back-pressure rule: block up
/// to 5 s, then drop and log. Used by every effect task so a stalled loop
/// cannot wedge the whole work pool.
async fn deliver(tx: &mpsc::Sender<Event>, event: Event) {
    match timeout(BACKPRESSURE_BOUND, tx.send(event)).await {
        Ok(Ok(())) => {}
        Ok(Err(_)) => tracing::warn!("event loop channel closed; dropping effect result"),
        Err(_) => tracing::warn!("event channel full after {:?}; dropping effect result", BACKPRESSURE_BOUND),
    }
}

/// Executes a single `Effect` as an independent async task (or inline for
/// effects cheap enough not to need one). At most one terminal event is
/// emitted per accepted effect; a cancelled task emits none.
pub async fn execute<R, E, S, O, St>(effect: crate::state::Effect, ports: Ports<R, E, S, O, St>, events_tx: mpsc::Sender<Event>)
where
    R: RouterPort + 'static,
    E: ExecutorPort + 'static,
    S: SummarizerPort + 'static,
    O: OutboundPort + 'static,
    St: SessionStorePort + 'static,
{
    use crate::state::Effect;
    match effect {
        Effect::RouteText { text, context, correlation } => {
            tokio::spawn(async move {
                let decision = match timeout(ROUTER_TIMEOUT, ports.router.route(&text, context)).await {
                    Ok(Ok(d)) => d,
                    Ok(Err(e)) => crate::ports::RoutingDecision::CannotParse { reason: e.to_string() },
                    Err(_) => crate::ports::RoutingDecision::CannotParse {
                        reason: "The network is a bit slow right now.".to_string(),
                    },
                };
                deliver(&events_tx, Event::RoutingCompleted { correlation, decision }).await;
            });
        }

        Effect::StartExecutor { kind, prompt, session_id } => {
            tokio::spawn(async move {
                match ports.executor.launch(&kind, &prompt, &session_id).await {
                    Ok(()) => {
                        deliver(&events_tx, Event::ExecutorLaunched { session_id: session_id.clone() }).await;
                        poll_executor(ports.executor.clone(), session_id, events_tx).await;
                    }
                    Err(e) => {
                        deliver(
                            &events_tx,
                            Event::ExecutorFinished { session_id, outcome: ExecutorOutcome::Failed { reason: e.to_string() } },
                        )
                        .await;
                    }
                }
            });
        }

        Effect::StopExecutor { session_id } => {
            tokio::spawn(async move {
                let _ = ports.executor.stop(&session_id).await;
            });
        }

        Effect::SendToExecutor { session_id, text } => {
            tokio::spawn(async move {
                if let Err(e) = ports.executor.send(&session_id, &text).await {
                    tracing::warn!("send to executor {session_id} failed: {e}");
                }
            });
        }

        Effect::QueryExecutor { session_id, correlation } => {
            tokio::spawn(async move {
                let logs = match ports.executor.poll(&session_id).await {
                    Ok((lines, _)) => lines.into_iter().map(|l| l.text).collect::<Vec<_>>(),
                    Err(_) => Vec::new(),
                };
                summarize_and_deliver(
                    ports.summarizer.clone(),
                    session_id,
                    correlation,
                    logs,
                    crate::ports::SummarizePurpose::ActiveStatus,
                    events_tx,
                )
                .await;
            });
        }

        Effect::Summarize { session_id, logs, correlation, purpose } => {
            tokio::spawn(async move {
                summarize_and_deliver(ports.summarizer.clone(), session_id, correlation, logs, purpose, events_tx).await;
            });
        }

        Effect::Emit { message } => {
            tokio::spawn(async move {
                if let Err(e) = ports.outbound.send(message).await {
                    tracing::warn!("outbound send failed: {e}");
                }
            });
        }

        Effect::StartConfirmationTimer { id, duration_secs } => {
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(duration_secs)).await;
                deliver(&events_tx, Event::ConfirmationTimeout { id }).await;
            });
        }

        Effect::PersistSession { session_id, snapshot } => {
            tokio::spawn(async move {
                // Best-effort and logged only: a PersistenceError never
                // reaches the user or affects the state machine.
                if let Err(e) = ports.store.save(&snapshot).await {
                    tracing::warn!("persist session {session_id} failed: {e}");
                }
            });
        }
    }
}

async fn summarize_and_deliver<S: SummarizerPort + 'static>(
    summarizer: Arc<S>,
    session_id: String,
    correlation: u64,
    logs: Vec<String>,
    purpose: crate::ports::SummarizePurpose,
    events_tx: mpsc::Sender<Event>,
) {
    match timeout(SUMMARIZER_TIMEOUT, summarizer.summarize(&logs, purpose)).await {
        Ok(Ok(summary)) => deliver(&events_tx, Event::StatusReady { session_id, correlation, summary }).await,
        Ok(Err(e)) => deliver(&events_tx, Event::StatusFailed { session_id, correlation, error: e.to_string() }).await,
        Err(_) => {
            deliver(
                &events_tx,
                Event::StatusFailed { session_id, correlation, error: "summarizer timed out".to_string() },
            )
            .await
        }
    }
}

async fn poll_executor<E: ExecutorPort + 'static>(executor: Arc<E>, session_id: String, events_tx: mpsc::Sender<Event>) {
    loop {
        tokio::time::sleep(EXECUTOR_POLL_INTERVAL).await;
        match executor.poll(&session_id).await {
            Ok((lines, finished)) => {
                for line in lines {
                    deliver(&events_tx, Event::ExecutorOutput { session_id: session_id.clone(), kind: line.kind, line: line.text }).await;
                }
                if finished {
                    deliver(&events_tx, Event::ExecutorFinished { session_id, outcome: ExecutorOutcome::Completed }).await;
                    return;
                }
            }
            Err(e) => {
                deliver(
                    &events_tx,
                    Event::ExecutorFinished { session_id, outcome: ExecutorOutcome::Failed { reason: e.to_string() } },
                )
                .await;
                return;
            }
        }
    }
}

/// Owns the exclusive `Core` state and drives it: pulls one event at a time
/// off a bounded FIFO, calls `transition`, starts every returned effect
/// before pulling the next event (O2), and serializes outbound messages
/// through a single `OutboundPort` (O3).
pub struct EventLoop<R, E, S, O, St> {
    core: crate::state::Core,
    ports: Ports<R, E, S, O, St>,
    events_tx: mpsc::Sender<Event>,
    events_rx: mpsc::Receiver<Event>,
}

impl<R, E, S, O, St> EventLoop<R, E, S, O, St>
where
    R: RouterPort + 'static,
    E: ExecutorPort + 'static,
    S: SummarizerPort + 'static,
    O: OutboundPort + 'static,
    St: SessionStorePort + 'static,
{
    pub fn new(ports: Ports<R, E, S, O, St>) -> Self {
        let (events_tx, events_rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
        Self { core: crate::state::Core::new(), ports, events_tx, events_rx }
    }

    /// A sender external callers (the protocol bridge, the relay listener)
    /// use to inject events without touching the loop's internals.
    pub fn sender(&self) -> mpsc::Sender<Event> {
        self.events_tx.clone()
    }

    /// Folds a snapshot loaded via `SessionStorePort::load` into history
    /// before `run` starts, so `--resume` makes the prior session answerable
    /// by status queries without re-entering `Running`.
    pub fn seed_resumed_session(&mut self, snapshot: crate::session::SessionSnapshot) {
        self.core.history.push(crate::session::CompletedSession {
            id: snapshot.id,
            kind: snapshot.kind,
            prompt: snapshot.prompt,
            ended_at: snapshot.ended_at.unwrap_or_else(Utc::now),
            summary: snapshot.summary,
        });
    }

    /// Drives the loop until the sender side is fully dropped. Returns on
    /// clean shutdown (all senders gone) so the caller can exit 0.
    pub async fn run(mut self) {
        while let Some(event) = self.events_rx.recv().await {
            let (effects, outbound) = self.core.transition(event, Utc::now());
            for effect in effects {
                execute(effect, self.ports.clone(), self.events_tx.clone()).await;
            }
            for message in outbound {
                if let Err(e) = self.ports.outbound.send(message).await {
                    tracing::warn!("outbound send failed: {e}");
                }
            }
        }
    }

    pub fn state(&self) -> &crate::state::State {
        &self.core.state
    }
}
