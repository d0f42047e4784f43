use chrono::{DateTime, Utc};

use crate::confirmation::{classify, ConfirmVote, ConfirmationTicket};
use crate::ports::{RoutingDecision, RouterContext, SummarizePurpose};
use crate::session::{
    generate_session_id, time_aware_phrase, CompletedSession, LogKind, Session, SessionHistory,
    SessionStatus, PERSIST_EVERY,
};

/// Outcome of a terminated executor run.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutorOutcome {
    Completed,
    Failed { reason: String },
}

/// Inbound occurrences the loop feeds into `transition`. Carries every piece
/// of external data the state machine needs; the function itself reads no
/// other source of truth.
#[derive(Debug, Clone)]
pub enum Event {
    UserText { id: Option<String>, text: String, source: Option<String> },
    UserVoiceConfirmation { text: String },
    ConfirmResponse { id: Option<String>, accept: bool },
    RoutingCompleted { correlation: u64, decision: RoutingDecision },
    ExecutorLaunched { session_id: String },
    ExecutorOutput { session_id: String, kind: LogKind, line: String },
    ExecutorFinished { session_id: String, outcome: ExecutorOutcome },
    StatusReady { session_id: String, correlation: u64, summary: String },
    StatusFailed { session_id: String, correlation: u64, error: String },
    ConfirmationTimeout { id: String },
    PeerJoined { role: String },
    PeerLeft { role: String },
    Tick { now: DateTime<Utc> },
}

/// Declarative requests for side effects, executed by the effect runtime.
#[derive(Debug, Clone)]
pub enum Effect {
    RouteText { text: String, context: RouterContext, correlation: u64 },
    StartExecutor { kind: String, prompt: String, session_id: String },
    StopExecutor { session_id: String },
    SendToExecutor { session_id: String, text: String },
    QueryExecutor { session_id: String, correlation: u64 },
    Summarize { session_id: String, logs: Vec<String>, correlation: u64, purpose: SummarizePurpose },
    Emit { message: protocol::Message },
    StartConfirmationTimer { id: String, duration_secs: u64 },
    PersistSession { session_id: String, snapshot: crate::session::SessionSnapshot },
}

/// Hierarchical workstation state. `Idle` is the initial and only
/// re-entrant leaf; everything else is reached through `Routing` or the
/// `Executing` family.
#[derive(Debug, Clone, PartialEq)]
pub enum State {
    Idle,
    Routing { correlation: u64, text: String },
    RequestingConfirmation { ticket: ConfirmationTicket },
    Starting { kind: String, prompt: String, session_id: String },
    Running { session_id: String },
    Completing { session_id: String, outcome: ExecutorOutcome },
    Querying { session_id: String, correlation: u64, resume: Box<State> },
}

impl State {
    pub fn is_running(&self) -> bool {
        matches!(self, State::Running { .. })
    }

    pub fn is_busy_with_executor(&self) -> bool {
        matches!(self, State::Starting { .. } | State::Running { .. } | State::Completing { .. })
    }
}

const SUMMARY_CACHE_TTL_SECS: i64 = 10;

/// Human-facing spelling for an executor `kind`. The core only ever sees the
/// lowercase wire identifier (`"claude"`, ...); display names live here
/// rather than in the executor adapter so status text stays independent of
/// which backend ends up running it.
fn display_executor_name(kind: &str) -> &str {
    match kind {
        "claude" => "Claude Code",
        "devin" => "Devin",
        "codex" => "Codex",
        other => other,
    }
}

/// Owns the exclusive workstation state plus the bits of bookkeeping
/// (correlation counter, active session, terminated-session history) that
/// the transition function consults. `transition` performs no I/O: every
/// external fact arrives via the event, and every requested side effect
/// leaves as a value in the returned `Vec<Effect>`.
pub struct Core {
    pub state: State,
    pub session: Option<Session>,
    pub history: SessionHistory,
    next_correlation: u64,
    next_confirmation_seq: u64,
    /// Correlation of a RouteText fired while `Running` (PassThrough/Query
    /// dispatched without leaving the Running state). `None` otherwise.
    pending_routing_while_busy: Option<u64>,
}

impl Default for Core {
    fn default() -> Self {
        Self::new()
    }
}

impl Core {
    pub fn new() -> Self {
        Self {
            state: State::Idle,
            session: None,
            history: SessionHistory::new(),
            next_correlation: 0,
            next_confirmation_seq: 0,
            pending_routing_while_busy: None,
        }
    }

    fn fresh_correlation(&mut self) -> u64 {
        self.next_correlation += 1;
        self.next_correlation
    }

    fn fresh_confirmation_id(&mut self) -> String {
        self.next_confirmation_seq += 1;
        format!("confirm_{}", self.next_confirmation_seq)
    }

    fn router_context(&self) -> RouterContext {
        RouterContext {
            has_active_session: self.session.as_ref().map(|s| s.status == SessionStatus::Running).unwrap_or(false),
            session_kind: self.session.as_ref().map(|s| s.kind.clone()),
            last_prompt: self.session.as_ref().map(|s| s.prompt.clone()),
            recent_messages: Vec::new(),
        }
    }

    /// The single entry point: advances `self.state` (and any session
    /// bookkeeping) for one event, returning the effects to execute and the
    /// outbound protocol messages to deliver, both in emission order.
    pub fn transition(&mut self, event: Event, now: DateTime<Utc>) -> (Vec<Effect>, Vec<protocol::Message>) {
        let mut effects = Vec::new();
        let mut outbound = Vec::new();

        match event {
            Event::Tick { .. } => {}

            Event::PeerJoined { .. } | Event::PeerLeft { .. } => {
                // Transport-level bookkeeping only; no state change.
            }

            Event::UserText { text, .. } => {
                self.on_user_text(text, now, &mut effects, &mut outbound);
            }

            Event::UserVoiceConfirmation { text } => {
                self.on_voice_confirmation(text, &mut effects, &mut outbound);
            }

            Event::ConfirmResponse { id, accept } => {
                self.on_confirm_response(id, accept, &mut effects, &mut outbound);
            }

            Event::RoutingCompleted { correlation, decision } => {
                self.on_routing_completed(correlation, decision, now, &mut effects, &mut outbound);
            }

            Event::ConfirmationTimeout { id } => {
                self.on_confirmation_timeout(id, &mut outbound);
            }

            Event::ExecutorLaunched { session_id } => {
                self.on_executor_launched(session_id, &mut outbound);
            }

            Event::ExecutorOutput { session_id, kind, line } => {
                self.on_executor_output(session_id, kind, line, &mut effects);
            }

            Event::ExecutorFinished { session_id, outcome } => {
                self.on_executor_finished(session_id, outcome, &mut effects);
            }

            Event::StatusReady { session_id, correlation, summary } => {
                self.on_status_ready(session_id, correlation, summary, now, &mut outbound);
            }

            Event::StatusFailed { session_id, correlation, error } => {
                self.on_status_failed(session_id, correlation, error, &mut outbound);
            }
        }

        (effects, outbound)
    }

    fn on_user_text(
        &mut self,
        text: String,
        now: DateTime<Utc>,
        effects: &mut Vec<Effect>,
        outbound: &mut Vec<protocol::Message>,
    ) {
        let text = text.trim().to_string();
        if text.is_empty() {
            outbound.push(protocol::Message::info("No audio detected"));
            return;
        }

        match &self.state {
            State::Idle => {
                let correlation = self.fresh_correlation();
                self.state = State::Routing { correlation, text: text.clone() };
                effects.push(Effect::RouteText { text, context: self.router_context(), correlation });
            }
            State::Routing { .. } => {
                // A new UserText cancels the outstanding correlation; the
                // late RoutingCompleted is dropped on arrival.
                let correlation = self.fresh_correlation();
                self.state = State::Routing { correlation, text: text.clone() };
                effects.push(Effect::RouteText { text, context: self.router_context(), correlation });
            }
            State::RequestingConfirmation { .. } => {
                // Plain text while a confirmation is pending is treated as a
                // voice utterance for the local classifier, not re-routed.
                self.on_voice_confirmation(text, effects, outbound);
            }
            State::Running { .. } => {
                // PassThrough and QueryStatus are always honored while
                // running; route normally without leaving Running, and let
                // RoutingCompleted decide once it lands.
                let correlation = self.fresh_correlation();
                effects.push(Effect::RouteText { text, context: self.router_context(), correlation });
                self.pending_routing_while_busy = Some(correlation);
            }
            State::Starting { .. } | State::Completing { .. } => {
                outbound.push(protocol::Message::warn("Still processing"));
            }
            State::Querying { .. } => {
                outbound.push(protocol::Message::warn("Still processing"));
            }
        }
    }

    fn on_voice_confirmation(
        &mut self,
        text: String,
        effects: &mut Vec<Effect>,
        outbound: &mut Vec<protocol::Message>,
    ) {
        let State::RequestingConfirmation { ticket } = &self.state else {
            return;
        };
        let has_prior = !self.history.is_empty();
        match classify(&text, has_prior) {
            ConfirmVote::Accept => {
                let id = ticket.id.clone();
                self.accept_confirmation(id, effects, outbound);
            }
            ConfirmVote::Decline => {
                self.decline_confirmation(outbound);
            }
            ConfirmVote::Ambiguous => {
                outbound.push(protocol::Message::info(
                    "Did you want to continue the previous session, start a new one, or cancel?",
                ));
            }
            ConfirmVote::Unmatched => {
                // Never routed through the Router while confirming; the
                // state machine refuses LaunchExecutor decisions here, so
                // simply re-surface the pending prompt.
                outbound.push(protocol::Message::info(format!(
                    "Still waiting on: {}? Say yes, no, or cancel.",
                    ticket.prompt
                )));
            }
        }
    }

    fn accept_confirmation(&mut self, id: String, effects: &mut Vec<Effect>, outbound: &mut Vec<protocol::Message>) {
        let State::RequestingConfirmation { ticket } = std::mem::replace(&mut self.state, State::Idle) else {
            return;
        };
        if ticket.id != id {
            self.state = State::RequestingConfirmation { ticket };
            return;
        }
        let session_id = generate_session_id(Utc::now());
        self.state = State::Starting {
            kind: ticket.executor.clone(),
            prompt: ticket.prompt.clone(),
            session_id: session_id.clone(),
        };
        effects.push(Effect::StartExecutor { kind: ticket.executor, prompt: ticket.prompt, session_id });
        let _ = outbound;
    }

    fn decline_confirmation(&mut self, outbound: &mut Vec<protocol::Message>) {
        self.state = State::Idle;
        outbound.push(protocol::Message::info("Cancelled"));
    }

    fn on_confirm_response(
        &mut self,
        id: Option<String>,
        accept: bool,
        effects: &mut Vec<Effect>,
        outbound: &mut Vec<protocol::Message>,
    ) {
        let State::RequestingConfirmation { ticket } = &self.state else {
            // R2: applying a ConfirmResponse with no (or an expired) ticket
            // outstanding is a no-op.
            return;
        };
        if let Some(id) = &id {
            if *id != ticket.id {
                return;
            }
        }
        if accept {
            let id = ticket.id.clone();
            self.accept_confirmation(id, effects, outbound);
        } else {
            self.decline_confirmation(outbound);
        }
    }

    fn on_confirmation_timeout(&mut self, id: String, outbound: &mut Vec<protocol::Message>) {
        if let State::RequestingConfirmation { ticket } = &self.state {
            if ticket.id == id {
                self.state = State::Idle;
                outbound.push(protocol::Message::info("Timed out"));
            }
        }
    }

    fn on_routing_completed(
        &mut self,
        correlation: u64,
        decision: RoutingDecision,
        now: DateTime<Utc>,
        effects: &mut Vec<Effect>,
        outbound: &mut Vec<protocol::Message>,
    ) {
        // Correlation-id check: stale callbacks from a cancelled Routing are
        // dropped, as are late replies to a PassThrough/Query fired while
        // Running (tracked out of band in `pending_routing_while_busy`).
        let matches_routing = matches!(&self.state, State::Routing { correlation: c, .. } if *c == correlation);
        let matches_busy = self.pending_routing_while_busy == Some(correlation);
        if !matches_routing && !matches_busy {
            return;
        }
        self.pending_routing_while_busy = None;

        match decision {
            RoutingDecision::LaunchExecutor { kind, prompt } => {
                if self.state.is_busy_with_executor() {
                    outbound.push(protocol::Message::warn("Still processing"));
                    return;
                }
                let id = self.fresh_confirmation_id();
                let ticket = ConfirmationTicket::new(id.clone(), kind.clone(), prompt.clone(), now);
                outbound.push(protocol::Message::prompt_confirmation(
                    id.clone(),
                    "executor_launch",
                    kind.as_str(),
                    None,
                    prompt.as_str(),
                ));
                effects.push(Effect::StartConfirmationTimer { id, duration_secs: crate::confirmation::CONFIRMATION_TTL_SECS as u64 });
                self.state = State::RequestingConfirmation { ticket };
            }
            RoutingDecision::QueryStatus => {
                if let Some(session) = &self.session {
                    if session.status == SessionStatus::Running {
                        if let Some(cache) = &session.summary_cache {
                            if cache.is_fresh(now, chrono::Duration::seconds(SUMMARY_CACHE_TTL_SECS)) {
                                outbound.push(protocol::Message::info(cache.value.clone()));
                                if matches_routing {
                                    self.state = State::Idle;
                                }
                                return;
                            }
                        }
                        let q_correlation = self.fresh_correlation();
                        let resume = Box::new(self.state.clone());
                        self.state = State::Querying {
                            session_id: session.id.clone(),
                            correlation: q_correlation,
                            resume,
                        };
                        effects.push(Effect::QueryExecutor { session_id: session.id.clone(), correlation: q_correlation });
                        return;
                    }
                }
                if matches_routing {
                    self.state = State::Idle;
                }
                if let Some(last) = self.history.most_recent() {
                    let phrase = time_aware_phrase(now, last.ended_at, last.summary.as_deref().unwrap_or("worked on your request"));
                    outbound.push(protocol::Message::info(phrase));
                } else {
                    outbound.push(protocol::Message::info("No previous session to report on"));
                }
            }
            RoutingDecision::Respond { text } => {
                if matches_routing {
                    self.state = State::Idle;
                }
                outbound.push(protocol::Message::info(text));
            }
            RoutingDecision::PassThrough { text } => {
                if let State::Running { session_id } = &self.state {
                    // Forward the utterance to the already-running executor
                    // without re-routing it; nothing is acked back to the
                    // user here, the executor's own output is what follows.
                    effects.push(Effect::SendToExecutor { session_id: session_id.clone(), text });
                } else {
                    if matches_routing {
                        self.state = State::Idle;
                    }
                    outbound.push(protocol::Message::ack("Got it.", None));
                }
            }
            RoutingDecision::CannotParse { reason } => {
                if matches_routing {
                    self.state = State::Idle;
                }
                outbound.push(protocol::Message::info(format!(
                    "I understand. {}",
                    if reason.is_empty() { "Could you say that differently?".to_string() } else { reason }
                )));
            }
        }
    }

    fn on_executor_launched(&mut self, session_id: String, outbound: &mut Vec<protocol::Message>) {
        let State::Starting { kind, prompt, session_id: starting_id } = &self.state else { return };
        if *starting_id != session_id {
            return;
        }
        let kind = kind.clone();
        let prompt = prompt.clone();
        let mut session = Session::new(session_id.clone(), kind.clone(), prompt.clone(), Utc::now());
        session.status = SessionStatus::Running;
        self.session = Some(session);
        self.state = State::Running { session_id };
        outbound.push(protocol::Message::info(format!("Starting {} for: {}", display_executor_name(&kind), prompt)));
    }

    fn on_executor_output(&mut self, session_id: String, kind: LogKind, line: String, effects: &mut Vec<Effect>) {
        if !matches!(&self.state, State::Running { session_id: s } if *s == session_id) {
            // I3: output for a session that is not active is discarded.
            return;
        }
        let Some(session) = &mut self.session else { return };
        if session.id != session_id {
            return;
        }
        session.push_log(kind, line);
        if session.logs.len() % PERSIST_EVERY == 0 {
            effects.push(Effect::PersistSession { session_id, snapshot: session.snapshot() });
        }
    }

    fn on_executor_finished(&mut self, session_id: String, outcome: ExecutorOutcome, effects: &mut Vec<Effect>) {
        let matches_running = matches!(&self.state, State::Running { session_id: s } if *s == session_id);
        let matches_starting = matches!(&self.state, State::Starting { session_id: s, .. } if *s == session_id);
        if !matches_running && !matches_starting {
            // A launch failure with no session ever created (Starting, no
            // matching ExecutorLaunched yet) still reaches Completing, not a
            // permanent stall; everything else is an unmatched late callback.
            return;
        }
        if let Some(session) = &mut self.session {
            session.status = match &outcome {
                ExecutorOutcome::Completed => SessionStatus::Completed,
                ExecutorOutcome::Failed { .. } => SessionStatus::Failed,
            };
            session.ended_at = Some(Utc::now());
        }
        let logs = self.session.as_ref().map(|s| s.recent_logs(200)).unwrap_or_default();
        let correlation = self.fresh_correlation();
        if let Some(session) = &self.session {
            effects.push(Effect::PersistSession { session_id: session_id.clone(), snapshot: session.snapshot() });
        }
        self.state = State::Completing { session_id: session_id.clone(), outcome };
        effects.push(Effect::Summarize {
            session_id,
            logs,
            correlation,
            purpose: SummarizePurpose::Completion,
        });
    }

    fn on_status_ready(
        &mut self,
        session_id: String,
        correlation: u64,
        summary: String,
        now: DateTime<Utc>,
        outbound: &mut Vec<protocol::Message>,
    ) {
        match &self.state {
            State::Completing { session_id: s, outcome } if *s == session_id => {
                let failed = matches!(outcome, ExecutorOutcome::Failed { .. });
                if let Some(mut session) = self.session.take() {
                    session.summary_cache = Some(crate::session::SummaryCache { value: summary.clone(), at: now });
                    self.history.push(CompletedSession {
                        id: session.id.clone(),
                        kind: session.kind.clone(),
                        prompt: session.prompt.clone(),
                        ended_at: session.ended_at.unwrap_or(now),
                        summary: Some(summary.clone()),
                    });
                }
                self.state = State::Idle;
                if failed {
                    outbound.push(protocol::Message::warn(summary));
                } else {
                    outbound.push(protocol::Message::info(summary));
                }
            }
            State::Querying { session_id: s, correlation: c, resume } if *s == session_id && *c == correlation => {
                if let Some(session) = &mut self.session {
                    session.summary_cache = Some(crate::session::SummaryCache { value: summary.clone(), at: now });
                }
                self.state = (**resume).clone();
                outbound.push(protocol::Message::info(summary));
            }
            _ => {}
        }
    }

    fn on_status_failed(
        &mut self,
        session_id: String,
        correlation: u64,
        error: String,
        outbound: &mut Vec<protocol::Message>,
    ) {
        match &self.state {
            State::Completing { session_id: s, .. } if *s == session_id => {
                let fallback = if let Some(session) = &self.session {
                    format!("I was working on {}", session.prompt)
                } else {
                    error
                };
                self.session = None;
                self.state = State::Idle;
                outbound.push(protocol::Message::info(fallback));
            }
            State::Querying { session_id: s, correlation: c, resume } if *s == session_id && *c == correlation => {
                let fallback = if let Some(session) = &self.session {
                    format!("I was working on {}", session.prompt)
                } else {
                    error
                };
                self.state = (**resume).clone();
                outbound.push(protocol::Message::info(fallback));
            }
            _ => {}
        }
    }
}
