use chrono::Utc;
use orchestrator_core::ports::RoutingDecision;
use orchestrator_core::session::{CompletedSession, LogKind};
use orchestrator_core::{Core, Effect, Event, ExecutorOutcome, State};

fn launch_decision() -> RoutingDecision {
    RoutingDecision::LaunchExecutor { kind: "claude".to_string(), prompt: "fix the login bug".to_string() }
}

/// Drives a fresh `Core` from `Idle` through a confirmed launch up to
/// `Running`, returning the session id the executor was started under.
fn launch_and_run(core: &mut Core) -> String {
    let (effects, _) = core.transition(
        Event::UserText { id: None, text: "fix the login bug".to_string(), source: Some("phone".to_string()) },
        Utc::now(),
    );
    let Some(Effect::RouteText { correlation, .. }) = effects.into_iter().next() else {
        panic!("expected a RouteText effect from Idle");
    };

    let (effects, outbound) = core.transition(Event::RoutingCompleted { correlation, decision: launch_decision() }, Utc::now());
    assert!(matches!(effects.as_slice(), [Effect::StartConfirmationTimer { .. }]));
    assert!(matches!(outbound.as_slice(), [protocol::Message::PromptConfirmation(_)]));
    let State::RequestingConfirmation { ticket } = &core.state else { panic!("expected RequestingConfirmation") };
    let ticket_id = ticket.id.clone();

    let (effects, _) = core.transition(Event::ConfirmResponse { id: Some(ticket_id), accept: true }, Utc::now());
    let Some(Effect::StartExecutor { session_id, .. }) = effects.into_iter().next() else {
        panic!("expected a StartExecutor effect");
    };

    let (_, outbound) = core.transition(Event::ExecutorLaunched { session_id: session_id.clone() }, Utc::now());
    assert!(matches!(core.state, State::Running { .. }));
    match &outbound[..] {
        [protocol::Message::Status(s)] => assert_eq!(s.text, "Starting Claude Code for: fix the login bug"),
        other => panic!("expected the launch status line, got {other:?}"),
    }
    session_id
}

/// S1: voice launch happy path, matching the spec's concrete wire wording
/// end to end (prompt_confirmation -> confirm_response -> status).
#[test]
fn voice_launch_happy_path_matches_expected_wire_text() {
    let mut core = Core::new();
    let (effects, _) = core.transition(
        Event::UserText { id: None, text: "help me build a small CLI tool".to_string(), source: Some("phone".to_string()) },
        Utc::now(),
    );
    let Some(Effect::RouteText { correlation, .. }) = effects.into_iter().next() else { panic!("expected RouteText") };

    let (_, outbound) = core.transition(
        Event::RoutingCompleted {
            correlation,
            decision: RoutingDecision::LaunchExecutor { kind: "claude".to_string(), prompt: "help me build a small CLI tool".to_string() },
        },
        Utc::now(),
    );
    let (id, executor, prompt) = match &outbound[..] {
        [protocol::Message::PromptConfirmation(pc)] => (pc.id.clone().unwrap(), pc.executor.clone(), pc.prompt.clone()),
        other => panic!("expected one prompt_confirmation, got {other:?}"),
    };
    assert_eq!(executor, "claude");
    assert_eq!(prompt, "help me build a small CLI tool");

    let (_, outbound) = core.transition(Event::ConfirmResponse { id: Some(id), accept: true }, Utc::now());
    assert!(outbound.is_empty(), "the status line follows ExecutorLaunched, not the confirm response itself");
    let State::Starting { session_id, .. } = &core.state else { panic!("expected Starting") };
    let session_id = session_id.clone();

    let (_, outbound) = core.transition(Event::ExecutorLaunched { session_id }, Utc::now());
    match &outbound[..] {
        [protocol::Message::Status(s)] => {
            assert_eq!(s.level, "info");
            assert_eq!(s.text, "Starting Claude Code for: help me build a small CLI tool");
        }
        other => panic!("expected the launch status line, got {other:?}"),
    }
}

/// S1 continued: Idle through Completing back to Idle, with the completed
/// session recorded in history.
#[test]
fn voice_launch_happy_path_completes_and_records_history() {
    let mut core = Core::new();
    let session_id = launch_and_run(&mut core);

    let (effects, _) = core.transition(
        Event::ExecutorOutput { session_id: session_id.clone(), kind: LogKind::AssistantMessage, line: "looking at auth.rs".to_string() },
        Utc::now(),
    );
    assert!(effects.is_empty(), "a single log line should not trip the persist-every-10 threshold");

    let (effects, _) =
        core.transition(Event::ExecutorFinished { session_id: session_id.clone(), outcome: ExecutorOutcome::Completed }, Utc::now());
    assert!(matches!(core.state, State::Completing { .. }));
    let correlation = effects
        .iter()
        .find_map(|e| match e {
            Effect::Summarize { correlation, .. } => Some(*correlation),
            _ => None,
        })
        .expect("ExecutorFinished must request a completion summary");
    assert!(effects.iter().any(|e| matches!(e, Effect::PersistSession { .. })));

    let (_, outbound) = core.transition(
        Event::StatusReady { session_id: session_id.clone(), correlation, summary: "fixed the login bug".to_string() },
        Utc::now(),
    );
    assert_eq!(core.state, State::Idle);
    assert!(core.session.is_none());
    assert_eq!(core.history.most_recent().unwrap().id, session_id);
    match &outbound[..] {
        [protocol::Message::Status(s)] => assert_eq!(s.level, "info"),
        other => panic!("expected one info status, got {other:?}"),
    }
}

/// S2: plain "yes" is ambiguous once history has a prior session — the
/// local classifier re-prompts with all three options instead of launching
/// immediately — and saying "new" next accepts the pending ticket.
#[test]
fn ambiguous_yes_with_prior_session_reprompts_then_new_confirms() {
    let mut core = Core::new();
    core.history.push(CompletedSession {
        id: "20260728_090000_aaaaaa".to_string(),
        kind: "claude".to_string(),
        prompt: "earlier task".to_string(),
        ended_at: Utc::now(),
        summary: Some("wrapped up the earlier task".to_string()),
    });

    let (effects, _) = core.transition(Event::UserText { id: None, text: "build a cli".to_string(), source: None }, Utc::now());
    let Some(Effect::RouteText { correlation, .. }) = effects.into_iter().next() else { panic!("expected RouteText") };
    core.transition(Event::RoutingCompleted { correlation, decision: launch_decision() }, Utc::now());
    assert!(matches!(core.state, State::RequestingConfirmation { .. }));

    let (effects, outbound) = core.transition(Event::UserVoiceConfirmation { text: "yes".to_string() }, Utc::now());
    assert!(effects.is_empty(), "an ambiguous vote must not launch anything");
    assert!(matches!(core.state, State::RequestingConfirmation { .. }), "ambiguous vote keeps the ticket outstanding");
    match &outbound[..] {
        [protocol::Message::Status(s)] => {
            assert!(s.text.contains("continue") && s.text.contains("new") && s.text.contains("cancel"));
        }
        other => panic!("expected one reprompt status, got {other:?}"),
    }

    // Saying "new" resolves the ambiguity and accepts the pending ticket.
    let (effects, outbound) = core.transition(Event::UserVoiceConfirmation { text: "new".to_string() }, Utc::now());
    assert!(outbound.is_empty(), "the status line follows ExecutorLaunched, not the confirm response itself");
    match &effects[..] {
        [Effect::StartExecutor { kind, prompt, .. }] => {
            assert_eq!(kind, "claude");
            assert_eq!(prompt, "build a cli");
        }
        other => panic!("expected StartExecutor after the disambiguating 'new', got {other:?}"),
    }
    assert!(matches!(core.state, State::Starting { .. }));
}

/// "continue" is likewise ambiguous with a prior session, independent of any
/// accept-token wording.
#[test]
fn ambiguous_continue_with_prior_session_reprompts() {
    let mut core = Core::new();
    core.history.push(CompletedSession {
        id: "20260728_090000_aaaaaa".to_string(),
        kind: "claude".to_string(),
        prompt: "earlier task".to_string(),
        ended_at: Utc::now(),
        summary: Some("wrapped up the earlier task".to_string()),
    });

    let (effects, _) = core.transition(Event::UserText { id: None, text: "build a cli".to_string(), source: None }, Utc::now());
    let Some(Effect::RouteText { correlation, .. }) = effects.into_iter().next() else { panic!("expected RouteText") };
    core.transition(Event::RoutingCompleted { correlation, decision: launch_decision() }, Utc::now());
    assert!(matches!(core.state, State::RequestingConfirmation { .. }));

    let (effects, outbound) = core.transition(Event::UserVoiceConfirmation { text: "continue".to_string() }, Utc::now());
    assert!(effects.is_empty(), "an ambiguous vote must not launch anything");
    assert!(matches!(core.state, State::RequestingConfirmation { .. }), "ambiguous vote keeps the ticket outstanding");
    match &outbound[..] {
        [protocol::Message::Status(s)] => {
            assert!(s.text.contains("continue") && s.text.contains("new") && s.text.contains("cancel"));
        }
        other => panic!("expected one reprompt status, got {other:?}"),
    }
}

/// S3: a status query while running answers from the 10s summary cache
/// without re-querying the executor on a repeated ask.
#[test]
fn status_query_while_running_uses_fresh_cache_on_repeat() {
    let mut core = Core::new();
    let session_id = launch_and_run(&mut core);

    let (effects, _) =
        core.transition(Event::UserText { id: None, text: "how's it going".to_string(), source: None }, Utc::now());
    let Some(Effect::RouteText { correlation, .. }) = effects.into_iter().next() else { panic!("expected RouteText") };

    let (effects, _) = core.transition(Event::RoutingCompleted { correlation, decision: RoutingDecision::QueryStatus }, Utc::now());
    let query_correlation = effects
        .iter()
        .find_map(|e| match e {
            Effect::QueryExecutor { correlation, .. } => Some(*correlation),
            _ => None,
        })
        .expect("first query must hit the executor, nothing cached yet");
    assert!(matches!(core.state, State::Querying { .. }));

    let (_, outbound) = core.transition(
        Event::StatusReady { session_id: session_id.clone(), correlation: query_correlation, summary: "still refactoring auth".to_string() },
        Utc::now(),
    );
    assert!(matches!(core.state, State::Running { .. }), "status query resumes back into Running");
    assert!(matches!(outbound.as_slice(), [protocol::Message::Status(_)]));

    // Ask again immediately: the cache is fresh, so no QueryExecutor this time.
    let (effects, _) =
        core.transition(Event::UserText { id: None, text: "how's it going".to_string(), source: None }, Utc::now());
    let Some(Effect::RouteText { correlation, .. }) = effects.into_iter().next() else { panic!("expected RouteText") };
    let (effects, outbound) = core.transition(Event::RoutingCompleted { correlation, decision: RoutingDecision::QueryStatus }, Utc::now());
    assert!(effects.is_empty(), "a fresh cached summary must not re-query the executor");
    assert!(matches!(core.state, State::Running { .. }));
    match &outbound[..] {
        [protocol::Message::Status(s)] => assert_eq!(s.text, "still refactoring auth"),
        other => panic!("expected the cached summary, got {other:?}"),
    }
}

/// PassThrough while Running forwards the utterance to the live executor
/// instead of echoing it back as an ack, and never leaves Running.
#[test]
fn pass_through_while_running_forwards_to_executor() {
    let mut core = Core::new();
    let session_id = launch_and_run(&mut core);

    let (effects, _) =
        core.transition(Event::UserText { id: None, text: "add a unit test for this".to_string(), source: None }, Utc::now());
    let Some(Effect::RouteText { correlation, .. }) = effects.into_iter().next() else { panic!("expected RouteText") };

    let (effects, outbound) = core.transition(
        Event::RoutingCompleted { correlation, decision: RoutingDecision::PassThrough { text: "add a unit test for this".to_string() } },
        Utc::now(),
    );
    assert!(outbound.is_empty(), "PassThrough must not echo an ack back to the user");
    assert!(matches!(core.state, State::Running { .. }), "PassThrough must not leave Running");
    match &effects[..] {
        [Effect::SendToExecutor { session_id: s, text }] => {
            assert_eq!(s, &session_id);
            assert_eq!(text, "add a unit test for this");
        }
        other => panic!("expected one SendToExecutor effect, got {other:?}"),
    }
}

/// S4: a router failure (delivered as `CannotParse`) returns to Idle with a
/// plain-language fallback rather than a raw error surfacing to the user.
#[test]
fn router_failure_falls_back_to_idle_with_plain_message() {
    let mut core = Core::new();
    let (effects, _) = core.transition(Event::UserText { id: None, text: "do the thing".to_string(), source: None }, Utc::now());
    let Some(Effect::RouteText { correlation, .. }) = effects.into_iter().next() else { panic!("expected RouteText") };

    let (effects, outbound) = core.transition(
        Event::RoutingCompleted { correlation, decision: RoutingDecision::CannotParse { reason: "The network is a bit slow right now.".to_string() } },
        Utc::now(),
    );
    assert!(effects.is_empty());
    assert_eq!(core.state, State::Idle);
    match &outbound[..] {
        [protocol::Message::Status(s)] => assert!(s.text.contains("network is a bit slow")),
        other => panic!("expected one info status, got {other:?}"),
    }
}

/// S5: a confirmation that times out before any response moves back to Idle;
/// a ConfirmResponse that lands afterwards for the same id is a no-op (R2).
#[test]
fn confirmation_timeout_then_late_response_is_a_no_op() {
    let mut core = Core::new();
    let (effects, _) = core.transition(Event::UserText { id: None, text: "build a cli".to_string(), source: None }, Utc::now());
    let Some(Effect::RouteText { correlation, .. }) = effects.into_iter().next() else { panic!("expected RouteText") };
    core.transition(Event::RoutingCompleted { correlation, decision: launch_decision() }, Utc::now());
    let State::RequestingConfirmation { ticket } = &core.state else { panic!("expected RequestingConfirmation") };
    let ticket_id = ticket.id.clone();

    let (_, outbound) = core.transition(Event::ConfirmationTimeout { id: ticket_id.clone() }, Utc::now());
    assert_eq!(core.state, State::Idle);
    assert!(matches!(outbound.as_slice(), [protocol::Message::Status(_)]));

    let (effects, outbound) = core.transition(Event::ConfirmResponse { id: Some(ticket_id), accept: true }, Utc::now());
    assert!(effects.is_empty());
    assert!(outbound.is_empty());
    assert_eq!(core.state, State::Idle);
}

/// S6: voice input that arrives while the executor is mid-launch or
/// mid-completion (the write-locked phases) is held off with a status
/// message rather than silently dropped or mis-routed.
#[test]
fn voice_during_write_locked_phase_is_deferred() {
    let mut core = Core::new();
    let (effects, _) = core.transition(Event::UserText { id: None, text: "build a cli".to_string(), source: None }, Utc::now());
    let Some(Effect::RouteText { correlation, .. }) = effects.into_iter().next() else { panic!("expected RouteText") };
    core.transition(Event::RoutingCompleted { correlation, decision: launch_decision() }, Utc::now());
    let State::RequestingConfirmation { ticket } = &core.state else { panic!("expected RequestingConfirmation") };
    let ticket_id = ticket.id.clone();
    core.transition(Event::ConfirmResponse { id: Some(ticket_id), accept: true }, Utc::now());
    assert!(matches!(core.state, State::Starting { .. }));

    let (effects, outbound) =
        core.transition(Event::UserText { id: None, text: "actually wait".to_string(), source: None }, Utc::now());
    assert!(effects.is_empty());
    match &outbound[..] {
        [protocol::Message::Status(s)] => {
            assert_eq!(s.level, "warn");
            assert_eq!(s.text, "Still processing");
        }
        other => panic!("expected a deferral warning, got {other:?}"),
    }
    assert!(matches!(core.state, State::Starting { .. }), "the in-flight launch must not be disturbed");
}

#[test]
fn declined_confirmation_returns_to_idle() {
    let mut core = Core::new();
    let (effects, _) = core.transition(Event::UserText { id: None, text: "build a cli".to_string(), source: None }, Utc::now());
    let Some(Effect::RouteText { correlation, .. }) = effects.into_iter().next() else { panic!("expected RouteText") };
    core.transition(Event::RoutingCompleted { correlation, decision: launch_decision() }, Utc::now());

    let (effects, outbound) = core.transition(Event::UserVoiceConfirmation { text: "no thanks".to_string() }, Utc::now());
    assert!(effects.is_empty());
    assert_eq!(core.state, State::Idle);
    match &outbound[..] {
        [protocol::Message::Status(s)] => assert_eq!(s.text, "Cancelled"),
        other => panic!("expected Cancelled, got {other:?}"),
    }
}

/// An executor failure path still produces a user-facing fallback even when
/// the summarizer itself fails (`StatusFailed`).
#[test]
fn executor_failure_then_summarizer_failure_still_reports_something() {
    let mut core = Core::new();
    let session_id = launch_and_run(&mut core);

    let (effects, _) = core.transition(
        Event::ExecutorFinished { session_id: session_id.clone(), outcome: ExecutorOutcome::Failed { reason: "exit code 1".to_string() } },
        Utc::now(),
    );
    let correlation = effects
        .iter()
        .find_map(|e| match e {
            Effect::Summarize { correlation, .. } => Some(*correlation),
            _ => None,
        })
        .unwrap();

    let (_, outbound) =
        core.transition(Event::StatusFailed { session_id, correlation, error: "summarizer unavailable".to_string() }, Utc::now());
    assert_eq!(core.state, State::Idle);
    assert!(core.session.is_none());
    assert!(!outbound.is_empty(), "the user must hear something even when summarization itself fails");
}
