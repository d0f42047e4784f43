use chrono::Utc;
use orchestrator_core::ports::RoutingDecision;
use orchestrator_core::session::LogKind;
use orchestrator_core::{Core, Effect, Event, ExecutorOutcome, State};

fn route(core: &mut Core, text: &str) -> u64 {
    let (effects, _) = core.transition(Event::UserText { id: None, text: text.to_string(), source: None }, Utc::now());
    let Some(Effect::RouteText { correlation, .. }) = effects.into_iter().next() else { panic!("expected RouteText") };
    correlation
}

fn launch(core: &mut Core, kind: &str, prompt: &str) -> String {
    let correlation = route(core, prompt);
    core.transition(
        Event::RoutingCompleted { correlation, decision: RoutingDecision::LaunchExecutor { kind: kind.to_string(), prompt: prompt.to_string() } },
        Utc::now(),
    );
    let State::RequestingConfirmation { ticket } = &core.state else { panic!("expected RequestingConfirmation") };
    let id = ticket.id.clone();
    let (effects, _) = core.transition(Event::ConfirmResponse { id: Some(id), accept: true }, Utc::now());
    let Some(Effect::StartExecutor { session_id, .. }) = effects.into_iter().next() else { panic!("expected StartExecutor") };
    core.transition(Event::ExecutorLaunched { session_id: session_id.clone() }, Utc::now());
    session_id
}

/// Boundary: an empty (or whitespace-only) transcript never reaches the
/// router; it is answered directly and leaves the state untouched.
#[test]
fn empty_transcript_reports_no_audio_detected() {
    let mut core = Core::new();
    let (effects, outbound) = core.transition(Event::UserText { id: None, text: "   ".to_string(), source: None }, Utc::now());
    assert!(effects.is_empty());
    assert_eq!(core.state, State::Idle);
    match &outbound[..] {
        [protocol::Message::Status(s)] => assert_eq!(s.text, "No audio detected"),
        other => panic!("expected No audio detected, got {other:?}"),
    }
}

/// P1 / boundary: a LaunchExecutor decision that lands while a session is
/// already Running is refused, not queued or double-started.
#[test]
fn launch_while_running_is_refused() {
    let mut core = Core::new();
    launch(&mut core, "claude", "first task");
    assert!(matches!(core.state, State::Running { .. }));

    let correlation = route(&mut core, "do something else");
    let (effects, outbound) = core.transition(
        Event::RoutingCompleted { correlation, decision: RoutingDecision::LaunchExecutor { kind: "claude".to_string(), prompt: "second task".to_string() } },
        Utc::now(),
    );
    assert!(effects.is_empty(), "a second launch must not start a second executor");
    assert!(matches!(core.state, State::Running { .. }), "the running session must be left alone");
    match &outbound[..] {
        [protocol::Message::Status(s)] => {
            assert_eq!(s.level, "warn");
            assert_eq!(s.text, "Still processing");
        }
        other => panic!("expected a refusal warning, got {other:?}"),
    }
}

/// Boundary: a voice utterance matching neither accept nor decline while a
/// confirmation is pending re-prompts rather than silently dropping it or
/// routing it through the LLM.
#[test]
fn unmatched_voice_while_confirming_reprompts_without_routing() {
    let mut core = Core::new();
    let correlation = route(&mut core, "build me a cli");
    core.transition(
        Event::RoutingCompleted { correlation, decision: RoutingDecision::LaunchExecutor { kind: "claude".to_string(), prompt: "build me a cli".to_string() } },
        Utc::now(),
    );

    let (effects, outbound) = core.transition(Event::UserVoiceConfirmation { text: "what's the weather".to_string() }, Utc::now());
    assert!(effects.is_empty(), "an unmatched utterance must never reach the router while confirming");
    assert!(matches!(core.state, State::RequestingConfirmation { .. }));
    match &outbound[..] {
        [protocol::Message::Status(s)] => assert!(s.text.contains("yes") || s.text.to_lowercase().contains("waiting")),
        other => panic!("expected a re-prompt, got {other:?}"),
    }
}

/// P2: there is never more than one outstanding ConfirmationTicket, and it
/// is always carried by exactly the RequestingConfirmation state.
#[test]
fn at_most_one_confirmation_ticket_outstanding() {
    let mut core = Core::new();
    let correlation = route(&mut core, "build me a cli");
    core.transition(
        Event::RoutingCompleted { correlation, decision: RoutingDecision::LaunchExecutor { kind: "claude".to_string(), prompt: "build me a cli".to_string() } },
        Utc::now(),
    );
    let first_ticket = match &core.state {
        State::RequestingConfirmation { ticket } => ticket.id.clone(),
        other => panic!("expected RequestingConfirmation, got {other:?}"),
    };

    // A second UserText while confirming is classified locally, not routed,
    // and does not mint a second ticket.
    core.transition(Event::UserVoiceConfirmation { text: "hold on".to_string() }, Utc::now());
    match &core.state {
        State::RequestingConfirmation { ticket } => assert_eq!(ticket.id, first_ticket, "the original ticket must survive unmatched input"),
        other => panic!("expected RequestingConfirmation still, got {other:?}"),
    }
}

/// P5: correlation ids handed out by one `Core` are strictly increasing and
/// therefore never collide within its lifetime.
#[test]
fn correlation_ids_are_unique_per_core() {
    let mut core = Core::new();
    let a = route(&mut core, "first");
    // Cancel `a` by routing again from Idle-turned-Routing state.
    let b = route(&mut core, "second");
    assert_ne!(a, b);

    // The stale `a` correlation is dropped on arrival (cancellation), proving
    // P5 is load-bearing and not just cosmetic.
    let (effects, outbound) = core.transition(
        Event::RoutingCompleted { correlation: a, decision: RoutingDecision::Respond { text: "stale".to_string() } },
        Utc::now(),
    );
    assert!(effects.is_empty());
    assert!(outbound.is_empty());
    assert!(matches!(core.state, State::Routing { correlation, .. } if correlation == b));
}

/// P4: every StartExecutor is eventually followed by ExecutorLaunched and
/// then ExecutorFinished; a failed launch still reaches a terminal outcome
/// even when it fails before any ExecutorLaunched ever arrives (spec §7:
/// "Executor launch failure yields ExecutorFinished{outcome=Failed} ->
/// Completing" is not conditioned on having reached Running first).
#[test]
fn executor_failure_path_still_terminates() {
    let mut core = Core::new();
    let correlation = route(&mut core, "build me a cli");
    core.transition(
        Event::RoutingCompleted { correlation, decision: RoutingDecision::LaunchExecutor { kind: "claude".to_string(), prompt: "build me a cli".to_string() } },
        Utc::now(),
    );
    let State::RequestingConfirmation { ticket } = &core.state else { panic!("expected RequestingConfirmation") };
    let id = ticket.id.clone();
    let (effects, _) = core.transition(Event::ConfirmResponse { id: Some(id), accept: true }, Utc::now());
    let Some(Effect::StartExecutor { session_id, .. }) = effects.into_iter().next() else { panic!("expected StartExecutor") };

    // The launch itself fails before any ExecutorLaunched ever arrives.
    let (effects, _) = core.transition(
        Event::ExecutorFinished { session_id: session_id.clone(), outcome: ExecutorOutcome::Failed { reason: "spawn failed".to_string() } },
        Utc::now(),
    );
    assert!(
        matches!(&core.state, State::Completing { session_id: s, .. } if *s == session_id),
        "a launch failure must still reach Completing, not stall at Starting forever"
    );
    assert!(effects.iter().any(|e| matches!(e, Effect::Summarize { .. })), "a fallback summary must still be requested");
}

/// R2: a ConfirmResponse whose id does not match the live ticket (expired or
/// stale) is a no-op, leaving the pending confirmation untouched.
#[test]
fn confirm_response_with_mismatched_id_is_a_no_op() {
    let mut core = Core::new();
    let correlation = route(&mut core, "build me a cli");
    core.transition(
        Event::RoutingCompleted { correlation, decision: RoutingDecision::LaunchExecutor { kind: "claude".to_string(), prompt: "build me a cli".to_string() } },
        Utc::now(),
    );
    let live_ticket = match &core.state {
        State::RequestingConfirmation { ticket } => ticket.id.clone(),
        other => panic!("expected RequestingConfirmation, got {other:?}"),
    };

    let (effects, outbound) = core.transition(Event::ConfirmResponse { id: Some("confirm_expired".to_string()), accept: true }, Utc::now());
    assert!(effects.is_empty());
    assert!(outbound.is_empty());
    match &core.state {
        State::RequestingConfirmation { ticket } => assert_eq!(ticket.id, live_ticket),
        other => panic!("expected the live ticket to survive, got {other:?}"),
    }
}

/// Output for a session id other than the active one is discarded (I3 in
/// the design notes): a stray late line from a torn-down executor must not
/// corrupt the active session's log.
#[test]
fn executor_output_for_inactive_session_is_discarded() {
    let mut core = Core::new();
    let session_id = launch(&mut core, "claude", "build me a cli");

    let (effects, _) = core.transition(
        Event::ExecutorOutput { session_id: "not-the-active-session".to_string(), kind: LogKind::AssistantMessage, line: "stray".to_string() },
        Utc::now(),
    );
    assert!(effects.is_empty());
    assert_eq!(core.session.as_ref().unwrap().logs.len(), 0);
    let _ = session_id;
}
