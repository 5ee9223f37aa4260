//! Property-based tests for the state machine
//!
//! These tests verify key invariants hold across arbitrary event sequences.

use super::state::*;
use super::transition::*;
use super::*;
use crate::llm::LlmErrorKind;
use proptest::prelude::*;

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_error_kind() -> impl Strategy<Value = LlmErrorKind> {
    prop_oneof![
        Just(LlmErrorKind::Network),
        Just(LlmErrorKind::RateLimit),
        Just(LlmErrorKind::ServerError),
        Just(LlmErrorKind::Auth),
        Just(LlmErrorKind::InvalidRequest),
        Just(LlmErrorKind::Stream),
        Just(LlmErrorKind::Unknown),
    ]
}

fn arb_fragment_text() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 *`\n]{0,12}"
}

fn arb_user_text() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-zA-Z ]{1,20}",
        Just(String::new()),
        Just("   ".to_string()),
    ]
}

/// Turn ids are drawn from a tiny pool so stale and current ids collide often
fn arb_turn_id() -> impl Strategy<Value = String> {
    prop_oneof![Just("t1".to_string()), Just("t2".to_string()), Just("t3".to_string())]
}

fn arb_event() -> impl Strategy<Value = Event> {
    prop_oneof![
        (arb_user_text(), arb_turn_id())
            .prop_map(|(text, turn_id)| Event::UserMessage { text, turn_id }),
        Just(Event::UserCancel),
        (arb_turn_id(), arb_fragment_text())
            .prop_map(|(turn_id, text)| Event::StreamFragment { turn_id, text }),
        arb_turn_id().prop_map(|turn_id| Event::StreamComplete { turn_id }),
        (arb_turn_id(), "[a-z ]{1,10}", arb_error_kind()).prop_map(|(turn_id, message, kind)| {
            Event::StreamFailed {
                turn_id,
                message,
                kind,
            }
        }),
        arb_turn_id().prop_map(|turn_id| Event::StreamAborted { turn_id }),
    ]
}

fn arb_start_state() -> impl Strategy<Value = ChatState> {
    prop_oneof![
        4 => Just(ChatState::ready()),
        1 => Just(ChatState::unavailable("API key is missing")),
    ]
}

fn is_terminal(event: &Event) -> bool {
    matches!(
        event,
        Event::StreamComplete { .. } | Event::StreamFailed { .. } | Event::StreamAborted { .. }
    )
}

fn check_shape(state: &ChatState) -> Result<(), TestCaseError> {
    let pending: Vec<usize> = state
        .messages
        .iter()
        .enumerate()
        .filter(|(_, m)| m.is_pending())
        .map(|(i, _)| i)
        .collect();

    prop_assert!(pending.len() <= 1, "more than one pending message");
    if let Some(&index) = pending.first() {
        prop_assert_eq!(index, state.messages.len() - 1, "pending message is not last");
        prop_assert_eq!(state.messages[index].author, Author::Model);
    }
    prop_assert_eq!(
        pending.len() == 1,
        state.is_in_flight(),
        "pending message must exist exactly while in flight"
    );
    Ok(())
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// No event sequence leaves more than one pending message, or a pending
    /// message anywhere but last, or a pending message while idle
    #[test]
    fn prop_single_pending_message(
        start in arb_start_state(),
        events in proptest::collection::vec(arb_event(), 0..40)
    ) {
        let mut state = start;
        for event in events {
            if let Ok(result) = transition(&state, event) {
                state = result.new_state;
            }
            check_shape(&state)?;
        }
    }

    /// Only sends can be refused; stream and cancel events always apply
    #[test]
    fn prop_only_sends_are_rejected(
        start in arb_start_state(),
        prefix in proptest::collection::vec(arb_event(), 0..20),
        event in arb_event()
    ) {
        let mut state = start;
        for e in prefix {
            if let Ok(result) = transition(&state, e) {
                state = result.new_state;
            }
        }

        let is_send = matches!(event, Event::UserMessage { .. });
        if transition(&state, event).is_err() {
            prop_assert!(is_send);
        }
    }

    /// Blank input, a busy conversation, or a missing session never opens a stream
    #[test]
    fn prop_invalid_send_never_streams(
        start in arb_start_state(),
        prefix in proptest::collection::vec(arb_event(), 0..20),
        text in arb_user_text(),
        turn_id in arb_turn_id()
    ) {
        let mut state = start;
        for e in prefix {
            if let Ok(result) = transition(&state, e) {
                state = result.new_state;
            }
        }

        let blank = text.trim().is_empty();
        let invalid = blank || state.is_in_flight() || state.phase == ChatPhase::Unavailable;
        let before = state.messages.len();

        match transition(&state, Event::UserMessage { text, turn_id }) {
            Ok(result) => {
                prop_assert!(!invalid);
                prop_assert_eq!(result.new_state.messages.len(), before + 2);
                let opens = result
                    .effects
                    .iter()
                    .filter(|e| matches!(e, Effect::OpenStream { .. }))
                    .count();
                prop_assert_eq!(opens, 1);
            }
            Err(err) => {
                prop_assert!(invalid);
                if blank {
                    prop_assert_eq!(err, TransitionError::BlankInput);
                }
            }
        }
    }

    /// A successful send grows the conversation by exactly two and the final
    /// reply is the concatenation of every fragment in arrival order
    #[test]
    fn prop_successful_send_folds_fragments(
        text in "[a-zA-Z]{1,20}",
        fragments in proptest::collection::vec(arb_fragment_text(), 0..10)
    ) {
        let start = ChatState::ready();
        let mut state = transition(&start, Event::user_message(text.clone(), "t1"))
            .unwrap()
            .new_state;

        let mut expected = String::new();
        for fragment in &fragments {
            state = transition(&state, Event::fragment("t1", fragment.as_str()))
                .unwrap()
                .new_state;
            expected.push_str(fragment);
            prop_assert_eq!(state.last_message().unwrap().text(), expected.as_str());
        }

        state = transition(&state, Event::StreamComplete { turn_id: "t1".to_string() })
            .unwrap()
            .new_state;

        prop_assert_eq!(state.messages.len(), start.messages.len() + 2);
        prop_assert_eq!(&state.messages[1], &ChatMessage::user(text));
        prop_assert_eq!(&state.messages[2], &ChatMessage::model(expected));
        prop_assert!(!state.is_in_flight());
        prop_assert!(state.error.is_none());
    }

    /// Failure after any number of fragments shows only the fixed error text
    #[test]
    fn prop_failure_discards_partial(
        fragments in proptest::collection::vec(arb_fragment_text(), 0..10),
        kind in arb_error_kind()
    ) {
        let mut state = transition(&ChatState::ready(), Event::user_message("q", "t1"))
            .unwrap()
            .new_state;
        for fragment in fragments {
            state = transition(&state, Event::fragment("t1", fragment)).unwrap().new_state;
        }

        let result = transition(
            &state,
            Event::StreamFailed {
                turn_id: "t1".to_string(),
                message: "boom".to_string(),
                kind,
            },
        )
        .unwrap();

        let state = result.new_state;
        prop_assert_eq!(state.last_message().unwrap().text(), STREAM_ERROR_TEXT);
        prop_assert_eq!(state.error.as_deref(), Some(STREAM_ERROR_TEXT));
        prop_assert!(!state.is_in_flight());
        prop_assert!(result.effects.contains(&Effect::NotifyTurnDone));
    }

    /// Any matching terminal event releases the in-flight flag, whatever
    /// happened during the stream
    #[test]
    fn prop_terminal_event_releases_flag(
        middle in proptest::collection::vec(
            prop_oneof![
                arb_fragment_text().prop_map(|text| Event::fragment("t1", text)),
                Just(Event::UserCancel),
            ],
            0..10
        ),
        terminal in prop_oneof![
            Just(Event::StreamComplete { turn_id: "t1".to_string() }),
            Just(Event::StreamAborted { turn_id: "t1".to_string() }),
            arb_error_kind().prop_map(|kind| Event::StreamFailed {
                turn_id: "t1".to_string(),
                message: "x".to_string(),
                kind,
            }),
        ]
    ) {
        prop_assert!(is_terminal(&terminal));

        let mut state = transition(&ChatState::ready(), Event::user_message("q", "t1"))
            .unwrap()
            .new_state;
        for event in middle {
            state = transition(&state, event).unwrap().new_state;
            prop_assert!(state.is_in_flight());
        }

        let result = transition(&state, terminal).unwrap();
        prop_assert!(!result.new_state.is_in_flight());
        prop_assert_eq!(result.new_state.phase, ChatPhase::Idle);
        prop_assert!(result.effects.contains(&Effect::NotifyTurnDone));
    }

    /// Every turn that opens a stream reports exactly one turn-done
    #[test]
    fn prop_turn_done_once_per_turn(
        events in proptest::collection::vec(arb_event(), 0..60)
    ) {
        let mut state = ChatState::ready();
        let mut opened = 0usize;
        let mut done = 0usize;

        for event in events {
            if let Ok(result) = transition(&state, event) {
                opened += result
                    .effects
                    .iter()
                    .filter(|e| matches!(e, Effect::OpenStream { .. }))
                    .count();
                done += result
                    .effects
                    .iter()
                    .filter(|e| matches!(e, Effect::NotifyTurnDone))
                    .count();
                state = result.new_state;
            }
        }

        let still_open = usize::from(state.is_in_flight());
        prop_assert_eq!(opened, done + still_open);
    }
}
