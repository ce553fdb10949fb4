//! Property-based tests for routing
//!
//! Random handler results and positions against the fixed test registry.

use super::effect::{Effect, RouteKind};
use super::transition::transition;
use crate::envelope::{HandleException, HandlerResult, NewData, NewState};
use crate::scan::search_in_results;
use crate::states::{ConvPosition, ConvState, StateRegistry};
use crate::testing::test_registry;
use proptest::prelude::*;
use serde_json::json;
use std::collections::HashSet;

// ============================================================================
// Test Helpers
// ============================================================================

const STATES: &[(&str, &str)] = &[
    ("menu", "choose"),
    ("survey", "q1"),
    ("survey", "q2"),
    ("survey", "q3"),
];

/// Reference scanner: flatten depth-first, then take the first match
fn flatten<'a>(result: &'a HandlerResult, out: &mut Vec<&'a HandlerResult>) {
    match result {
        HandlerResult::Seq(items) => items.iter().for_each(|item| flatten(item, out)),
        leaf => out.push(leaf),
    }
}

fn first_new_state(result: &HandlerResult) -> Option<&NewState> {
    let mut leaves = Vec::new();
    flatten(result, &mut leaves);
    leaves.into_iter().find_map(|leaf| match leaf {
        HandlerResult::Envelope(crate::envelope::Envelope::NewState(state)) => Some(state),
        _ => None,
    })
}

fn is_known(registry: &StateRegistry, state: &ConvState) -> bool {
    registry.question(state).is_ok()
}

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_state() -> impl Strategy<Value = ConvState> {
    (0..STATES.len()).prop_map(|i| ConvState::new(STATES[i].0, STATES[i].1))
}

fn arb_position() -> impl Strategy<Value = ConvPosition> {
    proptest::collection::vec(arb_state(), 0..5).prop_map(|path| {
        let mut position = ConvPosition::default();
        for state in path {
            position.enter(state);
        }
        position
    })
}

fn arb_new_state() -> impl Strategy<Value = NewState> {
    prop_oneof![
        Just(NewState::previous()),
        Just(NewState::previous().on_exit("bye")),
        prop_oneof![Just("menu"), Just("survey")].prop_map(NewState::group),
        arb_state().prop_map(NewState::new),
    ]
}

fn arb_leaf() -> impl Strategy<Value = HandlerResult> {
    prop_oneof![
        Just(HandlerResult::none()),
        any::<i32>().prop_map(|n| HandlerResult::from(json!(n))),
        "[a-z]{1,5}".prop_map(|k| HandlerResult::from(NewData::new().set(k, 1))),
        arb_new_state().prop_map(HandlerResult::from),
        Just(HandlerResult::from(HandleException::new("again"))),
    ]
}

fn arb_result() -> impl Strategy<Value = HandlerResult> {
    arb_leaf().prop_recursive(3, 24, 4, |inner| {
        proptest::collection::vec(inner, 0..4).prop_map(HandlerResult::Seq)
    })
}

/// Results without any `HandleException` or `NewState`
fn arb_plain_result() -> impl Strategy<Value = HandlerResult> {
    let leaf = prop_oneof![
        Just(HandlerResult::none()),
        any::<i32>().prop_map(|n| HandlerResult::from(json!(n))),
        "[a-z]{1,5}".prop_map(|k| HandlerResult::from(NewData::new().set(k, 1))),
    ];
    leaf.prop_recursive(2, 12, 3, |inner| {
        proptest::collection::vec(inner, 0..3).prop_map(HandlerResult::Seq)
    })
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    // An exception anywhere in the result freezes the position
    #[test]
    fn prop_exception_blocks_state_change(
        position in arb_position(),
        before in arb_result(),
        after in arb_result(),
    ) {
        let registry = test_registry();
        let results = HandlerResult::seq([
            before,
            HandlerResult::from(HandleException::new("again")),
            after,
        ]);

        let result = transition(&position, &registry, &results).unwrap();
        prop_assert_eq!(result.kind, RouteKind::Exception);
        prop_assert!(result.effects.iter().all(|e| !e.is_state_change()));
        prop_assert!(result.new_position().is_none());
    }

    // The scanner agrees with flatten-then-find
    #[test]
    fn prop_scanner_matches_flattened_order(results in arb_result()) {
        let found = search_in_results::<NewState>(&results).map(|s| s.conv_state.clone());
        let expected = first_new_state(&results).map(|s| s.conv_state.clone());
        prop_assert_eq!(found, expected);
    }

    // Without envelopes the router walks the group and exits silently at its end
    #[test]
    fn prop_implicit_moves_stay_in_group(
        position in arb_position(),
        results in arb_plain_result(),
    ) {
        let registry = test_registry();
        let result = transition(&position, &registry, &results).unwrap();

        match &position.current {
            None => prop_assert_eq!(result.kind, RouteKind::Idle),
            Some(current) => match result.new_position() {
                Some(next) if next.in_conversation() => {
                    prop_assert_eq!(result.kind, RouteKind::Advance);
                    let next_state = next.current.unwrap();
                    prop_assert_eq!(&next_state.group, &current.group);
                    prop_assert_eq!(result.questions().count(), 1);
                }
                _ => {
                    prop_assert_eq!(result.kind, RouteKind::GroupExhausted);
                    prop_assert_eq!(result.questions().count(), 0);
                }
            },
        }
    }

    // Every reachable position names known states and never nests a group twice
    #[test]
    fn prop_positions_stay_consistent(
        start in arb_position(),
        rounds in proptest::collection::vec(arb_result(), 0..10),
    ) {
        let registry = test_registry();
        let mut position = start;

        for results in rounds {
            let result = transition(&position, &registry, &results).unwrap();
            if let Some(next) = result.new_position() {
                position = next;
            }

            let mut groups = HashSet::new();
            for entry in &position.entry_stack {
                prop_assert!(is_known(&registry, entry));
                prop_assert!(
                    groups.insert(entry.group.clone()),
                    "group nested twice: {:?}",
                    position
                );
            }
            if let Some(current) = &position.current {
                prop_assert!(is_known(&registry, current));
                prop_assert!(
                    !groups.contains(&current.group),
                    "current group on stack: {:?}",
                    position
                );
            } else {
                prop_assert!(position.entry_stack.is_empty());
            }
        }
    }

    // Finishing never asks the next group question
    #[test]
    fn prop_finish_only_asks_exit_messages(
        position in arb_position(),
        results in arb_result(),
    ) {
        let registry = test_registry();
        let result = transition(&position, &registry, &results).unwrap();

        if result.effects.iter().any(|e| matches!(e, Effect::FinishConversation)) {
            prop_assert!(matches!(
                result.kind,
                RouteKind::ExplicitExit | RouteKind::GroupExhausted
            ));
            let exit_texts: Vec<_> = result
                .questions()
                .map(|q| matches!(q, crate::quest::Quest::Text(text) if text == "bye"))
                .collect();
            prop_assert!(exit_texts.iter().all(|is_bye| *is_bye));
        }
    }
}
