//! # Transition Table Properties
//!
//! For every `(state, target)` pair the engine accepts exactly the moves the
//! table allows, and a refused move leaves the workflow untouched.

mod common;

use common::*;
use lims_workflow::services::ServiceError;
use lims_workflow::state_machine::{allowed_targets, can_transition, WorkflowState};
use proptest::prelude::*;

fn state_strategy() -> impl Strategy<Value = WorkflowState> {
    prop::sample::select(WorkflowState::ALL.to_vec())
}

proptest! {
    /// Property: the engine agrees with the table for any pair
    #[test]
    fn engine_follows_transition_table(from in state_strategy(), to in state_strategy()) {
        let (result, after, logs_before, logs_after) = tokio_test::block_on(async {
            let h = Harness::new();
            let workflow = h.create_workflow(RECEIPT).await;
            let path = path_to(from);
            if !path.is_empty() {
                h.walk(workflow.id, &path).await;
            }
            let logs_before = h.store.transition_log_count();
            let result = h.engine.transition(workflow.id, to, ADMIN, None).await;
            let after = h.engine.get(workflow.id).await.unwrap().workflow.current_state;
            (result, after, logs_before, h.store.transition_log_count())
        });

        if can_transition(from, to) {
            prop_assert!(result.is_ok(), "{} -> {} should succeed", from, to);
            prop_assert_eq!(after, to);
            prop_assert_eq!(logs_after, logs_before + 1);
        } else {
            let is_invalid = matches!(
                result,
                Err(ServiceError::InvalidTransition { from: f, to: t }) if f == from && t == to
            );
            prop_assert!(is_invalid, "{} -> {} should be refused", from, to);
            prop_assert_eq!(after, from);
            prop_assert_eq!(logs_after, logs_before);
        }
    }

    /// Property: no state lists itself as a target
    #[test]
    fn no_self_transitions(state in state_strategy()) {
        prop_assert!(!can_transition(state, state));
    }

    /// Property: terminal states have no way out, every other state has one
    #[test]
    fn only_terminal_states_are_dead_ends(state in state_strategy()) {
        prop_assert_eq!(allowed_targets(state).is_empty(), state.is_terminal());
    }
}

#[test]
fn test_every_state_reachable_from_received() {
    let mut seen = vec![WorkflowState::Received];
    let mut frontier = vec![WorkflowState::Received];
    while let Some(state) = frontier.pop() {
        for &next in allowed_targets(state) {
            if !seen.contains(&next) {
                seen.push(next);
                frontier.push(next);
            }
        }
    }
    assert_eq!(seen.len(), WorkflowState::ALL.len());
}
