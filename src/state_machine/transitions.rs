//! # Workflow Transition Table
//!
//! The single authority on which workflow state changes are legal. Every caller
//! that moves a workflow goes through [`validate_transition`]; nothing else in
//! the crate compares states to decide legality.

use super::errors::{StateMachineError, StateMachineResult};
use super::states::{TestTaskStatus, WorkflowState};

/// Allowed targets for each source state
pub fn allowed_targets(from: WorkflowState) -> &'static [WorkflowState] {
    use WorkflowState::*;

    match from {
        Received => &[Assigned],
        Assigned => &[Testing, Rejected],
        Testing => &[TestCompleted, Rejected],
        TestCompleted => &[ReportEditing, Rejected],
        ReportEditing => &[UnderReview],
        UnderReview => &[UnderApproval, Rejected],
        UnderApproval => &[Completed, Rejected],
        Rejected => &[Assigned],
        Completed => &[],
    }
}

/// Check if `from -> to` is in the table
pub fn can_transition(from: WorkflowState, to: WorkflowState) -> bool {
    allowed_targets(from).contains(&to)
}

/// Validate `from -> to`, naming the disallowed pair on failure
pub fn validate_transition(from: WorkflowState, to: WorkflowState) -> StateMachineResult<()> {
    if can_transition(from, to) {
        Ok(())
    } else {
        Err(StateMachineError::InvalidTransition { from, to })
    }
}

/// Validate a test task status change.
///
/// Tasks move `Pending -> InProgress -> Completed`; `Pending` and `InProgress`
/// may also be cancelled.
pub fn validate_task_transition(
    from: TestTaskStatus,
    to: TestTaskStatus,
    operation: &'static str,
) -> StateMachineResult<()> {
    use TestTaskStatus::*;

    let allowed = matches!(
        (from, to),
        (Pending, InProgress) | (InProgress, Completed) | (Pending, Cancelled) | (InProgress, Cancelled)
    );

    if allowed {
        Ok(())
    } else {
        Err(StateMachineError::InvalidTaskState {
            status: from,
            operation,
        })
    }
}
