use thiserror::Error;

use super::states::{TestTaskStatus, WorkflowState};

/// Errors raised by the pure state machine layer
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateMachineError {
    #[error("cannot move workflow from \"{}\" to \"{}\"", .from.label(), .to.label())]
    InvalidTransition {
        from: WorkflowState,
        to: WorkflowState,
    },

    #[error("test task cannot {operation} while \"{}\"", .status.label())]
    InvalidTaskState {
        status: TestTaskStatus,
        operation: &'static str,
    },
}

/// A stored or submitted code that does not name a known variant
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid {kind}: {value}")]
pub struct ParseStateError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseStateError {
    pub fn new(kind: &'static str, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }
}

/// Result type alias for state machine operations
pub type StateMachineResult<T> = Result<T, StateMachineError>;
