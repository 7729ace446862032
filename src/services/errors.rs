use thiserror::Error;

use crate::database::StoreError;
use crate::state_machine::{StateMachineError, TestTaskStatus, WorkflowState};

/// Operation-level failures reported by the workflow and task services.
///
/// Every variant is raised before any mutation is applied, or after the store
/// rolled the whole change back.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("cannot move workflow from \"{}\" to \"{}\"", .from.label(), .to.label())]
    InvalidTransition {
        from: WorkflowState,
        to: WorkflowState,
    },

    #[error("test task {task_id} cannot {operation} while \"{}\"", .status.label())]
    InvalidState {
        task_id: i64,
        status: TestTaskStatus,
        operation: &'static str,
    },

    /// Concurrent writers kept winning; nothing was applied
    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    AlreadyExists(String),

    #[error("{0}")]
    Validation(String),

    #[error("storage error: {0}")]
    Storage(#[source] StoreError),
}

impl ServiceError {
    pub fn not_found(entity: &'static str, id: i64) -> Self {
        Self::NotFound { entity, id }
    }
}

impl From<StoreError> for ServiceError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::NotFound { entity, id } => Self::NotFound { entity, id },
            StoreError::AlreadyExists(message) => Self::AlreadyExists(message),
            StoreError::StateConflict { workflow_id, actual } => Self::Conflict(format!(
                "workflow {workflow_id} changed concurrently and is now \"{}\"",
                actual.label()
            )),
            StoreError::TaskStatusConflict { task_id, actual } => Self::Conflict(format!(
                "test task {task_id} changed concurrently and is now \"{}\"",
                actual.label()
            )),
            other => Self::Storage(other),
        }
    }
}

impl From<StateMachineError> for ServiceError {
    fn from(error: StateMachineError) -> Self {
        match error {
            StateMachineError::InvalidTransition { from, to } => {
                Self::InvalidTransition { from, to }
            }
            // Task operations map this themselves so the task id is kept
            other @ StateMachineError::InvalidTaskState { .. } => {
                Self::Validation(other.to_string())
            }
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
