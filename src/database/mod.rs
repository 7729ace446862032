//! # Persistence
//!
//! The [`LimsStore`] trait is the only way the services touch stored state.
//! Two implementations ship with the crate:
//!
//! - [`PgStore`]: PostgreSQL through `sqlx`, used by the server
//! - [`InMemoryStore`]: a mutex-guarded in-process store for tests and local runs
//!
//! Every state-changing write is a compare-and-set keyed on the state the
//! caller observed. A workflow change carries its audit entry and any side
//! effects so the store can apply all of them atomically or none of them.

pub mod memory;
pub mod migrations;
pub mod postgres;

pub use memory::{Fixtures, InMemoryStore};
pub use postgres::PgStore;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{
    Commission, CommissionStatus, NewTestTask, NewTransitionLogEntry, NewWorkflowInstance,
    SampleReceipt, TestTask, TestTaskFilter, TransitionLogEntry, TransitionLogFilter, User,
    WorkflowFilter, WorkflowInstance,
};
use crate::state_machine::{Priority, TestTaskStatus, WorkflowState};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    /// The compare-and-set lost: the workflow is no longer in the expected state
    #[error("workflow {workflow_id} is now \"{actual}\"")]
    StateConflict {
        workflow_id: i64,
        actual: WorkflowState,
    },

    #[error("test task {task_id} is now \"{actual}\"")]
    TaskStatusConflict {
        task_id: i64,
        actual: TestTaskStatus,
    },

    #[error("{0}")]
    AlreadyExists(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("fixture error: {0}")]
    Fixture(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Field updates for a workflow row. `None` leaves the column untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowUpdate {
    pub current_state: Option<WorkflowState>,
    pub assignee_id: Option<i64>,
    pub priority: Option<Priority>,
    pub expected_completion_date: Option<NaiveDate>,
    /// Only written while the column is still empty
    pub actual_completion_date: Option<NaiveDate>,
}

/// Writes applied in the same unit of work as a workflow change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SideEffect {
    SetCommissionStatus {
        commission_id: i64,
        status: CommissionStatus,
    },
}

/// One atomic workflow write: CAS on `expected_state`, update, audit, side effects
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowChange {
    pub workflow_id: i64,
    pub expected_state: WorkflowState,
    pub update: WorkflowUpdate,
    pub log_entry: Option<NewTransitionLogEntry>,
    pub side_effects: Vec<SideEffect>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedWorkflowChange {
    pub workflow: WorkflowInstance,
    pub log_entry: Option<TransitionLogEntry>,
}

/// Status write for a test task, guarded by the status the caller observed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskChange {
    pub task_id: i64,
    pub expected_status: TestTaskStatus,
    pub status: TestTaskStatus,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait LimsStore: Send + Sync + std::fmt::Debug {
    // Registries owned by other subsystems; read-only here
    async fn find_user(&self, id: i64) -> StoreResult<Option<User>>;
    async fn find_sample_receipt(&self, id: i64) -> StoreResult<Option<SampleReceipt>>;
    async fn find_commission(&self, id: i64) -> StoreResult<Option<Commission>>;

    /// Fails with `AlreadyExists` when the receipt already owns a workflow
    async fn insert_workflow(&self, new: NewWorkflowInstance) -> StoreResult<WorkflowInstance>;
    async fn get_workflow(&self, id: i64) -> StoreResult<Option<WorkflowInstance>>;
    /// Matching workflows in queue order
    async fn list_workflows(&self, filter: &WorkflowFilter) -> StoreResult<Vec<WorkflowInstance>>;
    async fn apply_workflow_change(
        &self,
        change: WorkflowChange,
    ) -> StoreResult<AppliedWorkflowChange>;
    async fn soft_delete_workflow(&self, id: i64) -> StoreResult<()>;

    /// Matching entries, newest first
    async fn list_transition_logs(
        &self,
        filter: &TransitionLogFilter,
    ) -> StoreResult<Vec<TransitionLogEntry>>;

    async fn insert_test_task(&self, new: NewTestTask) -> StoreResult<TestTask>;
    async fn get_test_task(&self, id: i64) -> StoreResult<Option<TestTask>>;
    async fn list_test_tasks(&self, filter: &TestTaskFilter) -> StoreResult<Vec<TestTask>>;
    async fn apply_task_change(&self, change: TaskChange) -> StoreResult<TestTask>;

    async fn health_check(&self) -> StoreResult<()>;
}
