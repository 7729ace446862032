//! Business operations over the store: the workflow engine, the test task
//! lifecycle, and the commission reaction to completed workflows.
//!
//! Services never look at roles. Authorization and list scoping happen at the
//! web boundary before a service is called.

pub mod commission;
pub mod errors;
pub mod test_tasks;
pub mod workflow_engine;

pub use commission::CommissionLifecycle;
pub use errors::{ServiceError, ServiceResult};
pub use test_tasks::{CreateTestTask, TestTaskService};
pub use workflow_engine::{
    Assignment, CreateWorkflow, PriorityOption, StateOption, WorkflowDetail, WorkflowEngine,
    WorkflowOutcome,
};
