use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::actions::ActionKind;
use super::states::WorkflowState;

/// Facts emitted by the workflow engine for each applied change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum WorkflowEvent {
    /// The workflow moved between states
    Transitioned {
        workflow_id: i64,
        from: WorkflowState,
        to: WorkflowState,
        action: ActionKind,
        operator_id: i64,
    },
    /// A responsible person was set
    Assigned {
        workflow_id: i64,
        assignee_id: i64,
        operator_id: i64,
    },
    /// The workflow reached its terminal state
    Completed {
        workflow_id: i64,
        sample_receipt_id: i64,
        commission_id: i64,
        completed_on: NaiveDate,
    },
}

impl WorkflowEvent {
    /// Event name used when publishing
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::Transitioned { .. } => "workflow.transitioned",
            Self::Assigned { .. } => "workflow.assigned",
            Self::Completed { .. } => "workflow.completed",
        }
    }

    pub fn workflow_id(&self) -> i64 {
        match self {
            Self::Transitioned { workflow_id, .. }
            | Self::Assigned { workflow_id, .. }
            | Self::Completed { workflow_id, .. } => *workflow_id,
        }
    }
}
