//! # Transition Log Model
//!
//! Append-only audit trail of workflow state changes. Rows are written in the
//! same database transaction as the state change they describe and are never
//! updated or deleted afterwards.
//!
//! Maps to `lims_workflow_transition_logs`; `operator_id` references
//! `lims_users` with `ON DELETE RESTRICT`, so a user that appears in the trail
//! cannot be removed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::{FromRow, Row};
use std::cmp::Ordering;

use super::decode_code;
use crate::state_machine::{ActionKind, WorkflowState};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionLogEntry {
    pub id: i64,
    pub workflow_id: i64,
    pub from_state: WorkflowState,
    pub to_state: WorkflowState,
    pub operator_id: i64,
    pub action: ActionKind,
    pub remarks: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl TransitionLogEntry {
    /// Display ordering: newest first
    pub fn newest_first(a: &Self, b: &Self) -> Ordering {
        b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id))
    }
}

impl FromRow<'_, PgRow> for TransitionLogEntry {
    fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            workflow_id: row.try_get("workflow_id")?,
            from_state: decode_code(row, "from_state")?,
            to_state: decode_code(row, "to_state")?,
            operator_id: row.try_get("operator_id")?,
            action: decode_code(row, "action")?,
            remarks: row.try_get("remarks")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

/// New log entry; `action` is derived from `to_state` at construction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTransitionLogEntry {
    pub workflow_id: i64,
    pub from_state: WorkflowState,
    pub to_state: WorkflowState,
    pub operator_id: i64,
    pub action: ActionKind,
    pub remarks: Option<String>,
}

impl NewTransitionLogEntry {
    pub fn new(
        workflow_id: i64,
        from_state: WorkflowState,
        to_state: WorkflowState,
        operator_id: i64,
        remarks: Option<String>,
    ) -> Self {
        Self {
            workflow_id,
            from_state,
            to_state,
            operator_id,
            action: ActionKind::for_target(to_state),
            remarks,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionLogFilter {
    pub workflow_id: Option<i64>,
    pub operator_id: Option<i64>,
    pub action: Option<ActionKind>,
}

impl TransitionLogFilter {
    pub fn for_workflow(workflow_id: i64) -> Self {
        Self {
            workflow_id: Some(workflow_id),
            ..Self::default()
        }
    }

    pub fn matches(&self, entry: &TransitionLogEntry) -> bool {
        self.workflow_id.map_or(true, |id| entry.workflow_id == id)
            && self.operator_id.map_or(true, |id| entry.operator_id == id)
            && self.action.map_or(true, |a| entry.action == a)
    }
}
