//! # Workflow Instance Model
//!
//! The tracked lifecycle record for one physical sample's passage through the lab.
//!
//! ## Database Schema
//!
//! Maps to `lims_sample_workflows`:
//! ```sql
//! CREATE TABLE lims_sample_workflows (
//!   id BIGSERIAL PRIMARY KEY,
//!   sample_receipt_id BIGINT NOT NULL UNIQUE,
//!   current_state VARCHAR(30) NOT NULL DEFAULT 'received',
//!   assignee_id BIGINT,
//!   priority SMALLINT NOT NULL DEFAULT 1,
//!   expected_completion_date DATE,
//!   actual_completion_date DATE,
//!   -- ... notes, created_by, is_deleted, timestamps
//! );
//! ```
//!
//! `current_state` is only ever written through a conditional update keyed on
//! the state the writer observed, so two racing writers cannot both apply a
//! change from the same source state.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::{FromRow, Row};
use std::cmp::Ordering;
use std::str::FromStr;

use super::decode_code;
use crate::state_machine::{ParseStateError, Priority, WorkflowState};

/// One sample's workflow. Never hard-deleted; `is_deleted` hides it instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowInstance {
    pub id: i64,
    pub sample_receipt_id: i64,
    pub current_state: WorkflowState,
    pub assignee_id: Option<i64>,
    pub priority: Priority,
    pub expected_completion_date: Option<NaiveDate>,
    /// Set once, on the transition into `Completed`
    pub actual_completion_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub created_by: Option<i64>,
    #[serde(skip)]
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkflowInstance {
    /// Queue ordering: priority descending, expected completion date ascending
    /// with undated workflows last, newest first, then id descending.
    pub fn queue_order(a: &Self, b: &Self) -> Ordering {
        b.priority
            .cmp(&a.priority)
            .then_with(|| match (a.expected_completion_date, b.expected_completion_date) {
                (Some(x), Some(y)) => x.cmp(&y),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            })
            .then_with(|| b.created_at.cmp(&a.created_at))
            .then_with(|| b.id.cmp(&a.id))
    }
}

impl FromRow<'_, PgRow> for WorkflowInstance {
    fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        let priority: i16 = row.try_get("priority")?;
        Ok(Self {
            id: row.try_get("id")?,
            sample_receipt_id: row.try_get("sample_receipt_id")?,
            current_state: decode_code(row, "current_state")?,
            assignee_id: row.try_get("assignee_id")?,
            priority: Priority::try_from(priority).map_err(|e| sqlx::Error::ColumnDecode {
                index: "priority".to_string(),
                source: Box::new(e),
            })?,
            expected_completion_date: row.try_get("expected_completion_date")?,
            actual_completion_date: row.try_get("actual_completion_date")?,
            notes: row.try_get("notes")?,
            created_by: row.try_get("created_by")?,
            is_deleted: row.try_get("is_deleted")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// Insert payload; new workflows always start in `Received`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewWorkflowInstance {
    pub sample_receipt_id: i64,
    pub priority: Priority,
    pub expected_completion_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub created_by: Option<i64>,
}

/// Column a listing may be sorted on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    Priority,
    ExpectedCompletionDate,
    CreatedAt,
}

impl SortField {
    pub fn column(&self) -> &'static str {
        match self {
            SortField::Priority => "priority",
            SortField::ExpectedCompletionDate => "expected_completion_date",
            SortField::CreatedAt => "created_at",
        }
    }
}

/// Caller-chosen sort, written `field` or `-field` for descending.
///
/// Undated workflows sort last in either direction, and ties fall back to
/// [`WorkflowInstance::queue_order`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WorkflowOrdering {
    pub field: SortField,
    pub descending: bool,
}

impl WorkflowOrdering {
    pub fn compare(&self, a: &WorkflowInstance, b: &WorkflowInstance) -> Ordering {
        let directed = |ord: Ordering| if self.descending { ord.reverse() } else { ord };
        let primary = match self.field {
            SortField::Priority => directed(a.priority.cmp(&b.priority)),
            SortField::CreatedAt => directed(a.created_at.cmp(&b.created_at)),
            SortField::ExpectedCompletionDate => {
                match (a.expected_completion_date, b.expected_completion_date) {
                    (Some(x), Some(y)) => directed(x.cmp(&y)),
                    (Some(_), None) => Ordering::Less,
                    (None, Some(_)) => Ordering::Greater,
                    (None, None) => Ordering::Equal,
                }
            }
        };
        primary.then_with(|| WorkflowInstance::queue_order(a, b))
    }

    /// `ORDER BY` fragment for the chosen column
    pub fn sql(&self) -> String {
        let direction = if self.descending { "DESC" } else { "ASC" };
        format!("{} {direction} NULLS LAST", self.field.column())
    }
}

impl FromStr for WorkflowOrdering {
    type Err = ParseStateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (descending, name) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };
        let field = match name {
            "priority" => SortField::Priority,
            "expected_completion_date" => SortField::ExpectedCompletionDate,
            "created_at" => SortField::CreatedAt,
            _ => return Err(ParseStateError::new("ordering", s)),
        };
        Ok(Self { field, descending })
    }
}

impl TryFrom<String> for WorkflowOrdering {
    type Error = ParseStateError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<WorkflowOrdering> for String {
    fn from(ordering: WorkflowOrdering) -> Self {
        let sign = if ordering.descending { "-" } else { "" };
        format!("{sign}{}", ordering.field.column())
    }
}

/// Filters for workflow listings. Deleted workflows are never returned.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowFilter {
    pub state: Option<WorkflowState>,
    pub states: Option<Vec<WorkflowState>>,
    pub assignee_id: Option<i64>,
    pub priority: Option<Priority>,
    /// Case-insensitive substring of the receipt code or the commission code.
    /// Stores resolve it, since the codes live on related records.
    pub search: Option<String>,
    pub ordering: Option<WorkflowOrdering>,
}

impl WorkflowFilter {
    /// Open work assigned to one user
    pub fn active_for(assignee_id: i64) -> Self {
        Self {
            states: Some(WorkflowState::ACTIVE.to_vec()),
            assignee_id: Some(assignee_id),
            ..Self::default()
        }
    }

    /// Trimmed search term, `None` when blank
    pub fn search_term(&self) -> Option<&str> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|term| !term.is_empty())
    }

    pub fn sort(&self, workflows: &mut [WorkflowInstance]) {
        match self.ordering {
            Some(ordering) => workflows.sort_by(|a, b| ordering.compare(a, b)),
            None => workflows.sort_by(WorkflowInstance::queue_order),
        }
    }

    /// Column filters only; [`search`](Self::search) is checked by the store
    pub fn matches(&self, workflow: &WorkflowInstance) -> bool {
        !workflow.is_deleted
            && self.state.map_or(true, |s| workflow.current_state == s)
            && self
                .states
                .as_ref()
                .map_or(true, |states| states.contains(&workflow.current_state))
            && self
                .assignee_id
                .map_or(true, |id| workflow.assignee_id == Some(id))
            && self.priority.map_or(true, |p| workflow.priority == p)
    }
}
