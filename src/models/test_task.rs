use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{FromRow, Row};

use super::decode_code;
use crate::state_machine::TestTaskStatus;

/// A discrete testing assignment under a workflow.
///
/// Its status is tracked independently from the workflow's own state; nothing
/// cross-checks the two.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestTask {
    pub id: i64,
    pub workflow_id: i64,
    pub tester_id: i64,
    /// Ordered task descriptors; opaque to the service
    pub test_items: Vec<Value>,
    pub status: TestTaskStatus,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub created_by: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FromRow<'_, PgRow> for TestTask {
    fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        let Json(test_items): Json<Vec<Value>> = row.try_get("test_items")?;
        Ok(Self {
            id: row.try_get("id")?,
            workflow_id: row.try_get("workflow_id")?,
            tester_id: row.try_get("tester_id")?,
            test_items,
            status: decode_code(row, "status")?,
            start_time: row.try_get("start_time")?,
            end_time: row.try_get("end_time")?,
            notes: row.try_get("notes")?,
            created_by: row.try_get("created_by")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTestTask {
    pub workflow_id: i64,
    pub tester_id: i64,
    pub test_items: Vec<Value>,
    pub notes: Option<String>,
    pub created_by: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestTaskFilter {
    pub workflow_id: Option<i64>,
    pub tester_id: Option<i64>,
    pub status: Option<TestTaskStatus>,
}

impl TestTaskFilter {
    pub fn matches(&self, task: &TestTask) -> bool {
        self.workflow_id.map_or(true, |id| task.workflow_id == id)
            && self.tester_id.map_or(true, |id| task.tester_id == id)
            && self.status.map_or(true, |s| task.status == s)
    }
}
