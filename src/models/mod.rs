//! # Data Models
//!
//! Row types for the workflow core and the registries it reads from.
//! Each model maps to one `lims_*` table; see `migrations/` for the schema.

pub mod commission;
pub mod sample_receipt;
pub mod test_task;
pub mod transition_log;
pub mod user;
pub mod workflow;

pub use commission::{Commission, CommissionStatus};
pub use sample_receipt::SampleReceipt;
pub use test_task::{NewTestTask, TestTask, TestTaskFilter};
pub use transition_log::{NewTransitionLogEntry, TransitionLogEntry, TransitionLogFilter};
pub use user::{Role, User};
pub use workflow::{
    NewWorkflowInstance, SortField, WorkflowFilter, WorkflowInstance, WorkflowOrdering,
};

use sqlx::postgres::PgRow;
use sqlx::Row;
use std::str::FromStr;

use crate::state_machine::ParseStateError;

/// Decode a text column holding one of our enum codes
pub(crate) fn decode_code<T>(row: &PgRow, column: &str) -> Result<T, sqlx::Error>
where
    T: FromStr<Err = ParseStateError>,
{
    let raw: String = row.try_get(column)?;
    raw.parse().map_err(|e: ParseStateError| sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(e),
    })
}
