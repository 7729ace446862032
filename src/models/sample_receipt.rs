use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Record of a physical sample being received against a commission.
///
/// Read-only from the workflow core's point of view; each receipt owns at most
/// one workflow instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct SampleReceipt {
    pub id: i64,
    pub commission_id: i64,
    pub receive_code: String,
    pub receiver_id: i64,
    pub received_at: DateTime<Utc>,
}
