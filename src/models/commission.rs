use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::{FromRow, Row};
use std::fmt;

use super::decode_code;
use crate::state_machine::ParseStateError;

/// Status of a testing commission (the client's order)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommissionStatus {
    Draft,
    Submitted,
    Received,
    Testing,
    Completed,
    Cancelled,
}

impl CommissionStatus {
    pub const ALL: [CommissionStatus; 6] = [
        Self::Draft,
        Self::Submitted,
        Self::Received,
        Self::Testing,
        Self::Completed,
        Self::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Submitted => "submitted",
            Self::Received => "received",
            Self::Testing => "testing",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for CommissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CommissionStatus {
    type Err = ParseStateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| ParseStateError::new("commission status", s))
    }
}

/// A commission record. Only `status` is ever written by the workflow core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commission {
    pub id: i64,
    pub code: String,
    pub sample_name: String,
    pub status: CommissionStatus,
}

impl FromRow<'_, PgRow> for Commission {
    fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            code: row.try_get("code")?,
            sample_name: row.try_get("sample_name")?,
            status: decode_code(row, "status")?,
        })
    }
}
