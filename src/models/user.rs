use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::{FromRow, Row};
use std::fmt;

use super::decode_code;
use crate::state_machine::ParseStateError;

/// Laboratory role attached to each user account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Receiver,
    Tester,
    Reviewer,
    Approver,
    Client,
}

impl Role {
    pub const ALL: [Role; 6] = [
        Self::Admin,
        Self::Receiver,
        Self::Tester,
        Self::Reviewer,
        Self::Approver,
        Self::Client,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Receiver => "receiver",
            Self::Tester => "tester",
            Self::Reviewer => "reviewer",
            Self::Approver => "approver",
            Self::Client => "client",
        }
    }

    /// Staff working inside the laboratory (everyone but clients)
    pub fn is_lab_staff(&self) -> bool {
        !matches!(self, Self::Client)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = ParseStateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| ParseStateError::new("role", s))
    }
}

/// A user from the directory. The workflow core only looks users up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub role: Role,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl FromRow<'_, PgRow> for User {
    fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            username: row.try_get("username")?,
            role: decode_code(row, "role")?,
            is_active: row.try_get("is_active")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_codes() {
        assert_eq!("approver".parse::<Role>().unwrap(), Role::Approver);
        assert!("superuser".parse::<Role>().is_err());
        assert!(Role::Tester.is_lab_staff());
        assert!(!Role::Client.is_lab_staff());
    }

    #[test]
    fn test_user_defaults_to_active() {
        let user: User =
            serde_json::from_str(r#"{"id": 1, "username": "li", "role": "tester"}"#).unwrap();
        assert!(user.is_active);
    }
}
