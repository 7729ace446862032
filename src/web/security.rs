//! # Boundary Authorization
//!
//! Callers are identified by a trusted header set by the upstream
//! authentication gateway (`auth.user_header`, default `x-user-id`) and
//! resolved against the user directory. Each handler then checks one
//! [`Permission`] with [`require_permission`] before calling a service.
//!
//! Testers are additionally scoped to their own work: lists are narrowed to
//! their assignments and anything else they ask for by id answers 404.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

use super::errors::ApiError;
use super::state::AppState;
use crate::models::{Role, User};

/// Capabilities checked at the HTTP boundary, written `resource:action`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Permission {
    WorkflowsList,
    WorkflowsRead,
    WorkflowsCreate,
    WorkflowsDelete,
    WorkflowsTransition,
    WorkflowsAssign,
    LogsRead,
    TasksList,
    TasksRead,
    TasksCreate,
    TasksStart,
    TasksComplete,
    TasksCancel,
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WorkflowsList => "workflows:list",
            Self::WorkflowsRead => "workflows:read",
            Self::WorkflowsCreate => "workflows:create",
            Self::WorkflowsDelete => "workflows:delete",
            Self::WorkflowsTransition => "workflows:transition",
            Self::WorkflowsAssign => "workflows:assign",
            Self::LogsRead => "logs:read",
            Self::TasksList => "tasks:list",
            Self::TasksRead => "tasks:read",
            Self::TasksCreate => "tasks:create",
            Self::TasksStart => "tasks:start",
            Self::TasksComplete => "tasks:complete",
            Self::TasksCancel => "tasks:cancel",
        }
    }

    /// Whether `role` holds this permission
    pub fn granted_to(&self, role: Role) -> bool {
        use Role::*;

        match self {
            Self::WorkflowsList
            | Self::WorkflowsRead
            | Self::WorkflowsTransition
            | Self::TasksList
            | Self::TasksRead => role.is_lab_staff(),
            Self::WorkflowsCreate
            | Self::WorkflowsAssign
            | Self::TasksCreate
            | Self::TasksCancel => matches!(role, Admin | Receiver),
            Self::TasksStart | Self::TasksComplete => matches!(role, Admin | Tester),
            Self::WorkflowsDelete => role == Admin,
            Self::LogsRead => true,
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The authenticated, active user making the request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller(pub User);

impl Caller {
    pub fn id(&self) -> i64 {
        self.0.id
    }

    pub fn role(&self) -> Role {
        self.0.role
    }

    /// Assignee every query must be narrowed to, if any
    pub fn scope(&self) -> Option<i64> {
        (self.0.role == Role::Tester).then_some(self.0.id)
    }

    /// Whether a record assigned to `assignee_id` is visible to this caller
    pub fn can_see(&self, assignee_id: Option<i64>) -> bool {
        match self.scope() {
            Some(own) => assignee_id == Some(own),
            None => true,
        }
    }
}

impl FromRequestParts<AppState> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = state.config.auth.user_header.as_str();
        let user_id = parts
            .headers
            .get(header)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<i64>().ok())
            .ok_or(ApiError::Unauthorized)?;

        match state.store.find_user(user_id).await? {
            Some(user) if user.is_active => Ok(Caller(user)),
            Some(_) => {
                warn!(user_id, "Inactive user rejected");
                Err(ApiError::Unauthorized)
            }
            None => {
                warn!(user_id, "Unknown user rejected");
                Err(ApiError::Unauthorized)
            }
        }
    }
}

/// Check that the caller's role holds `perm`; 403 otherwise
pub fn require_permission(caller: &Caller, perm: Permission) -> Result<(), ApiError> {
    if perm.granted_to(caller.role()) {
        Ok(())
    } else {
        warn!(
            user_id = caller.id(),
            role = %caller.role(),
            required = %perm,
            "Permission denied"
        );
        Err(ApiError::Forbidden {
            message: format!("missing required permission: {perm}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caller(role: Role) -> Caller {
        Caller(User {
            id: 5,
            username: "someone".to_string(),
            role,
            is_active: true,
        })
    }

    #[test]
    fn test_assign_restricted_to_admin_and_receiver() {
        assert!(require_permission(&caller(Role::Admin), Permission::WorkflowsAssign).is_ok());
        assert!(require_permission(&caller(Role::Receiver), Permission::WorkflowsAssign).is_ok());
        assert!(require_permission(&caller(Role::Tester), Permission::WorkflowsAssign).is_err());
        assert!(require_permission(&caller(Role::Approver), Permission::WorkflowsAssign).is_err());
    }

    #[test]
    fn test_task_start_for_testers() {
        assert!(require_permission(&caller(Role::Tester), Permission::TasksStart).is_ok());
        assert!(require_permission(&caller(Role::Receiver), Permission::TasksStart).is_err());
        assert!(require_permission(&caller(Role::Receiver), Permission::TasksCancel).is_ok());
    }

    #[test]
    fn test_clients_only_read_logs() {
        let client = caller(Role::Client);
        assert!(require_permission(&client, Permission::LogsRead).is_ok());
        assert!(require_permission(&client, Permission::WorkflowsList).is_err());
        assert!(require_permission(&client, Permission::WorkflowsTransition).is_err());
    }

    #[test]
    fn test_only_admin_deletes() {
        for role in Role::ALL {
            assert_eq!(
                require_permission(&caller(role), Permission::WorkflowsDelete).is_ok(),
                role == Role::Admin
            );
        }
    }

    #[test]
    fn test_tester_scope() {
        let tester = caller(Role::Tester);
        assert_eq!(tester.scope(), Some(5));
        assert!(tester.can_see(Some(5)));
        assert!(!tester.can_see(Some(6)));
        assert!(!tester.can_see(None));

        let reviewer = caller(Role::Reviewer);
        assert_eq!(reviewer.scope(), None);
        assert!(reviewer.can_see(None));
    }

    #[test]
    fn test_permission_strings() {
        assert_eq!(Permission::WorkflowsTransition.to_string(), "workflows:transition");
        assert_eq!(Permission::TasksComplete.as_str(), "tasks:complete");
    }
}
