//! Request handlers, grouped by resource.
//!
//! Every handler resolves the [`Caller`], checks one permission, applies
//! tester scoping where records carry an assignee, then calls a service.

pub mod health;
pub mod tasks;
pub mod workflows;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::Query;
use axum::Json;

use super::errors::{ApiError, ApiResult};
use super::security::Caller;

/// Turn axum's body rejection into our 400 envelope
pub(crate) fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> ApiResult<T> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| ApiError::bad_request(rejection.body_text()))
}

pub(crate) fn query_params<T>(query: Result<Query<T>, QueryRejection>) -> ApiResult<T> {
    query
        .map(|Query(params)| params)
        .map_err(|rejection| ApiError::bad_request(rejection.body_text()))
}

/// Testers only see records assigned to them; anything else is reported missing
pub(crate) fn ensure_visible(
    caller: &Caller,
    assignee_id: Option<i64>,
    entity: &str,
    id: i64,
) -> ApiResult<()> {
    if caller.can_see(assignee_id) {
        Ok(())
    } else {
        Err(ApiError::not_found(format!("{entity} {id} not found")))
    }
}
