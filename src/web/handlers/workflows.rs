//! # Workflow Handlers
//!
//! State transitions, assignment, listings and the static option lists used by
//! the front end's dropdowns.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::{debug, info};

use super::{ensure_visible, json_body, query_params};
use crate::models::{
    TransitionLogEntry, TransitionLogFilter, WorkflowFilter, WorkflowInstance, WorkflowOrdering,
};
use crate::services::{
    Assignment, CreateWorkflow, PriorityOption, StateOption, WorkflowDetail, WorkflowEngine,
    WorkflowOutcome,
};
use crate::state_machine::{ActionKind, Priority, WorkflowState};
use crate::web::errors::{ApiError, ApiResult};
use crate::web::response::ApiResponse;
use crate::web::security::{require_permission, Caller, Permission};
use crate::web::state::AppState;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionBody {
    #[serde(alias = "to_state")]
    pub to_state: WorkflowState,
    pub remarks: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignBody {
    #[serde(alias = "assignee_id")]
    pub assignee_id: i64,
    pub priority: Option<Priority>,
    #[serde(alias = "expected_completion_date")]
    pub expected_completion_date: Option<NaiveDate>,
    pub remarks: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateWorkflowBody {
    #[serde(alias = "sample_receipt_id")]
    pub sample_receipt_id: i64,
    pub priority: Option<Priority>,
    #[serde(alias = "expected_completion_date")]
    pub expected_completion_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorkflowQuery {
    pub state: Option<WorkflowState>,
    pub assignee_id: Option<i64>,
    pub priority: Option<Priority>,
    /// Receipt or commission code fragment
    pub search: Option<String>,
    /// `priority`, `expected_completion_date` or `created_at`, `-` for descending
    pub ordering: Option<WorkflowOrdering>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogQuery {
    pub workflow_id: Option<i64>,
    pub operator_id: Option<i64>,
    pub action: Option<ActionKind>,
}

/// List workflows: GET /workflows
pub async fn list_workflows(
    State(state): State<AppState>,
    caller: Caller,
    query: Result<Query<WorkflowQuery>, QueryRejection>,
) -> ApiResult<ApiResponse<Vec<WorkflowInstance>>> {
    require_permission(&caller, Permission::WorkflowsList)?;
    let query = query_params(query)?;

    let filter = WorkflowFilter {
        state: query.state,
        states: None,
        // Testers are pinned to their own assignments whatever they ask for
        assignee_id: caller.scope().or(query.assignee_id),
        priority: query.priority,
        search: query.search,
        ordering: query.ordering,
    };
    debug!(user_id = caller.id(), ?filter, "Listing workflows");

    let workflows = state.engine.list(&filter).await?;
    Ok(ApiResponse::ok(workflows))
}

/// Create workflow: POST /workflows
pub async fn create_workflow(
    State(state): State<AppState>,
    caller: Caller,
    payload: Result<Json<CreateWorkflowBody>, JsonRejection>,
) -> ApiResult<ApiResponse<WorkflowInstance>> {
    require_permission(&caller, Permission::WorkflowsCreate)?;
    let body = json_body(payload)?;

    let workflow = state
        .engine
        .create_for_receipt(
            CreateWorkflow {
                sample_receipt_id: body.sample_receipt_id,
                priority: body.priority,
                expected_completion_date: body.expected_completion_date,
                notes: body.notes,
            },
            caller.id(),
        )
        .await?;

    Ok(ApiResponse::created(workflow))
}

/// Get workflow with its transition history: GET /workflows/{id}
pub async fn get_workflow(
    State(state): State<AppState>,
    caller: Caller,
    Path(workflow_id): Path<i64>,
) -> ApiResult<ApiResponse<WorkflowDetail>> {
    require_permission(&caller, Permission::WorkflowsRead)?;

    let detail = state.engine.get(workflow_id).await?;
    ensure_visible(&caller, detail.workflow.assignee_id, "workflow", workflow_id)?;
    Ok(ApiResponse::ok(detail))
}

/// Soft-delete workflow: DELETE /workflows/{id}
pub async fn delete_workflow(
    State(state): State<AppState>,
    caller: Caller,
    Path(workflow_id): Path<i64>,
) -> ApiResult<ApiResponse<Option<()>>> {
    require_permission(&caller, Permission::WorkflowsDelete)?;

    state.engine.soft_delete(workflow_id, caller.id()).await?;
    Ok(ApiResponse::with_message(None, "deleted"))
}

/// Move a workflow to another state: POST /workflows/{id}/transition
pub async fn transition_workflow(
    State(state): State<AppState>,
    caller: Caller,
    Path(workflow_id): Path<i64>,
    payload: Result<Json<TransitionBody>, JsonRejection>,
) -> ApiResult<ApiResponse<WorkflowOutcome>> {
    require_permission(&caller, Permission::WorkflowsTransition)?;
    let body = json_body(payload)?;
    check_scope(&state, &caller, workflow_id).await?;

    let outcome = state
        .engine
        .transition(workflow_id, body.to_state, caller.id(), body.remarks)
        .await?;

    info!(
        workflow_id,
        user_id = caller.id(),
        to = %body.to_state,
        "Transition accepted"
    );
    let message = outcome.message.clone();
    Ok(ApiResponse::with_message(outcome, message))
}

/// Assign a workflow: POST /workflows/{id}/assign
pub async fn assign_workflow(
    State(state): State<AppState>,
    caller: Caller,
    Path(workflow_id): Path<i64>,
    payload: Result<Json<AssignBody>, JsonRejection>,
) -> ApiResult<ApiResponse<WorkflowOutcome>> {
    require_permission(&caller, Permission::WorkflowsAssign)?;
    let body = json_body(payload)?;

    let outcome = state
        .engine
        .assign(
            workflow_id,
            Assignment {
                assignee_id: body.assignee_id,
                priority: body.priority,
                expected_completion_date: body.expected_completion_date,
                remarks: body.remarks,
            },
            caller.id(),
        )
        .await?;

    let message = outcome.message.clone();
    Ok(ApiResponse::with_message(outcome, message))
}

/// The caller's open work: GET /workflows/my-tasks
pub async fn my_tasks(
    State(state): State<AppState>,
    caller: Caller,
) -> ApiResult<ApiResponse<Vec<WorkflowInstance>>> {
    require_permission(&caller, Permission::WorkflowsList)?;

    let workflows = state.engine.my_tasks(caller.id()).await?;
    Ok(ApiResponse::ok(workflows))
}

/// GET /workflows/status-options
pub async fn status_options(_caller: Caller) -> ApiResponse<Vec<StateOption>> {
    ApiResponse::ok(WorkflowEngine::status_options())
}

/// GET /workflows/priority-options
pub async fn priority_options(_caller: Caller) -> ApiResponse<Vec<PriorityOption>> {
    ApiResponse::ok(WorkflowEngine::priority_options())
}

/// Audit trail, newest first: GET /workflows/logs
pub async fn list_logs(
    State(state): State<AppState>,
    caller: Caller,
    query: Result<Query<LogQuery>, QueryRejection>,
) -> ApiResult<ApiResponse<Vec<TransitionLogEntry>>> {
    require_permission(&caller, Permission::LogsRead)?;
    let query = query_params(query)?;

    let filter = TransitionLogFilter {
        workflow_id: query.workflow_id,
        operator_id: query.operator_id,
        action: query.action,
    };
    let logs = state.engine.list_logs(&filter).await?;
    Ok(ApiResponse::ok(logs))
}

/// 404 unless the workflow exists and the caller may see it
async fn check_scope(state: &AppState, caller: &Caller, workflow_id: i64) -> ApiResult<()> {
    if caller.scope().is_none() {
        return Ok(());
    }
    let workflow = state
        .store
        .get_workflow(workflow_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("workflow {workflow_id} not found")))?;
    ensure_visible(caller, workflow.assignee_id, "workflow", workflow_id)
}
