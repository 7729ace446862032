//! # Test Task Handlers

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::Value;

use super::{ensure_visible, json_body, query_params};
use crate::models::{TestTask, TestTaskFilter};
use crate::services::CreateTestTask;
use crate::state_machine::TestTaskStatus;
use crate::web::errors::ApiResult;
use crate::web::response::ApiResponse;
use crate::web::security::{require_permission, Caller, Permission};
use crate::web::state::AppState;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskBody {
    #[serde(alias = "workflow_id")]
    pub workflow_id: i64,
    #[serde(alias = "tester_id")]
    pub tester_id: i64,
    #[serde(default, alias = "test_items")]
    pub test_items: Vec<Value>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskQuery {
    pub workflow_id: Option<i64>,
    pub tester_id: Option<i64>,
    pub status: Option<TestTaskStatus>,
}

/// List test tasks: GET /tasks
pub async fn list_tasks(
    State(state): State<AppState>,
    caller: Caller,
    query: Result<Query<TaskQuery>, QueryRejection>,
) -> ApiResult<ApiResponse<Vec<TestTask>>> {
    require_permission(&caller, Permission::TasksList)?;
    let query = query_params(query)?;

    let filter = TestTaskFilter {
        workflow_id: query.workflow_id,
        tester_id: caller.scope().or(query.tester_id),
        status: query.status,
    };
    let tasks = state.tasks.list(&filter).await?;
    Ok(ApiResponse::ok(tasks))
}

/// Create test task: POST /tasks
pub async fn create_task(
    State(state): State<AppState>,
    caller: Caller,
    payload: Result<Json<CreateTaskBody>, JsonRejection>,
) -> ApiResult<ApiResponse<TestTask>> {
    require_permission(&caller, Permission::TasksCreate)?;
    let body = json_body(payload)?;

    let task = state
        .tasks
        .create(
            CreateTestTask {
                workflow_id: body.workflow_id,
                tester_id: body.tester_id,
                test_items: body.test_items,
                notes: body.notes,
            },
            caller.id(),
        )
        .await?;
    Ok(ApiResponse::created(task))
}

/// Get test task: GET /tasks/{id}
pub async fn get_task(
    State(state): State<AppState>,
    caller: Caller,
    Path(task_id): Path<i64>,
) -> ApiResult<ApiResponse<TestTask>> {
    require_permission(&caller, Permission::TasksRead)?;
    let task = visible_task(&state, &caller, task_id).await?;
    Ok(ApiResponse::ok(task))
}

/// Begin testing: POST /tasks/{id}/start
pub async fn start_task(
    State(state): State<AppState>,
    caller: Caller,
    Path(task_id): Path<i64>,
) -> ApiResult<ApiResponse<TestTask>> {
    require_permission(&caller, Permission::TasksStart)?;
    visible_task(&state, &caller, task_id).await?;

    let task = state.tasks.start(task_id, caller.id()).await?;
    Ok(ApiResponse::with_message(task, "task started"))
}

/// Finish testing: POST /tasks/{id}/complete
pub async fn complete_task(
    State(state): State<AppState>,
    caller: Caller,
    Path(task_id): Path<i64>,
) -> ApiResult<ApiResponse<TestTask>> {
    require_permission(&caller, Permission::TasksComplete)?;
    visible_task(&state, &caller, task_id).await?;

    let task = state.tasks.complete(task_id, caller.id()).await?;
    Ok(ApiResponse::with_message(task, "task completed"))
}

/// Withdraw a task: POST /tasks/{id}/cancel
pub async fn cancel_task(
    State(state): State<AppState>,
    caller: Caller,
    Path(task_id): Path<i64>,
) -> ApiResult<ApiResponse<TestTask>> {
    require_permission(&caller, Permission::TasksCancel)?;

    let task = state.tasks.cancel(task_id, caller.id()).await?;
    Ok(ApiResponse::with_message(task, "task cancelled"))
}

async fn visible_task(state: &AppState, caller: &Caller, task_id: i64) -> ApiResult<TestTask> {
    let task = state.tasks.get(task_id).await?;
    ensure_visible(caller, Some(task.tester_id), "test task", task_id)?;
    Ok(task)
}
