//! # Route Definitions
//!
//! Routes are grouped per resource. Literal segments under `/workflows` are
//! registered next to `/workflows/{id}`; axum prefers the static match.

use axum::routing::{get, post};
use axum::Router;

use super::handlers;
use super::state::AppState;

/// Health probe, no caller identity required
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(handlers::health::health))
}

pub fn workflow_routes() -> Router<AppState> {
    use handlers::workflows::*;

    Router::new()
        .route("/workflows", get(list_workflows).post(create_workflow))
        .route("/workflows/my-tasks", get(my_tasks))
        .route("/workflows/status-options", get(status_options))
        .route("/workflows/priority-options", get(priority_options))
        .route("/workflows/logs", get(list_logs))
        .route("/workflows/{id}", get(get_workflow).delete(delete_workflow))
        .route("/workflows/{id}/transition", post(transition_workflow))
        .route("/workflows/{id}/assign", post(assign_workflow))
}

pub fn task_routes() -> Router<AppState> {
    use handlers::tasks::*;

    Router::new()
        .route("/tasks", get(list_tasks).post(create_task))
        .route("/tasks/{id}", get(get_task))
        .route("/tasks/{id}/start", post(start_task))
        .route("/tasks/{id}/complete", post(complete_task))
        .route("/tasks/{id}/cancel", post(cancel_task))
}
