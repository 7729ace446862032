//! # Web API
//!
//! axum router over the workflow engine and the test task service. Callers
//! are identified per request by [`security::Caller`]; every handler checks
//! one [`security::Permission`] before doing any work.

pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod response;
pub mod routes;
pub mod security;
pub mod state;

pub use errors::{ApiError, ApiResult};
pub use response::ApiResponse;
pub use security::{require_permission, Caller, Permission};
pub use state::AppState;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Build the application router with the standard middleware stack
pub fn create_app(app_state: AppState) -> Router {
    let request_timeout = app_state.config.server.request_timeout();

    let mut app = Router::new()
        .merge(routes::health_routes())
        .merge(routes::workflow_routes())
        .merge(routes::task_routes())
        .layer(axum::middleware::from_fn(middleware::add_request_id))
        .layer(TimeoutLayer::with_status_code(
            axum::http::StatusCode::REQUEST_TIMEOUT,
            request_timeout,
        ));

    if app_state.config.server.cors_enabled {
        app = app.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );
    }

    app.layer(TraceLayer::new_for_http()).with_state(app_state)
}
