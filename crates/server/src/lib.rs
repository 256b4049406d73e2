// crates/server/src/lib.rs
//! Leakwatch orchestrator library.
//!
//! Axum-based HTTP server exposing scan-job submission, job lifecycle
//! commands (pause/resume/cancel) and the job list the reconciliation
//! poller consumes. Workers run as in-process tokio tasks driving the
//! collection pipeline cooperatively.

pub mod commands;
pub mod error;
pub mod routes;
pub mod state;
pub mod worker;

pub use error::{ApiError, ApiResult, ErrorResponse};
pub use routes::api_routes;
pub use state::AppState;

use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Create the Axum application with all routes and middleware.
///
/// This sets up:
/// - API routes (health, jobs, scan submission)
/// - CORS for development (allows any origin)
/// - Request tracing
pub fn create_app(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(api_routes(state))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
