// crates/server/src/routes/mod.rs
//! API route handlers for the leakwatch orchestrator.

pub mod health;
pub mod jobs;
pub mod scan;

use std::sync::Arc;

use axum::Router;

use crate::state::AppState;

/// Create the combined API router with all routes under /api prefix.
///
/// Routes:
/// - GET  /api/health - Health check
/// - GET  /api/jobs - List all visible jobs, newest first
/// - GET  /api/jobs/stream - SSE stream of job updates
/// - GET  /api/jobs/{id} - Get a single job record
/// - POST /api/jobs/{id}/pause - Pause a collecting job
/// - POST /api/jobs/{id}/resume - Resume a paused job
/// - POST /api/jobs/{id}/cancel - Request cooperative cancellation
/// - POST /api/scan/single - Submit a single-target scan
/// - POST /api/scan/bulk - Submit a multi-target scan
/// - POST /api/scan/file - Submit a dump-file parse
pub fn api_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .nest("/api", health::router())
        .nest("/api", jobs::router())
        .nest("/api", scan::router())
        .with_state(state)
}
