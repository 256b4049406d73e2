// crates/server/src/routes/jobs.rs
//! API routes for job inspection and lifecycle commands.
//!
//! - GET  /jobs — full visible job list, newest first
//! - GET  /jobs/stream — SSE stream of job updates
//! - GET  /jobs/{id} — single record
//! - POST /jobs/{id}/pause|resume|cancel — lifecycle commands

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::sse::{Event, Sse};
use axum::routing::{get, post};
use axum::{Json, Router};
use leakwatch_core::JobRecord;
use leakwatch_store::JobStore;

use crate::commands::CommandReceipt;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// GET /api/jobs — every job visible to the caller.
///
/// The whole set is returned on every call; observers reconcile by
/// wholesale replacement, so there is no pagination cursor to lose.
async fn list_jobs(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<JobRecord>>> {
    let jobs = state
        .store
        .list()?
        .into_iter()
        .filter(|job| (state.visibility)(job))
        .collect();
    Ok(Json(jobs))
}

/// GET /api/jobs/{id} — one record.
async fn get_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<JobRecord>> {
    match state.store.get(&id)? {
        Some(job) if (state.visibility)(&job) => Ok(Json(job)),
        _ => Err(ApiError::JobNotFound(id)),
    }
}

/// POST /api/jobs/{id}/pause
async fn pause_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<CommandReceipt>> {
    Ok(Json(state.commands.pause(&id)?))
}

/// POST /api/jobs/{id}/resume — re-enters collecting and relaunches
/// the worker, which re-collects from the start.
async fn resume_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<CommandReceipt>> {
    let receipt = state.commands.resume(&id)?;
    if receipt.changed {
        if let Some(job) = state.store.get(&id)? {
            state.launch(&job)?;
        }
    }
    Ok(Json(receipt))
}

/// POST /api/jobs/{id}/cancel
async fn cancel_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<CommandReceipt>> {
    Ok(Json(state.commands.cancel(&id)?))
}

/// GET /api/jobs/stream — SSE stream of all job updates.
async fn stream_jobs(
    State(state): State<Arc<AppState>>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>> {
    let rx = state.commands.subscribe();

    let stream = async_stream::stream! {
        let mut rx = rx;
        while let Ok(update) = rx.recv().await {
            let json = serde_json::to_string(&update).unwrap_or_default();
            yield Ok(Event::default().data(json));
        }
    };

    Sse::new(stream)
}

/// Build the jobs router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/jobs", get(list_jobs))
        .route("/jobs/stream", get(stream_jobs))
        .route("/jobs/{id}", get(get_job))
        .route("/jobs/{id}/pause", post(pause_job))
        .route("/jobs/{id}/resume", post(resume_job))
        .route("/jobs/{id}/cancel", post(cancel_job))
}
