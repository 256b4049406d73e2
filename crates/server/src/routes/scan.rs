// crates/server/src/routes/scan.rs
//! Scan submission routes. Each creates a queued job record and
//! launches its cooperative worker.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use leakwatch_core::{JobKind, JobRecord, Phase, TimeFilter};
use leakwatch_store::JobStore;
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SingleScanRequest {
    pub query: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub time_filter: Option<TimeFilter>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkScanRequest {
    pub targets: Vec<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub time_filter: Option<TimeFilter>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileScanRequest {
    /// Server-local path of an already-uploaded dump file.
    pub path: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobCreatedResponse {
    pub job_id: String,
    pub phase: Phase,
    pub message: String,
}

/// POST /api/scan/single — one query against the intel source.
async fn scan_single(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SingleScanRequest>,
) -> ApiResult<(StatusCode, Json<JobCreatedResponse>)> {
    let query = request.query.trim();
    if query.is_empty() {
        return Err(ApiError::BadRequest("query must not be empty".into()));
    }

    let job = JobRecord::new(JobKind::SingleScan, query)
        .with_name(request.name)
        .with_time_filter(request.time_filter);
    submit(&state, job)
}

/// POST /api/scan/bulk — several targets, one work unit each.
async fn scan_bulk(
    State(state): State<Arc<AppState>>,
    Json(request): Json<BulkScanRequest>,
) -> ApiResult<(StatusCode, Json<JobCreatedResponse>)> {
    let targets: Vec<&str> = request
        .targets
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .collect();
    if targets.is_empty() {
        return Err(ApiError::BadRequest("targets must not be empty".into()));
    }

    let job = JobRecord::new(JobKind::BulkScan, targets.join(","))
        .with_name(request.name)
        .with_time_filter(request.time_filter);
    submit(&state, job)
}

/// POST /api/scan/file — parse an already-obtained dump file.
async fn scan_file(
    State(state): State<Arc<AppState>>,
    Json(request): Json<FileScanRequest>,
) -> ApiResult<(StatusCode, Json<JobCreatedResponse>)> {
    let path = request.path.trim();
    if path.is_empty() {
        return Err(ApiError::BadRequest("path must not be empty".into()));
    }
    if !tokio::fs::try_exists(path).await.unwrap_or(false) {
        return Err(ApiError::BadRequest(format!("file not found: {path}")));
    }

    let job = JobRecord::new(JobKind::FileParse, path).with_name(request.name);
    submit(&state, job)
}

/// Insert the record and launch its worker. The source registration is
/// checked before anything is persisted, so a rejected submission
/// never leaves a stranded queued job behind.
fn submit(
    state: &Arc<AppState>,
    job: JobRecord,
) -> ApiResult<(StatusCode, Json<JobCreatedResponse>)> {
    if state.sources.get(job.kind).is_none() {
        return Err(ApiError::SourceUnavailable(format!(
            "no collection source for {:?} jobs",
            job.kind
        )));
    }

    state.store.insert(job.clone())?;
    state.launch(&job)?;
    tracing::info!(job_id = %job.id, kind = ?job.kind, target = %job.target, "scan job created");

    Ok((
        StatusCode::ACCEPTED,
        Json(JobCreatedResponse {
            job_id: job.id,
            phase: Phase::Queued,
            message: format!("scan job created for target: {}", job.target),
        }),
    ))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/scan/single", post(scan_single))
        .route("/scan/bulk", post(scan_bulk))
        .route("/scan/file", post(scan_file))
}
