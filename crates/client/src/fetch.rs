// crates/client/src/fetch.rs
//! Job list fetching boundary.
//!
//! `phase` and `kind` stay plain strings on this side of the wire: a
//! newer orchestrator may ship phases this build has never heard of,
//! and deserialization must not be the thing that breaks first.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use leakwatch_core::JobCounters;
use serde::Deserialize;
use thiserror::Error;

/// One fetched job record, as the orchestrator serialized it.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSummary {
    pub id: String,
    pub kind: String,
    #[serde(default)]
    pub name: Option<String>,
    pub target: String,
    #[serde(default)]
    pub time_filter: Option<String>,
    pub phase: String,
    #[serde(default)]
    pub counters: JobCounters,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("fetch failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server returned status {status}")]
    Status { status: u16 },
}

/// Fetch boundary the poller runs against.
#[async_trait]
pub trait JobsApi: Send + Sync {
    /// Fetch every job visible to this observer.
    async fn fetch_jobs(&self) -> Result<Vec<JobSummary>, FetchError>;
}

/// HTTP implementation against the orchestrator's `/api/jobs`.
pub struct HttpJobsApi {
    client: reqwest::Client,
    base_url: String,
}

/// Bound on a single fetch; a hung request counts as a failed poll.
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

impl HttpJobsApi {
    pub fn new(base_url: impl Into<String>) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder().timeout(FETCH_TIMEOUT).build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { client, base_url })
    }
}

#[async_trait]
impl JobsApi for HttpJobsApi {
    async fn fetch_jobs(&self) -> Result<Vec<JobSummary>, FetchError> {
        let response = self
            .client
            .get(format!("{}/api/jobs", self.base_url))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(FetchError::Status {
                status: response.status().as_u16(),
            });
        }
        Ok(response.json::<Vec<JobSummary>>().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_fetch_jobs_parses_records() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/jobs")
            .with_header("content-type", "application/json")
            .with_body(
                r#"[{
                    "id": "job-1",
                    "kind": "single_scan",
                    "target": "example.com",
                    "phase": "collecting",
                    "counters": {"totalRaw": 100, "totalParsed": 40, "totalNew": 0, "totalDuplicates": 0},
                    "createdAt": "2026-08-01T12:00:00Z",
                    "startedAt": "2026-08-01T12:00:03Z"
                }]"#,
            )
            .create_async()
            .await;

        let api = HttpJobsApi::new(server.url()).unwrap();
        let jobs = api.fetch_jobs().await.unwrap();

        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].id, "job-1");
        assert_eq!(jobs[0].phase, "collecting");
        assert_eq!(jobs[0].counters.total_raw, 100);
        assert!(jobs[0].completed_at.is_none());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_fetch_jobs_tolerates_empty_set() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/jobs")
            .with_header("content-type", "application/json")
            .with_body("[]")
            .create_async()
            .await;

        let api = HttpJobsApi::new(server.url()).unwrap();
        assert!(api.fetch_jobs().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_jobs_tolerates_unknown_phase_values() {
        // a record from a newer worker build must not fail the batch
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/jobs")
            .with_header("content-type", "application/json")
            .with_body(
                r#"[{
                    "id": "job-2",
                    "kind": "quantum_scan",
                    "target": "example.com",
                    "phase": "sharding",
                    "createdAt": "2026-08-01T12:00:00Z"
                }]"#,
            )
            .create_async()
            .await;

        let api = HttpJobsApi::new(server.url()).unwrap();
        let jobs = api.fetch_jobs().await.unwrap();
        assert_eq!(jobs[0].phase, "sharding");
        assert_eq!(jobs[0].counters, JobCounters::default());
    }

    #[tokio::test]
    async fn test_non_success_status_is_fetch_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/jobs")
            .with_status(502)
            .create_async()
            .await;

        let api = HttpJobsApi::new(server.url()).unwrap();
        let err = api.fetch_jobs().await.unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 502 }));
    }
}
