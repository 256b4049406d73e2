// crates/server/tests/jobs_api.rs
//! End-to-end tests: submission through the HTTP API, worker pipeline,
//! lifecycle commands, and the client poller reconciling against a
//! live server.

use std::io::Write;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use leakwatch_client::{HttpJobsApi, JobsApi, Poller};
use leakwatch_core::{DisplayStatus, JobKind, TimeFilter};
use leakwatch_server::worker::sink::MemorySink;
use leakwatch_server::worker::source::{CollectError, CollectSource, FileSource, SourceRegistry};
use leakwatch_server::{create_app, AppState};
use leakwatch_store::MemoryStore;

/// Source that parks on a semaphore before each unit, so tests can
/// interleave lifecycle commands with collection deterministically.
struct GatedSource {
    gate: Arc<tokio::sync::Semaphore>,
    units: usize,
}

#[async_trait]
impl CollectSource for GatedSource {
    fn units(&self, _target: &str) -> Vec<String> {
        (0..self.units).map(|i| format!("unit-{i}")).collect()
    }

    async fn collect(
        &self,
        unit: &str,
        _time_filter: Option<TimeFilter>,
    ) -> Result<Vec<String>, CollectError> {
        let permit = self.gate.acquire().await.expect("gate open");
        permit.forget();
        Ok(vec![format!("https://{unit}.example/login:alice:pw")])
    }
}

fn state_with_gated_scan(gate: Arc<tokio::sync::Semaphore>, units: usize) -> Arc<AppState> {
    let mut sources = SourceRegistry::new();
    sources.register(JobKind::FileParse, Arc::new(FileSource));
    sources.register(JobKind::SingleScan, Arc::new(GatedSource { gate, units }));
    AppState::with_parts(
        Arc::new(MemoryStore::new()),
        sources,
        Arc::new(MemorySink::new()),
    )
}

/// Bind the app on an ephemeral port and serve it in the background.
async fn serve(app: Router) -> (SocketAddr, tokio::task::JoinHandle<()>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, handle)
}

async fn get_json(client: &reqwest::Client, url: &str) -> (u16, serde_json::Value) {
    let response = client.get(url).send().await.unwrap();
    let status = response.status().as_u16();
    let json = response.json().await.unwrap_or(serde_json::Value::Null);
    (status, json)
}

async fn post_json(
    client: &reqwest::Client,
    url: &str,
    body: serde_json::Value,
) -> (u16, serde_json::Value) {
    let response = client.post(url).json(&body).send().await.unwrap();
    let status = response.status().as_u16();
    let json = response.json().await.unwrap_or(serde_json::Value::Null);
    (status, json)
}

/// Poll the job endpoint until it reports `phase` (or panic after ~5s).
async fn wait_for_phase(
    client: &reqwest::Client,
    base: &str,
    id: &str,
    phase: &str,
) -> serde_json::Value {
    for _ in 0..500 {
        let (status, json) = get_json(client, &format!("{base}/api/jobs/{id}")).await;
        assert_eq!(status, 200, "job {id} disappeared while waiting");
        if json["phase"] == phase {
            return json;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {id} never reached phase {phase}");
}

#[tokio::test]
async fn test_file_scan_runs_to_completion() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "https://a.example/login:alice:hunter2").unwrap();
    writeln!(file, "bob@b.example:pw2").unwrap();
    writeln!(file, "total garbage").unwrap();
    let path = file.path().to_str().unwrap().to_string();

    let (addr, _server) = serve(create_app(AppState::new())).await;
    let base = format!("http://{addr}");
    let client = reqwest::Client::new();

    let (status, created) = post_json(
        &client,
        &format!("{base}/api/scan/file"),
        serde_json::json!({ "path": path, "name": "nightly dump" }),
    )
    .await;
    assert_eq!(status, 202);
    let id = created["jobId"].as_str().unwrap().to_string();

    let job = wait_for_phase(&client, &base, &id, "completed").await;
    assert_eq!(job["counters"]["totalRaw"], 3);
    assert_eq!(job["counters"]["totalParsed"], 2);
    assert_eq!(job["counters"]["totalNew"], 2);
    assert_eq!(job["name"], "nightly dump");
    assert!(job["startedAt"].is_string());
    assert!(job["completedAt"].is_string());

    // commands against the finished job: pause/cancel no-op, resume 409
    let (status, receipt) =
        post_json(&client, &format!("{base}/api/jobs/{id}/pause"), serde_json::json!({})).await;
    assert_eq!(status, 200);
    assert_eq!(receipt["changed"], false);

    let (status, receipt) =
        post_json(&client, &format!("{base}/api/jobs/{id}/cancel"), serde_json::json!({})).await;
    assert_eq!(status, 200);
    assert_eq!(receipt["changed"], false);

    let (status, rejection) =
        post_json(&client, &format!("{base}/api/jobs/{id}/resume"), serde_json::json!({})).await;
    assert_eq!(status, 409);
    assert_eq!(rejection["phase"], "completed");
}

#[tokio::test]
async fn test_pause_resume_cancel_lifecycle_over_http() {
    let gate = Arc::new(tokio::sync::Semaphore::new(0));
    let state = state_with_gated_scan(gate.clone(), 2);
    let (addr, _server) = serve(create_app(state)).await;
    let base = format!("http://{addr}");
    let client = reqwest::Client::new();

    let (status, created) = post_json(
        &client,
        &format!("{base}/api/scan/single"),
        serde_json::json!({ "query": "example.com", "timeFilter": "D7" }),
    )
    .await;
    assert_eq!(status, 202);
    let id = created["jobId"].as_str().unwrap().to_string();

    // worker parks inside the first unit
    wait_for_phase(&client, &base, &id, "collecting").await;

    let (status, receipt) =
        post_json(&client, &format!("{base}/api/jobs/{id}/pause"), serde_json::json!({})).await;
    assert_eq!(status, 200);
    assert_eq!(receipt["phase"], "paused");
    assert_eq!(receipt["changed"], true);

    // release the in-flight unit; the worker stops at the boundary
    gate.add_permits(1);
    wait_for_phase(&client, &base, &id, "paused").await;

    // resume relaunches the pipeline (re-collects both units)
    gate.add_permits(2);
    let (status, receipt) =
        post_json(&client, &format!("{base}/api/jobs/{id}/resume"), serde_json::json!({})).await;
    assert_eq!(status, 200);
    assert_eq!(receipt["phase"], "collecting");

    let job = wait_for_phase(&client, &base, &id, "completed").await;
    assert!(job["counters"]["totalRaw"].as_u64().unwrap() >= 2);
}

#[tokio::test]
async fn test_cancel_drains_cooperatively_over_http() {
    let gate = Arc::new(tokio::sync::Semaphore::new(0));
    let state = state_with_gated_scan(gate.clone(), 3);
    let (addr, _server) = serve(create_app(state)).await;
    let base = format!("http://{addr}");
    let client = reqwest::Client::new();

    let (_, created) = post_json(
        &client,
        &format!("{base}/api/scan/single"),
        serde_json::json!({ "query": "example.com" }),
    )
    .await;
    let id = created["jobId"].as_str().unwrap().to_string();
    wait_for_phase(&client, &base, &id, "collecting").await;

    // cancel lands while the worker is mid-unit: synchronous cancelling
    let (status, receipt) =
        post_json(&client, &format!("{base}/api/jobs/{id}/cancel"), serde_json::json!({})).await;
    assert_eq!(status, 200);
    assert_eq!(receipt["phase"], "cancelling");

    // the worker honors it at the next unit boundary
    gate.add_permits(1);
    let job = wait_for_phase(&client, &base, &id, "cancelled").await;
    assert!(job["completedAt"].is_string());
}

#[tokio::test]
async fn test_poller_reconciles_and_survives_server_loss() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    for i in 0..3 {
        writeln!(file, "https://site-{i}.example/login:user{i}:pw{i}").unwrap();
    }
    let path = file.path().to_str().unwrap().to_string();

    let (addr, server) = serve(create_app(AppState::new())).await;
    let base = format!("http://{addr}");
    let client = reqwest::Client::new();

    // three jobs: all complete quickly
    let mut ids = Vec::new();
    for _ in 0..3 {
        let (_, created) = post_json(
            &client,
            &format!("{base}/api/scan/file"),
            serde_json::json!({ "path": path }),
        )
        .await;
        ids.push(created["jobId"].as_str().unwrap().to_string());
    }
    for id in &ids {
        wait_for_phase(&client, &base, id, "completed").await;
    }

    let api: Arc<dyn JobsApi> = Arc::new(HttpJobsApi::new(&base).unwrap());
    let poller = Poller::attach(api, Duration::from_millis(50));

    // wait until the poller has reconciled all three jobs
    let mut synced = false;
    for _ in 0..100 {
        let snapshot = poller.snapshot();
        if snapshot.jobs.len() == 3 && !snapshot.stale {
            assert!(snapshot
                .jobs
                .iter()
                .all(|j| j.display_status == DisplayStatus::Completed
                    && j.display_progress == 100));
            synced = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(synced, "poller never reconciled the job set");

    // kill the server: polls fail, snapshot goes stale but keeps jobs
    server.abort();
    let mut stale = false;
    for _ in 0..200 {
        let snapshot = poller.snapshot();
        if snapshot.stale {
            assert_eq!(snapshot.jobs.len(), 3, "stale snapshot must keep its jobs");
            stale = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(stale, "poller never flagged the snapshot stale");

    poller.detach();
}
