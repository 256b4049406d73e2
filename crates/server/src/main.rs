// crates/server/src/main.rs
//! Leakwatch orchestrator binary.
//!
//! Starts the Axum HTTP server. Collection sources are wired from the
//! environment: file parsing always works; intel-source scans require
//! `LEAKWATCH_INTEL_URL`.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use leakwatch_core::JobKind;
use leakwatch_server::state::AppState;
use leakwatch_server::worker::source::{CollectSource, FileSource, RemoteSource, SourceRegistry};
use leakwatch_server::worker::sink::MemorySink;
use leakwatch_server::create_app;
use leakwatch_store::MemoryStore;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Default port for the orchestrator.
const DEFAULT_PORT: u16 = 47311;

/// Upstream request timeout for intel-source fetches.
const INTEL_TIMEOUT: Duration = Duration::from_secs(30);

/// Get the server port from environment or use default.
fn get_port() -> u16 {
    std::env::var("LEAKWATCH_PORT")
        .ok()
        .or_else(|| std::env::var("PORT").ok())
        .and_then(|p| p.parse().ok())
        .unwrap_or(DEFAULT_PORT)
}

/// Base URL of the intelligence-source API, if configured.
fn get_intel_base_url() -> Option<String> {
    std::env::var("LEAKWATCH_INTEL_URL")
        .ok()
        .filter(|url| !url.trim().is_empty())
}

fn build_sources() -> SourceRegistry {
    let mut sources = SourceRegistry::new();
    sources.register(JobKind::FileParse, Arc::new(FileSource));

    match get_intel_base_url() {
        Some(base_url) => match RemoteSource::new(&base_url, INTEL_TIMEOUT) {
            Ok(remote) => {
                let remote: Arc<dyn CollectSource> = Arc::new(remote);
                sources.register(JobKind::SingleScan, remote.clone());
                sources.register(JobKind::BulkScan, remote.clone());
                sources.register(JobKind::Scheduled, remote);
                tracing::info!(base_url = %base_url, "intel source configured");
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to configure intel source; scan submissions will be rejected");
            }
        },
        None => {
            tracing::warn!("LEAKWATCH_INTEL_URL not set; only file-parse jobs will be accepted");
        }
    }

    sources
}

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    eprintln!("\nleakwatch v{}\n", env!("CARGO_PKG_VERSION"));

    let state = AppState::with_parts(
        Arc::new(MemoryStore::new()),
        build_sources(),
        Arc::new(MemorySink::new()),
    );
    let app = create_app(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], get_port()));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "leakwatch orchestrator listening");
    axum::serve(listener, app).await?;

    Ok(())
}
