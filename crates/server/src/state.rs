// crates/server/src/state.rs
//! Application state for the Axum server.

use std::sync::Arc;
use std::time::Instant;

use leakwatch_core::JobRecord;
use leakwatch_store::{JobStore, MemoryStore};

use crate::commands::CommandProcessor;
use crate::error::ApiError;
use crate::worker::sink::{MemorySink, RecordSink};
use crate::worker::source::{FileSource, SourceRegistry};
use crate::worker::{self, WorkerDeps};

/// Deterministic predicate deciding which jobs a caller may see.
///
/// Access control itself is an external collaborator; the server only
/// applies whatever filter it was handed before data leaves the store.
pub type VisibilityFilter = Arc<dyn Fn(&JobRecord) -> bool + Send + Sync>;

/// Shared application state accessible from all route handlers.
pub struct AppState {
    /// Server start time for uptime tracking.
    pub start_time: Instant,
    /// Authoritative job table.
    pub store: Arc<dyn JobStore>,
    /// Command processor; also the worker's tick/signal surface.
    pub commands: Arc<CommandProcessor>,
    /// Collection sources keyed by job kind.
    pub sources: SourceRegistry,
    /// Discovered-record sink shared by all workers.
    pub sink: Arc<dyn RecordSink>,
    /// Visibility scope applied to job listings.
    pub visibility: VisibilityFilter,
}

impl AppState {
    /// Create state with in-memory store and sink, file parsing wired,
    /// and an all-visible scope. Scan kinds get sources in `main` (or
    /// in tests) via [`AppState::with_parts`].
    pub fn new() -> Arc<Self> {
        let mut sources = SourceRegistry::new();
        sources.register(leakwatch_core::JobKind::FileParse, Arc::new(FileSource));
        Self::with_parts(
            Arc::new(MemoryStore::new()),
            sources,
            Arc::new(MemorySink::new()),
        )
    }

    /// Create state from externally-wired parts (used by `main` and by
    /// tests that inject scripted sources or stores).
    pub fn with_parts(
        store: Arc<dyn JobStore>,
        sources: SourceRegistry,
        sink: Arc<dyn RecordSink>,
    ) -> Arc<Self> {
        let commands = Arc::new(CommandProcessor::new(store.clone()));
        Arc::new(Self {
            start_time: Instant::now(),
            store,
            commands,
            sources,
            sink,
            visibility: Arc::new(|_| true),
        })
    }

    /// Get the server uptime in seconds.
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Spawn the cooperative worker for a job, resolving its source by
    /// kind. Fails if no source is registered for that kind.
    pub fn launch(&self, job: &JobRecord) -> Result<(), ApiError> {
        let source = self.sources.get(job.kind).ok_or_else(|| {
            ApiError::SourceUnavailable(format!("no collection source for {:?} jobs", job.kind))
        })?;
        let deps = WorkerDeps {
            commands: self.commands.clone(),
            source,
            sink: self.sink.clone(),
        };
        worker::spawn(deps, job.clone());
        Ok(())
    }
}
