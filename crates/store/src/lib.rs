// crates/store/src/lib.rs
//! The authoritative JobRecord store.
//!
//! [`JobStore`] is deliberately narrow — get, list, and an atomic
//! check-and-transition (`apply`) — so the state machine and command
//! processor never depend on a concrete storage technology. The
//! in-memory implementation here can be swapped for a durable store
//! without touching transition logic.

pub mod memory;

use leakwatch_core::{JobCounters, JobEvent, JobId, JobRecord, Phase};
use thiserror::Error;

pub use memory::MemoryStore;

/// Outcome of applying an event against a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The event moved the job to a new phase.
    Transitioned { from: Phase, to: Phase },
    /// Duplicate delivery (terminal job, repeated cancel); dropped.
    Ignored { phase: Phase },
    /// The pipeline edge does not exist. `phase` is what was current
    /// at evaluation time — under a race this is the winner's phase,
    /// never the caller's stale assumption.
    Rejected { phase: Phase },
}

/// Store-level failures.
///
/// Only `Unavailable` is fatal to the orchestrator (a service-health
/// signal); the in-memory store never produces it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("job not found: {0}")]
    NotFound(JobId),

    #[error("job already exists: {0}")]
    Duplicate(JobId),

    #[error("job store unavailable: {0}")]
    Unavailable(String),
}

/// Narrow interface over the shared job table.
///
/// `apply` and `record_counters` serialize per job id: check and
/// mutate happen as one unit with no read-then-write gap, so worker
/// ticks and operator commands cannot race each other. Operations on
/// different job ids never block each other.
pub trait JobStore: Send + Sync {
    /// Insert a freshly created record.
    fn insert(&self, record: JobRecord) -> Result<(), StoreError>;

    /// Snapshot one record.
    fn get(&self, id: &str) -> Result<Option<JobRecord>, StoreError>;

    /// Snapshot every record, newest first.
    fn list(&self) -> Result<Vec<JobRecord>, StoreError>;

    /// Atomically evaluate `event` against the job's current phase and
    /// apply the transition plus its entry side effects (`started_at`,
    /// `completed_at`, `error`).
    fn apply(&self, id: &str, event: &JobEvent) -> Result<ApplyOutcome, StoreError>;

    /// Merge a counter report monotonically. Returns `false` (and
    /// changes nothing) once the job is terminal — counters freeze at
    /// the terminal boundary.
    fn record_counters(&self, id: &str, counters: &JobCounters) -> Result<bool, StoreError>;
}
