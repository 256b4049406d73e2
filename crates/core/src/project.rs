// crates/core/src/project.rs
//! Display projection: maps authoritative phase + counters to what an
//! observer renders.
//!
//! Progress values are fixed per phase. They indicate pipeline
//! position, not completion fraction — collection time dominates and
//! is unbounded, so a counter-proportional bar would sit at 99% for
//! minutes. Keep the checkpoints.

use serde::{Deserialize, Serialize};

use crate::phase::Phase;
use crate::record::JobCounters;

/// Coarse classification for consumers that do not need every phase
/// distinguished (`queued` collapses to pending, as does anything this
/// build does not recognize).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayStatus {
    Pending,
    Collecting,
    Parsing,
    Upserting,
    Paused,
    Cancelling,
    Completed,
    Cancelled,
    Failed,
}

/// Client-facing view of a single job's progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Projection {
    pub display_status: DisplayStatus,
    /// 0–100 pipeline-position indicator.
    pub display_progress: u8,
    /// Collected-but-unparsed count, clamped at zero.
    pub unparsed: u64,
}

/// Project a wire phase string and counters into display state.
///
/// Total and deterministic: an unrecognized phase (from a newer worker
/// build) degrades to `(pending, 0)` with a warning-level signal
/// instead of failing the caller.
pub fn project(phase: &str, counters: &JobCounters) -> Projection {
    let (display_status, display_progress) = match Phase::parse(phase) {
        Some(Phase::Queued) => (DisplayStatus::Pending, 0),
        Some(Phase::Collecting) => (DisplayStatus::Collecting, 25),
        Some(Phase::Parsing) => (DisplayStatus::Parsing, 60),
        Some(Phase::Upserting) => (DisplayStatus::Upserting, 85),
        Some(Phase::Completed) => (DisplayStatus::Completed, 100),
        Some(Phase::Paused) => (DisplayStatus::Paused, 0),
        Some(Phase::Cancelling) => (DisplayStatus::Cancelling, 0),
        Some(Phase::Cancelled) => (DisplayStatus::Cancelled, 0),
        Some(Phase::Failed) => (DisplayStatus::Failed, 0),
        None => {
            tracing::warn!(phase, "unrecognized job phase, projecting as pending");
            (DisplayStatus::Pending, 0)
        }
    };

    Projection {
        display_status,
        display_progress,
        unparsed: counters.unparsed(),
    }
}
