// crates/server/src/commands.rs
//! Command processor: validates pause/resume/cancel against the state
//! machine and applies them through the store's atomic path.
//!
//! Worker ticks go through the same `tick` entry point, so both
//! mutation paths share one per-job serialization primitive and cannot
//! race each other.

use std::sync::Arc;

use chrono::Utc;
use leakwatch_core::{JobCounters, JobEvent, Phase};
use leakwatch_store::{ApplyOutcome, JobStore, StoreError};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::broadcast;

/// Broadcast payload emitted after every applied mutation (phase
/// transition or counter tick). Consumed by the SSE stream.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobUpdate {
    pub job_id: String,
    pub phase: Phase,
    pub counters: JobCounters,
    pub timestamp: String,
}

/// Result of a successfully handled command.
///
/// `changed` is `false` for idempotent no-ops (cancelling an already
/// cancelling job, pausing an already paused or finished one).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandReceipt {
    pub job_id: String,
    pub phase: Phase,
    pub changed: bool,
}

/// Structured command rejections. Each carries the phase that was
/// current when the command was evaluated — under a race this is the
/// winner's phase, which is what the caller needs to reconcile.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("job not found: {0}")]
    NotFound(String),

    #[error("job is not pausable in phase {phase}")]
    NotPausable { phase: Phase },

    #[error("job is not paused (current phase: {phase})")]
    NotPaused { phase: Phase },

    #[error("job cannot be cancelled in phase {phase}")]
    NotCancellable { phase: Phase },

    #[error(transparent)]
    Store(StoreError),
}

impl CommandError {
    /// The phase a rejection refers to, when it carries one.
    pub fn phase(&self) -> Option<Phase> {
        match self {
            CommandError::NotPausable { phase }
            | CommandError::NotPaused { phase }
            | CommandError::NotCancellable { phase } => Some(*phase),
            _ => None,
        }
    }
}

/// Pending instruction a worker picks up at its next checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerSignal {
    Continue,
    Pause,
    Cancel,
}

pub struct CommandProcessor {
    store: Arc<dyn JobStore>,
    updates: broadcast::Sender<JobUpdate>,
}

impl CommandProcessor {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        let (updates, _) = broadcast::channel(256);
        Self { store, updates }
    }

    /// Subscribe to job updates (for SSE streaming).
    pub fn subscribe(&self) -> broadcast::Receiver<JobUpdate> {
        self.updates.subscribe()
    }

    /// Pause a job. Legal only while `collecting` — the one phase with
    /// a resumable suspension point in the worker loop. Pausing an
    /// already paused or finished job is an idempotent no-op.
    pub fn pause(&self, id: &str) -> Result<CommandReceipt, CommandError> {
        match self.apply(id, &JobEvent::Pause)? {
            ApplyOutcome::Transitioned { to, .. } => Ok(self.receipt(id, to, true)),
            ApplyOutcome::Ignored { phase } => Ok(self.receipt(id, phase, false)),
            ApplyOutcome::Rejected {
                phase: Phase::Paused,
            } => Ok(self.receipt(id, Phase::Paused, false)),
            ApplyOutcome::Rejected { phase } => Err(CommandError::NotPausable { phase }),
        }
    }

    /// Resume a paused job back into `collecting`. The caller is
    /// responsible for relaunching the worker afterwards.
    pub fn resume(&self, id: &str) -> Result<CommandReceipt, CommandError> {
        match self.apply(id, &JobEvent::Resume)? {
            ApplyOutcome::Transitioned { to, .. } => Ok(self.receipt(id, to, true)),
            ApplyOutcome::Ignored { phase } | ApplyOutcome::Rejected { phase } => {
                Err(CommandError::NotPaused { phase })
            }
        }
    }

    /// Request cooperative cancellation. Moves any non-terminal job to
    /// `cancelling` synchronously; the worker drains it to `cancelled`
    /// at its next checkpoint. Idempotent once cancelling or terminal.
    pub fn cancel(&self, id: &str) -> Result<CommandReceipt, CommandError> {
        match self.apply(id, &JobEvent::Cancel)? {
            ApplyOutcome::Transitioned { to, .. } => Ok(self.receipt(id, to, true)),
            ApplyOutcome::Ignored { phase } => Ok(self.receipt(id, phase, false)),
            ApplyOutcome::Rejected { phase } => {
                // the machine accepts cancel from every non-terminal
                // phase, so this edge should not exist
                tracing::error!(job_id = %id, %phase, "cancel rejected unexpectedly");
                Err(CommandError::NotCancellable { phase })
            }
        }
    }

    /// Worker tick callback: advance-phase events and `fail` go through
    /// here so they share the command path's serialization and
    /// broadcast behavior.
    pub fn tick(&self, id: &str, event: &JobEvent) -> Result<ApplyOutcome, CommandError> {
        self.apply(id, event)
    }

    /// Worker counter report. Merged monotonically; silently dropped
    /// once the job is terminal.
    pub fn tick_counters(
        &self,
        id: &str,
        counters: &JobCounters,
    ) -> Result<bool, CommandError> {
        match self.store.record_counters(id, counters) {
            Ok(changed) => {
                if changed {
                    self.publish(id);
                }
                Ok(changed)
            }
            Err(StoreError::NotFound(id)) => Err(CommandError::NotFound(id)),
            Err(e) => Err(CommandError::Store(e)),
        }
    }

    /// Checkpoint query issued by the worker between work units.
    ///
    /// A job that has disappeared from the store signals `Cancel` so a
    /// stray worker winds down instead of ticking into the void.
    pub fn signal(&self, id: &str) -> WorkerSignal {
        match self.store.get(id) {
            Ok(Some(job)) => match job.phase {
                Phase::Paused => WorkerSignal::Pause,
                Phase::Cancelling => WorkerSignal::Cancel,
                _ => WorkerSignal::Continue,
            },
            Ok(None) => WorkerSignal::Cancel,
            Err(e) => {
                tracing::error!(job_id = %id, error = %e, "signal query failed");
                WorkerSignal::Cancel
            }
        }
    }

    fn apply(&self, id: &str, event: &JobEvent) -> Result<ApplyOutcome, CommandError> {
        match self.store.apply(id, event) {
            Ok(outcome) => {
                if matches!(outcome, ApplyOutcome::Transitioned { .. }) {
                    self.publish(id);
                }
                Ok(outcome)
            }
            Err(StoreError::NotFound(id)) => Err(CommandError::NotFound(id)),
            Err(e) => Err(CommandError::Store(e)),
        }
    }

    fn receipt(&self, id: &str, phase: Phase, changed: bool) -> CommandReceipt {
        CommandReceipt {
            job_id: id.to_string(),
            phase,
            changed,
        }
    }

    fn publish(&self, id: &str) {
        if let Ok(Some(job)) = self.store.get(id) {
            // no subscribers is fine
            let _ = self.updates.send(JobUpdate {
                job_id: job.id,
                phase: job.phase,
                counters: job.counters,
                timestamp: Utc::now().to_rfc3339(),
            });
        }
    }
}
