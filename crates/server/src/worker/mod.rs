// crates/server/src/worker/mod.rs
//! Cooperative scan worker.
//!
//! One spawned task per job, driving the `collecting → parsing →
//! upserting → completed` pipeline. Pause and cancel are honored at
//! checkpoints between work units — never mid-unit — by querying the
//! command processor for a pending signal. Parsing and upserting run
//! to completion once entered; a cancel issued during those phases is
//! picked up when the next phase advance is rejected.

pub mod parse;
pub mod sink;
pub mod source;

use std::sync::Arc;

use leakwatch_core::{JobCounters, JobEvent, JobRecord, Phase};
use leakwatch_store::ApplyOutcome;
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::commands::{CommandError, CommandProcessor, WorkerSignal};
use self::sink::RecordSink;
use self::source::CollectSource;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error(transparent)]
    Collect(#[from] source::CollectError),

    #[error(transparent)]
    Sink(#[from] sink::SinkError),

    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("invariant violation: {event} rejected in phase {phase}")]
    Invariant { phase: Phase, event: &'static str },
}

/// Everything a worker task needs, bundled for spawning.
#[derive(Clone)]
pub struct WorkerDeps {
    pub commands: Arc<CommandProcessor>,
    pub source: Arc<dyn CollectSource>,
    pub sink: Arc<dyn RecordSink>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Continue,
    Stop,
}

/// Spawn the worker task for a job.
pub fn spawn(deps: WorkerDeps, job: JobRecord) -> JoinHandle<()> {
    tokio::spawn(run(deps, job))
}

/// Run the pipeline to whatever end it reaches, recording failures.
pub async fn run(deps: WorkerDeps, job: JobRecord) {
    let id = job.id.clone();
    if let Err(e) = pipeline(&deps, &job).await {
        tracing::warn!(job_id = %id, error = %e, "scan job failed");
        if let Err(tick_err) = deps.commands.tick(&id, &JobEvent::Fail(e.to_string())) {
            tracing::error!(job_id = %id, error = %tick_err, "could not record job failure");
        }
    }
}

async fn pipeline(deps: &WorkerDeps, job: &JobRecord) -> Result<(), WorkerError> {
    let id = job.id.as_str();

    if checkpoint(deps, id)? == Step::Stop {
        return Ok(());
    }
    if advance(deps, id, JobEvent::AdvanceToCollecting)? == Step::Stop {
        return Ok(());
    }

    let mut counters = JobCounters::default();
    let mut raw_lines: Vec<String> = Vec::new();
    for unit in deps.source.units(&job.target) {
        if checkpoint(deps, id)? == Step::Stop {
            return Ok(());
        }
        let lines = deps.source.collect(&unit, job.time_filter).await?;
        counters.total_raw += lines.len() as u64;
        raw_lines.extend(lines);
        deps.commands.tick_counters(id, &counters)?;
        tracing::debug!(job_id = %id, unit = %unit, total_raw = counters.total_raw, "unit collected");
    }

    // Last pause/cancel boundary. Parsing and upserting run to the end.
    if checkpoint(deps, id)? == Step::Stop {
        return Ok(());
    }
    if advance(deps, id, JobEvent::AdvanceToParsing)? == Step::Stop {
        return Ok(());
    }

    let parsed = parse::parse_lines(&raw_lines);
    counters.total_parsed = parsed.parsed;
    deps.commands.tick_counters(id, &counters)?;

    if advance(deps, id, JobEvent::AdvanceToUpserting)? == Step::Stop {
        return Ok(());
    }
    let stats = deps.sink.upsert(id, &parsed.records).await?;
    counters.total_new = stats.new_records;
    counters.total_duplicates = stats.duplicates;
    deps.commands.tick_counters(id, &counters)?;

    if advance(deps, id, JobEvent::AdvanceToCompleted)? == Step::Stop {
        return Ok(());
    }

    tracing::info!(
        job_id = %id,
        total_raw = counters.total_raw,
        total_parsed = counters.total_parsed,
        total_new = counters.total_new,
        "scan job completed"
    );
    Ok(())
}

/// Query for a pending pause/cancel signal between work units.
fn checkpoint(deps: &WorkerDeps, id: &str) -> Result<Step, WorkerError> {
    match deps.commands.signal(id) {
        WorkerSignal::Continue => Ok(Step::Continue),
        WorkerSignal::Pause => {
            tracing::info!(job_id = %id, "pause honored at checkpoint");
            Ok(Step::Stop)
        }
        WorkerSignal::Cancel => {
            tracing::info!(job_id = %id, "cancel honored at checkpoint");
            match deps.commands.tick(id, &JobEvent::AdvanceToCancelled) {
                Ok(_) | Err(CommandError::NotFound(_)) => Ok(Step::Stop),
                Err(e) => Err(e.into()),
            }
        }
    }
}

/// Advance the pipeline one phase, honoring commands that slipped in
/// since the last checkpoint.
fn advance(deps: &WorkerDeps, id: &str, event: JobEvent) -> Result<Step, WorkerError> {
    match deps.commands.tick(id, &event)? {
        ApplyOutcome::Transitioned { .. } => Ok(Step::Continue),
        // already terminal: duplicate delivery, wind down quietly
        ApplyOutcome::Ignored { .. } => Ok(Step::Stop),
        ApplyOutcome::Rejected {
            phase: Phase::Cancelling,
        } => {
            // cancel arrived after the last checkpoint; drain now
            deps.commands.tick(id, &JobEvent::AdvanceToCancelled)?;
            Ok(Step::Stop)
        }
        ApplyOutcome::Rejected {
            phase: Phase::Paused,
        } => Ok(Step::Stop),
        ApplyOutcome::Rejected {
            phase: Phase::Collecting,
        } if event == JobEvent::AdvanceToCollecting => {
            // resumed job: the resume command already re-entered collecting
            Ok(Step::Continue)
        }
        ApplyOutcome::Rejected { phase } if outran_by_relaunch(&event, phase) => {
            // a relaunched worker already advanced this job past our
            // position; the superseded one yields
            tracing::debug!(job_id = %id, %phase, "superseded worker yielding");
            Ok(Step::Stop)
        }
        ApplyOutcome::Rejected { phase } => Err(WorkerError::Invariant {
            phase,
            event: event.name(),
        }),
    }
}

/// True when an advance was rejected because the job is already
/// further along the main pipeline than the phase this event advances
/// from — the signature of a relaunched worker having taken over.
fn outran_by_relaunch(event: &JobEvent, current: Phase) -> bool {
    let source_rank = match event {
        JobEvent::AdvanceToCollecting => 0,
        JobEvent::AdvanceToParsing => 1,
        JobEvent::AdvanceToUpserting => 2,
        JobEvent::AdvanceToCompleted => 3,
        _ => return false,
    };
    let current_rank = match current {
        Phase::Queued => 0,
        Phase::Collecting => 1,
        Phase::Parsing => 2,
        Phase::Upserting => 3,
        _ => return false,
    };
    current_rank > source_rank
}
