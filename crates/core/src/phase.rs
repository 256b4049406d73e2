// crates/core/src/phase.rs
//! Job lifecycle phases and the pure transition function.
//!
//! The pipeline is `queued → collecting → parsing → upserting →
//! completed`, with `paused` reachable only from `collecting`, and
//! `cancelling → cancelled` reachable from every non-terminal phase.
//! `completed`, `cancelled` and `failed` are terminal.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Authoritative pipeline position of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Queued,
    Collecting,
    Parsing,
    Upserting,
    Paused,
    Cancelling,
    Completed,
    Cancelled,
    Failed,
}

impl Phase {
    /// Terminal phases have no outgoing transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Completed | Phase::Cancelled | Phase::Failed)
    }

    /// Wire representation, matching the serde rename.
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Queued => "queued",
            Phase::Collecting => "collecting",
            Phase::Parsing => "parsing",
            Phase::Upserting => "upserting",
            Phase::Paused => "paused",
            Phase::Cancelling => "cancelling",
            Phase::Completed => "completed",
            Phase::Cancelled => "cancelled",
            Phase::Failed => "failed",
        }
    }

    /// Parse a wire phase string.
    ///
    /// Returns `None` for values this build does not know about — a
    /// newer worker may report phases that did not exist when this
    /// binary was compiled, and callers must degrade instead of erroring.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(Phase::Queued),
            "collecting" => Some(Phase::Collecting),
            "parsing" => Some(Phase::Parsing),
            "upserting" => Some(Phase::Upserting),
            "paused" => Some(Phase::Paused),
            "cancelling" => Some(Phase::Cancelling),
            "completed" => Some(Phase::Completed),
            "cancelled" => Some(Phase::Cancelled),
            "failed" => Some(Phase::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Events that may be applied against a job's phase.
///
/// Worker events advance the pipeline one step at a time; command
/// events come from an operator via the command processor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobEvent {
    AdvanceToCollecting,
    AdvanceToParsing,
    AdvanceToUpserting,
    AdvanceToCompleted,
    AdvanceToCancelled,
    Fail(String),
    Pause,
    Resume,
    Cancel,
}

impl JobEvent {
    /// Short event name for logs and rejection messages.
    pub fn name(&self) -> &'static str {
        match self {
            JobEvent::AdvanceToCollecting => "advance-to-collecting",
            JobEvent::AdvanceToParsing => "advance-to-parsing",
            JobEvent::AdvanceToUpserting => "advance-to-upserting",
            JobEvent::AdvanceToCompleted => "advance-to-completed",
            JobEvent::AdvanceToCancelled => "advance-to-cancelled",
            JobEvent::Fail(_) => "fail",
            JobEvent::Pause => "pause",
            JobEvent::Resume => "resume",
            JobEvent::Cancel => "cancel",
        }
    }
}

/// Successful outcome of [`transition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The event moves the job to a new phase.
    Next(Phase),
    /// The event is a duplicate delivery (terminal job, or cancel while
    /// already cancelling) and is dropped without error.
    Ignored,
}

/// An event arrived for a pipeline edge that does not exist.
///
/// This is a structured rejection, not a fault: the caller gets the
/// phase that was current at evaluation time and reconciles.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{event} is not a legal transition from phase {from}")]
pub struct IllegalTransition {
    pub from: Phase,
    pub event: &'static str,
}

/// Compute the next phase for `event` against `current`.
///
/// Rules:
/// - terminal phases ignore every event (duplicate delivery tolerance)
/// - `Fail` wins from any non-terminal phase
/// - worker advances are accepted only from the immediately preceding
///   phase; anything else is an [`IllegalTransition`]
/// - `Cancel` moves any non-terminal phase to `cancelling` and is
///   idempotent while already cancelling
pub fn transition(current: Phase, event: &JobEvent) -> Result<Transition, IllegalTransition> {
    use JobEvent::*;

    if current.is_terminal() {
        return Ok(Transition::Ignored);
    }

    let next = match (current, event) {
        (_, Fail(_)) => Phase::Failed,
        (Phase::Queued, AdvanceToCollecting) => Phase::Collecting,
        (Phase::Collecting, AdvanceToParsing) => Phase::Parsing,
        (Phase::Parsing, AdvanceToUpserting) => Phase::Upserting,
        (Phase::Upserting, AdvanceToCompleted) => Phase::Completed,
        (Phase::Cancelling, AdvanceToCancelled) => Phase::Cancelled,
        (Phase::Collecting, Pause) => Phase::Paused,
        (Phase::Paused, Resume) => Phase::Collecting,
        (Phase::Cancelling, Cancel) => return Ok(Transition::Ignored),
        (_, Cancel) => Phase::Cancelling,
        _ => {
            return Err(IllegalTransition {
                from: current,
                event: event.name(),
            })
        }
    };

    Ok(Transition::Next(next))
}
