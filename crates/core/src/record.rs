// crates/core/src/record.rs
//! The authoritative job record and its statistics counters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::phase::Phase;

/// Opaque unique job identifier, assigned once at creation.
pub type JobId = String;

/// What kind of collection work a job performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// One query against the intelligence source.
    SingleScan,
    /// Several targets scanned in one job, one work unit per target.
    BulkScan,
    /// Parse an already-obtained dump file.
    FileParse,
    /// Created by the recurring scheduler collaborator.
    Scheduled,
}

/// Coarse time-range restriction applied to a scan.
///
/// Codes match the intelligence source's API (`D1` = last day,
/// `W1` = last week, `M3` = last three months, `Y1` = last year);
/// absence means all time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeFilter {
    D1,
    D7,
    D30,
    W1,
    M3,
    Y1,
}

impl TimeFilter {
    pub fn as_code(&self) -> &'static str {
        match self {
            TimeFilter::D1 => "D1",
            TimeFilter::D7 => "D7",
            TimeFilter::D30 => "D30",
            TimeFilter::W1 => "W1",
            TimeFilter::M3 => "M3",
            TimeFilter::Y1 => "Y1",
        }
    }
}

/// Job statistics. Monotonically non-decreasing while the job is
/// active; frozen once the job reaches a terminal phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobCounters {
    pub total_raw: u64,
    pub total_parsed: u64,
    pub total_new: u64,
    pub total_duplicates: u64,
}

impl JobCounters {
    /// Lines collected but not parsed. Derived, never stored.
    ///
    /// Clamped at zero: a worker reporting `total_parsed > total_raw`
    /// is malformed upstream data and must not surface a negative
    /// value to any consumer.
    pub fn unparsed(&self) -> u64 {
        self.total_raw.saturating_sub(self.total_parsed)
    }

    /// Fold `other` in field-wise, keeping each counter monotonic.
    pub fn merge_monotonic(&mut self, other: &JobCounters) {
        self.total_raw = self.total_raw.max(other.total_raw);
        self.total_parsed = self.total_parsed.max(other.total_parsed);
        self.total_new = self.total_new.max(other.total_new);
        self.total_duplicates = self.total_duplicates.max(other.total_duplicates);
    }
}

/// One submitted unit of collection work.
///
/// `phase` is the single source of truth for pipeline position; it is
/// mutated only through the store's atomic apply path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRecord {
    pub id: JobId,
    pub kind: JobKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// The query, comma-separated target list, or filename driving the job.
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_filter: Option<TimeFilter>,
    pub phase: Phase,
    pub counters: JobCounters,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobRecord {
    /// Create a job in the initial phase with a fresh id.
    pub fn new(kind: JobKind, target: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            name: None,
            target: target.into(),
            time_filter: None,
            phase: Phase::Queued,
            counters: JobCounters::default(),
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            error: None,
        }
    }

    pub fn with_name(mut self, name: Option<String>) -> Self {
        self.name = name;
        self
    }

    pub fn with_time_filter(mut self, filter: Option<TimeFilter>) -> Self {
        self.time_filter = filter;
        self
    }

    /// Wall-clock duration, available once the job has both started and
    /// finished.
    pub fn duration_seconds(&self) -> Option<i64> {
        match (self.started_at, self.completed_at) {
            (Some(start), Some(end)) => Some((end - start).num_seconds()),
            _ => None,
        }
    }
}
