// crates/server/src/worker/sink.rs
//! Discovered-record sink boundary.
//!
//! Upserting parsed credentials into long-term storage is an external
//! concern; the worker only needs new-vs-duplicate counts back. The
//! in-memory sink dedupes on the full (url, username, password) tuple
//! across all jobs, which is what the counters report.

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use thiserror::Error;

use super::parse::CredentialRecord;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertStats {
    pub new_records: u64,
    pub duplicates: u64,
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("record sink unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait RecordSink: Send + Sync {
    async fn upsert(
        &self,
        job_id: &str,
        records: &[CredentialRecord],
    ) -> Result<UpsertStats, SinkError>;
}

#[derive(Default)]
pub struct MemorySink {
    seen: Mutex<HashSet<CredentialRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordSink for MemorySink {
    async fn upsert(
        &self,
        _job_id: &str,
        records: &[CredentialRecord],
    ) -> Result<UpsertStats, SinkError> {
        let mut seen = match self.seen.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::error!("record sink lock poisoned; recovering");
                poisoned.into_inner()
            }
        };

        let mut stats = UpsertStats::default();
        for record in records {
            if seen.insert(record.clone()) {
                stats.new_records += 1;
            } else {
                stats.duplicates += 1;
            }
        }
        Ok(stats)
    }
}
