// crates/store/src/memory.rs
//! In-memory job store.
//!
//! Layout mirrors the rest of the codebase's shared-state maps: an
//! outer `RwLock<HashMap>` guarding the registry, one `Mutex` per
//! record for the check-and-transition path. The outer lock is held
//! only long enough to clone the per-job handle, so cross-job
//! operations proceed independently.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use chrono::Utc;
use leakwatch_core::{transition, JobCounters, JobEvent, JobRecord, Phase, Transition};

use crate::{ApplyOutcome, JobStore, StoreError};

type JobSlot = Arc<Mutex<JobRecord>>;

/// Shared in-memory job table.
#[derive(Default)]
pub struct MemoryStore {
    jobs: RwLock<HashMap<String, JobSlot>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, id: &str) -> Result<JobSlot, StoreError> {
        let jobs = match self.jobs.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::error!("job table lock poisoned on read; recovering");
                poisoned.into_inner()
            }
        };
        jobs.get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    fn lock_job<'a>(slot: &'a JobSlot) -> MutexGuard<'a, JobRecord> {
        match slot.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::error!("job record lock poisoned; recovering");
                poisoned.into_inner()
            }
        }
    }
}

impl JobStore for MemoryStore {
    fn insert(&self, record: JobRecord) -> Result<(), StoreError> {
        let mut jobs = match self.jobs.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::error!("job table lock poisoned on write; recovering");
                poisoned.into_inner()
            }
        };
        if jobs.contains_key(&record.id) {
            return Err(StoreError::Duplicate(record.id));
        }
        jobs.insert(record.id.clone(), Arc::new(Mutex::new(record)));
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<JobRecord>, StoreError> {
        match self.slot(id) {
            Ok(slot) => Ok(Some(Self::lock_job(&slot).clone())),
            Err(StoreError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn list(&self) -> Result<Vec<JobRecord>, StoreError> {
        let slots: Vec<JobSlot> = {
            let jobs = match self.jobs.read() {
                Ok(guard) => guard,
                Err(poisoned) => {
                    tracing::error!("job table lock poisoned on read; recovering");
                    poisoned.into_inner()
                }
            };
            jobs.values().cloned().collect()
        };

        let mut records: Vec<JobRecord> = slots
            .iter()
            .map(|slot| Self::lock_job(slot).clone())
            .collect();
        // Newest first; id as tie-breaker keeps the order stable.
        records.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(records)
    }

    fn apply(&self, id: &str, event: &JobEvent) -> Result<ApplyOutcome, StoreError> {
        let slot = self.slot(id)?;
        let mut job = Self::lock_job(&slot);
        let from = job.phase;

        match transition(from, event) {
            Ok(Transition::Next(to)) => {
                if from == Phase::Queued && to == Phase::Collecting {
                    job.started_at = Some(Utc::now());
                }
                if to.is_terminal() && job.completed_at.is_none() {
                    job.completed_at = Some(Utc::now());
                }
                if let JobEvent::Fail(reason) = event {
                    if job.error.is_none() {
                        job.error = Some(reason.clone());
                    }
                }
                job.phase = to;
                Ok(ApplyOutcome::Transitioned { from, to })
            }
            Ok(Transition::Ignored) => Ok(ApplyOutcome::Ignored { phase: from }),
            Err(_) => Ok(ApplyOutcome::Rejected { phase: from }),
        }
    }

    fn record_counters(&self, id: &str, counters: &JobCounters) -> Result<bool, StoreError> {
        let slot = self.slot(id)?;
        let mut job = Self::lock_job(&slot);
        if job.phase.is_terminal() {
            return Ok(false);
        }
        job.counters.merge_monotonic(counters);
        Ok(true)
    }
}
