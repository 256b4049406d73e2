// crates/client/src/poller.rs
//! The reconciliation poll loop.
//!
//! Each tick fetches the full visible job set and replaces the cached
//! snapshot wholesale — no incremental patching, so entries for purged
//! jobs never accumulate and an observer never sees a torn batch. A
//! failed fetch leaves the previous snapshot in place and only raises
//! the stale flag; the next tick retries.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use leakwatch_core::{project, DisplayStatus};
use serde::Serialize;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::fetch::{JobSummary, JobsApi};

/// Reference poll cadence. Jobs run for minutes; one interval of
/// staleness is the accepted trade for not needing a push channel.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Cached projection of one job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotEntry {
    pub id: String,
    pub display_status: DisplayStatus,
    /// 0–100 pipeline-position indicator.
    pub display_progress: u8,
    pub unparsed: u64,
    /// Verbatim phase string from the last successful fetch.
    pub last_seen_phase: String,
}

/// The observer's cached view of all visible jobs.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientSnapshot {
    /// Entries in server order (newest job first).
    pub jobs: Vec<SnapshotEntry>,
    /// True when the last fetch failed and `jobs` may be out of date.
    pub stale: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_synced_at: Option<DateTime<Utc>>,
}

/// Handle for an attached observer session.
///
/// Dropping the handle (or calling [`Poller::detach`]) stops the loop.
pub struct Poller {
    snapshot: Arc<RwLock<ClientSnapshot>>,
    stop_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl Poller {
    /// Attach an observer: spawns the poll loop at `interval`.
    ///
    /// The first tick fires immediately. If a fetch is still in flight
    /// when the next tick comes due, that tick is skipped, not queued —
    /// there is never more than one outstanding fetch.
    pub fn attach(api: Arc<dyn JobsApi>, interval: Duration) -> Self {
        let snapshot = Arc::new(RwLock::new(ClientSnapshot::default()));
        let shared = Arc::clone(&snapshot);
        let (stop_tx, mut stop_rx) = oneshot::channel();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = &mut stop_rx => break,
                    _ = ticker.tick() => poll_once(api.as_ref(), &shared).await,
                }
            }
        });

        Self {
            snapshot,
            stop_tx: Some(stop_tx),
            task,
        }
    }

    /// Current snapshot (cloned; never blocks the poll loop for long).
    pub fn snapshot(&self) -> ClientSnapshot {
        match self.snapshot.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => {
                tracing::error!("snapshot lock poisoned; recovering");
                poisoned.into_inner().clone()
            }
        }
    }

    /// Detach the observer and stop the loop.
    pub fn detach(mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        self.task.abort();
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        self.task.abort();
    }
}

/// One reconciliation tick.
async fn poll_once(api: &dyn JobsApi, snapshot: &RwLock<ClientSnapshot>) {
    match api.fetch_jobs().await {
        Ok(records) => {
            let jobs = records.iter().map(project_entry).collect();
            let fresh = ClientSnapshot {
                jobs,
                stale: false,
                last_synced_at: Some(Utc::now()),
            };
            match snapshot.write() {
                Ok(mut guard) => *guard = fresh,
                Err(poisoned) => {
                    tracing::error!("snapshot lock poisoned; recovering");
                    *poisoned.into_inner() = fresh;
                }
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "job poll failed; serving stale snapshot");
            match snapshot.write() {
                Ok(mut guard) => guard.stale = true,
                Err(poisoned) => {
                    tracing::error!("snapshot lock poisoned; recovering");
                    poisoned.into_inner().stale = true;
                }
            }
        }
    }
}

/// Project one fetched record. Total per record: an unrecognized phase
/// degrades that entry to pending without touching the rest of the
/// batch.
fn project_entry(record: &JobSummary) -> SnapshotEntry {
    let projection = project(&record.phase, &record.counters);
    SnapshotEntry {
        id: record.id.clone(),
        display_status: projection.display_status,
        display_progress: projection.display_progress,
        unparsed: projection.unparsed,
        last_seen_phase: record.phase.clone(),
    }
}
