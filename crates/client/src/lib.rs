// crates/client/src/lib.rs
//! Observer-side reconciliation for leakwatch job state.
//!
//! A [`Poller`] periodically fetches the full job list through a
//! [`JobsApi`] implementation and rebuilds its [`ClientSnapshot`]
//! wholesale. Failed fetches never clear the snapshot — they only mark
//! it stale — so an observer's view degrades to bounded staleness
//! instead of flickering empty.

pub mod fetch;
pub mod poller;

pub use fetch::{FetchError, HttpJobsApi, JobSummary, JobsApi};
pub use poller::{ClientSnapshot, Poller, SnapshotEntry, DEFAULT_POLL_INTERVAL};
