// crates/server/src/worker/source.rs
//! Collection source boundary.
//!
//! The actual scan logic lives behind [`CollectSource`]: the worker
//! only needs a target split into work units (its pause/cancel
//! checkpoint boundaries) and raw lines per unit.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use leakwatch_core::{JobKind, TimeFilter};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CollectError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("intel source request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("intel source returned status {status}")]
    Status { status: u16 },
}

/// External collection boundary. One implementation per upstream.
#[async_trait]
pub trait CollectSource: Send + Sync {
    /// Split a job target into independent work units. The worker
    /// honors pause/cancel signals between units, never inside one.
    fn units(&self, target: &str) -> Vec<String>;

    /// Collect raw lines for a single unit.
    async fn collect(
        &self,
        unit: &str,
        time_filter: Option<TimeFilter>,
    ) -> Result<Vec<String>, CollectError>;
}

/// Reads an already-obtained dump file. One unit = the whole file.
pub struct FileSource;

#[async_trait]
impl CollectSource for FileSource {
    fn units(&self, target: &str) -> Vec<String> {
        vec![target.to_string()]
    }

    async fn collect(
        &self,
        unit: &str,
        _time_filter: Option<TimeFilter>,
    ) -> Result<Vec<String>, CollectError> {
        let contents = tokio::fs::read_to_string(unit)
            .await
            .map_err(|source| CollectError::Io {
                path: unit.to_string(),
                source,
            })?;
        Ok(contents
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(String::from)
            .collect())
    }
}

/// Thin client for an intelligence-source HTTP API.
///
/// One unit per comma-separated target; each unit is one bounded GET
/// returning a JSON array of raw lines. Search pagination, media types
/// and rate limiting are the upstream service's concern.
pub struct RemoteSource {
    client: reqwest::Client,
    base_url: String,
}

impl RemoteSource {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, CollectError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { client, base_url })
    }
}

#[async_trait]
impl CollectSource for RemoteSource {
    fn units(&self, target: &str) -> Vec<String> {
        target
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(String::from)
            .collect()
    }

    async fn collect(
        &self,
        unit: &str,
        time_filter: Option<TimeFilter>,
    ) -> Result<Vec<String>, CollectError> {
        let mut request = self
            .client
            .get(format!("{}/search", self.base_url))
            .query(&[("target", unit)]);
        if let Some(filter) = time_filter {
            request = request.query(&[("time", filter.as_code())]);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(CollectError::Status {
                status: response.status().as_u16(),
            });
        }
        Ok(response.json::<Vec<String>>().await?)
    }
}

/// Which source serves which job kind. Wired once at startup.
#[derive(Clone, Default)]
pub struct SourceRegistry {
    sources: HashMap<JobKind, Arc<dyn CollectSource>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, kind: JobKind, source: Arc<dyn CollectSource>) {
        self.sources.insert(kind, source);
    }

    pub fn get(&self, kind: JobKind) -> Option<Arc<dyn CollectSource>> {
        self.sources.get(&kind).cloned()
    }
}
