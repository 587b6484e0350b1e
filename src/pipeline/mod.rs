//! The extract / transform / load run.
//!
//! A run is strictly sequential: fetch the feed, parse it into records that
//! share one ingestion timestamp, open the store, load, close the store.
//! Only retry exhaustion and storage failures abort a run; non-200 responses
//! and duplicate indicators are absorbed with logging.

mod load;
mod transform;

pub use load::{load, LoadReport};
pub use transform::{build_records, transform, write_json_lines};

use chrono::{DateTime, Utc};
use secrecy::ExposeSecret;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

use crate::config::{Config, ConfigError};
use crate::feed::{fetch, FetchError, Sleeper, TokioSleeper};
use crate::storage::{Database, IndicatorRecord, StorageError};

/// Errors that abort a run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Outcome of a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub feed_url: String,
    pub parsed: usize,
    pub inserted: usize,
    pub skipped: usize,
    /// Collection size after the load
    pub total_stored: u64,
    pub ingested_at: DateTime<Utc>,
    pub index_warning: Option<String>,
}

/// HTTP client used for feed requests.
///
/// Per-attempt timeouts are applied by the fetcher, not the client.
pub fn build_client() -> Result<reqwest::Client, PipelineError> {
    reqwest::Client::builder()
        .user_agent(concat!("droplist/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(Duration::from_secs(10))
        .build()
        .map_err(PipelineError::Client)
}

/// Fetch the configured feed.
pub async fn extract<S: Sleeper>(
    client: &reqwest::Client,
    config: &Config,
    sleeper: &S,
) -> Result<String, FetchError> {
    tracing::info!(url = %config.feed.url, "Fetching feed");
    fetch(client, &config.feed.url, &config.retry_policy(), sleeper).await
}

/// Fetch and transform without touching the store.
///
/// Every record is stamped with the time the fetch completed.
pub async fn extract_records<S: Sleeper>(
    client: &reqwest::Client,
    config: &Config,
    sleeper: &S,
) -> Result<Vec<IndicatorRecord>, FetchError> {
    let (_, records) = extract_stamped(client, config, sleeper).await?;
    Ok(records)
}

async fn extract_stamped<S: Sleeper>(
    client: &reqwest::Client,
    config: &Config,
    sleeper: &S,
) -> Result<(DateTime<Utc>, Vec<IndicatorRecord>), FetchError> {
    let raw = extract(client, config, sleeper).await?;
    // Taken after retries and backoff, once for the whole batch
    let now = Utc::now();
    let records = transform(&raw, &config.feed.source, now);
    tracing::info!(count = records.len(), "Parsed indicators");
    Ok((now, records))
}

/// Run the full pipeline with a default client and real sleeps.
pub async fn run(config: &Config) -> Result<RunSummary, PipelineError> {
    let client = build_client()?;
    run_with(config, &client, &TokioSleeper).await
}

/// Run the full pipeline with the given client and sleeper.
///
/// The store is opened after the feed has been fetched and parsed, and is
/// closed before returning whether or not the load succeeded.
pub async fn run_with<S: Sleeper>(
    config: &Config,
    client: &reqwest::Client,
    sleeper: &S,
) -> Result<RunSummary, PipelineError> {
    let uri = config
        .store
        .uri
        .as_ref()
        .ok_or(ConfigError::MissingStoreUri)?;

    let (ingested_at, records) = extract_stamped(client, config, sleeper).await?;

    let db = Database::open(
        uri.expose_secret(),
        &config.store.database,
        &config.store.collection,
    )
    .await?;
    let result = load_and_count(&db, &records).await;
    db.close().await;
    let (report, total_stored) = result?;

    tracing::info!(
        parsed = records.len(),
        inserted = report.inserted,
        skipped = report.skipped,
        total = total_stored,
        "Run complete"
    );

    Ok(RunSummary {
        feed_url: config.feed.url.clone(),
        parsed: records.len(),
        inserted: report.inserted,
        skipped: report.skipped,
        total_stored,
        ingested_at,
        index_warning: report.index_warning,
    })
}

async fn load_and_count(
    db: &Database,
    records: &[IndicatorRecord],
) -> Result<(LoadReport, u64), StorageError> {
    let report = load(db, records).await?;
    let total = db.count().await?;
    Ok((report, total))
}
