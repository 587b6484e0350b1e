use serde::Serialize;

use crate::storage::{IndicatorRecord, IndicatorStore, StorageError};

/// What a single load did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    /// Records submitted
    pub attempted: usize,
    /// Records written
    pub inserted: usize,
    /// Records rejected as already known
    pub skipped: usize,
    /// Set when the unique index could not be ensured
    pub index_warning: Option<String>,
}

/// Writes a run's records, tolerating duplicates.
///
/// # Behavior
///
/// - Ensures the unique index on `indicator` first. Failure is logged and
///   recorded in [`LoadReport::index_warning`]; the load continues.
/// - Inserts every record in one unordered bulk write. Records rejected as
///   duplicates are counted in [`LoadReport::skipped`], never treated as
///   errors.
///
/// # Errors
///
/// Any [`StorageError`] from the bulk write itself is returned unchanged and
/// aborts the run.
pub async fn load<S: IndicatorStore>(
    store: &S,
    records: &[IndicatorRecord],
) -> Result<LoadReport, StorageError> {
    let mut report = LoadReport {
        attempted: records.len(),
        ..LoadReport::default()
    };

    if let Err(e) = store.ensure_unique_index().await {
        tracing::warn!(error = %e, "Index error, continuing without guaranteed uniqueness");
        report.index_warning = Some(e.to_string());
    }

    if records.is_empty() {
        tracing::info!("No indicators to insert");
        return Ok(report);
    }

    let outcome = store.insert_many_unordered(records).await?;
    report.inserted = outcome.inserted;
    report.skipped = outcome.duplicates();

    if outcome.is_partial() {
        tracing::info!(
            inserted = report.inserted,
            skipped = report.skipped,
            "Inserted new indicators, skipped duplicates"
        );
    } else {
        tracing::info!(inserted = report.inserted, "Inserted new indicators");
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{BatchWriteOutcome, Database};
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn records(indicators: &[&str]) -> Vec<IndicatorRecord> {
        let now = Utc::now();
        indicators
            .iter()
            .map(|i| IndicatorRecord {
                source: "spamhaus_drop".to_string(),
                indicator: i.to_string(),
                ingested_at: now,
            })
            .collect()
    }

    /// Store whose index setup always fails and whose writes always succeed.
    #[derive(Default)]
    struct NoIndexStore {
        writes: AtomicUsize,
    }

    impl IndicatorStore for NoIndexStore {
        async fn ensure_unique_index(&self) -> Result<(), StorageError> {
            Err(StorageError::Other(sqlx::Error::PoolTimedOut))
        }

        async fn insert_many_unordered(
            &self,
            records: &[IndicatorRecord],
        ) -> Result<BatchWriteOutcome, StorageError> {
            self.writes.fetch_add(1, Ordering::Relaxed);
            Ok(BatchWriteOutcome {
                inserted: records.len(),
                rejections: Vec::new(),
            })
        }

        async fn count(&self) -> Result<u64, StorageError> {
            Ok(0)
        }
    }

    /// Store that is unreachable for writes.
    struct UnreachableStore;

    impl IndicatorStore for UnreachableStore {
        async fn ensure_unique_index(&self) -> Result<(), StorageError> {
            Ok(())
        }

        async fn insert_many_unordered(
            &self,
            _records: &[IndicatorRecord],
        ) -> Result<BatchWriteOutcome, StorageError> {
            Err(StorageError::Write(sqlx::Error::PoolClosed))
        }

        async fn count(&self) -> Result<u64, StorageError> {
            Err(StorageError::Other(sqlx::Error::PoolClosed))
        }
    }

    async fn test_db() -> Database {
        Database::open(":memory:", "etl_database", "spamhaus_raw")
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_load_into_empty_store() {
        let db = test_db().await;
        let batch = records(&["1.2.3.0/24", "5.6.7.0/8"]);

        let report = load(&db, &batch).await.unwrap();

        assert_eq!(
            report,
            LoadReport {
                attempted: 2,
                inserted: 2,
                skipped: 0,
                index_warning: None,
            }
        );
    }

    #[tokio::test]
    async fn test_load_is_idempotent() {
        let db = test_db().await;
        let batch = records(&["1.2.3.0/24", "5.6.7.0/8", "9.9.9.0/24"]);

        load(&db, &batch).await.unwrap();
        let stored_once = db.list_indicators().await.unwrap();

        let second = load(&db, &batch).await.unwrap();
        assert_eq!(second.inserted, 0);
        assert_eq!(second.skipped, 3);
        assert_eq!(db.list_indicators().await.unwrap(), stored_once);
    }

    #[tokio::test]
    async fn test_partial_write_reports_inserted_count() {
        let db = test_db().await;
        let indicators: Vec<String> = (0..10).map(|i| format!("172.16.{}.0/24", i)).collect();
        let refs: Vec<&str> = indicators.iter().map(String::as_str).collect();
        let batch = records(&refs);

        // 3 of the 10 are already known
        load(&db, &batch[2..5]).await.unwrap();

        let report = load(&db, &batch).await.unwrap();
        assert_eq!(report.inserted, 7);
        assert_eq!(report.skipped, 3);
        assert_eq!(db.count().await.unwrap(), 10);
    }

    #[tokio::test]
    async fn test_index_failure_does_not_abort() {
        let store = NoIndexStore::default();
        let report = load(&store, &records(&["1.2.3.0/24"])).await.unwrap();

        assert_eq!(report.inserted, 1);
        assert!(report.index_warning.is_some());
        assert_eq!(store.writes.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_index_failure_on_existing_duplicates_in_sqlite() {
        let db = test_db().await;
        // Written before any index exists
        db.insert_many_unordered(&records(&["8.8.8.0/24", "8.8.8.0/24"]))
            .await
            .unwrap();

        let report = load(&db, &records(&["4.4.4.0/24"])).await.unwrap();
        assert_eq!(report.inserted, 1);
        assert!(report
            .index_warning
            .as_deref()
            .is_some_and(|w| w.contains("unique index")));
    }

    #[tokio::test]
    async fn test_fatal_write_error_propagates() {
        let result = load(&UnreachableStore, &records(&["1.2.3.0/24"])).await;
        assert!(matches!(result, Err(StorageError::Write(_))));
    }

    #[tokio::test]
    async fn test_empty_batch_skips_write() {
        let store = NoIndexStore::default();
        let report = load(&store, &[]).await.unwrap();

        assert_eq!(report.attempted, 0);
        assert_eq!(report.inserted, 0);
        assert_eq!(store.writes.load(Ordering::Relaxed), 0);
    }
}
