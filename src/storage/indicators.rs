use chrono::SecondsFormat;

use super::schema::Database;
use super::store::IndicatorStore;
use super::types::{
    BatchWriteOutcome, IndicatorRecord, IndicatorRow, Rejection, RejectionReason, StorageError,
};

/// Records written per transaction. Earlier chunks stay committed if a later
/// chunk hits a fatal error.
const BATCH_SIZE: usize = 500;

impl Database {
    // ========================================================================
    // Writes
    // ========================================================================

    /// Unordered bulk insert.
    ///
    /// Each record is inserted with its own statement so a uniqueness
    /// violation aborts only that statement; the rest of the chunk keeps
    /// going and the chunk is committed as a whole.
    pub async fn insert_many_unordered(
        &self,
        records: &[IndicatorRecord],
    ) -> Result<BatchWriteOutcome, StorageError> {
        let mut outcome = BatchWriteOutcome::default();
        if records.is_empty() {
            return Ok(outcome);
        }

        let sql = format!(
            r#"INSERT INTO "{}" (source, indicator, ingested_at) VALUES (?, ?, ?)"#,
            self.namespace
        );

        for (chunk_no, chunk) in records.chunks(BATCH_SIZE).enumerate() {
            let mut tx = self.pool.begin().await.map_err(StorageError::Write)?;

            for (offset, record) in chunk.iter().enumerate() {
                let result = sqlx::query(&sql)
                    .bind(&record.source)
                    .bind(&record.indicator)
                    .bind(record.ingested_at.to_rfc3339_opts(SecondsFormat::AutoSi, true))
                    .execute(&mut *tx)
                    .await;

                match result {
                    Ok(_) => outcome.inserted += 1,
                    Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                        tracing::trace!(indicator = %record.indicator, "Duplicate indicator rejected");
                        outcome.rejections.push(Rejection {
                            index: chunk_no * BATCH_SIZE + offset,
                            indicator: record.indicator.clone(),
                            reason: RejectionReason::Duplicate,
                        });
                    }
                    Err(e) => return Err(StorageError::Write(e)),
                }
            }

            tx.commit().await.map_err(StorageError::Write)?;
        }

        Ok(outcome)
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Number of stored indicators
    pub async fn count(&self) -> Result<u64, StorageError> {
        let (count,): (i64,) = sqlx::query_as(&format!(r#"SELECT COUNT(*) FROM "{}""#, self.namespace))
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }

    /// All stored records in insertion order
    pub async fn list_indicators(&self) -> Result<Vec<IndicatorRecord>, StorageError> {
        let rows = sqlx::query_as::<_, IndicatorRow>(&format!(
            r#"SELECT source, indicator, ingested_at FROM "{}" ORDER BY id"#,
            self.namespace
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(IndicatorRow::into_record).collect()
    }
}

impl IndicatorStore for Database {
    async fn ensure_unique_index(&self) -> Result<(), StorageError> {
        Database::ensure_unique_index(self).await
    }

    async fn insert_many_unordered(
        &self,
        records: &[IndicatorRecord],
    ) -> Result<BatchWriteOutcome, StorageError> {
        Database::insert_many_unordered(self, records).await
    }

    async fn count(&self) -> Result<u64, StorageError> {
        Database::count(self).await
    }
}
