use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Storage errors. Every variant is fatal for a run except
/// [`StorageError::Index`], which the load step logs and tolerates.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Database or collection name is not a plain identifier
    #[error("Invalid database or collection name: {0:?}")]
    InvalidName(String),

    /// The store could not be opened (bad URI, unreachable file, permissions)
    #[error("Failed to open indicator store: {0}")]
    Open(#[source] sqlx::Error),

    /// Collection could not be created
    #[error("Failed to prepare collection {namespace}: {source}")]
    Schema {
        namespace: String,
        #[source]
        source: sqlx::Error,
    },

    /// Unique index on `indicator` could not be created
    #[error("Failed to create unique index on {namespace}.indicator: {source}")]
    Index {
        namespace: String,
        #[source]
        source: sqlx::Error,
    },

    /// A write failed for a reason other than a uniqueness violation
    #[error("Bulk insert failed: {0}")]
    Write(#[source] sqlx::Error),

    /// A stored row could not be converted back into a record
    #[error("Stored ingested_at {value:?} for {indicator} is not RFC 3339: {source}")]
    CorruptTimestamp {
        indicator: String,
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    /// Generic database error
    #[error("Database error: {0}")]
    Other(#[from] sqlx::Error),
}

// ============================================================================
// Data Structures
// ============================================================================

/// A single indicator as persisted in the collection.
///
/// Records are write-once: the store has no update or delete path, and a
/// record whose `indicator` already exists is rejected rather than replacing
/// the stored one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndicatorRecord {
    /// Feed origin tag (e.g. `spamhaus_drop`)
    pub source: String,
    /// Address block as listed by the feed; the natural unique key
    pub indicator: String,
    /// Shared by every record produced in one run
    pub ingested_at: DateTime<Utc>,
}

/// Why a record in a bulk write was not inserted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionReason {
    /// Unique index on `indicator` already holds this value
    Duplicate,
}

/// A record the store refused during a bulk write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    /// Position of the record in the submitted batch
    pub index: usize,
    pub indicator: String,
    pub reason: RejectionReason,
}

/// Outcome of an unordered bulk insert.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchWriteOutcome {
    /// Number of records actually written
    pub inserted: usize,
    /// Records skipped, in batch order
    pub rejections: Vec<Rejection>,
}

impl BatchWriteOutcome {
    pub fn is_partial(&self) -> bool {
        !self.rejections.is_empty()
    }

    pub fn duplicates(&self) -> usize {
        self.rejections
            .iter()
            .filter(|r| r.reason == RejectionReason::Duplicate)
            .count()
    }
}

/// Row type for indicator queries
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct IndicatorRow {
    pub source: String,
    pub indicator: String,
    pub ingested_at: String,
}

impl IndicatorRow {
    /// Converts to a record.
    ///
    /// A timestamp that is not RFC 3339 is reported as
    /// [`StorageError::CorruptTimestamp`].
    pub(crate) fn into_record(self) -> Result<IndicatorRecord, StorageError> {
        let ingested_at = match DateTime::parse_from_rfc3339(&self.ingested_at) {
            Ok(dt) => dt.with_timezone(&Utc),
            Err(source) => {
                return Err(StorageError::CorruptTimestamp {
                    indicator: self.indicator,
                    value: self.ingested_at,
                    source,
                })
            }
        };
        Ok(IndicatorRecord {
            source: self.source,
            indicator: self.indicator,
            ingested_at,
        })
    }
}
