use std::future::Future;

use super::types::{BatchWriteOutcome, IndicatorRecord, StorageError};

/// Write contract the load step relies on.
///
/// Implementations must enforce uniqueness of `indicator` in the store itself
/// (not by checking in application code) and must support an unordered bulk
/// insert in which a rejected record does not prevent the rest of the batch
/// from being written.
pub trait IndicatorStore {
    /// Creates the unique index on `indicator` if it does not exist yet.
    fn ensure_unique_index(&self) -> impl Future<Output = Result<(), StorageError>> + Send;

    /// Inserts every record it can, reporting per-record rejections.
    ///
    /// Uniqueness violations become [`super::Rejection`]s in the outcome. Any
    /// other failure is returned as an error.
    fn insert_many_unordered(
        &self,
        records: &[IndicatorRecord],
    ) -> impl Future<Output = Result<BatchWriteOutcome, StorageError>> + Send;

    /// Number of records currently stored.
    fn count(&self) -> impl Future<Output = Result<u64, StorageError>> + Send;
}
