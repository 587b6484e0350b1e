mod indicators;
mod schema;
mod store;
mod types;

pub use schema::{is_valid_name, Database};
pub use store::IndicatorStore;
pub use types::{
    BatchWriteOutcome, IndicatorRecord, Rejection, RejectionReason, StorageError,
};
