//! Feed retrieval and parsing.
//!
//! - [`backoff`] - retry policy and the sleep abstraction used between attempts
//! - [`fetcher`] - HTTP GET with per-attempt timeout, size cap and bounded retry
//! - [`parser`] - converts semicolon-delimited drop-list text into indicator strings
//!
//! # Example
//!
//! ```ignore
//! use droplist::feed::{fetch, parse_drop_list, RetryPolicy, TokioSleeper};
//!
//! let raw = fetch(&client, DEFAULT_FEED_URL, &RetryPolicy::default(), &TokioSleeper).await?;
//! let indicators = parse_drop_list(&raw);
//! ```

mod backoff;
mod fetcher;
mod parser;

pub use backoff::{RetryPolicy, Sleeper, TokioSleeper};
pub use fetcher::{fetch, FetchError};
pub use parser::parse_drop_list;

/// Spamhaus "Don't Route Or Peer" list.
pub const DEFAULT_FEED_URL: &str = "https://www.spamhaus.org/drop/drop.txt";

/// Source tag stamped on every record produced from the default feed.
pub const DEFAULT_SOURCE_TAG: &str = "spamhaus_drop";
