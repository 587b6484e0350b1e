//! Drop-list ingestion: fetch a plaintext threat feed, parse it into
//! indicators, and load the new ones into a deduplicated store.
//!
//! The crate is organized as a linear extract / transform / load pipeline:
//!
//! - [`feed`] - HTTP fetching with bounded retry, and the drop-list parser
//! - [`pipeline`] - record building, the load policy, and [`pipeline::run`]
//! - [`storage`] - the [`storage::IndicatorStore`] contract and its SQLite backend
//! - [`config`] - configuration assembled from an optional TOML file and the environment

pub mod config;
pub mod feed;
pub mod pipeline;
pub mod storage;
