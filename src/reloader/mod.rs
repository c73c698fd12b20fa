//! Parallel fetcher: pool-based and range-based reload entry points (spec §4.5).

pub mod fetch;
mod pool;

pub use fetch::{FetchError, FetchOutcome, Fetcher, HttpFetcher};
pub use pool::{ReloadStatus, Reloader};
