//! The two periodic jobs: fetching new items and persisting the cache.

mod fetch;
mod sync;

pub use fetch::{FetchJob, FetchReport};
pub use sync::SyncJob;
