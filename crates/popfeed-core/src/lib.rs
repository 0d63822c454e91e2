//! popfeed core: a bounded, per-author-deduplicated cache of the most popular
//! recent posts for one language, revalidated against the source and kept in
//! sync with a per-day SQLite record set.

pub mod cache;
pub mod config;
pub mod control;
pub mod filter;
pub mod item;
pub mod jobs;
pub mod logging;
pub mod rate_limit;
pub mod runtime;
pub mod scheduler;
pub mod source;
pub mod store;
pub mod sync;

#[cfg(test)]
mod testutil;

