//! CLI command handlers, one file per command.

mod config;
mod run;
mod status;

pub use config::run_config;
pub use run::run_daemon;
pub use status::run_status;
