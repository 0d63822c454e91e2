use popfeed_core::logging;

mod cli;

use crate::cli::CliCommand;

#[tokio::main]
async fn main() {
    if let Err(err) = logging::init_logging() {
        eprintln!("popfeed: file logging unavailable ({:#}), using stderr", err);
        let _ = logging::init_logging_stderr();
    }

    if let Err(err) = CliCommand::run_from_args().await {
        tracing::error!(error = %format!("{:#}", err), "command failed");
        eprintln!("popfeed error: {:#}", err);
        std::process::exit(1);
    }
}
