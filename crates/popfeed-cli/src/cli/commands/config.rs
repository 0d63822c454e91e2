//! `popfeed config` – show where things live and what the config resolves to.

use anyhow::Result;
use popfeed_core::config::{self, PopfeedConfig};
use popfeed_core::{logging, store};

pub fn run_config(cfg: &PopfeedConfig) -> Result<()> {
    println!("# config:   {}", config::config_path()?.display());
    println!("# database: {}", store::default_db_path()?.display());
    println!("# log:      {}", logging::log_path()?.display());
    println!();
    print!("{}", cfg.to_redacted_toml()?);
    if let Err(e) = cfg.validate() {
        println!("\n# invalid: {}", e);
    }
    Ok(())
}
