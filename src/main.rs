//! Kestrel - a small stacking Wayland compositor
//!
//! Parses the command line, sets up logging and runs the server until a
//! binding or signal stops it.

use clap::Parser;
use log::{error, info};

use kestrel::config::{Args, Config};

fn main() -> anyhow::Result<()> {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::try_from(Args::parse())?;
    info!("Starting kestrel with {:?}", config);

    if let Err(e) = kestrel::server::run(config) {
        error!("Kestrel failed: {:#}", e);
        return Err(e);
    }
    Ok(())
}
