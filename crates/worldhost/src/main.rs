//! `worldhost`: load the config, boot every instance, run until Ctrl-C.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use worldhost::{BootSequencer, ConfigSource};

#[derive(Debug, Parser)]
#[command(name = "worldhost", version, about = "Runs the game server instances defined in the store")]
struct Cli {
    /// Path of the TOML configuration file.
    #[arg(short, long, default_value = "worldhost.toml")]
    config: PathBuf,
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    let booted = match BootSequencer::new(ConfigSource::File(cli.config)).boot() {
        Ok(booted) => booted,
        Err(e) => {
            tracing::error!(error = %e, "boot failed; no game server started");
            return ExitCode::FAILURE;
        }
    };

    // Instances run on their own runtimes; this one only waits for Ctrl-C.
    let waiter = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!(error = %e, "cannot start signal runtime");
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = waiter.block_on(tokio::signal::ctrl_c()) {
        tracing::error!(error = %e, "cannot listen for shutdown signal");
    }

    tracing::info!(instances = booted.registry.len(), "shutting down");
    drop(booted);
    ExitCode::SUCCESS
}

fn init_tracing() {
    use tracing_subscriber::{EnvFilter, prelude::*};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}
