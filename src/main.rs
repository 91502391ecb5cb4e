use std::process::ExitCode;

use clap::Parser;
use storagevisor::cli::Cli;
use storagevisor::config::locate;
use storagevisor::{logging, run_service};
use tracing::{debug, error};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(service = %cli.command.kind(), error = format!("{e:#}"), "service terminated");
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli) -> anyhow::Result<()> {
    let cfg = cli.load_config()?;
    logging::init(&cfg.log);
    match locate(cli.config_file.as_deref()) {
        Some(path) => debug!(path = %path.display(), "loaded config file"),
        None => debug!("no config file found, using defaults"),
    }
    run_service(cli.command.kind(), &cfg).await?;
    Ok(())
}
