use anyhow::Result;
use clap::Parser;
use monoscope_core::{MonoscopeConfig, console};
use tracing::debug;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::{Cli, Command};

#[tokio::main]
async fn main() {
    let args = Cli::parse();
    let mut config = MonoscopeConfig::from_env();
    config.verbose |= args.verbose;

    if let Err(e) = init_tracing(config.verbose) {
        console::warn(&format!("failed to initialize logging: {}", e));
    }

    debug!(
        data_dir = %config.data_dir.display(),
        providers = config.providers.len(),
        "resolved configuration"
    );

    if let Err(e) = dispatch(args.command, &config).await {
        console::error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

async fn dispatch(command: Command, config: &MonoscopeConfig) -> Result<()> {
    match command {
        Command::Scan(args) => commands::scan::run(args, config).await,
        Command::Graph(args) => commands::graph::run(args, config).await,
        Command::Cycles(args) => commands::cycles::run(args, config).await,
        Command::Layout(args) => commands::layout::run(args, config).await,
        Command::Health(args) => commands::health::run(args, config).await,
        Command::Refresh(args) => commands::refresh::run(args, config).await,
        Command::Ci(args) => commands::ci::run(args, config).await,
        Command::Log(args) => commands::log::run(args, config).await,
    }
}

fn init_tracing(verbose: bool) -> Result<()> {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!(e))?;
    Ok(())
}
