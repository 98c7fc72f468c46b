use super::{WorkspaceArgs, ci_aggregator, open_store, print_json};
use anyhow::Result;
use clap::Args;
use monoscope_core::health::CiSignalSource;
use monoscope_core::operations::{RefreshCoordinator, Scanner};
use monoscope_core::{MonoscopeConfig, console};
use std::sync::Arc;

#[derive(Args, Debug)]
pub struct RefreshArgs {
    #[command(flatten)]
    pub workspace: WorkspaceArgs,
}

pub async fn run(args: RefreshArgs, config: &MonoscopeConfig) -> Result<()> {
    if !args.workspace.json {
        console::header("refresh", env!("CARGO_PKG_VERSION"));
    }

    let root = args.workspace.root()?;
    let aggregator = ci_aggregator(config)?;

    if !aggregator.has_providers() && !args.workspace.json {
        console::warn("no CI providers configured; signals will be unknown");
    }

    let coordinator = RefreshCoordinator::new(
        Arc::new(Scanner::new(config)),
        Arc::new(open_store(config).await?),
        Arc::new(CiSignalSource::new(aggregator)),
    );

    let summary = coordinator.refresh_health(&root).await?;

    if args.workspace.json {
        return print_json(&summary);
    }

    println!("  healthy    {}", summary.healthy);
    println!("  unhealthy  {}", summary.unhealthy);
    if summary.failed > 0 {
        println!("  failed     {}", summary.failed);
    }
    println!("  average    {:.1}", summary.average_score);

    console::summary(&format!("refreshed {} packages", summary.total));
    Ok(())
}
