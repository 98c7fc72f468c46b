use super::{WorkspaceArgs, ci_aggregator, print_json, scan_packages};
use anyhow::Result;
use clap::Args;
use monoscope_core::ci::CiBuildStatus;
use monoscope_core::{MonoscopeConfig, console};

#[derive(Args, Debug)]
pub struct CiArgs {
    /// Only show this package
    pub package: Option<String>,

    /// Only ask this provider
    #[arg(long)]
    pub provider: Option<String>,

    #[command(flatten)]
    pub workspace: WorkspaceArgs,
}

pub async fn run(args: CiArgs, config: &MonoscopeConfig) -> Result<()> {
    let aggregator = ci_aggregator(config)?;

    if let Some(name) = &args.package {
        let status = aggregator
            .get_package_ci_status(name, args.provider.as_deref())
            .await?;

        if args.workspace.json {
            return print_json(&status);
        }

        console::header("ci", env!("CARGO_PKG_VERSION"));
        match status {
            Some(status) => print_package(&status),
            None => console::warn(&format!("no builds found for {}", name)),
        }
        return Ok(());
    }

    let packages = scan_packages(config, &args.workspace).await?;
    let status = aggregator.get_monorepo_ci_status(&packages).await;

    if args.workspace.json {
        return print_json(&status);
    }

    console::header("ci", env!("CARGO_PKG_VERSION"));

    for package in &status.packages {
        println!(
            "{} {} {}",
            console::status_badge(package.status),
            console::bold(&package.name),
            console::dim(&format!(
                "last {} · {:.0}% success",
                package.last_build, package.success_rate
            ))
        );
        for issue in &package.issues {
            println!("    {}", issue);
        }
    }

    if !status.without_builds.is_empty() {
        console::info(&console::dim(&format!(
            "no builds: {}",
            status.without_builds.join(", ")
        )));
    }

    if status.tests.total > 0 {
        println!();
        println!(
            "tests {} passed, {} failed, {} total",
            status.tests.passed, status.tests.failed, status.tests.total
        );
    }

    console::summary(&format!(
        "{} healthy, {} warning, {} error",
        status.healthy, status.warning, status.error
    ));
    Ok(())
}

fn print_package(status: &CiBuildStatus) {
    println!(
        "{} {}",
        console::status_badge(status.status()),
        console::bold(&status.package)
    );
    println!(
        "  last build   {} on {} ({})",
        status.last_build.status, status.last_build.branch, status.last_build.commit
    );
    println!("  success      {:.1}%", status.success_rate);
    println!("  avg duration {:.1}s", status.average_duration as f64 / 1000.0);

    for issue in &status.issues {
        console::warn(issue);
    }
}
