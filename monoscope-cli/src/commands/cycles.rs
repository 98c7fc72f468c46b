use super::{WorkspaceArgs, print_json, scan_packages};
use anyhow::Result;
use clap::Args;
use monoscope_core::graph::detect_cycles;
use monoscope_core::{MonoscopeConfig, console};

#[derive(Args, Debug)]
pub struct CyclesArgs {
    #[command(flatten)]
    pub workspace: WorkspaceArgs,
}

pub async fn run(args: CyclesArgs, config: &MonoscopeConfig) -> Result<()> {
    let packages = scan_packages(config, &args.workspace).await?;
    let cycles = detect_cycles(&packages);

    if args.workspace.json {
        return print_json(&cycles);
    }

    console::header("cycles", env!("CARGO_PKG_VERSION"));

    if cycles.is_empty() {
        console::summary("no circular dependencies");
        return Ok(());
    }

    for report in &cycles {
        let mut path = report.cycle.join(" -> ");
        if let Some(first) = report.cycle.first() {
            path.push_str(" -> ");
            path.push_str(first);
        }

        println!("{} {}", console::severity_badge(report.severity), path);
        println!("  {}", console::dim(&report.impact));
    }

    console::summary(&format!("{} circular dependencies", cycles.len()));
    Ok(())
}
