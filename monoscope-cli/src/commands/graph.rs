use super::{WorkspaceArgs, print_json, scan_packages};
use anyhow::Result;
use clap::Args;
use monoscope_core::graph::build_graph;
use monoscope_core::{MonoscopeConfig, console};

#[derive(Args, Debug)]
pub struct GraphArgs {
    #[command(flatten)]
    pub workspace: WorkspaceArgs,

    /// Show what depends on this package instead of the whole graph
    #[arg(long)]
    pub dependents: Option<String>,
}

pub async fn run(args: GraphArgs, config: &MonoscopeConfig) -> Result<()> {
    let packages = scan_packages(config, &args.workspace).await?;
    let analysis = build_graph(&packages);

    if let Some(name) = &args.dependents {
        let dependents = analysis.graph.dependents_of(name);
        if args.workspace.json {
            return print_json(&dependents);
        }

        console::header("graph", env!("CARGO_PKG_VERSION"));
        if !analysis.graph.contains(name) {
            console::warn(&format!("{} is not a workspace package", name));
            return Ok(());
        }
        console::step_with_count(&format!("Dependents of {}", name), dependents.len());
        for dependent in dependents {
            println!("  {}", dependent);
        }
        return Ok(());
    }

    if args.workspace.json {
        return print_json(&analysis);
    }

    console::header("graph", env!("CARGO_PKG_VERSION"));

    let stats = &analysis.stats;
    println!("{}", console::bold("Statistics"));
    println!("  packages          {}", stats.total_packages);
    println!("  dependencies      {}", stats.total_dependencies);
    println!("  leaf packages     {}", stats.leaf_packages);
    println!("  root packages     {}", stats.root_packages);
    println!("  max depth         {}", stats.max_depth);
    println!("  avg dependencies  {:.1}", stats.avg_dependencies);
    println!();

    console::step_with_count("Internal edges", analysis.graph.edges.len());
    for edge in &analysis.graph.edges {
        println!(
            "  {} -> {} {}",
            edge.from,
            edge.to,
            console::dim(&edge.range)
        );
    }

    if !stats.version_mismatches.is_empty() {
        println!();
        for mismatch in &stats.version_mismatches {
            console::warn(&format!(
                "{} wants {}@{} but the workspace has {}",
                mismatch.from, mismatch.to, mismatch.range, mismatch.actual
            ));
        }
    }

    console::summary(&format!(
        "{} packages, {} internal edges",
        stats.total_packages,
        analysis.graph.edges.len()
    ));
    Ok(())
}
