use super::{WorkspaceArgs, print_json, scan_packages};
use anyhow::Result;
use clap::Args;
use monoscope_core::graph::{DependencyGraph, LayoutAlgorithm, layout};
use monoscope_core::{MonoscopeConfig, console};

#[derive(Args, Debug)]
pub struct LayoutArgs {
    #[command(flatten)]
    pub workspace: WorkspaceArgs,

    /// layered, radial or force
    #[arg(long, default_value = "layered")]
    pub algorithm: LayoutAlgorithm,

    #[arg(long, default_value_t = 800.0)]
    pub width: f64,

    #[arg(long, default_value_t = 600.0)]
    pub height: f64,
}

pub async fn run(args: LayoutArgs, config: &MonoscopeConfig) -> Result<()> {
    let packages = scan_packages(config, &args.workspace).await?;
    let graph = DependencyGraph::from_packages(&packages);
    let nodes = layout(&graph, args.algorithm, args.width, args.height);

    if args.workspace.json {
        return print_json(&nodes);
    }

    console::header("layout", env!("CARGO_PKG_VERSION"));

    for node in &nodes {
        let layer = node
            .layer
            .map(|layer| format!(" layer {}", layer))
            .unwrap_or_default();
        println!(
            "  {:<32} {:>8.1} {:>8.1}{}",
            node.name,
            node.x,
            node.y,
            console::dim(&layer)
        );
    }

    console::summary(&format!(
        "{} layout of {} packages on {}x{}",
        args.algorithm,
        nodes.len(),
        args.width,
        args.height
    ));
    Ok(())
}
