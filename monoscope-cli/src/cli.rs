use crate::commands;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "monoscope",
    about = "dependency graph and health analysis for JavaScript monorepos",
    version,
    color = clap::ColorChoice::Auto
)]
pub struct Cli {
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List the packages in a workspace
    Scan(commands::scan::ScanArgs),
    /// Show the internal dependency graph and its statistics
    Graph(commands::graph::GraphArgs),
    /// Report circular dependencies between packages
    Cycles(commands::cycles::CyclesArgs),
    /// Compute node positions for drawing the graph
    Layout(commands::layout::LayoutArgs),
    /// Show stored health scores
    Health(commands::health::HealthArgs),
    /// Recompute and store health for every package
    Refresh(commands::refresh::RefreshArgs),
    /// Show CI build status for a package or the whole workspace
    Ci(commands::ci::CiArgs),
    /// Show recent commits for a package
    Log(commands::log::LogArgs),
}
