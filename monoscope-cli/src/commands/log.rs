use super::{WorkspaceArgs, print_json, scan_packages};
use anyhow::Result;
use clap::Args;
use monoscope_core::operations::{package_commits, workspace_activity};
use monoscope_core::vcs::{Commit, DEFAULT_COMMIT_LIMIT, GitLog};
use monoscope_core::{MonoscopeConfig, console};
use time::format_description::well_known::Rfc3339;

#[derive(Args, Debug)]
pub struct LogArgs {
    /// Only show this package
    pub package: Option<String>,

    /// Maximum commits per package
    #[arg(short = 'n', long, default_value_t = DEFAULT_COMMIT_LIMIT)]
    pub limit: usize,

    #[command(flatten)]
    pub workspace: WorkspaceArgs,
}

pub async fn run(args: LogArgs, config: &MonoscopeConfig) -> Result<()> {
    let packages = scan_packages(config, &args.workspace).await?;

    let Some(name) = &args.package else {
        let activity = workspace_activity(&GitLog, &packages, args.limit).await;

        if args.workspace.json {
            return print_json(&activity);
        }

        console::header("log", env!("CARGO_PKG_VERSION"));
        for (package, commits) in &activity {
            console::step_with_count(package, commits.len());
            print_commits(commits);
        }
        return Ok(());
    };

    let commits = package_commits(&GitLog, &packages, name, args.limit).await?;

    if args.workspace.json {
        return print_json(&commits);
    }

    console::header("log", env!("CARGO_PKG_VERSION"));
    match commits {
        Some(commits) => print_commits(&commits),
        None => console::warn(&format!("{} is not a workspace package", name)),
    }
    Ok(())
}

fn print_commits(commits: &[Commit]) {
    for commit in commits {
        let short = commit.hash.get(..7).unwrap_or(&commit.hash);
        let date = commit.date.format(&Rfc3339).unwrap_or_default();

        println!(
            "  {} {:<8} {} {}",
            console::dim(short),
            commit.kind,
            commit.message,
            console::dim(&format!("{} {}", commit.author, date))
        );
    }
}
