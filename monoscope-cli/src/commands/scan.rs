use super::{WorkspaceArgs, print_json};
use anyhow::Result;
use clap::Args;
use monoscope_core::operations::Scanner;
use monoscope_core::workspace::PatternSource;
use monoscope_core::{MonoscopeConfig, console};

#[derive(Args, Debug)]
pub struct ScanArgs {
    #[command(flatten)]
    pub workspace: WorkspaceArgs,
}

pub async fn run(args: ScanArgs, config: &MonoscopeConfig) -> Result<()> {
    let root = args.workspace.root()?;

    if args.workspace.json {
        let packages = Scanner::new(config).scan(&root).await?;
        return print_json(&packages);
    }

    console::header("scan", env!("CARGO_PKG_VERSION"));

    let workspace = Scanner::new(config).scan_workspace(&root).await?;

    let source = match workspace.source {
        PatternSource::Explicit => "configuration",
        PatternSource::WorkspaceFile => "workspace file",
        PatternSource::RootManifest => "package.json",
        PatternSource::None => "nothing",
    };
    console::step(&format!("globs from {}: {}", source, workspace.patterns.join(", ")));

    if workspace.packages.is_empty() {
        console::warn("no packages found");
        return Ok(());
    }

    console::step_with_count("Packages", workspace.packages.len());
    for package in &workspace.packages {
        let path = package
            .path
            .strip_prefix(&workspace.root)
            .unwrap_or(package.path.as_path());

        println!(
            "  {} {} {} {}",
            console::bold(&package.name),
            package.version,
            console::dim(package.kind.as_str()),
            console::dim(&path.display().to_string())
        );
    }

    console::summary(&format!("scanned {} packages", workspace.packages.len()));
    Ok(())
}
