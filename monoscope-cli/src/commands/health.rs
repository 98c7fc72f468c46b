use super::{WorkspaceArgs, open_store, print_json, scan_packages};
use anyhow::Result;
use clap::Args;
use monoscope_core::health::HealthScore;
use monoscope_core::store::Store;
use monoscope_core::{MonoscopeConfig, console};

#[derive(Args, Debug)]
pub struct HealthArgs {
    /// Only show this package
    pub package: Option<String>,

    #[command(flatten)]
    pub workspace: WorkspaceArgs,
}

pub async fn run(args: HealthArgs, config: &MonoscopeConfig) -> Result<()> {
    let store = open_store(config).await?;

    let scores: Vec<HealthScore> = match &args.package {
        Some(name) => store.find_health(name).await?.into_iter().collect(),
        None => {
            let packages = scan_packages(config, &args.workspace).await?;
            let mut scores = Vec::new();
            for package in &packages {
                if let Some(score) = store.find_health(&package.name).await? {
                    scores.push(score);
                }
            }
            scores
        }
    };

    if args.workspace.json {
        return match &args.package {
            Some(_) => print_json(&scores.first()),
            None => print_json(&scores),
        };
    }

    console::header("health", env!("CARGO_PKG_VERSION"));

    if scores.is_empty() {
        match &args.package {
            Some(name) => console::warn(&format!("no health recorded for {}", name)),
            None => console::warn("no health recorded yet"),
        }
        console::info("Run `monoscope refresh` to compute it.");
        return Ok(());
    }

    for score in &scores {
        let coverage = score
            .signals
            .test_coverage
            .map(|c| format!("{:.1}%", c))
            .unwrap_or_else(|| "-".to_string());

        println!(
            "{} {} {}",
            console::score(score.overall_score),
            console::status_badge(score.status),
            console::bold(&score.package)
        );
        println!(
            "    {}",
            console::dim(&format!(
                "build {}  coverage {}  lint {}  security {}",
                score.signals.build_status,
                coverage,
                score.signals.lint_status,
                score.signals.security_audit
            ))
        );
    }

    Ok(())
}
