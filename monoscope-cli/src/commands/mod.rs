use anyhow::{Context, Result};
use clap::Args;
use monoscope_core::ci::{CiAggregator, providers_from_config};
use monoscope_core::operations::Scanner;
use monoscope_core::store::JsonStore;
use monoscope_core::{MonoscopeConfig, PackageInfo};
use std::path::PathBuf;
use std::sync::Arc;

pub mod ci;
pub mod cycles;
pub mod graph;
pub mod health;
pub mod layout;
pub mod log;
pub mod refresh;
pub mod scan;

/// Options shared by every command that reads a workspace.
#[derive(Args, Debug, Clone)]
pub struct WorkspaceArgs {
    /// Workspace root (defaults to the current directory)
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// Output JSON
    #[arg(long)]
    pub json: bool,
}

impl WorkspaceArgs {
    pub fn root(&self) -> Result<PathBuf> {
        match &self.root {
            Some(root) => Ok(root.clone()),
            None => std::env::current_dir().context("failed to read current directory"),
        }
    }
}

pub async fn scan_packages(config: &MonoscopeConfig, args: &WorkspaceArgs) -> Result<Vec<PackageInfo>> {
    let root = args.root()?;
    let scanner = Scanner::new(config);
    Ok(scanner.scan(&root).await?)
}

pub async fn open_store(config: &MonoscopeConfig) -> Result<JsonStore> {
    let path = config.store_path();
    JsonStore::open(&path)
        .await
        .with_context(|| format!("failed to open store at {}", path.display()))
}

pub fn ci_aggregator(config: &MonoscopeConfig) -> Result<Arc<CiAggregator>> {
    let providers = providers_from_config(config)?;
    Ok(Arc::new(CiAggregator::new(providers, config.ci_cache_ttl)))
}

pub fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
