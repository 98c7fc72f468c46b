use crate::project::{MANIFEST_FILE, Manifest, ManifestReader, PackageInfo};
use crate::{MonoscopeError, Result};
use futures::future::join_all;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const WORKSPACE_FILES: [&str; 2] = ["monoscope-workspace.yaml", "pnpm-workspace.yaml"];

#[derive(Debug, Default, Deserialize)]
pub struct WorkspaceConfig {
    #[serde(default)]
    pub packages: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternSource {
    Explicit,
    WorkspaceFile,
    RootManifest,
    None,
}

#[derive(Debug)]
pub struct Workspace {
    pub root: PathBuf,
    pub patterns: Vec<String>,
    pub source: PatternSource,
    pub packages: Vec<PackageInfo>,
}

impl Workspace {
    /// Resolves the workspace globs for `root` and parses every package they
    /// name. Only a missing root is an error; broken packages are skipped.
    pub async fn scan(
        root: &Path,
        explicit: &[String],
        reader: &dyn ManifestReader,
    ) -> Result<Self> {
        if !root.is_dir() {
            return Err(MonoscopeError::WorkspaceRootMissing {
                path: root.to_path_buf(),
            });
        }

        let (patterns, source) = resolve_patterns(root, explicit)?;

        if patterns.is_empty() {
            warn!(
                root = %root.display(),
                "no workspace globs configured; scan returns no packages"
            );
        }

        let dirs = expand_patterns(root, &patterns);
        let packages = read_packages(&dirs, reader).await;

        debug!(
            root = %root.display(),
            directories = dirs.len(),
            packages = packages.len(),
            "workspace scanned"
        );

        Ok(Workspace {
            root: root.to_path_buf(),
            patterns,
            source,
            packages,
        })
    }
}

/// Picks the glob list: explicit patterns, then a workspace yaml file, then
/// the root manifest's `workspaces` field.
pub fn resolve_patterns(root: &Path, explicit: &[String]) -> Result<(Vec<String>, PatternSource)> {
    if !explicit.is_empty() {
        return Ok((dedupe(explicit.iter().cloned()), PatternSource::Explicit));
    }

    for file in WORKSPACE_FILES {
        let path = root.join(file);
        if !path.is_file() {
            continue;
        }

        let config = match read_config(&path) {
            Ok(config) => config,
            Err(err) => {
                warn!(error = %err, "workspace file is unreadable; ignoring it");
                continue;
            }
        };

        if !config.packages.is_empty() {
            return Ok((dedupe(config.packages), PatternSource::WorkspaceFile));
        }
    }

    let manifest_path = root.join(MANIFEST_FILE);
    if manifest_path.is_file() {
        let patterns = match read_root_manifest(&manifest_path) {
            Ok(manifest) => manifest
                .workspaces
                .map(|w| w.patterns().to_vec())
                .unwrap_or_default(),
            Err(err) => {
                warn!(error = %err, "root manifest is unreadable; ignoring its workspaces");
                Vec::new()
            }
        };

        if !patterns.is_empty() {
            return Ok((dedupe(patterns), PatternSource::RootManifest));
        }
    }

    Ok((Vec::new(), PatternSource::None))
}

fn read_config(path: &Path) -> Result<WorkspaceConfig> {
    let data = fs::read_to_string(path).map_err(|source| MonoscopeError::ReadFile {
        path: path.to_path_buf(),
        source,
    })?;

    // An empty yaml document is a config with no packages.
    if data.trim().is_empty() {
        return Ok(WorkspaceConfig::default());
    }

    serde_yaml::from_str(&data).map_err(|err| MonoscopeError::WorkspaceConfig {
        path: path.to_path_buf(),
        reason: err.to_string(),
    })
}

fn read_root_manifest(path: &Path) -> Result<Manifest> {
    let data = fs::read_to_string(path).map_err(|source| MonoscopeError::ReadFile {
        path: path.to_path_buf(),
        source,
    })?;

    Manifest::parse(path, &data)
}

fn dedupe(patterns: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();

    for pattern in patterns {
        let trimmed = pattern.trim().trim_end_matches('/').to_string();
        if !trimmed.is_empty() && !out.contains(&trimmed) {
            out.push(trimmed);
        }
    }

    out
}

/// Expands patterns into package directories, in pattern order.
///
/// `dir/*` lists the immediate subdirectories of `dir`, a literal pattern
/// names one directory and is kept only if it exists, and a `!` prefix
/// removes matching directories from the result.
pub fn expand_patterns(root: &Path, patterns: &[String]) -> Vec<PathBuf> {
    let mut excludes = Vec::new();
    let mut dirs = Vec::new();
    let mut seen = BTreeSet::new();

    for pattern in patterns {
        if let Some(negated) = pattern.strip_prefix('!') {
            match glob::Pattern::new(negated.trim_start_matches("./")) {
                Ok(compiled) => excludes.push(compiled),
                Err(err) => warn!(pattern = %pattern, error = %err, "ignoring invalid exclusion"),
            }
            continue;
        }

        for dir in expand_one(root, pattern) {
            if seen.insert(dir.clone()) {
                dirs.push(dir);
            }
        }
    }

    if excludes.is_empty() {
        return dirs;
    }

    dirs.into_iter()
        .filter(|dir| {
            let relative = dir.strip_prefix(root).unwrap_or(dir.as_path());
            !excludes.iter().any(|exclude| exclude.matches_path(relative))
        })
        .collect()
}

fn expand_one(root: &Path, pattern: &str) -> Vec<PathBuf> {
    let pattern = pattern.trim_start_matches("./");

    if !is_glob(pattern) {
        let dir = root.join(pattern);
        if dir.is_dir() {
            return vec![dir];
        }

        warn!(pattern = %pattern, "workspace directory does not exist");
        return Vec::new();
    }

    let full = root.join(pattern).to_string_lossy().to_string();
    let entries = match glob::glob(&full) {
        Ok(entries) => entries,
        Err(err) => {
            warn!(pattern = %pattern, error = %err, "ignoring invalid workspace glob");
            return Vec::new();
        }
    };

    let mut dirs: Vec<PathBuf> = entries
        .filter_map(|entry| match entry {
            Ok(path) => Some(path),
            Err(err) => {
                warn!(pattern = %pattern, error = %err, "skipping unreadable glob entry");
                None
            }
        })
        .filter(|path| path.is_dir())
        .collect();

    dirs.sort();
    dirs
}

fn is_glob(pattern: &str) -> bool {
    pattern.contains(['*', '?', '['])
}

async fn read_packages(dirs: &[PathBuf], reader: &dyn ManifestReader) -> Vec<PackageInfo> {
    let reads = dirs.iter().map(|dir| async move {
        let manifest = reader.read(dir).await;
        (dir, manifest)
    });

    let mut packages: Vec<PackageInfo> = Vec::new();

    for (dir, manifest) in join_all(reads).await {
        let manifest = match manifest {
            Ok(Some(manifest)) => manifest,
            Ok(None) => {
                debug!(dir = %dir.display(), "no manifest; not a package");
                continue;
            }
            Err(err) => {
                warn!(dir = %dir.display(), error = %err, "skipping package with unreadable manifest");
                continue;
            }
        };

        let info = match PackageInfo::from_manifest(manifest, dir) {
            Ok(info) => info,
            Err(err) => {
                warn!(error = %err, "skipping invalid package");
                continue;
            }
        };

        if packages.iter().any(|existing| existing.name == info.name) {
            warn!(
                name = %info.name,
                dir = %dir.display(),
                "duplicate package name; keeping the first occurrence"
            );
            continue;
        }

        packages.push(info);
    }

    packages
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::FsManifestReader;

    fn write(path: &Path, contents: &str) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, contents).unwrap();
    }

    #[tokio::test]
    async fn directory_without_manifest_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(
            &root.join("packages/a/package.json"),
            r#"{ "name": "a", "version": "1.0.0" }"#,
        );
        fs::create_dir_all(root.join("packages/b")).unwrap();

        let patterns = vec!["packages/*".to_string()];
        let workspace = Workspace::scan(root, &patterns, &FsManifestReader)
            .await
            .unwrap();

        assert_eq!(workspace.packages.len(), 1);
        assert_eq!(workspace.packages[0].name, "a");
        assert_eq!(workspace.source, PatternSource::Explicit);
    }

    #[tokio::test]
    async fn literal_patterns_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(&root.join("tools/cli/package.json"), r#"{ "name": "cli" }"#);

        let patterns = vec!["tools/cli".to_string(), "tools/missing".to_string()];
        let workspace = Workspace::scan(root, &patterns, &FsManifestReader)
            .await
            .unwrap();

        let names: Vec<_> = workspace.packages.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["cli"]);
    }

    #[tokio::test]
    async fn falls_back_to_root_manifest_workspaces() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(
            &root.join("package.json"),
            r#"{ "name": "repo", "workspaces": { "packages": ["apps/*"] } }"#,
        );
        write(&root.join("apps/web/package.json"), r#"{ "name": "web" }"#);

        let workspace = Workspace::scan(root, &[], &FsManifestReader).await.unwrap();

        assert_eq!(workspace.source, PatternSource::RootManifest);
        assert_eq!(workspace.patterns, vec!["apps/*"]);
        assert_eq!(workspace.packages.len(), 1);
    }

    #[test]
    fn workspace_yaml_wins_over_root_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(&root.join("pnpm-workspace.yaml"), "packages:\n  - \"libs/*\"\n");
        write(
            &root.join("package.json"),
            r#"{ "name": "repo", "workspaces": ["apps/*"] }"#,
        );

        let (patterns, source) = resolve_patterns(root, &[]).unwrap();

        assert_eq!(patterns, vec!["libs/*"]);
        assert_eq!(source, PatternSource::WorkspaceFile);
    }

    #[tokio::test]
    async fn malformed_workspace_yaml_falls_through() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(&root.join("pnpm-workspace.yaml"), "packages: [unclosed\n");
        write(&root.join("apps/web/package.json"), r#"{ "name": "web" }"#);

        let workspace = Workspace::scan(root, &[], &FsManifestReader).await.unwrap();
        assert!(workspace.packages.is_empty());
        assert_eq!(workspace.source, PatternSource::None);

        write(
            &root.join("package.json"),
            r#"{ "name": "repo", "workspaces": ["apps/*"] }"#,
        );

        let workspace = Workspace::scan(root, &[], &FsManifestReader).await.unwrap();
        assert_eq!(workspace.source, PatternSource::RootManifest);
        assert_eq!(workspace.packages.len(), 1);
    }

    #[tokio::test]
    async fn no_globs_yields_empty_scan() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(&root.join("package.json"), r#"{ "name": "solo" }"#);

        let workspace = Workspace::scan(root, &[], &FsManifestReader).await.unwrap();

        assert!(workspace.packages.is_empty());
        assert_eq!(workspace.source, PatternSource::None);
    }

    #[tokio::test]
    async fn missing_root_is_a_hard_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");

        let err = Workspace::scan(&missing, &[], &FsManifestReader)
            .await
            .unwrap_err();

        assert!(matches!(err, MonoscopeError::WorkspaceRootMissing { .. }));
    }

    #[tokio::test]
    async fn malformed_and_duplicate_packages_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(&root.join("packages/a/package.json"), r#"{ "name": "a" }"#);
        write(&root.join("packages/b/package.json"), "{ broken");
        write(&root.join("packages/c/package.json"), r#"{ "name": "a" }"#);

        let patterns = vec!["packages/*".to_string()];
        let workspace = Workspace::scan(root, &patterns, &FsManifestReader)
            .await
            .unwrap();

        assert_eq!(workspace.packages.len(), 1);
        assert!(workspace.packages[0].path.ends_with("packages/a"));
    }

    #[test]
    fn exclusions_remove_matching_directories() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("packages/a")).unwrap();
        fs::create_dir_all(root.join("packages/fixtures")).unwrap();

        let patterns = vec!["packages/*".to_string(), "!packages/fixtures".to_string()];
        let dirs = expand_patterns(root, &patterns);

        assert_eq!(dirs, vec![root.join("packages/a")]);
    }

    #[test]
    fn duplicate_patterns_collapse() {
        let patterns = dedupe(vec![
            "packages/*".to_string(),
            "packages/*/".to_string(),
            " ".to_string(),
        ]);

        assert_eq!(patterns, vec!["packages/*"]);
    }
}
