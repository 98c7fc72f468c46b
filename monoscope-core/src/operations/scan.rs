use crate::cache::TtlCache;
use crate::config::MonoscopeConfig;
use crate::project::{FsManifestReader, ManifestReader, PackageInfo};
use crate::{Result, Workspace};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Workspace scanning with a short-lived cache of package lists per root.
pub struct Scanner {
    patterns: Vec<String>,
    reader: Arc<dyn ManifestReader>,
    cache: TtlCache<PathBuf, Vec<PackageInfo>>,
}

impl Scanner {
    pub fn new(config: &MonoscopeConfig) -> Self {
        Scanner::with_reader(
            config.workspaces.clone(),
            Arc::new(FsManifestReader),
            config.scan_cache_ttl,
        )
    }

    pub fn with_reader(
        patterns: Vec<String>,
        reader: Arc<dyn ManifestReader>,
        ttl: Duration,
    ) -> Self {
        Scanner {
            patterns,
            reader,
            cache: TtlCache::new(ttl),
        }
    }

    /// Packages under `root`, served from cache while fresh.
    pub async fn scan(&self, root: &Path) -> Result<Vec<PackageInfo>> {
        let key = root.to_path_buf();

        if let Some(packages) = self.cache.get(&key) {
            debug!(root = %root.display(), "scan cache hit");
            return Ok(packages);
        }

        let workspace = self.scan_workspace(root).await?;
        self.cache.insert(key, workspace.packages.clone());
        Ok(workspace.packages)
    }

    /// Drops any cached result for `root` and scans again.
    pub async fn rescan(&self, root: &Path) -> Result<Vec<PackageInfo>> {
        self.cache.invalidate(&root.to_path_buf());
        self.scan(root).await
    }

    /// Uncached scan that keeps the resolved glob list alongside the packages.
    pub async fn scan_workspace(&self, root: &Path) -> Result<Workspace> {
        Workspace::scan(root, &self.patterns, self.reader.as_ref()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::Manifest;
    use async_trait::async_trait;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    #[derive(Default)]
    struct CountingReader {
        reads: AtomicUsize,
    }

    #[async_trait]
    impl ManifestReader for CountingReader {
        async fn read(&self, dir: &Path) -> Result<Option<Manifest>> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            FsManifestReader.read(dir).await
        }
    }

    fn fixture() -> tempfile::TempDir {
        let dir = tempdir().unwrap();
        let pkg = dir.path().join("packages").join("core");
        fs::create_dir_all(&pkg).unwrap();
        fs::write(pkg.join("package.json"), r#"{ "name": "core", "version": "1.0.0" }"#).unwrap();
        dir
    }

    #[tokio::test]
    async fn repeated_scans_hit_the_cache() {
        let dir = fixture();
        let reader = Arc::new(CountingReader::default());
        let scanner = Scanner::with_reader(
            vec!["packages/*".to_string()],
            reader.clone(),
            Duration::from_secs(60),
        );

        let first = scanner.scan(dir.path()).await.unwrap();
        let second = scanner.scan(dir.path()).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(reader.reads.load(Ordering::SeqCst), 1);

        scanner.rescan(dir.path()).await.unwrap();
        assert_eq!(reader.reads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn missing_root_is_not_cached() {
        let dir = tempdir().unwrap();
        let scanner = Scanner::with_reader(
            Vec::new(),
            Arc::new(FsManifestReader),
            Duration::from_secs(60),
        );

        assert!(scanner.scan(&dir.path().join("nope")).await.is_err());
    }
}
