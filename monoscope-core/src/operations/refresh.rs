use super::scan::Scanner;
use crate::health::{HealthScore, SignalSource};
use crate::store::{PackageRecord, Store, save_package};
use crate::{MonoscopeError, Result};
use futures::future::{BoxFuture, FutureExt, Shared, join_all};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshSummary {
    pub total: usize,
    pub healthy: usize,
    pub unhealthy: usize,
    /// Packages whose signals could not be collected. Not counted as healthy
    /// or unhealthy.
    pub failed: usize,
    pub average_score: f64,
}

type RefreshOutcome = std::result::Result<RefreshSummary, Arc<MonoscopeError>>;
type SharedRefresh = Shared<BoxFuture<'static, RefreshOutcome>>;

struct InFlight {
    id: u64,
    future: SharedRefresh,
}

/// Everything one refresh needs, shared with the spawned task.
struct Refresher {
    scanner: Arc<Scanner>,
    store: Arc<dyn Store>,
    signals: Arc<dyn SignalSource>,
}

/// Runs full health refreshes one at a time per workspace root. Callers that
/// arrive while a refresh of the same root is running wait on that refresh
/// instead of starting another.
///
/// The work runs in its own task, so it completes even if every caller stops
/// waiting.
pub struct RefreshCoordinator {
    refresher: Arc<Refresher>,
    in_flight: Arc<Mutex<HashMap<PathBuf, InFlight>>>,
    next_id: AtomicU64,
}

impl RefreshCoordinator {
    pub fn new(
        scanner: Arc<Scanner>,
        store: Arc<dyn Store>,
        signals: Arc<dyn SignalSource>,
    ) -> Self {
        RefreshCoordinator {
            refresher: Arc::new(Refresher {
                scanner,
                store,
                signals,
            }),
            in_flight: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(0),
        }
    }

    pub fn is_refreshing(&self) -> bool {
        let slots = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        !slots.is_empty()
    }

    pub async fn refresh_health(&self, root: &Path) -> Result<RefreshSummary> {
        let future = self.join_or_start(root);
        future.await.map_err(MonoscopeError::Refresh)
    }

    pub async fn get_package_health(&self, name: &str) -> Result<Option<HealthScore>> {
        self.refresher.store.find_health(name).await
    }

    fn join_or_start(&self, root: &Path) -> SharedRefresh {
        let mut slots = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(flight) = slots.get(root) {
            debug!(id = flight.id, root = %root.display(), "joining in-flight refresh");
            return flight.future.clone();
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let refresher = Arc::clone(&self.refresher);
        let in_flight = Arc::clone(&self.in_flight);
        let task_root = root.to_path_buf();

        // The map lock is held until the handle is stored, so the task
        // cannot clear its slot before it is filled.
        let handle = tokio::spawn(async move {
            let outcome = refresher.run(&task_root).await.map_err(Arc::new);

            let mut slots = in_flight.lock().unwrap_or_else(|e| e.into_inner());
            if slots.get(&task_root).is_some_and(|flight| flight.id == id) {
                slots.remove(&task_root);
            }

            outcome
        });

        let future = async move {
            match handle.await {
                Ok(outcome) => outcome,
                Err(e) => Err(Arc::new(MonoscopeError::Task {
                    reason: e.to_string(),
                })),
            }
        }
        .boxed()
        .shared();

        slots.insert(
            root.to_path_buf(),
            InFlight {
                id,
                future: future.clone(),
            },
        );

        future
    }
}

struct PackageOutcome {
    score: HealthScore,
    collected: bool,
}

impl Refresher {
    async fn run(&self, root: &Path) -> Result<RefreshSummary> {
        let started = std::time::Instant::now();
        let scanned = self.scanner.rescan(root).await?;

        for package in scanned {
            let name = package.name.clone();
            if let Err(e) = save_package(self.store.as_ref(), PackageRecord::new(package)).await {
                warn!(package = %name, error = %e, "failed to store package");
            }
        }

        let records = self.store.find_all_packages().await?;
        let outcomes = join_all(records.iter().map(|record| self.refresh_package(record))).await;
        let summary = summarize(&outcomes);

        info!(
            total = summary.total,
            healthy = summary.healthy,
            unhealthy = summary.unhealthy,
            failed = summary.failed,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "health refresh complete"
        );

        Ok(summary)
    }

    async fn refresh_package(&self, record: &PackageRecord) -> PackageOutcome {
        let name = record.name();

        let (score, collected) = match self.signals.collect(&record.info).await {
            Ok(signals) => (HealthScore::new(name, signals), true),
            Err(e) => {
                warn!(package = %name, error = %e, "signal collection failed");
                (HealthScore::zeroed(name), false)
            }
        };

        let status = score.status;
        if let Err(e) = self.store.upsert_health(score.clone()).await {
            warn!(package = %name, error = %e, "failed to store health");
        }
        match self.store.update_package_status(name, status).await {
            Ok(true) => {}
            Ok(false) => debug!(package = %name, "package vanished before status update"),
            Err(e) => warn!(package = %name, error = %e, "failed to update package status"),
        }

        PackageOutcome { score, collected }
    }
}

fn summarize(outcomes: &[PackageOutcome]) -> RefreshSummary {
    let collected: Vec<&HealthScore> = outcomes
        .iter()
        .filter(|outcome| outcome.collected)
        .map(|outcome| &outcome.score)
        .collect();

    let healthy = collected.iter().filter(|score| score.is_healthy()).count();
    let average_score = if collected.is_empty() {
        0.0
    } else {
        let total: f64 = collected.iter().map(|s| s.overall_score as f64).sum();
        (total / collected.len() as f64 * 10.0).round() / 10.0
    };

    RefreshSummary {
        total: outcomes.len(),
        healthy,
        unhealthy: collected.len() - healthy,
        failed: outcomes.len() - collected.len(),
        average_score,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::{BuildState, CheckState, HealthSignals, HealthStatus};
    use crate::project::{FsManifestReader, PackageInfo};
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use std::fs;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use tempfile::{TempDir, tempdir};

    /// Delegates to a memory store and counts package listings.
    #[derive(Default)]
    struct CountingStore {
        inner: MemoryStore,
        listings: AtomicUsize,
    }

    #[async_trait]
    impl Store for CountingStore {
        async fn insert_package(&self, record: PackageRecord) -> Result<()> {
            self.inner.insert_package(record).await
        }

        async fn upsert_package(&self, record: PackageRecord) -> Result<()> {
            self.inner.upsert_package(record).await
        }

        async fn find_all_packages(&self) -> Result<Vec<PackageRecord>> {
            self.listings.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.inner.find_all_packages().await
        }

        async fn upsert_health(&self, score: HealthScore) -> Result<()> {
            self.inner.upsert_health(score).await
        }

        async fn find_health(&self, name: &str) -> Result<Option<HealthScore>> {
            self.inner.find_health(name).await
        }

        async fn update_package_status(
            &self,
            name: &str,
            status: crate::health::HealthStatus,
        ) -> Result<bool> {
            self.inner.update_package_status(name, status).await
        }
    }

    /// Perfect signals for every package except `broken`.
    struct FixedSignals;

    #[async_trait]
    impl SignalSource for FixedSignals {
        async fn collect(&self, package: &PackageInfo) -> Result<HealthSignals> {
            if package.name == "broken" {
                return Err(MonoscopeError::Signals {
                    package: package.name.clone(),
                    reason: "provider offline".to_string(),
                });
            }

            let lint_status = if package.name == "ui" {
                CheckState::Fail
            } else {
                CheckState::Pass
            };

            Ok(HealthSignals {
                build_status: BuildState::Success,
                test_coverage: Some(100.0),
                lint_status,
                security_audit: CheckState::Pass,
            })
        }
    }

    fn workspace(names: &[&str]) -> TempDir {
        let dir = tempdir().unwrap();
        for name in names {
            let pkg = dir.path().join("packages").join(name);
            fs::create_dir_all(&pkg).unwrap();
            fs::write(
                pkg.join("package.json"),
                format!(r#"{{ "name": "{}", "version": "1.0.0" }}"#, name),
            )
            .unwrap();
        }
        dir
    }

    fn coordinator(store: Arc<CountingStore>) -> RefreshCoordinator {
        let scanner = Arc::new(Scanner::with_reader(
            vec!["packages/*".to_string()],
            Arc::new(FsManifestReader),
            Duration::from_secs(60),
        ));
        RefreshCoordinator::new(scanner, store, Arc::new(FixedSignals))
    }

    #[tokio::test]
    async fn overlapping_refreshes_share_one_run() {
        let dir = workspace(&["core", "ui"]);
        let store = Arc::new(CountingStore::default());
        let coordinator = coordinator(store.clone());

        let (first, second) = tokio::join!(
            coordinator.refresh_health(dir.path()),
            coordinator.refresh_health(dir.path())
        );

        let first = first.unwrap();
        assert_eq!(first, second.unwrap());
        assert_eq!(store.listings.load(Ordering::SeqCst), 1);
        assert!(!coordinator.is_refreshing());

        coordinator.refresh_health(dir.path()).await.unwrap();
        assert_eq!(store.listings.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failed_packages_are_isolated() {
        let dir = workspace(&["core", "ui", "broken"]);
        let store = Arc::new(CountingStore::default());
        let coordinator = coordinator(store.clone());

        let summary = coordinator.refresh_health(dir.path()).await.unwrap();

        assert_eq!(summary.total, 3);
        assert_eq!(summary.healthy, 1);
        assert_eq!(summary.unhealthy, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.average_score, 87.5);

        let broken = coordinator.get_package_health("broken").await.unwrap().unwrap();
        assert_eq!(broken.overall_score, 0);

        let records = store.inner.find_all_packages().await.unwrap();
        let ui = records.iter().find(|r| r.name() == "ui").unwrap();
        assert_eq!(ui.status, Some(HealthStatus::Warning));
    }

    #[tokio::test]
    async fn rerunning_against_stored_packages_succeeds() {
        let dir = workspace(&["core"]);
        let store = Arc::new(CountingStore::default());
        let coordinator = coordinator(store.clone());

        coordinator.refresh_health(dir.path()).await.unwrap();
        let summary = coordinator.refresh_health(dir.path()).await.unwrap();

        assert_eq!(summary.total, 1);
        assert_eq!(summary.healthy, 1);
        assert!(coordinator.get_package_health("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn refreshes_of_different_roots_run_separately() {
        let dir = workspace(&["core", "ui"]);
        let missing = dir.path().join("missing");
        let store = Arc::new(CountingStore::default());
        let coordinator = coordinator(store.clone());

        let (present, absent) = tokio::join!(
            coordinator.refresh_health(dir.path()),
            coordinator.refresh_health(&missing)
        );

        assert_eq!(present.unwrap().total, 2);
        assert!(matches!(absent.unwrap_err(), MonoscopeError::Refresh(_)));
        assert_eq!(store.listings.load(Ordering::SeqCst), 1);
        assert!(!coordinator.is_refreshing());
    }

    #[tokio::test]
    async fn missing_root_fails_and_clears_the_slot() {
        let dir = tempdir().unwrap();
        let store = Arc::new(CountingStore::default());
        let coordinator = coordinator(store);

        let err = coordinator
            .refresh_health(&dir.path().join("missing"))
            .await
            .unwrap_err();

        assert!(matches!(err, MonoscopeError::Refresh(_)));
        assert!(!coordinator.is_refreshing());
    }
}
