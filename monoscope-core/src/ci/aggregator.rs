use super::provider::CiProvider;
use super::types::{BuildRecord, CiBuildStatus, MonorepoCiStatus, PackageCiSummary};
use crate::cache::TtlCache;
use crate::health::{BuildState, HealthStatus};
use crate::project::PackageInfo;
use crate::{MonoscopeError, Result};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub const HISTORY_LIMIT: usize = 10;
const HEALTH_WINDOW: usize = 5;
const ISSUE_WINDOW: usize = 3;
const HEALTHY_SUCCESS_RATE: f64 = 80.0;
const FAILURE_RATE_THRESHOLD: f64 = 50.0;
const SLOW_BUILD_MS: u64 = 10 * 60 * 1000;
const MONOREPO_KEY: &str = "monorepo";

/// Merges build records from every registered provider into per-package and
/// whole-repository CI status, caching both for a fixed TTL.
pub struct CiAggregator {
    providers: Vec<Arc<dyn CiProvider>>,
    package_cache: TtlCache<String, Option<CiBuildStatus>>,
    monorepo_cache: TtlCache<&'static str, MonorepoCiStatus>,
}

impl CiAggregator {
    pub fn new(providers: Vec<Arc<dyn CiProvider>>, ttl: Duration) -> Self {
        CiAggregator {
            providers,
            package_cache: TtlCache::new(ttl),
            monorepo_cache: TtlCache::new(ttl),
        }
    }

    pub fn has_providers(&self) -> bool {
        !self.providers.is_empty()
    }

    pub async fn get_package_ci_status(
        &self,
        package: &str,
        provider: Option<&str>,
    ) -> Result<Option<CiBuildStatus>> {
        let key = cache_key(package, provider);

        if let Some(cached) = self.package_cache.get(&key) {
            debug!(%key, "CI status cache hit");
            return Ok(cached);
        }

        let selected = self.select_providers(provider)?;
        let builds = fetch_all(&selected, package).await;
        let status = summarize(package, builds);

        self.package_cache.insert(key, status.clone());
        Ok(status)
    }

    pub async fn get_monorepo_ci_status(&self, packages: &[PackageInfo]) -> MonorepoCiStatus {
        if let Some(cached) = self.monorepo_cache.get(&MONOREPO_KEY) {
            debug!("monorepo CI status cache hit");
            return cached;
        }

        let lookups = packages.iter().map(|package| async move {
            let status = match self.get_package_ci_status(&package.name, None).await {
                Ok(status) => status,
                Err(e) => {
                    warn!(package = %package.name, error = %e, "CI status unavailable");
                    None
                }
            };
            (package.name.clone(), status)
        });

        let mut aggregate = MonorepoCiStatus {
            total_packages: packages.len(),
            ..MonorepoCiStatus::default()
        };

        for (name, status) in join_all(lookups).await {
            let Some(status) = status else {
                aggregate.without_builds.push(name);
                continue;
            };

            if let Some(tests) = status.latest_tests() {
                aggregate.tests.merge(&tests);
            }
            if let Some(coverage) = status.latest_coverage() {
                aggregate.coverage.insert(name.clone(), coverage);
            }

            let classification = status.status();
            match classification {
                HealthStatus::Healthy => aggregate.healthy += 1,
                HealthStatus::Warning => aggregate.warning += 1,
                HealthStatus::Error => aggregate.error += 1,
            }

            aggregate.packages.push(PackageCiSummary {
                name,
                status: classification,
                success_rate: status.success_rate,
                last_build: status.last_build.status,
                issues: status.issues,
            });
        }

        self.monorepo_cache.insert(MONOREPO_KEY, aggregate.clone());
        aggregate
    }

    fn select_providers(&self, provider: Option<&str>) -> Result<Vec<Arc<dyn CiProvider>>> {
        let Some(wanted) = provider else {
            return Ok(self.providers.clone());
        };

        let selected: Vec<_> = self
            .providers
            .iter()
            .filter(|p| p.name() == wanted)
            .cloned()
            .collect();

        if selected.is_empty() {
            return Err(MonoscopeError::UnknownProvider {
                name: wanted.to_string(),
            });
        }

        Ok(selected)
    }
}

fn cache_key(package: &str, provider: Option<&str>) -> String {
    match provider {
        Some(provider) => format!("{}:{}", package, provider),
        None => package.to_string(),
    }
}

/// A failing provider contributes no builds; the others still count.
async fn fetch_all(providers: &[Arc<dyn CiProvider>], package: &str) -> Vec<BuildRecord> {
    let results = join_all(providers.iter().map(|provider| async move {
        (provider.name(), provider.fetch_builds(package).await)
    }))
    .await;

    let mut builds = Vec::new();
    for (name, result) in results {
        match result {
            Ok(mut records) => builds.append(&mut records),
            Err(e) => warn!(provider = name, %package, error = %e, "CI provider failed"),
        }
    }
    builds
}

/// Reduces raw build records to a [`CiBuildStatus`]. `None` when there are
/// no builds at all.
pub fn summarize(package: &str, mut builds: Vec<BuildRecord>) -> Option<CiBuildStatus> {
    builds.sort_by(|a, b| b.start_time.cmp(&a.start_time));
    let last_build = builds.first()?.clone();

    let overall_rate = success_rate(&builds);
    let mean_duration = average_duration(&builds).unwrap_or(0);
    let recent_rate = success_rate(&builds[..builds.len().min(HEALTH_WINDOW)]);
    let issues = detect_issues(&builds[..builds.len().min(ISSUE_WINDOW)]);

    builds.truncate(HISTORY_LIMIT);

    Some(CiBuildStatus {
        package: package.to_string(),
        last_build,
        build_history: builds,
        success_rate: overall_rate,
        average_duration: mean_duration,
        is_healthy: recent_rate >= HEALTHY_SUCCESS_RATE,
        issues,
    })
}

fn success_rate(builds: &[BuildRecord]) -> f64 {
    if builds.is_empty() {
        return 0.0;
    }

    let successes = builds.iter().filter(|b| b.is_success()).count();
    successes as f64 / builds.len() as f64 * 100.0
}

fn average_duration(builds: &[BuildRecord]) -> Option<u64> {
    let durations: Vec<u64> = builds.iter().filter_map(|b| b.effective_duration()).collect();

    if durations.is_empty() {
        return None;
    }

    let total: u128 = durations.iter().map(|&d| u128::from(d)).sum();
    let mean = total / durations.len() as u128;
    Some(u64::try_from(mean).unwrap_or(u64::MAX))
}

fn detect_issues(recent: &[BuildRecord]) -> Vec<String> {
    let mut issues = Vec::new();

    if recent.is_empty() {
        return issues;
    }

    let rate = success_rate(recent);
    if rate < FAILURE_RATE_THRESHOLD {
        issues.push(format!(
            "High failure rate: {:.0}% of the last {} builds succeeded",
            rate,
            recent.len()
        ));
    }

    for build in recent {
        for step in &build.steps {
            if step.status != BuildState::Failed {
                continue;
            }
            if let Some(error) = &step.error {
                issues.push(format!("Step '{}' failed: {}", step.name, error));
            }
        }
    }

    match average_duration(recent) {
        Some(average) if average > SLOW_BUILD_MS => issues.push(format!(
            "Slow builds: average duration {} min exceeds 10 min",
            average / 60_000
        )),
        _ => {}
    }

    issues
}
