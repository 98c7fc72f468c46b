use super::{BuildState, CheckState, HealthSignals};
use crate::ci::{BuildRecord, CiAggregator, CiBuildStatus};
use crate::project::PackageInfo;
use crate::{MonoscopeError, Result};
use async_trait::async_trait;
use std::sync::Arc;

const LINT_STEPS: &[&str] = &["lint"];
const SECURITY_STEPS: &[&str] = &["audit", "security"];

/// Produces the raw inputs to a package's health score.
#[async_trait]
pub trait SignalSource: Send + Sync {
    async fn collect(&self, package: &PackageInfo) -> Result<HealthSignals>;
}

/// Reads signals off CI build history. Packages without builds get all
/// signals unknown.
pub struct CiSignalSource {
    aggregator: Arc<CiAggregator>,
}

impl CiSignalSource {
    pub fn new(aggregator: Arc<CiAggregator>) -> Self {
        CiSignalSource { aggregator }
    }
}

#[async_trait]
impl SignalSource for CiSignalSource {
    async fn collect(&self, package: &PackageInfo) -> Result<HealthSignals> {
        let status = self
            .aggregator
            .get_package_ci_status(&package.name, None)
            .await
            .map_err(|e| MonoscopeError::Signals {
                package: package.name.clone(),
                reason: e.to_string(),
            })?;

        Ok(status.as_ref().map(signals_from_ci).unwrap_or_default())
    }
}

pub fn signals_from_ci(status: &CiBuildStatus) -> HealthSignals {
    HealthSignals {
        build_status: status.last_build.status,
        test_coverage: status.latest_coverage(),
        lint_status: check_from_steps(&status.build_history, LINT_STEPS),
        security_audit: check_from_steps(&status.build_history, SECURITY_STEPS),
    }
}

/// Outcome of the newest step matching one of `names`.
fn check_from_steps(history: &[BuildRecord], names: &[&str]) -> CheckState {
    let step = history
        .iter()
        .find_map(|build| names.iter().find_map(|name| build.step(name)));

    match step.map(|s| s.status) {
        Some(BuildState::Success) => CheckState::Pass,
        Some(BuildState::Failed) => CheckState::Fail,
        _ => CheckState::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ci::{BuildStep, summarize};
    use time::macros::datetime;

    fn step(name: &str, status: BuildState) -> BuildStep {
        BuildStep {
            name: name.to_string(),
            status,
            duration: None,
            error: None,
        }
    }

    fn record(status: BuildState, day: u8, steps: Vec<BuildStep>, coverage: Option<f64>) -> BuildRecord {
        BuildRecord {
            id: None,
            provider: None,
            status,
            branch: "main".to_string(),
            commit: String::new(),
            start_time: datetime!(2026-03-01 0:00 UTC) + time::Duration::days(day as i64),
            end_time: None,
            duration: None,
            steps,
            tests: None,
            coverage,
        }
    }

    #[test]
    fn newest_build_and_steps_drive_signals() {
        let builds = vec![
            record(BuildState::Success, 1, vec![step("Lint", BuildState::Success)], None),
            record(
                BuildState::Failed,
                0,
                vec![step("lint", BuildState::Failed), step("audit", BuildState::Failed)],
                Some(64.0),
            ),
        ];

        let status = summarize("core", builds).unwrap();
        let signals = signals_from_ci(&status);

        assert_eq!(signals.build_status, BuildState::Success);
        assert_eq!(signals.test_coverage, Some(64.0));
        assert_eq!(signals.lint_status, CheckState::Pass);
        assert_eq!(signals.security_audit, CheckState::Fail);
    }

    #[test]
    fn missing_steps_are_unknown() {
        let status = summarize("core", vec![record(BuildState::Success, 0, Vec::new(), None)]).unwrap();
        let signals = signals_from_ci(&status);

        assert_eq!(signals.lint_status, CheckState::Unknown);
        assert_eq!(signals.security_audit, CheckState::Unknown);
        assert_eq!(signals.test_coverage, None);
        assert_eq!(signals.score(), 60);
    }
}
