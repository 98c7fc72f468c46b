use crate::health::{BuildState, HealthStatus};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use time::OffsetDateTime;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildStep {
    pub name: String,
    pub status: BuildState,
    #[serde(default)]
    pub duration: Option<u64>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResults {
    #[serde(default)]
    pub passed: u64,
    #[serde(default)]
    pub failed: u64,
    #[serde(default)]
    pub skipped: u64,
    #[serde(default)]
    pub total: u64,
}

impl TestResults {
    pub fn merge(&mut self, other: &TestResults) {
        self.passed += other.passed;
        self.failed += other.failed;
        self.skipped += other.skipped;
        self.total += other.total;
    }
}

/// One build as reported by a CI provider. Durations are milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildRecord {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub provider: Option<String>,
    pub status: BuildState,
    #[serde(default)]
    pub branch: String,
    #[serde(default)]
    pub commit: String,
    #[serde(with = "time::serde::rfc3339")]
    pub start_time: OffsetDateTime,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub end_time: Option<OffsetDateTime>,
    #[serde(default)]
    pub duration: Option<u64>,
    #[serde(default)]
    pub steps: Vec<BuildStep>,
    #[serde(default)]
    pub tests: Option<TestResults>,
    #[serde(default)]
    pub coverage: Option<f64>,
}

impl BuildRecord {
    pub fn is_success(&self) -> bool {
        self.status == BuildState::Success
    }

    /// Reported duration, or the span between start and end when only the
    /// timestamps are known.
    pub fn effective_duration(&self) -> Option<u64> {
        if let Some(duration) = self.duration {
            return Some(duration);
        }

        let end = self.end_time?;
        let millis = (end - self.start_time).whole_milliseconds();
        u64::try_from(millis).ok()
    }

    pub fn step(&self, name: &str) -> Option<&BuildStep> {
        self.steps
            .iter()
            .find(|step| step.name.eq_ignore_ascii_case(name))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CiBuildStatus {
    pub package: String,
    pub last_build: BuildRecord,
    pub build_history: Vec<BuildRecord>,
    pub success_rate: f64,
    pub average_duration: u64,
    pub is_healthy: bool,
    pub issues: Vec<String>,
}

impl CiBuildStatus {
    pub fn status(&self) -> HealthStatus {
        if self.is_healthy {
            HealthStatus::Healthy
        } else if self.issues.len() < 3 {
            HealthStatus::Warning
        } else {
            HealthStatus::Error
        }
    }

    pub fn latest_coverage(&self) -> Option<f64> {
        self.build_history.iter().find_map(|build| build.coverage)
    }

    pub fn latest_tests(&self) -> Option<TestResults> {
        self.build_history.iter().find_map(|build| build.tests)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageCiSummary {
    pub name: String,
    pub status: HealthStatus,
    pub success_rate: f64,
    pub last_build: BuildState,
    pub issues: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonorepoCiStatus {
    pub total_packages: usize,
    pub healthy: usize,
    pub warning: usize,
    pub error: usize,
    pub tests: TestResults,
    pub coverage: BTreeMap<String, f64>,
    pub packages: Vec<PackageCiSummary>,
    pub without_builds: Vec<String>,
}
