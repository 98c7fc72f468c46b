use serde::{Deserialize, Serialize};
use std::fmt;
use time::OffsetDateTime;

pub mod signals;

pub use signals::{CiSignalSource, SignalSource};

const BUILD_WEIGHT: f64 = 30.0;
const COVERAGE_WEIGHT: f64 = 25.0;
const LINT_WEIGHT: f64 = 25.0;
const SECURITY_WEIGHT: f64 = 20.0;
const UNKNOWN_CREDIT: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BuildState {
    Success,
    Running,
    Failed,
    #[default]
    Unknown,
}

impl BuildState {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "success" | "succeeded" | "passed" | "ok" => BuildState::Success,
            "running" | "in_progress" | "pending" | "queued" => BuildState::Running,
            "failed" | "failure" | "error" | "errored" => BuildState::Failed,
            _ => BuildState::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BuildState::Success => "success",
            BuildState::Running => "running",
            BuildState::Failed => "failed",
            BuildState::Unknown => "unknown",
        }
    }

    fn points(&self) -> f64 {
        match self {
            BuildState::Success => BUILD_WEIGHT,
            BuildState::Running => 15.0,
            BuildState::Failed => 0.0,
            BuildState::Unknown => UNKNOWN_CREDIT,
        }
    }
}

/// Outcome of a pass/fail check such as lint or a security audit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CheckState {
    Pass,
    Fail,
    #[default]
    Unknown,
}

impl CheckState {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "pass" | "passed" | "success" | "ok" => CheckState::Pass,
            "fail" | "failed" | "failure" | "error" => CheckState::Fail,
            _ => CheckState::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CheckState::Pass => "pass",
            CheckState::Fail => "fail",
            CheckState::Unknown => "unknown",
        }
    }

    fn points(&self, weight: f64) -> f64 {
        match self {
            CheckState::Pass => weight,
            CheckState::Fail => 0.0,
            CheckState::Unknown => UNKNOWN_CREDIT,
        }
    }
}

macro_rules! string_enum_serde {
    ($ty:ty) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl Serialize for $ty {
            fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                serializer.serialize_str(self.as_str())
            }
        }

        // Unrecognized spellings become unknown.
        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let s = String::deserialize(deserializer)?;
                Ok(<$ty>::parse(&s))
            }
        }
    };
}

string_enum_serde!(BuildState);
string_enum_serde!(CheckState);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Warning,
    Error,
}

impl HealthStatus {
    pub fn from_score(score: u8) -> Self {
        if score >= 80 {
            HealthStatus::Healthy
        } else if score >= 60 {
            HealthStatus::Warning
        } else {
            HealthStatus::Error
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Warning => "warning",
            HealthStatus::Error => "error",
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The four raw inputs to a health score.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthSignals {
    pub build_status: BuildState,
    /// Percentage; `None` when no coverage was reported.
    pub test_coverage: Option<f64>,
    pub lint_status: CheckState,
    pub security_audit: CheckState,
}

impl HealthSignals {
    pub fn score(&self) -> u8 {
        overall_score(
            self.build_status,
            self.test_coverage,
            self.lint_status,
            self.security_audit,
        )
    }
}

/// Weighted 0-100 score: build up to 30, coverage up to 25, lint up to 25,
/// security up to 20. Unknown signals earn 10 points each.
pub fn overall_score(
    build: BuildState,
    coverage: Option<f64>,
    lint: CheckState,
    security: CheckState,
) -> u8 {
    let coverage_points = match coverage {
        None => UNKNOWN_CREDIT,
        Some(value) if value.is_finite() => {
            (value / 100.0 * COVERAGE_WEIGHT).clamp(0.0, COVERAGE_WEIGHT)
        }
        Some(_) => 0.0,
    };

    let total = build.points()
        + coverage_points
        + lint.points(LINT_WEIGHT)
        + security.points(SECURITY_WEIGHT);

    total.round().clamp(0.0, 100.0) as u8
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthScore {
    pub package: String,
    #[serde(flatten)]
    pub signals: HealthSignals,
    pub overall_score: u8,
    pub status: HealthStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub checked_at: OffsetDateTime,
}

impl HealthScore {
    pub fn new(package: &str, signals: HealthSignals) -> Self {
        let overall_score = signals.score();

        HealthScore {
            package: package.to_string(),
            signals,
            overall_score,
            status: HealthStatus::from_score(overall_score),
            checked_at: OffsetDateTime::now_utc(),
        }
    }

    /// Snapshot recorded when a package's signals could not be collected.
    pub fn zeroed(package: &str) -> Self {
        HealthScore {
            package: package.to_string(),
            signals: HealthSignals {
                build_status: BuildState::Failed,
                test_coverage: Some(0.0),
                lint_status: CheckState::Fail,
                security_audit: CheckState::Fail,
            },
            overall_score: 0,
            status: HealthStatus::Error,
            checked_at: OffsetDateTime::now_utc(),
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }
}
