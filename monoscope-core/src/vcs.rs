use crate::{MonoscopeError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tokio::process::Command;
use tracing::debug;

pub const DEFAULT_COMMIT_LIMIT: usize = 20;

const FIELD_SEP: char = '\u{1f}';
const RECORD_SEP: char = '\u{1e}';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommitType {
    Feat,
    Fix,
    Docs,
    Style,
    Refactor,
    Perf,
    Test,
    Build,
    Ci,
    Chore,
    Revert,
    Other,
}

impl CommitType {
    /// Type prefix of a conventional commit subject such as
    /// `feat(ui)!: add dark mode`.
    pub fn from_subject(subject: &str) -> Self {
        let Some((head, _)) = subject.split_once(':') else {
            return CommitType::Other;
        };

        let head = head.trim_end_matches('!');
        let kind = head.split('(').next().unwrap_or(head).trim();

        match kind.to_ascii_lowercase().as_str() {
            "feat" | "feature" => CommitType::Feat,
            "fix" | "bugfix" => CommitType::Fix,
            "docs" => CommitType::Docs,
            "style" => CommitType::Style,
            "refactor" => CommitType::Refactor,
            "perf" => CommitType::Perf,
            "test" | "tests" => CommitType::Test,
            "build" => CommitType::Build,
            "ci" => CommitType::Ci,
            "chore" => CommitType::Chore,
            "revert" => CommitType::Revert,
            _ => CommitType::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CommitType::Feat => "feat",
            CommitType::Fix => "fix",
            CommitType::Docs => "docs",
            CommitType::Style => "style",
            CommitType::Refactor => "refactor",
            CommitType::Perf => "perf",
            CommitType::Test => "test",
            CommitType::Build => "build",
            CommitType::Ci => "ci",
            CommitType::Chore => "chore",
            CommitType::Revert => "revert",
            CommitType::Other => "other",
        }
    }
}

impl fmt::Display for CommitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Commit {
    pub hash: String,
    pub author: String,
    #[serde(with = "time::serde::rfc3339")]
    pub date: OffsetDateTime,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: CommitType,
}

/// Commit history for a directory, newest first.
#[async_trait]
pub trait CommitSource: Send + Sync {
    async fn commits(&self, path: &Path, limit: usize) -> Result<Vec<Commit>>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct GitLog;

#[async_trait]
impl CommitSource for GitLog {
    async fn commits(&self, path: &Path, limit: usize) -> Result<Vec<Commit>> {
        let format = format!("--pretty=format:%H{0}%an{0}%aI{0}%s{1}", FIELD_SEP, RECORD_SEP);

        let output = Command::new("git")
            .current_dir(path)
            .arg("log")
            .arg(format!("-n{}", limit))
            .arg(format)
            .arg("--")
            .arg(".")
            .output()
            .await
            .map_err(|e| MonoscopeError::Vcs {
                path: path.to_path_buf(),
                reason: format!("Failed to run git log: {}", e),
            })?;

        if !output.status.success() {
            return Err(MonoscopeError::Vcs {
                path: path.to_path_buf(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let commits = parse_log(&stdout);

        debug!(path = %path.display(), commits = commits.len(), "read git log");
        Ok(commits)
    }
}

/// Parses `git log` output written with the separators above. Records with
/// a missing field or an unparseable date are dropped.
pub fn parse_log(output: &str) -> Vec<Commit> {
    output
        .split(RECORD_SEP)
        .filter_map(|record| {
            let record = record.trim_matches(|c| c == '\n' || c == '\r');
            if record.is_empty() {
                return None;
            }

            let mut fields = record.split(FIELD_SEP);
            let hash = fields.next()?.to_string();
            let author = fields.next()?.to_string();
            let date = OffsetDateTime::parse(fields.next()?, &Rfc3339).ok()?;
            let message = fields.next()?.to_string();

            Some(Commit {
                hash,
                author,
                date,
                kind: CommitType::from_subject(&message),
                message,
            })
        })
        .collect()
}
