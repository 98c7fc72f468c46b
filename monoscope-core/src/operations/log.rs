use crate::Result;
use crate::project::PackageInfo;
use crate::vcs::{Commit, CommitSource};
use futures::future::join_all;
use std::collections::BTreeMap;
use tracing::warn;

/// Recent commits touching one package. `None` when no package has that name.
pub async fn package_commits(
    source: &dyn CommitSource,
    packages: &[PackageInfo],
    name: &str,
    limit: usize,
) -> Result<Option<Vec<Commit>>> {
    let Some(package) = packages.iter().find(|p| p.name == name) else {
        return Ok(None);
    };

    source.commits(&package.path, limit).await.map(Some)
}

/// Recent commits for every package. A package whose history cannot be read
/// gets an empty list.
pub async fn workspace_activity(
    source: &dyn CommitSource,
    packages: &[PackageInfo],
    limit: usize,
) -> BTreeMap<String, Vec<Commit>> {
    let lookups = packages.iter().map(|package| async move {
        let commits = match source.commits(&package.path, limit).await {
            Ok(commits) => commits,
            Err(e) => {
                warn!(package = %package.name, error = %e, "commit history unavailable");
                Vec::new()
            }
        };
        (package.name.clone(), commits)
    });

    join_all(lookups).await.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MonoscopeError;
    use crate::graph::fixtures::package;
    use crate::vcs::CommitType;
    use async_trait::async_trait;
    use std::path::Path;
    use time::OffsetDateTime;

    struct FakeHistory;

    #[async_trait]
    impl CommitSource for FakeHistory {
        async fn commits(&self, path: &Path, limit: usize) -> Result<Vec<Commit>> {
            if path.ends_with("broken") {
                return Err(MonoscopeError::Vcs {
                    path: path.to_path_buf(),
                    reason: "not a git repository".to_string(),
                });
            }

            let commit = Commit {
                hash: "abc".to_string(),
                author: "Ada".to_string(),
                date: OffsetDateTime::UNIX_EPOCH,
                message: "fix: things".to_string(),
                kind: CommitType::Fix,
            };
            Ok(vec![commit; limit.min(3)])
        }
    }

    #[tokio::test]
    async fn unknown_package_has_no_log() {
        let packages = vec![package("core", &[])];

        let found = package_commits(&FakeHistory, &packages, "core", 2).await.unwrap();
        let missing = package_commits(&FakeHistory, &packages, "ui", 2).await.unwrap();

        assert_eq!(found.unwrap().len(), 2);
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn unreadable_history_is_empty() {
        let packages = vec![package("core", &[]), package("broken", &[])];

        let activity = workspace_activity(&FakeHistory, &packages, 10).await;

        assert_eq!(activity["core"].len(), 3);
        assert!(activity["broken"].is_empty());
    }
}
