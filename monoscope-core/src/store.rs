use crate::health::{HealthScore, HealthStatus};
use crate::project::PackageInfo;
use crate::{MonoscopeError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use tokio::sync::Mutex;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageRecord {
    #[serde(flatten)]
    pub info: PackageInfo,
    #[serde(default)]
    pub status: Option<HealthStatus>,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl PackageRecord {
    pub fn new(info: PackageInfo) -> Self {
        PackageRecord {
            info,
            status: None,
            updated_at: OffsetDateTime::now_utc(),
        }
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }
}

/// Persistence for package records and their latest health snapshot, keyed
/// by package name.
#[async_trait]
pub trait Store: Send + Sync {
    /// Fails with [`MonoscopeError::StoreConflict`] when the name is taken.
    async fn insert_package(&self, record: PackageRecord) -> Result<()>;

    async fn upsert_package(&self, record: PackageRecord) -> Result<()>;

    async fn find_all_packages(&self) -> Result<Vec<PackageRecord>>;

    async fn upsert_health(&self, score: HealthScore) -> Result<()>;

    async fn find_health(&self, name: &str) -> Result<Option<HealthScore>>;

    /// Returns `false` when no package with that name is stored.
    async fn update_package_status(&self, name: &str, status: HealthStatus) -> Result<bool>;
}

/// Inserts `record`, falling back to an update when it already exists.
pub async fn save_package(store: &dyn Store, record: PackageRecord) -> Result<()> {
    match store.insert_package(record.clone()).await {
        Err(MonoscopeError::StoreConflict { key }) => {
            warn!(package = %key, "package already stored, updating in place");
            store.upsert_package(record).await
        }
        other => other,
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoreData {
    #[serde(default)]
    packages: BTreeMap<String, PackageRecord>,
    #[serde(default)]
    health: BTreeMap<String, HealthScore>,
}

impl StoreData {
    fn insert_package(&mut self, record: PackageRecord) -> Result<()> {
        if self.packages.contains_key(record.name()) {
            return Err(MonoscopeError::StoreConflict {
                key: record.name().to_string(),
            });
        }
        self.packages.insert(record.name().to_string(), record);
        Ok(())
    }

    fn upsert_package(&mut self, mut record: PackageRecord) {
        if record.status.is_none()
            && let Some(existing) = self.packages.get(record.name())
        {
            record.status = existing.status;
        }
        self.packages.insert(record.name().to_string(), record);
    }

    fn update_status(&mut self, name: &str, status: HealthStatus) -> bool {
        match self.packages.get_mut(name) {
            Some(record) => {
                record.status = Some(status);
                record.updated_at = OffsetDateTime::now_utc();
                true
            }
            None => false,
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    data: Mutex<StoreData>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_package(&self, record: PackageRecord) -> Result<()> {
        self.data.lock().await.insert_package(record)
    }

    async fn upsert_package(&self, record: PackageRecord) -> Result<()> {
        self.data.lock().await.upsert_package(record);
        Ok(())
    }

    async fn find_all_packages(&self) -> Result<Vec<PackageRecord>> {
        Ok(self.data.lock().await.packages.values().cloned().collect())
    }

    async fn upsert_health(&self, score: HealthScore) -> Result<()> {
        self.data
            .lock()
            .await
            .health
            .insert(score.package.clone(), score);
        Ok(())
    }

    async fn find_health(&self, name: &str) -> Result<Option<HealthScore>> {
        Ok(self.data.lock().await.health.get(name).cloned())
    }

    async fn update_package_status(&self, name: &str, status: HealthStatus) -> Result<bool> {
        Ok(self.data.lock().await.update_status(name, status))
    }
}

/// Keeps the whole store in one JSON document. Every write rewrites the
/// file through a sibling temp file and a rename.
#[derive(Debug)]
pub struct JsonStore {
    path: PathBuf,
    data: Mutex<StoreData>,
}

impl JsonStore {
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        let data = match tokio::fs::read_to_string(&path).await {
            Ok(contents) if contents.trim().is_empty() => StoreData::default(),
            Ok(contents) => serde_json::from_str(&contents).map_err(|source| {
                MonoscopeError::ParseJson {
                    path: path.clone(),
                    source,
                }
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => StoreData::default(),
            Err(source) => return Err(MonoscopeError::ReadFile { path, source }),
        };

        debug!(
            path = %path.display(),
            packages = data.packages.len(),
            "opened store"
        );

        Ok(JsonStore {
            path,
            data: Mutex::new(data),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes `next` to disk and only then makes it the in-memory state.
    async fn commit(&self, current: &mut StoreData, next: StoreData) -> Result<()> {
        self.persist(&next).await?;
        *current = next;
        Ok(())
    }

    async fn persist(&self, data: &StoreData) -> Result<()> {
        let json = serde_json::to_string_pretty(data).map_err(|e| MonoscopeError::SerializeJson {
            path: self.path.clone(),
            reason: e.to_string(),
        })?;

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| MonoscopeError::WriteFile {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|source| MonoscopeError::WriteFile {
                path: tmp.clone(),
                source,
            })?;

        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|source| MonoscopeError::WriteFile {
                path: self.path.clone(),
                source,
            })
    }
}

#[async_trait]
impl Store for JsonStore {
    async fn insert_package(&self, record: PackageRecord) -> Result<()> {
        let mut data = self.data.lock().await;
        let mut next = data.clone();
        next.insert_package(record)?;
        self.commit(&mut data, next).await
    }

    async fn upsert_package(&self, record: PackageRecord) -> Result<()> {
        let mut data = self.data.lock().await;
        let mut next = data.clone();
        next.upsert_package(record);
        self.commit(&mut data, next).await
    }

    async fn find_all_packages(&self) -> Result<Vec<PackageRecord>> {
        Ok(self.data.lock().await.packages.values().cloned().collect())
    }

    async fn upsert_health(&self, score: HealthScore) -> Result<()> {
        let mut data = self.data.lock().await;
        let mut next = data.clone();
        next.health.insert(score.package.clone(), score);
        self.commit(&mut data, next).await
    }

    async fn find_health(&self, name: &str) -> Result<Option<HealthScore>> {
        Ok(self.data.lock().await.health.get(name).cloned())
    }

    async fn update_package_status(&self, name: &str, status: HealthStatus) -> Result<bool> {
        let mut data = self.data.lock().await;
        let mut next = data.clone();
        if !next.update_status(name, status) {
            return Ok(false);
        }
        self.commit(&mut data, next).await?;
        Ok(true)
    }
}
