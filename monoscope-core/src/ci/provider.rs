use super::types::BuildRecord;
use crate::config::MonoscopeConfig;
use crate::{MonoscopeError, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Source of raw build records for a package.
#[async_trait]
pub trait CiProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch_builds(&self, package: &str) -> Result<Vec<BuildRecord>>;
}

/// Build history files accept a bare array or `{ "builds": [...] }`.
#[derive(Deserialize)]
#[serde(untagged)]
enum BuildFile {
    List(Vec<BuildRecord>),
    Wrapped { builds: Vec<BuildRecord> },
}

impl BuildFile {
    fn into_builds(self) -> Vec<BuildRecord> {
        match self {
            BuildFile::List(builds) | BuildFile::Wrapped { builds } => builds,
        }
    }
}

/// Reads `<dir>/<package>.json`. Scoped names map `/` to `__`.
pub struct FileProvider {
    name: String,
    dir: PathBuf,
}

impl FileProvider {
    pub fn new(name: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        FileProvider {
            name: name.into(),
            dir: dir.into(),
        }
    }

    pub fn history_path(&self, package: &str) -> PathBuf {
        self.dir.join(format!("{}.json", sanitize_package_name(package)))
    }
}

#[async_trait]
impl CiProvider for FileProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch_builds(&self, package: &str) -> Result<Vec<BuildRecord>> {
        let path = self.history_path(package);

        let data = match tokio::fs::read_to_string(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(provider = %self.name, ?path, "no build history");
                return Ok(Vec::new());
            }
            Err(source) => return Err(MonoscopeError::ReadFile { path, source }),
        };

        let file: BuildFile = serde_json::from_str(&data)
            .map_err(|source| MonoscopeError::ParseJson { path, source })?;

        Ok(tag_provider(file.into_builds(), &self.name))
    }
}

/// GETs `<base>/builds/<package>` and expects the same document shape as
/// [`FileProvider`]. A 404 means the package has no builds.
pub struct HttpProvider {
    name: String,
    base_url: String,
    token: Option<String>,
    client: Client,
}

impl HttpProvider {
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        token: Option<String>,
    ) -> Result<Self> {
        let client = Client::builder()
            .build()
            .map_err(|source| MonoscopeError::HttpClient { source })?;

        Ok(HttpProvider {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
            client,
        })
    }

    pub fn builds_url(&self, package: &str) -> String {
        format!("{}/builds/{}", self.base_url, urlencoding::encode(package))
    }
}

#[async_trait]
impl CiProvider for HttpProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch_builds(&self, package: &str) -> Result<Vec<BuildRecord>> {
        let url = self.builds_url(package);
        let mut request = self.client.get(&url).header("Accept", "application/json");

        if let Some(token) = &self.token {
            request = request.header("Authorization", format!("Bearer {}", token));
        }

        let response = request.send().await.map_err(|source| MonoscopeError::Http {
            url: url.clone(),
            source,
        })?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(MonoscopeError::Provider {
                provider: self.name.clone(),
                reason: format!("{} returned {}: {}", url, status, body),
            });
        }

        let file: BuildFile = response
            .json()
            .await
            .map_err(|source| MonoscopeError::Http { url, source })?;

        Ok(tag_provider(file.into_builds(), &self.name))
    }
}

fn tag_provider(mut builds: Vec<BuildRecord>, provider: &str) -> Vec<BuildRecord> {
    for build in &mut builds {
        if build.provider.is_none() {
            build.provider = Some(provider.to_string());
        }
    }
    builds
}

pub fn sanitize_package_name(name: &str) -> String {
    name.trim_start_matches('@').replace('/', "__")
}

/// Providers declared in `ci.<name>.*` config lines. Entries with neither a
/// url nor a dir are skipped.
pub fn providers_from_config(config: &MonoscopeConfig) -> Result<Vec<Arc<dyn CiProvider>>> {
    let mut providers: Vec<Arc<dyn CiProvider>> = Vec::new();

    for (name, settings) in &config.providers {
        if let Some(url) = &settings.url {
            providers.push(Arc::new(HttpProvider::new(
                name.clone(),
                url.clone(),
                settings.token.clone(),
            )?));
        } else if let Some(dir) = &settings.dir {
            providers.push(Arc::new(FileProvider::new(name.clone(), resolve_dir(dir))));
        } else {
            warn!(provider = %name, "CI provider has neither url nor dir, ignoring");
        }
    }

    Ok(providers)
}

fn resolve_dir(dir: &Path) -> PathBuf {
    if dir.is_absolute() {
        return dir.to_path_buf();
    }

    std::env::current_dir()
        .map(|cwd| cwd.join(dir))
        .unwrap_or_else(|_| dir.to_path_buf())
}
