use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MonoscopeError {
    #[error("Failed to read file {path:?}: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },

    #[error("Failed to write file {path:?}: {source}")]
    WriteFile { path: PathBuf, source: std::io::Error },

    #[error("Failed to parse JSON in {path:?}: {source}")]
    ParseJson { path: PathBuf, source: serde_json::Error },

    #[error("Failed to serialize JSON for {path:?}: {reason}")]
    SerializeJson { path: PathBuf, reason: String },

    #[error("Invalid manifest in {path:?}: {reason}")]
    ManifestInvalid { path: PathBuf, reason: String },

    #[error("Workspace root {path:?} does not exist")]
    WorkspaceRootMissing { path: PathBuf },

    #[error("Invalid workspace configuration in {path:?}: {reason}")]
    WorkspaceConfig { path: PathBuf, reason: String },

    #[error("HTTP request to {url} failed: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("Failed to build HTTP client: {source}")]
    HttpClient { source: reqwest::Error },

    #[error("CI provider {provider} failed: {reason}")]
    Provider { provider: String, reason: String },

    #[error("Unknown CI provider {name}")]
    UnknownProvider { name: String },

    #[error("Record {key} already exists in the store")]
    StoreConflict { key: String },

    #[error("Store operation failed: {reason}")]
    Store { reason: String },

    #[error("Failed to read commit history for {path:?}: {reason}")]
    Vcs { path: PathBuf, reason: String },

    #[error("Signal collection failed for {package}: {reason}")]
    Signals { package: String, reason: String },

    #[error("Unknown layout algorithm {name} (expected: layered, radial, force)")]
    UnknownLayout { name: String },

    #[error("Background task failed: {reason}")]
    Task { reason: String },

    #[error("Health refresh failed: {0}")]
    Refresh(Arc<MonoscopeError>),
}
