pub mod cache;
pub mod ci;
pub mod config;
pub mod console;
pub mod error;
pub mod graph;
pub mod health;
pub mod operations;
pub mod project;
pub mod store;
pub mod vcs;
pub mod version;
pub mod workspace;

pub use config::MonoscopeConfig;
pub use error::MonoscopeError;
pub use project::PackageInfo;
pub use workspace::Workspace;

pub type Result<T> = std::result::Result<T, MonoscopeError>;
