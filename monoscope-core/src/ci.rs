pub mod aggregator;
pub mod provider;
pub mod types;

pub use aggregator::{CiAggregator, summarize};
pub use provider::{CiProvider, FileProvider, HttpProvider, providers_from_config};
pub use types::{
    BuildRecord, BuildStep, CiBuildStatus, MonorepoCiStatus, PackageCiSummary, TestResults,
};
