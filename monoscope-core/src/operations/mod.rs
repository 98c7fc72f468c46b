pub mod log;
pub mod refresh;
pub mod scan;

pub use log::{package_commits, workspace_activity};
pub use refresh::{RefreshCoordinator, RefreshSummary};
pub use scan::Scanner;
