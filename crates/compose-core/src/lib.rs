//! Per-repository compose lifecycle.
//!
//! [`RepositoryScanner`] finds the repositories, [`ComposeScheduler`] fans them
//! out over a bounded pool, and each task runs the [`Pipeline`]:
//! legacy link -> prepare -> build -> archive -> publish -> prune.
pub mod clock;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod publish;
pub mod retention;
pub mod scanner;
pub mod scheduler;

#[cfg(test)]
pub(crate) mod testing;

pub mod prelude {
    pub use crate::clock::{Clock, ManualClock, SystemClock};
    pub use crate::config::{ComposeConfig, ConfigError};
    pub use crate::error::{CoreError, PipelineError, PublishError, RetentionError, ScanError};
    pub use crate::pipeline::Pipeline;
    pub use crate::publish::{LegacyLink, PublishManager, PublishMode};
    pub use crate::retention::{PruneReport, RetentionCleaner};
    pub use crate::scanner::{RepositoryScan, RepositoryScanner};
    pub use crate::scheduler::{ComposeScheduler, RepoOutcome};
}

pub use prelude::*;
