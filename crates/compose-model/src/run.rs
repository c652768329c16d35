use std::{
    fmt,
    path::{Path, PathBuf},
};

use crate::{ModelError, RunStamp};

/// Lifecycle of one compose run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Output directory reserved, build not started.
    Pending,
    /// External tools are executing.
    Running,
    /// Build finished and `latest` points at the run.
    Published,
    /// Some stage failed; `latest` was not touched.
    Failed,
}

impl RunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Published => "published",
            Self::Failed => "failed",
        }
    }

    /// Returns `true` for `Published` and `Failed`.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Published | Self::Failed)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One timestamped execution of the pipeline for a single repository.
///
/// The output directory is owned by the run until publish; after that the
/// filesystem is the only record of it.
#[derive(Debug, Clone)]
pub struct ComposeRun {
    repo: String,
    stamp: RunStamp,
    output_dir: PathBuf,
    status: RunStatus,
}

impl ComposeRun {
    /// New run in the `Pending` state.
    pub fn new(repo: impl Into<String>, stamp: RunStamp, output_dir: PathBuf) -> Self {
        Self {
            repo: repo.into(),
            stamp,
            output_dir,
            status: RunStatus::Pending,
        }
    }

    pub fn repo(&self) -> &str {
        &self.repo
    }

    pub fn stamp(&self) -> &RunStamp {
        &self.stamp
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn status(&self) -> RunStatus {
        self.status
    }

    /// `Pending -> Running`.
    pub fn start(&mut self) -> Result<(), ModelError> {
        self.transition(RunStatus::Pending, RunStatus::Running)
    }

    /// `Running -> Published`.
    pub fn publish(&mut self) -> Result<(), ModelError> {
        self.transition(RunStatus::Running, RunStatus::Published)
    }

    /// Any non-terminal state -> `Failed`.
    pub fn fail(&mut self) -> Result<(), ModelError> {
        if self.status.is_terminal() {
            return Err(ModelError::IllegalTransition {
                from: self.status.as_str(),
                to: RunStatus::Failed.as_str(),
            });
        }
        self.status = RunStatus::Failed;
        Ok(())
    }

    fn transition(&mut self, from: RunStatus, to: RunStatus) -> Result<(), ModelError> {
        if self.status != from {
            return Err(ModelError::IllegalTransition {
                from: self.status.as_str(),
                to: to.as_str(),
            });
        }
        self.status = to;
        Ok(())
    }
}
