use std::{io, path::PathBuf};

use thiserror::Error;

use compose_exec::ExecError;
use compose_model::ModelError;

use crate::config::ConfigError;

/// Errors that abort the whole run before any repository is processed.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("scan error: {0}")]
    Scan(#[from] ScanError),
}

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("cannot read base directory {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot read entry of {path}: {source}")]
    Entry {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Model(#[from] ModelError),
}

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("cannot create {path}: {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot remove previous pointer {path}: {source}")]
    Remove {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot link {link} -> {target}: {source}")]
    Link {
        link: PathBuf,
        target: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("run directory {0} does not exist")]
    MissingRun(PathBuf),

    #[error("no relative path from {from} to {to}")]
    NotRelative { from: PathBuf, to: PathBuf },
}

#[derive(Debug, Error)]
pub enum RetentionError {
    #[error("cannot list {path}: {source}")]
    List {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cleanup worker aborted: {0}")]
    Aborted(String),
}

/// A failure inside one repository's pipeline, tagged with the stage.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("[legacy-link] {0}")]
    LegacyLink(#[source] PublishError),

    #[error("[prepare] {0}")]
    Prepare(#[source] PublishError),

    #[error("[build] builder could not run: {0}")]
    Build(#[source] ExecError),

    #[error("[build] builder exited unsuccessfully ({status})")]
    BuildExit { status: String },

    #[error("[archive] cannot read {path}: {source}")]
    ArchiveIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("[archive] archiver could not run: {0}")]
    Archive(#[source] ExecError),

    #[error("[archive] archiver exited unsuccessfully for {archive} ({status})")]
    ArchiveExit { archive: PathBuf, status: String },

    #[error("[publish] {0}")]
    Publish(#[source] PublishError),

    #[error("[cleanup] {0}")]
    Cleanup(#[source] RetentionError),

    #[error("[state] {0}")]
    State(#[from] ModelError),
}

impl PipelineError {
    /// Stage tag used as the `operation` log field.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::LegacyLink(_) => "legacy-link",
            Self::Prepare(_) => "prepare",
            Self::Build(_) | Self::BuildExit { .. } => "build",
            Self::ArchiveIo { .. } | Self::Archive(_) | Self::ArchiveExit { .. } => "archive",
            Self::Publish(_) => "publish",
            Self::Cleanup(_) => "cleanup",
            Self::State(_) => "state",
        }
    }
}
