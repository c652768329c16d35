//! Bounded history of run directories.
use std::{
    ffi::OsString,
    fs, io,
    path::{Path, PathBuf},
};

use tracing::{error, info, warn};

use compose_model::{LATEST_POINTER, RunStamp};

use crate::error::RetentionError;

/// What a prune pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PruneReport {
    /// Names of the kept run directories, newest first.
    pub kept: Vec<OsString>,
    pub removed: Vec<PathBuf>,
    /// Candidates whose deletion failed; logged and skipped.
    pub failed: Vec<PathBuf>,
}

/// Keeps the newest `keep` run directories of a repository.
///
/// The run `latest` resolves to is always kept and counts towards `keep`,
/// whatever its name sorts as.
#[derive(Debug, Clone, Copy)]
pub struct RetentionCleaner {
    keep: usize,
}

impl RetentionCleaner {
    pub fn new(keep: usize) -> Self {
        Self { keep }
    }

    /// Deletes every run directory beyond the newest `keep`.
    pub fn prune(&self, repo_output_dir: &Path) -> Result<PruneReport, RetentionError> {
        self.prune_with(repo_output_dir, |path| fs::remove_dir_all(path))
    }

    /// [`RetentionCleaner::prune`] with a custom removal function.
    ///
    /// Only real directories count: symlinks (`latest`) and files are ignored.
    /// Names are ordered descending, which is newest-first because run stamps
    /// are fixed-width and zero padded. A failed removal is logged and the
    /// remaining candidates are still attempted.
    pub fn prune_with<F>(
        &self,
        repo_output_dir: &Path,
        mut remove: F,
    ) -> Result<PruneReport, RetentionError>
    where
        F: FnMut(&Path) -> io::Result<()>,
    {
        let mut runs = list_run_dirs(repo_output_dir)?;
        runs.sort_unstable_by(|a, b| b.cmp(a));

        for odd in runs
            .iter()
            .filter(|n| !n.to_str().is_some_and(RunStamp::is_run_stamp))
        {
            warn!(
                operation = "cleanup",
                name = %odd.to_string_lossy(),
                "run directory name is not a timestamp; ordering may not be chronological"
            );
        }
        info!(
            operation = "cleanup",
            compose_count = runs.len(),
            compose_list = ?runs,
            "found composes"
        );

        let pinned = latest_target(repo_output_dir).filter(|name| runs.contains(name));
        if let Some(name) = &pinned {
            if runs.first() != Some(name) {
                warn!(
                    operation = "cleanup",
                    latest = %name.to_string_lossy(),
                    "latest is not the newest-named run; keeping it anyway"
                );
            }
        }

        let mut slots = self.keep.saturating_sub(usize::from(pinned.is_some()));
        let mut kept = Vec::new();
        let mut candidates = Vec::new();
        for name in runs {
            if pinned.as_ref() == Some(&name) {
                kept.push(name);
            } else if slots > 0 {
                slots -= 1;
                kept.push(name);
            } else {
                candidates.push(name);
            }
        }
        let mut report = PruneReport {
            kept,
            ..Default::default()
        };

        if candidates.is_empty() {
            info!(
                operation = "cleanup",
                "no old composes to delete, keeping all {}",
                report.kept.len()
            );
            return Ok(report);
        }
        info!(
            operation = "cleanup-delete",
            "keeping {} most recent composes, removing {} old ones",
            self.keep,
            candidates.len()
        );

        for name in candidates {
            let path = repo_output_dir.join(&name);
            info!(operation = "cleanup-delete", path = %path.display(), "removing old compose");
            match remove(&path) {
                Ok(()) => report.removed.push(path),
                Err(e) => {
                    error!(
                        operation = "cleanup-delete",
                        path = %path.display(),
                        "error removing old compose: {e}"
                    );
                    report.failed.push(path);
                }
            }
        }
        Ok(report)
    }
}

/// Run directory name `<dir>/latest` points at, if it is a link into `dir`.
fn latest_target(dir: &Path) -> Option<OsString> {
    let target = fs::read_link(dir.join(LATEST_POINTER)).ok()?;
    let resolved = dir.join(&target);
    if resolved.parent() != Some(dir) {
        return None;
    }
    resolved.file_name().map(|name| name.to_os_string())
}

fn list_run_dirs(dir: &Path) -> Result<Vec<OsString>, RetentionError> {
    let list_err = |source| RetentionError::List {
        path: dir.to_path_buf(),
        source,
    };

    let mut names = Vec::new();
    for entry in fs::read_dir(dir).map_err(list_err)? {
        let entry = entry.map_err(list_err)?;
        // file_type() does not follow symlinks.
        let is_run = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
        if is_run {
            names.push(entry.file_name());
        }
    }
    Ok(names)
}
