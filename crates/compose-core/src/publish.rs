//! Run directories and the `latest` pointer.
//!
//! Layout managed here:
//! ```text
//! <output_root>/<repo>/<YYYYMMDDHHMM>/   one directory per run
//! <output_root>/<repo>/latest            relative symlink to the newest published run
//! ```
use std::{
    fs, io,
    os::unix::fs::symlink,
    path::{Path, PathBuf},
};

use tracing::{debug, info};

use compose_model::{LATEST_POINTER, RunStamp};

use crate::error::PublishError;

/// How `latest` is replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PublishMode {
    /// Remove the old pointer, then create the new one. A crash in between
    /// leaves no `latest` until the next successful run.
    #[default]
    Replace,
    /// Create a temporary link next to `latest` and rename it over the old one.
    AtomicRename,
}

#[derive(Debug, Clone)]
pub struct PublishManager {
    output_root: PathBuf,
    mode: PublishMode,
}

impl PublishManager {
    pub fn new(output_root: impl AsRef<Path>, mode: PublishMode) -> Self {
        let root = output_root.as_ref();
        Self {
            output_root: std::path::absolute(root).unwrap_or_else(|_| root.to_path_buf()),
            mode,
        }
    }

    /// `<output_root>/<repo>`.
    pub fn repo_dir(&self, repo: &str) -> PathBuf {
        self.output_root.join(repo)
    }

    /// `<output_root>/<repo>/latest`.
    pub fn latest_path(&self, repo: &str) -> PathBuf {
        self.repo_dir(repo).join(LATEST_POINTER)
    }

    /// Creates `<output_root>/<repo>/<stamp>` and its parents.
    ///
    /// An existing directory is not an error, so two runs in the same minute
    /// share one directory.
    pub fn prepare_pending(&self, repo: &str, stamp: &RunStamp) -> Result<PathBuf, PublishError> {
        let dir = self.repo_dir(repo).join(stamp.as_str());
        fs::create_dir_all(&dir).map_err(|source| PublishError::Create {
            path: dir.clone(),
            source,
        })?;
        debug!(repo, path = %dir.display(), "run directory ready");
        Ok(dir)
    }

    /// Points `<output_root>/<repo>/latest` at `run_dir` with a relative target.
    ///
    /// Call only after the run's build finished. Returns the link target.
    pub fn publish(&self, repo: &str, run_dir: &Path) -> Result<PathBuf, PublishError> {
        if !run_dir.is_dir() {
            return Err(PublishError::MissingRun(run_dir.to_path_buf()));
        }
        let repo_dir = self.repo_dir(repo);
        let latest = repo_dir.join(LATEST_POINTER);
        let target = pathdiff::diff_paths(run_dir, &repo_dir).ok_or_else(|| {
            PublishError::NotRelative {
                from: repo_dir.clone(),
                to: run_dir.to_path_buf(),
            }
        })?;

        match self.mode {
            PublishMode::Replace => {
                remove_entry(&latest)?;
                link(&target, &latest)?;
            }
            PublishMode::AtomicRename => {
                let staging = repo_dir.join(format!(".{LATEST_POINTER}.tmp"));
                remove_entry(&staging)?;
                link(&target, &staging)?;
                fs::rename(&staging, &latest).map_err(|source| PublishError::Link {
                    link: latest.clone(),
                    target: target.clone(),
                    source,
                })?;
            }
        }

        info!(
            repo,
            operation = "publish",
            link = %latest.display(),
            target = %target.display(),
            "latest repointed"
        );
        Ok(target)
    }
}

/// Removes a file or symlink at `path`; absence is fine.
fn remove_entry(path: &Path) -> Result<(), PublishError> {
    match fs::symlink_metadata(path) {
        Ok(_) => fs::remove_file(path).map_err(|source| PublishError::Remove {
            path: path.to_path_buf(),
            source,
        }),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(PublishError::Remove {
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn link(target: &Path, link: &Path) -> Result<(), PublishError> {
    symlink(target, link).map_err(|source| PublishError::Link {
        link: link.to_path_buf(),
        target: target.to_path_buf(),
        source,
    })
}

/// Result of [`ensure_legacy_repodata_link`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegacyLink {
    Created,
    AlreadyPresent,
    NoRepodata,
}

/// Compatibility shim for a downstream consumer that expects repository
/// metadata at `<repo>/os/repodata`.
///
/// When `<repo>/repodata` exists and `<repo>/os/repodata` does not (a dangling
/// link counts as existing), links the latter to the former.
pub fn ensure_legacy_repodata_link(repo_path: &Path) -> Result<LegacyLink, PublishError> {
    let source = repo_path.join("repodata");
    if !source.exists() {
        return Ok(LegacyLink::NoRepodata);
    }

    let os_dir = repo_path.join("os");
    fs::create_dir_all(&os_dir).map_err(|e| PublishError::Create {
        path: os_dir.clone(),
        source: e,
    })?;
    let legacy = os_dir.join("repodata");
    if fs::symlink_metadata(&legacy).is_ok() {
        return Ok(LegacyLink::AlreadyPresent);
    }

    info!(
        operation = "legacy-link",
        link = %legacy.display(),
        target = %source.display(),
        "linking legacy repodata"
    );
    link(&source, &legacy)?;
    Ok(LegacyLink::Created)
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn stamp(s: &str) -> RunStamp {
        s.parse().unwrap()
    }

    #[test]
    fn prepare_creates_nested_run_directory() {
        let tmp = TempDir::new().unwrap();
        let mgr = PublishManager::new(tmp.path().join("out"), PublishMode::Replace);

        let dir = mgr.prepare_pending("repoA", &stamp("202401020304")).unwrap();
        assert_eq!(dir, tmp.path().join("out/repoA/202401020304"));
        assert!(dir.is_dir());
    }

    #[test]
    fn prepare_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let mgr = PublishManager::new(tmp.path(), PublishMode::Replace);

        let a = mgr.prepare_pending("repoA", &stamp("202401020304")).unwrap();
        fs::write(a.join("marker"), "x").unwrap();
        let b = mgr.prepare_pending("repoA", &stamp("202401020304")).unwrap();

        assert_eq!(a, b);
        assert!(b.join("marker").exists());
    }

    #[test]
    fn publish_creates_relative_link() {
        let tmp = TempDir::new().unwrap();
        let mgr = PublishManager::new(tmp.path(), PublishMode::Replace);
        let run = mgr.prepare_pending("repoA", &stamp("202401020304")).unwrap();

        let target = mgr.publish("repoA", &run).unwrap();
        let latest = mgr.latest_path("repoA");

        assert_eq!(target, PathBuf::from("202401020304"));
        assert_eq!(fs::read_link(&latest).unwrap(), PathBuf::from("202401020304"));
        assert_eq!(fs::canonicalize(&latest).unwrap(), fs::canonicalize(&run).unwrap());
    }

    #[test]
    fn publish_replaces_previous_pointer() {
        let tmp = TempDir::new().unwrap();
        for mode in [PublishMode::Replace, PublishMode::AtomicRename] {
            let root = tmp.path().join(format!("{mode:?}"));
            let mgr = PublishManager::new(&root, mode);
            let old = mgr.prepare_pending("repoA", &stamp("202401010000")).unwrap();
            let new = mgr.prepare_pending("repoA", &stamp("202401010001")).unwrap();

            mgr.publish("repoA", &old).unwrap();
            mgr.publish("repoA", &new).unwrap();

            let latest = mgr.latest_path("repoA");
            assert_eq!(fs::read_link(&latest).unwrap(), PathBuf::from("202401010001"));
            let leftovers: Vec<_> = fs::read_dir(mgr.repo_dir("repoA"))
                .unwrap()
                .map(|e| e.unwrap().file_name().into_string().unwrap())
                .filter(|n| n.starts_with('.'))
                .collect();
            assert!(leftovers.is_empty(), "{mode:?} left {leftovers:?}");
        }
    }

    #[test]
    fn publish_replaces_plain_file_and_dangling_link() {
        let tmp = TempDir::new().unwrap();
        let mgr = PublishManager::new(tmp.path(), PublishMode::Replace);
        let run = mgr.prepare_pending("repoA", &stamp("202401010000")).unwrap();

        fs::write(mgr.latest_path("repoA"), "stale").unwrap();
        mgr.publish("repoA", &run).unwrap();

        fs::remove_file(mgr.latest_path("repoA")).unwrap();
        symlink("gone", mgr.latest_path("repoA")).unwrap();
        mgr.publish("repoA", &run).unwrap();

        assert!(mgr.latest_path("repoA").is_dir());
    }

    #[test]
    fn publish_refuses_missing_run() {
        let tmp = TempDir::new().unwrap();
        let mgr = PublishManager::new(tmp.path(), PublishMode::Replace);
        let err = mgr
            .publish("repoA", &tmp.path().join("repoA/202401010000"))
            .unwrap_err();
        assert!(matches!(err, PublishError::MissingRun(_)));
        assert!(fs::symlink_metadata(mgr.latest_path("repoA")).is_err());
    }

    #[test]
    fn legacy_link_is_created_once() {
        let tmp = TempDir::new().unwrap();
        let repo = tmp.path().join("repoA");
        fs::create_dir_all(repo.join("repodata")).unwrap();

        assert_eq!(ensure_legacy_repodata_link(&repo).unwrap(), LegacyLink::Created);
        assert_eq!(
            fs::read_link(repo.join("os/repodata")).unwrap(),
            repo.join("repodata")
        );
        assert_eq!(
            ensure_legacy_repodata_link(&repo).unwrap(),
            LegacyLink::AlreadyPresent
        );
    }

    #[test]
    fn legacy_link_skipped_without_repodata() {
        let tmp = TempDir::new().unwrap();
        let repo = tmp.path().join("repoA");
        fs::create_dir_all(&repo).unwrap();

        assert_eq!(ensure_legacy_repodata_link(&repo).unwrap(), LegacyLink::NoRepodata);
        assert!(!repo.join("os").exists());
    }
}
