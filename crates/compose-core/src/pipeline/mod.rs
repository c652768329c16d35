//! One repository, end to end.
mod archive;
mod builder;

pub use archive::ArchiveCommand;
pub use builder::BuilderCommand;

use std::{fs, path::Path, sync::Arc};

use tracing::{debug, info, warn};

use compose_exec::{ExitReport, LineSink, ProcessSupervisor};
use compose_model::{ComposeRun, Flag, Repository, RunStamp};

use crate::{
    clock::Clock,
    config::ComposeConfig,
    error::{PipelineError, RetentionError},
    publish::{LegacyLink, PublishManager, PublishMode, ensure_legacy_repodata_link},
    retention::{PruneReport, RetentionCleaner},
};

/// The per-repository pipeline:
/// legacy link -> prepare -> build -> archive -> publish -> prune.
///
/// Stages run strictly in order; the first failing stage ends the run.
/// Shared by all worker tasks, holds no per-repository state.
pub struct Pipeline {
    builder: BuilderCommand,
    archiver: ArchiveCommand,
    publisher: PublishManager,
    cleaner: RetentionCleaner,
    supervisor: ProcessSupervisor,
    clock: Arc<dyn Clock>,
    fail_on_non_zero: Flag,
}

impl Pipeline {
    pub fn new(cfg: &ComposeConfig, sink: Arc<dyn LineSink>, clock: Arc<dyn Clock>) -> Self {
        let mode = if cfg.atomic_publish.is_enabled() {
            PublishMode::AtomicRename
        } else {
            PublishMode::Replace
        };
        Self {
            builder: BuilderCommand {
                program: cfg.builder.clone(),
                origin: cfg.origin.clone(),
                temp_root: cfg.temp_root.clone(),
                timeout: cfg.build_timeout(),
            },
            archiver: ArchiveCommand {
                program: cfg.archiver.clone(),
                timeout: cfg.build_timeout(),
            },
            publisher: PublishManager::new(&cfg.output_dir, mode),
            cleaner: RetentionCleaner::new(cfg.keep),
            supervisor: ProcessSupervisor::new(sink),
            clock,
            fail_on_non_zero: cfg.fail_on_non_zero,
        }
    }

    /// Runs every stage for `repo`.
    ///
    /// Returns the published run, or the error of the first failing stage.
    /// A cleanup failure is reported even though `latest` was already moved.
    pub async fn run(&self, repo: &Repository) -> Result<ComposeRun, PipelineError> {
        let name = repo.name();
        info!(repo = name, path = %repo.path().display(), "processing repo");

        match ensure_legacy_repodata_link(repo.path()).map_err(PipelineError::LegacyLink)? {
            LegacyLink::Created => debug!(repo = name, "legacy repodata link created"),
            LegacyLink::AlreadyPresent | LegacyLink::NoRepodata => {}
        }

        let stamp = RunStamp::from_datetime(self.clock.now());
        let dir = self
            .publisher
            .prepare_pending(name, &stamp)
            .map_err(PipelineError::Prepare)?;
        let mut run = ComposeRun::new(name, stamp, dir);
        info!(repo = name, output = %run.output_dir().display(), status = %run.status(), "outputting to run directory");

        run.start()?;
        info!(repo = name, stamp = %run.stamp(), status = %run.status(), "run started");

        if let Err(e) = self.build_and_publish(repo, &run).await {
            run.fail()?;
            debug!(repo = name, operation = e.stage(), status = %run.status(), "run abandoned");
            return Err(e);
        }
        run.publish()?;
        info!(repo = name, stamp = %run.stamp(), status = %run.status(), "run published");

        let report = self.prune(name).await.map_err(PipelineError::Cleanup)?;
        if !report.failed.is_empty() {
            warn!(repo = name, operation = "cleanup", failed = report.failed.len(), "some old composes could not be removed");
        }
        Ok(run)
    }

    async fn build_and_publish(
        &self,
        repo: &Repository,
        run: &ComposeRun,
    ) -> Result<(), PipelineError> {
        let name = repo.name();
        let previous = self.publisher.latest_path(name);

        let spec = self.builder.spec(repo, run.output_dir(), &previous);
        let report = self
            .supervisor
            .run(&spec)
            .await
            .map_err(PipelineError::Build)?;
        self.check_exit(name, builder::BUILDER_TOOL, &report)
            .map_err(|status| PipelineError::BuildExit { status })?;

        self.archive_screenshots(repo, run.output_dir()).await?;

        self.publisher
            .publish(name, run.output_dir())
            .map_err(PipelineError::Publish)?;
        Ok(())
    }

    /// Packs every `<run>/icons/<sub>` into `<run>/appstream/<repo>-icons-<sub>.tar.gz`.
    async fn archive_screenshots(
        &self,
        repo: &Repository,
        run_dir: &Path,
    ) -> Result<usize, PipelineError> {
        let name = repo.name();
        let icons = run_dir.join("icons");
        info!(repo = name, operation = "archive", "checking for screenshots in {}", icons.display());
        if !icons.is_dir() {
            return Ok(0);
        }

        let (subdirs, skipped) =
            archive::icon_subdirs(&icons).map_err(|source| PipelineError::ArchiveIo {
                path: icons.clone(),
                source,
            })?;
        for entry in skipped {
            debug!(repo = name, operation = "archive", entry = %entry.to_string_lossy(), "skipping non-directory icon entry");
        }
        if subdirs.is_empty() {
            return Ok(0);
        }

        let out_dir = run_dir.join("appstream");
        fs::create_dir_all(&out_dir).map_err(|source| PipelineError::ArchiveIo {
            path: out_dir.clone(),
            source,
        })?;

        for sub in &subdirs {
            let source = icons.join(sub);
            let archive = out_dir.join(ArchiveCommand::archive_name(name, sub));
            info!(repo = name, operation = "archive", "found screenshots dir at {}", source.display());

            let spec = self.archiver.spec(repo, &source, &archive);
            let report = self
                .supervisor
                .run(&spec)
                .await
                .map_err(PipelineError::Archive)?;
            self.check_exit(name, archive::ARCHIVER_TOOL, &report)
                .map_err(|status| PipelineError::ArchiveExit {
                    archive: archive.clone(),
                    status,
                })?;
        }
        Ok(subdirs.len())
    }

    /// Applies the non-zero exit policy; `Err` carries the exit description.
    fn check_exit(&self, repo: &str, tool: &str, report: &ExitReport) -> Result<(), String> {
        if report.success() {
            return Ok(());
        }
        if self.fail_on_non_zero.is_enabled() {
            return Err(report.describe());
        }
        warn!(repo, tool, status = %report.describe(), "tool exited unsuccessfully; continuing");
        Ok(())
    }

    async fn prune(&self, repo: &str) -> Result<PruneReport, RetentionError> {
        let cleaner = self.cleaner;
        let dir = self.publisher.repo_dir(repo);
        tokio::task::spawn_blocking(move || cleaner.prune(&dir))
            .await
            .map_err(|e| RetentionError::Aborted(e.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use compose_exec::{MemorySink, Stream};
    use compose_model::RunStatus;
    use tempfile::TempDir;

    use super::*;
    use crate::testing::Fixture;

    #[tokio::test]
    async fn successful_run_publishes_and_logs() {
        let fx = Fixture::new(&["repoA"]);
        let sink = Arc::new(MemorySink::new());
        let pipeline = fx.pipeline(sink.clone());

        let run = pipeline.run(&fx.repo("repoA")).await.unwrap();

        assert_eq!(run.status(), RunStatus::Published);
        assert_eq!(run.stamp().as_str(), "202401010000");
        let latest = fx.out().join("repoA/latest");
        assert_eq!(fs::read_link(&latest).unwrap(), Path::new("202401010000"));
        assert!(latest.join("appstream/repoA.xml").is_file());
        assert_eq!(
            sink.texts(Some("repoA"), Stream::Stdout),
            vec!["INFO: composing repoA", "partial line"]
        );
    }

    #[tokio::test]
    async fn builder_receives_temp_and_previous_metadata_paths() {
        let fx = Fixture::new(&["repoA"]);
        let sink = Arc::new(MemorySink::new());
        fx.pipeline(sink.clone()).run(&fx.repo("repoA")).await.unwrap();

        let args = fs::read_to_string(fx.out().join("repoA/latest/appstream/args")).unwrap();
        assert!(args.contains(&format!("--temp-dir {}", fx.temp_root().join("repoA").display())));
        assert!(args.contains(&format!(
            "--old-metadata {}",
            fx.out().join("repoA/latest/appstream").display()
        )));
        assert!(args.contains("--origin terra"));
    }

    #[tokio::test]
    async fn non_zero_build_fails_without_publishing() {
        let fx = Fixture::new(&["repoA"]);
        fx.mark_failing("repoA");
        let pipeline = fx.pipeline(Arc::new(MemorySink::new()));

        let err = pipeline.run(&fx.repo("repoA")).await.unwrap_err();

        assert!(matches!(err, PipelineError::BuildExit { .. }), "got {err:?}");
        assert_eq!(err.stage(), "build");
        assert!(fs::symlink_metadata(fx.out().join("repoA/latest")).is_err());
    }

    #[tokio::test]
    async fn non_zero_build_tolerated_when_policy_disabled() {
        let fx = Fixture::new(&["repoA"]);
        fx.mark_failing("repoA");
        let mut cfg = fx.config();
        cfg.fail_on_non_zero = Flag::disabled();
        let pipeline = fx.pipeline_with(&cfg, Arc::new(MemorySink::new()));

        let run = pipeline.run(&fx.repo("repoA")).await.unwrap();
        assert_eq!(run.status(), RunStatus::Published);
        assert!(fx.out().join("repoA/latest").is_dir());
    }

    #[tokio::test]
    async fn missing_builder_is_a_build_error() {
        let fx = Fixture::new(&["repoA"]);
        let mut cfg = fx.config();
        cfg.builder = "/nonexistent/appstream-builder".into();
        let pipeline = fx.pipeline_with(&cfg, Arc::new(MemorySink::new()));

        let err = pipeline.run(&fx.repo("repoA")).await.unwrap_err();
        assert!(matches!(err, PipelineError::Build(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn screenshots_are_archived_next_to_metadata() {
        let fx = Fixture::new(&["repoA"]);
        fx.add_screenshots("repoA", &["64x64", "128x128"]);
        let sink = Arc::new(MemorySink::new());
        fx.pipeline(sink.clone()).run(&fx.repo("repoA")).await.unwrap();

        let appstream = fx.out().join("repoA/latest/appstream");
        for sub in ["64x64", "128x128"] {
            let archive = appstream.join(format!("repoA-icons-{sub}.tar.gz"));
            assert!(archive.is_file(), "missing {}", archive.display());
        }
    }

    #[tokio::test]
    async fn archiver_failure_fails_the_run() {
        let fx = Fixture::new(&["repoA"]);
        fx.add_screenshots("repoA", &["64x64"]);
        let mut cfg = fx.config();
        cfg.archiver = "false".into();
        let pipeline = fx.pipeline_with(&cfg, Arc::new(MemorySink::new()));

        let err = pipeline.run(&fx.repo("repoA")).await.unwrap_err();
        assert!(matches!(err, PipelineError::ArchiveExit { .. }), "got {err:?}");
        assert!(fs::symlink_metadata(fx.out().join("repoA/latest")).is_err());
    }

    #[tokio::test]
    async fn same_minute_rerun_reuses_directory() {
        let fx = Fixture::new(&["repoA"]);
        let pipeline = fx.pipeline(Arc::new(MemorySink::new()));

        let first = pipeline.run(&fx.repo("repoA")).await.unwrap();
        let second = pipeline.run(&fx.repo("repoA")).await.unwrap();

        assert_eq!(first.output_dir(), second.output_dir());
        assert_eq!(
            fs::read_link(fx.out().join("repoA/latest")).unwrap(),
            Path::new("202401010000")
        );
    }

    #[tokio::test]
    async fn newer_named_leftover_never_takes_latest_down() {
        let fx = Fixture::new(&["repoA"]);
        fs::create_dir_all(fx.out().join("repoA/202401010100")).unwrap();
        let mut cfg = fx.config();
        cfg.keep = 1;

        let run = fx
            .pipeline_with(&cfg, Arc::new(MemorySink::new()))
            .run(&fx.repo("repoA"))
            .await
            .unwrap();

        assert_eq!(run.status(), RunStatus::Published);
        let latest = fx.out().join("repoA/latest");
        assert_eq!(fs::read_link(&latest).unwrap(), Path::new("202401010000"));
        assert!(latest.join("appstream/repoA.xml").is_file(), "latest must resolve");
        assert_eq!(fx.runs("repoA"), vec!["202401010000"]);
    }

    #[tokio::test]
    async fn legacy_repodata_link_is_created_before_build() {
        let fx = Fixture::new(&["repoA"]);
        fs::create_dir_all(fx.base().join("repoA/repodata")).unwrap();
        fx.pipeline(Arc::new(MemorySink::new()))
            .run(&fx.repo("repoA"))
            .await
            .unwrap();

        assert!(fx.base().join("repoA/os/repodata").is_dir());
    }

    #[tokio::test]
    async fn unwritable_output_root_fails_prepare() {
        let tmp = TempDir::new().unwrap();
        let fx = Fixture::new(&["repoA"]);
        // Output root that is a file: preparing the run fails first.
        let blocked = tmp.path().join("blocked");
        fs::write(&blocked, "").unwrap();
        let mut cfg = fx.config();
        cfg.output_dir = blocked;

        let err = fx
            .pipeline_with(&cfg, Arc::new(MemorySink::new()))
            .run(&fx.repo("repoA"))
            .await
            .unwrap_err();
        assert_eq!(err.stage(), "prepare");
    }
}
