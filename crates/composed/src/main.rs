use std::{path::PathBuf, sync::Arc};

use anyhow::Context;
use tracing::{info, warn};

use compose_core::{
    ComposeConfig, ComposeScheduler, CoreError, Pipeline, RepositoryScanner, SystemClock,
};
use compose_exec::TracingSink;
use compose_model::Repository;
use compose_observe::{LoggerConfig, init_local_offset, init_logger};

fn main() -> anyhow::Result<()> {
    // 1) local offset; only reliable while the process is single-threaded
    init_local_offset();

    // 2) .env, if any; a missing file is fine, a malformed one is not
    let dotenv = dotenvy::dotenv().map(Some).or_else(|err| match err {
        dotenvy::Error::Io(_) => Ok(None),
        other => Err(other),
    })?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;
    runtime.block_on(run(dotenv))
}

async fn run(dotenv: Option<PathBuf>) -> anyhow::Result<()> {
    // 3) logger
    let log_cfg = LoggerConfig::from_env()?;
    init_logger(&log_cfg)?;
    if let Some(path) = dotenv {
        info!(path = %path.display(), "loaded environment file");
    }

    // 4) config; missing required settings abort before any work
    let cfg = ComposeConfig::from_env()?;
    info!(
        base = %cfg.base_dir.display(),
        output = %cfg.output_dir.display(),
        keep = cfg.keep,
        workers = cfg.workers,
        "configuration loaded"
    );

    // 5) discovery; a scan error is fatal
    let repos = discover(&cfg)?;
    info!(count = repos.len(), "repositories discovered");

    // 6) fan out
    let pipeline = Arc::new(Pipeline::new(
        &cfg,
        Arc::new(TracingSink),
        Arc::new(SystemClock),
    ));
    let outcomes = ComposeScheduler::new(pipeline, cfg.workers).run(repos).await;
    for failed in outcomes.iter().filter(|o| !o.is_success()) {
        warn!(
            repo = %failed.repo,
            error = failed.error.as_deref().unwrap_or("unknown"),
            "repository not published"
        );
    }
    Ok(())
}

/// Lists the repositories under the base directory, skipping the output root.
fn discover(cfg: &ComposeConfig) -> Result<Vec<Repository>, CoreError> {
    let repos = RepositoryScanner::new(&cfg.base_dir, &cfg.output_dir)
        .scan()?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(repos)
}
