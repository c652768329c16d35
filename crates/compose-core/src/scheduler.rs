//! Bounded fan-out of pipelines over the discovered repositories.
use std::sync::Arc;

use tokio::{sync::Semaphore, task::JoinSet};
use tracing::{Instrument, error, info, info_span};

use compose_model::{ComposeRun, Repository, RunStamp, RunStatus};

use crate::{error::PipelineError, pipeline::Pipeline};

/// How one repository's task ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoOutcome {
    pub repo: String,
    pub stamp: Option<RunStamp>,
    pub status: RunStatus,
    /// Stage-tagged error text for failed repositories.
    pub error: Option<String>,
}

impl RepoOutcome {
    fn published(run: &ComposeRun) -> Self {
        Self {
            repo: run.repo().to_string(),
            stamp: Some(run.stamp().clone()),
            status: run.status(),
            error: None,
        }
    }

    fn failed(repo: String, error: String) -> Self {
        Self {
            repo,
            stamp: None,
            status: RunStatus::Failed,
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Published
    }
}

/// Runs one [`Pipeline`] per repository, at most `concurrency` at a time.
///
/// Every task has its own error boundary: a failing or panicking pipeline is
/// reported as a failed outcome and never cancels its siblings.
pub struct ComposeScheduler {
    pipeline: Arc<Pipeline>,
    permits: Arc<Semaphore>,
    concurrency: usize,
}

impl ComposeScheduler {
    pub fn new(pipeline: Arc<Pipeline>, concurrency: usize) -> Self {
        let concurrency = concurrency.max(1);
        Self {
            pipeline,
            permits: Arc::new(Semaphore::new(concurrency)),
            concurrency,
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Submits every repository and waits for all of them.
    ///
    /// Outcomes are sorted by repository name.
    pub async fn run<I>(&self, repos: I) -> Vec<RepoOutcome>
    where
        I: IntoIterator<Item = Repository>,
    {
        let mut tasks = JoinSet::new();
        for repo in repos {
            let pipeline = Arc::clone(&self.pipeline);
            let permits = Arc::clone(&self.permits);
            tasks.spawn(async move {
                let name = repo.name().to_string();
                let Ok(_permit) = permits.acquire_owned().await else {
                    return RepoOutcome::failed(name, "worker pool closed".into());
                };

                let span = info_span!("repo", repo = %name);
                let task = tokio::spawn(async move { pipeline.run(&repo).await }.instrument(span));
                match task.await {
                    Ok(Ok(run)) => RepoOutcome::published(&run),
                    Ok(Err(e)) => failure(name, &e),
                    Err(e) => {
                        error!(repo = %name, "pipeline task aborted: {e}");
                        RepoOutcome::failed(name, format!("task aborted: {e}"))
                    }
                }
            });
        }
        info!(tasks = tasks.len(), concurrency = self.concurrency, "compose tasks submitted");

        let mut outcomes = Vec::with_capacity(tasks.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => error!("scheduler task aborted: {e}"),
            }
        }
        outcomes.sort_by(|a, b| a.repo.cmp(&b.repo));

        let published = outcomes.iter().filter(|o| o.is_success()).count();
        info!(
            total = outcomes.len(),
            published,
            failed = outcomes.len() - published,
            "compose run finished"
        );
        outcomes
    }
}

fn failure(repo: String, err: &PipelineError) -> RepoOutcome {
    error!(repo = %repo, operation = err.stage(), "repo failed: {err}");
    RepoOutcome::failed(repo, err.to_string())
}
