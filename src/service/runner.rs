//! Batch runner
//!
//! Feeds a list of releases through search, ranking, review and download
//! supervision, and owns the background polling tasks.

use crate::matcher::MatchEngine;
use crate::model::{RawResult, ReleaseSpec};
use crate::service::decision::{Decision, DecisionMaker};
use crate::service::hub::PollingHub;
use crate::service::search::SearchScheduler;
use crate::service::supervisor::{DownloadSupervisor, Outcome, SupervisorPolicy};
use crate::service::transfer::TransferService;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info};

/// Outcome of every release in a batch, in completion order
#[derive(Debug, Default, Clone)]
pub struct BatchSummary {
    pub results: Vec<(String, Outcome)>,
}

impl BatchSummary {
    pub fn record(&mut self, release: impl Into<String>, outcome: Outcome) {
        self.results.push((release.into(), outcome));
    }

    pub fn total(&self) -> usize {
        self.results.len()
    }

    pub fn count(&self, outcome: Outcome) -> usize {
        self.results.iter().filter(|(_, o)| *o == outcome).count()
    }

    /// Names of the releases that ended with `outcome`
    pub fn releases(&self, outcome: Outcome) -> Vec<&str> {
        self.results
            .iter()
            .filter(|(_, o)| *o == outcome)
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

/// Background tasks that run until shut down
#[derive(Default)]
pub struct ServiceHandles {
    handles: Vec<(&'static str, JoinHandle<()>)>,
}

impl ServiceHandles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn<F>(&mut self, name: &'static str, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        debug!("Starting background task: {}", name);
        self.handles.push((name, tokio::spawn(task)));
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Abort every task and wait for it to stop
    pub async fn shutdown(self) {
        for (name, handle) in self.handles {
            handle.abort();
            match handle.await {
                Err(e) if e.is_panic() => error!("Background task {} panicked", name),
                _ => debug!("Stopped background task: {}", name),
            }
        }
    }
}

#[derive(Clone)]
pub struct BatchRunner {
    scheduler: Arc<SearchScheduler>,
    engine: Arc<MatchEngine>,
    decision: Arc<dyn DecisionMaker>,
    transfers: Arc<TransferService>,
    hub: Arc<PollingHub>,
    policy: SupervisorPolicy,
    /// Delay between consecutive search submissions
    spacing: Duration,
}

impl BatchRunner {
    pub fn new(
        scheduler: Arc<SearchScheduler>,
        engine: Arc<MatchEngine>,
        decision: Arc<dyn DecisionMaker>,
        transfers: Arc<TransferService>,
        hub: Arc<PollingHub>,
        policy: SupervisorPolicy,
    ) -> Self {
        Self {
            scheduler,
            engine,
            decision,
            transfers,
            hub,
            policy,
            spacing: Duration::from_secs(1),
        }
    }

    pub fn with_spacing(mut self, spacing: Duration) -> Self {
        self.spacing = spacing;
        self
    }

    /// Process every release and wait for all of them to resolve
    pub async fn run(&self, releases: Vec<ReleaseSpec>) -> BatchSummary {
        info!("Processing {} releases", releases.len());
        let mut tasks = JoinSet::new();

        for (i, release) in releases.into_iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.spacing).await;
            }
            let results = self.scheduler.submit(release.clone()).await;
            let runner = self.clone();
            tasks.spawn(async move {
                let name = release.search_string();
                let work = tokio::spawn(runner.process(release, results));
                let outcome = match work.await {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        error!("Processing '{}' failed: {}", name, e);
                        Outcome::TriedFailed
                    }
                };
                (name, outcome)
            });
        }

        let mut summary = BatchSummary::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((name, outcome)) => summary.record(name, outcome),
                Err(e) => error!("Release task failed: {}", e),
            }
        }
        summary
    }

    async fn process(self, release: ReleaseSpec, results: oneshot::Receiver<Vec<RawResult>>) -> Outcome {
        let results = results.await.unwrap_or_default();
        let ranked = self.engine.process(&release, &results);

        let Some(best) = ranked.best() else {
            info!("No usable results for '{}'", release.search_string());
            return Outcome::DidntTry;
        };
        debug!(
            "Best uploader for '{}': {} (score {:.2}, {} of {} tracks)",
            release.search_string(),
            best.username,
            best.score,
            best.best_candidates.len(),
            release.track_count()
        );

        match self.decision.review(&ranked) {
            Decision::Skip => Outcome::ExplicitlySkipped,
            Decision::Proceed => {
                DownloadSupervisor::apply(ranked, self.transfers, self.hub, self.policy)
                    .await
                    .outcome()
                    .await
            }
        }
    }
}
