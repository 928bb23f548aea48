// Sync service - Lists, fetches and drift-checks dashboards, then publishes the changes
use crate::application::change_publisher::{ChangePublisher, PublishedChange};
use crate::application::dashboard_source::DashboardSource;
use crate::application::drift_detector::DriftDetector;
use crate::domain::dashboard::{ChangeCandidate, ChangeSet};
use anyhow::Context;
use futures::{StreamExt, TryStreamExt, stream};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    NoChanges,
    /// Filenames that would have been published
    DryRun(Vec<String>),
    Published(PublishedChange),
}

#[derive(Clone)]
pub struct SyncService {
    source: Arc<dyn DashboardSource>,
    detector: DriftDetector,
    publisher: ChangePublisher,
    concurrency: Option<usize>,
    dry_run: bool,
}

impl SyncService {
    pub fn new(
        source: Arc<dyn DashboardSource>,
        detector: DriftDetector,
        publisher: ChangePublisher,
    ) -> Self {
        Self {
            source,
            detector,
            publisher,
            concurrency: None,
            dry_run: false,
        }
    }

    /// Cap simultaneous fetches; `None` dispatches every dashboard at once
    pub fn with_concurrency(mut self, concurrency: Option<usize>) -> Self {
        self.concurrency = concurrency.filter(|limit| *limit > 0);
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub async fn run(&self) -> anyhow::Result<SyncOutcome> {
        let uids = self
            .source
            .list_dashboard_uids()
            .await
            .context("Failed to list dashboards")?;
        tracing::info!("Found {} dashboards", uids.len());

        let candidates = self.collect_candidates(uids).await?;
        let change_set = ChangeSet::from_candidates(candidates);

        if change_set.is_empty() {
            tracing::debug!("Every dashboard matches the repository");
            return Ok(SyncOutcome::NoChanges);
        }

        tracing::info!("{} dashboards changed: {:?}", change_set.len(), change_set.filenames());

        if self.dry_run {
            return Ok(SyncOutcome::DryRun(change_set.filenames()));
        }

        let published = match self.publisher.publish(&change_set).await {
            Ok(published) => published,
            Err(e) => {
                if let Some(step) = e.step() {
                    tracing::warn!(
                        "Publishing stopped while {}; anything created before that step was left in place",
                        step
                    );
                }
                return Err(anyhow::Error::new(e).context("Failed to publish dashboard changes"));
            }
        };
        tracing::info!(
            "Opened pull request #{} {} (branch {}, commit {})",
            published.pull_request_number,
            published.pull_request_url,
            published.branch,
            published.commit_sha
        );

        Ok(SyncOutcome::Published(published))
    }

    /// Fetch and drift-check every dashboard concurrently, failing on the first error
    async fn collect_candidates(&self, uids: Vec<String>) -> anyhow::Result<Vec<ChangeCandidate>> {
        let limit = self.concurrency.unwrap_or(uids.len()).max(1);

        stream::iter(uids)
            .map(|uid| self.fetch_and_check(uid))
            .buffer_unordered(limit)
            .try_collect()
            .await
    }

    async fn fetch_and_check(&self, uid: String) -> anyhow::Result<ChangeCandidate> {
        let record = self
            .source
            .fetch_dashboard(&uid)
            .await
            .with_context(|| format!("Failed to fetch dashboard {}", uid))?;

        let filename = record.filename.clone();
        self.detector
            .check(record)
            .await
            .with_context(|| format!("Failed to compare {} with the repository", filename))
    }
}
