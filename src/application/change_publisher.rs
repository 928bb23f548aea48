// Change publisher - Turns a change set into a branch and a pull request
use crate::application::repository_host::{
    RepositoryError, RepositoryHost, TreeEntry, repository_path,
};
use crate::domain::dashboard::ChangeSet;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

pub const COMMIT_MESSAGE: &str = "Update Grafana dashboards";

/// The remote calls made by [`ChangePublisher::publish`], in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishStep {
    LatestCommit,
    CreateTree,
    CreateCommit,
    CreateBranch,
    CreatePullRequest,
}

impl fmt::Display for PublishStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PublishStep::LatestCommit => "resolving latest commit",
            PublishStep::CreateTree => "creating tree",
            PublishStep::CreateCommit => "creating commit",
            PublishStep::CreateBranch => "creating branch",
            PublishStep::CreatePullRequest => "opening pull request",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("refusing to publish an empty change set")]
    EmptyChangeSet,

    /// Earlier steps are not rolled back; objects they created stay behind
    #[error("{step} failed: {source}")]
    Step {
        step: PublishStep,
        #[source]
        source: RepositoryError,
    },
}

impl PublishError {
    pub fn step(&self) -> Option<PublishStep> {
        match self {
            PublishError::EmptyChangeSet => None,
            PublishError::Step { step, .. } => Some(*step),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedChange {
    pub commit_sha: String,
    pub branch: String,
    pub pull_request_number: u64,
    pub pull_request_url: String,
}

#[derive(Clone)]
pub struct ChangePublisher {
    repository: Arc<dyn RepositoryHost>,
    directory: String,
    base_branch: String,
    branch: String,
}

impl ChangePublisher {
    pub fn new(
        repository: Arc<dyn RepositoryHost>,
        directory: String,
        base_branch: String,
        branch: String,
    ) -> Self {
        Self {
            repository,
            directory,
            base_branch,
            branch,
        }
    }

    pub async fn publish(&self, change_set: &ChangeSet) -> Result<PublishedChange, PublishError> {
        if change_set.is_empty() {
            return Err(PublishError::EmptyChangeSet);
        }

        let step = |step: PublishStep| move |source: RepositoryError| PublishError::Step { step, source };

        let tip = self
            .repository
            .latest_commit(&self.base_branch)
            .await
            .map_err(step(PublishStep::LatestCommit))?;
        tracing::debug!("Building on {} (tree {})", tip.sha, tip.tree_sha);

        let entries: Vec<TreeEntry> = change_set
            .records()
            .iter()
            .map(|record| TreeEntry {
                path: repository_path(&self.directory, &record.filename),
                content: record.content.clone(),
            })
            .collect();

        let tree_sha = self
            .repository
            .create_tree(&tip.tree_sha, &entries)
            .await
            .map_err(step(PublishStep::CreateTree))?;

        let commit_sha = self
            .repository
            .create_commit(COMMIT_MESSAGE, &tree_sha, &[tip.sha.clone()])
            .await
            .map_err(step(PublishStep::CreateCommit))?;
        tracing::info!("Created commit {}", commit_sha);

        self.repository
            .create_branch(&self.branch, &commit_sha)
            .await
            .map_err(step(PublishStep::CreateBranch))?;

        let pull_request = self
            .repository
            .create_pull_request(
                COMMIT_MESSAGE,
                &Self::pull_request_body(change_set),
                &self.branch,
                &self.base_branch,
            )
            .await
            .map_err(step(PublishStep::CreatePullRequest))?;

        Ok(PublishedChange {
            commit_sha,
            branch: self.branch.clone(),
            pull_request_number: pull_request.number,
            pull_request_url: pull_request.url,
        })
    }

    fn pull_request_body(change_set: &ChangeSet) -> String {
        let mut body = String::from("Dashboards changed in Grafana:\n");
        for filename in change_set.filenames() {
            body.push_str(&format!("\n- `{}`", filename));
        }
        body
    }
}
