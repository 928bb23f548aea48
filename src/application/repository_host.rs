// Repository-hosting port: file reads plus the git data calls used to publish
use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepositoryErrorKind {
    NotFound,
    Unauthorized,
    RateLimited,
    /// The write collides with existing state, e.g. the ref already exists
    Conflict,
    Transport,
    Unexpected,
}

impl fmt::Display for RepositoryErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RepositoryErrorKind::NotFound => "not found",
            RepositoryErrorKind::Unauthorized => "unauthorized",
            RepositoryErrorKind::RateLimited => "rate limited",
            RepositoryErrorKind::Conflict => "conflict",
            RepositoryErrorKind::Transport => "transport failure",
            RepositoryErrorKind::Unexpected => "unexpected response",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct RepositoryError {
    kind: RepositoryErrorKind,
    message: String,
}

impl RepositoryError {
    pub fn new(kind: RepositoryErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> RepositoryErrorKind {
        self.kind
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == RepositoryErrorKind::NotFound
    }
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Tip of a branch as needed to build a new tree on top of it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRef {
    pub sha: String,
    pub tree_sha: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    pub path: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequest {
    pub number: u64,
    pub url: String,
}

#[async_trait]
pub trait RepositoryHost: Send + Sync {
    /// Raw content of `path` on `git_ref`
    async fn get_file_contents(&self, path: &str, git_ref: &str) -> RepositoryResult<String>;

    /// Most recent commit on `branch`
    async fn latest_commit(&self, branch: &str) -> RepositoryResult<CommitRef>;

    /// Create a tree of regular-file blobs on top of `base_tree`, returning its sha
    async fn create_tree(&self, base_tree: &str, entries: &[TreeEntry]) -> RepositoryResult<String>;

    async fn create_commit(
        &self,
        message: &str,
        tree_sha: &str,
        parents: &[String],
    ) -> RepositoryResult<String>;

    /// Create `refs/heads/{branch}` pointing at `sha`
    async fn create_branch(&self, branch: &str, sha: &str) -> RepositoryResult<()>;

    async fn create_pull_request(
        &self,
        title: &str,
        body: &str,
        head: &str,
        base: &str,
    ) -> RepositoryResult<PullRequest>;
}

/// Join a repository directory and filename without stray slashes
pub fn repository_path(directory: &str, filename: &str) -> String {
    let directory = directory.trim_matches('/');
    let filename = filename.trim_start_matches('/');
    if directory.is_empty() {
        filename.to_string()
    } else {
        format!("{}/{}", directory, filename)
    }
}
