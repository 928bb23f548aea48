// GitHub REST API client for file reads and the git data calls used to publish
use crate::application::repository_host::{
    CommitRef, PullRequest, RepositoryError, RepositoryErrorKind, RepositoryHost, RepositoryResult,
    TreeEntry,
};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "https://api.github.com";

const JSON_MEDIA_TYPE: &str = "application/vnd.github+json";
const RAW_MEDIA_TYPE: &str = "application/vnd.github.raw";
const API_VERSION: &str = "2022-11-28";
const REGULAR_FILE_MODE: &str = "100644";

#[derive(Debug, Deserialize)]
struct CommitListItem {
    sha: String,
    commit: CommitDetail,
}

#[derive(Debug, Deserialize)]
struct CommitDetail {
    tree: ShaOnly,
}

#[derive(Debug, Deserialize)]
struct ShaOnly {
    sha: String,
}

#[derive(Debug, Serialize)]
struct CreateTreeRequest<'a> {
    base_tree: &'a str,
    tree: Vec<TreeItem<'a>>,
}

#[derive(Debug, Serialize)]
struct TreeItem<'a> {
    path: &'a str,
    mode: &'static str,
    #[serde(rename = "type")]
    kind: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct CreateCommitRequest<'a> {
    message: &'a str,
    tree: &'a str,
    parents: &'a [String],
}

#[derive(Debug, Serialize)]
struct CreateRefRequest<'a> {
    #[serde(rename = "ref")]
    git_ref: String,
    sha: &'a str,
}

#[derive(Debug, Serialize)]
struct CreatePullRequest<'a> {
    title: &'a str,
    body: &'a str,
    head: &'a str,
    base: &'a str,
}

#[derive(Debug, Deserialize)]
struct PullRequestResponse {
    number: u64,
    html_url: String,
}

#[derive(Debug, Clone)]
pub struct GitHubClient {
    client: reqwest::Client,
    api_url: String,
    owner: String,
    repo: String,
    token: String,
}

impl GitHubClient {
    pub fn new(
        api_url: String,
        owner: String,
        repo: String,
        token: String,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(JSON_MEDIA_TYPE));
        headers.insert("x-github-api-version", HeaderValue::from_static(API_VERSION));

        let client = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            owner,
            repo,
            token,
        })
    }

    fn repo_url(&self, suffix: &str) -> String {
        format!("{}/repos/{}/{}/{}", self.api_url, self.owner, self.repo, suffix)
    }

    fn contents_url(&self, path: &str, git_ref: &str) -> String {
        let encoded_path = path
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect::<Vec<_>>()
            .join("/");
        format!(
            "{}?ref={}",
            self.repo_url(&format!("contents/{}", encoded_path)),
            urlencoding::encode(git_ref)
        )
    }

    async fn send(&self, request: RequestBuilder) -> RepositoryResult<Response> {
        let response = request
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let headers = response.headers().clone();
        let body = response.text().await.unwrap_or_default();
        let message = error_message(&body);
        Err(RepositoryError::new(
            classify_status(status, &headers, &message),
            format!("GitHub returned {}: {}", status, message),
        ))
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> RepositoryResult<T> {
        self.send(request)
            .await?
            .json::<T>()
            .await
            .map_err(transport_error)
    }
}

#[async_trait]
impl RepositoryHost for GitHubClient {
    async fn get_file_contents(&self, path: &str, git_ref: &str) -> RepositoryResult<String> {
        let url = self.contents_url(path, git_ref);
        tracing::debug!("GET {}", url);

        let request = self.client.get(&url).header(ACCEPT, RAW_MEDIA_TYPE);
        self.send(request).await?.text().await.map_err(transport_error)
    }

    async fn latest_commit(&self, branch: &str) -> RepositoryResult<CommitRef> {
        let url = self.repo_url("commits");
        let request = self
            .client
            .get(&url)
            .query(&[("sha", branch), ("per_page", "1")]);

        let commits: Vec<CommitListItem> = self.send_json(request).await?;
        let latest = commits.into_iter().next().ok_or_else(|| {
            RepositoryError::new(
                RepositoryErrorKind::NotFound,
                format!("branch {} has no commits", branch),
            )
        })?;

        Ok(CommitRef {
            sha: latest.sha,
            tree_sha: latest.commit.tree.sha,
        })
    }

    async fn create_tree(&self, base_tree: &str, entries: &[TreeEntry]) -> RepositoryResult<String> {
        let body = CreateTreeRequest {
            base_tree,
            tree: entries
                .iter()
                .map(|entry| TreeItem {
                    path: &entry.path,
                    mode: REGULAR_FILE_MODE,
                    kind: "blob",
                    content: &entry.content,
                })
                .collect(),
        };

        let request = self.client.post(self.repo_url("git/trees")).json(&body);
        let tree: ShaOnly = self.send_json(request).await?;
        Ok(tree.sha)
    }

    async fn create_commit(
        &self,
        message: &str,
        tree_sha: &str,
        parents: &[String],
    ) -> RepositoryResult<String> {
        let body = CreateCommitRequest {
            message,
            tree: tree_sha,
            parents,
        };

        let request = self.client.post(self.repo_url("git/commits")).json(&body);
        let commit: ShaOnly = self.send_json(request).await?;
        Ok(commit.sha)
    }

    async fn create_branch(&self, branch: &str, sha: &str) -> RepositoryResult<()> {
        let body = CreateRefRequest {
            git_ref: format!("refs/heads/{}", branch),
            sha,
        };

        let request = self.client.post(self.repo_url("git/refs")).json(&body);
        self.send(request).await?;
        Ok(())
    }

    async fn create_pull_request(
        &self,
        title: &str,
        body: &str,
        head: &str,
        base: &str,
    ) -> RepositoryResult<PullRequest> {
        let payload = CreatePullRequest {
            title,
            body,
            head,
            base,
        };

        let request = self.client.post(self.repo_url("pulls")).json(&payload);
        let pull: PullRequestResponse = self.send_json(request).await?;
        Ok(PullRequest {
            number: pull.number,
            url: pull.html_url,
        })
    }
}

/// Map a failed GitHub response onto the repository error taxonomy
pub fn classify_status(status: StatusCode, headers: &HeaderMap, message: &str) -> RepositoryErrorKind {
    let quota_exhausted = headers
        .get("x-ratelimit-remaining")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim() == "0")
        .unwrap_or(false);

    match status {
        StatusCode::NOT_FOUND => RepositoryErrorKind::NotFound,
        StatusCode::TOO_MANY_REQUESTS => RepositoryErrorKind::RateLimited,
        StatusCode::FORBIDDEN if quota_exhausted => RepositoryErrorKind::RateLimited,
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => RepositoryErrorKind::Unauthorized,
        StatusCode::CONFLICT => RepositoryErrorKind::Conflict,
        // 422 is also GitHub's generic validation failure
        StatusCode::UNPROCESSABLE_ENTITY if message.contains("already exists") => {
            RepositoryErrorKind::Conflict
        }
        _ => RepositoryErrorKind::Unexpected,
    }
}

fn transport_error(e: reqwest::Error) -> RepositoryError {
    RepositoryError::new(RepositoryErrorKind::Transport, e.to_string())
}

/// GitHub error bodies carry a `message` field; fall back to the raw text
fn error_message(body: &str) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        message: String,
    }

    serde_json::from_str::<ErrorBody>(body)
        .map(|b| b.message)
        .unwrap_or_else(|_| body.trim().to_string())
}
