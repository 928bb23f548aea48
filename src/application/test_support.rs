// In-memory stand-ins for the remote APIs
use crate::application::dashboard_source::DashboardSource;
use crate::application::repository_host::{
    CommitRef, PullRequest, RepositoryError, RepositoryErrorKind, RepositoryHost, RepositoryResult,
    TreeEntry,
};
use crate::domain::dashboard::DashboardRecord;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Default)]
pub struct FakeRepository {
    files: HashMap<String, String>,
    branches: Mutex<HashSet<String>>,
    read_error: Option<RepositoryErrorKind>,
    failing_call: Option<&'static str>,
    calls: Mutex<Vec<String>>,
    trees: Mutex<Vec<Vec<TreeEntry>>>,
    commit_messages: Mutex<Vec<String>>,
}

impl FakeRepository {
    pub fn with_file(mut self, path: &str, content: &str) -> Self {
        self.files.insert(path.to_string(), content.to_string());
        self
    }

    pub fn with_branch(self, branch: &str) -> Self {
        self.branches.lock().unwrap().insert(branch.to_string());
        self
    }

    pub fn with_read_error(mut self, kind: RepositoryErrorKind) -> Self {
        self.read_error = Some(kind);
        self
    }

    pub fn failing_at(mut self, call: &'static str) -> Self {
        self.failing_call = Some(call);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn write_calls(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.starts_with("create_"))
            .collect()
    }

    pub fn trees(&self) -> Vec<Vec<TreeEntry>> {
        self.trees.lock().unwrap().clone()
    }

    pub fn commit_messages(&self) -> Vec<String> {
        self.commit_messages.lock().unwrap().clone()
    }

    fn record(&self, name: &'static str, detail: String) -> RepositoryResult<()> {
        self.calls.lock().unwrap().push(format!("{} {}", name, detail));
        if self.failing_call == Some(name) {
            return Err(RepositoryError::new(
                RepositoryErrorKind::Unexpected,
                format!("{} failed", name),
            ));
        }
        Ok(())
    }

    pub fn count_calls(&self, prefix: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }
}

#[async_trait]
impl RepositoryHost for FakeRepository {
    async fn get_file_contents(&self, path: &str, git_ref: &str) -> RepositoryResult<String> {
        self.record("get_file_contents", format!("{}@{}", path, git_ref))?;
        if let Some(kind) = self.read_error {
            return Err(RepositoryError::new(kind, path));
        }
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| RepositoryError::new(RepositoryErrorKind::NotFound, path))
    }

    async fn latest_commit(&self, branch: &str) -> RepositoryResult<CommitRef> {
        self.record("latest_commit", branch.to_string())?;
        Ok(CommitRef {
            sha: "tip-sha".into(),
            tree_sha: "base-tree".into(),
        })
    }

    async fn create_tree(&self, base_tree: &str, entries: &[TreeEntry]) -> RepositoryResult<String> {
        let paths: Vec<&str> = entries.iter().map(|e| e.path.as_str()).collect();
        self.record("create_tree", format!("{} [{}]", base_tree, paths.join(", ")))?;
        let mut trees = self.trees.lock().unwrap();
        trees.push(entries.to_vec());
        Ok(format!("tree-{}", trees.len()))
    }

    async fn create_commit(
        &self,
        message: &str,
        tree_sha: &str,
        parents: &[String],
    ) -> RepositoryResult<String> {
        self.record("create_commit", format!("{} parents [{}]", tree_sha, parents.join(", ")))?;
        let mut messages = self.commit_messages.lock().unwrap();
        messages.push(message.to_string());
        Ok(format!("commit-{}", messages.len()))
    }

    async fn create_branch(&self, branch: &str, sha: &str) -> RepositoryResult<()> {
        self.record("create_branch", format!("{} {}", branch, sha))?;
        if !self.branches.lock().unwrap().insert(branch.to_string()) {
            return Err(RepositoryError::new(
                RepositoryErrorKind::Conflict,
                "Reference already exists",
            ));
        }
        Ok(())
    }

    async fn create_pull_request(
        &self,
        _title: &str,
        _body: &str,
        head: &str,
        base: &str,
    ) -> RepositoryResult<PullRequest> {
        self.record("create_pull_request", format!("{} -> {}", head, base))?;
        let number = self.count_calls("create_pull_request") as u64;
        Ok(PullRequest {
            number,
            url: format!("https://example.test/pull/{}", number),
        })
    }
}

/// Serves dashboards from memory and tracks how many fetches overlap
#[derive(Default)]
pub struct FakeDashboardSource {
    dashboards: BTreeMap<String, DashboardRecord>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    fetches: AtomicUsize,
}

impl FakeDashboardSource {
    pub fn with_dashboard(mut self, uid: &str, filename: &str, content: &str) -> Self {
        self.dashboards
            .insert(uid.to_string(), DashboardRecord::new(filename, content));
        self
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DashboardSource for FakeDashboardSource {
    async fn list_dashboard_uids(&self) -> anyhow::Result<Vec<String>> {
        Ok(self.dashboards.keys().cloned().collect())
    }

    async fn fetch_dashboard(&self, uid: &str) -> anyhow::Result<DashboardRecord> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep(Duration::from_millis(5)).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.dashboards
            .get(uid)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("dashboard {} not found", uid))
    }
}
