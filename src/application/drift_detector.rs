// Drift detector - Compares fetched dashboards against the repository copy
use crate::application::repository_host::{RepositoryHost, RepositoryResult, repository_path};
use crate::domain::content_hash;
use crate::domain::dashboard::{ChangeCandidate, DashboardRecord};
use std::sync::Arc;

#[derive(Clone)]
pub struct DriftDetector {
    repository: Arc<dyn RepositoryHost>,
    directory: String,
    base_branch: String,
}

impl DriftDetector {
    pub fn new(repository: Arc<dyn RepositoryHost>, directory: String, base_branch: String) -> Self {
        Self {
            repository,
            directory,
            base_branch,
        }
    }

    /// Decide whether `record` differs from the stored file. Never writes to the repository.
    pub async fn check(&self, record: DashboardRecord) -> RepositoryResult<ChangeCandidate> {
        let path = repository_path(&self.directory, &record.filename);

        let needs_update = match self.repository.get_file_contents(&path, &self.base_branch).await {
            Ok(existing) => content_hash::differs(&existing, &record.content),
            Err(e) if e.is_not_found() => {
                tracing::debug!("{} is not in the repository yet", path);
                true
            }
            Err(e) => return Err(e),
        };

        tracing::debug!("{}: needs update = {}", path, needs_update);
        Ok(ChangeCandidate::new(record, needs_update))
    }
}
