// Monitoring-system port for dashboard listing and retrieval
use crate::domain::dashboard::DashboardRecord;
use async_trait::async_trait;

#[async_trait]
pub trait DashboardSource: Send + Sync {
    /// List the uid of every stored dashboard
    async fn list_dashboard_uids(&self) -> anyhow::Result<Vec<String>>;

    /// Fetch one dashboard and derive its target filename and serialized content
    async fn fetch_dashboard(&self, uid: &str) -> anyhow::Result<DashboardRecord>;
}
