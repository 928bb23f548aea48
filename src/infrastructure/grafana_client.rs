// Grafana HTTP API client
use crate::application::dashboard_source::DashboardSource;
use crate::domain::dashboard::{DashboardPayload, DashboardRecord};
use anyhow::Result;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GrafanaError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("unexpected response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned {status}: {body}")]
    Status {
        url: String,
        status: StatusCode,
        body: String,
    },

    #[error("dashboard {uid} could not be serialized: {source}")]
    Serialize {
        uid: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    uid: String,
}

#[derive(Debug, Clone)]
pub struct GrafanaClient {
    client: reqwest::Client,
    base_url: String,
    username: String,
    password: String,
}

impl GrafanaClient {
    pub fn new(
        base_url: String,
        username: String,
        password: String,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            username,
            password,
        })
    }

    fn search_url(&self) -> String {
        format!("{}/api/search?type=dash-db", self.base_url)
    }

    fn dashboard_url(&self, uid: &str) -> String {
        format!("{}/api/dashboards/uid/{}", self.base_url, urlencoding::encode(uid))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: String) -> Result<T, GrafanaError> {
        tracing::debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .basic_auth(&self.username, Some(&self.password))
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|source| GrafanaError::Request {
                url: url.clone(),
                source,
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GrafanaError::Status { url, status, body });
        }

        response
            .json::<T>()
            .await
            .map_err(|source| GrafanaError::Decode { url, source })
    }
}

#[async_trait]
impl DashboardSource for GrafanaClient {
    async fn list_dashboard_uids(&self) -> Result<Vec<String>> {
        let hits: Vec<SearchHit> = self.get_json(self.search_url()).await?;
        Ok(hits.into_iter().map(|hit| hit.uid).collect())
    }

    async fn fetch_dashboard(&self, uid: &str) -> Result<DashboardRecord> {
        let payload: DashboardPayload = self.get_json(self.dashboard_url(uid)).await?;
        let record = DashboardRecord::from_payload(&payload).map_err(|source| {
            GrafanaError::Serialize {
                uid: uid.to_string(),
                source,
            }
        })?;
        tracing::debug!("Fetched dashboard {} as {}", uid, record.filename);
        Ok(record)
    }
}
