// Dashboard domain model
use serde::Deserialize;
use std::collections::BTreeMap;

const DASHBOARD_EXTENSION: &str = ".json";

/// Metadata Grafana attaches to a dashboard detail response
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DashboardMeta {
    #[serde(rename = "provisionedExternalId", default)]
    pub provisioned_external_id: Option<String>,
    #[serde(default)]
    pub slug: String,
}

/// Body of `GET /api/dashboards/uid/{uid}`
#[derive(Debug, Clone, Deserialize)]
pub struct DashboardPayload {
    #[serde(default)]
    pub meta: DashboardMeta,
    pub dashboard: serde_json::Value,
}

/// A dashboard ready to be stored: target filename plus serialized body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardRecord {
    pub filename: String,
    pub content: String,
}

impl DashboardRecord {
    pub fn new(filename: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            content: content.into(),
        }
    }

    /// Derive the filename and pretty-printed content from a detail payload
    pub fn from_payload(payload: &DashboardPayload) -> serde_json::Result<Self> {
        let filename = Self::derive_filename(&payload.meta);
        let content = serde_json::to_string_pretty(&payload.dashboard)?;
        Ok(Self::new(filename, content))
    }

    /// A provisioned dashboard keeps its external name, anything else is named after its slug
    pub fn derive_filename(meta: &DashboardMeta) -> String {
        match meta.provisioned_external_id.as_deref() {
            Some(external_id) if !external_id.is_empty() => external_id.to_string(),
            _ => format!("{}{}", meta.slug, DASHBOARD_EXTENSION),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeCandidate {
    pub record: DashboardRecord,
    pub needs_update: bool,
}

impl ChangeCandidate {
    pub fn new(record: DashboardRecord, needs_update: bool) -> Self {
        Self {
            record,
            needs_update,
        }
    }
}

/// The records that differ from what the repository holds, ordered by filename
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    records: Vec<DashboardRecord>,
}

impl ChangeSet {
    pub fn from_candidates(candidates: impl IntoIterator<Item = ChangeCandidate>) -> Self {
        let mut by_filename: BTreeMap<String, DashboardRecord> = BTreeMap::new();

        for candidate in candidates.into_iter().filter(|c| c.needs_update) {
            let filename = candidate.record.filename.clone();
            if by_filename.insert(filename.clone(), candidate.record).is_some() {
                tracing::warn!("Two dashboards map to {}, keeping the last one fetched", filename);
            }
        }

        Self {
            records: by_filename.into_values().collect(),
        }
    }

    pub fn records(&self) -> &[DashboardRecord] {
        &self.records
    }

    pub fn filenames(&self) -> Vec<String> {
        self.records.iter().map(|r| r.filename.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
