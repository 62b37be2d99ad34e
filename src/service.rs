//! Remote collaborators: build retrieval, keep-flag updates, phase metrics.

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

use crate::config::{DateRange, Grouping};
use crate::metrics::MetricsPayload;
use crate::models::BuildPage;

/// Filtered, paginated build query for one team.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildQuery {
    pub team_id: String,
    pub environment_ids: Vec<String>,
    pub component_ids: Vec<String>,
    pub skip: u64,
    pub limit: u64,
    pub range: DateRange,
}

/// Phase metrics query; `component: None` means any component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsQuery {
    pub team_id: String,
    pub component: Option<String>,
    pub range: DateRange,
    pub grouping: Grouping,
}

impl MetricsQuery {
    /// Query string that reproduces this view, for sharing.
    pub fn to_query_string(&self) -> String {
        let mut out = url::form_urlencoded::Serializer::new(String::new());
        out.append_pair("teamId", &self.team_id);
        out.append_pair("component", self.component.as_deref().unwrap_or("any"));
        out.append_pair("grouping", self.grouping.as_str());
        out.append_pair("startDate", &self.range.start.format("%Y-%m-%d").to_string());
        out.append_pair("endDate", &self.range.end.format("%Y-%m-%d").to_string());
        out.finish()
    }
}

#[async_trait]
pub trait BuildRetrieval: Send + Sync {
    async fn builds_with_date_filters(&self, query: &BuildQuery) -> Result<BuildPage>;
}

/// One call per build; there is no batch endpoint.
#[async_trait]
pub trait KeepFlagUpdater: Send + Sync {
    async fn set_keep(&self, build_id: &str, keep: bool) -> Result<()>;
}

#[async_trait]
pub trait MetricsRetrieval: Send + Sync {
    async fn phase_metrics(&self, query: &MetricsQuery) -> Result<MetricsPayload>;
}
