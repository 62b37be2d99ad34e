use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::metrics::{Counters, MetricsPayload};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Component {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub components: Vec<Component>,
}

/// Reference that the service may send either as a bare id or populated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityRef {
    Id(String),
    Named {
        #[serde(rename = "_id")]
        id: String,
        #[serde(default)]
        name: Option<String>,
    },
}

impl EntityRef {
    pub fn id(&self) -> &str {
        match self {
            EntityRef::Id(id) => id,
            EntityRef::Named { id, .. } => id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Build {
    #[serde(rename = "_id")]
    pub id: String,
    pub team: EntityRef,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub environment: Option<EntityRef>,
    #[serde(default)]
    pub component: Option<EntityRef>,
    #[serde(default)]
    pub start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub result: Counters,
    #[serde(default)]
    pub keep: bool,
    /// 1-based position within the displayed page; assigned locally.
    #[serde(default, skip_deserializing)]
    pub index: u64,
}

impl Build {
    /// Minimal build, mostly useful for tests and fixtures.
    pub fn new(id: impl Into<String>, team_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            team: EntityRef::Id(team_id.into()),
            name: None,
            environment: None,
            component: None,
            start: None,
            end: None,
            status: None,
            result: Counters::default(),
            keep: false,
            index: 0,
        }
    }

    pub fn duration_ms(&self) -> Option<i64> {
        match (self.start, self.end) {
            (Some(start), Some(end)) => Some((end - start).num_milliseconds().max(0)),
            _ => None,
        }
    }
}

/// One page as returned by the build retrieval service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildPage {
    #[serde(default)]
    pub builds: Vec<Build>,
    #[serde(default)]
    pub count: u64,
    #[serde(default, deserialize_with = "lenient_metrics")]
    pub metrics: MetricsPayload,
}

fn lenient_metrics<'de, D: Deserializer<'de>>(deserializer: D) -> Result<MetricsPayload, D::Error> {
    Ok(MetricsPayload::from_value(Value::deserialize(deserializer)?))
}
