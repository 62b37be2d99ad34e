#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashSet;
use std::sync::Mutex;
use tokio::sync::Notify;

use buildboard::config::{Config, DateRange};
use buildboard::metrics::MetricsPayload;
use buildboard::models::{Build, BuildPage};
use buildboard::service::{BuildQuery, BuildRetrieval, KeepFlagUpdater, MetricsQuery, MetricsRetrieval};

pub fn cfg() -> Config {
    Config {
        color_seed: Some(11),
        ..Config::default()
    }
}

pub fn range() -> DateRange {
    DateRange::new(
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(),
    )
}

/// Serves `total` builds named `b0..` per team, slicing by skip/limit.
pub struct MockBuilds {
    pub total: u64,
    pub metrics: MetricsPayload,
    pub queries: Mutex<Vec<BuildQuery>>,
    pub fail: Mutex<bool>,
    /// Requests for this team wait until `gate` is notified.
    pub slow_team: Option<String>,
    pub gate: Notify,
}

impl MockBuilds {
    pub fn new(total: u64) -> Self {
        Self {
            total,
            metrics: MetricsPayload::default(),
            queries: Mutex::new(Vec::new()),
            fail: Mutex::new(false),
            slow_team: None,
            gate: Notify::new(),
        }
    }

    pub fn queries(&self) -> Vec<BuildQuery> {
        self.queries.lock().unwrap().clone()
    }

    pub fn set_failing(&self, failing: bool) {
        *self.fail.lock().unwrap() = failing;
    }
}

#[async_trait]
impl BuildRetrieval for MockBuilds {
    async fn builds_with_date_filters(&self, query: &BuildQuery) -> Result<BuildPage> {
        self.queries.lock().unwrap().push(query.clone());
        if self.slow_team.as_deref() == Some(query.team_id.as_str()) {
            self.gate.notified().await;
        }
        if *self.fail.lock().unwrap() {
            return Err(anyhow!("service unavailable"));
        }
        let end = (query.skip + query.limit).min(self.total);
        let builds = (query.skip.min(end)..end)
            .map(|n| Build::new(format!("{}-b{}", query.team_id, n), query.team_id.clone()))
            .collect();
        Ok(BuildPage {
            builds,
            count: self.total,
            metrics: self.metrics.clone(),
        })
    }
}

/// Records keep updates; ids in `failing` are rejected.
#[derive(Default)]
pub struct MockKeeper {
    pub calls: Mutex<Vec<(String, bool)>>,
    pub failing: HashSet<String>,
}

impl MockKeeper {
    pub fn failing(ids: &[&str]) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            failing: ids.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn calls(&self) -> Vec<(String, bool)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl KeepFlagUpdater for MockKeeper {
    async fn set_keep(&self, build_id: &str, keep: bool) -> Result<()> {
        self.calls.lock().unwrap().push((build_id.to_string(), keep));
        tokio::task::yield_now().await;
        if self.failing.contains(build_id) {
            Err(anyhow!("rejected {}", build_id))
        } else {
            Ok(())
        }
    }
}

/// Returns a fixed payload, or fails when `payload` is `None`.
pub struct MockMetrics {
    pub payload: Mutex<Option<MetricsPayload>>,
    pub queries: Mutex<Vec<MetricsQuery>>,
}

impl MockMetrics {
    pub fn new(payload: Option<MetricsPayload>) -> Self {
        Self {
            payload: Mutex::new(payload),
            queries: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl MetricsRetrieval for MockMetrics {
    async fn phase_metrics(&self, query: &MetricsQuery) -> Result<MetricsPayload> {
        self.queries.lock().unwrap().push(query.clone());
        self.payload
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| anyhow!("metrics backend down"))
    }
}
