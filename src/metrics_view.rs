//! Metrics view: phase metrics for one team over a grouped date range.
//!
//! Each retrieval starts from `Loading`, builds a fresh color table and ends
//! in `Ready` or `Unavailable`. Responses from superseded retrievals are
//! dropped.

use anyhow::Result;
use chrono::NaiveDate;
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::colors::PlatformColorTable;
use crate::config::{Config, DateRange, Grouping, QueryParams};
use crate::logging::{log_fetch_failed, log_fetch_superseded};
use crate::metrics::{aggregate_fresh, AggregateSeries, MetricsPayload};
use crate::request::{RequestGeneration, RequestOutcome, Retrieval};
use crate::service::{MetricsQuery, MetricsRetrieval};

/// Component value that stands for "all components".
pub const ANY_COMPONENT: &str = "any";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsView {
    pub payload: MetricsPayload,
    pub series: AggregateSeries,
    pub colors: PlatformColorTable,
}

impl MetricsQuery {
    /// Initial query from page parameters; `fallback_team` is used when the
    /// query names no team.
    pub fn from_params(params: &QueryParams, fallback_team: &str, cfg: &Config, today: NaiveDate) -> Self {
        Self {
            team_id: params
                .team_id
                .clone()
                .unwrap_or_else(|| fallback_team.to_string()),
            component: params
                .component
                .clone()
                .filter(|c| c != ANY_COMPONENT),
            range: params.metrics_range(cfg, today),
            grouping: params.grouping.unwrap_or_default(),
        }
    }

    /// Switching team resets the component to any.
    pub fn with_team(&self, team_id: &str) -> Self {
        Self {
            team_id: team_id.to_string(),
            component: None,
            ..self.clone()
        }
    }

    pub fn with_component(&self, component: Option<&str>) -> Self {
        Self {
            component: component
                .filter(|c| *c != ANY_COMPONENT)
                .map(str::to_string),
            ..self.clone()
        }
    }

    pub fn with_range(&self, range: DateRange) -> Self {
        Self { range, ..self.clone() }
    }

    pub fn with_grouping(&self, grouping: Grouping) -> Self {
        Self { grouping, ..self.clone() }
    }
}

struct MetricsState {
    query: MetricsQuery,
    view: Retrieval<MetricsView>,
}

pub struct MetricsViewController {
    service: Arc<dyn MetricsRetrieval>,
    color_seed: Option<u64>,
    generation: RequestGeneration,
    state: Mutex<MetricsState>,
}

impl MetricsViewController {
    pub fn new(service: Arc<dyn MetricsRetrieval>, query: MetricsQuery, cfg: &Config) -> Self {
        Self {
            service,
            color_seed: cfg.color_seed,
            generation: RequestGeneration::new(),
            state: Mutex::new(MetricsState {
                query,
                view: Retrieval::Loading,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, MetricsState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn query(&self) -> MetricsQuery {
        self.state().query.clone()
    }

    /// Replaces the query without retrieving; call [`Self::retrieve`] to submit.
    pub fn update_query<F>(&self, transition: F) -> MetricsQuery
    where
        F: FnOnce(&MetricsQuery) -> MetricsQuery,
    {
        let mut state = self.state();
        state.query = transition(&state.query);
        state.query.clone()
    }

    pub fn view(&self) -> Retrieval<MetricsView> {
        self.state().view.clone()
    }

    /// Query string for the current query, so the view can be shared.
    pub fn share_query(&self) -> String {
        self.state().query.to_query_string()
    }

    /// Retrieves metrics for the current query.
    pub async fn retrieve(&self) -> Result<RequestOutcome<MetricsView>> {
        let (generation, query) = {
            let mut state = self.state();
            state.view = Retrieval::Loading;
            (self.generation.issue(), state.query.clone())
        };

        let response = self.service.phase_metrics(&query).await;

        let mut state = self.state();
        if !self.generation.is_current(generation) {
            log_fetch_superseded("metrics.superseded", generation, self.generation.latest());
            return Ok(RequestOutcome::Superseded);
        }
        match response {
            Ok(payload) => {
                let (series, colors) = aggregate_fresh(&payload, self.color_seed);
                let view = MetricsView {
                    payload,
                    series,
                    colors,
                };
                state.view = Retrieval::Ready(view.clone());
                Ok(RequestOutcome::Applied(view))
            }
            Err(err) => {
                log_fetch_failed("metrics.failed", generation, &err);
                state.view = Retrieval::Unavailable(format!("{:#}", err));
                Err(err)
            }
        }
    }
}
