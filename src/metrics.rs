//! Metrics payload schema and aggregation into chart-ready series.
//!
//! The payload nests periods -> phases -> executions -> platforms. Every
//! level may carry `pass`/`fail`/`skipped`/`error` counters; every field is
//! optional and missing values count as zero. The payload is validated once,
//! in [`MetricsPayload::from_value`]; a payload with the wrong shape becomes
//! an empty one instead of an error, because "no data in range" is a normal
//! state for a team.
//!
//! Status totals are taken from the finest level that carries counters so a
//! phase summary and its executions are never counted twice.

use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::colors::{PlatformColorAssigner, PlatformColorTable, Rgb};
use crate::duration::format_duration;
use crate::logging::{log_aggregated, log_payload_degraded};

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// =============================================================================
// Payload schema
// =============================================================================

/// Raw status counters as they appear on any level of the payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counters {
    #[serde(default, alias = "PASS", skip_serializing_if = "Option::is_none")]
    pub pass: Option<u64>,
    #[serde(default, alias = "FAIL", skip_serializing_if = "Option::is_none")]
    pub fail: Option<u64>,
    #[serde(default, alias = "SKIPPED", skip_serializing_if = "Option::is_none")]
    pub skipped: Option<u64>,
    #[serde(default, alias = "ERROR", skip_serializing_if = "Option::is_none")]
    pub error: Option<u64>,
}

impl Counters {
    pub fn is_present(&self) -> bool {
        self.pass.is_some() || self.fail.is_some() || self.skipped.is_some() || self.error.is_some()
    }

    fn present_totals(&self) -> Option<StatusTotals> {
        self.is_present().then(|| StatusTotals {
            pass: self.pass.unwrap_or(0),
            fail: self.fail.unwrap_or(0),
            skipped: self.skipped.unwrap_or(0),
            error: self.error.unwrap_or(0),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Platform {
    #[serde(default, deserialize_with = "null_as_default")]
    pub platform_name: String,
    #[serde(default)]
    pub platform_version: Option<String>,
    #[serde(default)]
    pub browser_name: Option<String>,
    #[serde(default)]
    pub browser_version: Option<String>,
    #[serde(default)]
    pub device_name: Option<String>,
    /// Executions run on this platform; when absent the counters, or a single
    /// execution, stand in for it.
    #[serde(default)]
    pub count: Option<u64>,
    #[serde(flatten)]
    pub counters: Counters,
}

impl Platform {
    fn execution_count(&self) -> u64 {
        match (self.count, self.counters.present_totals()) {
            (Some(count), _) => count,
            (None, Some(totals)) => totals.total(),
            (None, None) => 1,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Execution {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, alias = "durationMs")]
    pub duration: Option<u64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub platforms: Vec<Platform>,
    #[serde(flatten)]
    pub counters: Counters,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Phase {
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, alias = "durationMs")]
    pub duration: Option<u64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub executions: Vec<Execution>,
    #[serde(flatten)]
    pub counters: Counters,
}

impl Phase {
    /// Explicit phase duration, or the sum of its executions.
    pub fn duration_ms(&self) -> u64 {
        self.duration.unwrap_or_else(|| {
            self.executions
                .iter()
                .filter_map(|e| e.duration)
                .fold(0u64, u64::saturating_add)
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Period {
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub phases: Vec<Phase>,
    #[serde(flatten)]
    pub counters: Counters,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsPayload {
    #[serde(default, deserialize_with = "null_as_default")]
    pub periods: Vec<Period>,
    #[serde(default)]
    pub total_test_runs: Option<u64>,
    #[serde(default)]
    pub total_executions: Option<u64>,
    #[serde(default)]
    pub total_time_ms: Option<u64>,
    #[serde(flatten)]
    pub counters: Counters,
}

impl MetricsPayload {
    /// Validates a raw payload. Anything that is not a metrics object becomes
    /// an empty payload.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Null => Self::default(),
            Value::Object(_) => serde_json::from_value(value).unwrap_or_else(|err| {
                log_payload_degraded(&format!("unexpected metrics shape: {}", err));
                Self::default()
            }),
            other => {
                log_payload_degraded(&format!("metrics payload is not an object: {}", type_name(&other)));
                Self::default()
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.periods.is_empty()
            && !self.counters.is_present()
            && self.total_test_runs.is_none()
            && self.total_executions.is_none()
            && self.total_time_ms.is_none()
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// =============================================================================
// Aggregate series
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusTotals {
    pub pass: u64,
    pub fail: u64,
    pub skipped: u64,
    pub error: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SeriesPoint {
    pub label: &'static str,
    pub value: u64,
}

impl StatusTotals {
    pub fn total(&self) -> u64 {
        self.pass
            .saturating_add(self.fail)
            .saturating_add(self.skipped)
            .saturating_add(self.error)
    }

    /// Counters come straight from the service; sums saturate at `u64::MAX`.
    pub fn add(&mut self, other: StatusTotals) {
        self.pass = self.pass.saturating_add(other.pass);
        self.fail = self.fail.saturating_add(other.fail);
        self.skipped = self.skipped.saturating_add(other.skipped);
        self.error = self.error.saturating_add(other.error);
    }

    /// Pie series in the order the status palette expects.
    pub fn pie_series(&self) -> [SeriesPoint; 4] {
        [
            SeriesPoint { label: "Pass", value: self.pass },
            SeriesPoint { label: "Skipped", value: self.skipped },
            SeriesPoint { label: "Error", value: self.error },
            SeriesPoint { label: "Fail", value: self.fail },
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PeriodTotals {
    pub start: Option<String>,
    pub end: Option<String>,
    pub totals: StatusTotals,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhaseDuration {
    /// Position of the owning period in the payload.
    pub period: usize,
    pub phase: String,
    pub duration_ms: u64,
    pub duration: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlatformShare {
    pub platform_name: String,
    pub executions: u64,
    pub totals: StatusTotals,
    pub color: Rgb,
}

/// Read-only projection of one metrics payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AggregateSeries {
    totals: StatusTotals,
    periods: Vec<PeriodTotals>,
    durations: Vec<PhaseDuration>,
    platforms: Vec<PlatformShare>,
}

impl AggregateSeries {
    pub fn totals(&self) -> StatusTotals {
        self.totals
    }

    pub fn periods(&self) -> &[PeriodTotals] {
        &self.periods
    }

    pub fn durations(&self) -> &[PhaseDuration] {
        &self.durations
    }

    pub fn platforms(&self) -> &[PlatformShare] {
        &self.platforms
    }

    pub fn is_empty(&self) -> bool {
        self.totals.total() == 0
            && self.periods.is_empty()
            && self.durations.is_empty()
            && self.platforms.is_empty()
    }
}

/// Top-of-dashboard panel values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryPanel {
    pub total_test_runs: u64,
    pub total_executions: u64,
    pub total_time_ms: u64,
    pub total_time: String,
}

impl SummaryPanel {
    pub fn from_payload(payload: &MetricsPayload) -> Self {
        let total_time_ms = payload.total_time_ms.unwrap_or(0);
        Self {
            total_test_runs: payload.total_test_runs.unwrap_or(0),
            total_executions: payload.total_executions.unwrap_or(0),
            total_time_ms,
            total_time: format_duration(total_time_ms),
        }
    }
}

// =============================================================================
// Aggregation
// =============================================================================

#[derive(Default)]
struct PlatformAccumulator {
    order: Vec<String>,
    index: HashMap<String, usize>,
    counts: Vec<(u64, StatusTotals)>,
}

impl PlatformAccumulator {
    fn record(&mut self, platform: &Platform) {
        let slot = match self.index.get(&platform.platform_name) {
            Some(&slot) => slot,
            None => {
                self.order.push(platform.platform_name.clone());
                self.counts.push((0, StatusTotals::default()));
                self.index
                    .insert(platform.platform_name.clone(), self.order.len() - 1);
                self.order.len() - 1
            }
        };
        let (executions, totals) = &mut self.counts[slot];
        *executions = executions.saturating_add(platform.execution_count());
        if let Some(t) = platform.counters.present_totals() {
            totals.add(t);
        }
    }
}

fn sum_present(items: impl Iterator<Item = Option<StatusTotals>>) -> Option<StatusTotals> {
    items.flatten().fold(None, |acc, t| {
        let mut acc = acc.unwrap_or_default();
        acc.add(t);
        Some(acc)
    })
}

fn phase_totals(phase: &Phase) -> Option<StatusTotals> {
    sum_present(phase.executions.iter().map(|e| e.counters.present_totals()))
        .or_else(|| phase.counters.present_totals())
}

fn period_totals(period: &Period) -> Option<StatusTotals> {
    sum_present(period.phases.iter().map(phase_totals)).or_else(|| period.counters.present_totals())
}

/// Walks the payload in period -> phase -> execution -> platform order.
///
/// Each platform not yet in `colors` is assigned exactly once, in traversal
/// order, so the first platform seen gets the first generated color.
pub fn aggregate<R: Rng>(
    payload: &MetricsPayload,
    colors: &mut PlatformColorAssigner<R>,
) -> AggregateSeries {
    let mut periods = Vec::with_capacity(payload.periods.len());
    let mut durations = Vec::new();
    let mut platforms = PlatformAccumulator::default();

    for (period_idx, period) in payload.periods.iter().enumerate() {
        for phase in &period.phases {
            for execution in &phase.executions {
                for platform in &execution.platforms {
                    if platform.platform_name.is_empty() {
                        continue;
                    }
                    if !colors.contains(&platform.platform_name) {
                        colors.assign(&platform.platform_name);
                    }
                    platforms.record(platform);
                }
            }
            let duration_ms = phase.duration_ms();
            durations.push(PhaseDuration {
                period: period_idx,
                phase: phase.name.clone(),
                duration_ms,
                duration: format_duration(duration_ms),
            });
        }
        periods.push(PeriodTotals {
            start: period.start.clone(),
            end: period.end.clone(),
            totals: period_totals(period).unwrap_or_default(),
        });
    }

    let totals = sum_present(payload.periods.iter().map(period_totals))
        .or_else(|| payload.counters.present_totals())
        .unwrap_or_default();

    let platforms: Vec<PlatformShare> = platforms
        .order
        .into_iter()
        .zip(platforms.counts)
        .map(|(platform_name, (executions, totals))| PlatformShare {
            color: colors.assign(&platform_name),
            platform_name,
            executions,
            totals,
        })
        .collect();

    log_aggregated(periods.len(), durations.len(), platforms.len());

    AggregateSeries {
        totals,
        periods,
        durations,
        platforms,
    }
}

/// Aggregates with a fresh color table, as done for every metrics retrieval.
pub fn aggregate_fresh(payload: &MetricsPayload, color_seed: Option<u64>) -> (AggregateSeries, PlatformColorTable) {
    let mut colors = PlatformColorAssigner::from_seed_option(color_seed);
    let series = aggregate(payload, &mut colors);
    (series, colors.into_table())
}
