use anyhow::{anyhow, Result};
use chrono::{Duration, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::logging::{log, obj, v_str, Domain, Level};

/// Longest trailing window accepted from the environment.
pub const MAX_WINDOW_DAYS: i64 = 36_500;

/// Page sizes offered to users.
pub const LIMIT_OPTIONS: [u64; 4] = [10, 15, 25, 50];

#[derive(Clone, Debug)]
pub struct Config {
    pub api_base: String,
    pub api_token: Option<String>,
    pub page_limit: u64,
    pub build_window_days: i64,
    pub metrics_window_days: i64,
    pub request_timeout_ms: u64,
    /// Makes platform colors reproducible across runs when set.
    pub color_seed: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base: "http://localhost:3000/rest/api/v1.0".to_string(),
            api_token: None,
            page_limit: 15,
            build_window_days: 90,
            metrics_window_days: 30,
            request_timeout_ms: 10_000,
            color_seed: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            api_base: std::env::var("BUILDBOARD_API_BASE").unwrap_or(d.api_base),
            api_token: std::env::var("BUILDBOARD_API_TOKEN").ok(),
            page_limit: std::env::var("PAGE_LIMIT").ok().and_then(|v| v.parse().ok()).filter(|v| *v > 0).unwrap_or(d.page_limit),
            build_window_days: window_days(std::env::var("BUILD_WINDOW_DAYS").ok(), d.build_window_days),
            metrics_window_days: window_days(std::env::var("METRICS_WINDOW_DAYS").ok(), d.metrics_window_days),
            request_timeout_ms: std::env::var("REQUEST_TIMEOUT_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(d.request_timeout_ms),
            color_seed: std::env::var("COLOR_SEED").ok().and_then(|v| v.parse().ok()),
        }
    }
}

/// Window size from an env value; unparseable or out-of-range values give `default`.
fn window_days(raw: Option<String>, default: i64) -> i64 {
    raw.and_then(|v| v.trim().parse().ok())
        .filter(|days| (0..=MAX_WINDOW_DAYS).contains(days))
        .unwrap_or(default)
}

pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

// =============================================================================
// Date range
// =============================================================================

/// Inclusive calendar date range; the service applies inclusivity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Orders the bounds so `start <= end`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        if start <= end {
            Self { start, end }
        } else {
            Self { start: end, end: start }
        }
    }

    /// `days` days before `today` through `today`. Windows reaching past the
    /// earliest representable date start there.
    pub fn last_days(days: i64, today: NaiveDate) -> Self {
        let start = Duration::try_days(days.max(0))
            .and_then(|window| today.checked_sub_signed(window))
            .unwrap_or(NaiveDate::MIN);
        Self::new(start, today)
    }

    /// Query-supplied bounds with a trailing window as fallback for each missing side.
    pub fn from_query(start: Option<NaiveDate>, end: Option<NaiveDate>, default_days: i64, today: NaiveDate) -> Self {
        let fallback = Self::last_days(default_days, today);
        Self::new(start.unwrap_or(fallback.start), end.unwrap_or(fallback.end))
    }
}

// =============================================================================
// Grouping
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Grouping {
    Day,
    #[default]
    Week,
    Fortnight,
    Month,
    Year,
}

impl Grouping {
    pub fn as_str(&self) -> &'static str {
        match self {
            Grouping::Day => "day",
            Grouping::Week => "week",
            Grouping::Fortnight => "fortnight",
            Grouping::Month => "month",
            Grouping::Year => "year",
        }
    }
}

impl fmt::Display for Grouping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Grouping {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "day" => Ok(Grouping::Day),
            "week" => Ok(Grouping::Week),
            "fortnight" => Ok(Grouping::Fortnight),
            "month" => Ok(Grouping::Month),
            "year" => Ok(Grouping::Year),
            other => Err(anyhow!("unknown grouping '{}'", other)),
        }
    }
}

// =============================================================================
// Query parameters
// =============================================================================

/// Parameters read once from the hosting page's query string.
///
/// Unparseable values are dropped with a warning and fall back to defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub component: Option<String>,
    pub grouping: Option<Grouping>,
    pub team_id: Option<String>,
}

impl QueryParams {
    /// Parses `a=b&c=d`, with or without a leading `?`.
    pub fn parse(query: &str) -> Self {
        let query = query.strip_prefix('?').unwrap_or(query);
        let mut params = Self::default();
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            match key.as_ref() {
                "startDate" => params.start_date = parse_date(&key, value),
                "endDate" => params.end_date = parse_date(&key, value),
                "component" => params.component = Some(value.to_string()),
                "teamId" => params.team_id = Some(value.to_string()),
                "grouping" => match value.parse() {
                    Ok(g) => params.grouping = Some(g),
                    Err(err) => warn_param(&key, &format!("{}", err)),
                },
                _ => {}
            }
        }
        params
    }

    /// Range for build views: trailing window of `cfg.build_window_days`.
    pub fn build_range(&self, cfg: &Config, today: NaiveDate) -> DateRange {
        DateRange::from_query(self.start_date, self.end_date, cfg.build_window_days, today)
    }

    /// Range for metrics views: trailing window of `cfg.metrics_window_days`.
    pub fn metrics_range(&self, cfg: &Config, today: NaiveDate) -> DateRange {
        DateRange::from_query(self.start_date, self.end_date, cfg.metrics_window_days, today)
    }
}

fn parse_date(key: &str, value: &str) -> Option<NaiveDate> {
    // Accept full timestamps by keeping the calendar date part.
    let date_part = value.get(..10).unwrap_or(value);
    match NaiveDate::parse_from_str(date_part, "%Y-%m-%d") {
        Ok(date) => Some(date),
        Err(err) => {
            warn_param(key, &format!("invalid date '{}': {}", value, err));
            None
        }
    }
}

fn warn_param(key: &str, msg: &str) {
    log(
        Level::Warn,
        Domain::Context,
        "query.ignored",
        obj(&[("param", v_str(key)), ("msg", v_str(msg))]),
    );
}
