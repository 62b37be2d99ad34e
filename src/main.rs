//! Dashboard snapshot tool.
//!
//! Reads the same query parameters as the dashboard (`teamId`, `startDate`,
//! `endDate`, `component`, `grouping`), fetches the first build page and the
//! phase metrics, and prints both views as one JSON document.
//!
//! Usage: `buildboard "teamId=abc&grouping=week"`

use anyhow::{anyhow, Result};
use serde_json::json;
use std::sync::Arc;

use buildboard::client::HttpClient;
use buildboard::config::{today, Config, QueryParams};
use buildboard::logging::{log, obj, v_str, Domain, Level};
use buildboard::metrics_view::MetricsViewController;
use buildboard::page::{BuildPageController, PageFilterState};
use buildboard::service::MetricsQuery;

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = Config::from_env();
    let raw_query = std::env::args().nth(1).unwrap_or_default();
    let params = QueryParams::parse(&raw_query);
    let team_id = params
        .team_id
        .clone()
        .ok_or_else(|| anyhow!("teamId is required, e.g. buildboard \"teamId=<id>\""))?;

    log(
        Level::Info,
        Domain::System,
        "startup",
        obj(&[
            ("team_id", v_str(&team_id)),
            ("api_base", v_str(&cfg.api_base)),
        ]),
    );

    let client = Arc::new(HttpClient::new(&cfg)?);
    let day = today();

    let pages = BuildPageController::new(client.clone(), client.clone(), &cfg);
    let mut filters = PageFilterState::new(&team_id, params.build_range(&cfg, day), cfg.page_limit);
    if let Some(component) = params.component.clone().filter(|c| c != "any") {
        filters.component_ids.push(component);
    }
    if let Err(err) = pages.fetch_page(filters).await {
        log(
            Level::Error,
            Domain::Fetch,
            "snapshot.builds_unavailable",
            obj(&[("msg", v_str(&format!("{:#}", err)))]),
        );
    }

    let metrics = MetricsViewController::new(
        client,
        MetricsQuery::from_params(&params, &team_id, &cfg, day),
        &cfg,
    );
    if let Err(err) = metrics.retrieve().await {
        log(
            Level::Error,
            Domain::Fetch,
            "snapshot.metrics_unavailable",
            obj(&[("msg", v_str(&format!("{:#}", err)))]),
        );
    }

    let doc = json!({
        "builds": pages.view(),
        "metrics": metrics.view(),
        "share": metrics.share_query(),
    });
    println!("{}", serde_json::to_string_pretty(&doc)?);
    Ok(())
}
