use anyhow::{anyhow, Context, Result};
use reqwest::{Client, RequestBuilder, Response};
use serde_json::{json, Value};
use std::time::Duration;
use url::Url;

use crate::config::Config;
use crate::metrics::MetricsPayload;
use crate::models::BuildPage;
use crate::service::{BuildQuery, BuildRetrieval, KeepFlagUpdater, MetricsQuery, MetricsRetrieval};

/// REST client for the reporting API.
pub struct HttpClient {
    client: Client,
    base: String,
    api_token: Option<String>,
}

impl HttpClient {
    pub fn new(cfg: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(cfg.request_timeout_ms))
            .build()?;
        Ok(Self {
            client,
            base: cfg.api_base.trim_end_matches('/').to_string(),
            api_token: cfg.api_token.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base, path.trim_start_matches('/'))
    }

    /// `<base>/build/<id>/keep` with the id encoded as a single path segment.
    fn keep_url(&self, build_id: &str) -> Result<Url> {
        let mut url = Url::parse(&self.base).with_context(|| format!("invalid api base '{}'", self.base))?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("api base '{}' cannot carry a path", self.base))?
            .pop_if_empty()
            .extend(["build", build_id, "keep"]);
        Ok(url)
    }

    fn authorized(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.api_token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn send(&self, req: RequestBuilder, what: &str) -> Result<Response> {
        let resp = self
            .authorized(req)
            .send()
            .await
            .with_context(|| format!("{} request failed", what))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(anyhow!("{} returned {}: {}", what, status, body));
        }
        Ok(resp)
    }
}

fn date_param(date: chrono::NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

#[async_trait::async_trait]
impl BuildRetrieval for HttpClient {
    async fn builds_with_date_filters(&self, query: &BuildQuery) -> Result<BuildPage> {
        let mut params = vec![
            ("teamId", query.team_id.clone()),
            ("skip", query.skip.to_string()),
            ("limit", query.limit.to_string()),
            ("fromDate", date_param(query.range.start)),
            ("toDate", date_param(query.range.end)),
        ];
        if !query.environment_ids.is_empty() {
            params.push(("environmentIds", query.environment_ids.join(",")));
        }
        if !query.component_ids.is_empty() {
            params.push(("componentIds", query.component_ids.join(",")));
        }
        let req = self.client.get(self.url("build")).query(&params);
        let resp = self.send(req, "build retrieval").await?;
        let page: BuildPage = resp.json().await.context("decoding build page")?;
        Ok(page)
    }
}

#[async_trait::async_trait]
impl KeepFlagUpdater for HttpClient {
    async fn set_keep(&self, build_id: &str, keep: bool) -> Result<()> {
        let req = self
            .client
            .put(self.keep_url(build_id)?)
            .json(&json!({ "keep": keep }));
        self.send(req, "keep update").await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl MetricsRetrieval for HttpClient {
    async fn phase_metrics(&self, query: &MetricsQuery) -> Result<MetricsPayload> {
        let mut params = vec![
            ("teamId", query.team_id.clone()),
            ("fromDate", date_param(query.range.start)),
            ("toDate", date_param(query.range.end)),
            ("groupingPeriod", query.grouping.as_str().to_string()),
        ];
        if let Some(component) = &query.component {
            params.push(("componentId", component.clone()));
        }
        let req = self.client.get(self.url("metrics/phase")).query(&params);
        let resp = self.send(req, "phase metrics").await?;
        let raw: Value = resp.json().await.context("decoding phase metrics")?;
        Ok(MetricsPayload::from_value(raw))
    }
}
