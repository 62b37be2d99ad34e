//! Metrics payload through aggregation and the metrics view controller.

mod common;

use std::sync::Arc;

use buildboard::colors::PlatformColorAssigner;
use buildboard::config::Grouping;
use buildboard::metrics::{aggregate, aggregate_fresh, MetricsPayload, StatusTotals};
use buildboard::metrics_view::MetricsViewController;
use buildboard::page::{BuildPageController, PageFilterState};
use buildboard::request::Retrieval;
use buildboard::service::MetricsQuery;
use common::{cfg, range, MockBuilds, MockKeeper, MockMetrics};
use serde_json::json;

fn two_platform_payload() -> MetricsPayload {
    MetricsPayload::from_value(json!({
        "totalTestRuns": 12,
        "totalExecutions": 2,
        "totalTimeMs": 3_725_000,
        "periods": [{
            "start": "2024-01-01",
            "end": "2024-01-07",
            "phases": [{
                "name": "e2e",
                "pass": 100, "fail": 100,
                "executions": [
                    {
                        "name": "login",
                        "duration": 65_000,
                        "pass": 4, "fail": 1,
                        "platforms": [{ "platformName": "Windows", "count": 1, "pass": 4, "fail": 1 }]
                    },
                    {
                        "name": "checkout",
                        "durationMs": 5_000,
                        "pass": 6, "skipped": 1, "error": 0,
                        "platforms": [{ "platformName": "Linux", "count": 1, "pass": 6, "skipped": 1 }]
                    }
                ]
            }]
        }]
    }))
}

fn linux_only_payload() -> MetricsPayload {
    MetricsPayload::from_value(json!({
        "periods": [{
            "phases": [{
                "name": "unit",
                "executions": [{ "platforms": [{ "platformName": "Linux" }] }]
            }]
        }]
    }))
}

fn query() -> MetricsQuery {
    MetricsQuery {
        team_id: "t1".to_string(),
        component: None,
        range: range(),
        grouping: Grouping::Week,
    }
}

#[test]
fn two_executions_two_platforms() {
    let payload = two_platform_payload();
    let mut colors = PlatformColorAssigner::seeded(5);
    let series = aggregate(&payload, &mut colors);

    let names: Vec<&str> = series
        .platforms()
        .iter()
        .map(|p| p.platform_name.as_str())
        .collect();
    assert_eq!(names, ["Windows", "Linux"]);

    let table = colors.table();
    assert_eq!(table.len(), 2);
    assert_eq!(table.colors()[0], table.get("Windows").unwrap());
    assert_eq!(table.colors()[1], table.get("Linux").unwrap());
    assert_eq!(series.platforms()[0].color, table.colors()[0]);

    // Execution counters win over the phase summary.
    assert_eq!(
        series.totals(),
        StatusTotals { pass: 10, fail: 1, skipped: 1, error: 0 }
    );
    assert_eq!(series.periods()[0].totals, series.totals());
    assert_eq!(series.periods()[0].start.as_deref(), Some("2024-01-01"));

    assert_eq!(series.durations().len(), 1);
    assert_eq!(series.durations()[0].duration_ms, 70_000);
    assert_eq!(series.durations()[0].duration, "1m 10s");
}

#[test]
fn same_seed_same_colors() {
    let payload = two_platform_payload();
    let (_, a) = aggregate_fresh(&payload, Some(99));
    let (_, b) = aggregate_fresh(&payload, Some(99));
    assert_eq!(a, b);
    for color in a.colors() {
        for channel in [color.r, color.g, color.b] {
            assert!((64..=191).contains(&channel));
        }
    }
}

#[tokio::test]
async fn metrics_view_failure_then_recovery() {
    let service = Arc::new(MockMetrics::new(None));
    let ctrl = MetricsViewController::new(service.clone(), query(), &cfg());
    assert!(ctrl.view().is_loading());

    assert!(ctrl.retrieve().await.is_err());
    assert!(ctrl.view().is_unavailable());

    *service.payload.lock().unwrap() = Some(two_platform_payload());
    let view = ctrl.retrieve().await.unwrap().applied().unwrap();
    assert_eq!(view.series.platforms().len(), 2);
    assert!(matches!(ctrl.view(), Retrieval::Ready(_)));
}

#[tokio::test]
async fn each_retrieval_starts_a_fresh_color_table() {
    let service = Arc::new(MockMetrics::new(Some(two_platform_payload())));
    let ctrl = MetricsViewController::new(service.clone(), query(), &cfg());
    let first = ctrl.retrieve().await.unwrap().applied().unwrap();
    assert_eq!(first.colors.len(), 2);

    *service.payload.lock().unwrap() = Some(linux_only_payload());
    let second = ctrl.retrieve().await.unwrap().applied().unwrap();
    assert_eq!(second.colors.len(), 1);
    assert!(!second.colors.contains("Windows"));
    // Platform without counters still counts one execution.
    assert_eq!(second.series.platforms()[0].executions, 1);
}

#[tokio::test]
async fn query_changes_reach_the_service() {
    let service = Arc::new(MockMetrics::new(Some(MetricsPayload::default())));
    let ctrl = MetricsViewController::new(service.clone(), query(), &cfg());

    ctrl.update_query(|q| q.with_component(Some("c9")).with_grouping(Grouping::Month));
    ctrl.retrieve().await.unwrap();
    ctrl.update_query(|q| q.with_team("t2"));
    ctrl.retrieve().await.unwrap();

    let seen = service.queries.lock().unwrap().clone();
    assert_eq!(seen[0].component.as_deref(), Some("c9"));
    assert_eq!(seen[0].grouping, Grouping::Month);
    assert_eq!(seen[1].team_id, "t2");
    assert_eq!(seen[1].component, None);
    assert!(ctrl.share_query().contains("component=any"));

    let view = ctrl.view();
    assert!(view.ready().unwrap().series.is_empty());
}

#[tokio::test]
async fn build_page_carries_summary_and_series() {
    let mut builds = MockBuilds::new(2);
    builds.metrics = two_platform_payload();
    let ctrl = BuildPageController::new(Arc::new(builds), Arc::new(MockKeeper::default()), &cfg());
    ctrl.fetch_page(PageFilterState::new("t1", range(), 10))
        .await
        .unwrap();

    let view = ctrl.view();
    let snapshot = view.ready().unwrap();
    assert_eq!(snapshot.summary.total_test_runs, 12);
    assert_eq!(snapshot.summary.total_time, "1h 2m 5s");
    assert_eq!(snapshot.series.platforms().len(), 2);
    assert_eq!(snapshot.colors.len(), 2);
}
