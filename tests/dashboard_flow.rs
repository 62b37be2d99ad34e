//! Build page controller end to end against in-memory services.

mod common;

use std::sync::Arc;

use buildboard::context::DashboardContext;
use buildboard::models::{Component, Environment, Team};
use buildboard::page::{BuildPageController, PageFilterState};
use buildboard::request::{RequestOutcome, Retrieval};
use common::{cfg, range, MockBuilds, MockKeeper};

fn controller(builds: Arc<MockBuilds>, keeper: Arc<MockKeeper>) -> BuildPageController {
    BuildPageController::new(builds, keeper, &cfg())
}

fn first_page(team: &str, limit: u64) -> PageFilterState {
    PageFilterState::new(team, range(), limit)
}

#[tokio::test]
async fn fetch_assigns_indexes_from_skip() {
    let builds = Arc::new(MockBuilds::new(23));
    let ctrl = controller(builds.clone(), Arc::new(MockKeeper::default()));

    let page = ctrl
        .fetch_page(first_page("t1", 10).with_skip(10))
        .await
        .unwrap()
        .applied()
        .unwrap();

    assert_eq!(page.total, 23);
    let indexes: Vec<u64> = page.builds.iter().map(|b| b.index).collect();
    assert_eq!(indexes, (11..=20).collect::<Vec<u64>>());
    assert_eq!(builds.queries()[0].skip, 10);
}

#[tokio::test]
async fn pagination_walks_and_clamps() {
    let ctrl = controller(Arc::new(MockBuilds::new(23)), Arc::new(MockKeeper::default()));
    ctrl.fetch_page(first_page("t1", 10)).await.unwrap();
    assert!(!ctrl.has_previous());
    assert!(ctrl.has_next());

    ctrl.next_page().await.unwrap();
    ctrl.next_page().await.unwrap();
    assert_eq!(ctrl.current_filters().unwrap().skip, 20);
    assert!(!ctrl.has_next());
    assert!(ctrl.has_previous());

    // Guard bypassed: stays on the last page.
    ctrl.next_page().await.unwrap();
    assert_eq!(ctrl.current_filters().unwrap().skip, 20);
    let snapshot = ctrl.view();
    assert_eq!(snapshot.ready().unwrap().builds.len(), 3);

    for _ in 0..4 {
        ctrl.previous_page().await.unwrap();
    }
    assert_eq!(ctrl.current_filters().unwrap().skip, 0);
    assert!(!ctrl.has_previous());
}

#[tokio::test]
async fn go_to_page_and_limit_change() {
    let builds = Arc::new(MockBuilds::new(60));
    let ctrl = controller(builds.clone(), Arc::new(MockKeeper::default()));
    ctrl.fetch_page(first_page("t1", 15)).await.unwrap();

    ctrl.go_to_page(3).await.unwrap();
    assert_eq!(ctrl.current_filters().unwrap().skip, 30);

    ctrl.go_to_page(99).await.unwrap();
    assert_eq!(ctrl.current_filters().unwrap().skip, 45);

    ctrl.set_limit(25).await.unwrap();
    let filters = ctrl.current_filters().unwrap();
    assert_eq!((filters.skip, filters.limit), (0, 25));

    assert!(ctrl.set_limit(0).await.unwrap().is_none());
    assert_eq!(ctrl.current_filters().unwrap().limit, 25);
}

#[tokio::test]
async fn selection_survives_paging() {
    let ctrl = controller(Arc::new(MockBuilds::new(30)), Arc::new(MockKeeper::default()));
    ctrl.fetch_page(first_page("t1", 10)).await.unwrap();
    ctrl.toggle_selected("t1-b0");
    ctrl.next_page().await.unwrap();
    ctrl.toggle_selected("t1-b10");

    assert_eq!(ctrl.selection().selected_ids(), ["t1-b0", "t1-b10"]);
    assert_eq!(ctrl.compare_candidates().unwrap().len(), 2);
    ctrl.toggle_selected("t1-b10");
    assert!(ctrl.compare_candidates().is_none());
}

#[tokio::test]
async fn keep_toggle_flips_selected_and_clears_even_on_failure() {
    let keeper = Arc::new(MockKeeper::failing(&["t1-b1"]));
    let ctrl = controller(Arc::new(MockBuilds::new(3)), keeper.clone());
    ctrl.fetch_page(first_page("t1", 10)).await.unwrap();

    // A: true, B: true, C: false
    ctrl.toggle_selected("t1-b0");
    ctrl.toggle_selected("t1-b1");
    ctrl.toggle_selected("t1-b2");
    ctrl.toggle_selected("t1-b2");

    let outcome = ctrl.toggle_keep_for_selected().await;

    let mut calls = keeper.calls();
    calls.sort();
    assert_eq!(calls, vec![("t1-b0".to_string(), true), ("t1-b1".to_string(), true)]);
    assert_eq!(outcome.updated, ["t1-b0"]);
    assert_eq!(outcome.failed.len(), 1);
    assert_eq!(outcome.failed[0].0, "t1-b1");
    assert!(outcome.is_partial_failure());

    let view = ctrl.view();
    let builds = &view.ready().unwrap().builds;
    // Optimistic flags stand, including the rejected one.
    assert!(builds[0].keep);
    assert!(builds[1].keep);
    assert!(!builds[2].keep);
    assert_eq!(ctrl.selection().count(), 0);
}

#[tokio::test]
async fn keep_toggle_with_nothing_selected_sends_nothing() {
    let keeper = Arc::new(MockKeeper::default());
    let ctrl = controller(Arc::new(MockBuilds::new(3)), keeper.clone());
    ctrl.fetch_page(first_page("t1", 10)).await.unwrap();

    let outcome = ctrl.toggle_keep_for_selected().await;
    assert_eq!(outcome.dispatched(), 0);
    assert!(keeper.calls().is_empty());
}

#[tokio::test]
async fn failure_is_unavailable_not_loading() {
    let builds = Arc::new(MockBuilds::new(5));
    let ctrl = controller(builds.clone(), Arc::new(MockKeeper::default()));
    assert!(ctrl.view().is_loading());

    builds.set_failing(true);
    assert!(ctrl.fetch_page(first_page("t1", 10)).await.is_err());
    match ctrl.view() {
        Retrieval::Unavailable(reason) => assert!(reason.contains("service unavailable")),
        other => panic!("expected unavailable, got {:?}", other),
    }

    builds.set_failing(false);
    ctrl.refresh().await.unwrap();
    assert_eq!(ctrl.view().ready().unwrap().total, 5);
}

#[tokio::test]
async fn slow_earlier_response_is_discarded() {
    let mut mock = MockBuilds::new(5);
    mock.slow_team = Some("slow".to_string());
    let builds = Arc::new(mock);
    let ctrl = controller(builds.clone(), Arc::new(MockKeeper::default()));

    let (slow, fast) = tokio::join!(ctrl.fetch_page(first_page("slow", 10)), async {
        let fast = ctrl.fetch_page(first_page("fast", 10)).await;
        builds.gate.notify_one();
        fast
    });

    assert!(slow.unwrap().is_superseded());
    assert!(matches!(fast.unwrap(), RequestOutcome::Applied(_)));
    let view = ctrl.view();
    assert_eq!(view.ready().unwrap().builds[0].id, "fast-b0");
    assert_eq!(ctrl.current_filters().unwrap().team_id, "fast");
}

#[tokio::test]
async fn context_filters_reach_the_query() {
    let builds = Arc::new(MockBuilds::new(5));
    let ctrl = controller(builds.clone(), Arc::new(MockKeeper::default()));

    let team = Team {
        id: "t1".into(),
        name: "Alpha".into(),
        components: vec![Component { id: "c1".into(), name: "api".into() }],
    };
    let envs = vec![Environment { id: "e1".into(), name: "qa".into() }];
    let ctx = DashboardContext::new(vec![team], envs, range());

    assert!(ctrl.apply_context(&ctx).await.unwrap().is_none());

    let ctx = ctx.with_team("t1").with_filter_values(vec!["e1".into(), "c1".into()]);
    ctrl.apply_context(&ctx).await.unwrap();

    let q = builds.queries().pop().unwrap();
    assert_eq!(q.team_id, "t1");
    assert_eq!(q.environment_ids, ["e1"]);
    assert_eq!(q.component_ids, ["c1"]);
    assert_eq!(q.limit, cfg().page_limit);
    assert_eq!(q.range, range());
}
