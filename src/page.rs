//! Build page controller: filtered, paginated retrieval for one team,
//! selection, and the optimistic keep-flag workflow.
//!
//! Controller state sits behind a `std::sync::Mutex` that is never held across
//! an `.await`, so overlapping requests are possible. Each request is tagged
//! with a generation and only the latest one is applied.

use anyhow::Result;
use futures_util::future::join_all;
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::colors::PlatformColorTable;
use crate::config::{Config, DateRange};
use crate::context::DashboardContext;
use crate::logging::{
    log_fetch_applied, log_fetch_failed, log_fetch_issued, log_fetch_superseded, log_keep_failure,
    log_keep_settled, log_selection_cleared, log_selection_toggled,
};
use crate::metrics::{aggregate_fresh, AggregateSeries, MetricsPayload, SummaryPanel};
use crate::models::Build;
use crate::request::{RequestGeneration, RequestOutcome, Retrieval};
use crate::selection::BuildSelectionStore;
use crate::service::{BuildQuery, BuildRetrieval, KeepFlagUpdater};

// =============================================================================
// Filters and pagination
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageFilterState {
    pub team_id: String,
    pub environment_ids: Vec<String>,
    pub component_ids: Vec<String>,
    pub range: DateRange,
    pub skip: u64,
    pub limit: u64,
}

impl PageFilterState {
    pub fn new(team_id: impl Into<String>, range: DateRange, limit: u64) -> Self {
        Self {
            team_id: team_id.into(),
            environment_ids: Vec::new(),
            component_ids: Vec::new(),
            range,
            skip: 0,
            limit: limit.max(1),
        }
    }

    /// First page for the context's team, filters and range. `None` without a team.
    pub fn from_context(ctx: &DashboardContext, limit: u64) -> Option<Self> {
        let team_id = ctx.current_team_id()?;
        Some(Self {
            environment_ids: ctx.filters().environment_ids.clone(),
            component_ids: ctx.filters().component_ids.clone(),
            ..Self::new(team_id, ctx.range(), limit)
        })
    }

    pub fn query(&self) -> BuildQuery {
        BuildQuery {
            team_id: self.team_id.clone(),
            environment_ids: self.environment_ids.clone(),
            component_ids: self.component_ids.clone(),
            skip: self.skip,
            limit: self.limit,
            range: self.range,
        }
    }

    pub fn with_skip(&self, skip: u64) -> Self {
        Self { skip, ..self.clone() }
    }

    /// 1-based page number of the current skip.
    pub fn page(&self) -> u64 {
        self.skip / self.limit.max(1) + 1
    }
}

pub fn has_previous(skip: u64) -> bool {
    skip > 0
}

pub fn has_next(skip: u64, limit: u64, total: u64) -> bool {
    skip.saturating_add(limit) < total
}

/// Skip of the last page that still holds builds.
pub fn last_page_skip(limit: u64, total: u64) -> u64 {
    let limit = limit.max(1);
    if total == 0 {
        0
    } else {
        (total - 1) / limit * limit
    }
}

/// Clamps a requested skip against a confirmed total. An unknown total leaves it as is.
pub fn clamp_skip(skip: u64, limit: u64, total: Option<u64>) -> u64 {
    match total {
        Some(total) => skip.min(last_page_skip(limit, total)),
        None => skip,
    }
}

/// Sets `index` to the 1-based position within the result set.
pub fn assign_indexes(builds: &mut [Build], skip: u64) {
    for (offset, build) in builds.iter_mut().enumerate() {
        build.index = skip.saturating_add(offset as u64 + 1);
    }
}

// =============================================================================
// Keep-flag workflow
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeepUpdate {
    pub build_id: String,
    pub keep: bool,
}

/// Per-build result of a bulk keep toggle.
///
/// Failed builds keep their optimistic local flag; the caller is expected to
/// tell the user which builds may be out of sync.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct KeepOutcome {
    pub updated: Vec<String>,
    pub failed: Vec<(String, String)>,
}

impl KeepOutcome {
    pub fn dispatched(&self) -> usize {
        self.updated.len() + self.failed.len()
    }

    pub fn is_partial_failure(&self) -> bool {
        !self.failed.is_empty()
    }
}

/// Flips `keep` on every build whose id is selected and returns the updates
/// to send, in page order.
pub fn flip_selected(builds: &mut [Build], selected_ids: &[String]) -> Vec<KeepUpdate> {
    builds
        .iter_mut()
        .filter(|b| selected_ids.contains(&b.id))
        .map(|b| {
            b.keep = !b.keep;
            KeepUpdate {
                build_id: b.id.clone(),
                keep: b.keep,
            }
        })
        .collect()
}

/// Sends every update concurrently and waits until all have settled.
pub async fn dispatch_keep_updates(keeper: &dyn KeepFlagUpdater, updates: &[KeepUpdate]) -> KeepOutcome {
    let results = join_all(
        updates
            .iter()
            .map(|u| async move { (u, keeper.set_keep(&u.build_id, u.keep).await) }),
    )
    .await;

    let mut outcome = KeepOutcome::default();
    for (update, result) in results {
        match result {
            Ok(()) => outcome.updated.push(update.build_id.clone()),
            Err(err) => {
                log_keep_failure(&update.build_id, update.keep, &err);
                outcome
                    .failed
                    .push((update.build_id.clone(), format!("{:#}", err)));
            }
        }
    }
    log_keep_settled(outcome.dispatched(), outcome.failed.len());
    outcome
}

// =============================================================================
// Controller
// =============================================================================

/// Everything the dashboard renders for one applied page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageSnapshot {
    pub builds: Vec<Build>,
    pub total: u64,
    pub skip: u64,
    pub limit: u64,
    pub metrics: MetricsPayload,
    pub summary: SummaryPanel,
    pub series: AggregateSeries,
    pub colors: PlatformColorTable,
}

impl PageSnapshot {
    pub fn has_previous(&self) -> bool {
        has_previous(self.skip)
    }

    pub fn has_next(&self) -> bool {
        has_next(self.skip, self.limit, self.total)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PageResult {
    pub builds: Vec<Build>,
    pub total: u64,
}

struct PageState {
    filters: Option<PageFilterState>,
    view: Retrieval<PageSnapshot>,
    selection: BuildSelectionStore,
}

pub struct BuildPageController {
    retrieval: Arc<dyn BuildRetrieval>,
    keeper: Arc<dyn KeepFlagUpdater>,
    color_seed: Option<u64>,
    default_limit: u64,
    generation: RequestGeneration,
    state: Mutex<PageState>,
}

impl BuildPageController {
    pub fn new(retrieval: Arc<dyn BuildRetrieval>, keeper: Arc<dyn KeepFlagUpdater>, cfg: &Config) -> Self {
        Self {
            retrieval,
            keeper,
            color_seed: cfg.color_seed,
            default_limit: cfg.page_limit.max(1),
            generation: RequestGeneration::new(),
            state: Mutex::new(PageState {
                filters: None,
                view: Retrieval::Loading,
                selection: BuildSelectionStore::new(),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, PageState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // -------------------------------------------------------------------------
    // Retrieval
    // -------------------------------------------------------------------------

    /// Fetches one page. Selection is left alone.
    ///
    /// Returns `Superseded` when a newer fetch was issued before this one
    /// settled; its result (or error) is then dropped. A failure of the latest
    /// fetch moves the view to `Unavailable` and is returned as the error.
    pub async fn fetch_page(&self, filters: PageFilterState) -> Result<RequestOutcome<PageResult>> {
        let filters = PageFilterState {
            limit: filters.limit.max(1),
            ..filters
        };
        let generation = {
            let mut state = self.state();
            let generation = self.generation.issue();
            state.filters = Some(filters.clone());
            if state.view.ready().is_none() {
                state.view = Retrieval::Loading;
            }
            generation
        };
        log_fetch_issued(&filters.team_id, generation, filters.skip, filters.limit);

        let response = self.retrieval.builds_with_date_filters(&filters.query()).await;

        let mut state = self.state();
        if !self.generation.is_current(generation) {
            log_fetch_superseded("page.superseded", generation, self.generation.latest());
            return Ok(RequestOutcome::Superseded);
        }
        let page = match response {
            Ok(page) => page,
            Err(err) => {
                log_fetch_failed("page.failed", generation, &err);
                state.view = Retrieval::Unavailable(format!("{:#}", err));
                return Err(err);
            }
        };

        let mut builds = page.builds;
        assign_indexes(&mut builds, filters.skip);
        let (series, colors) = aggregate_fresh(&page.metrics, self.color_seed);
        state.view = Retrieval::Ready(PageSnapshot {
            builds: builds.clone(),
            total: page.count,
            skip: filters.skip,
            limit: filters.limit,
            summary: SummaryPanel::from_payload(&page.metrics),
            metrics: page.metrics,
            series,
            colors,
        });
        log_fetch_applied(&filters.team_id, generation, builds.len(), page.count);
        Ok(RequestOutcome::Applied(PageResult {
            builds,
            total: page.count,
        }))
    }

    /// Re-fetches the first page for a new context. Does nothing without a team.
    pub async fn apply_context(&self, ctx: &DashboardContext) -> Result<Option<RequestOutcome<PageResult>>> {
        let limit = self.current_filters().map(|f| f.limit).unwrap_or(self.default_limit);
        match PageFilterState::from_context(ctx, limit) {
            Some(filters) => Ok(Some(self.fetch_page(filters).await?)),
            None => Ok(None),
        }
    }

    pub async fn refresh(&self) -> Result<Option<RequestOutcome<PageResult>>> {
        match self.current_filters() {
            Some(filters) => Ok(Some(self.fetch_page(filters).await?)),
            None => Ok(None),
        }
    }

    /// Moves forward one page, clamped to the last page once the total is known.
    pub async fn next_page(&self) -> Result<Option<RequestOutcome<PageResult>>> {
        self.navigate(|f, total| clamp_skip(f.skip.saturating_add(f.limit), f.limit, total))
            .await
    }

    /// Moves back one page, never below the first.
    pub async fn previous_page(&self) -> Result<Option<RequestOutcome<PageResult>>> {
        self.navigate(|f, _| f.skip.saturating_sub(f.limit)).await
    }

    /// Jumps to a 1-based page number; `0` is treated as the first page.
    pub async fn go_to_page(&self, page: u64) -> Result<Option<RequestOutcome<PageResult>>> {
        let page = page.max(1);
        self.navigate(move |f, total| clamp_skip((page - 1).saturating_mul(f.limit), f.limit, total))
            .await
    }

    /// Changes the page size and returns to the first page. A zero limit is ignored.
    pub async fn set_limit(&self, limit: u64) -> Result<Option<RequestOutcome<PageResult>>> {
        if limit == 0 {
            return Ok(None);
        }
        match self.current_filters() {
            Some(filters) => {
                let filters = PageFilterState { limit, skip: 0, ..filters };
                Ok(Some(self.fetch_page(filters).await?))
            }
            None => Ok(None),
        }
    }

    async fn navigate<F>(&self, next_skip: F) -> Result<Option<RequestOutcome<PageResult>>>
    where
        F: FnOnce(&PageFilterState, Option<u64>) -> u64,
    {
        let target = {
            let state = self.state();
            let total = state.view.ready().map(|s| s.total);
            state
                .filters
                .as_ref()
                .map(|f| f.with_skip(next_skip(f, total)))
        };
        match target {
            Some(filters) => Ok(Some(self.fetch_page(filters).await?)),
            None => Ok(None),
        }
    }

    // -------------------------------------------------------------------------
    // Selection
    // -------------------------------------------------------------------------

    pub fn toggle_selected(&self, build_id: &str) -> bool {
        let (selected, count) = {
            let mut state = self.state();
            let selected = state.selection.toggle(build_id);
            (selected, state.selection.count())
        };
        log_selection_toggled(build_id, selected, count);
        selected
    }

    pub fn clear_selection(&self) {
        let previous = {
            let mut state = self.state();
            let previous = state.selection.count();
            state.selection.clear();
            previous
        };
        log_selection_cleared(previous);
    }

    pub fn selection(&self) -> BuildSelectionStore {
        self.state().selection.clone()
    }

    /// Selected ids when at least two builds are selected, for the comparison view.
    pub fn compare_candidates(&self) -> Option<Vec<String>> {
        let state = self.state();
        state
            .selection
            .multiple()
            .then(|| state.selection.selected_ids())
    }

    // -------------------------------------------------------------------------
    // Keep flag
    // -------------------------------------------------------------------------

    /// Flips `keep` on every selected build of the displayed page right away,
    /// sends one update per build concurrently, and clears the selection once
    /// all of them have settled, whether or not they succeeded.
    ///
    /// Failed updates are not rolled back; they are reported in the outcome.
    pub async fn toggle_keep_for_selected(&self) -> KeepOutcome {
        let updates = {
            let mut state = self.state();
            let selected = state.selection.selected_ids();
            match state.view.ready_mut() {
                Some(snapshot) => flip_selected(&mut snapshot.builds, &selected),
                None => Vec::new(),
            }
        };

        let outcome = dispatch_keep_updates(self.keeper.as_ref(), &updates).await;
        self.clear_selection();
        outcome
    }

    // -------------------------------------------------------------------------
    // Views
    // -------------------------------------------------------------------------

    pub fn view(&self) -> Retrieval<PageSnapshot> {
        self.state().view.clone()
    }

    pub fn current_filters(&self) -> Option<PageFilterState> {
        self.state().filters.clone()
    }

    pub fn has_previous(&self) -> bool {
        self.state()
            .view
            .ready()
            .map(PageSnapshot::has_previous)
            .unwrap_or(false)
    }

    pub fn has_next(&self) -> bool {
        self.state()
            .view
            .ready()
            .map(PageSnapshot::has_next)
            .unwrap_or(false)
    }
}
