//! Current team, filters and date range shared by the dashboard views.
//!
//! [`DashboardContext`] is an immutable value; every change goes through a
//! transition method that returns a new context. [`ContextHub`] publishes the
//! latest context to any number of views.

use serde::Serialize;
use serde_json::json;
use tokio::sync::watch;

use crate::config::DateRange;
use crate::logging::{log, obj, v_str, Domain, Level};
use crate::models::{Component, Environment, Team};

/// Environment and component ids picked in the filter menu.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterSelection {
    /// Everything picked, in menu order.
    pub values: Vec<String>,
    pub environment_ids: Vec<String>,
    pub component_ids: Vec<String>,
}

impl FilterSelection {
    /// Splits a mixed list of picked ids into environments and components.
    /// Ids matching neither are kept in `values` but not used for filtering.
    pub fn from_values(values: Vec<String>, environments: &[Environment], components: &[Component]) -> Self {
        let environment_ids = environments
            .iter()
            .filter(|e| values.contains(&e.id))
            .map(|e| e.id.clone())
            .collect();
        let component_ids = components
            .iter()
            .filter(|c| values.contains(&c.id))
            .map(|c| c.id.clone())
            .collect();
        Self {
            values,
            environment_ids,
            component_ids,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.environment_ids.is_empty() && self.component_ids.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DashboardContext {
    teams: Vec<Team>,
    environments: Vec<Environment>,
    current_team: Option<String>,
    filters: FilterSelection,
    range: DateRange,
}

impl DashboardContext {
    pub fn new(teams: Vec<Team>, environments: Vec<Environment>, range: DateRange) -> Self {
        Self {
            teams,
            environments,
            current_team: None,
            filters: FilterSelection::default(),
            range,
        }
    }

    pub fn teams(&self) -> &[Team] {
        &self.teams
    }

    pub fn environments(&self) -> &[Environment] {
        &self.environments
    }

    pub fn current_team(&self) -> Option<&Team> {
        let id = self.current_team.as_deref()?;
        self.teams.iter().find(|t| t.id == id)
    }

    pub fn current_team_id(&self) -> Option<&str> {
        self.current_team.as_deref()
    }

    pub fn filters(&self) -> &FilterSelection {
        &self.filters
    }

    pub fn range(&self) -> DateRange {
        self.range
    }

    /// Components of the current team, empty when no team is selected.
    pub fn components(&self) -> &[Component] {
        self.current_team()
            .map(|t| t.components.as_slice())
            .unwrap_or(&[])
    }

    /// Switches team and clears filter values. Unknown team ids leave the context unchanged.
    pub fn with_team(&self, team_id: &str) -> Self {
        if !self.teams.iter().any(|t| t.id == team_id) {
            log(
                Level::Warn,
                Domain::Context,
                "team.unknown",
                obj(&[("team_id", v_str(team_id))]),
            );
            return self.clone();
        }
        Self {
            current_team: Some(team_id.to_string()),
            filters: FilterSelection::default(),
            ..self.clone()
        }
    }

    /// Replaces the environment list and clears filter values.
    pub fn with_environments(&self, environments: Vec<Environment>) -> Self {
        Self {
            environments,
            filters: FilterSelection::default(),
            ..self.clone()
        }
    }

    pub fn with_filter_values(&self, values: Vec<String>) -> Self {
        let filters = FilterSelection::from_values(values, &self.environments, self.components());
        Self {
            filters,
            ..self.clone()
        }
    }

    pub fn with_date_range(&self, range: DateRange) -> Self {
        Self {
            range,
            ..self.clone()
        }
    }
}

/// Publishes context transitions to subscribed views.
pub struct ContextHub {
    tx: watch::Sender<DashboardContext>,
}

impl ContextHub {
    pub fn new(initial: DashboardContext) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    pub fn subscribe(&self) -> watch::Receiver<DashboardContext> {
        self.tx.subscribe()
    }

    pub fn current(&self) -> DashboardContext {
        self.tx.borrow().clone()
    }

    /// Applies a transition and notifies subscribers when the context changed.
    pub fn update<F>(&self, transition: F) -> DashboardContext
    where
        F: FnOnce(&DashboardContext) -> DashboardContext,
    {
        let mut next = None;
        self.tx.send_if_modified(|ctx| {
            let updated = transition(ctx);
            let changed = updated != *ctx;
            if changed {
                *ctx = updated;
            }
            next = Some(ctx.clone());
            changed
        });
        let next = next.unwrap_or_else(|| self.current());
        log(
            Level::Debug,
            Domain::Context,
            "context.updated",
            obj(&[
                ("team_id", json!(next.current_team_id())),
                ("filters", json!(next.filters().values.len())),
            ]),
        );
        next
    }
}
