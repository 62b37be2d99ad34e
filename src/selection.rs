//! Build selection ledger.
//!
//! Identifier-keyed booleans in insertion order. A `false` entry means the
//! same as no entry. The store never looks at builds themselves and is not
//! cleared by paging; callers decide when selections go away.

use std::collections::HashMap;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildSelectionStore {
    order: Vec<String>,
    selected: HashMap<String, bool>,
}

impl BuildSelectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flips the flag for `build_id`; an unknown id becomes selected. Returns the new state.
    pub fn toggle(&mut self, build_id: &str) -> bool {
        match self.selected.get_mut(build_id) {
            Some(flag) => {
                *flag = !*flag;
                *flag
            }
            None => {
                self.order.push(build_id.to_string());
                self.selected.insert(build_id.to_string(), true);
                true
            }
        }
    }

    pub fn is_selected(&self, build_id: &str) -> bool {
        self.selected.get(build_id).copied().unwrap_or(false)
    }

    /// Selected ids in the order they were first toggled.
    pub fn selected_ids(&self) -> Vec<String> {
        self.order
            .iter()
            .filter(|id| self.is_selected(id))
            .cloned()
            .collect()
    }

    pub fn count(&self) -> usize {
        self.selected.values().filter(|v| **v).count()
    }

    pub fn any(&self) -> bool {
        self.count() > 0
    }

    pub fn multiple(&self) -> bool {
        self.count() > 1
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.selected.clear();
    }
}

impl<S: Into<String>> FromIterator<(S, bool)> for BuildSelectionStore {
    fn from_iter<I: IntoIterator<Item = (S, bool)>>(iter: I) -> Self {
        let mut store = Self::new();
        for (id, flag) in iter {
            let id = id.into();
            match store.selected.insert(id.clone(), flag) {
                Some(_) => {}
                None => store.order.push(id),
            }
        }
        store
    }
}
