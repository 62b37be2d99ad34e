//! Request generations and retrieval states shared by the view controllers.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic request counter. Only the response of the latest issued
/// generation may be applied to view state.
#[derive(Debug, Default)]
pub struct RequestGeneration {
    latest: AtomicU64,
}

impl RequestGeneration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tags a new request; supersedes every earlier one.
    pub fn issue(&self) -> u64 {
        self.latest.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn latest(&self) -> u64 {
        self.latest.load(Ordering::SeqCst)
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.latest() == generation
    }
}

/// What a view shows for one kind of remote data.
///
/// `Loading` is transient; `Unavailable` is a failure the user can act on.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum Retrieval<T> {
    Loading,
    Unavailable(String),
    Ready(T),
}

impl<T> Retrieval<T> {
    pub fn ready(&self) -> Option<&T> {
        match self {
            Retrieval::Ready(value) => Some(value),
            _ => None,
        }
    }

    pub fn ready_mut(&mut self) -> Option<&mut T> {
        match self {
            Retrieval::Ready(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, Retrieval::Loading)
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, Retrieval::Unavailable(_))
    }
}

/// Result of a request that may have been overtaken by a newer one.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestOutcome<T> {
    Applied(T),
    /// A newer request was issued before this one settled; nothing was applied.
    Superseded,
}

impl<T> RequestOutcome<T> {
    pub fn applied(self) -> Option<T> {
        match self {
            RequestOutcome::Applied(value) => Some(value),
            RequestOutcome::Superseded => None,
        }
    }

    pub fn is_superseded(&self) -> bool {
        matches!(self, RequestOutcome::Superseded)
    }
}
