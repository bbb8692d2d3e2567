// # Last Report Snapshot
//
// Holds the most recent successfully fetched report.
//
// ## Crash Behavior
//
// - The snapshot is in-memory only and is lost on restart
// - Nothing depends on it surviving: delivery history lives in the
//   destinations themselves (message footers), not here
//
// ## Publication
//
// The poll loop replaces the whole report in one step and readers take an
// `Arc` clone, so a reader never observes a partially written report.

use std::sync::{Arc, PoisonError, RwLock};

use crate::item::FeedReport;

/// Shared "last good report" slot
///
/// Written only after a successful fetch; a failed fetch leaves the previous
/// report in place.
#[derive(Debug, Clone, Default)]
pub struct LastReport {
    inner: Arc<RwLock<Option<Arc<FeedReport>>>>,
}

impl LastReport {
    /// Create an empty slot
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a new report, replacing the previous one
    pub fn replace(&self, report: Arc<FeedReport>) {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Some(report);
    }

    /// Current report, if one has been fetched
    pub fn get(&self) -> Option<Arc<FeedReport>> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Check whether a report has been published yet
    pub fn is_empty(&self) -> bool {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }
}
