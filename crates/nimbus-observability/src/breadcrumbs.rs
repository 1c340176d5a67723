//! Bounded breadcrumb trail (spec §4.9: "records up to 20 breadcrumbs in a
//! bounded ring buffer"), attached to an [`ErrorCapture`](crate::ErrorCapture)
//! when an unhandled error is reported. New for this engine — the teacher's
//! observability crate has no equivalent, since its provider/session events
//! are one-shot rather than accumulated per request.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;

pub const MAX_BREADCRUMBS: usize = 20;

#[derive(Debug, Clone, Serialize)]
pub struct Breadcrumb {
    pub at: DateTime<Utc>,
    pub category: String,
    pub message: String,
}

impl Breadcrumb {
    pub fn new(category: impl Into<String>, message: impl Into<String>) -> Self {
        Self { at: Utc::now(), category: category.into(), message: message.into() }
    }
}

/// Fixed-capacity ring: pushing past [`MAX_BREADCRUMBS`] drops the oldest
/// entry rather than growing unbounded, so a long-lived request span never
/// turns into a memory leak.
#[derive(Debug, Clone, Default)]
pub struct BreadcrumbRing {
    entries: VecDeque<Breadcrumb>,
}

impl BreadcrumbRing {
    pub fn new() -> Self {
        Self { entries: VecDeque::with_capacity(MAX_BREADCRUMBS) }
    }

    pub fn push(&mut self, crumb: Breadcrumb) {
        if self.entries.len() == MAX_BREADCRUMBS {
            self.entries.pop_front();
        }
        self.entries.push_back(crumb);
    }

    pub fn snapshot(&self) -> Vec<Breadcrumb> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evicts_oldest_past_capacity() {
        let mut ring = BreadcrumbRing::new();
        for i in 0..25 {
            ring.push(Breadcrumb::new("webhook", format!("event {i}")));
        }
        assert_eq!(ring.len(), MAX_BREADCRUMBS);
        let snapshot = ring.snapshot();
        assert_eq!(snapshot.first().unwrap().message, "event 5");
        assert_eq!(snapshot.last().unwrap().message, "event 24");
    }

    #[test]
    fn empty_ring_reports_empty() {
        let ring = BreadcrumbRing::new();
        assert!(ring.is_empty());
        assert!(ring.snapshot().is_empty());
    }
}
