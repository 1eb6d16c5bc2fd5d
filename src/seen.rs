//! Process-lifetime dedup of item ids.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};

/// Ids already handled by this process.
///
/// Unbounded by default. Each id carries a stamp, which the scan cycle sets to
/// the item's creation time. With a retention window, `evict_expired` drops ids
/// stamped longer ago than `max(retention, age_bound)`; with `age_bound` set to
/// the relevance age limit, an evicted item can no longer pass relevance, so
/// eviction never leads to a second reply.
#[derive(Debug, Default)]
pub struct SeenSet {
    inner: Mutex<HashMap<String, DateTime<Utc>>>,
    retention: Option<Duration>,
}

impl SeenSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_retention(retention: Duration) -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
            retention: Some(retention),
        }
    }

    /// Returns true if `id` was not present (and is now marked).
    pub fn mark_if_new(&self, id: &str) -> bool {
        self.mark_if_new_at(id, Utc::now())
    }

    /// Like [`mark_if_new`](Self::mark_if_new) with an explicit eviction stamp.
    pub fn mark_if_new_at(&self, id: &str, stamp: DateTime<Utc>) -> bool {
        let mut g = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if g.contains_key(id) {
            return false;
        }
        g.insert(id.to_string(), stamp);
        true
    }

    pub fn contains(&self, id: &str) -> bool {
        let g = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        g.contains_key(id)
    }

    /// Un-mark an id whose attempt was abandoned before anything was sent.
    pub fn forget(&self, id: &str) {
        let mut g = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        g.remove(id);
    }

    /// Drop ids stamped longer ago than `max(retention, age_bound)`.
    /// No-op when unbounded. Returns the number of evicted ids.
    pub fn evict_expired(&self, now: DateTime<Utc>, age_bound: Duration) -> usize {
        let Some(retention) = self.retention else {
            return 0;
        };
        let Ok(window) = chrono::Duration::from_std(retention.max(age_bound)) else {
            return 0;
        };
        let mut g = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let before = g.len();
        g.retain(|_, stamp| now.signed_duration_since(*stamp) <= window);
        before - g.len()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
