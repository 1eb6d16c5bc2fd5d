// src/rate_gate.rs
use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::Cancelled;

/// External resource classes that are throttled independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceClass {
    /// Content platform API: listing fetches and reply posts.
    Source,
    Generation,
}

impl fmt::Display for ResourceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceClass::Source => f.write_str("source"),
            ResourceClass::Generation => f.write_str("generation"),
        }
    }
}

/// Minimum spacing between calls, per resource class.
///
/// - First acquire of a class passes immediately.
/// - Each acquire reserves the next free slot under a short lock, then sleeps
///   until that slot outside the lock, so callers queue in order.
/// - Classes without a configured interval never wait.
#[derive(Debug, Default)]
pub struct RateGate {
    intervals: HashMap<ResourceClass, Duration>,
    last: Mutex<HashMap<ResourceClass, Instant>>,
}

impl RateGate {
    pub fn new(intervals: HashMap<ResourceClass, Duration>) -> Self {
        Self {
            intervals,
            last: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_interval(mut self, class: ResourceClass, interval: Duration) -> Self {
        self.intervals.insert(class, interval);
        self
    }

    pub fn min_interval(&self, class: ResourceClass) -> Duration {
        self.intervals.get(&class).copied().unwrap_or_default()
    }

    /// Wait until `class` may be called again. Returns `Err(Cancelled)` if
    /// `cancel` fires during the wait; the reserved slot is kept either way.
    pub async fn acquire(
        &self,
        class: ResourceClass,
        cancel: &CancellationToken,
    ) -> Result<(), Cancelled> {
        let slot = self.reserve(class);
        let now = Instant::now();
        if slot <= now {
            return Ok(());
        }
        tracing::debug!(
            %class,
            wait_ms = (slot - now).as_millis() as u64,
            "rate gate waiting"
        );
        tokio::select! {
            _ = cancel.cancelled() => Err(Cancelled),
            _ = tokio::time::sleep_until(slot) => Ok(()),
        }
    }

    fn reserve(&self, class: ResourceClass) -> Instant {
        let interval = self.min_interval(class);
        let now = Instant::now();
        // A poisoned map only holds timestamps; recover it.
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        let slot = match last.get(&class) {
            Some(prev) => (*prev + interval).max(now),
            None => now,
        };
        last.insert(class, slot);
        slot
    }
}
