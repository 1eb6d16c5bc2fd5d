// src/planner.rs
use std::ops::RangeInclusive;
use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::types::Item;

pub const DEFAULT_DELAY_SECS: RangeInclusive<u64> = 30..=60;

/// Decides whether to answer a relevant item and how long to wait first.
///
/// The random source is owned here so tests can seed it.
#[derive(Debug)]
pub struct ResponsePlanner {
    rng: Mutex<StdRng>,
    delay_secs: RangeInclusive<u64>,
}

impl ResponsePlanner {
    pub fn from_entropy() -> Self {
        Self::with_rng(StdRng::from_os_rng())
    }

    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    pub fn with_rng(rng: StdRng) -> Self {
        Self {
            rng: Mutex::new(rng),
            delay_secs: DEFAULT_DELAY_SECS,
        }
    }

    /// Override the delay range. An inverted range collapses to its start.
    pub fn with_delay_range(mut self, min_secs: u64, max_secs: u64) -> Self {
        self.delay_secs = min_secs..=max_secs.max(min_secs);
        self
    }

    pub fn delay_range(&self) -> RangeInclusive<u64> {
        self.delay_secs.clone()
    }

    /// Weighted draw: true with probability `selectivity` (clamped to [0, 1]).
    pub fn should_respond(&self, item: &Item, selectivity: f64) -> bool {
        let p = selectivity.clamp(0.0, 1.0);
        let draw: f64 = self.lock().random();
        let respond = draw < p;
        tracing::trace!(item_id = %item.id, draw, p, respond, "selectivity draw");
        respond
    }

    /// Uniform integer seconds in the configured delay range.
    pub fn compute_delay_secs(&self) -> u64 {
        let range = self.delay_secs.clone();
        self.lock().random_range(range)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StdRng> {
        self.rng.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for ResponsePlanner {
    fn default() -> Self {
        Self::from_entropy()
    }
}
