// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod api;
pub mod config;
pub mod cycle;
pub mod error;
pub mod events;
pub mod generate;
pub mod metrics;
pub mod planner;
pub mod rate_gate;
pub mod relevance;
pub mod scheduler;
pub mod seen;
pub mod source;
pub mod store;
pub mod types;
pub mod wait;

// ---- Re-exports for stable public API ----
pub use crate::api::router;
pub use crate::config::{AppConfig, ScheduleConfig};
pub use crate::cycle::{ChannelReport, CycleReport, ScanCycle};
pub use crate::error::{FetchError, GenerationError, PublishError, SchedulerError, StorageError};
pub use crate::events::SchedulerEvent;
pub use crate::scheduler::{Phase, RunState, Scheduler};
pub use crate::types::{CycleMetrics, InteractionRecord, Item};

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Default filter when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "reddit_responder=info,warn";

/// Install the global tracing subscriber. JSON lines when
/// `RESPONDER_LOG_JSON=1`, compact text otherwise. Safe to call twice.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let json = std::env::var("RESPONDER_LOG_JSON")
        .ok()
        .is_some_and(|v| v == "1");

    let registry = tracing_subscriber::registry().with(filter);
    let res = if json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer().compact()).try_init()
    };
    if res.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}
