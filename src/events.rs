// src/events.rs
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

/// Capacity of the event channel; slow subscribers lag rather than block.
pub const EVENT_CAPACITY: usize = 256;

/// Live status notifications for control surfaces.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SchedulerEvent {
    Started {
        channels: Vec<String>,
        period_secs: u64,
    },
    CycleStarted {
        cycle: u64,
    },
    ChannelScanned {
        channel: String,
        scanned: usize,
        attempted: usize,
        fetch_error: Option<String>,
    },
    Interaction {
        channel: String,
        item_id: String,
        success: bool,
    },
    CycleFinished {
        cycle: u64,
        scanned: u64,
        attempted: u64,
        succeeded: u64,
        elapsed_ms: u64,
    },
    Heartbeat {
        next_cycle_at: DateTime<Utc>,
    },
    StorageWarning {
        message: String,
    },
    Stopped,
}

pub fn channel() -> (
    broadcast::Sender<SchedulerEvent>,
    broadcast::Receiver<SchedulerEvent>,
) {
    broadcast::channel(EVENT_CAPACITY)
}

/// Send without caring whether anyone listens.
pub(crate) fn emit(tx: &broadcast::Sender<SchedulerEvent>, ev: SchedulerEvent) {
    // No subscribers is not an error.
    let _ = tx.send(ev);
}
