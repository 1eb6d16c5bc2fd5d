//! Error taxonomy for the responder core.
//!
//! Per-item failures (`FetchError`, `GenerationError`, `PublishError`) are
//! never fatal to a run; they end up as log lines and `success = false`
//! records. `StorageError` is surfaced as a warning event. Only
//! `SchedulerError` is returned to the controlling context.

use crate::scheduler::Phase;

/// The content source could not deliver a page of items.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("source unreachable: {0}")]
    Unreachable(String),

    #[error("source rejected credentials: {0}")]
    Unauthorized(String),

    #[error("source returned HTTP {status} for {channel}")]
    Status { channel: String, status: u16 },

    #[error("could not decode source payload: {0}")]
    Decode(String),
}

/// The text-generation backend failed or produced nothing usable.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("generation request failed: {0}")]
    Request(String),

    #[error("generation backend returned HTTP {0}")]
    Status(u16),

    #[error("generation backend returned an empty response")]
    Empty,

    #[error("generation backend is not configured: {0}")]
    NotConfigured(String),
}

/// Posting the reply failed (rate-limited, banned, locked thread, ...).
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("publish request failed: {0}")]
    Request(String),

    #[error("publish rejected with HTTP {0}")]
    Status(u16),

    #[error("publisher is not authorized: {0}")]
    Unauthorized(String),

    #[error("publish rejected: {0}")]
    Rejected(String),
}

/// The interaction log could not be written or read.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("encoding stored field failed: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("log store lock poisoned")]
    Poisoned,

    #[error("log store task failed: {0}")]
    Task(String),
}

/// Errors reported synchronously to callers of `Scheduler::start`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchedulerError {
    #[error("scheduler is already running")]
    AlreadyRunning,

    #[error("cannot start while scheduler is {0:?}")]
    InvalidTransition(Phase),

    #[error("invalid schedule config: {0}")]
    InvalidConfig(String),
}

/// A cancellable wait was interrupted by a stop request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("cancelled")]
pub struct Cancelled;
