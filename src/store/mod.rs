// src/store/mod.rs
pub mod sqlite;

use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::StorageError;
use crate::types::{CycleMetrics, InteractionRecord};

pub use sqlite::SqliteLogStore;

/// Append-only interaction log.
#[async_trait]
pub trait LogStore: Send + Sync {
    async fn append(&self, record: &InteractionRecord) -> Result<(), StorageError>;

    /// All records, oldest first.
    async fn query_all(&self) -> Result<Vec<InteractionRecord>, StorageError>;

    /// At most `limit` records, newest first.
    async fn query_recent(&self, limit: usize) -> Result<Vec<InteractionRecord>, StorageError> {
        let mut all = self.query_all().await?;
        all.reverse();
        all.truncate(limit);
        Ok(all)
    }

    /// Removes all interaction records and cycle metrics.
    async fn clear(&self) -> Result<(), StorageError>;

    async fn append_metrics(&self, _metrics: &CycleMetrics) -> Result<(), StorageError> {
        Ok(())
    }

    async fn query_metrics(&self) -> Result<Vec<CycleMetrics>, StorageError> {
        Ok(Vec::new())
    }
}

/// In-process store. Used by tests and the demo binary.
#[derive(Debug, Default)]
pub struct MemoryLogStore {
    records: Mutex<Vec<InteractionRecord>>,
    metrics: Mutex<Vec<CycleMetrics>>,
}

impl MemoryLogStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LogStore for MemoryLogStore {
    async fn append(&self, record: &InteractionRecord) -> Result<(), StorageError> {
        self.records
            .lock()
            .map_err(|_| StorageError::Poisoned)?
            .push(record.clone());
        Ok(())
    }

    async fn query_all(&self) -> Result<Vec<InteractionRecord>, StorageError> {
        Ok(self
            .records
            .lock()
            .map_err(|_| StorageError::Poisoned)?
            .clone())
    }

    async fn query_recent(&self, limit: usize) -> Result<Vec<InteractionRecord>, StorageError> {
        Ok(self
            .records
            .lock()
            .map_err(|_| StorageError::Poisoned)?
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect())
    }

    async fn clear(&self) -> Result<(), StorageError> {
        self.records
            .lock()
            .map_err(|_| StorageError::Poisoned)?
            .clear();
        self.metrics
            .lock()
            .map_err(|_| StorageError::Poisoned)?
            .clear();
        Ok(())
    }

    async fn append_metrics(&self, metrics: &CycleMetrics) -> Result<(), StorageError> {
        self.metrics
            .lock()
            .map_err(|_| StorageError::Poisoned)?
            .push(metrics.clone());
        Ok(())
    }

    async fn query_metrics(&self) -> Result<Vec<CycleMetrics>, StorageError> {
        Ok(self
            .metrics
            .lock()
            .map_err(|_| StorageError::Poisoned)?
            .clone())
    }
}
