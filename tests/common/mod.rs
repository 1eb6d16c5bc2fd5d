// tests/common/mod.rs
//
// Scripted collaborators shared by the integration tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, Utc};

use reddit_responder::config::{RateLimits, ScheduleConfig};
use reddit_responder::error::{
    FetchError, GenerationError, PublishError, StorageError,
};
use reddit_responder::generate::GenerationClient;
use reddit_responder::planner::ResponsePlanner;
use reddit_responder::relevance::KeywordSet;
use reddit_responder::source::{PublishClient, SourceClient};
use reddit_responder::store::LogStore;
use reddit_responder::{InteractionRecord, Item, ScanCycle};

pub fn item(id: &str, channel: &str, title: &str, body: &str, age_secs: i64, score: i64) -> Item {
    Item {
        id: id.into(),
        title: title.into(),
        body: body.into(),
        created_at: Utc::now() - Duration::seconds(age_secs),
        score,
        source_channel: channel.into(),
    }
}

/// A fresh, relevant post for the default "help" keyword.
pub fn help_post(id: &str, channel: &str) -> Item {
    item(id, channel, "need help please", "", 60, 3)
}

pub fn schedule(channels: &[&str]) -> ScheduleConfig {
    ScheduleConfig {
        channels: channels.iter().map(|s| s.to_string()).collect(),
        keywords: KeywordSet::new(["help", "advice"]),
        selectivity: 1.0,
        ..Default::default()
    }
}

pub fn no_limits() -> RateLimits {
    RateLimits {
        source_delay_secs: 0,
        generation_delay_secs: 0,
        response_delay_secs: [0, 0],
    }
}

/// Cycle with no pacing and a seeded planner.
pub fn quick_cycle(
    source: Arc<dyn SourceClient>,
    generator: Arc<dyn GenerationClient>,
    publisher: Arc<dyn PublishClient>,
    store: Arc<dyn LogStore>,
) -> ScanCycle {
    ScanCycle::new(source, generator, publisher, store)
        .with_rate_gate(no_limits().to_gate())
        .with_planner(ResponsePlanner::seeded(42).with_delay_range(0, 0))
}

// ---------- Source ----------

#[derive(Default)]
pub struct ScriptedSource {
    pages: HashMap<String, Vec<Item>>,
    failing: HashMap<String, u16>,
    pub fetches: AtomicUsize,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, channel: &str, items: Vec<Item>) -> Self {
        self.pages.insert(channel.into(), items);
        self
    }

    pub fn failing(mut self, channel: &str, status: u16) -> Self {
        self.failing.insert(channel.into(), status);
        self
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceClient for ScriptedSource {
    async fn fetch_recent(&self, channel: &str, limit: u32) -> Result<Vec<Item>, FetchError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(status) = self.failing.get(channel) {
            return Err(FetchError::Status {
                channel: channel.into(),
                status: *status,
            });
        }
        Ok(self
            .pages
            .get(channel)
            .map(|v| v.iter().take(limit as usize).cloned().collect())
            .unwrap_or_default())
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

// ---------- Generator ----------

#[derive(Clone, Copy, Debug)]
pub enum GenMode {
    Reply,
    Empty,
    Fail,
}

/// Replies per item id via a keyed override, otherwise via `default`.
pub struct ScriptedGenerator {
    default: GenMode,
    overrides: HashMap<String, GenMode>,
    latency: Option<std::time::Duration>,
    pub calls: AtomicUsize,
}

impl ScriptedGenerator {
    pub fn new(default: GenMode) -> Self {
        Self {
            default,
            overrides: HashMap::new(),
            latency: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Each call takes this long before answering.
    pub fn with_latency(mut self, latency: std::time::Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Prompts contain the title, so overrides key on a title fragment.
    pub fn when_title_contains(mut self, fragment: &str, mode: GenMode) -> Self {
        self.overrides.insert(fragment.into(), mode);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GenerationClient for ScriptedGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(d) = self.latency {
            tokio::time::sleep(d).await;
        }
        let mode = self
            .overrides
            .iter()
            .find(|(k, _)| prompt.contains(k.as_str()))
            .map(|(_, m)| *m)
            .unwrap_or(self.default);
        match mode {
            GenMode::Reply => Ok("What have you tried so far?".into()),
            GenMode::Empty => Ok("   ".into()),
            GenMode::Fail => Err(GenerationError::Status(503)),
        }
    }

    fn provider_name(&self) -> &'static str {
        "scripted"
    }
}

// ---------- Publisher ----------

#[derive(Default)]
pub struct RecordingPublisher {
    fail_ids: Vec<String>,
    pub posted: Mutex<Vec<String>>,
    pub posted_at: Mutex<Vec<tokio::time::Instant>>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_for(mut self, id: &str) -> Self {
        self.fail_ids.push(id.into());
        self
    }

    pub fn posted(&self) -> Vec<String> {
        self.posted.lock().unwrap().clone()
    }

    pub fn posted_at(&self) -> Vec<tokio::time::Instant> {
        self.posted_at.lock().unwrap().clone()
    }
}

#[async_trait]
impl PublishClient for RecordingPublisher {
    async fn publish(&self, item: &Item, _text: &str) -> Result<bool, PublishError> {
        if self.fail_ids.contains(&item.id) {
            return Err(PublishError::Status(429));
        }
        self.posted.lock().unwrap().push(item.id.clone());
        self.posted_at.lock().unwrap().push(tokio::time::Instant::now());
        Ok(true)
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

// ---------- Store ----------

/// Rejects every write.
#[derive(Default)]
pub struct BrokenStore;

#[async_trait]
impl LogStore for BrokenStore {
    async fn append(&self, _record: &InteractionRecord) -> Result<(), StorageError> {
        Err(StorageError::Poisoned)
    }

    async fn query_all(&self) -> Result<Vec<InteractionRecord>, StorageError> {
        Ok(Vec::new())
    }

    async fn clear(&self) -> Result<(), StorageError> {
        Ok(())
    }
}
