// src/source/mod.rs
pub mod reddit;

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{FetchError, PublishError};
use crate::types::Item;

pub use reddit::RedditClient;

/// Fetches the most recent items of a channel, newest first.
#[async_trait]
pub trait SourceClient: Send + Sync {
    async fn fetch_recent(&self, channel: &str, limit: u32) -> Result<Vec<Item>, FetchError>;
    fn name(&self) -> &'static str;
}

/// Posts a reply under an item. `Ok(false)` means the platform accepted the
/// request but did not create the reply.
#[async_trait]
pub trait PublishClient: Send + Sync {
    async fn publish(&self, item: &Item, text: &str) -> Result<bool, PublishError>;
    fn name(&self) -> &'static str;
}

/// Normalize text: decode HTML entities, collapse whitespace, trim.
pub fn normalize_text(s: &str) -> String {
    let decoded = html_escape::decode_html_entities(s).to_string();

    static RE_WS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").expect("whitespace regex"));
    re_ws.replace_all(&decoded, " ").trim().to_string()
}

/// Serves canned items per channel. Used by the demo binary and tests.
#[derive(Debug, Default)]
pub struct FixtureSource {
    items: HashMap<String, Vec<Item>>,
}

impl FixtureSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_items(mut self, channel: &str, items: Vec<Item>) -> Self {
        self.items.insert(channel.to_string(), items);
        self
    }
}

#[async_trait]
impl SourceClient for FixtureSource {
    async fn fetch_recent(&self, channel: &str, limit: u32) -> Result<Vec<Item>, FetchError> {
        match self.items.get(channel) {
            Some(v) => Ok(v.iter().take(limit as usize).cloned().collect()),
            None => Err(FetchError::Status {
                channel: channel.to_string(),
                status: 404,
            }),
        }
    }

    fn name(&self) -> &'static str {
        "fixture"
    }
}

/// Logs the reply instead of posting it; always reports success.
#[derive(Debug, Default)]
pub struct DryRunPublisher {
    published: Mutex<Vec<(String, String)>>,
}

impl DryRunPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// (item id, reply text) pairs seen so far.
    pub fn published(&self) -> Vec<(String, String)> {
        self.published
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl PublishClient for DryRunPublisher {
    async fn publish(&self, item: &Item, text: &str) -> Result<bool, PublishError> {
        tracing::info!(
            item_id = %item.id,
            channel = %item.source_channel,
            chars = text.chars().count(),
            "dry-run: reply not posted"
        );
        self.published
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((item.id.clone(), text.to_string()));
        Ok(true)
    }

    fn name(&self) -> &'static str {
        "dry-run"
    }
}
