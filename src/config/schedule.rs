// src/config/schedule.rs
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::SchedulerError;
use crate::relevance::KeywordSet;

pub const DEFAULT_CHANNELS: [&str; 2] = ["india", "AskReddit"];

pub const DEFAULT_KEYWORDS: [&str; 14] = [
    "help",
    "advice",
    "question",
    "how to",
    "need help",
    "confused",
    "stuck",
    "problem",
    "issue",
    "guidance",
    "suggest",
    "recommend",
    "opinion",
    "thoughts",
];

fn default_channels() -> Vec<String> {
    DEFAULT_CHANNELS.iter().map(|s| s.to_string()).collect()
}
fn default_keywords() -> KeywordSet {
    KeywordSet::new(DEFAULT_KEYWORDS)
}
fn default_max_item_age_secs() -> u64 {
    3600
}
fn default_selectivity() -> f64 {
    0.10
}
fn default_fetch_limit() -> u32 {
    25
}
fn default_heartbeat_secs() -> u64 {
    60
}

/// Named cadences offered by the control surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanMode {
    #[default]
    Hourly,
    Weekly,
}

impl ScanMode {
    pub fn period_secs(self) -> u64 {
        match self {
            ScanMode::Hourly => 3600,
            ScanMode::Weekly => 7 * 24 * 3600,
        }
    }
}

/// Per-run schedule. Immutable once handed to `Scheduler::start`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_channels")]
    pub channels: Vec<String>,
    #[serde(default)]
    pub mode: ScanMode,
    /// Explicit period; wins over `mode`.
    #[serde(default)]
    pub period_secs: Option<u64>,
    /// Development override; wins over everything when > 0.
    #[serde(default)]
    pub test_interval_secs: Option<u64>,
    #[serde(default = "default_keywords")]
    pub keywords: KeywordSet,
    #[serde(default = "default_max_item_age_secs")]
    pub max_item_age_secs: u64,
    #[serde(default = "default_selectivity")]
    pub selectivity: f64,
    #[serde(default = "default_fetch_limit")]
    pub fetch_limit: u32,
    #[serde(default = "default_heartbeat_secs")]
    pub heartbeat_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            channels: default_channels(),
            mode: ScanMode::default(),
            period_secs: None,
            test_interval_secs: None,
            keywords: default_keywords(),
            max_item_age_secs: default_max_item_age_secs(),
            selectivity: default_selectivity(),
            fetch_limit: default_fetch_limit(),
            heartbeat_secs: default_heartbeat_secs(),
        }
    }
}

impl ScheduleConfig {
    /// Seconds between the end of one cycle and the start of the next.
    pub fn effective_period_secs(&self) -> u64 {
        match (self.test_interval_secs, self.period_secs) {
            (Some(t), _) if t > 0 => t,
            (_, Some(p)) => p,
            _ => self.mode.period_secs(),
        }
    }

    pub fn period(&self) -> Duration {
        Duration::from_secs(self.effective_period_secs())
    }

    /// Heartbeat cadence; never zero.
    pub fn heartbeat(&self) -> Duration {
        Duration::from_secs(self.heartbeat_secs.max(1))
    }

    /// Trim channel names, strip a leading `r/`, drop empties and
    /// case-insensitive duplicates (first spelling wins).
    pub fn normalized(mut self) -> Self {
        let mut out: Vec<String> = Vec::with_capacity(self.channels.len());
        for c in &self.channels {
            let t = c.trim();
            let t = t.strip_prefix("r/").unwrap_or(t).trim();
            if t.is_empty() || out.iter().any(|o| o.eq_ignore_ascii_case(t)) {
                continue;
            }
            out.push(t.to_string());
        }
        self.channels = out;
        self
    }

    pub fn validate(&self) -> Result<(), SchedulerError> {
        let invalid = |msg: &str| Err(SchedulerError::InvalidConfig(msg.to_string()));
        if self.channels.iter().all(|c| c.trim().is_empty()) {
            return invalid("channel set is empty");
        }
        if let Some(bad) = self
            .channels
            .iter()
            .map(|c| c.trim())
            .find(|c| !c.is_empty() && !is_channel_name(c))
        {
            return Err(SchedulerError::InvalidConfig(format!(
                "channel name {bad:?} may only contain ASCII letters, digits and '_'"
            )));
        }
        if self.keywords.is_empty() {
            return invalid("keyword set is empty");
        }
        if self.effective_period_secs() == 0 {
            return invalid("period must be > 0 seconds");
        }
        if self.max_item_age_secs == 0 {
            return invalid("max item age must be > 0 seconds");
        }
        if !(self.selectivity > 0.0 && self.selectivity <= 1.0) {
            return invalid("selectivity must be in (0, 1]");
        }
        if self.fetch_limit == 0 {
            return invalid("fetch limit must be > 0");
        }
        Ok(())
    }
}

/// Channel names end up in request paths, so only the characters the
/// platform itself allows are accepted.
fn is_channel_name(name: &str) -> bool {
    name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

/// Optional per-start overrides layered on top of the configured defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StartOverrides {
    pub channels: Option<Vec<String>>,
    pub mode: Option<ScanMode>,
    pub period_secs: Option<u64>,
    pub test_interval_secs: Option<u64>,
    /// Either a list or a single comma-separated string.
    pub keywords: Option<KeywordsInput>,
    pub max_item_age_secs: Option<u64>,
    pub selectivity: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeywordsInput {
    List(Vec<String>),
    Csv(String),
}

impl StartOverrides {
    pub fn apply(self, mut base: ScheduleConfig) -> ScheduleConfig {
        if let Some(c) = self.channels {
            base.channels = c;
        }
        if let Some(m) = self.mode {
            base.mode = m;
            // choosing a mode drops an explicit period from the base config
            base.period_secs = None;
        }
        if self.period_secs.is_some() {
            base.period_secs = self.period_secs;
        }
        if self.test_interval_secs.is_some() {
            base.test_interval_secs = self.test_interval_secs;
        }
        match self.keywords {
            Some(KeywordsInput::List(v)) => base.keywords = KeywordSet::new(v),
            Some(KeywordsInput::Csv(s)) => base.keywords = KeywordSet::parse_csv(&s),
            None => {}
        }
        if let Some(a) = self.max_item_age_secs {
            base.max_item_age_secs = a;
        }
        if let Some(s) = self.selectivity {
            base.selectivity = s;
        }
        base
    }
}
