// src/config/mod.rs
pub mod ai;
pub mod schedule;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub use ai::GenerationConfig;
pub use schedule::{KeywordsInput, ScanMode, ScheduleConfig, StartOverrides};

use crate::planner::ResponsePlanner;
use crate::rate_gate::{RateGate, ResourceClass};
use crate::seen::SeenSet;

pub const ENV_CONFIG_PATH: &str = "RESPONDER_CONFIG_PATH";
pub const ENV_TEST_INTERVAL: &str = "RESPONDER_TEST_INTERVAL_SECS";
pub const ENV_BIND: &str = "RESPONDER_BIND";
pub const ENV_AUTOSTART: &str = "RESPONDER_AUTOSTART";
pub const ENV_DB_PATH: &str = "RESPONDER_DB_PATH";

fn default_source_delay_secs() -> u64 {
    2
}
fn default_generation_delay_secs() -> u64 {
    12
}
fn default_response_delay_secs() -> [u64; 2] {
    [30, 60]
}

/// Minimum spacing per external API, in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimits {
    #[serde(default = "default_source_delay_secs")]
    pub source_delay_secs: u64,
    #[serde(default = "default_generation_delay_secs")]
    pub generation_delay_secs: u64,
    /// `[min, max]` human-like delay before each reply.
    #[serde(default = "default_response_delay_secs")]
    pub response_delay_secs: [u64; 2],
}

impl Default for RateLimits {
    fn default() -> Self {
        Self {
            source_delay_secs: default_source_delay_secs(),
            generation_delay_secs: default_generation_delay_secs(),
            response_delay_secs: default_response_delay_secs(),
        }
    }
}

impl RateLimits {
    pub fn to_gate(&self) -> RateGate {
        let mut m = HashMap::new();
        m.insert(
            ResourceClass::Source,
            Duration::from_secs(self.source_delay_secs),
        );
        m.insert(
            ResourceClass::Generation,
            Duration::from_secs(self.generation_delay_secs),
        );
        RateGate::new(m)
    }

    pub fn to_planner(&self) -> ResponsePlanner {
        let [min, max] = self.response_delay_secs;
        if min > max {
            tracing::warn!(min, max, "response delay range inverted, using min");
        }
        ResponsePlanner::from_entropy().with_delay_range(min, max)
    }
}

fn default_user_agent() -> String {
    "reddit-responder/0.1".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Log replies instead of posting them.
    #[serde(default)]
    pub dry_run: bool,
}

impl Default for RedditConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            dry_run: false,
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("reddit_bot.db")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// In-memory dedup of seen item ids.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DedupConfig {
    /// Forget ids after this many seconds. Unset keeps them for the process lifetime.
    #[serde(default)]
    pub retention_secs: Option<u64>,
}

impl DedupConfig {
    pub fn to_seen_set(&self) -> SeenSet {
        match self.retention_secs {
            Some(secs) if secs > 0 => SeenSet::with_retention(Duration::from_secs(secs)),
            _ => SeenSet::new(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Start the scheduler with the configured schedule on boot.
    #[serde(default)]
    pub autostart: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            autostart: false,
        }
    }
}

/// Whole-application configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub rate_limits: RateLimits,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub reddit: RedditConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub dedup: DedupConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

impl AppConfig {
    /// Load from an explicit path. Supports TOML or JSON formats.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        parse_config(&content, ext.as_str())
            .with_context(|| format!("parsing config {}", path.display()))
    }

    /// Load using env var + fallbacks, then apply env overrides:
    /// 1) $RESPONDER_CONFIG_PATH
    /// 2) config/responder.toml
    /// 3) config/responder.json
    /// 4) built-in defaults
    pub fn load_default() -> Result<Self> {
        let mut cfg = if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
            }
            Self::load_from(&pb)?
        } else {
            let toml_p = PathBuf::from("config/responder.toml");
            let json_p = PathBuf::from("config/responder.json");
            if toml_p.exists() {
                Self::load_from(&toml_p)?
            } else if json_p.exists() {
                Self::load_from(&json_p)?
            } else {
                Self::default()
            }
        };
        cfg.apply_env_overrides()?;
        Ok(cfg)
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(v) = std::env::var(ENV_TEST_INTERVAL) {
            let secs: u64 = v
                .trim()
                .parse()
                .with_context(|| format!("{ENV_TEST_INTERVAL} must be an integer"))?;
            self.schedule.test_interval_secs = Some(secs);
        }
        if let Ok(v) = std::env::var(ENV_BIND) {
            self.server.bind = v;
        }
        if let Ok(v) = std::env::var(ENV_AUTOSTART) {
            self.server.autostart = matches!(v.trim(), "1" | "true" | "yes");
        }
        if let Ok(v) = std::env::var(ENV_DB_PATH) {
            self.store.path = PathBuf::from(v);
        }
        Ok(())
    }
}

fn parse_config(s: &str, hint_ext: &str) -> Result<AppConfig> {
    match hint_ext {
        "json" => Ok(serde_json::from_str(s)?),
        "toml" => Ok(toml::from_str(s)?),
        // Unknown extension: JSON if it looks like an object, TOML otherwise.
        _ if s.trim_start().starts_with('{') => Ok(serde_json::from_str(s)?),
        _ => Ok(toml::from_str(s)?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{env, fs};

    #[test]
    fn toml_and_json_parse_with_defaults() {
        let toml = r#"
            [schedule]
            channels = ["rust"]
            keywords = ["borrow checker"]
            [rate_limits]
            generation_delay_secs = 5
        "#;
        let c = parse_config(toml, "toml").unwrap();
        assert_eq!(c.schedule.channels, vec!["rust".to_string()]);
        assert_eq!(c.schedule.max_item_age_secs, 3600);
        assert_eq!(c.rate_limits.generation_delay_secs, 5);
        assert_eq!(c.rate_limits.source_delay_secs, 2);

        let json = r#"{"schedule": {"selectivity": 0.05}, "reddit": {"dry_run": true}}"#;
        let c = parse_config(json, "").unwrap();
        assert_eq!(c.schedule.selectivity, 0.05);
        assert!(c.reddit.dry_run);
        assert!(c.dedup.retention_secs.is_none());
    }

    #[serial_test::serial]
    #[test]
    fn default_uses_env_then_fallbacks() {
        // Isolate CWD so a real config/ in the repo does not interfere
        let old = env::current_dir().unwrap();
        let tmp = tempfile::tempdir().unwrap();
        env::set_current_dir(tmp.path()).unwrap();

        env::remove_var(ENV_CONFIG_PATH);
        env::remove_var(ENV_TEST_INTERVAL);

        // No files in temp CWD -> defaults
        let v = AppConfig::load_default().unwrap();
        assert_eq!(v.schedule.channels.len(), 2);

        // Env path takes precedence, env overrides apply on top
        let p_json = tmp.path().join("responder.json");
        fs::write(&p_json, r#"{"schedule": {"channels": ["X"]}}"#).unwrap();
        env::set_var(ENV_CONFIG_PATH, p_json.display().to_string());
        env::set_var(ENV_TEST_INTERVAL, "15");
        let v2 = AppConfig::load_default().unwrap();
        assert_eq!(v2.schedule.channels, vec!["X".to_string()]);
        assert_eq!(v2.schedule.effective_period_secs(), 15);
        env::remove_var(ENV_CONFIG_PATH);
        env::remove_var(ENV_TEST_INTERVAL);

        env::set_current_dir(&old).unwrap();
    }
}
