// src/config/ai.rs
use serde::{Deserialize, Serialize};
use std::env;

fn default_provider() -> String {
    "gemini".to_string()
}
fn default_api_key() -> String {
    "ENV".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// "gemini" | "openai" | "mock" (case-insensitive)
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Model override; provider default when absent.
    #[serde(default)]
    pub model: Option<String>,
    /// "ENV" means: read from GEMINI_API_KEY / OPENAI_API_KEY (by provider)
    #[serde(default = "default_api_key")]
    pub api_key: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            api_key: default_api_key(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl GenerationConfig {
    /// Normalize provider and resolve an "ENV" key.
    /// A missing env key is not an error here: the client reports
    /// `NotConfigured` on every call instead, so a run still logs attempts.
    pub fn resolved(mut self) -> Self {
        self.provider = self.provider.trim().to_lowercase();
        if env::var("RESPONDER_AI_MODE").is_ok_and(|v| v.eq_ignore_ascii_case("mock")) {
            self.provider = "mock".to_string();
        }
        if self.api_key.trim().eq_ignore_ascii_case("env") {
            let var = match self.provider.as_str() {
                "openai" => "OPENAI_API_KEY",
                _ => "GEMINI_API_KEY",
            };
            self.api_key = env::var(var).unwrap_or_default();
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[serial_test::serial]
    #[test]
    fn env_key_is_resolved_by_provider() {
        env::remove_var("RESPONDER_AI_MODE");
        env::set_var("OPENAI_API_KEY", "sk-test");
        let cfg = GenerationConfig {
            provider: " OpenAI ".into(),
            ..Default::default()
        }
        .resolved();
        assert_eq!(cfg.provider, "openai");
        assert_eq!(cfg.api_key, "sk-test");
        env::remove_var("OPENAI_API_KEY");
    }

    #[serial_test::serial]
    #[test]
    fn mock_mode_env_wins() {
        env::set_var("RESPONDER_AI_MODE", "mock");
        let cfg = GenerationConfig::default().resolved();
        assert_eq!(cfg.provider, "mock");
        env::remove_var("RESPONDER_AI_MODE");
    }
}
