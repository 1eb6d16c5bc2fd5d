//! Reply generation: provider abstraction, prompt template and factory.

pub mod gemini;
pub mod openai;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::GenerationConfig;
use crate::error::GenerationError;
use crate::types::Item;

pub use gemini::GeminiClient;
pub use openai::OpenAiClient;

/// Produces reply text for a prompt.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;
    /// Provider name for diagnostics.
    fn provider_name(&self) -> &'static str;
}

/// Convenient alias used by callers.
pub type DynGenerator = Arc<dyn GenerationClient>;

/// The fixed prompt used for every reply, filled with the item's details.
pub fn build_prompt(item: &Item, matched_keywords: &[String]) -> String {
    let body = item.body_excerpt();
    let body = if body.is_empty() {
        "No content"
    } else {
        body.as_str()
    };
    format!(
        "You are a curious, supportive member of an online community. Rather than handing \
the poster a finished answer, help them think the problem through: ask a couple of \
pointed questions first, then offer a little practical guidance.\n\
\n\
Style:\n\
- warm and encouraging, conversational\n\
- questions before strong opinions\n\
- concrete and useful; write like a person, not an assistant\n\
\n\
Post:\n\
- Title: {title}\n\
- Content: {body}\n\
- Community: r/{channel}\n\
- Keywords found: {keywords}\n\
\n\
Write one comment that helps the poster reflect on what they actually want, and end it \
with an open-ended question.",
        title = item.title,
        channel = item.source_channel,
        keywords = matched_keywords.join(", "),
    )
}

/// Returns the same text for every prompt. Used for demos and mock mode.
#[derive(Debug, Clone)]
pub struct FixedGenerator {
    pub reply: String,
}

impl FixedGenerator {
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
        }
    }
}

#[async_trait]
impl GenerationClient for FixedGenerator {
    async fn generate(&self, _prompt: &str) -> Result<String, GenerationError> {
        Ok(self.reply.clone())
    }
    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

/// Factory: build a client according to a resolved config.
///
/// * `mock` returns a [`FixedGenerator`].
/// * `openai` returns an [`OpenAiClient`].
/// * anything else builds the Gemini client.
pub fn build_generator(cfg: &GenerationConfig) -> Result<DynGenerator, GenerationError> {
    let timeout = Duration::from_secs(cfg.timeout_secs.max(1));
    let client: DynGenerator = match cfg.provider.as_str() {
        "mock" => Arc::new(FixedGenerator::new(
            "What have you tried so far, and what would a good outcome look like for you?",
        )),
        "openai" => Arc::new(OpenAiClient::new(
            cfg.api_key.clone(),
            cfg.model.as_deref(),
            timeout,
        )?),
        other => {
            if other != "gemini" {
                tracing::warn!(provider = other, "unknown generation provider, using gemini");
            }
            Arc::new(GeminiClient::new(
                cfg.api_key.clone(),
                cfg.model.as_deref(),
                timeout,
            )?)
        }
    };
    tracing::info!(
        provider = client.provider_name(),
        key_len = cfg.api_key.len(),
        "generation client ready"
    );
    Ok(client)
}
