// src/types.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum number of body characters kept in records and prompts.
pub const BODY_EXCERPT_CHARS: usize = 500;

/// One fetched content unit (a post) from a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub title: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub score: i64,
    pub source_channel: String,
}

impl Item {
    /// Body truncated to [`BODY_EXCERPT_CHARS`] characters.
    pub fn body_excerpt(&self) -> String {
        excerpt(&self.body, BODY_EXCERPT_CHARS)
    }
}

/// Durable record of one attempted response. Never mutated after append.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionRecord {
    pub timestamp: DateTime<Utc>,
    pub source_channel: String,
    pub item_id: String,
    pub title: String,
    pub body: String,
    pub matched_keywords: Vec<String>,
    pub generated_response: String,
    pub response_length: usize,
    pub success: bool,
}

impl InteractionRecord {
    pub fn new(
        item: &Item,
        matched_keywords: Vec<String>,
        generated_response: String,
        success: bool,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            source_channel: item.source_channel.clone(),
            item_id: item.id.clone(),
            title: item.title.clone(),
            body: item.body_excerpt(),
            matched_keywords,
            response_length: generated_response.chars().count(),
            generated_response,
            success,
        }
    }
}

/// Per-cycle performance row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleMetrics {
    pub timestamp: DateTime<Utc>,
    pub total_posts_scanned: u64,
    pub posts_responded_to: u64,
    pub response_rate: f64,
    pub average_response_time_secs: f64,
}

pub(crate) fn excerpt(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(body: &str) -> Item {
        Item {
            id: "x1".into(),
            title: "t".into(),
            body: body.into(),
            created_at: Utc::now(),
            score: 1,
            source_channel: "india".into(),
        }
    }

    #[test]
    fn record_counts_chars_not_bytes() {
        let rec = InteractionRecord::new(&item("b"), vec![], "héllo".into(), true);
        assert_eq!(rec.response_length, 5);
        assert_eq!(rec.item_id, "x1");
    }

    #[test]
    fn body_is_capped_in_records() {
        let long = "a".repeat(BODY_EXCERPT_CHARS + 40);
        let rec = InteractionRecord::new(&item(&long), vec![], String::new(), false);
        assert_eq!(rec.body.chars().count(), BODY_EXCERPT_CHARS);
        assert_eq!(rec.response_length, 0);
    }
}
