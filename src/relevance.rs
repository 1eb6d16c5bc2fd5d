// src/relevance.rs
//! Relevance gate: keyword matching, age bound and score gate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::Item;

/// Ordered, case-insensitive set of keyword substrings.
///
/// Entries are trimmed, empty ones dropped, and case-insensitive duplicates
/// removed keeping the first spelling.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct KeywordSet {
    entries: Vec<Keyword>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Keyword {
    original: String,
    lower: String,
}

impl KeywordSet {
    pub fn new<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut entries: Vec<Keyword> = Vec::new();
        for it in items {
            let t = it.as_ref().trim();
            if t.is_empty() {
                continue;
            }
            let lower = t.to_lowercase();
            if entries.iter().any(|k| k.lower == lower) {
                continue;
            }
            entries.push(Keyword {
                original: t.to_string(),
                lower,
            });
        }
        Self { entries }
    }

    /// Parse a comma-separated list, as typed into a control surface.
    pub fn parse_csv(s: &str) -> Self {
        Self::new(s.split(','))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|k| k.original.as_str())
    }
}

impl From<Vec<String>> for KeywordSet {
    fn from(v: Vec<String>) -> Self {
        Self::new(v)
    }
}

impl From<KeywordSet> for Vec<String> {
    fn from(k: KeywordSet) -> Self {
        k.entries.into_iter().map(|k| k.original).collect()
    }
}

/// Keywords (in keyword-set order) that appear in the title or body.
pub fn match_keywords(item: &Item, keywords: &KeywordSet) -> Vec<String> {
    let title = item.title.to_lowercase();
    let body = item.body.to_lowercase();
    keywords
        .entries
        .iter()
        .filter(|k| title.contains(&k.lower) || body.contains(&k.lower))
        .map(|k| k.original.clone())
        .collect()
}

/// Age of the item at `now` in whole seconds. Future timestamps count as 0.
pub fn age_secs(item: &Item, now: DateTime<Utc>) -> u64 {
    now.signed_duration_since(item.created_at)
        .num_seconds()
        .max(0) as u64
}

/// Outcome of a relevance check; `matched` is kept for the interaction log.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Relevance {
    pub relevant: bool,
    pub matched: Vec<String>,
}

/// Full evaluation: age ≤ `max_age_secs`, at least one keyword, score ≥ 0.
pub fn evaluate(
    item: &Item,
    keywords: &KeywordSet,
    max_age_secs: u64,
    now: DateTime<Utc>,
) -> Relevance {
    if age_secs(item, now) > max_age_secs || item.score < 0 {
        return Relevance::default();
    }
    let matched = match_keywords(item, keywords);
    Relevance {
        relevant: !matched.is_empty(),
        matched,
    }
}

pub fn is_relevant(
    item: &Item,
    keywords: &KeywordSet,
    max_age_secs: u64,
    now: DateTime<Utc>,
) -> bool {
    evaluate(item, keywords, max_age_secs, now).relevant
}
