//! Reddit HTTP client: listing fetch + comment publish.
//!
//! Credentials are read from the environment only. Without them the client
//! falls back to the public `.json` listings and refuses to publish.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tokio::sync::Mutex;
use tokio::time::Instant;

use super::{normalize_text, PublishClient, SourceClient};
use crate::error::{FetchError, PublishError};
use crate::types::Item;

const OAUTH_BASE: &str = "https://oauth.reddit.com";
const PUBLIC_BASE: &str = "https://www.reddit.com";
const TOKEN_URL: &str = "https://www.reddit.com/api/v1/access_token";

/// Refresh the token this long before Reddit says it expires.
const TOKEN_SLACK: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct RedditCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub username: String,
    pub password: String,
}

impl RedditCredentials {
    /// REDDIT_CLIENT_ID / REDDIT_CLIENT_SECRET / REDDIT_USERNAME / REDDIT_PASSWORD.
    pub fn from_env() -> Option<Self> {
        let get = |k: &str| std::env::var(k).ok().filter(|v| !v.trim().is_empty());
        Some(Self {
            client_id: get("REDDIT_CLIENT_ID")?,
            client_secret: get("REDDIT_CLIENT_SECRET")?,
            username: get("REDDIT_USERNAME")?,
            password: get("REDDIT_PASSWORD")?,
        })
    }
}

struct CachedToken {
    value: String,
    expires_at: Instant,
}

pub struct RedditClient {
    http: Client,
    creds: Option<RedditCredentials>,
    token: Mutex<Option<CachedToken>>,
}

impl RedditClient {
    pub fn new(user_agent: &str, creds: Option<RedditCredentials>) -> Result<Self, FetchError> {
        let http = Client::builder()
            .user_agent(user_agent)
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| FetchError::Unreachable(e.to_string()))?;
        Ok(Self {
            http,
            creds,
            token: Mutex::new(None),
        })
    }

    pub fn from_env(user_agent: &str) -> Result<Self, FetchError> {
        let creds = RedditCredentials::from_env();
        if creds.is_none() {
            tracing::warn!("REDDIT_* credentials missing: read-only public listings, publishing disabled");
        }
        Self::new(user_agent, creds)
    }

    pub fn is_authenticated(&self) -> bool {
        self.creds.is_some()
    }

    async fn bearer(&self) -> Result<Option<String>, String> {
        let Some(creds) = &self.creds else {
            return Ok(None);
        };
        let mut guard = self.token.lock().await;
        if let Some(t) = guard.as_ref() {
            if Instant::now() < t.expires_at {
                return Ok(Some(t.value.clone()));
            }
        }

        #[derive(Deserialize)]
        struct TokenResp {
            access_token: Option<String>,
            #[serde(default)]
            expires_in: u64,
            error: Option<String>,
        }

        let resp = self
            .http
            .post(TOKEN_URL)
            .basic_auth(&creds.client_id, Some(&creds.client_secret))
            .form(&[
                ("grant_type", "password"),
                ("username", creds.username.as_str()),
                ("password", creds.password.as_str()),
            ])
            .send()
            .await
            .map_err(|e| format!("token request: {e}"))?;
        let status = resp.status();
        let body: TokenResp = resp
            .json()
            .await
            .map_err(|e| format!("token response ({status}): {e}"))?;
        let value = match (body.access_token, body.error) {
            (Some(tok), _) => tok,
            (None, Some(err)) => return Err(format!("token denied: {err}")),
            (None, None) => return Err(format!("token missing ({status})")),
        };
        let ttl = Duration::from_secs(body.expires_in).saturating_sub(TOKEN_SLACK);
        *guard = Some(CachedToken {
            value: value.clone(),
            expires_at: Instant::now() + ttl,
        });
        tracing::info!(user = %creds.username, "reddit token refreshed");
        Ok(Some(value))
    }
}

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}
#[derive(Debug, Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<Child>,
}
#[derive(Debug, Deserialize)]
struct Child {
    data: Post,
}
#[derive(Debug, Deserialize)]
struct Post {
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    selftext: String,
    created_utc: f64,
    #[serde(default)]
    score: i64,
    #[serde(default)]
    subreddit: Option<String>,
}

fn unix_to_utc(secs: f64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs as i64, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

/// Parse a `/new` listing body into items, keeping source order.
pub fn parse_listing(channel: &str, body: &str) -> Result<Vec<Item>, FetchError> {
    let listing: Listing =
        serde_json::from_str(body).map_err(|e| FetchError::Decode(e.to_string()))?;
    Ok(listing
        .data
        .children
        .into_iter()
        .map(|c| {
            let p = c.data;
            Item {
                id: p.id,
                title: normalize_text(&p.title),
                body: normalize_text(&p.selftext),
                created_at: unix_to_utc(p.created_utc),
                score: p.score,
                source_channel: p.subreddit.unwrap_or_else(|| channel.to_string()),
            }
        })
        .collect())
}

#[async_trait]
impl SourceClient for RedditClient {
    async fn fetch_recent(&self, channel: &str, limit: u32) -> Result<Vec<Item>, FetchError> {
        let token = self.bearer().await.map_err(FetchError::Unauthorized)?;
        let req = match &token {
            Some(tok) => self
                .http
                .get(format!("{OAUTH_BASE}/r/{channel}/new"))
                .bearer_auth(tok),
            None => self.http.get(format!("{PUBLIC_BASE}/r/{channel}/new.json")),
        };
        let resp = req
            .query(&[("limit", limit.to_string()), ("raw_json", "1".to_string())])
            .send()
            .await
            .map_err(|e| FetchError::Unreachable(e.to_string()))?;

        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(FetchError::Unauthorized(format!("r/{channel}: {status}")));
        }
        if !status.is_success() {
            return Err(FetchError::Status {
                channel: channel.to_string(),
                status: status.as_u16(),
            });
        }
        let body = resp
            .text()
            .await
            .map_err(|e| FetchError::Unreachable(e.to_string()))?;
        parse_listing(channel, &body)
    }

    fn name(&self) -> &'static str {
        "reddit"
    }
}

#[derive(Debug, Deserialize)]
struct CommentResp {
    json: CommentJson,
}
#[derive(Debug, Deserialize)]
struct CommentJson {
    #[serde(default)]
    errors: Vec<serde_json::Value>,
}

#[async_trait]
impl PublishClient for RedditClient {
    async fn publish(&self, item: &Item, text: &str) -> Result<bool, PublishError> {
        let token = self
            .bearer()
            .await
            .map_err(PublishError::Unauthorized)?
            .ok_or_else(|| PublishError::Unauthorized("no reddit credentials".into()))?;

        let thing_id = format!("t3_{}", item.id);
        let resp = self
            .http
            .post(format!("{OAUTH_BASE}/api/comment"))
            .bearer_auth(token)
            .form(&[
                ("api_type", "json"),
                ("thing_id", thing_id.as_str()),
                ("text", text),
            ])
            .send()
            .await
            .map_err(|e| PublishError::Request(e.to_string()))?;

        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(PublishError::Unauthorized(status.to_string()));
        }
        if !status.is_success() {
            return Err(PublishError::Status(status.as_u16()));
        }
        let body: CommentResp = resp
            .json()
            .await
            .map_err(|e| PublishError::Request(e.to_string()))?;
        if !body.json.errors.is_empty() {
            return Err(PublishError::Rejected(
                serde_json::Value::Array(body.json.errors).to_string(),
            ));
        }
        Ok(true)
    }

    fn name(&self) -> &'static str {
        "reddit"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = r#"{
        "kind": "Listing",
        "data": {
            "children": [
                {"kind": "t3", "data": {"id": "abc", "title": "Need help &amp; advice",
                 "selftext": "  multi\n\nline  ", "created_utc": 1700000000.0, "score": 5,
                 "subreddit": "AskReddit"}},
                {"kind": "t3", "data": {"id": "abd", "title": "No body",
                 "created_utc": 1700000100.0, "score": -2}}
            ]
        }
    }"#;

    #[test]
    fn listing_parses_in_order_with_normalized_text() {
        let items = parse_listing("india", LISTING).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id, "abc");
        assert_eq!(items[0].title, "Need help & advice");
        assert_eq!(items[0].body, "multi line");
        assert_eq!(items[0].source_channel, "AskReddit");
        assert_eq!(items[0].created_at.timestamp(), 1_700_000_000);
        assert_eq!(items[1].source_channel, "india");
        assert_eq!(items[1].score, -2);
        assert_eq!(items[1].body, "");
    }

    #[test]
    fn garbage_listing_is_decode_error() {
        assert!(matches!(
            parse_listing("india", "<html>"),
            Err(FetchError::Decode(_))
        ));
    }

    #[tokio::test]
    async fn publish_without_credentials_is_unauthorized() {
        let c = RedditClient::new("test-agent", None).unwrap();
        let item = parse_listing("india", LISTING).unwrap().remove(0);
        assert!(matches!(
            c.publish(&item, "hi").await,
            Err(PublishError::Unauthorized(_))
        ));
    }
}
