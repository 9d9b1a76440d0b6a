use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::util::truncate_chars;

/// Maximum persisted title length, in characters.
pub const MAX_TITLE_CHARS: usize = 500;

/// Maximum persisted summary length, in characters.
pub const MAX_SUMMARY_CHARS: usize = 2000;

/// How articles are obtained for a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchStrategy {
    /// Structured RSS/Atom feed.
    Feed,
    /// Placeholder for scraping-only sources; always yields nothing.
    Stub,
}

impl FetchStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            FetchStrategy::Feed => "feed",
            FetchStrategy::Stub => "stub",
        }
    }

    /// Value stored in `sources.source_type`.
    pub fn source_type(&self) -> &'static str {
        match self {
            FetchStrategy::Feed => "rss",
            FetchStrategy::Stub => "scrape",
        }
    }
}

impl fmt::Display for FetchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for FetchStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "feed" | "rss" => Ok(FetchStrategy::Feed),
            "stub" | "scrape" => Ok(FetchStrategy::Stub),
            _ => Err(format!("Unknown fetch strategy: {}", s)),
        }
    }
}

/// Static configuration of a news source. The registry owns these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    /// Unique, stable identity of the source.
    pub name: String,
    pub homepage_url: String,
    pub feed_url: Option<String>,
    pub category: String,
    pub strategy: FetchStrategy,
}

impl SourceDescriptor {
    /// A source backed by an RSS/Atom feed.
    pub fn feed(
        name: impl Into<String>,
        homepage_url: impl Into<String>,
        feed_url: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            homepage_url: homepage_url.into(),
            feed_url: Some(feed_url.into()),
            category: "AI".to_string(),
            strategy: FetchStrategy::Feed,
        }
    }

    /// A source without a structured feed.
    pub fn stub(name: impl Into<String>, homepage_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            homepage_url: homepage_url.into(),
            feed_url: None,
            category: "AI".to_string(),
            strategy: FetchStrategy::Stub,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }
}

/// A source as persisted in the store, with mutable bookkeeping.
#[derive(Debug, Clone, Serialize)]
pub struct SourceRecord {
    pub id: Uuid,
    pub name: String,
    pub homepage_url: String,
    pub feed_url: Option<String>,
    pub source_type: String,
    pub category: String,
    pub is_active: bool,
    pub last_checked_at: Option<DateTime<Utc>>,
    /// Cached count of articles owned by this source, recomputed every cycle.
    pub article_count: i64,
    pub created_at: DateTime<Utc>,
}

/// Fetcher output: one normalized feed entry, not yet persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawArticle {
    pub title: String,
    /// Natural key across the whole system.
    pub url: String,
    pub summary: String,
    pub author: String,
    pub published_at: DateTime<Utc>,
    pub content: String,
}

/// DTO for inserting a new article into the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewArticle {
    pub source_id: Uuid,
    pub title: String,
    pub url: String,
    pub summary: String,
    pub content: String,
    pub author: String,
    pub published_at: DateTime<Utc>,
    pub content_hash: String,
}

impl NewArticle {
    /// Build the insert DTO for `raw` owned by `source_id`.
    ///
    /// Empty content falls back to the summary; the content hash is taken over
    /// whichever of the two ends up stored.
    pub fn from_raw(source_id: Uuid, raw: RawArticle) -> Self {
        let content = if raw.content.is_empty() {
            raw.summary.clone()
        } else {
            raw.content
        };
        let content_hash = compute_hash(&content);

        Self {
            source_id,
            title: truncate_chars(&raw.title, MAX_TITLE_CHARS),
            url: raw.url.trim().to_string(),
            summary: truncate_chars(&raw.summary, MAX_SUMMARY_CHARS),
            content,
            author: raw.author,
            published_at: raw.published_at,
            content_hash,
        }
    }
}

/// A persisted article.
#[derive(Debug, Clone, Serialize)]
pub struct Article {
    pub id: Uuid,
    pub source_id: Uuid,
    pub title: String,
    pub url: String,
    pub summary: String,
    pub content: String,
    pub author: String,
    pub published_at: DateTime<Utc>,
    pub fetched_at: DateTime<Utc>,
    /// SHA-256 of the stored content. Kept for future content-level dedup.
    pub content_hash: String,
}

/// A failure recorded against one source during a cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceError {
    pub source_name: String,
    pub message: String,
}

/// Per-source line of a [`RunReport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceOutcome {
    pub name: String,
    pub found: usize,
    pub new: usize,
    pub error: Option<String>,
}

impl SourceOutcome {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            found: 0,
            new: 0,
            error: None,
        }
    }
}

/// Summary of one collection cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Articles fetched across sources, after the per-source cap, before dedup.
    pub total_found: usize,
    /// Articles actually inserted.
    pub total_new: usize,
    /// Failures in source processing order.
    pub errors: Vec<SourceError>,
    pub sources: Vec<SourceOutcome>,
}

impl RunReport {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            finished_at: started_at,
            total_found: 0,
            total_new: 0,
            errors: Vec::new(),
            sources: Vec::new(),
        }
    }

    /// Fold one processed source into the totals.
    pub fn record(&mut self, outcome: SourceOutcome) {
        self.total_found += outcome.found;
        self.total_new += outcome.new;
        if let Some(message) = &outcome.error {
            self.errors.push(SourceError {
                source_name: outcome.name.clone(),
                message: message.clone(),
            });
        }
        self.sources.push(outcome);
    }

    pub fn finish(mut self, finished_at: DateTime<Utc>) -> Self {
        self.finished_at = finished_at;
        self
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Compute a SHA-256 hash of a string, returned as 64-char hex.
pub fn compute_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}
