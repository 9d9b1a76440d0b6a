//! Test utilities: mock implementations of all core traits.
//!
//! Handwritten mocks for dependency injection in unit tests.
//! All mocks use `Arc<Mutex<_>>` for interior mutability, allowing
//! test assertions on recorded calls.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::collector::{CollectorEvent, CollectorReporter};
use crate::digest::Digest;
use crate::error::AppError;
use crate::models::{
    Article, FetchStrategy, NewArticle, RawArticle, SourceDescriptor, SourceRecord,
};
use crate::traits::{DigestSender, Fetcher, NewsStore};

/// Rebuild an error so a configured failure can be returned more than once.
fn replay(error: &AppError) -> AppError {
    match error {
        AppError::HttpError(m) => AppError::HttpError(m.clone()),
        AppError::NetworkError(m) => AppError::NetworkError(m.clone()),
        AppError::Timeout(s) => AppError::Timeout(*s),
        AppError::FeedParseError(m) => AppError::FeedParseError(m.clone()),
        AppError::DatabaseError(m) => AppError::DatabaseError(m.clone()),
        AppError::SeedError(m) => AppError::SeedError(m.clone()),
        AppError::ConfigError(m) => AppError::ConfigError(m.clone()),
        AppError::Cancelled => AppError::Cancelled,
        other => AppError::Generic(other.to_string()),
    }
}

/// A feed entry with the given URL and plausible defaults for everything else.
pub fn make_raw_article(url: &str) -> RawArticle {
    RawArticle {
        title: format!("Story at {url}"),
        url: url.to_string(),
        summary: "Summary".to_string(),
        author: "Staff".to_string(),
        published_at: Utc::now(),
        content: String::new(),
    }
}

// ---------------------------------------------------------------------------
// MockFetcher
// ---------------------------------------------------------------------------

enum Scripted {
    Articles(Vec<RawArticle>),
    Error(AppError),
}

#[derive(Default)]
struct FetcherState {
    responses: HashMap<String, Scripted>,
    delays: HashMap<String, Duration>,
    calls: Vec<String>,
}

/// Mock fetcher with a fixed response per source name.
///
/// Responses are replayed on every call; unknown sources yield no articles.
#[derive(Clone, Default)]
pub struct MockFetcher {
    state: Arc<Mutex<FetcherState>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_articles(self, source: &str, articles: Vec<RawArticle>) -> Self {
        self.state
            .lock()
            .unwrap()
            .responses
            .insert(source.to_string(), Scripted::Articles(articles));
        self
    }

    pub fn with_error(self, source: &str, error: AppError) -> Self {
        self.state
            .lock()
            .unwrap()
            .responses
            .insert(source.to_string(), Scripted::Error(error));
        self
    }

    /// Sleep before answering for `source`.
    pub fn with_delay(self, source: &str, delay: Duration) -> Self {
        self.state
            .lock()
            .unwrap()
            .delays
            .insert(source.to_string(), delay);
        self
    }

    /// Source names fetched so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }
}

impl Fetcher for MockFetcher {
    async fn fetch(&self, source: &SourceDescriptor) -> Result<Vec<RawArticle>, AppError> {
        let delay = {
            let mut state = self.state.lock().unwrap();
            state.calls.push(source.name.clone());
            state.delays.get(&source.name).copied()
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let state = self.state.lock().unwrap();
        match state.responses.get(&source.name) {
            Some(Scripted::Articles(articles)) => Ok(articles.clone()),
            Some(Scripted::Error(error)) => Err(replay(error)),
            None => Ok(Vec::new()),
        }
    }
}

// ---------------------------------------------------------------------------
// MockStore
// ---------------------------------------------------------------------------

#[derive(Default)]
struct StoreState {
    sources: Vec<SourceRecord>,
    articles: Vec<Article>,
    seed_error: Option<AppError>,
    failing_inserts: HashSet<String>,
    failing_stats: HashSet<String>,
    lock_held_elsewhere: bool,
    lock_taken: bool,
}

/// In-memory store keyed like the real schema: unique source names,
/// unique article URLs.
#[derive(Clone, Default)]
pub struct MockStore {
    state: Arc<Mutex<StoreState>>,
}

impl MockStore {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Every source upsert fails with `error`.
    pub fn with_seed_error(error: AppError) -> Self {
        let store = Self::default();
        store.state.lock().unwrap().seed_error = Some(error);
        store
    }

    /// Inserting the article with this URL fails.
    pub fn fail_insert_for(self, url: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .failing_inserts
            .insert(url.to_string());
        self
    }

    /// Updating stats for this source name fails.
    pub fn fail_stats_for(self, source: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .failing_stats
            .insert(source.to_string());
        self
    }

    /// Another process owns the collection lock.
    pub fn with_collection_lock_held(self) -> Self {
        self.state.lock().unwrap().lock_held_elsewhere = true;
        self
    }

    pub fn collection_locked(&self) -> bool {
        self.state.lock().unwrap().lock_taken
    }

    pub fn source_count(&self) -> usize {
        self.state.lock().unwrap().sources.len()
    }

    pub fn source(&self, name: &str) -> Option<SourceRecord> {
        self.state
            .lock()
            .unwrap()
            .sources
            .iter()
            .find(|s| s.name == name)
            .cloned()
    }

    pub fn source_id(&self, name: &str) -> Option<Uuid> {
        self.source(name).map(|s| s.id)
    }

    pub fn deactivate(&self, name: &str) {
        let mut state = self.state.lock().unwrap();
        if let Some(source) = state.sources.iter_mut().find(|s| s.name == name) {
            source.is_active = false;
        }
    }

    /// Pre-populate an article as if an earlier cycle stored it.
    pub fn insert_existing(&self, source_id: Uuid, url: &str) {
        self.insert_existing_at(source_id, url, Utc::now());
    }

    pub fn insert_existing_at(&self, source_id: Uuid, url: &str, published_at: DateTime<Utc>) {
        let mut raw = make_raw_article(url);
        raw.published_at = published_at;
        let article = to_article(&NewArticle::from_raw(source_id, raw));
        self.state.lock().unwrap().articles.push(article);
    }

    pub fn article_count(&self) -> usize {
        self.state.lock().unwrap().articles.len()
    }

    pub fn has_article(&self, url: &str) -> bool {
        self.state
            .lock()
            .unwrap()
            .articles
            .iter()
            .any(|a| a.url == url)
    }
}

fn to_article(new: &NewArticle) -> Article {
    Article {
        id: Uuid::new_v4(),
        source_id: new.source_id,
        title: new.title.clone(),
        url: new.url.clone(),
        summary: new.summary.clone(),
        content: new.content.clone(),
        author: new.author.clone(),
        published_at: new.published_at,
        fetched_at: Utc::now(),
        content_hash: new.content_hash.clone(),
    }
}

impl NewsStore for MockStore {
    async fn upsert_source_if_absent(&self, source: &SourceDescriptor) -> Result<bool, AppError> {
        let mut state = self.state.lock().unwrap();
        if let Some(error) = &state.seed_error {
            return Err(replay(error));
        }
        if state.sources.iter().any(|s| s.name == source.name) {
            return Ok(false);
        }
        state.sources.push(SourceRecord {
            id: Uuid::new_v4(),
            name: source.name.clone(),
            homepage_url: source.homepage_url.clone(),
            feed_url: source.feed_url.clone(),
            source_type: source.strategy.source_type().to_string(),
            category: source.category.clone(),
            is_active: true,
            last_checked_at: None,
            article_count: 0,
            created_at: Utc::now(),
        });
        Ok(true)
    }

    async fn get_active_sources(&self) -> Result<Vec<SourceRecord>, AppError> {
        let state = self.state.lock().unwrap();
        Ok(state.sources.iter().filter(|s| s.is_active).cloned().collect())
    }

    async fn article_exists(&self, url: &str) -> Result<bool, AppError> {
        Ok(self.has_article(url))
    }

    async fn insert_article(&self, article: &NewArticle) -> Result<bool, AppError> {
        let mut state = self.state.lock().unwrap();
        if state.failing_inserts.contains(&article.url) {
            return Err(AppError::DatabaseError(format!(
                "insert failed for {}",
                article.url
            )));
        }
        if state.articles.iter().any(|a| a.url == article.url) {
            return Ok(false);
        }
        state.articles.push(to_article(article));
        Ok(true)
    }

    async fn count_articles_for(&self, source_id: Uuid) -> Result<i64, AppError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .articles
            .iter()
            .filter(|a| a.source_id == source_id)
            .count() as i64)
    }

    async fn update_source_stats(
        &self,
        source_id: Uuid,
        last_checked_at: DateTime<Utc>,
        article_count: i64,
    ) -> Result<(), AppError> {
        let mut state = self.state.lock().unwrap();
        let StoreState {
            sources,
            failing_stats,
            ..
        } = &mut *state;
        let source = sources
            .iter_mut()
            .find(|s| s.id == source_id)
            .ok_or_else(|| AppError::DatabaseError(format!("no source {source_id}")))?;
        if failing_stats.contains(&source.name) {
            return Err(AppError::DatabaseError(format!(
                "stats update failed for {}",
                source.name
            )));
        }
        source.last_checked_at = Some(last_checked_at);
        source.article_count = article_count;
        Ok(())
    }

    async fn recent_articles(
        &self,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Article>, AppError> {
        let state = self.state.lock().unwrap();
        let mut recent: Vec<Article> = state
            .articles
            .iter()
            .filter(|a| a.published_at >= since)
            .cloned()
            .collect();
        recent.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        recent.truncate(limit);
        Ok(recent)
    }

    async fn try_lock_collection(&self) -> Result<bool, AppError> {
        let mut state = self.state.lock().unwrap();
        if state.lock_held_elsewhere {
            return Ok(false);
        }
        state.lock_taken = true;
        Ok(true)
    }

    async fn unlock_collection(&self) -> Result<(), AppError> {
        self.state.lock().unwrap().lock_taken = false;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MockDigestSender
// ---------------------------------------------------------------------------

/// Digest sender that records what it was asked to send.
#[derive(Clone, Default)]
pub struct MockDigestSender {
    sent: Arc<Mutex<Vec<Digest>>>,
    error: Arc<Mutex<Option<AppError>>>,
}

impl MockDigestSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_error(error: AppError) -> Self {
        Self {
            sent: Arc::default(),
            error: Arc::new(Mutex::new(Some(error))),
        }
    }

    pub fn sent(&self) -> Vec<Digest> {
        self.sent.lock().unwrap().clone()
    }
}

impl DigestSender for MockDigestSender {
    async fn send(&self, digest: &Digest) -> Result<(), AppError> {
        if let Some(error) = self.error.lock().unwrap().as_ref() {
            return Err(replay(error));
        }
        self.sent.lock().unwrap().push(digest.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MockReporter
// ---------------------------------------------------------------------------

/// Reporter that records event names in order.
#[derive(Clone, Default)]
pub struct MockReporter {
    events: Arc<Mutex<Vec<String>>>,
}

impl MockReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl CollectorReporter for MockReporter {
    fn report(&self, event: CollectorEvent<'_>) {
        let name = match event {
            CollectorEvent::CycleStarted { .. } => "CycleStarted",
            CollectorEvent::SourceSkipped { .. } => "SourceSkipped",
            CollectorEvent::SourceCollected { .. } => "SourceCollected",
            CollectorEvent::SourceFailed { .. } => "SourceFailed",
            CollectorEvent::CycleFinished { .. } => "CycleFinished",
            CollectorEvent::CycleCancelled => "CycleCancelled",
        };
        self.events.lock().unwrap().push(name.to_string());
    }
}

/// A feed-backed descriptor pointing at `https://{host}`.
pub fn feed_source(name: &str, host: &str) -> SourceDescriptor {
    SourceDescriptor {
        name: name.to_string(),
        homepage_url: format!("https://{host}"),
        feed_url: Some(format!("https://{host}/feed")),
        category: "AI".to_string(),
        strategy: FetchStrategy::Feed,
    }
}
