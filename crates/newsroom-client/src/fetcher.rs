use std::time::Duration;

use chrono::Utc;
use newsroom_core::error::AppError;
use newsroom_core::models::{FetchStrategy, RawArticle, SourceDescriptor};
use newsroom_core::traits::Fetcher;
use reqwest::Client;
use url::Url;

use crate::feed::parse_feed;

const USER_AGENT: &str = concat!("Newsroom/", env!("CARGO_PKG_VERSION"));

/// HTTP feed fetcher using reqwest.
///
/// Downloads the feed document and parses it on the blocking pool.
#[derive(Clone)]
pub struct FeedFetcher {
    client: Client,
    timeout_secs: u64,
}

impl FeedFetcher {
    pub fn new() -> Result<Self, AppError> {
        Self::with_timeout(Duration::from_secs(30))
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, AppError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::HttpError(e.to_string()))?;

        Ok(Self {
            client,
            timeout_secs: timeout.as_secs(),
        })
    }

    /// Fetch and parse the feed at `url`.
    pub async fn fetch_feed(&self, url: &str) -> Result<Vec<RawArticle>, AppError> {
        let url = validate_url(url)?;

        let response = self.client.get(url.clone()).send().await.map_err(|e| {
            if e.is_timeout() {
                AppError::Timeout(self.timeout_secs)
            } else if e.is_connect() {
                AppError::NetworkError(format!("Connection failed: {e}"))
            } else {
                AppError::HttpError(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::HttpError(format!(
                "HTTP {} for {}",
                status.as_u16(),
                url
            )));
        }

        let body = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                AppError::Timeout(self.timeout_secs)
            } else {
                AppError::NetworkError(format!("Failed to read response body: {e}"))
            }
        })?;

        let now = Utc::now();
        tokio::task::spawn_blocking(move || parse_feed(&body, now))
            .await
            .map_err(|e| AppError::Generic(format!("Feed parser task failed: {e}")))?
    }
}

/// Only absolute `http`/`https` URLs are fetched.
fn validate_url(url: &str) -> Result<Url, AppError> {
    let parsed =
        Url::parse(url.trim()).map_err(|e| AppError::HttpError(format!("Invalid URL: {e}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        scheme => Err(AppError::HttpError(format!(
            "URL scheme '{scheme}' is not allowed (only http/https)"
        ))),
    }
}

/// Fetcher for sources without a structured feed. Always yields nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct StubFetcher;

impl Fetcher for StubFetcher {
    async fn fetch(&self, source: &SourceDescriptor) -> Result<Vec<RawArticle>, AppError> {
        tracing::debug!(source = %source.name, "No feed for source, nothing to fetch");
        Ok(Vec::new())
    }
}

/// Dispatches on [`SourceDescriptor::strategy`].
#[derive(Clone)]
pub struct SourceFetcher {
    feed: FeedFetcher,
    stub: StubFetcher,
}

impl SourceFetcher {
    pub fn new(feed: FeedFetcher) -> Self {
        Self {
            feed,
            stub: StubFetcher,
        }
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, AppError> {
        Ok(Self::new(FeedFetcher::with_timeout(timeout)?))
    }
}

impl Fetcher for SourceFetcher {
    async fn fetch(&self, source: &SourceDescriptor) -> Result<Vec<RawArticle>, AppError> {
        match source.strategy {
            FetchStrategy::Feed => {
                let feed_url = source.feed_url.as_deref().ok_or_else(|| {
                    AppError::ConfigError(format!("{} has no feed URL", source.name))
                })?;
                let articles = self.feed.fetch_feed(feed_url).await?;
                tracing::debug!(source = %source.name, entries = articles.len(), "Feed parsed");
                Ok(articles)
            }
            FetchStrategy::Stub => self.stub.fetch(source).await,
        }
    }
}
