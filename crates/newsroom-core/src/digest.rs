use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;

use crate::error::AppError;
use crate::models::Article;
use crate::traits::{DigestSender, NewsStore};

/// Articles published within a time window, newest first.
#[derive(Debug, Clone, Serialize)]
pub struct Digest {
    pub since: DateTime<Utc>,
    pub until: DateTime<Utc>,
    pub articles: Vec<Article>,
}

impl Digest {
    pub fn is_empty(&self) -> bool {
        self.articles.is_empty()
    }
}

/// Collect the most recent `limit` articles published in `[now - window, now]`.
pub async fn build_digest<S: NewsStore>(
    store: &S,
    now: DateTime<Utc>,
    window: TimeDelta,
    limit: usize,
) -> Result<Digest, AppError> {
    let since = now.checked_sub_signed(window).ok_or_else(|| {
        AppError::ConfigError(format!("Digest window of {}h is out of range", window.num_hours()))
    })?;
    let articles = store
        .recent_articles(since, limit)
        .await?
        .into_iter()
        .filter(|a| a.published_at <= now)
        .collect();

    Ok(Digest {
        since,
        until: now,
        articles,
    })
}

/// Sender that writes the digest to the log. Used until a delivery channel
/// is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingDigestSender;

impl DigestSender for TracingDigestSender {
    async fn send(&self, digest: &Digest) -> Result<(), AppError> {
        tracing::info!(
            since = %digest.since,
            until = %digest.until,
            articles = digest.articles.len(),
            "Daily digest"
        );
        for article in &digest.articles {
            tracing::info!(title = %article.title, url = %article.url, "Digest entry");
        }
        Ok(())
    }
}
