use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::digest::Digest;
use crate::error::AppError;
use crate::models::{Article, NewArticle, RawArticle, SourceDescriptor, SourceRecord};

/// Retrieves the current entries of one source.
///
/// Implementations report transport and parse problems as [`AppError`]
/// fetch errors; callers treat every result as possibly partial or empty.
pub trait Fetcher: Send + Sync + Clone {
    fn fetch(
        &self,
        source: &SourceDescriptor,
    ) -> impl Future<Output = Result<Vec<RawArticle>, AppError>> + Send;
}

/// Durable storage for sources and articles.
///
/// Every method is atomic on its own: one source upsert, one article insert
/// or one stats update.
pub trait NewsStore: Send + Sync + Clone {
    /// Insert a source unless one with the same name exists.
    /// Returns `true` if a record was created.
    fn upsert_source_if_absent(
        &self,
        source: &SourceDescriptor,
    ) -> impl Future<Output = Result<bool, AppError>> + Send;

    fn get_active_sources(&self) -> impl Future<Output = Result<Vec<SourceRecord>, AppError>> + Send;

    /// Whether an article with this URL exists, for any source.
    fn article_exists(&self, url: &str) -> impl Future<Output = Result<bool, AppError>> + Send;

    /// Insert an article. Returns `false` (and changes nothing) when the URL
    /// is already present.
    fn insert_article(
        &self,
        article: &NewArticle,
    ) -> impl Future<Output = Result<bool, AppError>> + Send;

    fn count_articles_for(
        &self,
        source_id: Uuid,
    ) -> impl Future<Output = Result<i64, AppError>> + Send;

    fn update_source_stats(
        &self,
        source_id: Uuid,
        last_checked_at: DateTime<Utc>,
        article_count: i64,
    ) -> impl Future<Output = Result<(), AppError>> + Send;

    /// Articles published at or after `since`, newest first.
    fn recent_articles(
        &self,
        since: DateTime<Utc>,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<Article>, AppError>> + Send;

    /// Take the collection lock shared by every process using this storage.
    /// Returns `false` when another holder has it. Re-entrant for the holder.
    ///
    /// Stores without cross-process visibility always succeed.
    fn try_lock_collection(&self) -> impl Future<Output = Result<bool, AppError>> + Send {
        async { Ok(true) }
    }

    /// Release the lock taken by [`try_lock_collection`](Self::try_lock_collection).
    fn unlock_collection(&self) -> impl Future<Output = Result<(), AppError>> + Send {
        async { Ok(()) }
    }
}

/// Delivers a digest of recently collected articles to some channel.
pub trait DigestSender: Send + Sync {
    fn send(&self, digest: &Digest) -> impl Future<Output = Result<(), AppError>> + Send;
}
