use std::sync::Arc;

use chrono::{DateTime, Utc};
use newsroom_core::error::AppError;
use newsroom_core::models::{Article, NewArticle, SourceDescriptor, SourceRecord};
use newsroom_core::traits::NewsStore;
use sqlx::PgPool;
use sqlx::pool::PoolConnection;
use sqlx::postgres::Postgres;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::article_repository::ArticleRepository;
use crate::source_repository::SourceRepository;

/// Advisory lock key serialising collection cycles across processes.
const COLLECTION_LOCK_KEY: i64 = 0x6e65_7773_726f_6f6d;

/// [`NewsStore`] over the PostgreSQL repositories.
#[derive(Clone)]
pub struct PgNewsStore {
    pool: PgPool,
    sources: SourceRepository,
    articles: ArticleRepository,
    /// Session holding the collection advisory lock, while held.
    lock_session: Arc<Mutex<Option<PoolConnection<Postgres>>>>,
}

impl PgNewsStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            sources: SourceRepository::new(pool.clone()),
            articles: ArticleRepository::new(pool.clone()),
            pool,
            lock_session: Arc::new(Mutex::new(None)),
        }
    }

    pub fn sources(&self) -> &SourceRepository {
        &self.sources
    }

    pub fn articles(&self) -> &ArticleRepository {
        &self.articles
    }
}

impl NewsStore for PgNewsStore {
    async fn upsert_source_if_absent(&self, source: &SourceDescriptor) -> Result<bool, AppError> {
        self.sources.insert_if_absent(source).await
    }

    async fn get_active_sources(&self) -> Result<Vec<SourceRecord>, AppError> {
        self.sources.list_active().await
    }

    async fn article_exists(&self, url: &str) -> Result<bool, AppError> {
        self.articles.exists(url).await
    }

    async fn insert_article(&self, article: &NewArticle) -> Result<bool, AppError> {
        self.articles.insert(article).await
    }

    async fn count_articles_for(&self, source_id: Uuid) -> Result<i64, AppError> {
        self.articles.count_for_source(source_id).await
    }

    async fn update_source_stats(
        &self,
        source_id: Uuid,
        last_checked_at: DateTime<Utc>,
        article_count: i64,
    ) -> Result<(), AppError> {
        self.sources
            .update_stats(source_id, last_checked_at, article_count)
            .await
    }

    async fn recent_articles(
        &self,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Article>, AppError> {
        self.articles.published_since(since, limit).await
    }

    async fn try_lock_collection(&self) -> Result<bool, AppError> {
        let mut session = self.lock_session.lock().await;
        if session.is_some() {
            return Ok(true);
        }

        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;
        let (acquired,): (bool,) = sqlx::query_as("SELECT pg_try_advisory_lock($1)")
            .bind(COLLECTION_LOCK_KEY)
            .fetch_one(&mut *conn)
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        if acquired {
            *session = Some(conn);
        }
        Ok(acquired)
    }

    async fn unlock_collection(&self) -> Result<(), AppError> {
        let Some(mut conn) = self.lock_session.lock().await.take() else {
            return Ok(());
        };

        let unlocked = sqlx::query("SELECT pg_advisory_unlock($1)")
            .bind(COLLECTION_LOCK_KEY)
            .execute(&mut *conn)
            .await;
        if let Err(e) = unlocked {
            // Closing the session drops the lock with it.
            drop(conn.detach());
            return Err(AppError::DatabaseError(e.to_string()));
        }
        Ok(())
    }
}
