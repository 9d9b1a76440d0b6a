use chrono::{DateTime, Utc};
use newsroom_core::error::AppError;
use newsroom_core::models::{Article, NewArticle};
use sqlx::{PgPool, Pool, Postgres};
use uuid::Uuid;

/// Repository for article persistence in PostgreSQL.
///
/// `url` is unique across all sources; inserts rely on that constraint.
#[derive(Clone)]
pub struct ArticleRepository {
    pool: Pool<Postgres>,
}

impl ArticleRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn exists(&self, url: &str) -> Result<bool, AppError> {
        let row: (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM articles WHERE url = $1)")
            .bind(url)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(row.0)
    }

    /// Insert an article. Returns `false` when the URL is already stored.
    pub async fn insert(&self, article: &NewArticle) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            INSERT INTO articles (source_id, title, url, summary, content, author, published_at, content_hash)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (url) DO NOTHING
            "#,
        )
        .bind(article.source_id)
        .bind(&article.title)
        .bind(&article.url)
        .bind(&article.summary)
        .bind(&article.content)
        .bind(&article.author)
        .bind(article.published_at)
        .bind(&article.content_hash)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn count_for_source(&self, source_id: Uuid) -> Result<i64, AppError> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM articles WHERE source_id = $1")
            .bind(source_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(row.0)
    }

    /// Articles published at or after `since`, newest first.
    pub async fn published_since(
        &self,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Article>, AppError> {
        let rows = sqlx::query_as::<_, ArticleRow>(
            r#"
            SELECT id, source_id, title, url, summary, content, author,
                   published_at, fetched_at, content_hash
            FROM articles
            WHERE published_at >= $1
            ORDER BY published_at DESC
            LIMIT $2
            "#,
        )
        .bind(since)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Newest-first page of articles, optionally for a single source.
    pub async fn list(
        &self,
        source_id: Option<Uuid>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Article>, AppError> {
        let rows = sqlx::query_as::<_, ArticleRow>(
            r#"
            SELECT id, source_id, title, url, summary, content, author,
                   published_at, fetched_at, content_hash
            FROM articles
            WHERE ($1::uuid IS NULL OR source_id = $1)
            ORDER BY published_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(source_id)
        .bind(limit as i64)
        .bind(offset as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}

// -- Internal row type for sqlx deserialization --

#[derive(sqlx::FromRow)]
struct ArticleRow {
    id: Uuid,
    source_id: Uuid,
    title: String,
    url: String,
    summary: String,
    content: String,
    author: String,
    published_at: DateTime<Utc>,
    fetched_at: DateTime<Utc>,
    content_hash: String,
}

impl From<ArticleRow> for Article {
    fn from(row: ArticleRow) -> Self {
        Article {
            id: row.id,
            source_id: row.source_id,
            title: row.title,
            url: row.url,
            summary: row.summary,
            content: row.content,
            author: row.author,
            published_at: row.published_at,
            fetched_at: row.fetched_at,
            content_hash: row.content_hash,
        }
    }
}
