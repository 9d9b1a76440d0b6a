use chrono::{DateTime, Utc};
use newsroom_core::error::AppError;
use newsroom_core::models::{SourceDescriptor, SourceRecord};
use sqlx::{PgPool, Pool, Postgres};
use uuid::Uuid;

/// Repository for news sources in PostgreSQL.
#[derive(Clone)]
pub struct SourceRepository {
    pool: Pool<Postgres>,
}

impl SourceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert the source unless its name is taken. Existing rows are left
    /// alone, including `is_active` and the stats columns.
    pub async fn insert_if_absent(&self, source: &SourceDescriptor) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            INSERT INTO sources (name, homepage_url, feed_url, source_type, category)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (name) DO NOTHING
            "#,
        )
        .bind(&source.name)
        .bind(&source.homepage_url)
        .bind(&source.feed_url)
        .bind(source.strategy.source_type())
        .bind(&source.category)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn list_active(&self) -> Result<Vec<SourceRecord>, AppError> {
        let rows = sqlx::query_as::<_, SourceRow>(
            r#"
            SELECT id, name, homepage_url, feed_url, source_type, category, is_active,
                   last_checked_at, article_count, created_at
            FROM sources
            WHERE is_active
            ORDER BY name
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn get_by_name(&self, name: &str) -> Result<Option<SourceRecord>, AppError> {
        let row = sqlx::query_as::<_, SourceRow>(
            r#"
            SELECT id, name, homepage_url, feed_url, source_type, category, is_active,
                   last_checked_at, article_count, created_at
            FROM sources
            WHERE name = $1
            "#,
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(row.map(Into::into))
    }

    pub async fn update_stats(
        &self,
        id: Uuid,
        last_checked_at: DateTime<Utc>,
        article_count: i64,
    ) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE sources
            SET last_checked_at = $2, article_count = $3
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(last_checked_at)
        .bind(article_count)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(AppError::DatabaseError(format!("Source {id} not found")));
        }
        Ok(())
    }

    /// Enable or disable a source by name. Returns whether a row matched.
    pub async fn set_active(&self, name: &str, active: bool) -> Result<bool, AppError> {
        let result = sqlx::query("UPDATE sources SET is_active = $2 WHERE name = $1")
            .bind(name)
            .bind(active)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }
}

// -- Internal row type for sqlx deserialization --

#[derive(sqlx::FromRow)]
struct SourceRow {
    id: Uuid,
    name: String,
    homepage_url: String,
    feed_url: Option<String>,
    source_type: String,
    category: String,
    is_active: bool,
    last_checked_at: Option<DateTime<Utc>>,
    article_count: i64,
    created_at: DateTime<Utc>,
}

impl From<SourceRow> for SourceRecord {
    fn from(row: SourceRow) -> Self {
        SourceRecord {
            id: row.id,
            name: row.name,
            homepage_url: row.homepage_url,
            feed_url: row.feed_url,
            source_type: row.source_type,
            category: row.category,
            is_active: row.is_active,
            last_checked_at: row.last_checked_at,
            article_count: row.article_count,
            created_at: row.created_at,
        }
    }
}
