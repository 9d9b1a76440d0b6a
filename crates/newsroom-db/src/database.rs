use newsroom_core::AppError;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use crate::article_repository::ArticleRepository;
use crate::config::DatabaseConfig;
use crate::source_repository::SourceRepository;
use crate::store::PgNewsStore;

/// Central database facade: owns the connection pool, runs migrations,
/// and vends repository instances.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Connect to PostgreSQL with the given configuration.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, AppError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.url)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to connect: {e}")))?;

        Ok(Self { pool })
    }

    /// Create a `Database` from an existing pool (useful for testing).
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run all pending migrations.
    pub async fn migrate(&self) -> Result<(), AppError> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Migration failed: {e}")))?;
        tracing::info!("Database migrations applied");
        Ok(())
    }

    /// The [`NewsStore`](newsroom_core::NewsStore) used by the collector.
    pub fn store(&self) -> PgNewsStore {
        PgNewsStore::new(self.pool.clone())
    }

    pub fn source_repo(&self) -> SourceRepository {
        SourceRepository::new(self.pool.clone())
    }

    pub fn article_repo(&self) -> ArticleRepository {
        ArticleRepository::new(self.pool.clone())
    }

    /// Check database connectivity.
    pub async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;
        Ok(())
    }

    /// Get a reference to the underlying pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}
