use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use newsroom_core::models::{Article, RunReport, SourceRecord};

pub const DEFAULT_PAGE_SIZE: usize = 20;
pub const MAX_PAGE_SIZE: usize = 100;
pub const DEFAULT_TOP_HOURS: i64 = 24;
pub const MAX_TOP_HOURS: i64 = 168;
pub const DEFAULT_TOP_LIMIT: usize = 10;
pub const MAX_TOP_LIMIT: usize = 50;

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct SourceResponse {
    pub id: Uuid,
    pub name: String,
    pub homepage_url: String,
    pub feed_url: Option<String>,
    pub source_type: String,
    pub category: String,
    pub last_checked_at: Option<DateTime<Utc>>,
    pub article_count: i64,
}

impl From<SourceRecord> for SourceResponse {
    fn from(s: SourceRecord) -> Self {
        Self {
            id: s.id,
            name: s.name,
            homepage_url: s.homepage_url,
            feed_url: s.feed_url,
            source_type: s.source_type,
            category: s.category,
            last_checked_at: s.last_checked_at,
            article_count: s.article_count,
        }
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct SourceListResponse {
    pub sources: Vec<SourceResponse>,
    pub total: usize,
}

// ---------------------------------------------------------------------------
// Articles
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct ListArticlesQuery {
    /// Only articles from this source
    pub source_id: Option<Uuid>,
    /// Page size (default 20, max 100)
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl ListArticlesQuery {
    pub fn page(&self) -> (usize, usize) {
        let limit = self
            .limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);
        (limit, self.offset.unwrap_or(0))
    }
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct TopArticlesQuery {
    /// Look-back window in hours (default 24, max 168)
    pub hours: Option<i64>,
    /// Number of articles (default 10, max 50)
    pub limit: Option<usize>,
}

impl TopArticlesQuery {
    pub fn window(&self) -> (i64, usize) {
        let hours = self.hours.unwrap_or(DEFAULT_TOP_HOURS).clamp(1, MAX_TOP_HOURS);
        let limit = self.limit.unwrap_or(DEFAULT_TOP_LIMIT).clamp(1, MAX_TOP_LIMIT);
        (hours, limit)
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ArticleResponse {
    pub id: Uuid,
    pub source_id: Uuid,
    pub title: String,
    pub url: String,
    pub summary: String,
    pub author: String,
    pub published_at: DateTime<Utc>,
    pub fetched_at: DateTime<Utc>,
}

impl From<Article> for ArticleResponse {
    fn from(a: Article) -> Self {
        Self {
            id: a.id,
            source_id: a.source_id,
            title: a.title,
            url: a.url,
            summary: a.summary,
            author: a.author,
            published_at: a.published_at,
            fetched_at: a.fetched_at,
        }
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ArticleListResponse {
    pub articles: Vec<ArticleResponse>,
    pub total: usize,
}

impl From<Vec<Article>> for ArticleListResponse {
    fn from(articles: Vec<Article>) -> Self {
        let total = articles.len();
        Self {
            articles: articles.into_iter().map(ArticleResponse::from).collect(),
            total,
        }
    }
}

// ---------------------------------------------------------------------------
// Collection
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct SourceErrorResponse {
    pub source_name: String,
    pub message: String,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct SourceOutcomeResponse {
    pub name: String,
    pub found: usize,
    pub new: usize,
    pub error: Option<String>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct RunReportResponse {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub total_found: usize,
    pub total_new: usize,
    pub errors: Vec<SourceErrorResponse>,
    pub sources: Vec<SourceOutcomeResponse>,
}

impl From<RunReport> for RunReportResponse {
    fn from(r: RunReport) -> Self {
        Self {
            started_at: r.started_at,
            finished_at: r.finished_at,
            total_found: r.total_found,
            total_new: r.total_new,
            errors: r
                .errors
                .into_iter()
                .map(|e| SourceErrorResponse {
                    source_name: e.source_name,
                    message: e.message,
                })
                .collect(),
            sources: r
                .sources
                .into_iter()
                .map(|s| SourceOutcomeResponse {
                    name: s.name,
                    found: s.found,
                    new: s.new,
                    error: s.error,
                })
                .collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: &'static str,
    /// `idle` or `running`
    pub collector: &'static str,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}
