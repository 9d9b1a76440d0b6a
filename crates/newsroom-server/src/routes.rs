use std::sync::Arc;

use axum::Router;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use chrono::{TimeDelta, Utc};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use newsroom_core::{NewsStore, SchedulerState, TriggerOutcome};

use crate::dto::{
    ArticleListResponse, ErrorResponse, HealthResponse, ListArticlesQuery, RunReportResponse,
    SourceListResponse, SourceResponse, TopArticlesQuery,
};
use crate::error::ApiError;
use crate::openapi::ApiDoc;
use crate::state::AppState;

/// Build the full router with all routes.
pub fn router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/v1/sources", get(list_sources))
        .route("/v1/articles", get(list_articles))
        .route("/v1/articles/top", get(top_articles))
        .route("/v1/collect", post(collect));

    let public = Router::new()
        .route("/health", get(health))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    public.merge(api).with_state(state)
}

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/v1/sources",
    responses(
        (status = 200, description = "Active sources with collection stats", body = SourceListResponse),
    ),
    tag = "sources"
)]
pub async fn list_sources(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let sources = state.db.source_repo().list_active().await?;
    let total = sources.len();

    Ok(axum::Json(SourceListResponse {
        sources: sources.into_iter().map(SourceResponse::from).collect(),
        total,
    }))
}

// ---------------------------------------------------------------------------
// Articles
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/v1/articles",
    params(ListArticlesQuery),
    responses(
        (status = 200, description = "Articles, newest first", body = ArticleListResponse),
    ),
    tag = "articles"
)]
pub async fn list_articles(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListArticlesQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let (limit, offset) = query.page();
    let articles = state
        .db
        .article_repo()
        .list(query.source_id, limit, offset)
        .await?;

    Ok(axum::Json(ArticleListResponse::from(articles)))
}

#[utoipa::path(
    get,
    path = "/v1/articles/top",
    params(TopArticlesQuery),
    responses(
        (status = 200, description = "Most recent articles within the window", body = ArticleListResponse),
    ),
    tag = "articles"
)]
pub async fn top_articles(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TopArticlesQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let (hours, limit) = query.window();
    let since = Utc::now() - TimeDelta::hours(hours);
    let articles = state.db.store().recent_articles(since, limit).await?;

    Ok(axum::Json(ArticleListResponse::from(articles)))
}

// ---------------------------------------------------------------------------
// Collection
// ---------------------------------------------------------------------------

#[utoipa::path(
    post,
    path = "/v1/collect",
    responses(
        (status = 200, description = "Cycle completed", body = RunReportResponse),
        (status = 409, description = "A cycle is already running", body = ErrorResponse),
        (status = 500, description = "Cycle aborted", body = ErrorResponse),
    ),
    tag = "collection"
)]
pub async fn collect(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    match state.scheduler.trigger_detached().await? {
        TriggerOutcome::Completed(report) => {
            Ok((StatusCode::OK, axum::Json(RunReportResponse::from(report))).into_response())
        }
        TriggerOutcome::AlreadyRunning => {
            let body = ErrorResponse {
                error: "already_running".to_string(),
                message: "A collection cycle is already running".to_string(),
            };
            Ok((StatusCode::CONFLICT, axum::Json(body)).into_response())
        }
    }
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
        (status = 503, description = "Service is unhealthy", body = HealthResponse),
    ),
    tag = "system"
)]
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let healthy = state.db.health_check().await.is_ok();

    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = HealthResponse {
        status: if healthy { "healthy" } else { "unhealthy" },
        database: if healthy { "ok" } else { "error" },
        collector: match state.scheduler.state() {
            SchedulerState::Idle => "idle",
            SchedulerState::Running => "running",
        },
    };

    (status, axum::Json(response))
}
