use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Newsroom API",
        version = "0.1.0",
        description = "News collection with cross-source URL deduplication."
    ),
    paths(
        crate::routes::list_sources,
        crate::routes::list_articles,
        crate::routes::top_articles,
        crate::routes::collect,
        crate::routes::health,
    ),
    components(schemas(
        crate::dto::SourceResponse,
        crate::dto::SourceListResponse,
        crate::dto::ArticleResponse,
        crate::dto::ArticleListResponse,
        crate::dto::SourceErrorResponse,
        crate::dto::SourceOutcomeResponse,
        crate::dto::RunReportResponse,
        crate::dto::HealthResponse,
        crate::dto::ErrorResponse,
    )),
    tags(
        (name = "sources", description = "Configured news sources"),
        (name = "articles", description = "Collected articles"),
        (name = "collection", description = "Manual collection trigger"),
        (name = "system", description = "Health and system status"),
    )
)]
pub struct ApiDoc;
