use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use newsroom_core::{CollectorConfig, SchedulerConfig, SourceRegistry, TracingDigestSender};
use newsroom_db::{Database, DatabaseConfig};
use newsroom_server::routes;
use newsroom_server::state::{AppState, build_scheduler};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("newsroom=info".parse()?))
        .with_target(false)
        .init();

    let port = std::env::var("NEWSROOM_SERVER_PORT").unwrap_or_else(|_| "8000".to_string());
    let addr = format!("0.0.0.0:{port}");

    let db = Database::connect(&DatabaseConfig::from_env()?).await?;
    db.migrate().await?;

    let cancel = CancellationToken::new();
    let scheduler = Arc::new(build_scheduler(
        &db,
        SourceRegistry::builtin(),
        CollectorConfig::from_env()?,
        SchedulerConfig::from_env()?,
        cancel.clone(),
    )?);
    scheduler.register_digest_sender(TracingDigestSender)?;
    let scheduler_task = tokio::spawn(Arc::clone(&scheduler).run());

    let state = Arc::new(AppState { db, scheduler });

    let app = routes::router(state)
        .layer(RequestBodyLimitLayer::new(64 * 1024))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    tracing::info!("Starting server on {addr}");
    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel.clone()))
        .await?;

    cancel.cancel();
    scheduler_task.await?;
    tracing::info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal(cancel: CancellationToken) {
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                tracing::error!(error = %e, "Failed to listen for CTRL+C");
            }
        }
        () = cancel.cancelled() => {}
    }
    tracing::info!("Shutdown signal received");
    cancel.cancel();
}
