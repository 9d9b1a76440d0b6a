use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use testcontainers::core::{ContainerPort, WaitFor};
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, GenericImage, ImageExt};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use newsroom_core::models::SourceDescriptor;
use newsroom_core::{CollectorConfig, SchedulerConfig, SourceRegistry};
use newsroom_db::Database;
use newsroom_server::routes;
use newsroom_server::state::{AppState, build_scheduler};

pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    _listener: Option<TcpListener>,
    _container: Option<ContainerAsync<GenericImage>>,
}

/// Sources that need no network: every cycle fetches nothing.
pub fn offline_registry() -> SourceRegistry {
    SourceRegistry::new(vec![
        SourceDescriptor::stub("Stub One", "https://one.test"),
        SourceDescriptor::stub("Stub Two", "https://two.test"),
    ])
}

fn build_app(pool: PgPool) -> (Router, Arc<AppState>) {
    let db = Database::from_pool(pool);
    let scheduler = build_scheduler(
        &db,
        offline_registry(),
        CollectorConfig::default(),
        SchedulerConfig::default(),
        CancellationToken::new(),
    )
    .expect("Failed to build scheduler");

    let state = Arc::new(AppState {
        db,
        scheduler: Arc::new(scheduler),
    });
    (routes::router(state.clone()), state)
}

/// App whose database accepts TCP connections but never answers, so every
/// query stalls until the pool's acquire timeout.
pub async fn setup_unresponsive_app() -> TestApp {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind listener");
    let addr = listener.local_addr().expect("Failed to read address");

    let pool = PgPoolOptions::new()
        .max_connections(1)
        .acquire_timeout(Duration::from_millis(500))
        .connect_lazy(&format!("postgresql://postgres:postgres@{addr}/newsroom"))
        .expect("Invalid connection string");

    let (router, state) = build_app(pool);
    TestApp {
        router,
        state,
        _listener: Some(listener),
        _container: None,
    }
}

/// Spin up a PostgreSQL container and return the migrated test app.
pub async fn setup_test_app() -> TestApp {
    let container = GenericImage::new("postgres", "16")
        .with_exposed_port(ContainerPort::Tcp(5432))
        .with_wait_for(WaitFor::message_on_stderr(
            "database system is ready to accept connections",
        ))
        .with_env_var("POSTGRES_PASSWORD", "postgres")
        .with_env_var("POSTGRES_DB", "newsroom_test")
        .start()
        .await
        .expect("Failed to start PostgreSQL container");

    let host = container.get_host().await.expect("Failed to get host");
    let port = container
        .get_host_port_ipv4(5432)
        .await
        .expect("Failed to get port");

    let url = format!("postgresql://postgres:postgres@{host}:{port}/newsroom_test");
    let pool = retry_connect(&url).await;

    Database::from_pool(pool.clone())
        .migrate()
        .await
        .expect("Failed to run migrations");

    let (router, state) = build_app(pool);
    TestApp {
        router,
        state,
        _listener: None,
        _container: Some(container),
    }
}

async fn retry_connect(url: &str) -> PgPool {
    for _ in 0..30 {
        if let Ok(pool) = PgPoolOptions::new().max_connections(5).connect(url).await {
            return pool;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    panic!("Failed to connect to test database");
}
