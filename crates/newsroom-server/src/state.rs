use std::sync::Arc;

use newsroom_client::SourceFetcher;
use newsroom_core::{
    AppError, CollectorConfig, CollectorService, Scheduler, SchedulerConfig, SourceRegistry,
    TracingDigestSender,
};
use newsroom_db::{Database, PgNewsStore};
use tokio_util::sync::CancellationToken;

/// The scheduler as wired in production.
pub type AppScheduler = Scheduler<SourceFetcher, PgNewsStore, TracingDigestSender>;

/// Shared application state, available to all route handlers via `State<Arc<AppState>>`.
pub struct AppState {
    pub db: Database,
    pub scheduler: Arc<AppScheduler>,
}

/// Wire registry, fetcher and store into a scheduler.
pub fn build_scheduler(
    db: &Database,
    registry: SourceRegistry,
    collector_config: CollectorConfig,
    scheduler_config: SchedulerConfig,
    cancel: CancellationToken,
) -> Result<AppScheduler, AppError> {
    let fetcher = SourceFetcher::with_timeout(collector_config.fetch_timeout)?;
    let collector = CollectorService::new(registry, fetcher, db.store(), collector_config);
    Scheduler::new(collector, scheduler_config, cancel)
}
