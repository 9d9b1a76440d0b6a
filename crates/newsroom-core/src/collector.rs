use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use crate::error::AppError;
use crate::models::{
    NewArticle, RawArticle, RunReport, SourceDescriptor, SourceOutcome, SourceRecord,
};
use crate::registry::SourceRegistry;
use crate::traits::{Fetcher, NewsStore};

/// Tunables for a collection cycle.
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// Articles considered per source per cycle; the rest of the feed is ignored.
    pub max_articles_per_source: usize,
    /// Upper bound on a single source fetch.
    pub fetch_timeout: Duration,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            max_articles_per_source: 50,
            fetch_timeout: Duration::from_secs(30),
        }
    }
}

impl CollectorConfig {
    pub fn with_max_articles_per_source(mut self, max: usize) -> Self {
        self.max_articles_per_source = max;
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }
}

/// Events emitted during a cycle for monitoring/logging.
#[derive(Debug, Clone)]
pub enum CollectorEvent<'a> {
    CycleStarted {
        sources: usize,
    },
    SourceSkipped {
        source: &'a str,
    },
    SourceCollected {
        source: &'a str,
        found: usize,
        new: usize,
    },
    SourceFailed {
        source: &'a str,
        error: &'a str,
    },
    CycleFinished {
        report: &'a RunReport,
    },
    CycleCancelled,
}

/// Trait for receiving collector events (decoupled logging).
pub trait CollectorReporter: Send + Sync {
    fn report(&self, event: CollectorEvent<'_>) {
        let _ = event;
    }
}

/// Reporter that uses the `tracing` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingCollectorReporter;

impl CollectorReporter for TracingCollectorReporter {
    fn report(&self, event: CollectorEvent<'_>) {
        match event {
            CollectorEvent::CycleStarted { sources } => {
                tracing::info!(%sources, "Collection cycle started");
            }
            CollectorEvent::SourceSkipped { source } => {
                tracing::debug!(%source, "Source inactive, skipping");
            }
            CollectorEvent::SourceCollected { source, found, new } => {
                tracing::info!(%source, %found, %new, "Source collected");
            }
            CollectorEvent::SourceFailed { source, error } => {
                tracing::warn!(%source, %error, "Source failed");
            }
            CollectorEvent::CycleFinished { report } => {
                tracing::info!(
                    total_found = report.total_found,
                    total_new = report.total_new,
                    errors = report.errors.len(),
                    "Collection cycle finished"
                );
            }
            CollectorEvent::CycleCancelled => {
                tracing::info!("Collection cycle cancelled");
            }
        }
    }
}

/// Runs collection cycles: seed → fetch each source → dedup → persist → stats.
///
/// Generic over the fetcher and the store so cycles can be exercised without
/// network or database.
pub struct CollectorService<F, S>
where
    F: Fetcher,
    S: NewsStore,
{
    registry: SourceRegistry,
    fetcher: F,
    store: S,
    config: CollectorConfig,
}

impl<F, S> CollectorService<F, S>
where
    F: Fetcher,
    S: NewsStore,
{
    pub fn new(registry: SourceRegistry, fetcher: F, store: S, config: CollectorConfig) -> Self {
        Self {
            registry,
            fetcher,
            store,
            config,
        }
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &CollectorConfig {
        &self.config
    }

    /// Run one full collection cycle.
    ///
    /// Per-source failures (fetch, dedup, persistence) end up in
    /// [`RunReport::errors`]; the cycle itself only fails when the registry
    /// cannot be seeded, active sources cannot be loaded, or `cancel` fires.
    /// A cancelled source keeps the articles inserted so far but its stats
    /// are left as they were.
    pub async fn run_cycle<R: CollectorReporter>(
        &self,
        cancel: &CancellationToken,
        reporter: &R,
    ) -> Result<RunReport, AppError> {
        let started_at = Utc::now();
        reporter.report(CollectorEvent::CycleStarted {
            sources: self.registry.len(),
        });

        self.registry.seed(&self.store).await?;

        let active = self.store.get_active_sources().await?;
        let by_name: HashMap<&str, &SourceRecord> =
            active.iter().map(|s| (s.name.as_str(), s)).collect();

        let mut report = RunReport::new(started_at);

        for descriptor in self.registry.list() {
            if cancel.is_cancelled() {
                reporter.report(CollectorEvent::CycleCancelled);
                return Err(AppError::Cancelled);
            }

            let Some(record) = by_name.get(descriptor.name.as_str()) else {
                reporter.report(CollectorEvent::SourceSkipped {
                    source: &descriptor.name,
                });
                continue;
            };

            let mut outcome = SourceOutcome::new(&descriptor.name);
            let collected = self
                .collect_source(descriptor, record, &mut outcome, cancel)
                .await;

            if matches!(collected, Err(AppError::Cancelled)) {
                reporter.report(CollectorEvent::CycleCancelled);
                return Err(AppError::Cancelled);
            }

            // The fetcher was invoked, so stats are refreshed even on failure.
            let refreshed = self.refresh_stats(record, started_at).await;

            outcome.error = match (collected, refreshed) {
                (Ok(()), Ok(())) => None,
                (Err(e), Ok(())) | (Ok(()), Err(e)) => Some(e.to_string()),
                (Err(fetch), Err(stats)) => Some(format!("{fetch}; {stats}")),
            };

            match &outcome.error {
                Some(error) => reporter.report(CollectorEvent::SourceFailed {
                    source: &descriptor.name,
                    error,
                }),
                None => reporter.report(CollectorEvent::SourceCollected {
                    source: &descriptor.name,
                    found: outcome.found,
                    new: outcome.new,
                }),
            }

            report.record(outcome);
        }

        let report = report.finish(Utc::now());
        reporter.report(CollectorEvent::CycleFinished { report: &report });
        Ok(report)
    }

    /// Fetch, cap, dedup and insert for one source, tallying into `outcome`.
    async fn collect_source(
        &self,
        descriptor: &SourceDescriptor,
        record: &SourceRecord,
        outcome: &mut SourceOutcome,
        cancel: &CancellationToken,
    ) -> Result<(), AppError> {
        let mut articles = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(AppError::Cancelled),
            fetched = self.fetch_with_timeout(descriptor) => fetched?,
        };

        articles.truncate(self.config.max_articles_per_source);
        outcome.found = articles.len();

        for article in articles {
            if cancel.is_cancelled() {
                return Err(AppError::Cancelled);
            }
            if self.ingest(record, article).await? {
                outcome.new += 1;
            }
        }

        Ok(())
    }

    async fn fetch_with_timeout(
        &self,
        descriptor: &SourceDescriptor,
    ) -> Result<Vec<RawArticle>, AppError> {
        tokio::time::timeout(self.config.fetch_timeout, self.fetcher.fetch(descriptor))
            .await
            .unwrap_or(Err(AppError::Timeout(self.config.fetch_timeout.as_secs())))
    }

    /// Insert one article unless its URL is already known. Returns whether
    /// a row was written.
    async fn ingest(&self, record: &SourceRecord, article: RawArticle) -> Result<bool, AppError> {
        let url = article.url.trim();
        if url.is_empty() {
            return Ok(false);
        }
        if self.store.article_exists(url).await? {
            return Ok(false);
        }

        let new_article = NewArticle::from_raw(record.id, article);
        self.store.insert_article(&new_article).await
    }

    async fn refresh_stats(
        &self,
        record: &SourceRecord,
        checked_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let count = self.store.count_articles_for(record.id).await?;
        self.store
            .update_source_stats(record.id, checked_at, count)
            .await
    }
}
