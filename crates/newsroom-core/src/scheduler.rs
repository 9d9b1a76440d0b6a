//! Periodic collection and daily digest.
//!
//! The scheduler owns the single-flight guard around
//! [`CollectorService::run_cycle`]: interval ticks and manual triggers both go
//! through [`Scheduler::trigger`], and a trigger that arrives while a cycle is
//! running is rejected rather than queued. The store's collection lock extends
//! the guard to other processes sharing the same database.

use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use cron::Schedule;
use serde::Serialize;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::collector::{CollectorService, TracingCollectorReporter};
use crate::digest::build_digest;
use crate::error::AppError;
use crate::models::RunReport;
use crate::traits::{DigestSender, Fetcher, NewsStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerState {
    Idle,
    Running,
}

/// Result of asking for a collection cycle.
#[derive(Debug, Clone)]
pub enum TriggerOutcome {
    Completed(RunReport),
    /// Another cycle held the guard; nothing was done.
    AlreadyRunning,
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub collect_interval: Duration,
    /// 5- or 6-field cron expression, evaluated in UTC.
    pub digest_cron: String,
    pub digest_window: TimeDelta,
    pub digest_limit: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            collect_interval: Duration::from_secs(4 * 60 * 60),
            digest_cron: "0 7 * * *".to_string(),
            digest_window: TimeDelta::hours(24),
            digest_limit: 20,
        }
    }
}

/// Parse a cron expression, auto-prepending "0 " for 5-field expressions.
///
/// The `cron` crate wants seconds as the first field.
pub fn parse_cron(expr: &str) -> Result<Schedule, AppError> {
    let expr = expr.trim();
    let normalized = if expr.split_whitespace().count() == 5 {
        format!("0 {expr}")
    } else {
        expr.to_string()
    };
    Schedule::from_str(&normalized)
        .map_err(|e| AppError::ConfigError(format!("Invalid cron expression '{expr}': {e}")))
}

/// Clears the running flag when dropped, so the scheduler returns to idle
/// however the cycle ends.
struct RunGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> RunGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

pub struct Scheduler<F, S, D>
where
    F: Fetcher,
    S: NewsStore,
    D: DigestSender,
{
    collector: CollectorService<F, S>,
    config: SchedulerConfig,
    digest_schedule: Schedule,
    digest_sender: OnceLock<D>,
    running: AtomicBool,
    cancel: CancellationToken,
    tracker: TaskTracker,
}

impl<F, S, D> Scheduler<F, S, D>
where
    F: Fetcher + 'static,
    S: NewsStore + 'static,
    D: DigestSender + 'static,
{
    /// Build a scheduler. `cancel` stops [`run`](Self::run) and is handed to
    /// every cycle.
    pub fn new(
        collector: CollectorService<F, S>,
        config: SchedulerConfig,
        cancel: CancellationToken,
    ) -> Result<Self, AppError> {
        if config.collect_interval.is_zero() {
            return Err(AppError::ConfigError(
                "Collection interval must be greater than zero".into(),
            ));
        }
        let digest_schedule = parse_cron(&config.digest_cron)?;

        Ok(Self {
            collector,
            config,
            digest_schedule,
            digest_sender: OnceLock::new(),
            running: AtomicBool::new(false),
            cancel,
            tracker: TaskTracker::new(),
        })
    }

    /// Install the digest delivery channel. Allowed once.
    pub fn register_digest_sender(&self, sender: D) -> Result<(), AppError> {
        self.digest_sender
            .set(sender)
            .map_err(|_| AppError::ConfigError("Digest sender already registered".into()))
    }

    pub fn state(&self) -> SchedulerState {
        if self.running.load(Ordering::Acquire) {
            SchedulerState::Running
        } else {
            SchedulerState::Idle
        }
    }

    pub fn collector(&self) -> &CollectorService<F, S> {
        &self.collector
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Run one collection cycle now, unless one is already in progress.
    pub async fn trigger(&self) -> Result<TriggerOutcome, AppError> {
        let Some(_guard) = RunGuard::acquire(&self.running) else {
            tracing::info!("Collection already running, trigger rejected");
            return Ok(TriggerOutcome::AlreadyRunning);
        };

        let store = self.collector.store();
        if !store.try_lock_collection().await? {
            tracing::info!("Collection running in another process, trigger rejected");
            return Ok(TriggerOutcome::AlreadyRunning);
        }

        let result = self
            .collector
            .run_cycle(&self.cancel, &TracingCollectorReporter)
            .await;
        if let Err(e) = store.unlock_collection().await {
            tracing::warn!(error = %e, "Failed to release collection lock");
        }
        Ok(TriggerOutcome::Completed(result?))
    }

    /// Same as [`trigger`](Self::trigger), but the cycle runs on a task owned by
    /// the scheduler. Dropping the returned future does not interrupt the
    /// cycle, and shutdown waits for it like any scheduled job.
    pub async fn trigger_detached(self: &Arc<Self>) -> Result<TriggerOutcome, AppError> {
        let this = Arc::clone(self);
        self.tracker
            .spawn(async move { this.trigger().await })
            .await
            .map_err(|e| AppError::Generic(format!("Collection task failed: {e}")))?
    }

    /// Build and deliver the digest for the window ending now.
    ///
    /// Returns `false` without doing anything when no sender is registered.
    pub async fn send_digest(&self) -> Result<bool, AppError> {
        let Some(sender) = self.digest_sender.get() else {
            tracing::warn!("No digest sender registered, skipping digest");
            return Ok(false);
        };

        let digest = build_digest(
            self.collector.store(),
            Utc::now(),
            self.config.digest_window,
            self.config.digest_limit,
        )
        .await?;
        sender.send(&digest).await?;
        tracing::info!(articles = digest.articles.len(), "Digest sent");
        Ok(true)
    }

    /// Next digest fire time strictly after `after`.
    pub fn next_digest_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.digest_schedule.after(&after).next()
    }

    /// Drive the interval and digest timers until the cancellation token fires,
    /// then wait for spawned jobs to finish.
    ///
    /// The first interval tick fires immediately, so a cycle runs at startup.
    pub async fn run(self: Arc<Self>) {
        let mut interval = tokio::time::interval(self.config.collect_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut next_digest = self.next_digest_after(Utc::now());
        tracing::info!(
            interval_secs = self.config.collect_interval.as_secs(),
            digest_cron = %self.config.digest_cron,
            next_digest = ?next_digest,
            "Scheduler started"
        );

        loop {
            let digest_delay = next_digest
                .map(|at| (at - Utc::now()).to_std().unwrap_or(Duration::ZERO))
                .unwrap_or(Duration::MAX);

            tokio::select! {
                biased;
                () = self.cancel.cancelled() => break,
                _ = interval.tick() => {
                    let this = Arc::clone(&self);
                    self.tracker.spawn(async move { this.collect_job().await });
                }
                () = tokio::time::sleep(digest_delay), if next_digest.is_some() => {
                    let this = Arc::clone(&self);
                    self.tracker.spawn(async move { this.digest_job().await });
                    let fired = next_digest.unwrap_or_else(Utc::now);
                    next_digest = self.next_digest_after(fired.max(Utc::now()));
                }
            }
        }

        tracing::info!("Scheduler stopping, waiting for running jobs");
        self.tracker.close();
        self.tracker.wait().await;
        tracing::info!("Scheduler stopped");
    }

    async fn collect_job(&self) {
        match self.trigger().await {
            Ok(TriggerOutcome::Completed(report)) => {
                tracing::info!(
                    total_found = report.total_found,
                    total_new = report.total_new,
                    errors = report.errors.len(),
                    "Scheduled collection complete"
                );
            }
            Ok(TriggerOutcome::AlreadyRunning) => {
                tracing::info!("Previous collection still running, skipping tick");
            }
            Err(AppError::Cancelled) => {
                tracing::info!("Scheduled collection cancelled");
            }
            Err(e) => {
                tracing::error!(error = %e, "Scheduled collection failed");
            }
        }
    }

    async fn digest_job(&self) {
        if let Err(e) = self.send_digest().await {
            tracing::error!(error = %e, "Digest job failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::CollectorConfig;
    use crate::registry::SourceRegistry;
    use crate::testutil::*;

    type TestScheduler = Scheduler<MockFetcher, MockStore, MockDigestSender>;

    fn scheduler(fetcher: MockFetcher, store: MockStore) -> TestScheduler {
        scheduler_with(fetcher, store, SchedulerConfig::default())
    }

    fn scheduler_with(
        fetcher: MockFetcher,
        store: MockStore,
        config: SchedulerConfig,
    ) -> TestScheduler {
        let registry = SourceRegistry::new(vec![
            feed_source("Feed-A", "a.test"),
            feed_source("Feed-B", "b.test"),
        ]);
        let collector =
            CollectorService::new(registry, fetcher, store, CollectorConfig::default());
        Scheduler::new(collector, config, CancellationToken::new()).unwrap()
    }

    #[test]
    fn test_parse_cron_five_field_auto_prefix() {
        let schedule = parse_cron("0 7 * * *").unwrap();
        let next = schedule.upcoming(Utc).next().unwrap();
        assert_eq!(next.format("%H:%M:%S").to_string(), "07:00:00");
    }

    #[test]
    fn test_parse_cron_six_field() {
        assert!(parse_cron("30 */5 * * * *").is_ok());
    }

    #[test]
    fn test_parse_cron_invalid() {
        let err = parse_cron("not a cron").unwrap_err();
        assert!(matches!(err, AppError::ConfigError(_)));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let registry = SourceRegistry::new(vec![]);
        let build = |config| {
            let collector = CollectorService::new(
                registry.clone(),
                MockFetcher::new(),
                MockStore::empty(),
                CollectorConfig::default(),
            );
            TestScheduler::new(collector, config, CancellationToken::new())
        };

        let bad_cron = SchedulerConfig {
            digest_cron: "61 * * * *".into(),
            ..Default::default()
        };
        assert!(matches!(build(bad_cron), Err(AppError::ConfigError(_))));

        let zero_interval = SchedulerConfig {
            collect_interval: Duration::ZERO,
            ..Default::default()
        };
        assert!(matches!(build(zero_interval), Err(AppError::ConfigError(_))));
    }

    #[test]
    fn next_digest_is_strictly_later() {
        let s = scheduler(MockFetcher::new(), MockStore::empty());
        let now = Utc::now();
        let next = s.next_digest_after(now).unwrap();
        assert!(next > now);
        assert!(next - now <= TimeDelta::hours(24));
        assert!(s.next_digest_after(next).unwrap() > next);
    }

    #[tokio::test]
    async fn trigger_completes_and_returns_to_idle() {
        let fetcher =
            MockFetcher::new().with_articles("Feed-A", vec![make_raw_article("https://a.test/1")]);
        let s = scheduler(fetcher, MockStore::empty());

        let outcome = s.trigger().await.unwrap();
        match outcome {
            TriggerOutcome::Completed(report) => assert_eq!(report.total_new, 1),
            TriggerOutcome::AlreadyRunning => panic!("expected a completed cycle"),
        }
        assert_eq!(s.state(), SchedulerState::Idle);
    }

    #[tokio::test]
    async fn concurrent_trigger_is_rejected() {
        let fetcher = MockFetcher::new().with_delay("Feed-A", Duration::from_millis(300));
        let s = Arc::new(scheduler(fetcher.clone(), MockStore::empty()));

        let first = {
            let s = Arc::clone(&s);
            tokio::spawn(async move { s.trigger().await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(s.state(), SchedulerState::Running);
        assert!(matches!(
            s.trigger().await.unwrap(),
            TriggerOutcome::AlreadyRunning
        ));

        let first = first.await.unwrap().unwrap();
        assert!(matches!(first, TriggerOutcome::Completed(_)));
        assert_eq!(s.state(), SchedulerState::Idle);
        // The rejected trigger never reached the fetcher.
        assert_eq!(fetcher.calls(), vec!["Feed-A", "Feed-B"]);
    }

    #[tokio::test]
    async fn detached_trigger_survives_dropped_caller() {
        let fetcher = MockFetcher::new()
            .with_articles("Feed-A", vec![make_raw_article("https://a.test/1")])
            .with_delay("Feed-A", Duration::from_millis(200));
        let store = MockStore::empty();
        let s = Arc::new(scheduler(fetcher, store.clone()));

        let caller = {
            let s = Arc::clone(&s);
            tokio::spawn(async move { s.trigger_detached().await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(s.state(), SchedulerState::Running);
        caller.abort();

        for _ in 0..50 {
            if s.state() == SchedulerState::Idle {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(s.state(), SchedulerState::Idle);
        assert!(store.has_article("https://a.test/1"));
    }

    #[tokio::test]
    async fn trigger_rejected_while_another_process_collects() {
        let fetcher = MockFetcher::new();
        let s = scheduler(fetcher.clone(), MockStore::empty().with_collection_lock_held());

        assert!(matches!(
            s.trigger().await.unwrap(),
            TriggerOutcome::AlreadyRunning
        ));
        assert!(fetcher.calls().is_empty());
        assert_eq!(s.state(), SchedulerState::Idle);
    }

    #[tokio::test]
    async fn collection_lock_released_after_cycle() {
        let store = MockStore::empty();
        let s = scheduler(MockFetcher::new(), store.clone());
        s.trigger().await.unwrap();
        assert!(!store.collection_locked());

        let failing = MockStore::with_seed_error(AppError::DatabaseError("down".into()));
        let s = scheduler(MockFetcher::new(), failing.clone());
        assert!(s.trigger().await.is_err());
        assert!(!failing.collection_locked());
    }

    #[tokio::test]
    async fn detached_trigger_returns_outcome() {
        let fetcher =
            MockFetcher::new().with_articles("Feed-B", vec![make_raw_article("https://b.test/1")]);
        let s = Arc::new(scheduler(fetcher, MockStore::empty()));

        match s.trigger_detached().await.unwrap() {
            TriggerOutcome::Completed(report) => assert_eq!(report.total_new, 1),
            TriggerOutcome::AlreadyRunning => panic!("expected a completed cycle"),
        }
    }

    #[tokio::test]
    async fn guard_released_after_failed_cycle() {
        let store = MockStore::with_seed_error(AppError::DatabaseError("down".into()));
        let s = scheduler(MockFetcher::new(), store);

        assert!(matches!(s.trigger().await, Err(AppError::SeedError(_))));
        assert_eq!(s.state(), SchedulerState::Idle);
        // A second attempt runs again instead of reporting AlreadyRunning.
        assert!(matches!(s.trigger().await, Err(AppError::SeedError(_))));
    }

    #[tokio::test]
    async fn digest_sender_registers_once() {
        let s = scheduler(MockFetcher::new(), MockStore::empty());
        assert!(s.register_digest_sender(MockDigestSender::new()).is_ok());
        let err = s
            .register_digest_sender(MockDigestSender::new())
            .unwrap_err();
        assert!(matches!(err, AppError::ConfigError(_)));
    }

    #[tokio::test]
    async fn digest_without_sender_is_skipped() {
        let s = scheduler(MockFetcher::new(), MockStore::empty());
        assert!(!s.send_digest().await.unwrap());
    }

    #[tokio::test]
    async fn digest_reads_persisted_articles() {
        let fetcher = MockFetcher::new().with_articles(
            "Feed-A",
            vec![
                make_raw_article("https://a.test/1"),
                make_raw_article("https://a.test/2"),
            ],
        );
        let s = scheduler(fetcher, MockStore::empty());
        let sender = MockDigestSender::new();
        s.register_digest_sender(sender.clone()).unwrap();

        s.trigger().await.unwrap();
        assert!(s.send_digest().await.unwrap());

        let sent = sender.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].articles.len(), 2);
    }

    #[tokio::test]
    async fn digest_failure_propagates() {
        let s = scheduler(MockFetcher::new(), MockStore::empty());
        s.register_digest_sender(MockDigestSender::with_error(AppError::NetworkError(
            "chat unreachable".into(),
        )))
        .unwrap();
        assert!(s.send_digest().await.is_err());
    }

    #[tokio::test]
    async fn run_collects_at_startup_and_stops_on_cancel() {
        let fetcher =
            MockFetcher::new().with_articles("Feed-A", vec![make_raw_article("https://a.test/1")]);
        let store = MockStore::empty();
        let s = Arc::new(scheduler(fetcher.clone(), store.clone()));
        let cancel = s.cancellation_token().clone();

        let handle = tokio::spawn(Arc::clone(&s).run());
        tokio::time::sleep(Duration::from_millis(100)).await;
        cancel.cancel();

        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("scheduler did not stop")
            .unwrap();

        assert!(store.has_article("https://a.test/1"));
        assert!(!fetcher.calls().is_empty());
        assert_eq!(s.state(), SchedulerState::Idle);
    }

    #[tokio::test]
    async fn cancelled_scheduler_rejects_cycle_with_cancelled() {
        let s = scheduler(MockFetcher::new(), MockStore::empty());
        s.cancellation_token().cancel();
        assert!(matches!(s.trigger().await, Err(AppError::Cancelled)));
        assert_eq!(s.state(), SchedulerState::Idle);
    }
}
