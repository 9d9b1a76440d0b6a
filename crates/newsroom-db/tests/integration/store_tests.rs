use chrono::{TimeDelta, Utc};
use newsroom_core::models::{NewArticle, SourceDescriptor};
use newsroom_core::testutil::{MockFetcher, make_raw_article};
use newsroom_core::{CollectorConfig, CollectorService, NewsStore, SourceRegistry};
use newsroom_db::PgNewsStore;
use tokio_util::sync::CancellationToken;

use crate::integration::common::setup_test_db;

fn descriptor(name: &str) -> SourceDescriptor {
    SourceDescriptor::feed(
        name,
        format!("https://{name}.test"),
        format!("https://{name}.test/feed"),
    )
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn upsert_source_is_insert_if_absent() {
    let (pool, _container) = setup_test_db().await;
    let store = PgNewsStore::new(pool);

    assert!(store.upsert_source_if_absent(&descriptor("alpha")).await.unwrap());
    assert!(!store.upsert_source_if_absent(&descriptor("alpha")).await.unwrap());

    store.sources().set_active("alpha", false).await.unwrap();
    assert!(!store.upsert_source_if_absent(&descriptor("alpha")).await.unwrap());

    // Re-seeding does not reactivate a disabled source.
    assert!(store.get_active_sources().await.unwrap().is_empty());
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn article_url_is_unique_across_sources() {
    let (pool, _container) = setup_test_db().await;
    let store = PgNewsStore::new(pool);
    store.upsert_source_if_absent(&descriptor("alpha")).await.unwrap();
    store.upsert_source_if_absent(&descriptor("beta")).await.unwrap();
    let sources = store.get_active_sources().await.unwrap();
    let (alpha, beta) = (sources[0].id, sources[1].id);

    let raw = make_raw_article("https://shared.test/story");
    assert!(!store.article_exists(&raw.url).await.unwrap());
    assert!(
        store
            .insert_article(&NewArticle::from_raw(alpha, raw.clone()))
            .await
            .unwrap()
    );
    assert!(
        !store
            .insert_article(&NewArticle::from_raw(beta, raw.clone()))
            .await
            .unwrap()
    );
    assert!(store.article_exists(&raw.url).await.unwrap());

    assert_eq!(store.count_articles_for(alpha).await.unwrap(), 1);
    assert_eq!(store.count_articles_for(beta).await.unwrap(), 0);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn stats_and_recent_articles() {
    let (pool, _container) = setup_test_db().await;
    let store = PgNewsStore::new(pool);
    store.upsert_source_if_absent(&descriptor("alpha")).await.unwrap();
    let source = store.get_active_sources().await.unwrap().remove(0);

    let now = Utc::now();
    for (i, hours) in [1, 3, 30].into_iter().enumerate() {
        let mut raw = make_raw_article(&format!("https://alpha.test/{i}"));
        raw.published_at = now - TimeDelta::hours(hours);
        store
            .insert_article(&NewArticle::from_raw(source.id, raw))
            .await
            .unwrap();
    }

    store.update_source_stats(source.id, now, 3).await.unwrap();
    let updated = store.sources().get_by_name("alpha").await.unwrap().unwrap();
    assert_eq!(updated.article_count, 3);
    assert!(updated.last_checked_at.is_some());

    let recent = store
        .recent_articles(now - TimeDelta::hours(24), 20)
        .await
        .unwrap();
    let urls: Vec<_> = recent.iter().map(|a| a.url.as_str()).collect();
    assert_eq!(urls, vec!["https://alpha.test/0", "https://alpha.test/1"]);

    let page = store.articles().list(Some(source.id), 2, 1).await.unwrap();
    assert_eq!(page.len(), 2);
    assert_eq!(page[0].url, "https://alpha.test/1");
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn collection_cycle_against_postgres() {
    let (pool, _container) = setup_test_db().await;
    let store = PgNewsStore::new(pool);
    let registry = SourceRegistry::new(vec![descriptor("alpha"), descriptor("beta")]);
    let fetcher = MockFetcher::new()
        .with_articles(
            "alpha",
            vec![
                make_raw_article("https://alpha.test/1"),
                make_raw_article("https://alpha.test/2"),
            ],
        )
        .with_articles("beta", vec![make_raw_article("https://alpha.test/1")]);
    let collector =
        CollectorService::new(registry, fetcher, store.clone(), CollectorConfig::default());
    let cancel = CancellationToken::new();
    let reporter = newsroom_core::TracingCollectorReporter;

    let first = collector.run_cycle(&cancel, &reporter).await.unwrap();
    assert_eq!(first.total_found, 3);
    assert_eq!(first.total_new, 2);
    assert!(first.errors.is_empty());

    let second = collector.run_cycle(&cancel, &reporter).await.unwrap();
    assert_eq!(second.total_new, 0);

    let alpha = store.sources().get_by_name("alpha").await.unwrap().unwrap();
    assert_eq!(alpha.article_count, 2);
    let checked = alpha.last_checked_at.expect("stats updated");
    assert!((checked - second.started_at).abs() < TimeDelta::milliseconds(1));
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn collection_lock_excludes_other_sessions() {
    let (pool, _container) = setup_test_db().await;
    let server = PgNewsStore::new(pool.clone());
    let cli = PgNewsStore::new(pool);

    assert!(server.try_lock_collection().await.unwrap());
    assert!(server.try_lock_collection().await.unwrap(), "re-entrant for the holder");
    assert!(!cli.try_lock_collection().await.unwrap());

    server.unlock_collection().await.unwrap();
    assert!(cli.try_lock_collection().await.unwrap());
    assert!(!server.try_lock_collection().await.unwrap());
    cli.unlock_collection().await.unwrap();
}
