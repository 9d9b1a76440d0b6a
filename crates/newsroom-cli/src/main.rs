use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use chrono::{TimeDelta, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use newsroom_client::{FeedFetcher, SourceFetcher};
use newsroom_core::models::{FetchStrategy, SourceDescriptor, SourceRecord};
use newsroom_core::{
    CollectorConfig, CollectorService, Fetcher, Scheduler, SchedulerConfig, SourceRegistry,
    TracingDigestSender, TriggerOutcome, build_digest,
};
use newsroom_db::{Database, DatabaseConfig};

#[derive(Parser)]
#[command(name = "newsroom", version, about = "AI news collection and deduplication")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Seed sources and run one collection cycle (requires DATABASE_URL)
    Collect,

    /// Fetch a feed and print its entries without storing anything
    Preview {
        /// Name of a built-in source
        #[arg(short, long, conflicts_with = "url", required_unless_present = "url")]
        source: Option<String>,

        /// Feed URL to fetch directly
        #[arg(short, long)]
        url: Option<String>,

        /// Maximum entries to print
        #[arg(short, long, default_value_t = 10)]
        limit: usize,

        /// Per-request timeout in seconds
        #[arg(long, env = "FETCH_TIMEOUT_SECS", default_value_t = 30)]
        timeout: u64,
    },

    /// List the built-in sources, with stored stats when DATABASE_URL is set
    Sources,

    /// Show recently collected articles (requires DATABASE_URL)
    Recent {
        /// Look-back window in hours
        #[arg(long, default_value_t = 24)]
        hours: i64,

        /// Number of articles to show
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("newsroom=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Collect => cmd_collect().await?,
        Commands::Preview {
            source,
            url,
            limit,
            timeout,
        } => {
            let target = preview_target(source.as_deref(), url.as_deref())?;
            cmd_preview(&target, limit, Duration::from_secs(timeout)).await?;
        }
        Commands::Sources => cmd_sources().await?,
        Commands::Recent { hours, limit } => cmd_recent(hours, limit).await?,
    }

    Ok(())
}

/// Connect to PostgreSQL using DATABASE_URL and apply migrations.
async fn connect_db() -> Result<Database> {
    let config = DatabaseConfig::from_env()?;
    let db = Database::connect(&config)
        .await
        .context("Failed to connect to database")?;
    db.migrate().await?;
    Ok(db)
}

async fn cmd_collect() -> Result<()> {
    let db = connect_db().await?;
    let config = CollectorConfig::from_env()?;
    let fetcher = SourceFetcher::with_timeout(config.fetch_timeout)?;
    let collector = CollectorService::new(SourceRegistry::builtin(), fetcher, db.store(), config);

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted, cancelling collection");
            on_signal.cancel();
        }
    });

    // Shares the collection lock with the server.
    let scheduler: Scheduler<_, _, TracingDigestSender> =
        Scheduler::new(collector, SchedulerConfig::default(), cancel)?;
    let report = match scheduler.trigger().await? {
        TriggerOutcome::Completed(report) => report,
        TriggerOutcome::AlreadyRunning => bail!("Another collection cycle is already running"),
    };

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Resolve `--source`/`--url` into a descriptor to fetch.
fn preview_target(source: Option<&str>, url: Option<&str>) -> Result<SourceDescriptor> {
    match (source, url) {
        (Some(name), None) => SourceRegistry::builtin()
            .get(name)
            .cloned()
            .with_context(|| format!("Unknown source '{name}'. Run `newsroom sources` to list them.")),
        (None, Some(url)) => Ok(SourceDescriptor::feed(url, url, url)),
        _ => bail!("Pass exactly one of --source or --url"),
    }
}

async fn cmd_preview(target: &SourceDescriptor, limit: usize, timeout: Duration) -> Result<()> {
    if target.strategy == FetchStrategy::Stub {
        tracing::warn!(source = %target.name, "Source has no feed; nothing to preview");
    }

    let fetcher = SourceFetcher::new(FeedFetcher::with_timeout(timeout)?);
    let mut articles = fetcher.fetch(target).await?;
    tracing::info!(source = %target.name, entries = articles.len(), "Fetched");

    articles.truncate(limit);
    println!("{}", serde_json::to_string_pretty(&articles)?);
    Ok(())
}

#[derive(Serialize)]
struct SourceLine {
    name: String,
    strategy: FetchStrategy,
    feed_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    article_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_checked_at: Option<chrono::DateTime<Utc>>,
}

async fn cmd_sources() -> Result<()> {
    let registry = SourceRegistry::builtin();

    let stored: HashMap<String, SourceRecord> = if std::env::var("DATABASE_URL").is_ok() {
        let db = connect_db().await?;
        db.source_repo()
            .list_active()
            .await?
            .into_iter()
            .map(|s| (s.name.clone(), s))
            .collect()
    } else {
        HashMap::new()
    };

    let lines: Vec<SourceLine> = registry
        .list()
        .iter()
        .map(|s| {
            let record = stored.get(&s.name);
            SourceLine {
                name: s.name.clone(),
                strategy: s.strategy,
                feed_url: s.feed_url.clone(),
                article_count: record.map(|r| r.article_count),
                last_checked_at: record.and_then(|r| r.last_checked_at),
            }
        })
        .collect();

    println!("{}", serde_json::to_string_pretty(&lines)?);
    Ok(())
}

fn recent_window(hours: i64) -> Result<TimeDelta> {
    if hours <= 0 {
        bail!("--hours must be positive");
    }
    match TimeDelta::try_hours(hours) {
        Some(window) => Ok(window),
        None => bail!("--hours {hours} is out of range"),
    }
}

async fn cmd_recent(hours: i64, limit: usize) -> Result<()> {
    let window = recent_window(hours)?;
    let db = connect_db().await?;
    let digest = build_digest(&db.store(), Utc::now(), window, limit).await?;

    if digest.is_empty() {
        println!("No articles published in the last {hours}h");
        return Ok(());
    }

    for article in &digest.articles {
        println!(
            "  {}  {}\n      {}",
            article.published_at.format("%Y-%m-%d %H:%M UTC"),
            article.title,
            article.url,
        );
    }
    println!("\nTotal: {} articles", digest.articles.len());

    Ok(())
}
