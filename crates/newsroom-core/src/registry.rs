use std::collections::HashSet;

use crate::error::AppError;
use crate::models::SourceDescriptor;
use crate::traits::NewsStore;

/// The fixed, ordered set of sources the collector knows about.
///
/// The registry is the single source of truth for source configuration;
/// [`seed`](Self::seed) materializes it in the store without touching records
/// that already exist, so manual deactivation and accumulated stats survive.
#[derive(Debug, Clone)]
pub struct SourceRegistry {
    sources: Vec<SourceDescriptor>,
}

impl SourceRegistry {
    /// Build a registry from descriptors. Later duplicates of a name are dropped.
    pub fn new(sources: Vec<SourceDescriptor>) -> Self {
        let mut seen = HashSet::new();
        let sources = sources
            .into_iter()
            .filter(|s| {
                let fresh = seen.insert(s.name.clone());
                if !fresh {
                    tracing::warn!(source = %s.name, "Duplicate source name in registry, ignoring");
                }
                fresh
            })
            .collect();
        Self { sources }
    }

    /// The sources shipped with Newsroom, in processing order.
    pub fn builtin() -> Self {
        Self::new(vec![
            SourceDescriptor::feed(
                "OpenAI Blog",
                "https://openai.com/blog",
                "https://openai.com/blog/rss.xml",
            ),
            SourceDescriptor::feed(
                "Google AI Blog",
                "https://blog.research.google/",
                "https://blog.research.google/feeds/posts/default",
            ),
            SourceDescriptor::feed(
                "MIT News AI",
                "https://news.mit.edu/topic/artificial-intelligence2",
                "https://news.mit.edu/rss/topic/artificial-intelligence2",
            ),
            SourceDescriptor::feed(
                "MIT Technology Review",
                "https://www.technologyreview.com/topic/artificial-intelligence/",
                "https://www.technologyreview.com/topic/artificial-intelligence/feed",
            ),
            SourceDescriptor::feed(
                "TechCrunch AI",
                "https://techcrunch.com/category/artificial-intelligence/",
                "https://techcrunch.com/category/artificial-intelligence/feed/",
            ),
            SourceDescriptor::feed(
                "The Verge AI",
                "https://www.theverge.com/ai-artificial-intelligence",
                "https://www.theverge.com/ai-artificial-intelligence/rss/index.xml",
            ),
            SourceDescriptor::feed(
                "VentureBeat AI",
                "https://venturebeat.com/category/ai/",
                "https://venturebeat.com/category/ai/feed/",
            ),
            SourceDescriptor::feed(
                "AI News",
                "https://www.artificialintelligence-news.com/",
                "https://www.artificialintelligence-news.com/feed/",
            ),
            // Scraping-only sources: no structured feed yet.
            SourceDescriptor::stub("DeepMind Blog", "https://www.deepmind.com/blog"),
            SourceDescriptor::stub("AI Magazine", "https://aimagazine.com/"),
        ])
    }

    pub fn list(&self) -> &[SourceDescriptor] {
        &self.sources
    }

    pub fn get(&self, name: &str) -> Option<&SourceDescriptor> {
        self.sources.iter().find(|s| s.name == name)
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Insert every source missing from the store. Returns how many were created.
    ///
    /// Any store failure aborts seeding with [`AppError::SeedError`].
    pub async fn seed<S: NewsStore>(&self, store: &S) -> Result<usize, AppError> {
        let mut created = 0;
        for source in &self.sources {
            let inserted = store
                .upsert_source_if_absent(source)
                .await
                .map_err(|e| AppError::SeedError(format!("{}: {e}", source.name)))?;
            if inserted {
                tracing::info!(source = %source.name, strategy = %source.strategy, "Source added");
                created += 1;
            }
        }
        Ok(created)
    }
}

impl Default for SourceRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
