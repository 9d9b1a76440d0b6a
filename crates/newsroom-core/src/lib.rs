pub mod collector;
pub mod config;
pub mod digest;
pub mod error;
pub mod models;
pub mod registry;
pub mod scheduler;
pub mod traits;
pub mod util;

#[cfg(any(test, feature = "testutil"))]
pub mod testutil;

pub use collector::{
    CollectorConfig, CollectorEvent, CollectorReporter, CollectorService, TracingCollectorReporter,
};
pub use digest::{Digest, TracingDigestSender, build_digest};
pub use error::AppError;
pub use models::{
    Article, FetchStrategy, NewArticle, RawArticle, RunReport, SourceDescriptor, SourceError,
    SourceOutcome, SourceRecord, compute_hash,
};
pub use registry::SourceRegistry;
pub use scheduler::{Scheduler, SchedulerConfig, SchedulerState, TriggerOutcome};
pub use traits::{DigestSender, Fetcher, NewsStore};
