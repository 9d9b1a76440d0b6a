pub mod feed;
pub mod fetcher;

pub use feed::parse_feed;
pub use fetcher::{FeedFetcher, SourceFetcher, StubFetcher};
