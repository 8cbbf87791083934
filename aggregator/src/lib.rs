pub mod types;
pub mod rss_utils;
pub mod parser;
pub mod fetcher;
pub mod source_cache;
pub mod pipeline;
pub mod aggregator;
pub mod bulk;
pub mod workspace;

pub use types::*;
pub use fetcher::{HttpFetcher, SourceFetcher};
pub use parser::FeedParser;
pub use source_cache::SourceCache;
pub use aggregator::FeedAggregator;
pub use bulk::BulkFetcher;
pub use workspace::WorkspaceFile;
