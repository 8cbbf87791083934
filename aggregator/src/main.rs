use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use ephemeral_aggregator::{
    AggregateOptions, AggregatorConfig, BulkFetcher, FeedAggregator, FetchConfig, HttpFetcher, SourceCache,
    WorkspaceFile,
};
use interfaces::defs::SourceRegistry;
use interfaces::memory::{MemoryArticleSink, MemoryCache, MemoryReliabilityTracker};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ephemeral-aggregator", about = "Aggregate RSS sources into ephemeral feeds")]
struct Cli {
    /// JSON file with `sources` and `feeds`
    #[arg(long, env = "AGGREGATOR_WORKSPACE", default_value = "workspace.json")]
    workspace: PathBuf,

    #[command(flatten)]
    settings: Settings,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct Settings {
    #[arg(long, env = "AGGREGATOR_TTL_MINUTES", default_value_t = 15)]
    ttl_minutes: i64,

    #[arg(long, env = "AGGREGATOR_DEFAULT_PAGE_SIZE", default_value_t = 20)]
    default_page_size: usize,

    #[arg(long, env = "AGGREGATOR_MAX_PAGE_SIZE", default_value_t = 100)]
    max_page_size: usize,

    #[arg(long, env = "AGGREGATOR_BULK_CONCURRENCY", default_value_t = 5)]
    bulk_concurrency: usize,

    #[arg(long, env = "AGGREGATOR_MAX_BULK_CONCURRENCY", default_value_t = 20)]
    max_bulk_concurrency: usize,

    #[arg(long, env = "AGGREGATOR_TIMEOUT_SECONDS", default_value_t = 10)]
    timeout_seconds: u64,

    #[arg(long, env = "AGGREGATOR_MAX_FEED_SIZE_MB", default_value_t = 10)]
    max_feed_size_mb: usize,

    #[arg(long, env = "AGGREGATOR_MAX_REDIRECTS", default_value_t = 5)]
    max_redirects: usize,

    #[arg(long, env = "AGGREGATOR_USER_AGENT", default_value = "Ephemeral-Aggregator/1.0")]
    user_agent: String,
}

impl Settings {
    fn aggregator_config(&self) -> AggregatorConfig {
        AggregatorConfig {
            cache_ttl_minutes: self.ttl_minutes,
            default_page_size: self.default_page_size,
            max_page_size: self.max_page_size,
            default_bulk_concurrency: self.bulk_concurrency,
            max_bulk_concurrency: self.max_bulk_concurrency,
        }
    }

    fn fetch_config(&self) -> FetchConfig {
        FetchConfig {
            user_agent: self.user_agent.clone(),
            timeout_seconds: self.timeout_seconds,
            max_feed_size_mb: self.max_feed_size_mb,
            max_redirects: self.max_redirects,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Print one page of a feed as JSON
    Aggregate {
        feed_id: String,
        #[arg(long, allow_negative_numbers = true)]
        limit: Option<i64>,
        #[arg(long)]
        cursor: Option<String>,
        #[arg(long)]
        user: Option<String>,
        /// Bypass the source cache
        #[arg(long)]
        refresh: bool,
    },
    /// Fetch every active source and print the run summary
    BulkFetch {
        #[arg(long)]
        concurrency: Option<usize>,
    },
    /// List sources, seeding the defaults into an empty workspace
    Sources,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.settings.aggregator_config();
    config.validate()?;

    let workspace = if cli.workspace.exists() {
        WorkspaceFile::load(&cli.workspace).await?
    } else {
        warn!("Workspace {} not found, starting empty", cli.workspace.display());
        WorkspaceFile::default()
    };
    let (sources, feeds) = workspace.into_registries();
    let sources = Arc::new(sources);
    let feeds = Arc::new(feeds);

    let fetcher = Arc::new(HttpFetcher::new(cli.settings.fetch_config()).context("building HTTP client")?);

    match cli.command {
        Command::Aggregate {
            feed_id,
            limit,
            cursor,
            user,
            refresh,
        } => {
            let source_cache = Arc::new(SourceCache::new(
                sources,
                Arc::new(MemoryCache::new()),
                fetcher,
                config.cache_ttl(),
            ));
            let aggregator = FeedAggregator::new(feeds, source_cache, config);
            let options = AggregateOptions {
                user_id: user,
                limit,
                cursor,
                force_refresh: refresh,
            };
            let result = aggregator.aggregate(&feed_id, options).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Command::BulkFetch { concurrency } => {
            let active: Vec<_> = sources
                .list_news_sources()
                .await?
                .into_iter()
                .filter(|s| s.is_active)
                .collect();
            let tracker = Arc::new(MemoryReliabilityTracker::new());
            let bulk = BulkFetcher::new(fetcher, tracker, Arc::new(MemoryArticleSink::new()), &config);
            let summary = bulk.run(&active, concurrency).await;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Command::Sources => {
            if sources.list_news_sources().await?.is_empty() {
                let created = interfaces::ensure_default_sources(sources.as_ref()).await?;
                info!("Seeded {} default sources", created);
            }
            let all = sources.list_news_sources().await?;
            println!("{}", serde_json::to_string_pretty(&all)?);
        }
    }

    Ok(())
}
