use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use rowgraph::cache::{CacheStore, FileCacheStore, MemoryCacheStore};
use rowgraph::config::{CliOverrides, SourceConfig};
use rowgraph::driver::{source_nodes, SourceContext};
use rowgraph::materialize::{ContentStore, LinkAssetFetcher, NdjsonContentStore};
use rowgraph::source::ClickHouseQueryEngine;
use tokio::io::AsyncWrite;

/// rowgraph - source relational query results as linked content nodes
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// YAML file declaring the entities and run options
    #[arg(long, short)]
    config: PathBuf,

    /// Write NDJSON nodes to this file instead of stdout
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// Keep the cache in this directory between runs
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Serve repeated statements from the query cache
    #[arg(long)]
    cache_query_results: bool,

    /// Replay an entity's nodes when its row count is unchanged
    #[arg(long)]
    cache_transformation_by_rowcount: bool,

    /// Nodes materialized concurrently per batch
    #[arg(long)]
    batch_size: Option<usize>,
}

impl From<Cli> for CliOverrides {
    fn from(cli: Cli) -> Self {
        CliOverrides {
            output: cli.output,
            cache_dir: cli.cache_dir,
            cache_query_results: cli.cache_query_results,
            cache_transformation_by_rowcount: cli.cache_transformation_by_rowcount,
            batch_size: cli.batch_size,
        }
    }
}

type Sink = Box<dyn AsyncWrite + Unpin + Send>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    // Defaults to INFO level, can be overridden with RUST_LOG env var
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let mut config = SourceConfig::from_yaml_file(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;
    config.apply_cli(cli.into())?;

    log::info!("rowgraph v{}", env!("CARGO_PKG_VERSION"));

    let sink: Sink = match &config.output {
        Some(path) => Box::new(tokio::io::BufWriter::new(
            tokio::fs::File::create(path)
                .await
                .with_context(|| format!("Failed to create {}", path.display()))?,
        )),
        None => Box::new(tokio::io::stdout()),
    };
    let store = Arc::new(NdjsonContentStore::new(config.ids(), sink));

    if config.uses_ephemeral_cache() {
        log::warn!(
            "Caching is enabled without --cache-dir; cached results will not outlive this run"
        );
    }
    let cache: Arc<dyn CacheStore> = match &config.cache_dir {
        Some(dir) => Arc::new(FileCacheStore::open(dir.clone()).await?),
        None => Arc::new(MemoryCacheStore::new()),
    };

    let content_store: Arc<dyn ContentStore> = store.clone();
    let ctx = SourceContext {
        engine: Arc::new(ClickHouseQueryEngine::new(config.connection_settings()?)),
        store: content_store.clone(),
        fetcher: Arc::new(LinkAssetFetcher::new(content_store)),
        cache,
    };

    let report = source_nodes(&ctx, &config.entities, &config.options()).await?;
    store.flush().await.context("Failed to flush node output")?;

    if !report.is_clean() {
        log::warn!(
            "Run finished with {} node failures and {} skipped entities",
            report.total_node_failures(),
            report.failed_entities.len()
        );
    }
    Ok(())
}
