//! Run driver: query every entity, map rows to nodes and push them through
//! the batch pipeline, with optional query and transformation caching.
//!
//! Control flow of one run:
//!
//! 1. open the shared connection (failure aborts the run)
//! 2. execute every statement concurrently; an entity whose query fails is
//!    reported and skipped
//! 3. materialize every loaded entity concurrently, either by replaying a
//!    cached transformation or by mapping rows and running the pipeline

pub mod report;

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::future::join_all;
use thiserror::Error;

use crate::cache::{CacheStore, Lookup, TransformationCache};
use crate::materialize::{
    AssetFetcher, ContentStore, EntityMaterialization, Pipeline, DEFAULT_BATCH_SIZE,
};
use crate::node::{map_rows, ChildRows};
use crate::schema::{
    normalize_descriptors, resolve_children, resolve_parents, EntityDescriptor, SchemaError,
};
use crate::source::{CachedQueries, ConnectionError, QueryEngine, QueryError, RawRow};

pub use report::{CacheStatus, EntityReport, RunReport};

#[derive(Debug, Error)]
pub enum SourceError {
    #[error(transparent)]
    Connection(#[from] ConnectionError),
    #[error(transparent)]
    Schema(#[from] SchemaError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceOptions {
    pub cache_query_results: bool,
    pub cache_transformation_by_rowcount: bool,
    pub batch_size: usize,
}

impl Default for SourceOptions {
    fn default() -> Self {
        SourceOptions {
            cache_query_results: false,
            cache_transformation_by_rowcount: false,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

/// Collaborators of a run
#[derive(Clone)]
pub struct SourceContext {
    pub engine: Arc<dyn QueryEngine>,
    pub store: Arc<dyn ContentStore>,
    pub fetcher: Arc<dyn AssetFetcher>,
    pub cache: Arc<dyn CacheStore>,
}

/// Source every entity in `entities` into the content store
///
/// Only a connection failure or an invalid descriptor list fails the run.
/// Query, asset and node write failures are logged and counted in the
/// returned report.
pub async fn source_nodes(
    ctx: &SourceContext,
    entities: &[EntityDescriptor],
    options: &SourceOptions,
) -> Result<RunReport, SourceError> {
    let entities = normalize_descriptors(entities.to_vec())?;

    let queries = CachedQueries::new(
        ctx.engine.as_ref(),
        options
            .cache_query_results
            .then_some(ctx.cache.as_ref()),
    );
    if let Err(e) = queries.connect().await {
        log::error!("{}", e);
        return Err(e.into());
    }

    log::info!("Executing {} entity queries", entities.len());
    let results = join_all(
        entities
            .iter()
            .map(|descriptor| queries.execute(&descriptor.statement)),
    )
    .await;

    let mut report = RunReport::default();
    let mut loaded: Vec<(&EntityDescriptor, Vec<RawRow>)> = Vec::new();
    for (descriptor, result) in entities.iter().zip(results) {
        match result {
            Ok(rows) => {
                log::info!("{}: {} rows", descriptor.name, rows.len());
                loaded.push((descriptor, rows));
            }
            Err(QueryError::Connection(e)) => {
                log::error!("{}", e);
                return Err(e.into());
            }
            Err(e) => {
                log::error!("Skipping {}: {}", descriptor.name, e);
                report
                    .failed_entities
                    .push((descriptor.name.clone(), e.to_string()));
            }
        }
    }

    // Children are only resolved among entities whose query succeeded
    let loaded_descriptors: Vec<EntityDescriptor> = loaded
        .iter()
        .map(|(descriptor, _)| (*descriptor).clone())
        .collect();
    let rows_by_name: HashMap<&str, &[RawRow]> = loaded
        .iter()
        .map(|(descriptor, rows)| (descriptor.name.as_str(), rows.as_slice()))
        .collect();

    let reports = join_all(loaded.iter().map(|(descriptor, rows)| {
        let children: Vec<ChildRows<'_>> =
            resolve_children(&loaded_descriptors, &descriptor.name)
                .into_iter()
                .filter_map(|child| {
                    rows_by_name
                        .get(child.name())
                        .copied()
                        .map(|rows| ChildRows { child, rows })
                })
                .collect();
        source_entity(ctx, &entities, descriptor, rows, children, options)
    }))
    .await;

    report.entities = reports;
    report.log_summary();
    Ok(report)
}

async fn source_entity(
    ctx: &SourceContext,
    entities: &[EntityDescriptor],
    descriptor: &EntityDescriptor,
    rows: &[RawRow],
    children: Vec<ChildRows<'_>>,
    options: &SourceOptions,
) -> EntityReport {
    let pipeline =
        Pipeline::new(ctx.store.as_ref(), ctx.fetcher.as_ref()).with_batch_size(options.batch_size);
    let row_count = rows.len() as u64;

    let (materialization, cache) = if options.cache_transformation_by_rowcount {
        let transformations = TransformationCache::new(ctx.cache.as_ref());
        match transformations.lookup(&descriptor.name, row_count).await {
            Lookup::Hit(cached) => {
                let replayed = pipeline
                    .replay(&descriptor.name, cached.accumulator)
                    .await;
                (replayed, CacheStatus::Hit)
            }
            Lookup::Miss { .. } => {
                let fresh =
                    materialize_fresh(ctx, &pipeline, entities, descriptor, rows, &children)
                        .await;
                if fresh.is_complete() {
                    if let Err(e) = transformations
                        .store(&descriptor.name, row_count, &fresh.accumulator)
                        .await
                    {
                        log::warn!("Could not cache transformation of {}: {}", descriptor.name, e);
                    }
                } else {
                    log::warn!(
                        "Not caching transformation of {}: {} nodes failed",
                        descriptor.name,
                        fresh.failures.len()
                    );
                }
                (fresh, CacheStatus::Miss)
            }
        }
    } else {
        let fresh =
            materialize_fresh(ctx, &pipeline, entities, descriptor, rows, &children).await;
        (fresh, CacheStatus::Disabled)
    };

    EntityReport {
        name: descriptor.name.clone(),
        rows: rows.len(),
        nodes_written: materialization.nodes_written,
        node_failures: materialization.failures.len(),
        assets_fetched: materialization.assets_fetched,
        asset_failures: materialization.asset_failures,
        cache,
    }
}

async fn materialize_fresh(
    ctx: &SourceContext,
    pipeline: &Pipeline<'_>,
    entities: &[EntityDescriptor],
    descriptor: &EntityDescriptor,
    rows: &[RawRow],
    children: &[ChildRows<'_>],
) -> EntityMaterialization {
    let parents = resolve_parents(entities, descriptor);
    let nodes = map_rows(descriptor, rows, &parents, children, ctx.store.as_ref());
    log::info!(
        "Materializing {} {} nodes in batches of {}",
        nodes.len(),
        descriptor.name,
        pipeline.batch_size()
    );
    pipeline
        .materialize(&descriptor.name, nodes, &descriptor.remote_asset_field_names)
        .await
}
