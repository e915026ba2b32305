pub mod assets;
pub mod content_store;
pub mod pipeline;

#[cfg(test)]
pub(crate) mod testing;

pub use assets::{
    materialize_assets, AssetFetchError, AssetFetchRequest, AssetFetcher, AssetNode,
    AssetOutcome, LinkAssetFetcher,
};
pub use content_store::{ContentStore, NdjsonContentStore, NodeWriteError, DEFAULT_OWNER};
pub use pipeline::{
    chunk, EntityMaterialization, NodeFailure, Pipeline, TransformationAccumulator,
    DEFAULT_BATCH_SIZE,
};
