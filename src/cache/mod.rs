pub mod file;
pub mod memory;
pub mod store;
pub mod transformation;

pub use file::FileCacheStore;
pub use memory::{CacheMetrics, MemoryCacheStore};
pub use store::{data_key, node_key, query_key, rowcount_key, CacheError, CacheStore};
pub use transformation::{CachedTransformation, Lookup, TransformationCache};
