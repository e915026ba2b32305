pub mod clickhouse_engine;
pub mod query_cache;
pub mod query_engine;

pub use clickhouse_engine::{ClickHouseQueryEngine, ConnectionSettings};
pub use query_cache::CachedQueries;
pub use query_engine::{parse_json_row, ConnectionError, QueryEngine, QueryError, RawRow};
