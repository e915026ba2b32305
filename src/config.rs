use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use thiserror::Error;
use validator::Validate;

use crate::driver::SourceOptions;
use crate::materialize::DEFAULT_BATCH_SIZE;
use crate::node::{TypePrefixedIds, DEFAULT_TYPE_PREFIX};
use crate::schema::{normalize_descriptors, EntityDescriptor, SchemaError};
use crate::source::ConnectionSettings;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Parse error for {field}: {value} - {source}")]
    Parse {
        field: String,
        value: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("No ClickHouse connection configured: set `connection.url` or CLICKHOUSE_URL")]
    MissingConnection,
}

/// Source run configuration with validation
#[derive(Clone, Debug, Validate, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Serve repeated statements from the query cache
    #[serde(default, alias = "cacheQueryResults")]
    pub cache_query_results: bool,

    /// Replay an entity's previous materialization when its row count is unchanged
    #[serde(default, alias = "cacheTransformationByRowcount")]
    pub cache_transformation_by_rowcount: bool,

    /// Nodes materialized concurrently per batch (1-64)
    #[validate(range(min = 1, max = 64, message = "Batch size must be between 1 and 64"))]
    #[serde(default = "default_batch_size", alias = "batchSize")]
    pub batch_size: usize,

    /// Prefix of generated node ids and type names
    #[validate(length(min = 1, message = "Type prefix cannot be empty"))]
    #[serde(default = "default_type_prefix", alias = "typePrefix")]
    pub type_prefix: String,

    /// ClickHouse connection; falls back to CLICKHOUSE_* variables when absent
    #[serde(default)]
    pub connection: Option<ConnectionSettings>,

    /// Directory of the persistent cache; in-memory cache when absent
    #[serde(default, alias = "cacheDir")]
    pub cache_dir: Option<PathBuf>,

    /// NDJSON output file; stdout when absent
    #[serde(default)]
    pub output: Option<PathBuf>,

    #[validate(length(min = 1, message = "At least one entity must be declared"))]
    #[serde(alias = "queries")]
    pub entities: Vec<EntityDescriptor>,
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_type_prefix() -> String {
    DEFAULT_TYPE_PREFIX.to_string()
}

/// Command line overrides; flags only ever switch features on
#[derive(Clone, Debug, Default)]
pub struct CliOverrides {
    pub output: Option<PathBuf>,
    pub cache_dir: Option<PathBuf>,
    pub cache_query_results: bool,
    pub cache_transformation_by_rowcount: bool,
    pub batch_size: Option<usize>,
}

impl SourceConfig {
    /// Configuration declaring `entities` with every option at its default
    pub fn new(entities: Vec<EntityDescriptor>) -> Self {
        Self {
            cache_query_results: false,
            cache_transformation_by_rowcount: false,
            batch_size: DEFAULT_BATCH_SIZE,
            type_prefix: default_type_prefix(),
            connection: None,
            cache_dir: None,
            output: None,
            entities,
        }
    }

    /// Load configuration from a YAML file, then apply environment overrides
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Parse {
            field: "yaml_file".to_string(),
            value: path.display().to_string(),
            source: Box::new(e),
        })?;

        Self::from_yaml_str(&content)
    }

    /// Parse YAML configuration, then apply environment overrides
    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yaml::from_str(content).map_err(|e| ConfigError::Parse {
            field: "yaml_content".to_string(),
            value: content.to_string(),
            source: Box::new(e),
        })?;

        config.entities = normalize_descriptors(std::mem::take(&mut config.entities))?;
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Override feature flags from `ROWGRAPH_*` environment variables
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = parse_env_override("ROWGRAPH_CACHE_QUERY_RESULTS")? {
            self.cache_query_results = value;
        }
        if let Some(value) = parse_env_override("ROWGRAPH_CACHE_TRANSFORMATION")? {
            self.cache_transformation_by_rowcount = value;
        }
        if let Some(value) = parse_env_override("ROWGRAPH_BATCH_SIZE")? {
            self.batch_size = value;
        }
        Ok(())
    }

    /// Merge command line overrides (CLI overrides file and environment)
    pub fn apply_cli(&mut self, cli: CliOverrides) -> Result<(), ConfigError> {
        if cli.output.is_some() {
            self.output = cli.output;
        }
        if cli.cache_dir.is_some() {
            self.cache_dir = cli.cache_dir;
        }
        self.cache_query_results |= cli.cache_query_results;
        self.cache_transformation_by_rowcount |= cli.cache_transformation_by_rowcount;
        if let Some(batch_size) = cli.batch_size {
            self.batch_size = batch_size;
        }

        self.validate()?;
        Ok(())
    }

    pub fn connection_settings(&self) -> Result<ConnectionSettings, ConfigError> {
        self.connection
            .clone()
            .or_else(ConnectionSettings::from_env)
            .ok_or(ConfigError::MissingConnection)
    }

    pub fn options(&self) -> SourceOptions {
        SourceOptions {
            cache_query_results: self.cache_query_results,
            cache_transformation_by_rowcount: self.cache_transformation_by_rowcount,
            batch_size: self.batch_size,
        }
    }

    /// True when a cache feature is on but the cache only lives as long as
    /// this process
    pub fn uses_ephemeral_cache(&self) -> bool {
        (self.cache_query_results || self.cache_transformation_by_rowcount)
            && self.cache_dir.is_none()
    }

    pub fn ids(&self) -> TypePrefixedIds {
        TypePrefixedIds::new(self.type_prefix.clone())
    }
}

/// Parse an environment variable if it is set
fn parse_env_override<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let Ok(value) = env::var(key) else {
        return Ok(None);
    };
    value.trim().parse().map(Some).map_err(|e| ConfigError::Parse {
        field: key.to_string(),
        value,
        source: Box::new(e),
    })
}
