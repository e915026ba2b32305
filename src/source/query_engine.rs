//! Query engine seam.
//!
//! The engine opens its connection lazily, once per run, and every entity's
//! statement runs against that single shared handle. Implementations must
//! allow concurrent outstanding `execute` calls.

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

/// One result row: column name to scalar value
pub type RawRow = Map<String, Value>;

/// Failure to open the shared connection; aborts the whole run
#[derive(Debug, Clone, Error, PartialEq)]
#[error("Failed to open connection to `{locator}`: {message}")]
pub struct ConnectionError {
    pub locator: String,
    pub message: String,
}

/// Failure of a single statement; only that entity is skipped
#[derive(Debug, Clone, Error, PartialEq)]
pub enum QueryError {
    #[error("Could not execute query \"{statement}\": {message}")]
    Execution { statement: String, message: String },
    #[error("Query \"{statement}\" returned a malformed row at line {line}: {message}")]
    MalformedRow {
        statement: String,
        line: usize,
        message: String,
    },
    #[error(transparent)]
    Connection(#[from] ConnectionError),
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QueryEngine: Send + Sync {
    /// Open the shared connection if it is not open yet
    async fn connect(&self) -> Result<(), ConnectionError>;

    /// Run `statement` and return every row
    async fn execute(&self, statement: &str) -> Result<Vec<RawRow>, QueryError>;
}

/// Decode one `JSONEachRow` line into a row
pub fn parse_json_row(statement: &str, line_no: usize, line: &str) -> Result<RawRow, QueryError> {
    match serde_json::from_str::<Value>(line) {
        Ok(Value::Object(row)) => Ok(row),
        Ok(other) => Err(QueryError::MalformedRow {
            statement: statement.to_string(),
            line: line_no,
            message: format!("expected a JSON object, got `{}`", other),
        }),
        Err(e) => Err(QueryError::MalformedRow {
            statement: statement.to_string(),
            line: line_no,
            message: e.to_string(),
        }),
    }
}
