//! ClickHouse-backed query engine.
//!
//! The client is created on first use and verified with `SELECT 1`; later
//! calls share it. The ClickHouse client talks HTTP, so concurrent
//! statements against the same handle need no extra serialization.

use std::env;

use async_trait::async_trait;
use clickhouse::Client;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncBufReadExt;
use tokio::sync::OnceCell;

use super::query_engine::{parse_json_row, ConnectionError, QueryEngine, QueryError, RawRow};

/// Where and how to reach ClickHouse
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionSettings {
    pub url: String,
    #[serde(default = "default_user")]
    pub user: String,
    // Allow empty password for local development
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_database")]
    pub database: String,
}

fn default_user() -> String {
    "default".to_string()
}

fn default_database() -> String {
    "default".to_string()
}

impl ConnectionSettings {
    pub fn new(url: impl Into<String>) -> Self {
        ConnectionSettings {
            url: url.into(),
            user: default_user(),
            password: String::new(),
            database: default_database(),
        }
    }

    /// Read `CLICKHOUSE_URL`, `CLICKHOUSE_USER`, `CLICKHOUSE_PASSWORD` and
    /// `CLICKHOUSE_DATABASE`; only the URL is required
    pub fn from_env() -> Option<Self> {
        let url = env::var("CLICKHOUSE_URL").ok()?;
        Some(ConnectionSettings {
            url,
            user: env::var("CLICKHOUSE_USER").unwrap_or_else(|_| default_user()),
            password: env::var("CLICKHOUSE_PASSWORD").unwrap_or_default(),
            database: env::var("CLICKHOUSE_DATABASE").unwrap_or_else(|_| default_database()),
        })
    }

    fn create_client(&self) -> Client {
        Client::default()
            .with_url(&self.url)
            .with_user(&self.user)
            .with_password(&self.password)
            .with_database(&self.database)
            .with_option("output_format_json_quote_64bit_integers", "0")
            .with_option("output_format_json_quote_denormals", "0")
    }
}

pub struct ClickHouseQueryEngine {
    settings: ConnectionSettings,
    client: OnceCell<Client>,
}

impl ClickHouseQueryEngine {
    pub fn new(settings: ConnectionSettings) -> Self {
        ClickHouseQueryEngine {
            settings,
            client: OnceCell::new(),
        }
    }

    async fn client(&self) -> Result<&Client, ConnectionError> {
        self.client
            .get_or_try_init(|| async {
                let client = self.settings.create_client();
                client
                    .query("SELECT 1")
                    .execute()
                    .await
                    .map_err(|e| ConnectionError {
                        locator: self.settings.url.clone(),
                        message: e.to_string(),
                    })?;
                log::info!(
                    "Connected to ClickHouse at {} (database `{}`)",
                    self.settings.url,
                    self.settings.database
                );
                Ok(client)
            })
            .await
    }
}

#[async_trait]
impl QueryEngine for ClickHouseQueryEngine {
    async fn connect(&self) -> Result<(), ConnectionError> {
        self.client().await.map(|_| ())
    }

    async fn execute(&self, statement: &str) -> Result<Vec<RawRow>, QueryError> {
        let client = self.client().await?;
        log::info!("Query => {}", statement);

        let mut lines = client
            .query(statement)
            .fetch_bytes("JSONEachRow")
            .map_err(|e| execution_error(statement, e))?
            .lines();

        let mut rows = Vec::new();
        let mut line_no = 0usize;
        while let Some(line) = lines
            .next_line()
            .await
            .map_err(|e| execution_error(statement, e))?
        {
            line_no += 1;
            if line.trim().is_empty() {
                continue;
            }
            rows.push(parse_json_row(statement, line_no, &line)?);
        }

        Ok(rows)
    }
}

fn execution_error(statement: &str, e: impl std::fmt::Display) -> QueryError {
    log::error!("Could not execute query \"{}\": {}", statement, e);
    QueryError::Execution {
        statement: statement.to_string(),
        message: e.to_string(),
    }
}
