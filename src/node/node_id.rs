//! Node identifier generation and parsing.
//!
//! # Format
//!
//! `"{prefix}__{entity}__{raw_id}"`
//!
//! Examples:
//! - `"sqlite__author__1"` (integer id)
//! - `"sqlite__user__alice@example.com"` (string id)
//!
//! Identifiers are deterministic in `(entity, raw_id)` so a child row can
//! compute its parent's identifier from a foreign key value alone, and they
//! are reversible with [`parse_node_id`].

use std::fmt;

use serde_json::Value;

const SEPARATOR: &str = "__";

/// Prefix used when the configuration does not name one
pub const DEFAULT_TYPE_PREFIX: &str = "sqlite";

#[derive(Debug, Clone, PartialEq)]
pub enum NodeIdError {
    InvalidFormat(String),
    MissingPrefix,
    MissingEntity,
    MissingId,
}

impl fmt::Display for NodeIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeIdError::InvalidFormat(msg) => write!(f, "Invalid node id format: {}", msg),
            NodeIdError::MissingPrefix => write!(f, "Missing type prefix in node id"),
            NodeIdError::MissingEntity => write!(f, "Missing entity name in node id"),
            NodeIdError::MissingId => write!(f, "Missing raw id value in node id"),
        }
    }
}

impl std::error::Error for NodeIdError {}

/// Deterministic mapping from `(entity, raw id)` to a global node identifier
pub trait NodeIdGenerator: Send + Sync {
    fn generate_node_id(&self, entity: &str, raw_id: &Value) -> String;

    /// Type name the content store files nodes of `entity` under
    fn node_type(&self, entity: &str) -> String;

    /// Prefix used to name the asset link fields
    fn type_prefix(&self) -> &str;
}

/// Default generator: `"{prefix}__{entity}__{raw_id}"`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypePrefixedIds {
    prefix: String,
}

impl TypePrefixedIds {
    pub fn new(prefix: impl Into<String>) -> Self {
        TypePrefixedIds {
            prefix: prefix.into(),
        }
    }
}

impl Default for TypePrefixedIds {
    fn default() -> Self {
        TypePrefixedIds::new(DEFAULT_TYPE_PREFIX)
    }
}

impl NodeIdGenerator for TypePrefixedIds {
    fn generate_node_id(&self, entity: &str, raw_id: &Value) -> String {
        generate_node_id(&self.prefix, entity, raw_id)
    }

    fn node_type(&self, entity: &str) -> String {
        node_type_name(&self.prefix, entity)
    }

    fn type_prefix(&self) -> &str {
        &self.prefix
    }
}

/// Render a scalar the way it appears inside an identifier
///
/// Strings are taken verbatim (no quotes), everything else uses its JSON text.
pub fn render_raw_id(raw_id: &Value) -> String {
    match raw_id {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub fn generate_node_id(prefix: &str, entity: &str, raw_id: &Value) -> String {
    format!(
        "{}{}{}{}{}",
        prefix,
        SEPARATOR,
        entity,
        SEPARATOR,
        render_raw_id(raw_id)
    )
}

/// Parse a node identifier back into `(prefix, entity, raw_id)`
///
/// The raw id portion may itself contain the separator.
///
/// ```
/// use rowgraph::node::node_id::parse_node_id;
///
/// let (prefix, entity, raw) = parse_node_id("sqlite__book__10").unwrap();
/// assert_eq!(prefix, "sqlite");
/// assert_eq!(entity, "book");
/// assert_eq!(raw, "10");
/// ```
pub fn parse_node_id(node_id: &str) -> Result<(String, String, String), NodeIdError> {
    let parts: Vec<&str> = node_id.splitn(3, SEPARATOR).collect();

    if parts.len() != 3 {
        return Err(NodeIdError::InvalidFormat(
            "Expected format 'prefix__entity__id'".to_string(),
        ));
    }

    let (prefix, entity, raw) = (parts[0].trim(), parts[1].trim(), parts[2]);

    if prefix.is_empty() {
        return Err(NodeIdError::MissingPrefix);
    }
    if entity.is_empty() {
        return Err(NodeIdError::MissingEntity);
    }
    if raw.is_empty() {
        return Err(NodeIdError::MissingId);
    }

    Ok((prefix.to_string(), entity.to_string(), raw.to_string()))
}

/// PascalCase type name: `("sqlite", "book_review")` becomes `"SqliteBookReview"`
pub fn node_type_name(prefix: &str, entity: &str) -> String {
    prefix
        .split(|c: char| c == '_' || c == '-' || c.is_whitespace())
        .chain(entity.split(|c: char| c == '_' || c == '-' || c.is_whitespace()))
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}
