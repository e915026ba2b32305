use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Bookkeeping the content store reads alongside the node's fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeInternal {
    #[serde(rename = "type")]
    pub node_type: String,
    /// SHA-256 of the node's fields, lets the store skip unchanged nodes
    pub content_digest: String,
    /// Set by the content store once it has accepted the node
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
}

/// Store-ready representation of one row
///
/// `fields` holds every original column plus `id` (the raw id value) and the
/// link fields; `id` on the struct is the global node identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterializedNode {
    pub id: String,
    pub entity: String,
    pub fields: Map<String, Value>,
    pub internal: NodeInternal,
}

impl MaterializedNode {
    pub fn new(
        id: impl Into<String>,
        entity: impl Into<String>,
        node_type: impl Into<String>,
        fields: Map<String, Value>,
    ) -> Self {
        let content_digest = content_digest(&fields);
        MaterializedNode {
            id: id.into(),
            entity: entity.into(),
            fields,
            internal: NodeInternal {
                node_type: node_type.into(),
                content_digest,
                owner: None,
            },
        }
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Insert or replace a field, keeping the digest in step
    pub fn set_field(&mut self, name: impl Into<String>, value: Value) {
        self.fields.insert(name.into(), value);
        self.internal.content_digest = content_digest(&self.fields);
    }

    pub fn owner(&self) -> Option<&str> {
        self.internal.owner.as_deref()
    }

    /// Drop the ownership marker left by a previous run's store
    pub fn clear_owner(&mut self) {
        self.internal.owner = None;
    }
}

/// Hex SHA-256 of the fields' JSON text (insertion ordered)
pub fn content_digest(fields: &Map<String, Value>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(Value::Object(fields.clone()).to_string().as_bytes());
    hex::encode(hasher.finalize())
}
