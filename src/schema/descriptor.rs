//! Entity descriptors: the static contract for each query feeding the graph.
//!
//! Descriptors are declared in YAML (or JSON) configuration:
//!
//! ```yaml
//! entities:
//!   - name: author
//!     statement: SELECT id, name FROM authors
//!     id_field_name: id
//!   - name: book
//!     statement: SELECT id, title, author_id, cover_url FROM books
//!     id_field_name: id
//!     parent_relations:
//!       - parent_name: author
//!         foreign_key: author_id
//!         cardinality: OneToMany
//!     remote_asset_field_names: [cover_url]
//! ```
//!
//! The older single-parent form (`parent_name` + `foreign_key` directly on the
//! entity) is still accepted and folded into `parent_relations` by
//! [`normalize_descriptors`].

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::errors::SchemaError;

/// How many child nodes a parent links to through one relation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Cardinality {
    /// Parent carries a plural list link to every matching child
    #[default]
    #[serde(alias = "one_to_many")]
    OneToMany,
    /// Parent carries a singular link to the first matching child
    #[serde(alias = "one_to_one")]
    OneToOne,
}

/// One parent declared by a child entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentRelation {
    #[serde(alias = "parentName")]
    pub parent_name: String,
    /// Column on the child rows holding the parent's id value
    #[serde(alias = "foreignKey")]
    pub foreign_key: String,
    /// Missing in configuration means `OneToMany`
    #[serde(default)]
    pub cardinality: Cardinality,
}

impl ParentRelation {
    pub fn new(
        parent_name: impl Into<String>,
        foreign_key: impl Into<String>,
        cardinality: Cardinality,
    ) -> Self {
        ParentRelation {
            parent_name: parent_name.into(),
            foreign_key: foreign_key.into(),
            cardinality,
        }
    }
}

/// Declarative schema for one query and the entity it materializes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityDescriptor {
    /// Entity name, also the namespace of its node identifiers
    pub name: String,
    /// Statement executed verbatim by the query engine
    pub statement: String,
    /// Column carrying the row's primary key
    #[serde(alias = "idFieldName")]
    pub id_field_name: String,
    #[serde(default, alias = "parents", alias = "parentRelations")]
    pub parent_relations: Vec<ParentRelation>,
    /// Columns holding URLs of remote assets to attach to each node
    #[serde(
        default,
        alias = "remote_image_field_names",
        alias = "remoteImageFieldNames",
        alias = "remoteAssetFieldNames"
    )]
    pub remote_asset_field_names: Vec<String>,
    /// Legacy single-parent declaration (deprecated, use `parent_relations`)
    #[serde(default, alias = "parentName", skip_serializing_if = "Option::is_none")]
    pub parent_name: Option<String>,
    /// Legacy single-parent foreign key (deprecated, use `parent_relations`)
    #[serde(default, alias = "foreignKey", skip_serializing_if = "Option::is_none")]
    pub foreign_key: Option<String>,
}

impl EntityDescriptor {
    pub fn new(
        name: impl Into<String>,
        statement: impl Into<String>,
        id_field_name: impl Into<String>,
    ) -> Self {
        EntityDescriptor {
            name: name.into(),
            statement: statement.into(),
            id_field_name: id_field_name.into(),
            parent_relations: Vec::new(),
            remote_asset_field_names: Vec::new(),
            parent_name: None,
            foreign_key: None,
        }
    }

    pub fn with_parent(
        mut self,
        parent_name: impl Into<String>,
        foreign_key: impl Into<String>,
        cardinality: Cardinality,
    ) -> Self {
        self.parent_relations
            .push(ParentRelation::new(parent_name, foreign_key, cardinality));
        self
    }

    pub fn with_asset_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.remote_asset_field_names
            .extend(fields.into_iter().map(Into::into));
        self
    }

    /// First relation (in declaration order) pointing at `parent`
    pub fn relation_to(&self, parent: &str) -> Option<&ParentRelation> {
        self.parent_relations
            .iter()
            .find(|relation| relation.parent_name == parent)
    }

    /// Fold the legacy `parent_name`/`foreign_key` pair into `parent_relations`
    fn normalize(mut self) -> Self {
        let legacy_parent = self.parent_name.take();
        let legacy_key = self.foreign_key.take();

        if let (Some(parent), Some(key)) = (legacy_parent, legacy_key) {
            if !parent.is_empty() && self.relation_to(&parent).is_none() {
                self.parent_relations
                    .push(ParentRelation::new(parent, key, Cardinality::default()));
            }
        }

        self
    }
}

/// Normalize legacy declarations and validate the descriptor list as a whole
pub fn normalize_descriptors(
    descriptors: Vec<EntityDescriptor>,
) -> Result<Vec<EntityDescriptor>, SchemaError> {
    let descriptors: Vec<EntityDescriptor> = descriptors
        .into_iter()
        .map(EntityDescriptor::normalize)
        .collect();
    validate_descriptors(&descriptors)?;
    Ok(descriptors)
}

/// Structural validation of a descriptor list
///
/// Parents that match no declared entity are reported with a warning only.
pub fn validate_descriptors(descriptors: &[EntityDescriptor]) -> Result<(), SchemaError> {
    let mut seen = HashSet::new();

    for (index, descriptor) in descriptors.iter().enumerate() {
        if descriptor.name.trim().is_empty() {
            return Err(SchemaError::EmptyName { index });
        }
        if !seen.insert(descriptor.name.as_str()) {
            return Err(SchemaError::DuplicateEntity {
                entity: descriptor.name.clone(),
            });
        }
        if descriptor.statement.trim().is_empty() {
            return Err(SchemaError::EmptyStatement {
                entity: descriptor.name.clone(),
            });
        }
        if descriptor.id_field_name.trim().is_empty() {
            return Err(SchemaError::EmptyIdField {
                entity: descriptor.name.clone(),
            });
        }

        for relation in &descriptor.parent_relations {
            if relation.parent_name.trim().is_empty() {
                return Err(SchemaError::EmptyParentName {
                    entity: descriptor.name.clone(),
                });
            }
            if relation.foreign_key.trim().is_empty() {
                return Err(SchemaError::EmptyForeignKey {
                    entity: descriptor.name.clone(),
                    parent: relation.parent_name.clone(),
                });
            }
        }
    }

    for descriptor in descriptors {
        for relation in &descriptor.parent_relations {
            if !seen.contains(relation.parent_name.as_str()) {
                log::warn!(
                    "Entity `{}` declares unknown parent `{}`; the relation will not be linked",
                    descriptor.name,
                    relation.parent_name
                );
            }
        }
    }

    Ok(())
}
