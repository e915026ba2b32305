//! Resolves which entities hang off a given entity.

use super::descriptor::{Cardinality, EntityDescriptor, ParentRelation};

/// A child entity together with the relation that points it at the parent
#[derive(Debug, Clone, Copy)]
pub struct ChildRelation<'a> {
    pub descriptor: &'a EntityDescriptor,
    pub relation: &'a ParentRelation,
}

impl<'a> ChildRelation<'a> {
    pub fn name(&self) -> &'a str {
        &self.descriptor.name
    }

    pub fn foreign_key(&self) -> &'a str {
        &self.relation.foreign_key
    }

    pub fn cardinality(&self) -> Cardinality {
        self.relation.cardinality
    }
}

/// Every entity declaring `name` as a parent, in descriptor order
///
/// When a child declares several relations to the same parent only the first
/// one is used. An empty result is valid.
pub fn resolve_children<'a>(
    entities: &'a [EntityDescriptor],
    name: &str,
) -> Vec<ChildRelation<'a>> {
    entities
        .iter()
        .filter_map(|descriptor| {
            descriptor
                .relation_to(name)
                .map(|relation| ChildRelation {
                    descriptor,
                    relation,
                })
        })
        .collect()
}

/// Relations of `descriptor` whose parent is among `entities`
///
/// Relations to undeclared parents are dropped here, which leaves them unlinked.
pub fn resolve_parents<'a>(
    entities: &[EntityDescriptor],
    descriptor: &'a EntityDescriptor,
) -> Vec<&'a ParentRelation> {
    descriptor
        .parent_relations
        .iter()
        .filter(|relation| {
            entities
                .iter()
                .any(|entity| entity.name == relation.parent_name)
        })
        .collect()
}
