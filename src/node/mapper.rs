//! Row-to-node mapping.
//!
//! Projects each raw row of an entity into a [`MaterializedNode`] carrying the
//! original columns, `id`, one parent link per resolved parent relation and one
//! child link per child entity. Output order follows row order.

use std::collections::{HashMap, HashSet};

use serde_json::Value;

use super::link_fields::{child_link_field, parent_link_field};
use super::materialized::MaterializedNode;
use super::node_id::NodeIdGenerator;
use crate::schema::{Cardinality, ChildRelation, EntityDescriptor, ParentRelation};
use crate::source::RawRow;

/// A child entity and the rows its query returned
#[derive(Debug, Clone, Copy)]
pub struct ChildRows<'a> {
    pub child: ChildRelation<'a>,
    pub rows: &'a [RawRow],
}

/// Child node ids grouped by the foreign key value they point at
struct ChildIndex {
    field: String,
    cardinality: Cardinality,
    by_parent: HashMap<String, Vec<Value>>,
}

impl ChildIndex {
    fn build<G: NodeIdGenerator + ?Sized>(child_rows: &ChildRows<'_>, ids: &G) -> Self {
        let child = child_rows.child;
        let mut by_parent: HashMap<String, Vec<Value>> = HashMap::new();

        for row in child_rows.rows {
            // Rows without the foreign key column never match
            let Some(key) = row.get(child.foreign_key()).and_then(match_key) else {
                continue;
            };
            let child_id = row
                .get(&child.descriptor.id_field_name)
                .unwrap_or(&Value::Null);
            by_parent
                .entry(key)
                .or_default()
                .push(Value::String(ids.generate_node_id(child.name(), child_id)));
        }

        ChildIndex {
            field: child_link_field(child.name(), child.cardinality()),
            cardinality: child.cardinality(),
            by_parent,
        }
    }

    fn link_value(&self, parent_id: &Value) -> Option<Value> {
        let matched = match_key(parent_id).and_then(|key| self.by_parent.get(&key));

        match self.cardinality {
            Cardinality::OneToMany => Some(Value::Array(matched.cloned().unwrap_or_default())),
            Cardinality::OneToOne => matched.and_then(|ids| ids.first().cloned()),
        }
    }
}

/// Equality key for scalar values
///
/// Numbers compare by value regardless of integer/float representation,
/// strings never equal numbers, and null or composite values never match.
pub fn match_key(value: &Value) -> Option<String> {
    match value {
        Value::Null | Value::Array(_) | Value::Object(_) => None,
        Value::Bool(b) => Some(format!("b:{}", b)),
        Value::String(s) => Some(format!("s:{}", s)),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(format!("n:{}", i))
            } else if let Some(u) = n.as_u64() {
                Some(format!("n:{}", u))
            } else {
                let f = n.as_f64()?;
                if f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 {
                    Some(format!("n:{}", f as i64))
                } else {
                    Some(format!("n:{}", f))
                }
            }
        }
    }
}

/// Map every row of `descriptor` to a node
///
/// `parents` must only hold relations whose parent entity exists; `children`
/// comes from [`crate::schema::resolve_children`] joined with the child rows.
pub fn map_rows<G: NodeIdGenerator + ?Sized>(
    descriptor: &EntityDescriptor,
    rows: &[RawRow],
    parents: &[&ParentRelation],
    children: &[ChildRows<'_>],
    ids: &G,
) -> Vec<MaterializedNode> {
    let indexes: Vec<ChildIndex> = children
        .iter()
        .map(|child_rows| ChildIndex::build(child_rows, ids))
        .collect();
    // One link per parent name; the first declared relation wins, as in
    // resolve_children
    let mut linked_parents = HashSet::new();
    let parents: Vec<&ParentRelation> = parents
        .iter()
        .copied()
        .filter(|relation| linked_parents.insert(relation.parent_name.as_str()))
        .collect();
    let node_type = ids.node_type(&descriptor.name);
    let mut missing_ids = 0usize;

    let nodes = rows
        .iter()
        .map(|row| {
            let raw_id = match row.get(&descriptor.id_field_name) {
                Some(value) => value.clone(),
                None => {
                    missing_ids += 1;
                    Value::Null
                }
            };

            let mut fields = row.clone();
            fields.insert("id".to_string(), raw_id.clone());

            for relation in &parents {
                match row.get(&relation.foreign_key) {
                    Some(parent_key) if !parent_key.is_null() => {
                        fields.insert(
                            parent_link_field(&relation.parent_name),
                            Value::String(ids.generate_node_id(&relation.parent_name, parent_key)),
                        );
                    }
                    _ => {}
                }
            }

            for index in &indexes {
                if let Some(value) = index.link_value(&raw_id) {
                    fields.insert(index.field.clone(), value);
                }
            }

            MaterializedNode::new(
                ids.generate_node_id(&descriptor.name, &raw_id),
                descriptor.name.clone(),
                node_type.clone(),
                fields,
            )
        })
        .collect();

    if missing_ids > 0 {
        log::warn!(
            "{} rows of `{}` have no `{}` column; their ids fall back to null",
            missing_ids,
            descriptor.name,
            descriptor.id_field_name
        );
    }

    nodes
}
