pub mod descriptor;
pub mod errors;
pub mod relationships;

pub use descriptor::{
    normalize_descriptors, validate_descriptors, Cardinality, EntityDescriptor, ParentRelation,
};
pub use errors::SchemaError;
pub use relationships::{resolve_children, resolve_parents, ChildRelation};
