pub mod link_fields;
pub mod mapper;
pub mod materialized;
pub mod node_id;

pub use link_fields::{
    asset_link_field, assets_link_field, child_link_field, is_link_field, parent_link_field,
    pluralize, singularize, LINK_SUFFIX,
};
pub use mapper::{map_rows, ChildRows};
pub use materialized::{MaterializedNode, NodeInternal};
pub use node_id::{NodeIdGenerator, TypePrefixedIds, DEFAULT_TYPE_PREFIX};
