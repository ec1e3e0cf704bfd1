pub mod node;
pub mod points_to_graph;

pub use node::{DelegateTarget, NodeKind, PtgId, PtgNode};
pub use points_to_graph::{NodeSet, PointsToGraph};

use crate::shared::models::{FieldRef, TypeRef};

/// Synthetic field holding the elements of a collection summary
pub const ITEM_FIELD: &str = "$item";
/// Synthetic field linking an enumerator to its collection
pub const COLLECTION_FIELD: &str = "$collection";
/// Synthetic field holding array elements
pub const ARRAY_FIELD: &str = "[]";
/// Synthetic field of the global node recording escaping arguments
pub const ESCAPE_FIELD: &str = "escape";

pub fn item_field() -> FieldRef {
    FieldRef::synthetic(ITEM_FIELD, TypeRef::object())
}

pub fn collection_field() -> FieldRef {
    FieldRef::synthetic(COLLECTION_FIELD, TypeRef::object())
}

pub fn array_field() -> FieldRef {
    FieldRef::synthetic(ARRAY_FIELD, TypeRef::object())
}

pub fn escape_field() -> FieldRef {
    FieldRef::synthetic(ESCAPE_FIELD, TypeRef::object())
}
