pub mod column;
pub mod dependency_domain;
pub mod dependency_ptg_domain;
pub mod protected_nodes;
pub mod schema;
pub mod traceable;

pub use column::{Column, ColumnInfo};
pub use dependency_domain::{add_range, DependencyDomain, Location, TraceableMap};
pub use dependency_ptg_domain::{ColumnDependencies, DependencyPtgDomain};
pub use protected_nodes::ProtectedNodes;
pub use schema::Schema;
pub use traceable::{non_other, tables, ColumnRef, JsonSource, TableKind, Traceable, TraceableSet};
