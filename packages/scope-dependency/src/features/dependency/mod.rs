//! # Dependency Analysis
//!
//! Tracks which input columns every value was computed from:
//!
//! - domain/         traceable tokens, columns, schemas and the lattice
//! - application/    fixed-point driver and per-instruction transfer
//! - infrastructure/ runtime type classification, schema/literal side tables

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::{copy_row, DependencyAnalysisOutcome, IteratorDependencyAnalysis};
pub use domain::{
    Column, ColumnDependencies, ColumnRef, DependencyDomain, DependencyPtgDomain, JsonSource, ProtectedNodes, Schema,
    TableKind, Traceable, TraceableSet,
};
pub use infrastructure::{ScopeInfo, ScopeTypes};
