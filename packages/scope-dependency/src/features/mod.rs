//! Feature modules, leaf first
//!
//! Each feature keeps the same layout:
//! - domain/         - lattices and value types
//! - application/    - analyses over the shared IR
//! - infrastructure/ - caches and type knowledge

pub mod range_analysis;
pub mod points_to;
pub mod dependency;
pub mod interprocedural;
pub mod processor;
