//! Runtime type knowledge and per-analysis side tables

pub mod scope_info;
pub mod scope_types;

pub use scope_info::ScopeInfo;
pub use scope_types::ScopeTypes;
