//! # Range Analysis
//!
//! Interval / string-literal abstraction of scalar variables plus a
//! forward expression propagation pass. Both feed the dependency analysis
//! when it has to turn `row["name"]` or `schema.IndexOf(3)` into a column.

pub mod application;
pub mod domain;

pub use application::{Expression, ExpressionMap, RangeAnalysis, RangeAnalysisResult};
pub use domain::{RangeValue, VariableRangeDomain};
