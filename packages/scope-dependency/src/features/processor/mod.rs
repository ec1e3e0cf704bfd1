//! # Processor Driver
//!
//! Runs the whole pipeline for one processor and shapes the result.
//!
//! ```text
//! entry method ─▶ points-to ─▶ GetEnumerator (interprocedural PTA)
//!                                   │ protected input / output nodes
//!                                   ▼
//! MoveNext + exit→entry edge ─▶ ranges, expressions ─▶ dependency analysis
//!                                   │ CopyRow fallback for yielded input rows
//!                                   ▼
//!                            DependencyReport
//! ```

pub mod application;
pub mod domain;

pub use application::{ProcessorAnalysis, ProcessorAnalyzer};
pub use domain::{
    ColumnDependency, DependencyReport, ProcessorError, ProcessorInfo, ProcessorResult, ReportSummary, ReportedColumn,
};
