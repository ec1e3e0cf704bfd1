//! Dependency analysis of iterator bodies

mod calls;
mod handlers;
mod iterator_analysis;
mod visitor;

pub use iterator_analysis::{copy_row, DependencyAnalysisOutcome, IteratorDependencyAnalysis};
