//! Shared module - IR model, dataflow framework, ports and diagnostics
//!
//! Everything here is independent of the dependency semantics built on top.

pub mod dataflow;
pub mod diagnostics;
pub mod models;
pub mod ports;

pub use dataflow::{DataflowResult, ForwardAnalysis, ForwardSolver};
pub use diagnostics::{AnalysisCounters, AnalysisReason, Diagnostics};
pub use models::*;
pub use ports::{InMemoryProgram, ProgramRepository};
