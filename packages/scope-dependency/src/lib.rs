/*
 * Scope Dependency - column dependency analysis of row processors
 *
 * Feature-First Architecture:
 * - shared/   : IR model, dataflow framework, ports, diagnostics
 * - features/ : range_analysis → points_to → dependency → interprocedural → processor
 * - config/   : AnalysisConfig (YAML)
 *
 * A processor is a compiled iterator: its entry method hands out an
 * enumerator whose MoveNext reads input rows and yields output rows. The
 * analysis reports, per output column, which input columns it depends on
 * (data), which ones guard the write (control) and what escapes.
 */

#![allow(clippy::too_many_arguments)] // Binding helpers take the whole call context
#![allow(clippy::module_inception)] // Module naming intentional
#![allow(clippy::new_without_default)] // Default impl not always needed
#![allow(clippy::unnecessary_map_or)] // map_or style for compatibility

// ═══════════════════════════════════════════════════════════════════════════
// Module Exports
// ═══════════════════════════════════════════════════════════════════════════

pub mod config;
pub mod errors;
pub mod features;
pub mod shared;

pub use config::{AnalysisConfig, ConfigError, ConfigResult};
pub use errors::{AnalysisFailure, Result};
pub use features::dependency::{
    Column, ColumnRef, DependencyDomain, DependencyPtgDomain, Schema, TableKind, Traceable, TraceableSet,
};
pub use features::interprocedural::InterproceduralManager;
pub use features::processor::{
    DependencyReport, ProcessorAnalyzer, ProcessorError, ProcessorInfo, ProcessorResult, ReportedColumn,
};
pub use features::range_analysis::RangeValue;
pub use shared::diagnostics::{AnalysisReason, Diagnostics};
pub use shared::ports::{InMemoryProgram, ProgramRepository};
