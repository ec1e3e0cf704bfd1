//! # Interprocedural Analysis
//!
//! Call target resolution, caller/callee state binding and the manager
//! that runs the dependency analysis of callees on demand.
//!
//! ```text
//! call site ─▶ compute_potential_callees ─▶ do_inter_proc_with_callee
//!                 (points-to receivers)        │ bind caller → callee
//!                                              │ IteratorDependencyAnalysis
//!                                              └ bind callee → caller
//! ```

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::InterproceduralManager;
pub use domain::{CallInfo, CallSiteKey, CallStack, CalleeTarget, InterProcResult, PotentialCallees};
pub use infrastructure::CfgCache;
