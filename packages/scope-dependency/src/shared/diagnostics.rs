//! Diagnostics trail
//!
//! Every conservative shortcut (domain set to top, unresolved callee,
//! recursion cut) is recorded as an [`AnalysisReason`]. The trail is
//! threaded explicitly through the analyses instead of living in global
//! state, so independent runs never contaminate each other.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::shared::models::{Instruction, MethodRef};

/// Why the analysis gave up precision at a program point
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisReason {
    pub method: String,
    pub instruction: String,
    pub reason: String,
}

impl AnalysisReason {
    pub fn new(method: &MethodRef, instruction: &Instruction, reason: impl Into<String>) -> Self {
        Self {
            method: method.name.clone(),
            instruction: instruction.to_string(),
            reason: reason.into(),
        }
    }

    /// Reason without an instruction context (method level)
    pub fn for_method(method: &MethodRef, reason: impl Into<String>) -> Self {
        Self {
            method: method.name.clone(),
            instruction: String::new(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for AnalysisReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}:{}] = {}", self.method, self.instruction, self.reason)
    }
}

/// Counters collected over a run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisCounters {
    pub dependency_errors: usize,
    pub resolved_methods: usize,
    pub unresolved_methods: usize,
    pub analyzed_callees: usize,
    pub memo_hits: usize,
}

/// Append-only diagnostics context
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    reasons: Vec<AnalysisReason>,
    pub counters: AnalysisCounters,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, reason: AnalysisReason) {
        self.counters.dependency_errors += 1;
        self.reasons.push(reason);
    }

    pub fn reasons(&self) -> &[AnalysisReason] {
        &self.reasons
    }

    pub fn is_empty(&self) -> bool {
        self.reasons.is_empty()
    }

    pub fn len(&self) -> usize {
        self.reasons.len()
    }

    /// Any recorded reason containing `needle`
    pub fn mentions(&self, needle: &str) -> bool {
        self.reasons.iter().any(|r| r.reason.contains(needle))
    }

    /// Absorb another trail (e.g. from a nested run)
    pub fn extend(&mut self, other: Diagnostics) {
        self.reasons.extend(other.reasons);
        self.counters.dependency_errors += other.counters.dependency_errors;
        self.counters.resolved_methods += other.counters.resolved_methods;
        self.counters.unresolved_methods += other.counters.unresolved_methods;
        self.counters.analyzed_callees += other.counters.analyzed_callees;
        self.counters.memo_hits += other.counters.memo_hits;
    }
}
