//! Call descriptions exchanged between the dependency analysis and the
//! interprocedural manager

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::features::dependency::domain::{ColumnRef, DependencyPtgDomain, ProtectedNodes};
use crate::features::dependency::infrastructure::ScopeInfo;
use crate::features::range_analysis::RangeValue;
use crate::shared::models::{Instruction, MethodRef, Variable};

/// One call site bound to one resolved callee
#[derive(Debug, Clone)]
pub struct CallInfo<'a> {
    pub caller: &'a MethodRef,
    pub callee: MethodRef,
    pub instruction: &'a Instruction,
    /// Actual arguments, receiver first for instance callees
    pub arguments: Vec<Variable>,
    /// Caller ranges of `arguments`, same order
    pub argument_ranges: Vec<RangeValue>,
    pub result: Option<Variable>,
    pub caller_state: &'a DependencyPtgDomain,
    pub scope_info: &'a ScopeInfo,
    pub protected: Arc<ProtectedNodes>,
}

impl CallInfo<'_> {
    /// Memo key of this call site
    pub fn site_key(&self) -> CallSiteKey {
        CallSiteKey {
            caller: self.caller.signature(),
            offset: self.instruction.offset,
            callee: self.callee.signature(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallSiteKey {
    pub caller: String,
    pub offset: u32,
    pub callee: String,
}

/// Caller state after the call plus the columns the callee touched
#[derive(Debug, Clone, Default)]
pub struct InterProcResult {
    pub state: DependencyPtgDomain,
    pub input_columns: BTreeSet<ColumnRef>,
    pub output_columns: BTreeSet<ColumnRef>,
}

impl InterProcResult {
    /// Result that leaves the caller untouched
    pub fn unchanged(state: DependencyPtgDomain) -> Self {
        Self {
            state,
            ..Self::default()
        }
    }
}

/// A resolved implementation. Delegate targets carry the captured receiver
/// that replaces the delegate object as first argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalleeTarget {
    pub method: MethodRef,
    pub receiver: Option<Variable>,
}

impl CalleeTarget {
    pub fn direct(method: MethodRef) -> Self {
        Self { method, receiver: None }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PotentialCallees {
    pub resolved: Vec<CalleeTarget>,
    pub unresolved: Vec<MethodRef>,
}

impl PotentialCallees {
    /// Every candidate has a body to analyze
    pub fn fully_resolved(&self) -> bool {
        !self.resolved.is_empty() && self.unresolved.is_empty()
    }
}
