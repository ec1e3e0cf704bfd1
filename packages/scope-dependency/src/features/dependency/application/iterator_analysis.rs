/*
 * Iterator Dependency Analysis
 *
 * Forward dataflow over DependencyPtgDomain for one method body (the
 * processor's MoveNext, or a callee analyzed on behalf of a call site).
 *
 * Per block:
 * 1. Top inputs pass through untouched
 * 2. Snapshot the iterator state, reset the points-to transfer
 * 3. Visit instructions (points-to step first, then dependencies)
 * 4. A block that ran out of information is not committed; it is
 *    retried on its next visit and goes top once the retries are spent
 */

use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, warn};

use super::visitor::BlockVisitor;
use crate::features::dependency::domain::{
    ColumnRef, DependencyDomain, DependencyPtgDomain, ProtectedNodes, Schema, TableKind, Traceable, TraceableSet,
};
use crate::features::dependency::infrastructure::ScopeInfo;
use crate::features::interprocedural::InterproceduralManager;
use crate::features::points_to::{PointsToGraph, PointsToTransfer, PtgId};
use crate::features::range_analysis::{ExpressionMap, RangeAnalysis, RangeAnalysisResult, RangeValue};
use crate::shared::dataflow::{ForwardAnalysis, ForwardSolver};
use crate::shared::diagnostics::AnalysisReason;
use crate::shared::models::{Cfg, CfgNode, FieldRef, MethodBody, NodeId, TypeRef, Variable};

/// Exit state and column sets of one analyzed body
#[derive(Debug, Clone)]
pub struct DependencyAnalysisOutcome {
    pub state: DependencyPtgDomain,
    pub input_columns: BTreeSet<ColumnRef>,
    pub output_columns: BTreeSet<ColumnRef>,
    pub converged: bool,
    pub return_variable: Variable,
}

pub struct IteratorDependencyAnalysis<'m> {
    pub(super) manager: &'m mut InterproceduralManager,
    pub(super) body: Arc<MethodBody>,
    pub(super) transfer: PointsToTransfer,
    pub(super) ranges: Option<RangeAnalysisResult>,
    pub(super) equalities: Option<ExpressionMap>,
    pub(super) scope_info: ScopeInfo,
    pub(super) protected: Arc<ProtectedNodes>,
    pub(super) iterator_class: TypeRef,
    pub(super) return_variable: Variable,
    pub(super) input_columns: BTreeSet<ColumnRef>,
    pub(super) output_columns: BTreeSet<ColumnRef>,
    init_value: Option<DependencyPtgDomain>,
    base_ptg: Option<PointsToGraph>,
    visits: FxHashMap<NodeId, usize>,
    unresolved_blocks: FxHashSet<NodeId>,
}

impl<'m> IteratorDependencyAnalysis<'m> {
    pub fn new(manager: &'m mut InterproceduralManager, body: Arc<MethodBody>, protected: Arc<ProtectedNodes>) -> Self {
        let transfer = PointsToTransfer::new(&body);
        let return_variable = transfer.return_variable().clone();
        let iterator_class = body.method.containing_type.clone();
        Self {
            manager,
            body,
            transfer,
            ranges: None,
            equalities: None,
            scope_info: ScopeInfo::new(),
            protected,
            iterator_class,
            return_variable,
            input_columns: BTreeSet::new(),
            output_columns: BTreeSet::new(),
            init_value: None,
            base_ptg: None,
            visits: FxHashMap::default(),
            unresolved_blocks: FxHashSet::default(),
        }
    }

    pub fn with_ranges(mut self, ranges: RangeAnalysisResult) -> Self {
        self.ranges = Some(ranges);
        self
    }

    pub fn with_equalities(mut self, equalities: ExpressionMap) -> Self {
        self.equalities = Some(equalities);
        self
    }

    /// Entry state bound by a caller. Its graph becomes the base graph.
    pub fn with_init_value(mut self, state: DependencyPtgDomain) -> Self {
        self.base_ptg = Some(state.ptg.clone());
        self.init_value = Some(state);
        self
    }

    /// Graph whose current frame already binds the parameters
    pub fn with_base_graph(mut self, ptg: PointsToGraph) -> Self {
        self.base_ptg = Some(ptg);
        self
    }

    pub fn with_scope_info(mut self, scope_info: ScopeInfo) -> Self {
        self.scope_info = scope_info;
        self
    }

    pub fn analyze(mut self, cfg: &Cfg) -> DependencyAnalysisOutcome {
        let iterations = self.manager.config().max_fixpoint_iterations;
        if self.ranges.is_none() {
            self.ranges = Some(RangeAnalysis::new(&self.body.method).analyze(cfg, iterations));
        }
        if self.equalities.is_none() {
            self.equalities = Some(ExpressionMap::propagate(cfg));
        }
        if let Some(mut init) = self.init_value.take() {
            self.init_variables_with_taint(cfg, &mut init);
            self.init_value = Some(init);
        }

        let result = ForwardSolver::new(iterations).solve(cfg, &mut self);
        debug!(
            method = %self.body.method,
            iterations = result.iterations,
            converged = result.converged,
            "dependency analysis finished"
        );

        let mut state = match result.exit_output(cfg) {
            Some(exit) => exit.clone(),
            None => match cfg.node(cfg.entry()) {
                Some(entry) => self.initial_value(entry),
                None => DependencyPtgDomain::default(),
            },
        };

        if !self.unresolved_blocks.is_empty() && !state.is_top() {
            let mut blocks: Vec<NodeId> = self.unresolved_blocks.iter().copied().collect();
            blocks.sort_unstable();
            let reason = AnalysisReason::for_method(
                &self.body.method,
                format!("Blocks {:?} never resolved their tables", blocks),
            );
            warn!(%reason, "unresolved blocks, dependency domain set to top");
            self.manager.record(reason);
            state.set_top();
        }
        if !result.converged && !state.is_top() {
            let reason = AnalysisReason::for_method(&self.body.method, "Dependency analysis did not converge");
            warn!(%reason, "iteration bound reached, dependency domain set to top");
            self.manager.record(reason);
            state.set_top();
        }

        DependencyAnalysisOutcome {
            state,
            input_columns: self.input_columns,
            output_columns: self.output_columns,
            converged: result.converged,
            return_variable: self.return_variable,
        }
    }

    // ═══════════════════════════════════════════════════════════════════
    // Lookups shared with the visitor
    // ═══════════════════════════════════════════════════════════════════

    /// Range of `variable` at the end of block `node`
    pub(super) fn range_at(&self, node: NodeId, variable: &Variable) -> RangeValue {
        self.ranges
            .as_ref()
            .map_or_else(RangeValue::bottom, |r| r.node_output(node).get(variable))
    }

    pub(super) fn equalities(&self) -> Option<&ExpressionMap> {
        self.equalities.as_ref()
    }

    /// Fields the iterator (or the closures generated next to it) owns
    pub(super) fn is_closure_field(&self, instance: &Variable, field: &FieldRef) -> bool {
        if self.manager.scope_types().is_scope_type(&field.ty) {
            return true;
        }
        let iterator = &self.iterator_class;
        if instance.ty.as_ref().map_or(false, |t| t.same_definition(iterator)) {
            return true;
        }
        if field.containing_type.same_definition(iterator) {
            return true;
        }
        let Some(outer) = iterator.outer() else {
            return false;
        };
        if field.containing_type.same_definition(outer) {
            return true;
        }
        instance.ty.as_ref().map_or(false, |t| {
            t.compiler_generated && t.outer().map_or(false, |o| o.same_definition(outer))
        })
    }

    pub(super) fn is_closure_internal_field(&self, field: &FieldRef) -> bool {
        field.containing_type.same_definition(&self.iterator_class)
    }

    pub(super) fn add_columns(&mut self, columns: &TraceableSet) {
        for token in columns {
            if let Traceable::Column(column) = token {
                match column.table {
                    TableKind::Input => {
                        self.input_columns.insert(column.clone());
                    }
                    TableKind::Output => {
                        self.output_columns.insert(column.clone());
                    }
                    _ => {}
                }
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════════
    // Entry state
    // ═══════════════════════════════════════════════════════════════════

    /// Constant-like locals start with an `Other` token describing their
    /// value so pass-through checks can tell them from column data
    fn init_variables_with_taint(&self, cfg: &Cfg, state: &mut DependencyPtgDomain) {
        let exit_ranges = self.ranges.as_ref().map(|r| r.exit_input());
        for variable in cfg.variables() {
            if state.has_traceables(&variable) {
                continue;
            }
            let Some(ty) = variable.ty.as_ref() else {
                state.assign_traceables(&variable, [Traceable::other("null")].into_iter().collect());
                continue;
            };
            if self.manager.scope_types().is_scope_type(ty) || variable.is_parameter {
                continue;
            }
            if ty.is_class_or_struct() && !ty.is_string() {
                continue;
            }
            let range = exit_ranges.map_or_else(RangeValue::bottom, |r| r.get(&variable));
            let label = if range.is_bottom() || range.is_top() {
                ty.display_name()
            } else if let Some(literal) = range.as_literal() {
                literal.to_string()
            } else if let Some(lower) = range.lower_bound() {
                lower.to_string()
            } else {
                ty.display_name()
            };
            state.assign_traceables(&variable, [Traceable::Other(label)].into_iter().collect());
        }
    }

    /// `Table(kind)` on every field of `this` that points to a protected row
    fn seed_protected_fields(&self, state: &mut DependencyPtgDomain) {
        let Some(this) = self.body.this_parameter() else {
            return;
        };
        let mut seeds: Vec<(PtgId, FieldRef, TableKind)> = Vec::new();
        for node in state.ptg.non_null_targets(this) {
            for (field, targets) in state.ptg.fields_of(&node) {
                for target in targets {
                    if let Some(kind) = self.protected.kind(target) {
                        seeds.push((node.clone(), field.clone(), kind));
                    }
                }
            }
        }
        for (node, field, kind) in seeds {
            let tokens: TraceableSet = [Traceable::Table(kind)].into_iter().collect();
            state.add_node_heap_traceables(&node, &field, &tokens);
        }
    }
}

/// Bind every input column to an output column of the same name:
/// `target.CopyTo(output)` or a yielded input row
pub fn copy_row(
    state: &mut DependencyPtgDomain,
    target: &Variable,
    schema: &Schema,
    input: TableKind,
    output: TableKind,
) -> Vec<(ColumnRef, ColumnRef)> {
    let control = state.control_traceables();
    let mut copied = Vec::with_capacity(schema.len());
    for column in schema.columns() {
        let read = ColumnRef::new(input, column.clone());
        let written = ColumnRef::new(output, column.clone());
        let temporary = Variable::local(format!("{}_${}", target.name, column), TypeRef::void());

        state.assign_traceables(&temporary, [Traceable::Column(written.clone())].into_iter().collect());
        state.add_output_traceables(&temporary, &[Traceable::Column(read.clone())].into_iter().collect());
        state.add_output_control_traceables(&temporary, &control);
        copied.push((read, written));
    }
    copied
}

impl ForwardAnalysis for IteratorDependencyAnalysis<'_> {
    type Domain = DependencyPtgDomain;

    fn initial_value(&mut self, _node: &CfgNode) -> DependencyPtgDomain {
        if let Some(init) = &self.init_value {
            let mut state = init.clone();
            state.ptg = self.transfer.initial_graph(&self.body.cfg, self.base_ptg.as_ref());
            return state;
        }

        let ptg = self.transfer.initial_graph(&self.body.cfg, self.base_ptg.as_ref());
        let mut state = DependencyPtgDomain::new(DependencyDomain::new(), ptg);
        self.seed_protected_fields(&mut state);
        self.init_variables_with_taint(&self.body.cfg, &mut state);
        state
    }

    fn join(&mut self, left: &DependencyPtgDomain, right: &DependencyPtgDomain) -> DependencyPtgDomain {
        left.join(right)
    }

    fn less_equal(&self, left: &DependencyPtgDomain, right: &DependencyPtgDomain) -> bool {
        left.less_equal(right)
    }

    fn flow(&mut self, node: &CfgNode, input: DependencyPtgDomain) -> DependencyPtgDomain {
        if input.is_top() {
            return input;
        }
        let visits = self.visits.get(&node.id).copied().unwrap_or(0);

        let mut state = input.clone();
        state.block_state = state.iterator_state.clone();
        self.transfer.reset();

        let mut visitor = BlockVisitor::new(self, state, node.id, visits);
        let valid = visitor.visit_block(&node.instructions);
        let output = visitor.into_state();

        self.visits.insert(node.id, visits + 1);
        if valid {
            self.unresolved_blocks.remove(&node.id);
            output
        } else {
            debug!(node = node.id, visits, "block deferred until more information reaches it");
            self.unresolved_blocks.insert(node.id);
            input
        }
    }
}
