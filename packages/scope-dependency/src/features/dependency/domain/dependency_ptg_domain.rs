//! Dependency domain paired with the points-to graph
//!
//! Variable tokens are read through aliases; reference variables also
//! carry the tokens of the objects they point to. Heap tokens live on
//! scalar fields (A3) or, for reference fields, on the target objects.

use rustc_hash::FxHashMap;

use super::dependency_domain::{add_range, DependencyDomain, Location};
use super::traceable::{ColumnRef, TableKind, TraceableSet};
use crate::features::points_to::{PointsToGraph, PtgId};
use crate::features::range_analysis::RangeValue;
use crate::shared::models::{FieldRef, Variable};

/// Output column → tokens it was written from
pub type ColumnDependencies = FxHashMap<ColumnRef, TraceableSet>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyPtgDomain {
    pub dependencies: DependencyDomain,
    pub ptg: PointsToGraph,
    /// Value last stored into the iterator `<>1__state` field
    pub iterator_state: RangeValue,
    pub block_state: RangeValue,
}

impl Default for DependencyPtgDomain {
    fn default() -> Self {
        Self::new(DependencyDomain::new(), PointsToGraph::new())
    }
}

impl DependencyPtgDomain {
    pub fn new(dependencies: DependencyDomain, ptg: PointsToGraph) -> Self {
        Self {
            dependencies,
            ptg,
            iterator_state: RangeValue::Bottom,
            block_state: RangeValue::Bottom,
        }
    }

    pub fn is_top(&self) -> bool {
        self.dependencies.is_top()
    }

    pub fn set_top(&mut self) {
        self.dependencies.set_top();
    }

    pub fn join(&self, right: &DependencyPtgDomain) -> DependencyPtgDomain {
        DependencyPtgDomain {
            dependencies: self.dependencies.join(&right.dependencies),
            ptg: self.ptg.join(&right.ptg),
            iterator_state: self.iterator_state.join(&right.iterator_state),
            block_state: self.block_state.join(&right.block_state),
        }
    }

    pub fn less_equal(&self, other: &DependencyPtgDomain) -> bool {
        self.dependencies.less_equal(&other.dependencies) && self.ptg.less_equal(&other.ptg)
    }

    // ═══════════════════════════════════════════════════════════════════
    // Variables
    // ═══════════════════════════════════════════════════════════════════

    pub fn has_traceables(&self, variable: &Variable) -> bool {
        self.dependencies
            .variables
            .get(variable)
            .map_or(false, |t| !t.is_empty())
    }

    /// Tokens of `variable` and its aliases, plus those of the objects it
    /// points to
    pub fn get_traceables(&self, variable: &Variable) -> TraceableSet {
        let mut union = TraceableSet::new();
        for alias in self.ptg.aliases(variable) {
            if let Some(tokens) = self.dependencies.variables.get(&alias) {
                union.extend(tokens.iter().cloned());
            }
        }
        if variable.is_reference() {
            for node in self.ptg.non_null_targets(variable) {
                if let Some(tokens) = self.dependencies.references.get(&node) {
                    union.extend(tokens.iter().cloned());
                }
            }
        }
        union
    }

    /// Strong update of the variable; the pointed objects accumulate
    pub fn assign_traceables(&mut self, destination: &Variable, tokens: TraceableSet) {
        if destination.is_reference() {
            for node in self.ptg.non_null_targets(destination) {
                add_range(&mut self.dependencies.references, &node, tokens.iter().cloned());
            }
        }
        self.dependencies.variables.insert(destination.clone(), tokens);
    }

    pub fn add_traceables(&mut self, destination: &Variable, tokens: &TraceableSet) {
        add_range(&mut self.dependencies.variables, destination, tokens.iter().cloned());
        if destination.is_reference() {
            for node in self.ptg.non_null_targets(destination) {
                add_range(&mut self.dependencies.references, &node, tokens.iter().cloned());
            }
        }
    }

    pub fn copy_traceables(&mut self, destination: &Variable, source: &Variable) {
        let tokens = self.get_traceables(source);
        self.assign_traceables(destination, tokens);
    }

    pub fn add_traceables_from(&mut self, destination: &Variable, source: &Variable) {
        let tokens = self.get_traceables(source);
        self.add_traceables(destination, &tokens);
    }

    // ═══════════════════════════════════════════════════════════════════
    // Heap
    // ═══════════════════════════════════════════════════════════════════

    /// Weak update of `variable.field` on every object of `variable`.
    /// Returns false when `variable` points nowhere.
    pub fn add_heap_traceables(&mut self, variable: &Variable, field: &FieldRef, tokens: &TraceableSet) -> bool {
        let nodes = self.ptg.targets(variable);
        if nodes.is_empty() {
            return false;
        }
        for node in nodes.iter().filter(|n| **n != PtgId::null()) {
            self.add_node_heap_traceables(node, field, tokens);
        }
        true
    }

    pub fn add_node_heap_traceables(&mut self, node: &PtgId, field: &FieldRef, tokens: &TraceableSet) {
        if field.is_reference() {
            for target in self.ptg.targets_of_field(node, field) {
                if target != PtgId::null() {
                    add_range(&mut self.dependencies.references, &target, tokens.iter().cloned());
                }
            }
        } else {
            let location = Location::new(node.clone(), field.clone());
            add_range(&mut self.dependencies.fields, &location, tokens.iter().cloned());
        }
    }

    /// Strong update of `variable.field`. Returns false when `variable`
    /// points nowhere.
    pub fn assign_heap_traceables(&mut self, variable: &Variable, field: &FieldRef, tokens: &TraceableSet) -> bool {
        let nodes = self.ptg.targets(variable);
        if nodes.is_empty() {
            return false;
        }
        for node in nodes.iter().filter(|n| **n != PtgId::null()) {
            if field.is_reference() {
                for target in self.ptg.targets_of_field(node, field) {
                    if target != PtgId::null() {
                        self.dependencies.references.insert(target, tokens.clone());
                    }
                }
            } else {
                let location = Location::new(node.clone(), field.clone());
                self.dependencies.fields.insert(location, tokens.clone());
            }
        }
        true
    }

    pub fn get_heap_traceables(&self, variable: &Variable, field: &FieldRef) -> TraceableSet {
        let mut result = TraceableSet::new();
        for node in self.ptg.targets(variable) {
            result.extend(self.get_node_heap_traceables(&node, field));
        }
        result
    }

    pub fn get_node_heap_traceables(&self, node: &PtgId, field: &FieldRef) -> TraceableSet {
        let mut result = TraceableSet::new();
        if field.is_reference() {
            for target in self.ptg.targets_of_field(node, field) {
                if target == PtgId::null() {
                    continue;
                }
                if let Some(tokens) = self.dependencies.references.get(&target) {
                    result.extend(tokens.iter().cloned());
                }
            }
        } else if let Some(tokens) = self.dependencies.fields.get(&Location::new(node.clone(), field.clone())) {
            result.extend(tokens.iter().cloned());
        }
        result
    }

    // ═══════════════════════════════════════════════════════════════════
    // Output columns
    // ═══════════════════════════════════════════════════════════════════

    pub fn get_output_traceables(&self, variable: &Variable) -> TraceableSet {
        self.union_over_aliases(variable, |d| &d.output)
    }

    pub fn get_output_control_traceables(&self, variable: &Variable) -> TraceableSet {
        self.union_over_aliases(variable, |d| &d.output_control)
    }

    fn union_over_aliases<F>(&self, variable: &Variable, map: F) -> TraceableSet
    where
        F: Fn(&DependencyDomain) -> &FxHashMap<Variable, TraceableSet>,
    {
        let map = map(&self.dependencies);
        let mut union = TraceableSet::new();
        for alias in self.ptg.aliases(variable) {
            if let Some(tokens) = map.get(&alias) {
                union.extend(tokens.iter().cloned());
            }
        }
        union
    }

    pub fn add_output_traceables(&mut self, destination: &Variable, tokens: &TraceableSet) {
        add_range(&mut self.dependencies.output, destination, tokens.iter().cloned());
    }

    pub fn add_output_control_traceables(&mut self, destination: &Variable, tokens: &TraceableSet) {
        add_range(&mut self.dependencies.output_control, destination, tokens.iter().cloned());
    }

    /// Tokens carried by the variables of the active branch conditions
    pub fn control_traceables(&self) -> TraceableSet {
        let mut result = TraceableSet::new();
        for variable in &self.dependencies.control_variables {
            result.extend(self.get_traceables(variable));
        }
        result
    }

    /// Output column → data dependencies, and output column → control
    /// dependencies, gathered from every variable written to an output
    pub fn compute_output_dependencies(&self) -> (ColumnDependencies, ColumnDependencies) {
        let mut data = ColumnDependencies::default();
        let mut control = ColumnDependencies::default();

        for (written, deps) in &self.dependencies.output {
            let columns: Vec<ColumnRef> = self
                .get_traceables(written)
                .iter()
                .filter(|t| t.table_kind() == TableKind::Output)
                .filter_map(|t| t.column_ref().cloned())
                .collect();
            let control_deps = self
                .dependencies
                .output_control
                .get(written)
                .cloned()
                .unwrap_or_default();

            for column in columns {
                data.entry(column.clone()).or_default().extend(deps.iter().cloned());
                control.entry(column).or_default().extend(control_deps.iter().cloned());
            }
        }
        (data, control)
    }
}

impl std::fmt::Display for DependencyPtgDomain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.dependencies)
    }
}
