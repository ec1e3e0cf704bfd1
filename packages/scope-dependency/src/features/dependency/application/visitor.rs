//! Per-instruction dependency transfer
//!
//! The points-to step runs first for every instruction except conversions,
//! whose operand tokens have to be read before the graph moves. Calls are
//! dispatched in `calls.rs` and the runtime-specific handlers.

use tracing::{debug, warn};

use super::iterator_analysis::IteratorDependencyAnalysis;
use crate::features::dependency::domain::{non_other, DependencyPtgDomain, JsonSource, Traceable, TraceableSet};
use crate::features::dependency::infrastructure::ScopeTypes;
use crate::features::points_to::domain::array_field;
use crate::features::points_to::PtgId;
use crate::shared::diagnostics::AnalysisReason;
use crate::shared::models::{
    FieldRef, Instruction, InstructionKind, MethodRef, NodeId, Operand, Place, TypeRef, Variable,
};

/// A direct call being visited
pub(super) struct CallSite<'i> {
    pub instruction: &'i Instruction,
    pub method: &'i MethodRef,
    /// Receiver first for instance methods
    pub arguments: &'i [Variable],
    pub result: Option<&'i Variable>,
}

impl<'i> CallSite<'i> {
    pub fn argument(&self, index: usize) -> Option<&'i Variable> {
        self.arguments.get(index)
    }

    pub fn name(&self) -> &str {
        &self.method.name
    }

    pub fn declaring_type(&self) -> &TypeRef {
        &self.method.containing_type
    }
}

pub(super) struct BlockVisitor<'a, 'm> {
    pub(super) analysis: &'a mut IteratorDependencyAnalysis<'m>,
    pub(super) state: DependencyPtgDomain,
    pub(super) node: NodeId,
    visits: usize,
    valid: bool,
}

impl<'a, 'm> BlockVisitor<'a, 'm> {
    pub(super) fn new(
        analysis: &'a mut IteratorDependencyAnalysis<'m>,
        state: DependencyPtgDomain,
        node: NodeId,
        visits: usize,
    ) -> Self {
        Self {
            analysis,
            state,
            node,
            visits,
            valid: true,
        }
    }

    /// Visit every instruction of the block. False when the block has to
    /// be retried once more information reaches it.
    pub(super) fn visit_block(&mut self, instructions: &[Instruction]) -> bool {
        for instruction in instructions {
            self.visit(instruction);
            if !self.valid || self.state.is_top() {
                break;
            }
        }
        self.valid
    }

    pub(super) fn into_state(self) -> DependencyPtgDomain {
        self.state
    }

    pub(super) fn scope_types(&self) -> &ScopeTypes {
        self.analysis.manager.scope_types()
    }

    pub(super) fn method(&self) -> &MethodRef {
        &self.analysis.body.method
    }

    // ═══════════════════════════════════════════════════════════════════
    // Failure handling
    // ═══════════════════════════════════════════════════════════════════

    pub(super) fn set_top(&mut self, instruction: &Instruction, reason: impl Into<String>) {
        let reason = AnalysisReason::new(&self.analysis.body.method, instruction, reason);
        warn!(%reason, "dependency domain set to top");
        self.analysis.manager.record(reason);
        self.state.set_top();
    }

    /// Missing information may still arrive through a back edge: defer the
    /// block while retries remain, then give up
    pub(super) fn fail_or_retry(&mut self, instruction: &Instruction, reason: impl Into<String>) {
        if self.visits < self.analysis.manager.config().max_block_retries {
            debug!(node = self.node, visits = self.visits, %instruction, "block deferred");
            self.valid = false;
        } else {
            self.set_top(instruction, reason);
        }
    }

    /// Union of the tokens of `variables`
    pub(super) fn tokens_of<'v>(&self, variables: impl IntoIterator<Item = &'v Variable>) -> TraceableSet {
        variables
            .into_iter()
            .flat_map(|v| self.state.get_traceables(v))
            .collect()
    }

    // ═══════════════════════════════════════════════════════════════════
    // Dispatch
    // ═══════════════════════════════════════════════════════════════════

    fn visit(&mut self, instruction: &Instruction) {
        if let InstructionKind::Convert { result, operand, .. } = &instruction.kind {
            let tokens = self.state.get_traceables(operand);
            self.analysis.transfer.apply(&mut self.state.ptg, instruction);
            self.state.assign_traceables(result, tokens);
            self.analysis.scope_info.propagate_copy(operand, result);
            return;
        }

        self.analysis.transfer.apply(&mut self.state.ptg, instruction);

        match &instruction.kind {
            InstructionKind::Load { result, operand } => self.visit_load(instruction, result, operand),
            InstructionKind::Store { target, value } => self.visit_store(instruction, target, value),
            InstructionKind::Branch { operands } => {
                for operand in operands {
                    if !self.state.get_traceables(operand).is_empty() {
                        self.state.dependencies.control_variables.insert(operand.clone());
                    }
                }
            }
            InstructionKind::Return { operand: Some(value) } => {
                let return_variable = self.analysis.return_variable.clone();
                self.state.copy_traceables(&return_variable, value);
            }
            InstructionKind::CreateObject { result, allocation_type } => {
                let tokens: TraceableSet = [Traceable::Other(allocation_type.display_name())].into_iter().collect();
                self.state.assign_traceables(result, tokens);
            }
            InstructionKind::Phi { result, arguments } => {
                let tokens = self.tokens_of(arguments);
                self.state.assign_traceables(result, tokens);
            }
            InstructionKind::IndirectCall { .. } => {
                self.set_top(instruction, "Indirect method invocation not supported");
            }
            InstructionKind::Call {
                result,
                method,
                arguments,
            } => {
                let site = CallSite {
                    instruction,
                    method,
                    arguments,
                    result: result.as_ref(),
                };
                self.visit_call(&site);
            }
            _ => self.update_using_def_used(instruction),
        }
    }

    /// Defined variables take the non-`Other` tokens of the used ones
    fn update_using_def_used(&mut self, instruction: &Instruction) {
        let used = self.tokens_of(instruction.used_variables());
        let tokens = non_other(&used);
        for defined in instruction.defined_variables() {
            self.state.assign_traceables(defined, tokens.clone());
        }
    }

    // ═══════════════════════════════════════════════════════════════════
    // Loads
    // ═══════════════════════════════════════════════════════════════════

    fn visit_load(&mut self, instruction: &Instruction, result: &Variable, operand: &Operand) {
        if self.load_with_operand(instruction, result, operand) {
            return;
        }
        match operand {
            Operand::Reference(inner) => {
                if !self.load_with_operand(instruction, result, inner) {
                    self.set_top(instruction, "Load Reference not Supported");
                }
            }
            Operand::Dereference(reference) => self.state.copy_traceables(result, reference),
            Operand::VirtualMethod { .. } | Operand::StaticMethod(_) => {}
            _ => self.set_top(instruction, format!("Unsupported load {}", operand)),
        }
    }

    fn load_with_operand(&mut self, instruction: &Instruction, result: &Variable, operand: &Operand) -> bool {
        match operand {
            Operand::StaticField(field) => {
                self.process_static_load(result, field);
                true
            }
            Operand::InstanceField { instance, field } => {
                self.process_load(instruction, result, instance, field);
                true
            }
            Operand::ArrayElement { array, element_type } => {
                self.process_array_load(instruction, result, array, element_type);
                true
            }
            Operand::Variable(source) => {
                self.state.copy_traceables(result, source);
                if source.ty.as_ref().map_or(false, TypeRef::is_primitive) {
                    self.analysis.scope_info.propagate_copy(source, result);
                }
                true
            }
            Operand::Constant { ty, .. } => {
                let tokens: TraceableSet = [Traceable::Other(ty.display_name())].into_iter().collect();
                self.state.assign_traceables(result, tokens);
                true
            }
            _ => false,
        }
    }

    /// Closures keep captured state in static fields of generated classes
    fn process_static_load(&mut self, result: &Variable, field: &FieldRef) {
        if self.analysis.is_closure_field(&Variable::global(), field) {
            let tokens = self.state.get_node_heap_traceables(&PtgId::global(), field);
            self.state.assign_traceables(result, tokens);
        }
    }

    fn process_load(&mut self, instruction: &Instruction, result: &Variable, instance: &Variable, field: &FieldRef) {
        let valid_heap = !field.ty.is_class_or_struct() || !self.state.ptg.targets(instance).is_empty();

        let mut tokens = self.state.get_heap_traceables(instance, field);
        tokens.extend(self.state.get_traceables(instance));

        let json: Vec<JsonSource> = tokens.iter().filter_map(Traceable::as_json).collect();
        if !json.is_empty() && !self.analysis.is_closure_internal_field(field) {
            tokens = json
                .into_iter()
                .map(|json| Traceable::JsonField {
                    json,
                    key: field.name.clone(),
                })
                .collect();
        }

        if !valid_heap {
            self.set_top(instruction, "Trying to load a field with no objects associated");
            return;
        }
        self.state.assign_traceables(result, tokens);
        self.analysis
            .scope_info
            .propagate_load(result, instance, field, &self.state);
    }

    fn process_array_load(
        &mut self,
        instruction: &Instruction,
        result: &Variable,
        array: &Variable,
        element_type: &TypeRef,
    ) {
        let elements = array_field();
        let mut tokens = self.state.get_traceables(array);
        tokens.extend(self.state.get_heap_traceables(array, &elements));

        if self.state.ptg.variable_field_targets(array, &elements).is_empty()
            && self.scope_types().is_scope_type(element_type)
        {
            self.set_top(instruction, "Trying to access index array with no objects associated");
            return;
        }
        self.state.assign_traceables(result, tokens);
    }

    // ═══════════════════════════════════════════════════════════════════
    // Stores
    // ═══════════════════════════════════════════════════════════════════

    fn visit_store(&mut self, instruction: &Instruction, target: &Place, value: &Variable) {
        let tokens = self.state.get_traceables(value);
        match target {
            Place::InstanceField { instance, field } => {
                if field.name.ends_with("__state") {
                    self.state.iterator_state = self.analysis.range_at(self.node, value);
                }
                // the iterator object is a singleton: strong update
                let stored = if instance.is_this() {
                    self.state.assign_heap_traceables(instance, field, &tokens)
                } else {
                    self.state.add_heap_traceables(instance, field, &tokens)
                };
                if !stored {
                    self.set_top(instruction, "Trying to Store a field with no objects associated");
                    return;
                }
                self.analysis.scope_info.propagate_store(value, field);
            }
            Place::ArrayElement { array, .. } => {
                self.state.add_heap_traceables(array, &array_field(), &tokens);
                self.state.add_traceables(array, &tokens);
            }
            Place::StaticField(field) => {
                self.state.add_node_heap_traceables(&PtgId::global(), field, &tokens);
                self.state.dependencies.escaping.extend(non_other(&tokens));
            }
            Place::Dereference(reference) => self.state.add_traceables_from(reference, value),
        }
    }
}
