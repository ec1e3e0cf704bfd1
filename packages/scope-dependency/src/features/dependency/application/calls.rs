/*
 * Call handling
 *
 * Dispatch order of a direct call:
 * 1. Runtime handlers (schema, rows, JSON, framework collections)
 * 2. Pure methods: the result depends on the arguments only
 * 3. Everything else: if an argument carries column tokens or reaches a
 *    protected row, analyze the resolved callees; otherwise treat the
 *    call as pure and let its arguments escape through the global node
 */

use std::iter;

use super::visitor::{BlockVisitor, CallSite};
use crate::errors::Result;
use crate::features::dependency::domain::{non_other, Traceable, TraceableSet};
use crate::features::interprocedural::{CalleeTarget, InterProcResult};
use crate::features::interprocedural::domain::CallInfo;
use crate::features::points_to::domain::escape_field;
use crate::features::points_to::{NodeSet, PtgId, PtgNode};
use crate::features::range_analysis::RangeValue;
use crate::shared::diagnostics::AnalysisReason;
use crate::shared::models::{FieldRef, MethodRef, Variable};

/// Result field of methods summarized as pure
const RETURN_FIELD: &str = "$return";
/// Result field of pure methods that hand rows back to the iterator
pub(super) const SCOPE_RETURN_FIELD: &str = "$scope$return";

const PURE_METHODS: &[&str] = &[
    "System.IDisposable.Dispose",
    "___Scope_Generated_Classes___.Helper.trimNamespace",
    "System.IO.Stream.Write",
];

fn is_delegate_invoke(method: &MethodRef) -> bool {
    method.name == "Invoke" && method.containing_type.is_delegate()
}

fn is_delegate(variable: &Variable) -> bool {
    variable.ty.as_ref().map_or(false, |t| t.is_delegate())
}

impl BlockVisitor<'_, '_> {
    pub(super) fn visit_call(&mut self, site: &CallSite<'_>) {
        if self.handle_schema_call(site)
            || self.handle_row_call(site)
            || self.handle_json_call(site)
            || self.handle_collection_call(site)
        {
            return;
        }
        if self.is_pure_method(site.method) {
            self.update_call(site);
            return;
        }
        self.escalate(site);
    }

    fn is_pure_method(&self, method: &MethodRef) -> bool {
        let ty = &method.containing_type;
        if method.is_pure || method.name == "ToString" {
            return true;
        }
        if ty.is_string() || ty.is_tuple() || ty.is_value_type() {
            return true;
        }
        let full_name = ty.full_name();
        if self
            .analysis
            .manager
            .config()
            .pure_type_whitelist
            .iter()
            .any(|t| *t == full_name)
        {
            return true;
        }
        let qualified = format!("{}.{}", full_name, method.name);
        PURE_METHODS.contains(&qualified.as_str())
    }

    /// Calls that are analyzed even when interprocedural analysis is off
    fn is_method_to_inline(&self, site: &CallSite<'_>) -> bool {
        let method = site.method;
        if method.is_constructor() || method.is_getter() {
            return true;
        }
        if method.containing_type.same_definition(&self.analysis.iterator_class)
            && (method.name.starts_with("<>m__Finally") || method.name.starts_with("System.IDisposable.Dispose"))
        {
            return true;
        }
        if method.is_setter() && site.arguments.iter().any(|a| self.state.has_traceables(a)) {
            return true;
        }
        method.name == "ParseJson" || method.name == "GetAttributeValue" || method.containing_type.full_name().contains("Helper")
    }

    // ═══════════════════════════════════════════════════════════════════
    // Escalation
    // ═══════════════════════════════════════════════════════════════════

    fn escalate(&mut self, site: &CallSite<'_>) {
        let roots: NodeSet = site
            .arguments
            .iter()
            .flat_map(|a| self.state.ptg.non_null_targets(a))
            .collect();

        let iterator = self.analysis.iterator_class.clone();
        let callee_type = site.declaring_type();
        let internal = callee_type.same_definition(&iterator);
        let lambda = iterator.compiler_generated && iterator.outer().map_or(false, |o| callee_type.same_definition(o));
        let restricted = internal || lambda;

        // calls back into the iterator only reach rows handed back to it
        let reachable = self.state.ptg.reachable_nodes(
            roots.iter(),
            Some(|_: &PtgId, field: &FieldRef| {
                !restricted || (field.containing_type.same_definition(&iterator) && field.name == SCOPE_RETURN_FIELD)
            }),
        );
        let escaping = reachable.iter().any(|n| self.analysis.protected.contains(n));
        let tokens = non_other(&self.tokens_of(site.arguments));

        if !escaping && tokens.is_empty() {
            self.update_call(site);
            let global = PtgId::global();
            let escape = escape_field();
            for node in &roots {
                self.state.ptg.points_to_field(&global, &escape, node);
            }
            return;
        }

        if !self.analysis.manager.config().interprocedural && !self.is_method_to_inline(site) {
            self.handle_no_analyzable(site);
            return;
        }

        let callees = self
            .analysis
            .manager
            .compute_potential_callees(&self.state.ptg, site.method, site.arguments);
        if !callees.resolved.is_empty() {
            self.analyze_resolved_callees(site, &callees.resolved);
        }
        if callees.resolved.is_empty() || !callees.unresolved.is_empty() {
            self.handle_no_analyzable(site);
        }
    }

    /// Each callee starts from the state before the call; the results join
    fn analyze_resolved_callees(&mut self, site: &CallSite<'_>, callees: &[CalleeTarget]) {
        let before = self.state.clone();
        let mut states = Vec::with_capacity(callees.len());

        for target in callees {
            self.state = before.clone();
            let arguments = Self::callee_arguments(site, target);
            match self.inter_proc(site, &target.method, arguments) {
                Ok(result) => self.commit(result),
                Err(error) => {
                    let reason = AnalysisReason::new(
                        self.method(),
                        site.instruction,
                        format!("Callee {} failed: {}", target.method, error),
                    );
                    self.analysis.manager.record(reason);
                    self.handle_no_analyzable(site);
                }
            }
            states.push(std::mem::take(&mut self.state));
        }

        self.state = states
            .into_iter()
            .reduce(|left, right| left.join(&right))
            .unwrap_or(before);
    }

    fn callee_arguments(site: &CallSite<'_>, target: &CalleeTarget) -> Vec<Variable> {
        match &target.receiver {
            Some(receiver) => iter::once(receiver.clone())
                .chain(site.arguments.iter().skip(1).cloned())
                .collect(),
            None if is_delegate_invoke(site.method) => site.arguments.iter().skip(1).cloned().collect(),
            None => site.arguments.to_vec(),
        }
    }

    fn commit(&mut self, result: InterProcResult) {
        self.analysis.input_columns.extend(result.input_columns);
        self.analysis.output_columns.extend(result.output_columns);
        self.state = result.state;
    }

    pub(super) fn inter_proc(
        &mut self,
        site: &CallSite<'_>,
        callee: &MethodRef,
        arguments: Vec<Variable>,
    ) -> Result<InterProcResult> {
        let argument_ranges: Vec<RangeValue> = arguments
            .iter()
            .map(|a| self.analysis.range_at(self.node, a))
            .collect();
        let caller = self.analysis.body.method.clone();
        let analysis = &mut *self.analysis;
        let info = CallInfo {
            caller: &caller,
            callee: callee.clone(),
            instruction: site.instruction,
            arguments,
            argument_ranges,
            result: site.result.cloned(),
            caller_state: &self.state,
            scope_info: &analysis.scope_info,
            protected: std::sync::Arc::clone(&analysis.protected),
        };
        analysis.manager.do_inter_proc_with_callee(info)
    }

    fn handle_no_analyzable(&mut self, site: &CallSite<'_>) {
        self.update_call(site);
        let tokens = non_other(&self.tokens_of(site.arguments));
        self.state.dependencies.escaping.extend(tokens);
        self.set_top(
            site.instruction,
            format!(
                "Invocation to {} not analyzed with argument potentially reaching the columns",
                site.method
            ),
        );
    }

    // ═══════════════════════════════════════════════════════════════════
    // Pure calls
    // ═══════════════════════════════════════════════════════════════════

    /// The result depends on the arguments and on nothing else
    pub(super) fn update_call(&mut self, site: &CallSite<'_>) {
        if site.method.is_constructor() {
            self.update_ctor(site);
            return;
        }
        let Some(result) = site.result else {
            return;
        };

        let mut tokens = TraceableSet::new();
        for argument in site.arguments {
            if is_delegate(argument) {
                tokens.extend(self.evaluate_delegate(site, argument));
            } else {
                tokens.extend(non_other(&self.state.get_traceables(argument)));
            }
        }
        let types: Vec<String> = site.arguments.iter().map(Variable::type_name).collect();
        tokens.insert(Traceable::Other(format!("{}({})", site.method.name, types.join(","))));

        self.update_pta_for_pure(site, false);
        self.state.assign_traceables(result, tokens);
    }

    /// `new T(args)`: the object takes the tokens of its arguments
    pub(super) fn update_ctor(&mut self, site: &CallSite<'_>) {
        if let Some(target) = site.argument(0) {
            self.propagate_arguments(site, target);
        }
    }

    /// Every argument but `target` flows into `target`
    pub(super) fn propagate_arguments(&mut self, site: &CallSite<'_>, target: &Variable) {
        let mut tokens = TraceableSet::new();
        for argument in site.arguments.iter().filter(|a| *a != target) {
            if is_delegate(argument) {
                tokens.extend(self.evaluate_delegate(site, argument));
            } else {
                tokens.extend(self.state.get_traceables(argument));
            }
        }
        self.state.add_traceables(target, &tokens);
    }

    /// Analyze the methods a delegate argument may point to as if the
    /// call invoked them, collecting the tokens of their results
    fn evaluate_delegate(&mut self, site: &CallSite<'_>, delegate: &Variable) -> TraceableSet {
        let targets = self.analysis.manager.compute_delegate(&self.state.ptg, delegate);
        let mut tokens = TraceableSet::new();

        for target in &targets.resolved {
            let arguments: Vec<Variable> = target
                .receiver
                .iter()
                .cloned()
                .chain(site.arguments.iter().filter(|a| *a != delegate).cloned())
                .collect();
            match self.inter_proc(site, &target.method, arguments) {
                Ok(result) => {
                    self.commit(result);
                    if let Some(lhs) = site.result {
                        tokens.extend(self.state.get_traceables(lhs));
                    }
                }
                Err(error) => {
                    self.set_top(
                        site.instruction,
                        format!("Delegate target {} failed: {}", target.method, error),
                    );
                }
            }
        }
        tokens
    }

    /// A pure method returning a reference yields a fresh object that
    /// links to everything reachable from its arguments
    pub(super) fn update_pta_for_pure(&mut self, site: &CallSite<'_>, hands_back_rows: bool) {
        let Some(result) = site.result else {
            return;
        };
        if !result.is_reference() {
            return;
        }

        let id = PtgId::at(self.method(), i64::from(site.instruction.offset));
        self.state.ptg.remove_root_edges(result);
        let node = self.state.ptg.points_to_node(result, PtgNode::object(id, result.ty.clone()));

        let name = if hands_back_rows { SCOPE_RETURN_FIELD } else { RETURN_FIELD };
        let field = FieldRef::synthetic(name, self.analysis.iterator_class.clone());

        let roots: NodeSet = site
            .arguments
            .iter()
            .flat_map(|a| self.state.ptg.non_null_targets(a))
            .collect();
        let reachable = self
            .state
            .ptg
            .reachable_nodes(roots.iter(), None::<fn(&PtgId, &FieldRef) -> bool>);
        for target in reachable.iter().filter(|n| **n != PtgId::null() && **n != node) {
            self.state.ptg.points_to_field(&node, &field, target);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::AnalysisConfig;
    use crate::features::dependency::application::IteratorDependencyAnalysis;
    use crate::features::dependency::domain::{Column, DependencyPtgDomain, ProtectedNodes, TableKind, Traceable};
    use crate::features::interprocedural::InterproceduralManager;
    use crate::features::points_to::{PtgId, PtgNode};
    use crate::shared::models::{Cfg, Instruction, MethodBody, MethodRef, TypeRef, Variable};
    use crate::shared::ports::InMemoryProgram;
    use std::sync::Arc;

    fn iterator_type() -> TypeRef {
        TypeRef::class("Demo", "<Process>d__1").compiler_generated()
    }

    fn input(name: &str) -> Traceable {
        Traceable::column(TableKind::Input, Column::named(name))
    }

    fn run(program: InMemoryProgram, config: AnalysisConfig, block: Vec<Instruction>, seed: impl FnOnce(&mut DependencyPtgDomain)) -> (DependencyPtgDomain, usize) {
        let method = MethodRef::new(iterator_type(), "MoveNext", TypeRef::boolean());
        let this = Variable::this(iterator_type());
        let body = Arc::new(MethodBody::new(method, vec![this], Cfg::linear(block)));
        let mut manager = InterproceduralManager::new(Arc::new(program), config);
        let mut entry = DependencyPtgDomain::default();
        seed(&mut entry);
        let outcome = IteratorDependencyAnalysis::new(&mut manager, Arc::clone(&body), Arc::new(ProtectedNodes::new()))
            .with_init_value(entry)
            .analyze(&body.cfg);
        (outcome.state, manager.diagnostics().counters.dependency_errors)
    }

    #[test]
    fn test_pure_call_result_carries_argument_tokens() {
        let s = Variable::local("s", TypeRef::string());
        let t = Variable::local("t", TypeRef::string());
        let trim = MethodRef::new(TypeRef::string(), "Trim", TypeRef::string());

        let (state, errors) = run(
            InMemoryProgram::new(),
            AnalysisConfig::default(),
            vec![Instruction::call(0, Some(&t), trim, &[&s]), Instruction::ret(1, None)],
            |entry| entry.assign_traceables(&s, [input("a")].into_iter().collect()),
        );

        assert!(!state.is_top());
        assert_eq!(errors, 0);
        let tokens = state.get_traceables(&t);
        assert!(tokens.contains(&input("a")));
        assert!(tokens.contains(&Traceable::other("Trim(String)")));
    }

    #[test]
    fn test_unresolved_call_with_tokens_goes_top() {
        let s = Variable::local("s", TypeRef::string());
        let helper = MethodRef::new(TypeRef::class("External", "Sink"), "Send", TypeRef::void()).as_static();

        let (state, errors) = run(
            InMemoryProgram::new(),
            AnalysisConfig::default(),
            vec![Instruction::call(0, None, helper, &[&s]), Instruction::ret(1, None)],
            |entry| entry.assign_traceables(&s, [input("a")].into_iter().collect()),
        );

        assert!(state.is_top());
        assert!(state.dependencies.escaping.contains(&input("a")));
        assert!(errors >= 1);
    }

    #[test]
    fn test_untainted_call_escapes_through_global() {
        let holder = Variable::local("h", TypeRef::class("Demo", "Holder"));
        let log = MethodRef::new(TypeRef::class("External", "Log"), "Write", TypeRef::void()).as_static();
        let node = PtgId::new("seed", 1);
        let seeded = node.clone();
        let h = holder.clone();

        let (state, _) = run(
            InMemoryProgram::new(),
            AnalysisConfig::default(),
            vec![Instruction::call(0, None, log, &[&holder]), Instruction::ret(1, None)],
            move |entry| {
                entry.ptg.points_to_node(&h, PtgNode::object(seeded, h.ty.clone()));
            },
        );

        assert!(!state.is_top());
        let escaped = state
            .ptg
            .targets_of_field(&PtgId::global(), &crate::features::points_to::domain::escape_field());
        assert!(escaped.contains(&node));
    }

    #[test]
    fn test_resolved_static_callee_is_analyzed() {
        let helper_type = TypeRef::class("Demo", "Helper");
        let identity = MethodRef::new(helper_type, "Id", TypeRef::string()).as_static();
        let p = Variable::parameter("p", TypeRef::string());
        let callee = MethodBody::new(identity.clone(), vec![p.clone()], Cfg::linear(vec![Instruction::ret(0, Some(&p))]));
        let program = InMemoryProgram::new().with_method(callee);

        let s = Variable::local("s", TypeRef::string());
        let r = Variable::local("r", TypeRef::string());
        let (state, errors) = run(
            program,
            AnalysisConfig::default(),
            vec![Instruction::call(0, Some(&r), identity, &[&s]), Instruction::ret(1, None)],
            |entry| entry.assign_traceables(&s, [input("a")].into_iter().collect()),
        );

        assert!(!state.is_top());
        assert_eq!(errors, 0);
        assert!(state.get_traceables(&r).contains(&input("a")));
    }
}
