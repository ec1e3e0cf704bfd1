/*
 * Interprocedural Manager
 *
 * Runs the dependency analysis of a resolved callee on behalf of a call
 * site and binds the result back into the caller.
 *
 * Per call:
 * 1. Load the callee body (LRU cache)
 * 2. Reuse the memoized result when the caller state did not grow
 * 3. Cut recursion (domain goes top) and bound the call depth
 * 4. Bind caller → callee, analyze (points-to + range + dependency),
 *    bind callee → caller
 */

use rustc_hash::FxHashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use super::binding::{bind_callee_to_caller, bind_caller_to_callee};
use crate::config::AnalysisConfig;
use crate::errors::{AnalysisFailure, Result};
use crate::features::dependency::application::IteratorDependencyAnalysis;
use crate::features::dependency::domain::{DependencyPtgDomain, Schema, TableKind};
use crate::features::dependency::infrastructure::ScopeTypes;
use crate::features::interprocedural::domain::{CallInfo, CallSiteKey, CallStack, InterProcResult};
use crate::features::interprocedural::infrastructure::CfgCache;
use crate::features::range_analysis::{ExpressionMap, RangeAnalysis, VariableRangeDomain};
use crate::shared::diagnostics::{AnalysisReason, Diagnostics};
use crate::shared::models::{MethodBody, MethodRef, Variable};
use crate::shared::ports::ProgramRepository;

struct MemoEntry {
    caller_state: DependencyPtgDomain,
    result: InterProcResult,
}

pub struct InterproceduralManager {
    program: Arc<dyn ProgramRepository>,
    config: AnalysisConfig,
    scope_types: ScopeTypes,
    input_schema: Schema,
    output_schema: Schema,
    cfg_cache: CfgCache,
    memo: FxHashMap<CallSiteKey, MemoEntry>,
    call_stack: CallStack,
    diagnostics: Diagnostics,
}

impl InterproceduralManager {
    pub fn new(program: Arc<dyn ProgramRepository>, config: AnalysisConfig) -> Self {
        let scope_types = ScopeTypes::new(config.scope_namespace.clone()).with_program(Arc::clone(&program));
        let cfg_cache = CfgCache::new(config.cfg_cache_capacity);
        Self {
            program,
            config,
            scope_types,
            input_schema: Schema::default(),
            output_schema: Schema::default(),
            cfg_cache,
            memo: FxHashMap::default(),
            call_stack: CallStack::new(),
            diagnostics: Diagnostics::new(),
        }
    }

    pub fn program(&self) -> &dyn ProgramRepository {
        self.program.as_ref()
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn scope_types(&self) -> &ScopeTypes {
        &self.scope_types
    }

    /// Schemas of the processor being analyzed
    pub fn set_schemas(&mut self, input: Schema, output: Schema) {
        self.input_schema = input;
        self.output_schema = output;
    }

    pub fn schema(&self, table: TableKind) -> Option<&Schema> {
        match table {
            TableKind::Input => Some(&self.input_schema),
            TableKind::Output => Some(&self.output_schema),
            TableKind::Json | TableKind::Unknown => None,
        }
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn diagnostics_mut(&mut self) -> &mut Diagnostics {
        &mut self.diagnostics
    }

    pub fn record(&mut self, reason: AnalysisReason) {
        self.diagnostics.record(reason);
    }

    /// Start the analysis of another processor. Memoized callee results
    /// and diagnostics belong to the previous one; the body cache is kept.
    pub fn begin_run(&mut self) {
        self.memo.clear();
        self.call_stack = CallStack::new();
        self.diagnostics = Diagnostics::new();
    }

    pub fn cfg_cache(&self) -> &CfgCache {
        &self.cfg_cache
    }

    /// Body of `method` through the CFG cache
    pub fn method_body(&mut self, method: &MethodRef) -> Option<Arc<MethodBody>> {
        self.cfg_cache.get_or_load(method, self.program.as_ref())
    }

    pub fn call_depth(&self) -> usize {
        self.call_stack.depth()
    }

    /// Mark `method` as under analysis (the processor's MoveNext is the
    /// bottom frame)
    pub(crate) fn enter(&mut self, method: MethodRef) {
        self.call_stack.push(method);
    }

    pub(crate) fn leave(&mut self) {
        self.call_stack.pop();
    }

    /// Analyze `info.callee` in the context of its call site
    pub fn do_inter_proc_with_callee(&mut self, info: CallInfo<'_>) -> Result<InterProcResult> {
        let callee = info.callee.clone();
        let body = self
            .method_body(&callee)
            .ok_or_else(|| AnalysisFailure::MissingBody(callee.signature()))?;

        if !body.has_instructions() {
            debug!(callee = %callee, "callee without instructions skipped");
            return Ok(InterProcResult::unchanged(info.caller_state.clone()));
        }

        let key = info.site_key();
        if let Some(entry) = self.memo.get(&key) {
            if info.caller_state.less_equal(&entry.caller_state) {
                self.diagnostics.counters.memo_hits += 1;
                debug!(callee = %callee, offset = info.instruction.offset, "memoized callee result reused");
                return Ok(entry.result.clone());
            }
        }

        if self.call_stack.depth() >= self.config.max_stack_depth {
            return Err(AnalysisFailure::DepthExceeded {
                method: callee.signature(),
                depth: self.call_stack.depth(),
            });
        }

        if self.call_stack.contains(&callee) {
            let reason = AnalysisReason::new(info.caller, info.instruction, format!("Recursive call to {}", callee.name));
            warn!(%reason, "recursive call, dependency domain set to top");
            self.diagnostics.record(reason);
            let mut state = info.caller_state.clone();
            state.set_top();
            return Ok(InterProcResult::unchanged(state));
        }

        let parameters = &body.parameters;
        if info.arguments.len() < parameters.len() {
            return Err(AnalysisFailure::ArgumentMismatch {
                method: callee.signature(),
                arguments: info.arguments.len(),
                parameters: parameters.len(),
            });
        }
        // extra arguments (delegate evaluation) have no parameter to bind to
        let arguments = &info.arguments[..parameters.len()];

        let mut initial_ranges = VariableRangeDomain::new();
        for (parameter, range) in parameters.iter().zip(&info.argument_ranges) {
            if !range.is_bottom() {
                initial_ranges.set(parameter, range.clone());
            }
        }
        let iterations = self.config.max_fixpoint_iterations;
        let ranges = RangeAnalysis::new(&callee)
            .with_initial_ranges(initial_ranges)
            .analyze(&body.cfg, iterations);
        let equalities = ExpressionMap::propagate(&body.cfg);
        let entry_state = bind_caller_to_callee(info.caller_state, arguments, parameters);

        debug!(
            caller = %info.caller,
            callee = %callee,
            depth = self.call_stack.depth(),
            "analyzing callee"
        );

        self.call_stack.push(callee.clone());
        let outcome = IteratorDependencyAnalysis::new(self, Arc::clone(&body), Arc::clone(&info.protected))
            .with_ranges(ranges)
            .with_equalities(equalities)
            .with_init_value(entry_state)
            .with_scope_info(info.scope_info.for_callee())
            .analyze(&body.cfg);
        self.call_stack.pop();
        self.diagnostics.counters.analyzed_callees += 1;

        let return_variable: Variable = outcome.return_variable.clone();
        let state = bind_callee_to_caller(
            info.caller_state,
            outcome.state,
            arguments,
            parameters,
            &callee,
            &return_variable,
            info.result.as_ref(),
        );

        let result = InterProcResult {
            state,
            input_columns: outcome.input_columns,
            output_columns: outcome.output_columns,
        };
        self.memo.insert(
            key,
            MemoEntry {
                caller_state: info.caller_state.clone(),
                result: result.clone(),
            },
        );
        Ok(result)
    }
}

impl std::fmt::Debug for InterproceduralManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterproceduralManager")
            .field("config", &self.config)
            .field("cfg_cache", &self.cfg_cache)
            .field("memo", &self.memo.len())
            .field("depth", &self.call_stack.depth())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::dependency::domain::{Column, ProtectedNodes, Traceable};
    use crate::features::dependency::infrastructure::ScopeInfo;
    use crate::features::range_analysis::RangeValue;
    use crate::shared::models::{Cfg, Instruction, TypeRef};
    use crate::shared::ports::InMemoryProgram;

    fn helper() -> MethodRef {
        MethodRef::new(TypeRef::class("Demo", "Helper"), "Id", TypeRef::string()).as_static()
    }

    fn identity_program() -> InMemoryProgram {
        let p = Variable::parameter("p", TypeRef::string());
        let body = MethodBody::new(helper(), vec![p.clone()], Cfg::linear(vec![Instruction::ret(0, Some(&p))]));
        InMemoryProgram::new().with_method(body)
    }

    fn caller() -> MethodRef {
        MethodRef::new(TypeRef::class("Demo", "Proc"), "MoveNext", TypeRef::boolean())
    }

    fn call<'a>(
        caller: &'a MethodRef,
        instruction: &'a Instruction,
        state: &'a DependencyPtgDomain,
        scope_info: &'a ScopeInfo,
        arguments: Vec<Variable>,
        result: Option<Variable>,
    ) -> CallInfo<'a> {
        CallInfo {
            caller,
            callee: helper(),
            instruction,
            argument_ranges: vec![RangeValue::bottom(); arguments.len()],
            arguments,
            result,
            caller_state: state,
            scope_info,
            protected: Arc::new(ProtectedNodes::new()),
        }
    }

    fn input(name: &str) -> Traceable {
        Traceable::column(TableKind::Input, Column::named(name))
    }

    #[test]
    fn test_callee_result_bound_to_call_result() {
        let mut manager = InterproceduralManager::new(Arc::new(identity_program()), AnalysisConfig::default());
        let caller = caller();
        let s = Variable::local("s", TypeRef::string());
        let r = Variable::local("r", TypeRef::string());
        let instruction = Instruction::call(4, Some(&r), helper(), &[&s]);
        let mut state = DependencyPtgDomain::default();
        state.assign_traceables(&s, [input("a")].into_iter().collect());
        let scope_info = ScopeInfo::new();

        let result = manager
            .do_inter_proc_with_callee(call(&caller, &instruction, &state, &scope_info, vec![s], Some(r.clone())))
            .unwrap();
        assert!(result.state.get_traceables(&r).contains(&input("a")));
        assert_eq!(manager.diagnostics().counters.analyzed_callees, 1);
        assert_eq!(manager.call_depth(), 0);
    }

    #[test]
    fn test_recursive_call_goes_top() {
        let mut manager = InterproceduralManager::new(Arc::new(identity_program()), AnalysisConfig::default());
        let caller = caller();
        let s = Variable::local("s", TypeRef::string());
        let instruction = Instruction::call(4, None, helper(), &[&s]);
        let state = DependencyPtgDomain::default();
        let scope_info = ScopeInfo::new();

        manager.enter(helper());
        let result = manager
            .do_inter_proc_with_callee(call(&caller, &instruction, &state, &scope_info, vec![s], None))
            .unwrap();
        manager.leave();

        assert!(result.state.is_top());
        assert!(manager.diagnostics().mentions("Recursive call to Id"));
    }

    #[test]
    fn test_memoized_result_reused_when_state_did_not_grow() {
        let mut manager = InterproceduralManager::new(Arc::new(identity_program()), AnalysisConfig::default());
        let caller = caller();
        let s = Variable::local("s", TypeRef::string());
        let instruction = Instruction::call(4, None, helper(), &[&s]);
        let state = DependencyPtgDomain::default();
        let scope_info = ScopeInfo::new();

        for _ in 0..2 {
            manager
                .do_inter_proc_with_callee(call(&caller, &instruction, &state, &scope_info, vec![s.clone()], None))
                .unwrap();
        }
        assert_eq!(manager.diagnostics().counters.memo_hits, 1);
        assert_eq!(manager.diagnostics().counters.analyzed_callees, 1);
    }

    #[test]
    fn test_new_run_forgets_memo_and_diagnostics() {
        let mut manager = InterproceduralManager::new(Arc::new(identity_program()), AnalysisConfig::default());
        let caller = caller();
        let s = Variable::local("s", TypeRef::string());
        let instruction = Instruction::call(4, None, helper(), &[&s]);
        let state = DependencyPtgDomain::default();
        let scope_info = ScopeInfo::new();

        manager
            .do_inter_proc_with_callee(call(&caller, &instruction, &state, &scope_info, vec![s.clone()], None))
            .unwrap();
        manager.record(AnalysisReason::for_method(&caller, "left over"));

        manager.begin_run();
        assert!(manager.diagnostics().is_empty());
        assert_eq!(manager.diagnostics().counters, Default::default());

        manager
            .do_inter_proc_with_callee(call(&caller, &instruction, &state, &scope_info, vec![s], None))
            .unwrap();
        assert_eq!(manager.diagnostics().counters.memo_hits, 0);
        assert_eq!(manager.diagnostics().counters.analyzed_callees, 1);
        assert!(manager.cfg_cache().contains(&helper()));
    }

    #[test]
    fn test_depth_bound() {
        let config = AnalysisConfig::default().max_stack_depth(1);
        let mut manager = InterproceduralManager::new(Arc::new(identity_program()), config);
        let caller = caller();
        let s = Variable::local("s", TypeRef::string());
        let instruction = Instruction::call(4, None, helper(), &[&s]);
        let state = DependencyPtgDomain::default();
        let scope_info = ScopeInfo::new();

        manager.enter(caller.clone());
        let err = manager
            .do_inter_proc_with_callee(call(&caller, &instruction, &state, &scope_info, vec![s], None))
            .unwrap_err();
        assert!(matches!(err, AnalysisFailure::DepthExceeded { depth: 1, .. }));
    }

    #[test]
    fn test_missing_body_is_a_failure() {
        let mut manager = InterproceduralManager::new(Arc::new(InMemoryProgram::new()), AnalysisConfig::default());
        let caller = caller();
        let s = Variable::local("s", TypeRef::string());
        let instruction = Instruction::call(4, None, helper(), &[&s]);
        let state = DependencyPtgDomain::default();
        let scope_info = ScopeInfo::new();

        let err = manager
            .do_inter_proc_with_callee(call(&caller, &instruction, &state, &scope_info, vec![s], None))
            .unwrap_err();
        assert_eq!(err, AnalysisFailure::MissingBody(helper().signature()));
    }
}
