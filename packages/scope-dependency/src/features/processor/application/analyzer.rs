/*
 * Processor Analyzer
 *
 * Drives the analysis of one processor:
 * 1. Points-to analysis of the entry method (creates the iterator)
 * 2. GetEnumerator bound interprocedurally into `$_temp_it`
 * 3. Protected nodes: the entry's `RowSet` (input) and `Row` (output)
 *    parameter nodes, exactly one of each
 * 4. MoveNext with an exit → first block edge (every yield re-enters),
 *    ranges and expressions, then the dependency analysis from the
 *    enumerator-bound graph
 * 5. Nothing written but the yielded row is the input row: the input is
 *    copied to the output column by column
 *
 * Results are cached per MoveNext method. Every run starts with empty
 * diagnostics and an empty callee memo.
 */

use rustc_hash::FxHashMap;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::AnalysisConfig;
use crate::features::dependency::application::{copy_row, IteratorDependencyAnalysis};
use crate::features::dependency::domain::{
    tables, ColumnRef, DependencyPtgDomain, ProtectedNodes, TableKind, TraceableSet,
};
use crate::features::interprocedural::InterproceduralManager;
use crate::features::points_to::{NodeKind, PointsToAnalysis, PointsToGraph};
use crate::features::processor::domain::{
    DependencyReport, ProcessorError, ProcessorInfo, ProcessorResult, CURRENT_FIELD,
};
use crate::features::range_analysis::{ExpressionMap, RangeAnalysis};
use crate::shared::diagnostics::Diagnostics;
use crate::shared::models::{FieldRef, MethodBody, MethodRef, Variable};
use crate::shared::ports::ProgramRepository;

/// Caller-side variable receiving the enumerator
const ENUMERATOR_VARIABLE: &str = "$_temp_it";

/// Final MoveNext state and the columns it touched
#[derive(Debug, Clone)]
pub struct ProcessorAnalysis {
    pub state: DependencyPtgDomain,
    pub input_columns: BTreeSet<ColumnRef>,
    pub output_columns: BTreeSet<ColumnRef>,
    pub converged: bool,
    /// Reasons recorded while analyzing this processor only
    pub diagnostics: Diagnostics,
}

pub struct ProcessorAnalyzer {
    manager: InterproceduralManager,
    results: FxHashMap<String, ProcessorAnalysis>,
}

impl ProcessorAnalyzer {
    pub fn new(program: Arc<dyn ProgramRepository>, config: AnalysisConfig) -> Self {
        Self {
            manager: InterproceduralManager::new(program, config),
            results: FxHashMap::default(),
        }
    }

    pub fn manager(&self) -> &InterproceduralManager {
        &self.manager
    }

    /// Diagnostics of the most recently analyzed processor
    pub fn diagnostics(&self) -> &Diagnostics {
        self.manager.diagnostics()
    }

    /// Analyze `info` and shape the per-column report
    pub fn analyze(&mut self, info: &ProcessorInfo) -> ProcessorResult<DependencyReport> {
        let analysis = self.analyze_move_next(info)?;
        Ok(DependencyReport::build(
            info.name(),
            &analysis.state,
            &analysis.input_columns,
            &analysis.output_columns,
            &info.input_schema,
            &info.output_schema,
            &analysis.diagnostics,
        ))
    }

    /// Final MoveNext state of `info`, cached per MoveNext method
    pub fn analyze_move_next(&mut self, info: &ProcessorInfo) -> ProcessorResult<ProcessorAnalysis> {
        let key = info.move_next.signature();
        if let Some(cached) = self.results.get(&key) {
            debug!(move_next = %key, "reusing MoveNext result");
            return Ok(cached.clone());
        }

        self.manager.begin_run();
        let iterations = self.manager.config().max_fixpoint_iterations;
        let entry = self.body_of(info, "entry", &info.entry_method)?;
        let entry_pta = PointsToAnalysis::new(&entry).analyze(&entry.cfg, iterations);
        let entry_return = entry_pta.return_variable().clone();
        let ptg_of_entry = entry_pta.into_exit_graph();

        let protected = self.protected_nodes(info, &ptg_of_entry)?;
        let enumerator = Variable::local(ENUMERATOR_VARIABLE, info.get_enumerator.return_type.clone());
        let ptg_after_enum = self.bind_enumerator(info, &ptg_of_entry, &entry_return, &enumerator);

        let move_next = self.body_of(info, "MoveNext", &info.move_next)?;
        let Some(this) = move_next.this_parameter().cloned() else {
            return Err(ProcessorError::Unsupported {
                processor: info.name(),
                reason: format!("{} has no receiver", info.move_next),
            });
        };
        let mut ptg = ptg_after_enum;
        ptg.new_frame(&[
            (enumerator, this.clone()),
            (Variable::global(), Variable::global()),
        ]);

        let cfg = move_next.cfg.with_iteration_edge();
        let ranges = RangeAnalysis::new(&move_next.method).analyze(&cfg, iterations);
        let equalities = ExpressionMap::propagate(&cfg);

        self.manager
            .set_schemas(info.input_schema.clone(), info.output_schema.clone());
        self.manager.enter(move_next.method.clone());
        let outcome = IteratorDependencyAnalysis::new(&mut self.manager, Arc::clone(&move_next), Arc::new(protected))
            .with_ranges(ranges)
            .with_equalities(equalities)
            .with_base_graph(ptg)
            .analyze(&cfg);
        self.manager.leave();

        let mut analysis = ProcessorAnalysis {
            state: outcome.state,
            input_columns: outcome.input_columns,
            output_columns: outcome.output_columns,
            converged: outcome.converged,
            diagnostics: self.manager.diagnostics().clone(),
        };

        if analysis.output_columns.is_empty()
            && !analysis.state.is_top()
            && yielded_tables(&analysis.state, &this).contains(&TableKind::Input)
        {
            debug!(processor = %info.name(), "input row yielded unchanged, copying it to the output");
            for (read, written) in copy_row(
                &mut analysis.state,
                &this,
                &info.input_schema,
                TableKind::Input,
                TableKind::Output,
            ) {
                analysis.input_columns.insert(read);
                analysis.output_columns.insert(written);
            }
        }

        info!(
            processor = %info.name(),
            top = analysis.state.is_top(),
            inputs = analysis.input_columns.len(),
            outputs = analysis.output_columns.len(),
            "processor analyzed"
        );
        self.results.insert(key, analysis.clone());
        Ok(analysis)
    }

    fn body_of(&mut self, info: &ProcessorInfo, role: &'static str, method: &MethodRef) -> ProcessorResult<Arc<MethodBody>> {
        self.manager
            .method_body(method)
            .ok_or_else(|| ProcessorError::MissingMethod {
                processor: info.name(),
                role,
                method: method.signature(),
            })
    }

    /// Scope-typed parameter nodes of the entry method
    fn protected_nodes(&self, info: &ProcessorInfo, ptg: &PointsToGraph) -> ProcessorResult<ProtectedNodes> {
        let types = self.manager.scope_types();
        let protected: ProtectedNodes = ptg
            .nodes()
            .filter(|node| node.kind == NodeKind::Parameter)
            .filter_map(|node| {
                let ty = node.ty.as_ref()?;
                types
                    .is_scope_type(ty)
                    .then(|| (node.id.clone(), types.protected_kind(ty)))
            })
            .collect();

        let inputs = protected.count(TableKind::Input);
        let outputs = protected.count(TableKind::Output);
        if inputs != 1 || outputs != 1 {
            return Err(ProcessorError::ProtectedNodes {
                processor: info.name(),
                inputs,
                outputs,
            });
        }
        Ok(protected)
    }

    /// Graph after `$_temp_it = entry_result.GetEnumerator()`. When the
    /// factory cannot be analyzed the iterator is its own enumerator.
    fn bind_enumerator(
        &mut self,
        info: &ProcessorInfo,
        ptg: &PointsToGraph,
        entry_return: &Variable,
        enumerator: &Variable,
    ) -> PointsToGraph {
        let arguments = [entry_return.clone()];
        match self
            .manager
            .pta_inter_proc_analysis(ptg, &info.get_enumerator, &arguments, Some(enumerator))
        {
            Ok(bound) => bound,
            Err(failure) => {
                debug!(%failure, "enumerator factory not analyzable, binding the iterator directly");
                let mut bound = ptg.clone();
                let targets = bound.targets(entry_return);
                bound.points_to_all(enumerator, targets.iter());
                bound
            }
        }
    }
}

/// Tables behind the row last stored into the iterator's current field
fn yielded_tables(state: &DependencyPtgDomain, this: &Variable) -> Vec<TableKind> {
    let mut tokens = TraceableSet::new();
    for node in state.ptg.non_null_targets(this) {
        let mut fields: Vec<FieldRef> = state
            .ptg
            .fields_of(&node)
            .into_iter()
            .map(|(field, _)| field.clone())
            .collect();
        fields.extend(
            state
                .dependencies
                .fields
                .keys()
                .filter(|location| location.node == node)
                .map(|location| location.field.clone()),
        );
        for field in fields.iter().filter(|f| f.name == CURRENT_FIELD) {
            tokens.extend(state.get_node_heap_traceables(&node, field));
        }
    }
    tables(&tokens)
}

impl std::fmt::Debug for ProcessorAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessorAnalyzer")
            .field("manager", &self.manager)
            .field("cached", &self.results.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::models::{Cfg, Instruction, TypeRef};
    use crate::shared::ports::InMemoryProgram;

    fn processor_type() -> TypeRef {
        TypeRef::class("Demo", "Proc")
    }

    fn iterator_type() -> TypeRef {
        TypeRef::class("Demo", "<Process>d__0")
            .compiler_generated()
            .nested_in(processor_type())
    }

    fn info() -> ProcessorInfo {
        let iterator = iterator_type();
        ProcessorInfo::new(
            processor_type(),
            MethodRef::new(processor_type(), "Process", iterator.clone()),
            MethodRef::new(iterator.clone(), "GetEnumerator", iterator.clone()),
            MethodRef::new(iterator, "MoveNext", TypeRef::boolean()),
        )
    }

    #[test]
    fn test_missing_entry_method() {
        let mut analyzer = ProcessorAnalyzer::new(Arc::new(InMemoryProgram::new()), AnalysisConfig::default());
        let err = analyzer.analyze(&info()).unwrap_err();
        assert!(matches!(err, ProcessorError::MissingMethod { role: "entry", .. }));
    }

    #[test]
    fn test_entry_without_tables_is_rejected() {
        let info = info();
        let this = Variable::this(processor_type());
        let iterator = Variable::local("it", iterator_type());
        let entry = MethodBody::new(
            info.entry_method.clone(),
            vec![this],
            Cfg::linear(vec![
                Instruction::create_object(0, &iterator, iterator_type()),
                Instruction::ret(1, Some(&iterator)),
            ]),
        );
        let program = InMemoryProgram::new().with_method(entry);
        let mut analyzer = ProcessorAnalyzer::new(Arc::new(program), AnalysisConfig::default());

        let err = analyzer.analyze(&info).unwrap_err();
        assert_eq!(
            err,
            ProcessorError::ProtectedNodes {
                processor: "Demo.Proc".into(),
                inputs: 0,
                outputs: 0,
            }
        );
    }
}
