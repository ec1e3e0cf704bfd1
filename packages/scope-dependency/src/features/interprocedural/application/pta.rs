//! Points-to only interprocedural step
//!
//! Used before the dependency analysis starts, to bind the enumerator the
//! processor's entry method hands out.

use super::manager::InterproceduralManager;
use crate::errors::{AnalysisFailure, Result};
use crate::features::points_to::{PointsToAnalysis, PointsToGraph};
use crate::shared::models::{MethodRef, Variable};

impl InterproceduralManager {
    /// Graph after `result = callee(arguments)` given the caller graph
    pub fn pta_inter_proc_analysis(
        &mut self,
        ptg: &PointsToGraph,
        callee: &MethodRef,
        arguments: &[Variable],
        result: Option<&Variable>,
    ) -> Result<PointsToGraph> {
        let body = self
            .method_body(callee)
            .ok_or_else(|| AnalysisFailure::MissingBody(callee.signature()))?;
        if arguments.len() < body.parameters.len() {
            return Err(AnalysisFailure::ArgumentMismatch {
                method: callee.signature(),
                arguments: arguments.len(),
                parameters: body.parameters.len(),
            });
        }

        let mut binding: Vec<(Variable, Variable)> = arguments
            .iter()
            .cloned()
            .zip(body.parameters.iter().cloned())
            .collect();
        binding.push((Variable::global(), Variable::global()));

        let mut frame = ptg.clone();
        frame.new_frame(&binding);

        let analysis = PointsToAnalysis::with_base(&body, Some(&frame))
            .analyze(&body.cfg, self.config().max_fixpoint_iterations);
        let return_variable = analysis.return_variable().clone();
        let mut exit = analysis.into_exit_graph();
        exit.restore_frame(result.map(|r| (&return_variable, r)));
        Ok(exit)
    }
}
