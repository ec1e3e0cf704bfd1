//! Intraprocedural points-to analysis
//!
//! Runs [`PointsToTransfer`] to a fixed point. The processor driver uses
//! it on the entry method to find the objects the enumerator captures; the
//! dependency analysis runs the same transfer inline instead.

use tracing::debug;

use super::transfer::PointsToTransfer;
use crate::features::points_to::domain::PointsToGraph;
use crate::shared::dataflow::{DataflowResult, ForwardAnalysis, ForwardSolver};
use crate::shared::models::{Cfg, CfgNode, MethodBody, Variable};

pub struct PointsToAnalysis {
    transfer: PointsToTransfer,
    initial: PointsToGraph,
}

impl PointsToAnalysis {
    /// Analysis of `body` from its own parameters
    pub fn new(body: &MethodBody) -> Self {
        Self::with_base(body, None)
    }

    /// Analysis of `body` starting from a caller-bound graph
    pub fn with_base(body: &MethodBody, base: Option<&PointsToGraph>) -> Self {
        let transfer = PointsToTransfer::new(body);
        let initial = transfer.initial_graph(&body.cfg, base);
        Self { transfer, initial }
    }

    pub fn initial_graph(&self) -> &PointsToGraph {
        &self.initial
    }

    pub fn analyze(mut self, cfg: &Cfg, max_iterations: usize) -> PointsToResult {
        let result = ForwardSolver::new(max_iterations).solve(cfg, &mut self);
        debug!(
            method = %self.transfer.method(),
            iterations = result.iterations,
            converged = result.converged,
            "points-to analysis finished"
        );
        let exit = result.exit_output(cfg).cloned().unwrap_or_else(|| self.initial.clone());
        PointsToResult {
            return_variable: self.transfer.return_variable().clone(),
            result,
            exit,
        }
    }
}

impl ForwardAnalysis for PointsToAnalysis {
    type Domain = PointsToGraph;

    fn initial_value(&mut self, _node: &CfgNode) -> PointsToGraph {
        self.initial.clone()
    }

    fn join(&mut self, left: &PointsToGraph, right: &PointsToGraph) -> PointsToGraph {
        left.join(right)
    }

    fn less_equal(&self, left: &PointsToGraph, right: &PointsToGraph) -> bool {
        left.less_equal(right)
    }

    fn flow(&mut self, node: &CfgNode, mut input: PointsToGraph) -> PointsToGraph {
        self.transfer.reset();
        for instruction in &node.instructions {
            self.transfer.apply(&mut input, instruction);
        }
        input
    }
}

#[derive(Debug, Clone)]
pub struct PointsToResult {
    result: DataflowResult<PointsToGraph>,
    return_variable: Variable,
    exit: PointsToGraph,
}

impl PointsToResult {
    /// Graph at the method exit
    pub fn exit_graph(&self) -> &PointsToGraph {
        &self.exit
    }

    pub fn into_exit_graph(self) -> PointsToGraph {
        self.exit
    }

    pub fn node_output(&self, node: usize) -> Option<&PointsToGraph> {
        self.result.output(node)
    }

    pub fn return_variable(&self) -> &Variable {
        &self.return_variable
    }

    pub fn converged(&self) -> bool {
        self.result.converged
    }
}
