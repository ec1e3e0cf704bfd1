//! Range analysis
//!
//! Forward dataflow over [`VariableRangeDomain`]. Node inputs are joined
//! and then widened against the previous input, so loops terminate.

use tracing::debug;

use crate::features::range_analysis::domain::{RangeValue, VariableRangeDomain};
use crate::shared::dataflow::{DataflowResult, ForwardAnalysis, ForwardSolver};
use crate::shared::models::{
    BinaryOp, Cfg, CfgNode, Constant, Instruction, InstructionKind, MethodRef, NodeId, Operand, Variable,
};

/// Range of a literal operand
pub fn constant_range(value: &Constant) -> RangeValue {
    match value {
        Constant::Int(v) => RangeValue::singleton(*v),
        Constant::Bool(b) => RangeValue::singleton(i64::from(*b)),
        Constant::Str(s) => RangeValue::literal(s.clone()),
        Constant::Null | Constant::Float(_) => RangeValue::Bottom,
    }
}

pub struct RangeAnalysis {
    return_variable: Variable,
    initial: Option<VariableRangeDomain>,
}

impl RangeAnalysis {
    pub fn new(method: &MethodRef) -> Self {
        Self {
            return_variable: Variable::return_value(&method.name),
            initial: None,
        }
    }

    /// Builder: seed the entry node with caller-supplied ranges
    pub fn with_initial_ranges(mut self, ranges: VariableRangeDomain) -> Self {
        self.initial = Some(ranges);
        self
    }

    pub fn return_variable(&self) -> &Variable {
        &self.return_variable
    }

    pub fn analyze(mut self, cfg: &Cfg, max_iterations: usize) -> RangeAnalysisResult {
        let result = ForwardSolver::new(max_iterations).solve(cfg, &mut self);
        debug!(
            iterations = result.iterations,
            converged = result.converged,
            "range analysis finished"
        );
        RangeAnalysisResult {
            result,
            return_variable: self.return_variable,
            empty: VariableRangeDomain::new(),
            exit: cfg.exit(),
        }
    }

    fn transfer(&self, instruction: &Instruction, state: &mut VariableRangeDomain) {
        match &instruction.kind {
            InstructionKind::Load { result, operand } => match operand {
                Operand::Constant { value, .. } => state.set(result, constant_range(value)),
                Operand::Variable(source) => state.set(result, state.get(source)),
                _ => self.default_transfer(instruction, state),
            },
            InstructionKind::Return { operand: Some(source) } => {
                state.set(&self.return_variable, state.get(source));
            }
            InstructionKind::Binary { result, op, left, right } => {
                let l = state.get(left);
                let r = state.get(right);
                let value = match op {
                    BinaryOp::Add => l.add(&r),
                    BinaryOp::Sub => l.sub(&r),
                    _ => RangeValue::top(),
                };
                state.set(result, value);
            }
            _ => self.default_transfer(instruction, state),
        }
    }

    /// Every defined variable gets the join of the used variables
    fn default_transfer(&self, instruction: &Instruction, state: &mut VariableRangeDomain) {
        let used = instruction
            .used_variables()
            .into_iter()
            .fold(RangeValue::Bottom, |acc, v| acc.join(&state.get(v)));
        for defined in instruction.defined_variables() {
            state.set(defined, used.clone());
        }
    }
}

impl ForwardAnalysis for RangeAnalysis {
    type Domain = VariableRangeDomain;

    fn initial_value(&mut self, _node: &CfgNode) -> VariableRangeDomain {
        self.initial.clone().unwrap_or_default()
    }

    fn join(&mut self, left: &VariableRangeDomain, right: &VariableRangeDomain) -> VariableRangeDomain {
        left.join(right)
    }

    fn less_equal(&self, left: &VariableRangeDomain, right: &VariableRangeDomain) -> bool {
        left.less_equal(right)
    }

    fn flow(&mut self, node: &CfgNode, mut input: VariableRangeDomain) -> VariableRangeDomain {
        for instruction in &node.instructions {
            self.transfer(instruction, &mut input);
        }
        input
    }

    fn widen(&mut self, previous: &VariableRangeDomain, next: VariableRangeDomain) -> VariableRangeDomain {
        next.widen(previous)
    }
}

/// Solved ranges per node
#[derive(Debug, Clone)]
pub struct RangeAnalysisResult {
    result: DataflowResult<VariableRangeDomain>,
    return_variable: Variable,
    empty: VariableRangeDomain,
    exit: NodeId,
}

impl RangeAnalysisResult {
    /// Ranges after the block; empty when the block was never reached
    pub fn node_output(&self, node: NodeId) -> &VariableRangeDomain {
        self.result.output(node).unwrap_or(&self.empty)
    }

    pub fn node_input(&self, node: NodeId) -> &VariableRangeDomain {
        self.result.input(node).unwrap_or(&self.empty)
    }

    /// Ranges reaching the exit node
    pub fn exit_input(&self) -> &VariableRangeDomain {
        self.node_input(self.exit)
    }

    pub fn return_variable(&self) -> &Variable {
        &self.return_variable
    }

    pub fn return_range(&self) -> RangeValue {
        self.node_output(self.exit).get(&self.return_variable)
    }

    pub fn converged(&self) -> bool {
        self.result.converged
    }
}
