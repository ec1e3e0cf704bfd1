/*
 * Forward Dataflow Framework
 *
 * Worklist fixed-point solver shared by the range analysis, the
 * points-to analysis and the dependency analysis.
 *
 * Algorithm:
 * - Entry input = initial value, every other node starts unvisited
 * - Node input = join of visited predecessor outputs, widened against the
 *   previous input of the node
 * - Successors are re-queued when the node output grows (by `less_equal`)
 * - Iterations are bounded; hitting the bound leaves `converged == false`
 */

use std::collections::VecDeque;
use tracing::debug;

use crate::shared::models::{Cfg, CfgNode, NodeId};

/// A forward analysis over a [`Cfg`]
pub trait ForwardAnalysis {
    type Domain: Clone;

    /// Value flowing into `node` when no predecessor has been visited yet
    fn initial_value(&mut self, node: &CfgNode) -> Self::Domain;

    /// Least upper bound
    fn join(&mut self, left: &Self::Domain, right: &Self::Domain) -> Self::Domain;

    /// Partial order used to detect convergence
    fn less_equal(&self, left: &Self::Domain, right: &Self::Domain) -> bool;

    /// Transfer function of a whole block
    fn flow(&mut self, node: &CfgNode, input: Self::Domain) -> Self::Domain;

    /// Widening applied to a node input against its previous input
    fn widen(&mut self, _previous: &Self::Domain, next: Self::Domain) -> Self::Domain {
        next
    }
}

/// Per-node inputs/outputs of a solved analysis
#[derive(Debug, Clone)]
pub struct DataflowResult<D> {
    inputs: Vec<Option<D>>,
    outputs: Vec<Option<D>>,
    pub iterations: usize,
    pub converged: bool,
}

impl<D> DataflowResult<D> {
    pub fn input(&self, node: NodeId) -> Option<&D> {
        self.inputs.get(node).and_then(|d| d.as_ref())
    }

    pub fn output(&self, node: NodeId) -> Option<&D> {
        self.outputs.get(node).and_then(|d| d.as_ref())
    }

    /// Output of the exit node
    pub fn exit_output(&self, cfg: &Cfg) -> Option<&D> {
        self.output(cfg.exit())
    }
}

/// Worklist solver
pub struct ForwardSolver {
    max_iterations: usize,
}

impl ForwardSolver {
    pub fn new(max_iterations: usize) -> Self {
        Self { max_iterations }
    }

    pub fn solve<A: ForwardAnalysis>(&self, cfg: &Cfg, analysis: &mut A) -> DataflowResult<A::Domain> {
        let size = cfg.len();
        let mut inputs: Vec<Option<A::Domain>> = vec![None; size];
        let mut outputs: Vec<Option<A::Domain>> = vec![None; size];
        let mut queued = vec![false; size];
        let mut pending: VecDeque<NodeId> = VecDeque::with_capacity(size);

        for id in cfg.forward_order() {
            queued[id] = true;
            pending.push_back(id);
        }

        let mut iterations = 0;
        let mut converged = true;

        while let Some(id) = pending.pop_front() {
            queued[id] = false;
            iterations += 1;
            if iterations > self.max_iterations {
                debug!(iterations, "dataflow iteration bound reached");
                converged = false;
                break;
            }

            let Some(node) = cfg.node(id) else {
                continue;
            };

            let joined = if id == cfg.entry() {
                Some(analysis.initial_value(node))
            } else {
                let mut acc: Option<A::Domain> = None;
                for pred in &node.predecessors {
                    if let Some(out) = &outputs[*pred] {
                        acc = Some(match acc {
                            None => out.clone(),
                            Some(current) => analysis.join(&current, out),
                        });
                    }
                }
                acc
            };

            // unreachable so far: wait for a predecessor
            let Some(joined) = joined else {
                continue;
            };

            let input = match &inputs[id] {
                Some(previous) => analysis.widen(previous, joined),
                None => joined,
            };
            inputs[id] = Some(input.clone());

            let output = analysis.flow(node, input);
            let changed = match &outputs[id] {
                Some(previous) => !analysis.less_equal(&output, previous),
                None => true,
            };

            if changed {
                outputs[id] = Some(output);
                for succ in &node.successors {
                    if !queued[*succ] {
                        queued[*succ] = true;
                        pending.push_back(*succ);
                    }
                }
            }
        }

        DataflowResult {
            inputs,
            outputs,
            iterations,
            converged,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::models::cfg::{ENTRY, EXIT};
    use rustc_hash::FxHashSet;

    /// Collects visited block ids; loops converge once the set stops growing
    struct Reachability;

    impl ForwardAnalysis for Reachability {
        type Domain = FxHashSet<NodeId>;

        fn initial_value(&mut self, _node: &CfgNode) -> Self::Domain {
            FxHashSet::default()
        }

        fn join(&mut self, left: &Self::Domain, right: &Self::Domain) -> Self::Domain {
            left.union(right).copied().collect()
        }

        fn less_equal(&self, left: &Self::Domain, right: &Self::Domain) -> bool {
            left.is_subset(right)
        }

        fn flow(&mut self, node: &CfgNode, mut input: Self::Domain) -> Self::Domain {
            input.insert(node.id);
            input
        }
    }

    #[test]
    fn test_loop_converges() {
        let mut cfg = Cfg::new();
        let head = cfg.add_node(Vec::new());
        let body = cfg.add_node(Vec::new());
        cfg.connect(ENTRY, head);
        cfg.connect(head, body);
        cfg.connect(body, head);
        cfg.connect(head, EXIT);

        let result = ForwardSolver::new(1000).solve(&cfg, &mut Reachability);
        assert!(result.converged);
        let exit = result.exit_output(&cfg).unwrap();
        assert!(exit.contains(&head));
        assert!(exit.contains(&body));
    }

    #[test]
    fn test_iteration_bound() {
        let mut cfg = Cfg::new();
        let head = cfg.add_node(Vec::new());
        cfg.connect(ENTRY, head);
        cfg.connect(head, EXIT);

        let result = ForwardSolver::new(1).solve(&cfg, &mut Reachability);
        assert!(!result.converged);
    }
}
