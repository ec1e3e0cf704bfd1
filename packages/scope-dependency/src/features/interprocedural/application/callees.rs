//! Call target resolution
//!
//! Candidates come from the points-to graph: the dynamic types of the
//! receiver objects for virtual calls, the delegate nodes for `Invoke`,
//! the declared type for static calls and constructors. A candidate is
//! resolved when the repository has a body for it.

use tracing::debug;

use super::manager::InterproceduralManager;
use crate::features::interprocedural::domain::{CalleeTarget, PotentialCallees};
use crate::features::points_to::{NodeKind, PointsToGraph};
use crate::shared::models::{MethodRef, Variable};

const MSCORLIB: &str = "mscorlib";

/// `IDisposable.Dispose` of framework types never touches rows
fn is_framework_dispose(method: &MethodRef) -> bool {
    method.name.ends_with("Dispose") && method.containing_type.is_assembly(MSCORLIB)
}

impl InterproceduralManager {
    pub fn compute_potential_callees(
        &mut self,
        ptg: &PointsToGraph,
        method: &MethodRef,
        arguments: &[Variable],
    ) -> PotentialCallees {
        if method.name == "Invoke" && method.containing_type.is_delegate() {
            if let Some(delegate) = arguments.first() {
                return self.compute_delegate(ptg, delegate);
            }
        }

        let mut candidates: Vec<MethodRef> = Vec::new();
        if !method.is_static && !method.is_constructor() {
            if let Some(receiver) = arguments.first() {
                for node in ptg.non_null_targets(receiver) {
                    let Some(ty) = ptg.node(&node).and_then(|n| n.ty.clone()) else {
                        continue;
                    };
                    candidates.push(self.program().find_method_implementation(&ty, method));
                }
            }
        }
        if candidates.is_empty() {
            candidates.push(self.program().find_method_implementation(&method.containing_type, method));
        }
        candidates.sort_by_key(|m| m.signature());
        candidates.dedup_by_key(|m| m.signature());

        let mut potential = PotentialCallees::default();
        for candidate in candidates {
            self.classify(CalleeTarget::direct(candidate), &mut potential);
        }
        debug!(
            method = %method,
            resolved = potential.resolved.len(),
            unresolved = potential.unresolved.len(),
            "potential callees"
        );
        potential
    }

    /// Targets of the delegate objects `delegate` may point to
    pub fn compute_delegate(&mut self, ptg: &PointsToGraph, delegate: &Variable) -> PotentialCallees {
        let targets: Vec<CalleeTarget> = ptg
            .targets_of_kind(delegate, NodeKind::Delegate)
            .into_iter()
            .filter_map(|node| node.delegate.as_ref())
            .map(|target| {
                let receiver = if target.method.is_static { None } else { target.instance.clone() };
                let method = match receiver.as_ref().and_then(|r| r.ty.as_ref()) {
                    Some(ty) => self.program().find_method_implementation(ty, &target.method),
                    None => target.method.clone(),
                };
                CalleeTarget { method, receiver }
            })
            .collect();

        let mut potential = PotentialCallees::default();
        for target in targets {
            self.classify(target, &mut potential);
        }
        potential
    }

    fn classify(&mut self, target: CalleeTarget, potential: &mut PotentialCallees) {
        if self.method_body(&target.method).is_some() {
            self.diagnostics_mut().counters.resolved_methods += 1;
            potential.resolved.push(target);
        } else if !is_framework_dispose(&target.method) {
            self.diagnostics_mut().counters.unresolved_methods += 1;
            potential.unresolved.push(target.method);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisConfig;
    use crate::features::points_to::{PtgId, PtgNode};
    use crate::shared::models::{Cfg, Instruction, MethodBody, TypeRef};
    use crate::shared::ports::InMemoryProgram;
    use std::sync::Arc;

    fn class(name: &str) -> TypeRef {
        TypeRef::class("Demo", name)
    }

    fn body(method: MethodRef) -> MethodBody {
        let this = Variable::this(method.containing_type.clone());
        MethodBody::new(method, vec![this.clone()], Cfg::linear(vec![Instruction::ret(0, None)]))
    }

    #[test]
    fn test_virtual_call_uses_receiver_types() {
        let base_run = MethodRef::new(class("Base"), "Run", TypeRef::void());
        let derived_run = base_run.declared_on(class("Derived"));
        let program = InMemoryProgram::new()
            .with_method(body(derived_run.clone()))
            .with_base_type(&class("Derived"), class("Base"));
        let mut manager = InterproceduralManager::new(Arc::new(program), AnalysisConfig::default());

        let receiver = Variable::local("r", class("Base"));
        let mut ptg = PointsToGraph::new();
        ptg.points_to_node(&receiver, PtgNode::object(PtgId::new("Main", 3), Some(class("Derived"))));

        let potential = manager.compute_potential_callees(&ptg, &base_run, &[receiver]);
        assert_eq!(potential.resolved, vec![CalleeTarget::direct(derived_run)]);
        assert!(potential.fully_resolved());
        assert_eq!(manager.diagnostics().counters.resolved_methods, 1);
    }

    #[test]
    fn test_framework_dispose_is_ignored() {
        let dispose = MethodRef::new(
            TypeRef::interface("System", "IDisposable").in_assembly(MSCORLIB),
            "Dispose",
            TypeRef::void(),
        );
        let mut manager = InterproceduralManager::new(Arc::new(InMemoryProgram::new()), AnalysisConfig::default());
        let receiver = Variable::local("d", TypeRef::interface("System", "IDisposable"));

        let potential = manager.compute_potential_callees(&PointsToGraph::new(), &dispose, &[receiver]);
        assert!(potential.resolved.is_empty());
        assert!(potential.unresolved.is_empty());
    }

    #[test]
    fn test_delegate_invoke_resolves_bound_method() {
        let lambda = MethodRef::new(class("Closure"), "<Run>b__0", TypeRef::string());
        let program = InMemoryProgram::new().with_method(body(lambda.clone()));
        let mut manager = InterproceduralManager::new(Arc::new(program), AnalysisConfig::default());

        let closure = Variable::local("c", class("Closure"));
        let del = Variable::local("f", TypeRef::delegate("System", "Func"));
        let mut ptg = PointsToGraph::new();
        ptg.points_to_node(&del, PtgNode::delegate(PtgId::new("Main", 7), lambda.clone(), Some(closure.clone())));

        let invoke = MethodRef::new(TypeRef::delegate("System", "Func"), "Invoke", TypeRef::string());
        let potential = manager.compute_potential_callees(&ptg, &invoke, &[del]);
        assert_eq!(
            potential.resolved,
            vec![CalleeTarget {
                method: lambda,
                receiver: Some(closure)
            }]
        );
    }
}
