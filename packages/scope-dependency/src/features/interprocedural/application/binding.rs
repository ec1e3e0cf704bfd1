//! Moving dependency state across a call boundary
//!
//! Caller → callee: a fresh frame where each parameter carries the tokens
//! (and output/control tokens) of its argument, sharing the heap parts of
//! the domain. Callee → caller: parameters flow back into the arguments,
//! every variable the callee wrote to an output survives as a qualified
//! `{callee}_{var}` local, and the return value lands on the call result.

use crate::features::dependency::domain::{add_range, DependencyDomain, DependencyPtgDomain, TraceableSet};
use crate::shared::models::{MethodRef, Variable};

/// Tokens, output tokens and control tokens observed for one variable
struct Flow {
    target: Variable,
    tokens: TraceableSet,
    output: TraceableSet,
    control: TraceableSet,
}

impl Flow {
    fn read(state: &DependencyPtgDomain, source: &Variable, target: Variable) -> Self {
        Self {
            target,
            tokens: state.get_traceables(source),
            output: state.get_output_traceables(source),
            control: state.get_output_control_traceables(source),
        }
    }

    fn add_to(&self, state: &mut DependencyPtgDomain) {
        state.add_traceables(&self.target, &self.tokens);
        add_output(state, &self.target, &self.output, &self.control);
    }
}

fn add_output(state: &mut DependencyPtgDomain, target: &Variable, output: &TraceableSet, control: &TraceableSet) {
    if !output.is_empty() {
        state.add_output_traceables(target, output);
    }
    if !control.is_empty() {
        state.add_output_control_traceables(target, control);
    }
}

/// Entry state of the callee. `arguments` and `parameters` are already
/// aligned (same length).
pub fn bind_caller_to_callee(
    caller: &DependencyPtgDomain,
    arguments: &[Variable],
    parameters: &[Variable],
) -> DependencyPtgDomain {
    let mut ptg = caller.ptg.clone();
    let mut binding: Vec<(Variable, Variable)> = arguments.iter().cloned().zip(parameters.iter().cloned()).collect();
    binding.push((Variable::global(), Variable::global()));
    ptg.new_frame(&binding);

    let mut dependencies = DependencyDomain::new();
    dependencies.set_is_top(caller.is_top());
    dependencies.escaping = caller.dependencies.escaping.clone();
    dependencies.references = caller.dependencies.references.clone();
    dependencies.fields = caller.dependencies.fields.clone();
    dependencies.control_variables = caller.dependencies.control_variables.clone();

    let mut state = DependencyPtgDomain::new(dependencies, ptg);
    state.iterator_state = caller.iterator_state.clone();

    // control variables keep their caller tokens inside the callee
    for variable in &caller.dependencies.control_variables {
        let tokens = caller.get_traceables(variable);
        if !tokens.is_empty() {
            state.dependencies.variables.insert(variable.clone(), tokens);
        }
    }

    for (argument, parameter) in arguments.iter().zip(parameters) {
        let flow = Flow::read(caller, argument, parameter.clone());
        state.assign_traceables(parameter, flow.tokens.clone());
        add_output(&mut state, parameter, &flow.output, &flow.control);
    }
    state
}

/// Caller state after the call returns
pub fn bind_callee_to_caller(
    caller: &DependencyPtgDomain,
    callee_exit: DependencyPtgDomain,
    arguments: &[Variable],
    parameters: &[Variable],
    callee: &MethodRef,
    return_variable: &Variable,
    result: Option<&Variable>,
) -> DependencyPtgDomain {
    // everything is read through the callee frame before it is popped
    let parameter_flows: Vec<Flow> = arguments
        .iter()
        .zip(parameters)
        .map(|(argument, parameter)| Flow::read(&callee_exit, parameter, argument.clone()))
        .collect();

    let mut written: Vec<&Variable> = callee_exit.dependencies.output.keys().collect();
    written.extend(
        callee_exit
            .dependencies
            .output_control
            .keys()
            .filter(|v| !callee_exit.dependencies.output.contains_key(*v)),
    );
    written.sort();
    let written_flows: Vec<Flow> = written
        .into_iter()
        .map(|variable| Flow {
            target: variable.renamed(format!("{}_{}", callee.name, variable.name)),
            tokens: callee_exit.get_traceables(variable),
            output: callee_exit.dependencies.output.get(variable).cloned().unwrap_or_default(),
            control: callee_exit
                .dependencies
                .output_control
                .get(variable)
                .cloned()
                .unwrap_or_default(),
        })
        .collect();

    let returned = result.map(|lhs| Flow::read(&callee_exit, return_variable, lhs.clone()));

    let DependencyPtgDomain {
        dependencies: callee_dependencies,
        mut ptg,
        ..
    } = callee_exit;
    ptg.restore_frame(result.map(|lhs| (return_variable, lhs)));

    let mut state = DependencyPtgDomain::new(caller.dependencies.clone(), ptg);
    state.iterator_state = caller.iterator_state.clone();
    state.block_state = caller.block_state.clone();

    let callee_top = callee_dependencies.is_top();
    let dependencies = &mut state.dependencies;
    dependencies.escaping.extend(callee_dependencies.escaping);
    for (node, tokens) in callee_dependencies.references {
        add_range(&mut dependencies.references, &node, tokens);
    }
    for (location, tokens) in callee_dependencies.fields {
        add_range(&mut dependencies.fields, &location, tokens);
    }
    dependencies.set_is_top(callee_top);

    for flow in parameter_flows.iter().chain(written_flows.iter()) {
        flow.add_to(&mut state);
    }

    if let Some(flow) = returned {
        state.assign_traceables(&flow.target, flow.tokens.clone());
        add_output(&mut state, &flow.target, &flow.output, &flow.control);
    }
    state
}
