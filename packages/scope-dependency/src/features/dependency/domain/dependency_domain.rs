//! Dependency lattice
//!
//! ```text
//! A1  escaping            : {traceable}
//! A2  variables           : variable -> {traceable}
//! A2  references          : node -> {traceable}
//! A3  fields              : (node, field) -> {traceable}
//! A4  output / control    : variable -> {traceable}
//!     control variables   : {variable}
//! ```
//!
//! Order is pointwise inclusion (a map is below another when its keys are
//! a subset and every set is included). `is_top` is the greatest element
//! and absorbs joins; escaping tokens survive every join, top included.

use rustc_hash::FxHashMap;
use std::collections::BTreeSet;
use std::fmt;
use std::hash::Hash;

use super::traceable::{Traceable, TraceableSet};
use crate::features::points_to::PtgId;
use crate::shared::models::{FieldRef, Variable};

/// A heap location: a field of an abstract node
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Location {
    pub node: PtgId,
    pub field: FieldRef,
}

impl Location {
    pub fn new(node: PtgId, field: FieldRef) -> Self {
        Self { node, field }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.node, self.field.name)
    }
}

pub type TraceableMap<K> = FxHashMap<K, TraceableSet>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyDomain {
    is_top: bool,
    pub escaping: TraceableSet,
    pub variables: TraceableMap<Variable>,
    pub references: TraceableMap<PtgId>,
    pub fields: TraceableMap<Location>,
    pub output: TraceableMap<Variable>,
    pub output_control: TraceableMap<Variable>,
    pub control_variables: BTreeSet<Variable>,
}

fn map_less_equal<K: Eq + Hash>(left: &TraceableMap<K>, right: &TraceableMap<K>) -> bool {
    left.len() <= right.len()
        && left
            .iter()
            .all(|(k, v)| right.get(k).map_or(false, |r| v.is_subset(r)))
}

fn map_union<K: Eq + Hash + Clone>(into: &mut TraceableMap<K>, other: &TraceableMap<K>) {
    for (k, v) in other {
        into.entry(k.clone()).or_default().extend(v.iter().cloned());
    }
}

/// Union `tokens` into the set of `key`
pub fn add_range<K: Eq + Hash + Clone>(map: &mut TraceableMap<K>, key: &K, tokens: impl IntoIterator<Item = Traceable>) {
    map.entry(key.clone()).or_default().extend(tokens);
}

impl DependencyDomain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_top(&self) -> bool {
        self.is_top
    }

    pub fn set_top(&mut self) {
        self.is_top = true;
    }

    /// Overwrite the top flag (used when binding callee results back)
    pub fn set_is_top(&mut self, is_top: bool) {
        self.is_top = is_top;
    }

    fn top_with_escaping(escaping: TraceableSet) -> Self {
        Self {
            is_top: true,
            escaping,
            ..Self::default()
        }
    }

    pub fn less_equal(&self, other: &DependencyDomain) -> bool {
        if other.is_top {
            return true;
        }
        if self.is_top {
            return false;
        }
        self.escaping.is_subset(&other.escaping)
            && map_less_equal(&self.references, &other.references)
            && map_less_equal(&self.variables, &other.variables)
            && map_less_equal(&self.fields, &other.fields)
            && map_less_equal(&self.output, &other.output)
            && map_less_equal(&self.output_control, &other.output_control)
            && self.control_variables.is_subset(&other.control_variables)
    }

    /// Equal in the lattice order
    pub fn equivalent(&self, other: &DependencyDomain) -> bool {
        self.less_equal(other) && other.less_equal(self)
    }

    pub fn join(&self, right: &DependencyDomain) -> DependencyDomain {
        if self.is_top || right.is_top {
            let escaping = self.escaping.union(&right.escaping).cloned().collect();
            return Self::top_with_escaping(escaping);
        }
        if right.less_equal(self) {
            return self.clone();
        }
        if self.less_equal(right) {
            return right.clone();
        }

        let mut result = self.clone();
        result.escaping.extend(right.escaping.iter().cloned());
        map_union(&mut result.references, &right.references);
        map_union(&mut result.variables, &right.variables);
        map_union(&mut result.fields, &right.fields);
        map_union(&mut result.output, &right.output);
        map_union(&mut result.output_control, &right.output_control);
        result
            .control_variables
            .extend(right.control_variables.iter().cloned());
        result
    }
}

fn join_tokens(set: &TraceableSet) -> String {
    set.iter().map(|t| t.to_string()).collect::<Vec<_>>().join(",")
}

fn sorted_keys<K: fmt::Display>(map: &TraceableMap<K>) -> Vec<(String, &TraceableSet)> {
    let mut entries: Vec<(String, &TraceableSet)> = map.iter().map(|(k, v)| (k.to_string(), v)).collect();
    entries.sort_by(|a, b| a.0.cmp(&b.0));
    entries
}

impl fmt::Display for DependencyDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_top {
            return write!(f, "__TOP__");
        }
        writeln!(f, "A3")?;
        for (location, tokens) in sorted_keys(&self.fields) {
            writeln!(f, "{}:{}", location, join_tokens(tokens))?;
        }
        for (title, map) in [("A4", &self.output), ("A4_Control", &self.output_control)] {
            writeln!(f, "{}", title)?;
            let mut keys: Vec<&Variable> = map.keys().collect();
            keys.sort();
            for var in keys {
                let carried = self.variables.get(var).map(join_tokens).unwrap_or_default();
                let deps = map.get(var).map(join_tokens).unwrap_or_default();
                writeln!(f, "({}){}= dep({})", var, carried, deps)?;
            }
        }
        writeln!(f, "Escape")?;
        write!(f, "{}", join_tokens(&self.escaping))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::dependency::domain::traceable::TableKind;
    use crate::shared::models::TypeRef;

    fn var(name: &str) -> Variable {
        Variable::local(name, TypeRef::int32())
    }

    fn tokens(labels: &[&str]) -> TraceableSet {
        labels.iter().map(|l| Traceable::other(*l)).collect()
    }

    #[test]
    fn test_top_order() {
        let mut top = DependencyDomain::new();
        top.set_top();
        let mut d = DependencyDomain::new();
        d.variables.insert(var("x"), tokens(&["a"]));

        assert!(d.less_equal(&top));
        assert!(!top.less_equal(&d));
        assert!(top.less_equal(&top));
    }

    #[test]
    fn test_join_is_pointwise_union() {
        let mut left = DependencyDomain::new();
        left.variables.insert(var("x"), tokens(&["a"]));
        let mut right = DependencyDomain::new();
        right.variables.insert(var("x"), tokens(&["b"]));
        right.control_variables.insert(var("c"));

        let joined = left.join(&right);
        assert_eq!(joined.variables[&var("x")], tokens(&["a", "b"]));
        assert!(joined.control_variables.contains(&var("c")));
        assert!(left.less_equal(&joined));
        assert!(right.less_equal(&joined));
    }

    #[test]
    fn test_join_keeps_subsuming_side() {
        let mut small = DependencyDomain::new();
        small.variables.insert(var("x"), tokens(&["a"]));
        let mut big = small.clone();
        big.variables.insert(var("y"), tokens(&["b"]));
        assert_eq!(small.join(&big), big);
        assert_eq!(big.join(&small), big);
    }

    #[test]
    fn test_top_absorbs_but_keeps_escaping() {
        let mut d = DependencyDomain::new();
        d.escaping.insert(Traceable::Table(TableKind::Input));
        let mut top = DependencyDomain::new();
        top.set_top();

        let joined = d.join(&top);
        assert!(joined.is_top());
        assert!(joined.escaping.contains(&Traceable::Table(TableKind::Input)));
        assert_eq!(joined, top.join(&d));
    }

    #[test]
    fn test_missing_key_is_not_below() {
        let mut left = DependencyDomain::new();
        left.output.insert(var("o"), TraceableSet::new());
        assert!(!left.less_equal(&DependencyDomain::new()));
        assert!(DependencyDomain::new().less_equal(&left));
    }

    #[test]
    fn test_display() {
        let mut d = DependencyDomain::new();
        d.output.insert(var("o"), tokens(&["a"]));
        d.variables.insert(var("o"), tokens(&["b"]));
        let text = d.to_string();
        assert!(text.contains("(o)b= dep(a)"));
        d.set_top();
        assert_eq!(d.to_string(), "__TOP__");
    }
}
