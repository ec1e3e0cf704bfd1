//! Points-to Graph
//!
//! Arena of abstract nodes keyed by [`PtgId`], a root map
//! `variable → {node}` and field edges `(node, field) → {node}`.
//!
//! Call frames: `new_frame` pushes the caller roots and binds callee
//! parameters to the argument targets; `restore_frame` pops them back,
//! optionally binding the callee return nodes to the caller destination,
//! and drops nodes no longer reachable from any root.

use rustc_hash::FxHashMap;
use std::collections::{BTreeSet, VecDeque};

use super::node::{NodeKind, PtgId, PtgNode};
use crate::shared::models::{FieldRef, Variable};

pub type NodeSet = BTreeSet<PtgId>;

type Roots = FxHashMap<Variable, NodeSet>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointsToGraph {
    nodes: FxHashMap<PtgId, PtgNode>,
    roots: Roots,
    edges: FxHashMap<PtgId, FxHashMap<FieldRef, NodeSet>>,
    frames: Vec<Roots>,
}

impl Default for PointsToGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl PointsToGraph {
    /// Graph holding only the null node
    pub fn new() -> Self {
        let mut nodes = FxHashMap::default();
        nodes.insert(PtgId::null(), PtgNode::null());
        Self {
            nodes,
            roots: FxHashMap::default(),
            edges: FxHashMap::default(),
            frames: Vec::new(),
        }
    }

    // ═══════════════════════════════════════════════════════════════════
    // Nodes and roots
    // ═══════════════════════════════════════════════════════════════════

    /// Register a node; an existing node with the same id is kept
    pub fn add_node(&mut self, node: PtgNode) -> PtgId {
        let id = node.id.clone();
        self.nodes.entry(id.clone()).or_insert(node);
        id
    }

    pub fn node(&self, id: &PtgId) -> Option<&PtgNode> {
        self.nodes.get(id)
    }

    pub fn node_mut(&mut self, id: &PtgId) -> Option<&mut PtgNode> {
        self.nodes.get_mut(id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &PtgNode> {
        self.nodes.values()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn contains_node(&self, id: &PtgId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Declare a root without targets
    pub fn add_root(&mut self, variable: &Variable) {
        self.roots.entry(variable.clone()).or_default();
    }

    pub fn contains_variable(&self, variable: &Variable) -> bool {
        self.roots.contains_key(variable)
    }

    pub fn roots(&self) -> impl Iterator<Item = &Variable> {
        self.roots.keys()
    }

    pub fn frame_depth(&self) -> usize {
        self.frames.len()
    }

    // ═══════════════════════════════════════════════════════════════════
    // Edges
    // ═══════════════════════════════════════════════════════════════════

    /// Weak update: add `target` to the targets of `variable`
    pub fn points_to(&mut self, variable: &Variable, target: &PtgId) {
        self.roots
            .entry(variable.clone())
            .or_default()
            .insert(target.clone());
    }

    pub fn points_to_all<'a>(&mut self, variable: &Variable, targets: impl IntoIterator<Item = &'a PtgId>) {
        let entry = self.roots.entry(variable.clone()).or_default();
        for t in targets {
            entry.insert(t.clone());
        }
    }

    /// Register `node` and point `variable` to it
    pub fn points_to_node(&mut self, variable: &Variable, node: PtgNode) -> PtgId {
        let id = self.add_node(node);
        self.points_to(variable, &id);
        id
    }

    /// Add a field edge. A `{null}`-only target set is replaced; the null
    /// node never gets fields.
    pub fn points_to_field(&mut self, source: &PtgId, field: &FieldRef, target: &PtgId) {
        if *source == PtgId::null() {
            return;
        }
        let fields = self.edges.entry(source.clone()).or_default();
        let targets = fields.entry(field.clone()).or_default();
        if targets.len() == 1 && targets.contains(&PtgId::null()) {
            targets.clear();
        }
        targets.insert(target.clone());
    }

    /// Clear the targets of a root (the root itself stays)
    pub fn remove_root_edges(&mut self, variable: &Variable) {
        if let Some(targets) = self.roots.get_mut(variable) {
            targets.clear();
        }
    }

    pub fn targets(&self, variable: &Variable) -> NodeSet {
        self.roots.get(variable).cloned().unwrap_or_default()
    }

    /// Targets excluding the null node
    pub fn non_null_targets(&self, variable: &Variable) -> NodeSet {
        let mut targets = self.targets(variable);
        targets.remove(&PtgId::null());
        targets
    }

    pub fn targets_of_field(&self, source: &PtgId, field: &FieldRef) -> NodeSet {
        self.edges
            .get(source)
            .and_then(|fields| fields.get(field))
            .cloned()
            .unwrap_or_default()
    }

    /// Union of `field` targets over every target of `variable`
    pub fn variable_field_targets(&self, variable: &Variable, field: &FieldRef) -> NodeSet {
        let mut result = NodeSet::new();
        for node in self.targets(variable) {
            result.extend(self.targets_of_field(&node, field));
        }
        result
    }

    /// Outgoing field edges of a node
    pub fn fields_of(&self, source: &PtgId) -> Vec<(&FieldRef, &NodeSet)> {
        self.edges
            .get(source)
            .map(|fields| fields.iter().collect())
            .unwrap_or_default()
    }

    /// Nodes of a given kind among the targets of `variable`
    pub fn targets_of_kind(&self, variable: &Variable, kind: NodeKind) -> Vec<&PtgNode> {
        self.targets(variable)
            .iter()
            .filter_map(|id| self.nodes.get(id))
            .filter(|n| n.kind == kind)
            .collect()
    }

    // ═══════════════════════════════════════════════════════════════════
    // Reachability and aliasing
    // ═══════════════════════════════════════════════════════════════════

    /// Closure over field edges. Edges for which `filter(source, field)`
    /// returns false are not followed.
    pub fn reachable_nodes<'a, I, F>(&self, roots: I, filter: Option<F>) -> NodeSet
    where
        I: IntoIterator<Item = &'a PtgId>,
        F: Fn(&PtgId, &FieldRef) -> bool,
    {
        let mut visited = NodeSet::new();
        let mut worklist: VecDeque<PtgId> = roots.into_iter().cloned().collect();

        while let Some(node) = worklist.pop_front() {
            if !visited.insert(node.clone()) {
                continue;
            }
            if node == PtgId::null() {
                continue;
            }
            let Some(fields) = self.edges.get(&node) else {
                continue;
            };
            for (field, targets) in fields {
                if let Some(f) = &filter {
                    if !f(&node, field) {
                        continue;
                    }
                }
                for target in targets {
                    if !visited.contains(target) {
                        worklist.push_back(target.clone());
                    }
                }
            }
        }
        visited
    }

    /// Variables sharing a non-null target with `variable` (itself included)
    pub fn aliases(&self, variable: &Variable) -> Vec<Variable> {
        let targets = self.non_null_targets(variable);
        let mut result = vec![variable.clone()];
        if targets.is_empty() {
            return result;
        }
        for (other, other_targets) in &self.roots {
            if other != variable && !other_targets.is_disjoint(&targets) {
                result.push(other.clone());
            }
        }
        result.sort();
        result
    }

    // ═══════════════════════════════════════════════════════════════════
    // Frames
    // ═══════════════════════════════════════════════════════════════════

    /// Push the current roots and start a callee frame. Each `(argument,
    /// parameter)` pair binds the parameter to the argument targets.
    pub fn new_frame(&mut self, binding: &[(Variable, Variable)]) {
        let old = std::mem::take(&mut self.roots);
        for (argument, parameter) in binding {
            if let Some(targets) = old.get(argument) {
                self.roots
                    .entry(parameter.clone())
                    .or_default()
                    .extend(targets.iter().cloned());
            }
        }
        self.frames.push(old);
    }

    /// Pop a callee frame. With `Some((ret, dest))` the callee's `ret`
    /// targets are added to the caller's `dest` when `dest` is a reference.
    pub fn restore_frame(&mut self, returned: Option<(&Variable, &Variable)>) {
        let bound = returned.and_then(|(ret, dest)| {
            if dest.is_reference() {
                Some((dest.clone(), self.targets(ret)))
            } else {
                None
            }
        });

        if let Some(frame) = self.frames.pop() {
            self.roots = frame;
        }

        if let Some((dest, nodes)) = bound {
            self.points_to_all(&dest, nodes.iter());
        }
        self.clean_unreachable_nodes();
    }

    /// Drop nodes (and their outgoing edges) unreachable from the roots of
    /// the current frame and of every suspended frame
    pub fn clean_unreachable_nodes(&mut self) {
        let mut start: Vec<PtgId> = self.roots.values().flatten().cloned().collect();
        for frame in &self.frames {
            start.extend(frame.values().flatten().cloned());
        }
        start.push(PtgId::null());
        let reachable = self.reachable_nodes(start.iter(), None::<fn(&PtgId, &FieldRef) -> bool>);

        self.nodes.retain(|id, _| reachable.contains(id));
        self.edges.retain(|id, _| reachable.contains(id));
    }

    // ═══════════════════════════════════════════════════════════════════
    // Lattice
    // ═══════════════════════════════════════════════════════════════════

    pub fn less_equal(&self, other: &PointsToGraph) -> bool {
        let roots_le = self.roots.iter().all(|(v, targets)| {
            targets.is_empty()
                || other
                    .roots
                    .get(v)
                    .map_or(false, |o| targets.is_subset(o))
        });
        if !roots_le {
            return false;
        }
        if !self.nodes.keys().all(|id| other.nodes.contains_key(id)) {
            return false;
        }
        self.edges.iter().all(|(source, fields)| {
            fields.iter().all(|(field, targets)| {
                targets.is_empty()
                    || other
                        .edges
                        .get(source)
                        .and_then(|f| f.get(field))
                        .map_or(false, |o| targets.is_subset(o))
            })
        })
    }

    pub fn join(&self, other: &PointsToGraph) -> PointsToGraph {
        let mut result = self.clone();
        result.union_with(other);
        result
    }

    /// In-place union of nodes, roots and edges. Frames are assumed equal.
    pub fn union_with(&mut self, other: &PointsToGraph) {
        for (id, node) in &other.nodes {
            self.nodes.entry(id.clone()).or_insert_with(|| node.clone());
        }
        for (v, targets) in &other.roots {
            self.roots
                .entry(v.clone())
                .or_default()
                .extend(targets.iter().cloned());
        }
        for (source, fields) in &other.edges {
            let mine = self.edges.entry(source.clone()).or_default();
            for (field, targets) in fields {
                mine.entry(field.clone())
                    .or_default()
                    .extend(targets.iter().cloned());
            }
        }
        if self.frames.is_empty() && !other.frames.is_empty() {
            self.frames = other.frames.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::models::TypeRef;

    fn obj(name: &str) -> Variable {
        Variable::local(name, TypeRef::class("Demo", "Item"))
    }

    fn site(offset: i64) -> PtgNode {
        PtgNode::object(PtgId::new("Demo.Run()", offset), Some(TypeRef::class("Demo", "Item")))
    }

    fn field(name: &str) -> FieldRef {
        FieldRef::new(name, TypeRef::class("Demo", "Item"), TypeRef::class("Demo", "Item"))
    }

    #[test]
    fn test_points_to_is_weak() {
        let mut g = PointsToGraph::new();
        let x = obj("x");
        let a = g.points_to_node(&x, site(1));
        let b = g.points_to_node(&x, site(2));
        let targets = g.targets(&x);
        assert!(targets.contains(&a) && targets.contains(&b));
    }

    #[test]
    fn test_field_replaces_null_only() {
        let mut g = PointsToGraph::new();
        let a = g.add_node(site(1));
        let b = g.add_node(site(2));
        let f = field("next");
        g.points_to_field(&a, &f, &PtgId::null());
        g.points_to_field(&a, &f, &b);
        assert_eq!(g.targets_of_field(&a, &f), [b].into_iter().collect());
    }

    #[test]
    fn test_aliases() {
        let mut g = PointsToGraph::new();
        let (x, y, z) = (obj("x"), obj("y"), obj("z"));
        let a = g.points_to_node(&x, site(1));
        g.points_to(&y, &a);
        g.points_to(&z, &PtgId::null());
        let aliases = g.aliases(&x);
        assert!(aliases.contains(&y));
        assert!(!aliases.contains(&z));
    }

    #[test]
    fn test_reachability_with_filter() {
        let mut g = PointsToGraph::new();
        let a = g.add_node(site(1));
        let b = g.add_node(site(2));
        let c = g.add_node(site(3));
        g.points_to_field(&a, &field("public"), &b);
        g.points_to_field(&a, &field("private"), &c);

        let all = g.reachable_nodes([a.clone()].iter(), None::<fn(&PtgId, &FieldRef) -> bool>);
        assert_eq!(all.len(), 3);

        let filtered = g.reachable_nodes([a.clone()].iter(), Some(|_: &PtgId, f: &FieldRef| f.name != "private"));
        assert!(filtered.contains(&b));
        assert!(!filtered.contains(&c));
    }

    #[test]
    fn test_frames_bind_and_restore() {
        let mut g = PointsToGraph::new();
        let arg = obj("arg");
        let param = obj("p");
        let ret = Variable::return_value("Callee");
        let dest = obj("dest");
        let a = g.points_to_node(&arg, site(1));

        g.new_frame(&[(arg.clone(), param.clone())]);
        assert!(!g.contains_variable(&arg));
        assert_eq!(g.targets(&param), [a.clone()].into_iter().collect());

        let fresh = g.points_to_node(&ret, site(9));
        let leaked = g.points_to_node(&obj("local"), site(10));
        let before = g.node_count();
        g.restore_frame(Some((&ret, &dest)));
        assert!(g.node_count() < before);

        assert!(g.targets(&dest).contains(&fresh));
        assert!(g.targets(&arg).contains(&a));
        assert!(!g.contains_variable(&param));
        assert!(!g.contains_node(&leaked));
    }

    #[test]
    fn test_join_and_order() {
        let mut left = PointsToGraph::new();
        let mut right = PointsToGraph::new();
        let x = obj("x");
        left.points_to_node(&x, site(1));
        right.points_to_node(&x, site(2));
        let joined = left.join(&right);
        assert!(left.less_equal(&joined));
        assert!(right.less_equal(&joined));
        assert!(!joined.less_equal(&left));
        assert_eq!(joined.join(&joined), joined);
    }
}
