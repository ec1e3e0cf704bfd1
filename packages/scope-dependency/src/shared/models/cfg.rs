/*
 * Control Flow Graph
 *
 * Basic blocks of three-address instructions with predecessor/successor
 * edges. Node 0 is the entry, node 1 the exit; both carry no instructions.
 */

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use super::instruction::Instruction;
use super::variable::Variable;

pub type NodeId = usize;

pub const ENTRY: NodeId = 0;
pub const EXIT: NodeId = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CfgNodeKind {
    Entry,
    Exit,
    Normal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CfgNode {
    pub id: NodeId,
    pub kind: CfgNodeKind,
    pub instructions: Vec<Instruction>,
    pub predecessors: Vec<NodeId>,
    pub successors: Vec<NodeId>,
}

impl CfgNode {
    fn new(id: NodeId, kind: CfgNodeKind) -> Self {
        Self {
            id,
            kind,
            instructions: Vec::new(),
            predecessors: Vec::new(),
            successors: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cfg {
    nodes: Vec<CfgNode>,
}

impl Default for Cfg {
    fn default() -> Self {
        Self::new()
    }
}

impl Cfg {
    /// Empty graph holding only the entry and exit nodes
    pub fn new() -> Self {
        Self {
            nodes: vec![
                CfgNode::new(ENTRY, CfgNodeKind::Entry),
                CfgNode::new(EXIT, CfgNodeKind::Exit),
            ],
        }
    }

    /// Single block between entry and exit
    pub fn linear(instructions: Vec<Instruction>) -> Self {
        let mut cfg = Self::new();
        let block = cfg.add_node(instructions);
        cfg.connect(ENTRY, block);
        cfg.connect(block, EXIT);
        cfg
    }

    pub fn entry(&self) -> NodeId {
        ENTRY
    }

    pub fn exit(&self) -> NodeId {
        EXIT
    }

    pub fn add_node(&mut self, instructions: Vec<Instruction>) -> NodeId {
        let id = self.nodes.len();
        let mut node = CfgNode::new(id, CfgNodeKind::Normal);
        node.instructions = instructions;
        self.nodes.push(node);
        id
    }

    /// Add an edge; duplicate edges are ignored
    pub fn connect(&mut self, from: NodeId, to: NodeId) {
        if from >= self.nodes.len() || to >= self.nodes.len() {
            return;
        }
        if self.nodes[from].successors.contains(&to) {
            return;
        }
        self.nodes[from].successors.push(to);
        self.nodes[to].predecessors.push(from);
    }

    pub fn node(&self, id: NodeId) -> Option<&CfgNode> {
        self.nodes.get(id)
    }

    pub fn nodes(&self) -> &[CfgNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instruction_count() == 0
    }

    pub fn instruction_count(&self) -> usize {
        self.nodes.iter().map(|n| n.instructions.len()).sum()
    }

    pub fn instructions(&self) -> impl Iterator<Item = &Instruction> {
        self.nodes.iter().flat_map(|n| n.instructions.iter())
    }

    /// Every variable defined or used in the body, sorted by name
    pub fn variables(&self) -> Vec<Variable> {
        let mut seen = FxHashSet::default();
        let mut vars = Vec::new();
        for instruction in self.instructions() {
            for v in instruction
                .defined_variables()
                .into_iter()
                .chain(instruction.used_variables())
            {
                if seen.insert(v.name.clone()) {
                    vars.push(v.clone());
                }
            }
        }
        vars.sort();
        vars
    }

    /// Reverse postorder from the entry; unreachable nodes are appended
    pub fn forward_order(&self) -> Vec<NodeId> {
        let mut visited = vec![false; self.nodes.len()];
        let mut postorder = Vec::with_capacity(self.nodes.len());
        // (node, next successor index)
        let mut stack: Vec<(NodeId, usize)> = vec![(ENTRY, 0)];
        visited[ENTRY] = true;

        while let Some((node, idx)) = stack.pop() {
            let successors = &self.nodes[node].successors;
            if idx < successors.len() {
                stack.push((node, idx + 1));
                let next = successors[idx];
                if !visited[next] {
                    visited[next] = true;
                    stack.push((next, 0));
                }
            } else {
                postorder.push(node);
            }
        }

        postorder.reverse();
        for (id, seen) in visited.iter().enumerate() {
            if !seen {
                postorder.push(id);
            }
        }
        postorder
    }

    /// First successor of the entry node
    pub fn first_block(&self) -> Option<NodeId> {
        self.nodes[ENTRY].successors.first().copied()
    }

    /// Copy with an exit → first block edge, modelling repeated `MoveNext` calls
    pub fn with_iteration_edge(&self) -> Self {
        let mut cfg = self.clone();
        if let Some(first) = cfg.first_block() {
            cfg.connect(EXIT, first);
        }
        cfg
    }
}
