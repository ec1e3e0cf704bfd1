//! Heap nodes standing for the processor's input and output tables

use std::collections::BTreeMap;

use super::traceable::TableKind;
use crate::features::points_to::PtgId;

/// Points-to nodes of the `RowSet` (input) and `Row` (output) objects the
/// processor was handed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProtectedNodes {
    nodes: BTreeMap<PtgId, TableKind>,
}

impl ProtectedNodes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, node: PtgId, kind: TableKind) {
        self.nodes.insert(node, kind);
    }

    pub fn contains(&self, node: &PtgId) -> bool {
        self.nodes.contains_key(node)
    }

    pub fn kind(&self, node: &PtgId) -> Option<TableKind> {
        self.nodes.get(node).copied()
    }

    pub fn ids(&self) -> impl Iterator<Item = &PtgId> {
        self.nodes.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PtgId, TableKind)> {
        self.nodes.iter().map(|(id, kind)| (id, *kind))
    }

    /// Number of nodes of the given table kind
    pub fn count(&self, kind: TableKind) -> usize {
        self.nodes.values().filter(|k| **k == kind).count()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl FromIterator<(PtgId, TableKind)> for ProtectedNodes {
    fn from_iter<I: IntoIterator<Item = (PtgId, TableKind)>>(iter: I) -> Self {
        Self {
            nodes: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_per_kind() {
        let nodes: ProtectedNodes = [
            (PtgId::new("Entry", -2), TableKind::Input),
            (PtgId::new("Entry", -3), TableKind::Output),
        ]
        .into_iter()
        .collect();

        assert_eq!(nodes.count(TableKind::Input), 1);
        assert_eq!(nodes.count(TableKind::Output), 1);
        assert_eq!(nodes.kind(&PtgId::new("Entry", -3)), Some(TableKind::Output));
        assert!(!nodes.contains(&PtgId::null()));
    }
}
