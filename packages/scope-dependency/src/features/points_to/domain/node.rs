//! Abstract heap nodes
//!
//! A node stands for every object created at one site. Its identity is the
//! creation site `(method context, offset)`; parameters use negative
//! offsets. `slot` separates the several nodes a single call summary may
//! create at one offset.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::shared::models::{MethodRef, TypeRef, Variable};

/// Creation-site identity of a node
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PtgId {
    pub context: String,
    pub offset: i64,
    #[serde(default)]
    pub slot: u32,
}

impl PtgId {
    pub fn new(context: impl Into<String>, offset: i64) -> Self {
        Self {
            context: context.into(),
            offset,
            slot: 0,
        }
    }

    /// Builder: select a secondary slot at the same site
    pub fn with_slot(mut self, slot: u32) -> Self {
        self.slot = slot;
        self
    }

    /// Site `offset` inside `method`
    pub fn at(method: &MethodRef, offset: i64) -> Self {
        Self::new(method.signature(), offset)
    }

    pub fn null() -> Self {
        Self::new("$null", 0)
    }

    pub fn global() -> Self {
        Self::new("$global", 0)
    }
}

impl fmt::Display for PtgId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.slot == 0 {
            write!(f, "{}@{}", self.context, self.offset)
        } else {
            write!(f, "{}@{}#{}", self.context, self.offset, self.slot)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    Object,
    Parameter,
    /// Placeholder for an object loaded from a field nobody stored
    Unknown,
    Null,
    Delegate,
    Global,
    Json,
}

/// Target of a delegate node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegateTarget {
    pub method: MethodRef,
    pub instance: Option<Variable>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PtgNode {
    pub id: PtgId,
    pub kind: NodeKind,
    pub ty: Option<TypeRef>,
    /// Variable the node was created for, if any (parameter name, ...)
    pub origin: Option<String>,
    pub delegate: Option<DelegateTarget>,
}

impl PtgNode {
    pub fn new(id: PtgId, kind: NodeKind, ty: Option<TypeRef>) -> Self {
        Self {
            id,
            kind,
            ty,
            origin: None,
            delegate: None,
        }
    }

    pub fn object(id: PtgId, ty: Option<TypeRef>) -> Self {
        Self::new(id, NodeKind::Object, ty)
    }

    /// Node for a formal parameter. `this` is an object node.
    pub fn parameter(id: PtgId, name: &str, ty: TypeRef) -> Self {
        let kind = if name == crate::shared::models::variable::THIS {
            NodeKind::Object
        } else {
            NodeKind::Parameter
        };
        Self {
            id,
            kind,
            ty: Some(ty),
            origin: Some(name.to_string()),
            delegate: None,
        }
    }

    pub fn delegate(id: PtgId, method: MethodRef, instance: Option<Variable>) -> Self {
        Self {
            id,
            kind: NodeKind::Delegate,
            ty: None,
            origin: None,
            delegate: Some(DelegateTarget { method, instance }),
        }
    }

    pub fn null() -> Self {
        Self::new(PtgId::null(), NodeKind::Null, None)
    }

    pub fn global() -> Self {
        Self::new(PtgId::global(), NodeKind::Global, Some(TypeRef::object()))
    }

    pub fn is_null(&self) -> bool {
        self.kind == NodeKind::Null
    }

    pub fn is_parameter(&self) -> bool {
        self.origin.is_some() && self.id.offset < 0
    }
}

impl fmt::Display for PtgNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            NodeKind::Null => write!(f, "null"),
            NodeKind::Global => write!(f, "global"),
            _ => {
                let ty = self.ty.as_ref().map(|t| t.display_name()).unwrap_or_default();
                write!(f, "{:?}({}:{})", self.kind, self.id, ty)
            }
        }
    }
}
