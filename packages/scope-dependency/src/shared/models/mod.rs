//! Shared IR model consumed by every analysis

pub mod cfg;
pub mod instruction;
pub mod method;
pub mod types;
pub mod variable;

pub use cfg::{Cfg, CfgNode, CfgNodeKind, NodeId};
pub use instruction::{BinaryOp, Constant, Instruction, InstructionKind, Operand, Place};
pub use method::{FieldRef, MethodBody, MethodRef};
pub use types::{TypeKind, TypeRef};
pub use variable::Variable;
