//! Three-address instructions
//!
//! A tagged-variant instruction set. Every analysis (points-to, range,
//! dependency) dispatches on [`InstructionKind`] with a single `match`.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::method::{FieldRef, MethodRef};
use super::types::TypeRef;
use super::variable::Variable;

/// Literal values
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Constant {
    Null,
    Bool(bool),
    Int(i64),
    Str(String),
    /// Non-integral numeric literal kept in textual form
    Float(String),
}

impl Constant {
    pub fn is_null(&self) -> bool {
        matches!(self, Constant::Null)
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Constant::Int(v) => Some(*v),
            Constant::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Constant::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Null => write!(f, "null"),
            Constant::Bool(b) => write!(f, "{}", b),
            Constant::Int(v) => write!(f, "{}", v),
            Constant::Str(s) => write!(f, "{}", s),
            Constant::Float(s) => write!(f, "{}", s),
        }
    }
}

/// Right-hand side of a load
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operand {
    Constant { value: Constant, ty: TypeRef },
    Variable(Variable),
    InstanceField { instance: Variable, field: FieldRef },
    StaticField(FieldRef),
    ArrayElement { array: Variable, element_type: TypeRef },
    /// Address-of (`&x`, `&o.f`)
    Reference(Box<Operand>),
    /// Indirection through a pointer variable (`*p`)
    Dereference(Variable),
    /// Delegate target with a receiver
    VirtualMethod { instance: Variable, method: MethodRef },
    /// Delegate target without a receiver
    StaticMethod(MethodRef),
    /// Operand shape the front end could not express
    Unsupported(String),
}

impl Operand {
    pub fn int(value: i64) -> Self {
        Operand::Constant {
            value: Constant::Int(value),
            ty: TypeRef::int32(),
        }
    }

    pub fn string(value: impl Into<String>) -> Self {
        Operand::Constant {
            value: Constant::Str(value.into()),
            ty: TypeRef::string(),
        }
    }

    pub fn null() -> Self {
        Operand::Constant {
            value: Constant::Null,
            ty: TypeRef::object(),
        }
    }

    pub fn var(variable: &Variable) -> Self {
        Operand::Variable(variable.clone())
    }

    pub fn field(instance: &Variable, field: FieldRef) -> Self {
        Operand::InstanceField {
            instance: instance.clone(),
            field,
        }
    }

    /// Variables read to evaluate this operand
    pub fn used_variables(&self) -> Vec<&Variable> {
        match self {
            Operand::Variable(v) => vec![v],
            Operand::InstanceField { instance, .. } => vec![instance],
            Operand::ArrayElement { array, .. } => vec![array],
            Operand::Reference(inner) => inner.used_variables(),
            Operand::Dereference(v) => vec![v],
            Operand::VirtualMethod { instance, .. } => vec![instance],
            Operand::Constant { .. }
            | Operand::StaticField(_)
            | Operand::StaticMethod(_)
            | Operand::Unsupported(_) => Vec::new(),
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Constant { value: Constant::Str(s), .. } => write!(f, "\"{}\"", s),
            Operand::Constant { value, .. } => write!(f, "{}", value),
            Operand::Variable(v) => write!(f, "{}", v),
            Operand::InstanceField { instance, field } => write!(f, "{}.{}", instance, field),
            Operand::StaticField(field) => write!(f, "{}::{}", field.containing_type.display_name(), field),
            Operand::ArrayElement { array, .. } => write!(f, "{}[]", array),
            Operand::Reference(inner) => write!(f, "&{}", inner),
            Operand::Dereference(v) => write!(f, "*{}", v),
            Operand::VirtualMethod { instance, method } => write!(f, "&{}.{}", instance, method.name),
            Operand::StaticMethod(method) => write!(f, "&{}", method.name),
            Operand::Unsupported(text) => write!(f, "<{}>", text),
        }
    }
}

/// Left-hand side of a store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Place {
    InstanceField { instance: Variable, field: FieldRef },
    StaticField(FieldRef),
    ArrayElement { array: Variable, element_type: TypeRef },
    Dereference(Variable),
}

impl Place {
    pub fn used_variables(&self) -> Vec<&Variable> {
        match self {
            Place::InstanceField { instance, .. } => vec![instance],
            Place::ArrayElement { array, .. } => vec![array],
            Place::Dereference(v) => vec![v],
            Place::StaticField(_) => Vec::new(),
        }
    }
}

impl fmt::Display for Place {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Place::InstanceField { instance, field } => write!(f, "{}.{}", instance, field),
            Place::StaticField(field) => write!(f, "{}::{}", field.containing_type.display_name(), field),
            Place::ArrayElement { array, .. } => write!(f, "{}[]", array),
            Place::Dereference(v) => write!(f, "*{}", v),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    And,
    Or,
    Xor,
    Shl,
    Shr,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::And => "&",
            BinaryOp::Or => "|",
            BinaryOp::Xor => "^",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstructionKind {
    Load {
        result: Variable,
        operand: Operand,
    },
    Store {
        target: Place,
        value: Variable,
    },
    Binary {
        result: Variable,
        op: BinaryOp,
        left: Variable,
        right: Variable,
    },
    Convert {
        result: Variable,
        operand: Variable,
        target_type: TypeRef,
    },
    /// Conditional (operands non-empty) or unconditional branch
    Branch {
        operands: Vec<Variable>,
    },
    Return {
        operand: Option<Variable>,
    },
    /// Direct or virtual call; instance calls pass the receiver first
    Call {
        result: Option<Variable>,
        method: MethodRef,
        arguments: Vec<Variable>,
    },
    /// Call through a function pointer
    IndirectCall {
        result: Option<Variable>,
        pointer: Variable,
        arguments: Vec<Variable>,
    },
    Phi {
        result: Variable,
        arguments: Vec<Variable>,
    },
    CreateObject {
        result: Variable,
        allocation_type: TypeRef,
    },
    CreateArray {
        result: Variable,
        element_type: TypeRef,
        sizes: Vec<Variable>,
    },
    /// In-place initialization of a value type through its address
    InitializeObject {
        target: Variable,
    },
    /// Any other defining instruction (unary ops, sizeof, ...)
    Other {
        name: String,
        defined: Vec<Variable>,
        used: Vec<Variable>,
    },
    Nop,
}

/// Instruction with its bytecode offset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    pub offset: u32,
    pub kind: InstructionKind,
}

impl Instruction {
    pub fn new(offset: u32, kind: InstructionKind) -> Self {
        Self { offset, kind }
    }

    pub fn load(offset: u32, result: &Variable, operand: Operand) -> Self {
        Self::new(
            offset,
            InstructionKind::Load {
                result: result.clone(),
                operand,
            },
        )
    }

    pub fn store(offset: u32, target: Place, value: &Variable) -> Self {
        Self::new(
            offset,
            InstructionKind::Store {
                target,
                value: value.clone(),
            },
        )
    }

    pub fn store_field(offset: u32, instance: &Variable, field: FieldRef, value: &Variable) -> Self {
        Self::store(
            offset,
            Place::InstanceField {
                instance: instance.clone(),
                field,
            },
            value,
        )
    }

    pub fn binary(offset: u32, result: &Variable, op: BinaryOp, left: &Variable, right: &Variable) -> Self {
        Self::new(
            offset,
            InstructionKind::Binary {
                result: result.clone(),
                op,
                left: left.clone(),
                right: right.clone(),
            },
        )
    }

    pub fn convert(offset: u32, result: &Variable, operand: &Variable, target_type: TypeRef) -> Self {
        Self::new(
            offset,
            InstructionKind::Convert {
                result: result.clone(),
                operand: operand.clone(),
                target_type,
            },
        )
    }

    pub fn branch(offset: u32, operands: &[&Variable]) -> Self {
        Self::new(
            offset,
            InstructionKind::Branch {
                operands: operands.iter().map(|v| (*v).clone()).collect(),
            },
        )
    }

    pub fn ret(offset: u32, operand: Option<&Variable>) -> Self {
        Self::new(
            offset,
            InstructionKind::Return {
                operand: operand.cloned(),
            },
        )
    }

    pub fn call(offset: u32, result: Option<&Variable>, method: MethodRef, arguments: &[&Variable]) -> Self {
        Self::new(
            offset,
            InstructionKind::Call {
                result: result.cloned(),
                method,
                arguments: arguments.iter().map(|v| (*v).clone()).collect(),
            },
        )
    }

    pub fn phi(offset: u32, result: &Variable, arguments: &[&Variable]) -> Self {
        Self::new(
            offset,
            InstructionKind::Phi {
                result: result.clone(),
                arguments: arguments.iter().map(|v| (*v).clone()).collect(),
            },
        )
    }

    pub fn create_object(offset: u32, result: &Variable, allocation_type: TypeRef) -> Self {
        Self::new(
            offset,
            InstructionKind::CreateObject {
                result: result.clone(),
                allocation_type,
            },
        )
    }

    /// Variables written by this instruction
    pub fn defined_variables(&self) -> Vec<&Variable> {
        match &self.kind {
            InstructionKind::Load { result, .. }
            | InstructionKind::Binary { result, .. }
            | InstructionKind::Convert { result, .. }
            | InstructionKind::Phi { result, .. }
            | InstructionKind::CreateObject { result, .. }
            | InstructionKind::CreateArray { result, .. } => vec![result],
            InstructionKind::Call { result, .. } | InstructionKind::IndirectCall { result, .. } => {
                result.iter().collect()
            }
            InstructionKind::InitializeObject { target } => vec![target],
            InstructionKind::Other { defined, .. } => defined.iter().collect(),
            InstructionKind::Store { .. }
            | InstructionKind::Branch { .. }
            | InstructionKind::Return { .. }
            | InstructionKind::Nop => Vec::new(),
        }
    }

    /// Variables read by this instruction
    pub fn used_variables(&self) -> Vec<&Variable> {
        match &self.kind {
            InstructionKind::Load { operand, .. } => operand.used_variables(),
            InstructionKind::Store { target, value } => {
                let mut used = target.used_variables();
                used.push(value);
                used
            }
            InstructionKind::Binary { left, right, .. } => vec![left, right],
            InstructionKind::Convert { operand, .. } => vec![operand],
            InstructionKind::Branch { operands } => operands.iter().collect(),
            InstructionKind::Return { operand } => operand.iter().collect(),
            InstructionKind::Call { arguments, .. } => arguments.iter().collect(),
            InstructionKind::IndirectCall { pointer, arguments, .. } => {
                let mut used = vec![pointer];
                used.extend(arguments.iter());
                used
            }
            InstructionKind::Phi { arguments, .. } => arguments.iter().collect(),
            InstructionKind::CreateArray { sizes, .. } => sizes.iter().collect(),
            InstructionKind::Other { used, .. } => used.iter().collect(),
            InstructionKind::CreateObject { .. }
            | InstructionKind::InitializeObject { .. }
            | InstructionKind::Nop => Vec::new(),
        }
    }
}

fn join_vars(vars: &[Variable]) -> String {
    vars.iter().map(|v| v.name.as_str()).collect::<Vec<_>>().join(", ")
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L_{:04X}: ", self.offset)?;
        match &self.kind {
            InstructionKind::Load { result, operand } => write!(f, "{} = {}", result, operand),
            InstructionKind::Store { target, value } => write!(f, "{} = {}", target, value),
            InstructionKind::Binary { result, op, left, right } => {
                write!(f, "{} = {} {} {}", result, left, op.symbol(), right)
            }
            InstructionKind::Convert { result, operand, target_type } => {
                write!(f, "{} = ({}){}", result, target_type.display_name(), operand)
            }
            InstructionKind::Branch { operands } if operands.is_empty() => write!(f, "goto"),
            InstructionKind::Branch { operands } => write!(f, "if {} goto", join_vars(operands)),
            InstructionKind::Return { operand: Some(v) } => write!(f, "return {}", v),
            InstructionKind::Return { operand: None } => write!(f, "return"),
            InstructionKind::Call { result, method, arguments } => {
                if let Some(r) = result {
                    write!(f, "{} = ", r)?;
                }
                write!(
                    f,
                    "{}::{}({})",
                    method.containing_type.display_name(),
                    method.name,
                    join_vars(arguments)
                )
            }
            InstructionKind::IndirectCall { result, pointer, arguments } => {
                if let Some(r) = result {
                    write!(f, "{} = ", r)?;
                }
                write!(f, "(*{})({})", pointer, join_vars(arguments))
            }
            InstructionKind::Phi { result, arguments } => {
                write!(f, "{} = phi({})", result, join_vars(arguments))
            }
            InstructionKind::CreateObject { result, allocation_type } => {
                write!(f, "{} = new {}", result, allocation_type.display_name())
            }
            InstructionKind::CreateArray { result, element_type, .. } => {
                write!(f, "{} = new {}[]", result, element_type.display_name())
            }
            InstructionKind::InitializeObject { target } => write!(f, "initobj {}", target),
            InstructionKind::Other { name, defined, used } => {
                write!(f, "{} = {}({})", join_vars(defined), name, join_vars(used))
            }
            InstructionKind::Nop => write!(f, "nop"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_uses_instance_and_value() {
        let this = Variable::this(TypeRef::class("Demo", "Closure"));
        let value = Variable::local("v", TypeRef::int32());
        let field = FieldRef::new("count", TypeRef::int32(), TypeRef::class("Demo", "Closure"));
        let store = Instruction::store_field(4, &this, field, &value);

        let used: Vec<&str> = store.used_variables().iter().map(|v| v.name.as_str()).collect();
        assert_eq!(used, vec!["this", "v"]);
        assert!(store.defined_variables().is_empty());
    }

    #[test]
    fn test_call_display() {
        let row = Variable::local("row", TypeRef::class("ScopeRuntime", "Row"));
        let col = Variable::local("col", TypeRef::string());
        let result = Variable::local("cd", TypeRef::class("ScopeRuntime", "ColumnData"));
        let method = MethodRef::new(TypeRef::class("ScopeRuntime", "Row"), "get_Item", TypeRef::object());
        let call = Instruction::call(0x12, Some(&result), method, &[&row, &col]);
        assert_eq!(call.to_string(), "L_0012: cd = Row::get_Item(row, col)");
    }

    #[test]
    fn test_convert_defines_result() {
        let value = Variable::local("v", TypeRef::object());
        let text = Variable::local("s", TypeRef::string());
        let convert = Instruction::convert(2, &text, &value, TypeRef::string());
        assert_eq!(convert.defined_variables(), vec![&text]);
        assert_eq!(convert.used_variables(), vec![&value]);
    }

    #[test]
    fn test_constant_accessors() {
        assert_eq!(Constant::Int(3).as_int(), Some(3));
        assert_eq!(Constant::Str("a".into()).as_str(), Some("a"));
        assert!(Constant::Null.is_null());
    }
}
