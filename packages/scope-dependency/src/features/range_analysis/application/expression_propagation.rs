//! Expression propagation
//!
//! Binds each defined variable to its defining expression with previously
//! bound variables substituted, visiting blocks in forward order. Used to
//! recover literal column names, keys and positions at call sites.

use rustc_hash::FxHashMap;
use std::fmt;

use crate::shared::models::{BinaryOp, Cfg, Constant, FieldRef, Instruction, InstructionKind, MethodRef, Operand, Variable};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expression {
    Constant(Constant),
    Variable(Variable),
    Binary {
        op: BinaryOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Call {
        method: MethodRef,
        arguments: Vec<Expression>,
    },
    Field {
        instance: Option<Box<Expression>>,
        field: FieldRef,
    },
    Unknown,
}

impl Expression {
    /// Expression computed by a defining instruction
    pub fn from_instruction(instruction: &Instruction) -> Option<Expression> {
        let expr = match &instruction.kind {
            InstructionKind::Load { operand, .. } => match operand {
                Operand::Constant { value, .. } => Expression::Constant(value.clone()),
                Operand::Variable(v) => Expression::Variable(v.clone()),
                Operand::InstanceField { instance, field } => Expression::Field {
                    instance: Some(Box::new(Expression::Variable(instance.clone()))),
                    field: field.clone(),
                },
                Operand::StaticField(field) => Expression::Field {
                    instance: None,
                    field: field.clone(),
                },
                _ => Expression::Unknown,
            },
            InstructionKind::Binary { op, left, right, .. } => Expression::Binary {
                op: *op,
                left: Box::new(Expression::Variable(left.clone())),
                right: Box::new(Expression::Variable(right.clone())),
            },
            InstructionKind::Convert { operand, .. } => Expression::Variable(operand.clone()),
            InstructionKind::Call {
                result: Some(_),
                method,
                arguments,
            } => Expression::Call {
                method: method.clone(),
                arguments: arguments.iter().map(|a| Expression::Variable(a.clone())).collect(),
            },
            InstructionKind::Call { result: None, .. }
            | InstructionKind::Store { .. }
            | InstructionKind::Branch { .. }
            | InstructionKind::Return { .. }
            | InstructionKind::Nop => return None,
            _ => Expression::Unknown,
        };
        if instruction.defined_variables().is_empty() {
            None
        } else {
            Some(expr)
        }
    }

    /// Substitute bound variables
    pub fn replace_variables(&self, bindings: &FxHashMap<Variable, Expression>) -> Expression {
        match self {
            Expression::Variable(v) => bindings.get(v).cloned().unwrap_or_else(|| self.clone()),
            Expression::Binary { op, left, right } => Expression::Binary {
                op: *op,
                left: Box::new(left.replace_variables(bindings)),
                right: Box::new(right.replace_variables(bindings)),
            },
            Expression::Call { method, arguments } => Expression::Call {
                method: method.clone(),
                arguments: arguments.iter().map(|a| a.replace_variables(bindings)).collect(),
            },
            Expression::Field { instance, field } => Expression::Field {
                instance: instance.as_ref().map(|i| Box::new(i.replace_variables(bindings))),
                field: field.clone(),
            },
            Expression::Constant(_) | Expression::Unknown => self.clone(),
        }
    }

    pub fn as_constant(&self) -> Option<&Constant> {
        match self {
            Expression::Constant(c) => Some(c),
            _ => None,
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Constant(c) => write!(f, "{}", c),
            Expression::Variable(v) => write!(f, "{}", v),
            Expression::Binary { op, left, right } => write!(f, "({} {} {})", left, op.symbol(), right),
            Expression::Call { method, arguments } => {
                let args: Vec<String> = arguments.iter().map(|a| a.to_string()).collect();
                write!(f, "{}({})", method.name, args.join(", "))
            }
            Expression::Field { instance: Some(i), field } => write!(f, "{}.{}", i, field),
            Expression::Field { instance: None, field } => write!(f, "{}", field),
            Expression::Unknown => write!(f, "?"),
        }
    }
}

/// Variable → expression bindings of one method body
#[derive(Debug, Clone, Default)]
pub struct ExpressionMap {
    bindings: FxHashMap<Variable, Expression>,
}

impl ExpressionMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Visit the body in forward order binding every definition. A
    /// variable defined twice is bound to `Unknown`.
    pub fn propagate(cfg: &Cfg) -> Self {
        let mut map = Self::new();
        for id in cfg.forward_order() {
            let Some(node) = cfg.node(id) else {
                continue;
            };
            for instruction in &node.instructions {
                map.bind(instruction);
            }
        }
        map
    }

    fn bind(&mut self, instruction: &Instruction) {
        let Some(expr) = Expression::from_instruction(instruction) else {
            return;
        };
        let expr = expr.replace_variables(&self.bindings);
        for defined in instruction.defined_variables() {
            if self.bindings.contains_key(defined) {
                self.bindings.insert(defined.clone(), Expression::Unknown);
            } else {
                self.bindings.insert(defined.clone(), expr.clone());
            }
        }
    }

    /// Bound expression, or the variable itself when unbound
    pub fn value(&self, variable: &Variable) -> Expression {
        self.bindings
            .get(variable)
            .cloned()
            .unwrap_or_else(|| Expression::Variable(variable.clone()))
    }

    pub fn constant(&self, variable: &Variable) -> Option<&Constant> {
        self.bindings.get(variable).and_then(|e| e.as_constant())
    }

    pub fn string_constant(&self, variable: &Variable) -> Option<&str> {
        self.constant(variable).and_then(|c| c.as_str())
    }

    pub fn int_constant(&self, variable: &Variable) -> Option<i64> {
        self.constant(variable).and_then(|c| c.as_int())
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}
