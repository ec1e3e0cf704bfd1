//! Variables of the three-address IR
//!
//! Identity is the variable name: the IR is SSA-like and names are unique
//! inside a method body. Call frames in the points-to graph keep callee
//! variables apart from caller variables.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use super::types::TypeRef;

/// Name of the receiver parameter of instance methods
pub const THIS: &str = "this";

/// Name of the synthetic variable that owns static state
pub const GLOBAL_VARIABLE: &str = "$Global";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ty: Option<TypeRef>,
    #[serde(default)]
    pub is_parameter: bool,
}

impl Variable {
    pub fn local(name: impl Into<String>, ty: TypeRef) -> Self {
        Self {
            name: name.into(),
            ty: Some(ty),
            is_parameter: false,
        }
    }

    pub fn parameter(name: impl Into<String>, ty: TypeRef) -> Self {
        Self {
            name: name.into(),
            ty: Some(ty),
            is_parameter: true,
        }
    }

    pub fn untyped(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty: None,
            is_parameter: false,
        }
    }

    /// The receiver of an instance method
    pub fn this(ty: TypeRef) -> Self {
        Self::parameter(THIS, ty)
    }

    /// Owner of every static field
    pub fn global() -> Self {
        Self::local(GLOBAL_VARIABLE, TypeRef::object())
    }

    /// Synthetic return variable of a method (`<method>_$RV`)
    pub fn return_value(method_name: &str) -> Self {
        Self::local(format!("{}_$RV", method_name), TypeRef::object())
    }

    pub fn is_this(&self) -> bool {
        self.name == THIS
    }

    /// Reference-typed variables have points-to targets. Untyped
    /// variables are treated as references.
    pub fn is_reference(&self) -> bool {
        self.ty.as_ref().map_or(true, |t| t.is_class_or_struct())
    }

    pub fn type_name(&self) -> String {
        self.ty
            .as_ref()
            .map(|t| t.display_name())
            .unwrap_or_else(|| "null".to_string())
    }

    /// Copy with another name and the same type
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty: self.ty.clone(),
            is_parameter: false,
        }
    }
}

impl PartialEq for Variable {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Variable {}

impl Hash for Variable {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl PartialOrd for Variable {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Variable {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name.cmp(&other.name)
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}
