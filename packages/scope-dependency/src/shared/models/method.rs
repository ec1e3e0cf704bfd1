//! Method and field references, method bodies

use serde::{Deserialize, Serialize};
use std::fmt;

use super::cfg::Cfg;
use super::types::TypeRef;
use super::variable::Variable;

pub const CONSTRUCTOR: &str = ".ctor";

/// Reference to a method, resolved or not
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MethodRef {
    pub containing_type: TypeRef,
    pub name: String,
    /// Declared parameter types, receiver excluded
    #[serde(default)]
    pub parameter_types: Vec<TypeRef>,
    pub return_type: TypeRef,
    #[serde(default)]
    pub is_static: bool,
    /// Purity annotation carried by the metadata, if any
    #[serde(default)]
    pub is_pure: bool,
}

impl MethodRef {
    pub fn new(containing_type: TypeRef, name: impl Into<String>, return_type: TypeRef) -> Self {
        Self {
            containing_type,
            name: name.into(),
            parameter_types: Vec::new(),
            return_type,
            is_static: false,
            is_pure: false,
        }
    }

    pub fn constructor(containing_type: TypeRef) -> Self {
        Self::new(containing_type, CONSTRUCTOR, TypeRef::void())
    }

    /// Builder: set declared parameter types
    pub fn with_params(mut self, params: Vec<TypeRef>) -> Self {
        self.parameter_types = params;
        self
    }

    /// Builder: mark static
    pub fn as_static(mut self) -> Self {
        self.is_static = true;
        self
    }

    /// Builder: mark pure
    pub fn as_pure(mut self) -> Self {
        self.is_pure = true;
        self
    }

    pub fn is_constructor(&self) -> bool {
        self.name == CONSTRUCTOR
    }

    pub fn is_getter(&self) -> bool {
        self.name.starts_with("get_")
    }

    pub fn is_setter(&self) -> bool {
        self.name.starts_with("set_")
    }

    pub fn has_result(&self) -> bool {
        self.return_type.kind != super::types::TypeKind::Void
    }

    /// Parameter types joined by commas
    pub fn argument_types(&self) -> String {
        self.parameter_types
            .iter()
            .map(|t| t.display_name())
            .collect::<Vec<_>>()
            .join(",")
    }

    /// `Type.Name(args)`
    pub fn signature(&self) -> String {
        format!(
            "{}.{}({})",
            self.containing_type.full_name(),
            self.name,
            self.argument_types()
        )
    }

    /// Same name and parameter list, any declaring type
    pub fn signature_matches(&self, other: &MethodRef) -> bool {
        self.name == other.name && self.parameter_types == other.parameter_types
    }

    /// Copy declared on another type
    pub fn declared_on(&self, ty: TypeRef) -> Self {
        let mut method = self.clone();
        method.containing_type = ty;
        method
    }
}

impl fmt::Display for MethodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.signature())
    }
}

/// Reference to an instance or static field
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldRef {
    pub name: String,
    pub ty: TypeRef,
    pub containing_type: TypeRef,
    #[serde(default)]
    pub is_static: bool,
}

impl FieldRef {
    pub fn new(name: impl Into<String>, ty: TypeRef, containing_type: TypeRef) -> Self {
        Self {
            name: name.into(),
            ty,
            containing_type,
            is_static: false,
        }
    }

    pub fn static_field(name: impl Into<String>, ty: TypeRef, containing_type: TypeRef) -> Self {
        Self {
            is_static: true,
            ..Self::new(name, ty, containing_type)
        }
    }

    /// Synthetic field modelling array elements
    pub fn array_element(element_type: TypeRef, containing_type: TypeRef) -> Self {
        Self::new("[]", element_type, containing_type)
    }

    /// Synthetic object-typed field (`$item`, `$collection`, `escape`, ...)
    pub fn synthetic(name: impl Into<String>, containing_type: TypeRef) -> Self {
        Self::new(name, TypeRef::object(), containing_type)
    }

    pub fn is_reference(&self) -> bool {
        self.ty.is_class_or_struct()
    }
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Analyzable body of a resolved method
#[derive(Debug, Clone)]
pub struct MethodBody {
    pub method: MethodRef,
    /// Declared parameters; instance methods start with `this`
    pub parameters: Vec<Variable>,
    pub cfg: Cfg,
}

impl MethodBody {
    pub fn new(method: MethodRef, parameters: Vec<Variable>, cfg: Cfg) -> Self {
        Self {
            method,
            parameters,
            cfg,
        }
    }

    pub fn has_instructions(&self) -> bool {
        self.cfg.instruction_count() > 0
    }

    pub fn this_parameter(&self) -> Option<&Variable> {
        self.parameters.iter().find(|p| p.is_this())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_format() {
        let method = MethodRef::new(TypeRef::class("ScopeRuntime", "Row"), "get_Item", TypeRef::object())
            .with_params(vec![TypeRef::string()]);
        assert_eq!(method.signature(), "ScopeRuntime.Row.get_Item(String)");
        assert!(method.is_getter());
        assert!(!method.is_constructor());
    }

    #[test]
    fn test_signature_matches_across_types() {
        let base = MethodRef::new(TypeRef::class("Demo", "Base"), "Run", TypeRef::void());
        let derived = base.declared_on(TypeRef::class("Demo", "Derived"));
        assert!(base.signature_matches(&derived));
        assert_ne!(base, derived);
    }

    #[test]
    fn test_field_kinds() {
        let holder = TypeRef::class("Demo", "Holder");
        assert!(FieldRef::static_field("cache", TypeRef::string(), holder.clone()).is_static);

        let element = FieldRef::array_element(TypeRef::string(), TypeRef::array_of(TypeRef::string()));
        assert_eq!(element.name, "[]");
        assert_eq!(element.containing_type.name, "String[]");

        let hash = MethodRef::new(holder, "Hash", TypeRef::int32()).as_pure();
        assert!(hash.is_pure);
        assert!(hash.has_result());
    }
}
