//! Type references
//!
//! Lightweight, structurally compared type identities. The analysis never
//! needs a full type system: it needs names (for method classification),
//! the reference/value split (for the points-to graph) and nesting (for the
//! closure field-visibility rules).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse classification of a type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeKind {
    Class,
    Interface,
    Struct,
    Enum,
    /// Numeric, boolean and char primitives
    Primitive,
    String,
    Delegate,
    Array,
    Void,
}

/// Reference to a (possibly generic, possibly nested) type
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeRef {
    pub namespace: String,
    pub name: String,
    pub kind: TypeKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub generic_args: Vec<TypeRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assembly: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub containing_type: Option<Box<TypeRef>>,
    #[serde(default)]
    pub compiler_generated: bool,
}

impl TypeRef {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>, kind: TypeKind) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            kind,
            generic_args: Vec::new(),
            assembly: None,
            containing_type: None,
            compiler_generated: false,
        }
    }

    pub fn class(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(namespace, name, TypeKind::Class)
    }

    pub fn interface(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(namespace, name, TypeKind::Interface)
    }

    pub fn value(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(namespace, name, TypeKind::Struct)
    }

    pub fn delegate(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(namespace, name, TypeKind::Delegate)
    }

    pub fn primitive(name: impl Into<String>) -> Self {
        Self::new("System", name, TypeKind::Primitive).in_assembly("mscorlib")
    }

    pub fn int32() -> Self {
        Self::primitive("Int32")
    }

    pub fn boolean() -> Self {
        Self::primitive("Boolean")
    }

    pub fn string() -> Self {
        Self::new("System", "String", TypeKind::String).in_assembly("mscorlib")
    }

    pub fn object() -> Self {
        Self::class("System", "Object").in_assembly("mscorlib")
    }

    pub fn void() -> Self {
        Self::new("System", "Void", TypeKind::Void).in_assembly("mscorlib")
    }

    pub fn array_of(element: TypeRef) -> Self {
        let mut array = Self::new(element.namespace.clone(), format!("{}[]", element.name), TypeKind::Array);
        array.generic_args.push(element);
        array
    }

    /// Builder: set generic arguments
    pub fn with_generic_args(mut self, args: Vec<TypeRef>) -> Self {
        self.generic_args = args;
        self
    }

    /// Builder: set defining assembly
    pub fn in_assembly(mut self, assembly: impl Into<String>) -> Self {
        self.assembly = Some(assembly.into());
        self
    }

    /// Builder: nest inside another type
    pub fn nested_in(mut self, outer: TypeRef) -> Self {
        self.namespace = outer.namespace.clone();
        self.containing_type = Some(Box::new(outer));
        self
    }

    /// Builder: mark as compiler generated (closures, iterator state machines)
    pub fn compiler_generated(mut self) -> Self {
        self.compiler_generated = true;
        self
    }

    /// Simple name including generic arguments, e.g. `IEnumerable<Row>`
    pub fn display_name(&self) -> String {
        if self.generic_args.is_empty() || self.kind == TypeKind::Array {
            return self.name.clone();
        }
        let args: Vec<String> = self.generic_args.iter().map(|a| a.display_name()).collect();
        format!("{}<{}>", self.name, args.join(","))
    }

    /// Namespace-qualified name including enclosing types
    pub fn full_name(&self) -> String {
        let prefix = match &self.containing_type {
            Some(outer) => outer.full_name(),
            None => self.namespace.clone(),
        };
        if prefix.is_empty() {
            self.display_name()
        } else {
            format!("{}.{}", prefix, self.display_name())
        }
    }

    /// Types that get nodes in the points-to graph
    pub fn is_class_or_struct(&self) -> bool {
        !matches!(self.kind, TypeKind::Primitive | TypeKind::Void | TypeKind::Enum)
    }

    pub fn is_value_type(&self) -> bool {
        matches!(self.kind, TypeKind::Struct | TypeKind::Enum | TypeKind::Primitive)
    }

    pub fn is_delegate(&self) -> bool {
        self.kind == TypeKind::Delegate
    }

    pub fn is_string(&self) -> bool {
        self.kind == TypeKind::String
    }

    pub fn is_primitive(&self) -> bool {
        self.kind == TypeKind::Primitive
    }

    /// Scalars and strings carry literal ranges
    pub fn is_scalar_or_string(&self) -> bool {
        matches!(self.kind, TypeKind::Primitive | TypeKind::Enum | TypeKind::String)
    }

    /// Tuples and `KeyValuePair`s are treated as pure value containers
    pub fn is_tuple(&self) -> bool {
        self.name.starts_with("Tuple") || self.name.starts_with("ValueTuple") || self.name == "KeyValuePair"
    }

    pub fn is_assembly(&self, assembly: &str) -> bool {
        self.assembly.as_deref() == Some(assembly)
    }

    /// Outer type for nested types
    pub fn outer(&self) -> Option<&TypeRef> {
        self.containing_type.as_deref()
    }

    /// Same definition ignoring generic instantiation
    pub fn same_definition(&self, other: &TypeRef) -> bool {
        self.namespace == other.namespace
            && self.name == other.name
            && self.containing_type == other.containing_type
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.full_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name_with_generics() {
        let row = TypeRef::class("ScopeRuntime", "Row");
        let enumerable = TypeRef::interface("System.Collections.Generic", "IEnumerable")
            .with_generic_args(vec![row]);
        assert_eq!(enumerable.display_name(), "IEnumerable<Row>");
        assert_eq!(enumerable.full_name(), "System.Collections.Generic.IEnumerable<Row>");
    }

    #[test]
    fn test_nested_full_name() {
        let outer = TypeRef::class("Demo", "Processor");
        let closure = TypeRef::class("", "<Process>d__0").nested_in(outer).compiler_generated();
        assert_eq!(closure.full_name(), "Demo.Processor.<Process>d__0");
        assert!(closure.compiler_generated);
    }

    #[test]
    fn test_reference_classification() {
        assert!(!TypeRef::int32().is_class_or_struct());
        assert!(TypeRef::string().is_class_or_struct());
        assert!(TypeRef::value("Demo", "Point").is_class_or_struct());
        assert!(TypeRef::int32().is_scalar_or_string());
        assert!(TypeRef::string().is_scalar_or_string());
        assert!(!TypeRef::object().is_scalar_or_string());
    }

    #[test]
    fn test_same_definition_ignores_instantiation() {
        let list = TypeRef::class("System.Collections.Generic", "List");
        let list_of_int = list.clone().with_generic_args(vec![TypeRef::int32()]);
        assert!(list.same_definition(&list_of_int));
        assert_ne!(list, list_of_int);
    }
}
