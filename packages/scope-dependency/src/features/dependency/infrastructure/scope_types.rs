//! Classification of runtime and framework types
//!
//! Row types are recognised by name inside the runtime namespace, walking
//! the base-class chain through the [`ProgramRepository`] so user subclasses
//! of `Row`/`RowSet` classify like their bases. Collection and JSON types
//! are recognised by their well-known framework names.

use std::sync::Arc;

use crate::features::dependency::domain::TableKind;
use crate::shared::models::TypeRef;
use crate::shared::ports::ProgramRepository;

const MAX_BASE_CHAIN: usize = 64;

const COLLECTION_TYPES: &[&str] = &[
    "List",
    "IList",
    "ICollection",
    "Collection",
    "LinkedList",
    "Queue",
    "Stack",
    "ArrayList",
    "ReadOnlyCollection",
    "IReadOnlyList",
    "IReadOnlyCollection",
];
const DICTIONARY_TYPES: &[&str] = &[
    "Dictionary",
    "IDictionary",
    "SortedDictionary",
    "SortedList",
    "ConcurrentDictionary",
    "Hashtable",
    "IReadOnlyDictionary",
];
const SET_TYPES: &[&str] = &["HashSet", "ISet", "SortedSet"];

#[derive(Clone)]
pub struct ScopeTypes {
    namespace: String,
    program: Option<Arc<dyn ProgramRepository>>,
}

impl std::fmt::Debug for ScopeTypes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopeTypes")
            .field("namespace", &self.namespace)
            .field("program", &self.program.is_some())
            .finish()
    }
}

impl ScopeTypes {
    /// Classifier without hierarchy information: only exact names match
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            program: None,
        }
    }

    pub fn with_program(mut self, program: Arc<dyn ProgramRepository>) -> Self {
        self.program = Some(program);
        self
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Declared in the runtime namespace (or one of its children)
    pub fn is_scope_runtime(&self, ty: &TypeRef) -> bool {
        let ns = ty.namespace.as_str();
        ns == self.namespace
            || ns
                .strip_prefix(self.namespace.as_str())
                .map_or(false, |rest| rest.starts_with('.'))
    }

    fn is_runtime_type(&self, ty: &TypeRef, name: &str) -> bool {
        ty.name == name && self.is_scope_runtime(ty)
    }

    /// `ty` is the runtime type `name` or inherits from it
    fn derives_from(&self, ty: &TypeRef, name: &str) -> bool {
        let mut current = Some(ty.clone());
        let mut steps = 0;
        while let Some(t) = current {
            if self.is_runtime_type(&t, name) {
                return true;
            }
            steps += 1;
            if steps > MAX_BASE_CHAIN {
                return false;
            }
            current = self.program.as_ref().and_then(|p| p.base_type(&t));
        }
        false
    }

    // ═══════════════════════════════════════════════════════════════════
    // Row types
    // ═══════════════════════════════════════════════════════════════════

    pub fn is_row_type(&self, ty: &TypeRef) -> bool {
        self.derives_from(ty, "Row")
    }

    /// Exactly the runtime `Row`, not a generated subclass
    pub fn is_strict_row_type(&self, ty: &TypeRef) -> bool {
        self.is_runtime_type(ty, "Row")
    }

    pub fn is_row_set_type(&self, ty: &TypeRef) -> bool {
        self.derives_from(ty, "RowSet")
    }

    pub fn is_row_list_type(&self, ty: &TypeRef) -> bool {
        self.derives_from(ty, "RowList")
    }

    pub fn is_column_data_type(&self, ty: &TypeRef) -> bool {
        self.derives_from(ty, "ColumnData")
    }

    pub fn is_schema_type(&self, ty: &TypeRef) -> bool {
        self.is_runtime_type(ty, "Schema")
    }

    pub fn is_scope_map(&self, ty: &TypeRef) -> bool {
        self.is_runtime_type(ty, "ScopeMap")
    }

    pub fn is_scope_map_usage(&self, ty: &TypeRef) -> bool {
        self.is_runtime_type(ty, "ScopeMapUsage")
    }

    fn first_argument_is<F>(ty: &TypeRef, name: &str, test: F) -> bool
    where
        F: Fn(&TypeRef) -> bool,
    {
        ty.name == name && ty.generic_args.first().map_or(false, test)
    }

    pub fn is_ienumerable_row(&self, ty: &TypeRef) -> bool {
        Self::first_argument_is(ty, "IEnumerable", |a| self.is_row_type(a))
    }

    pub fn is_ienumerator_row(&self, ty: &TypeRef) -> bool {
        Self::first_argument_is(ty, "IEnumerator", |a| self.is_row_type(a))
    }

    pub fn is_ienumerable_scope_map_usage(&self, ty: &TypeRef) -> bool {
        Self::first_argument_is(ty, "IEnumerable", |a| self.is_scope_map_usage(a))
    }

    pub fn is_ienumerator_scope_map_usage(&self, ty: &TypeRef) -> bool {
        Self::first_argument_is(ty, "IEnumerator", |a| self.is_scope_map_usage(a))
    }

    /// Types whose objects are the protected input/output rows or lead
    /// straight to them
    pub fn is_scope_type(&self, ty: &TypeRef) -> bool {
        self.is_row_list_type(ty)
            || self.is_row_set_type(ty)
            || self.is_row_type(ty)
            || self.is_ienumerable_row(ty)
            || self.is_ienumerator_row(ty)
    }

    /// `Row` objects are the output, `RowSet` objects the input
    pub fn protected_kind(&self, ty: &TypeRef) -> TableKind {
        if self.is_row_set_type(ty) {
            TableKind::Input
        } else if self.is_row_type(ty) {
            TableKind::Output
        } else {
            TableKind::Unknown
        }
    }

    // ═══════════════════════════════════════════════════════════════════
    // Framework collections
    // ═══════════════════════════════════════════════════════════════════

    pub fn is_collection(&self, ty: &TypeRef) -> bool {
        ty.kind == crate::shared::models::TypeKind::Array || COLLECTION_TYPES.contains(&ty.name.as_str())
    }

    pub fn is_dictionary(&self, ty: &TypeRef) -> bool {
        DICTIONARY_TYPES.contains(&ty.name.as_str())
    }

    pub fn is_set(&self, ty: &TypeRef) -> bool {
        SET_TYPES.contains(&ty.name.as_str())
    }

    pub fn is_container(&self, ty: &TypeRef) -> bool {
        self.is_collection(ty) || self.is_dictionary(ty) || self.is_set(ty)
    }

    /// `System.Linq.Enumerable` and friends
    pub fn is_enumerable(&self, ty: &TypeRef) -> bool {
        ty.name == "Enumerable" || (ty.name.contains("Enumerable") && ty.namespace.starts_with("System.Linq"))
    }

    pub fn is_ienumerable(&self, ty: &TypeRef) -> bool {
        ty.name == "IEnumerable"
    }

    pub fn is_ienumerator(&self, ty: &TypeRef) -> bool {
        ty.name == "IEnumerator"
    }

    /// Concrete enumerators such as `List<T>.Enumerator`
    pub fn is_enumerator(&self, ty: &TypeRef) -> bool {
        ty.name == "Enumerator" || (ty.name.ends_with("Enumerator") && !self.is_ienumerator(ty))
    }

    // ═══════════════════════════════════════════════════════════════════
    // JSON
    // ═══════════════════════════════════════════════════════════════════

    pub fn is_json_convert(&self, ty: &TypeRef) -> bool {
        ty.full_name() == "Newtonsoft.Json.JsonConvert"
    }

    /// `JObject`, `JArray` or `JToken`
    pub fn is_json_linq(&self, ty: &TypeRef, name: &str) -> bool {
        ty.namespace == "Newtonsoft.Json.Linq" && ty.name == name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::ports::InMemoryProgram;

    fn runtime(name: &str) -> TypeRef {
        TypeRef::class("ScopeRuntime", name)
    }

    #[test]
    fn test_exact_runtime_names() {
        let types = ScopeTypes::new("ScopeRuntime");
        assert!(types.is_row_type(&runtime("Row")));
        assert!(types.is_strict_row_type(&runtime("Row")));
        assert!(types.is_row_set_type(&runtime("RowSet")));
        assert!(types.is_schema_type(&runtime("Schema")));
        assert!(!types.is_row_type(&TypeRef::class("Other", "Row")));
        assert_eq!(types.protected_kind(&runtime("Row")), TableKind::Output);
        assert_eq!(types.protected_kind(&runtime("RowSet")), TableKind::Input);
        assert_eq!(types.protected_kind(&runtime("Schema")), TableKind::Unknown);
    }

    #[test]
    fn test_subclass_through_repository() {
        let generated = TypeRef::class("Generated", "MyRow");
        let program = InMemoryProgram::new().with_base_type(&generated, runtime("Row"));
        let types = ScopeTypes::new("ScopeRuntime").with_program(Arc::new(program));

        assert!(types.is_row_type(&generated));
        assert!(!types.is_strict_row_type(&generated));
        assert!(types.is_scope_type(&generated));
        assert!(!ScopeTypes::new("ScopeRuntime").is_row_type(&generated));
    }

    #[test]
    fn test_generic_row_enumerables() {
        let types = ScopeTypes::new("ScopeRuntime");
        let enumerable = TypeRef::interface("System.Collections.Generic", "IEnumerable")
            .with_generic_args(vec![runtime("Row")]);
        let enumerator = TypeRef::interface("System.Collections.Generic", "IEnumerator")
            .with_generic_args(vec![runtime("Row")]);
        let strings = TypeRef::interface("System.Collections.Generic", "IEnumerable")
            .with_generic_args(vec![TypeRef::string()]);

        assert!(types.is_ienumerable_row(&enumerable));
        assert!(types.is_ienumerator_row(&enumerator));
        assert!(types.is_scope_type(&enumerator));
        assert!(!types.is_scope_type(&strings));
        assert!(types.is_ienumerable(&strings));
    }

    #[test]
    fn test_collections_and_json() {
        let types = ScopeTypes::new("ScopeRuntime");
        assert!(types.is_collection(&TypeRef::class("System.Collections.Generic", "List")));
        assert!(types.is_dictionary(&TypeRef::class("System.Collections.Generic", "Dictionary")));
        assert!(types.is_set(&TypeRef::class("System.Collections.Generic", "HashSet")));
        assert!(types.is_enumerator(&TypeRef::value("System.Collections.Generic", "Enumerator")));
        assert!(!types.is_enumerator(&TypeRef::interface("System.Collections", "IEnumerator")));
        assert!(types.is_enumerable(&TypeRef::class("System.Linq", "Enumerable")));
        assert!(types.is_json_convert(&TypeRef::class("Newtonsoft.Json", "JsonConvert")));
        assert!(types.is_json_linq(&TypeRef::class("Newtonsoft.Json.Linq", "JObject"), "JObject"));
    }
}
