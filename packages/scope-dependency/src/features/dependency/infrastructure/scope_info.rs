//! Side tables for schema and column resolution
//!
//! These maps are not part of the lattice. They remember which variables
//! hold a table's schema and which variables (or closure fields) hold a
//! column name, so `row[col]` can be resolved when `col` came from
//! `schema.IndexOf("name")` several instructions (or iterations) earlier.

use rustc_hash::FxHashMap;
use std::collections::BTreeSet;

use crate::features::dependency::domain::{Column, DependencyPtgDomain, TableKind, Traceable};
use crate::shared::models::{FieldRef, Variable};

#[derive(Debug, Clone, Default)]
pub struct ScopeInfo {
    schema_tables: FxHashMap<Variable, BTreeSet<TableKind>>,
    schema_fields: FxHashMap<FieldRef, Variable>,
    column_literals: FxHashMap<Variable, String>,
    column_fields: FxHashMap<FieldRef, String>,
}

fn table_tokens(state: &DependencyPtgDomain, variable: &Variable) -> BTreeSet<TableKind> {
    state
        .get_traceables(variable)
        .iter()
        .filter_map(|t| match t {
            Traceable::Table(kind) => Some(*kind),
            _ => None,
        })
        .collect()
}

impl ScopeInfo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fresh tables for a callee that still sees the caller's column fields
    pub fn for_callee(&self) -> Self {
        Self {
            column_fields: self.column_fields.clone(),
            ..Self::default()
        }
    }

    /// `result` now denotes the schema (or a clone) of the tables of `source`
    pub fn update_schema_map(&mut self, result: &Variable, source: &Variable, state: &DependencyPtgDomain) {
        let tables = table_tokens(state, source);
        self.schema_tables.insert(result.clone(), tables);
    }

    pub fn has_table_for_schema_var(&self, variable: &Variable) -> bool {
        self.schema_tables.contains_key(variable)
    }

    pub fn tables_for_schema_var(&self, variable: &Variable) -> Option<&BTreeSet<TableKind>> {
        self.schema_tables.get(variable)
    }

    pub fn update_column_literal(&mut self, result: &Variable, column: &Column) {
        if let Some(name) = column.name() {
            self.column_literals.insert(result.clone(), name.to_string());
        }
    }

    pub fn column_literal(&self, variable: &Variable) -> Option<&str> {
        self.column_literals.get(variable).map(String::as_str)
    }

    /// `result = instance.field`
    pub fn propagate_load(
        &mut self,
        result: &Variable,
        instance: &Variable,
        field: &FieldRef,
        state: &DependencyPtgDomain,
    ) {
        if let Some(literal) = self.column_fields.get(field).cloned() {
            self.column_literals.insert(result.clone(), literal);
        }
        if instance.is_this() {
            if let Some(tables) = self
                .schema_fields
                .get(field)
                .and_then(|source| self.schema_tables.get(source))
                .cloned()
            {
                self.schema_tables.insert(result.clone(), tables);
            }
        }
        if state.has_traceables(result) {
            self.schema_tables.insert(result.clone(), table_tokens(state, result));
        }
    }

    /// `instance.field = value`
    pub fn propagate_store(&mut self, value: &Variable, field: &FieldRef) {
        if let Some(literal) = self.column_literals.get(value).cloned() {
            self.column_fields.insert(field.clone(), literal);
        }
        if self.schema_tables.contains_key(value) {
            self.schema_fields.insert(field.clone(), value.clone());
        }
    }

    pub fn propagate_copy(&mut self, source: &Variable, destination: &Variable) {
        if let Some(literal) = self.column_literals.get(source).cloned() {
            self.column_literals.insert(destination.clone(), literal);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::dependency::domain::TraceableSet;
    use crate::shared::models::TypeRef;

    fn closure() -> TypeRef {
        TypeRef::class("Demo", "<Process>d__0").compiler_generated()
    }

    #[test]
    fn test_column_literal_survives_field_round_trip() {
        let mut info = ScopeInfo::new();
        let state = DependencyPtgDomain::default();
        let index = Variable::local("idx", TypeRef::int32());
        let loaded = Variable::local("idx2", TypeRef::int32());
        let this = Variable::this(closure());
        let field = FieldRef::new("<>7__idx", TypeRef::int32(), closure());

        info.update_column_literal(&index, &Column::named("name"));
        info.propagate_store(&index, &field);
        info.propagate_load(&loaded, &this, &field, &state);
        assert_eq!(info.column_literal(&loaded), Some("name"));

        let copied = Variable::local("idx3", TypeRef::int32());
        info.propagate_copy(&loaded, &copied);
        assert_eq!(info.column_literal(&copied), Some("name"));
    }

    #[test]
    fn test_schema_tables_follow_traceables() {
        let mut info = ScopeInfo::new();
        let mut state = DependencyPtgDomain::default();
        let row = Variable::local("row", TypeRef::int32());
        let schema = Variable::local("schema", TypeRef::int32());
        let tokens: TraceableSet = [Traceable::Table(TableKind::Input)].into_iter().collect();
        state.assign_traceables(&row, tokens);

        info.update_schema_map(&schema, &row, &state);
        assert!(info.has_table_for_schema_var(&schema));
        assert!(info.tables_for_schema_var(&schema).map_or(false, |t| t.contains(&TableKind::Input)));

        let callee = info.for_callee();
        assert!(!callee.has_table_for_schema_var(&schema));
    }
}
