//! `row.Schema`, `schema[i]` and `schema.IndexOf("name")`

use crate::features::dependency::application::visitor::{BlockVisitor, CallSite};
use crate::features::dependency::domain::{tables, Column, Schema, TableKind};
use crate::features::range_analysis::RangeValue;
use crate::shared::diagnostics::AnalysisReason;
use crate::shared::models::Variable;

const NO_TABLE: &str = "Table not available as traceable argument";

impl BlockVisitor<'_, '_> {
    pub(crate) fn handle_schema_call(&mut self, site: &CallSite<'_>) -> bool {
        let ty = site.declaring_type();
        let types = self.scope_types();
        let schema_getter = site.name() == "get_Schema"
            && types.is_scope_runtime(ty)
            && (types.is_row_type(ty) || types.is_row_set_type(ty));
        let column_lookup = types.is_schema_type(ty) && matches!(site.name(), "get_Item" | "IndexOf");

        if schema_getter {
            if let (Some(result), Some(table)) = (site.result, site.argument(0)) {
                self.analysis.scope_info.update_schema_map(result, table, &self.state);
            }
            return true;
        }
        if column_lookup {
            let schema = site.argument(0).and_then(|s| self.try_schema_for_table(site, s));
            self.update_column_data(site, schema.as_ref());
            return true;
        }
        false
    }

    /// Schema of the table behind `table`: a schema variable recorded by
    /// `get_Schema`, or the `Table` token of a row variable
    pub(crate) fn try_schema_for_table(&mut self, site: &CallSite<'_>, table: &Variable) -> Option<Schema> {
        let kind = if let Some(kinds) = self.analysis.scope_info.tables_for_schema_var(table) {
            kinds.iter().next().copied()
        } else if self.state.has_traceables(table) {
            tables(&self.state.get_traceables(table)).first().copied()
        } else {
            self.fail_or_retry(site.instruction, "Scope Table mapping not available. Could not get schema");
            return None;
        };

        let Some(kind) = kind else {
            self.set_top(site.instruction, NO_TABLE);
            return None;
        };
        let table = if kind == TableKind::Input { TableKind::Input } else { TableKind::Output };
        self.analysis.manager.schema(table).cloned()
    }

    /// Column denoted by the second argument; remembered as the literal of
    /// the call result
    pub(crate) fn update_column_data(&mut self, site: &CallSite<'_>, schema: Option<&Schema>) -> Column {
        let column = match (schema, site.argument(1)) {
            (Some(schema), Some(selector)) => self.obtain_column(selector, schema),
            _ => Column::Top,
        };
        if let Some(result) = site.result {
            self.analysis.scope_info.update_column_literal(result, &column);
        }
        if column.is_top() && !self.state.is_top() {
            let reason = AnalysisReason::new(self.method(), site.instruction, "Could not compute a value for the column");
            self.analysis.manager.record(reason);
        }
        column
    }

    /// Column selected by a name or index variable
    fn obtain_column(&self, selector: &Variable, schema: &Schema) -> Column {
        let by_name = |name: &str| schema.column_by_name(name).cloned().unwrap_or_else(|| Column::named(name));
        let by_range = |range: RangeValue| schema.column_by_range(&range).cloned().unwrap_or_else(|| Column::at(range));

        if selector.ty.as_ref().map_or(false, |t| t.is_string()) {
            if let Some(name) = self.analysis.equalities().and_then(|e| e.string_constant(selector)) {
                return by_name(name);
            }
            let range = self.analysis.range_at(self.node, selector);
            return match range.as_literal() {
                Some(name) if !range.is_top() => by_name(name),
                _ => Column::Top,
            };
        }

        if let Some(name) = self.analysis.scope_info.column_literal(selector) {
            return by_name(name);
        }
        let range = self.analysis.range_at(self.node, selector);
        if !range.is_bottom() {
            return by_range(range);
        }
        match self.analysis.equalities().and_then(|e| e.int_constant(selector)) {
            Some(index) => by_range(RangeValue::singleton(index)),
            None => Column::Top,
        }
    }
}
