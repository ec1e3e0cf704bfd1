//! Row, RowSet, RowList, ColumnData and ScopeMap methods of the runtime

use crate::features::dependency::application::copy_row;
use crate::features::dependency::application::visitor::{BlockVisitor, CallSite};
use crate::features::dependency::domain::{tables, Column, TableKind, Traceable, TraceableSet};
use crate::shared::models::Variable;

const UNKNOWN_TABLES: &str = "Could not determine the input or output table";

impl BlockVisitor<'_, '_> {
    pub(crate) fn handle_row_call(&mut self, site: &CallSite<'_>) -> bool {
        let ty = site.declaring_type().clone();
        let name = site.name().to_string();
        let (Some(receiver), result) = (site.argument(0), site.result) else {
            return false;
        };

        let types = self.scope_types();
        let row = types.is_row_type(&ty);
        let column_data = types.is_column_data_type(&ty);
        let getter = name.contains("get_") || name == "Get";

        if name == "Clone" && row {
            self.copy_through(site, receiver, result);
            if let Some(result) = result {
                self.analysis.scope_info.update_schema_map(result, receiver, &self.state);
            }
        } else if name == "get_Rows" && types.is_row_set_type(&ty) {
            let tokens = self.copy_through(site, receiver, result);
            if let Some(result) = result {
                self.analysis.scope_info.update_schema_map(result, receiver, &self.state);
            }
            self.check_failure(site, &tokens);
        } else if name == "GetEnumerator"
            && (types.is_ienumerable_row(&ty) || types.is_ienumerable_scope_map_usage(&ty))
        {
            let tokens = self.copy_through(site, receiver, result);
            self.check_failure(site, &tokens);
        } else if name == "get_Current"
            && (types.is_ienumerator_row(&ty) || types.is_ienumerator_scope_map_usage(&ty))
        {
            let tokens = self.copy_through(site, receiver, result);
            self.check_failure(site, &tokens);
        } else if name == "MoveNext" && types.is_ienumerator(&ty) && self.has_table_tokens(receiver) {
            let counters: TraceableSet = tables(&self.state.get_traceables(receiver))
                .into_iter()
                .map(Traceable::Counter)
                .collect();
            self.update_pta_for_scope_method(site);
            if let Some(result) = result {
                self.state.assign_traceables(result, counters);
            }
        } else if name == "get_Item" && row {
            if let Some(schema) = self.try_schema_for_table(site, receiver) {
                let column = self.update_column_data(site, Some(&schema));
                self.add_column_traceable(site, receiver, column);
            }
        } else if matches!(name.as_str(), "Set" | "UnsafeSet") && column_data {
            if let Some(value) = site.argument(1) {
                self.write_output(site, receiver, value);
            }
        } else if name == "CopyTo" && column_data {
            if let Some(target) = site.argument(1) {
                self.write_output(site, target, receiver);
            }
        } else if name == "CopyTo" && row {
            self.copy_row_to(site, receiver);
        } else if name == "Reset" && row {
            // resetting an output row writes no column
        } else if getter && row && !types.is_strict_row_type(&ty) && types.is_column_data_type(&site.method.return_type) {
            // generated rows expose columns as properties
            let property = name.strip_prefix("get_").unwrap_or(&name).to_string();
            if let Some(schema) = self.try_schema_for_table(site, receiver) {
                let column = schema
                    .column_by_name(&property)
                    .cloned()
                    .unwrap_or_else(|| Column::named(property));
                self.add_column_traceable(site, receiver, column);
            }
        } else if getter && column_data {
            let tokens = self.copy_through(site, receiver, result);
            self.check_failure(site, &tokens);
        } else if name == "Load" && types.is_row_list_type(&ty) {
            if let Some(source) = site.argument(1) {
                let tokens = self.state.get_traceables(source);
                self.state.add_traceables(receiver, &tokens);
                self.check_failure(site, &tokens);
            }
        } else if types.is_scope_map(&ty) {
            if name == "get_Item" {
                self.scope_map_item(site, receiver);
            }
        } else if types.is_strict_row_type(&ty) || types.is_scope_runtime(&ty) {
            self.update_call(site);
        } else {
            return false;
        }
        true
    }

    fn has_table_tokens(&self, variable: &Variable) -> bool {
        self.state.get_traceables(variable).iter().any(Traceable::is_table)
    }

    /// `result = receiver.M()` where the result stands for the receiver
    fn copy_through(&mut self, site: &CallSite<'_>, receiver: &Variable, result: Option<&Variable>) -> TraceableSet {
        let tokens = self.state.get_traceables(receiver);
        self.update_pta_for_scope_method(site);
        if let Some(result) = result {
            self.state.assign_traceables(result, tokens.clone());
        }
        tokens
    }

    /// `target` is written to an output column with the tokens of `value`
    /// under the active branch conditions
    fn write_output(&mut self, site: &CallSite<'_>, target: &Variable, value: &Variable) {
        let tokens = self.state.get_traceables(value);
        self.update_pta_for_scope_method(site);
        self.state.add_output_traceables(target, &tokens);
        let control = self.state.control_traceables();
        self.state.add_output_control_traceables(target, &control);
    }

    /// `input.CopyTo(output)`: every input column passes through
    fn copy_row_to(&mut self, site: &CallSite<'_>, source: &Variable) {
        let Some(target) = site.argument(1) else {
            return;
        };
        let input = self.try_table(source);
        let output = self.try_table(target);
        if input != Some(TableKind::Input) || output != Some(TableKind::Output) {
            self.fail_or_retry(site.instruction, UNKNOWN_TABLES);
            return;
        }

        let schema = self
            .analysis
            .manager
            .schema(TableKind::Input)
            .cloned()
            .unwrap_or_default();
        for (read, written) in copy_row(&mut self.state, target, &schema, TableKind::Input, TableKind::Output) {
            self.analysis.input_columns.insert(read);
            self.analysis.output_columns.insert(written);
        }
    }

    fn try_table(&self, variable: &Variable) -> Option<TableKind> {
        if let Some(kinds) = self.analysis.scope_info.tables_for_schema_var(variable) {
            return kinds.iter().next().copied();
        }
        tables(&self.state.get_traceables(variable)).first().copied()
    }

    /// `result = row[column]`: one column token per table the row belongs to
    pub(crate) fn add_column_traceable(&mut self, site: &CallSite<'_>, table: &Variable, column: Column) {
        let tokens: TraceableSet = tables(&self.state.get_traceables(table))
            .into_iter()
            .map(|kind| Traceable::column(kind, column.clone()))
            .collect();
        self.update_pta_for_scope_method(site);
        if let Some(result) = site.result {
            self.state.assign_traceables(result, tokens.clone());
        }
        self.analysis.add_columns(&tokens);
        self.check_failure(site, &tokens);
    }

    /// `map[key]` on a map column of the input
    fn scope_map_item(&mut self, site: &CallSite<'_>, receiver: &Variable) {
        let Some(selector) = site.argument(1) else {
            return;
        };
        let key = self
            .analysis
            .equalities()
            .and_then(|e| e.string_constant(selector))
            .map(str::to_string)
            .or_else(|| {
                let range = self.analysis.range_at(self.node, selector);
                range.as_literal().filter(|_| !range.is_top()).map(str::to_string)
            });
        let Some(key) = key else {
            self.set_top(site.instruction, "Could not determine the key of a map column");
            return;
        };

        let tokens: TraceableSet = self
            .state
            .get_traceables(receiver)
            .iter()
            .filter_map(|t| match t {
                Traceable::Column(column) if column.table == TableKind::Input => Some(Traceable::ScopeMap {
                    column: column.clone(),
                    key: key.clone(),
                }),
                _ => None,
            })
            .collect();
        self.update_pta_for_scope_method(site);
        if let Some(result) = site.result {
            self.state.assign_traceables(result, tokens);
        }
    }
}
