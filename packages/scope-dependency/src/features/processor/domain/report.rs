//! Per-processor dependency report
//!
//! One entry per written output column (its data and control
//! dependencies), or a single `_EMPTY_` / `_TOP_` entry, plus a summary of
//! the columns read and written against the declared schemas.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::features::dependency::domain::{
    Column, ColumnDependencies, ColumnRef, DependencyPtgDomain, Schema, TableKind, Traceable, TraceableSet,
};
use crate::shared::diagnostics::{AnalysisCounters, Diagnostics};

/// Column of a report entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "column")]
pub enum ReportedColumn {
    Column(ColumnRef),
    /// Nothing was written to the output
    Empty,
    /// The analysis gave up
    Top,
}

impl fmt::Display for ReportedColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportedColumn::Column(column) => write!(f, "{}", column),
            ReportedColumn::Empty => write!(f, "_EMPTY_"),
            ReportedColumn::Top => write!(f, "_TOP_"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDependency {
    pub column: ReportedColumn,
    pub data: Vec<Traceable>,
    pub control: Vec<Traceable>,
    /// Some data dependency also leaves the tracked system
    pub escapes: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub inputs: Vec<ColumnRef>,
    pub outputs: Vec<ColumnRef>,
    pub schema_inputs: Vec<Column>,
    pub schema_outputs: Vec<Column>,
    pub escaping: Vec<Traceable>,
    pub is_top: bool,
}

impl ReportSummary {
    pub fn input_has_top(&self) -> bool {
        self.inputs.iter().any(|c| c.column.is_top())
    }

    pub fn output_has_top(&self) -> bool {
        self.outputs.iter().any(|c| c.column.is_top())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyReport {
    pub processor: String,
    pub columns: Vec<ColumnDependency>,
    pub summary: ReportSummary,
    pub diagnostics: Vec<String>,
    pub counters: AnalysisCounters,
}

/// Same column of the schema: names match when both sides have one,
/// positions otherwise
fn same_column(schema: &Column, found: &Column) -> bool {
    match (schema.name(), found.name()) {
        (Some(a), Some(b)) => a == b,
        _ => match (schema.position(), found.position()) {
            (Some(a), Some(b)) => !b.is_bottom() && a == b,
            _ => false,
        },
    }
}

impl DependencyReport {
    /// Report of the final MoveNext state
    pub fn build(
        processor: impl Into<String>,
        state: &DependencyPtgDomain,
        input_columns: &BTreeSet<ColumnRef>,
        output_columns: &BTreeSet<ColumnRef>,
        input_schema: &Schema,
        output_schema: &Schema,
        diagnostics: &Diagnostics,
    ) -> Self {
        let escaping: Vec<Traceable> = state.dependencies.escaping.iter().cloned().collect();
        let schema_inputs = input_schema.columns().to_vec();
        let schema_outputs = output_schema.columns().to_vec();

        let (columns, summary) = if state.is_top() {
            let columns = vec![ColumnDependency {
                column: ReportedColumn::Top,
                data: vec![Traceable::column(TableKind::Input, Column::Top)],
                control: Vec::new(),
                escapes: !escaping.is_empty(),
            }];
            let summary = ReportSummary {
                inputs: vec![ColumnRef::new(TableKind::Input, Column::Top)],
                outputs: vec![ColumnRef::new(TableKind::Output, Column::Top)],
                schema_inputs,
                schema_outputs,
                escaping,
                is_top: true,
            };
            (columns, summary)
        } else {
            let (data, control) = state.compute_output_dependencies();
            let columns = Self::column_entries(&data, &control, &state.dependencies.escaping);
            let summary = ReportSummary {
                inputs: input_columns.iter().cloned().collect(),
                outputs: output_columns.iter().cloned().collect(),
                schema_inputs,
                schema_outputs,
                escaping,
                is_top: false,
            };
            (columns, summary)
        };

        Self {
            processor: processor.into(),
            columns,
            summary,
            diagnostics: diagnostics.reasons().iter().map(ToString::to_string).collect(),
            counters: diagnostics.counters.clone(),
        }
    }

    fn column_entries(
        data: &ColumnDependencies,
        control: &ColumnDependencies,
        escaping: &TraceableSet,
    ) -> Vec<ColumnDependency> {
        // deterministic order for reports and comparisons
        let ordered: BTreeMap<&ColumnRef, &TraceableSet> = data.iter().collect();
        if ordered.is_empty() {
            return vec![ColumnDependency {
                column: ReportedColumn::Empty,
                data: Vec::new(),
                control: Vec::new(),
                escapes: !escaping.is_empty(),
            }];
        }

        ordered
            .into_iter()
            .map(|(column, deps)| ColumnDependency {
                column: ReportedColumn::Column(column.clone()),
                data: deps.iter().cloned().collect(),
                control: control
                    .get(column)
                    .map(|c| c.iter().cloned().collect())
                    .unwrap_or_default(),
                escapes: deps.iter().any(|t| escaping.contains(t)),
            })
            .collect()
    }

    pub fn is_top(&self) -> bool {
        self.summary.is_top
    }

    /// Entry of an output column
    pub fn column(&self, output: &Column) -> Option<&ColumnDependency> {
        self.columns.iter().find(|entry| match &entry.column {
            ReportedColumn::Column(c) => same_column(output, &c.column),
            _ => false,
        })
    }

    /// `(output, input)` pairs where the output depends on exactly one
    /// known input column
    pub fn pass_through_columns(&self) -> Vec<(Column, Column)> {
        let mut seen = BTreeSet::new();
        let mut result = Vec::new();
        for entry in &self.columns {
            let ReportedColumn::Column(output) = &entry.column else {
                continue;
            };
            if output.column.is_all() || output.column.is_top() || !seen.insert(output.column.clone()) {
                continue;
            }
            let [Traceable::Column(input)] = entry.data.as_slice() else {
                continue;
            };
            if input.table == TableKind::Input && !input.column.is_top() {
                result.push((output.column.clone(), input.column.clone()));
            }
        }
        result
    }

    /// Schema inputs the processor never reads; empty when reads are unknown
    pub fn unread_inputs(&self) -> Vec<Column> {
        if self.summary.input_has_top() {
            return Vec::new();
        }
        self.summary
            .schema_inputs
            .iter()
            .filter(|schema| !self.summary.inputs.iter().any(|c| same_column(schema, &c.column)))
            .cloned()
            .collect()
    }

    /// Schema outputs the processor never writes; empty when writes are unknown
    pub fn unwritten_outputs(&self) -> Vec<Column> {
        if self.summary.output_has_top() {
            return Vec::new();
        }
        self.summary
            .schema_outputs
            .iter()
            .filter(|schema| !self.summary.outputs.iter().any(|c| same_column(schema, &c.column)))
            .cloned()
            .collect()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
