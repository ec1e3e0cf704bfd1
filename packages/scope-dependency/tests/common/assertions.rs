//! Custom assertions for dependency reports

use scope_dependency::{DependencyReport, ReportedColumn, TableKind, Traceable};

fn column_name(token: &Traceable) -> Option<(TableKind, String)> {
    match token {
        Traceable::Column(c) => c.column.name().map(|n| (c.table, n.to_string())),
        _ => None,
    }
}

/// Input column names a report entry depends on
fn input_names(tokens: &[Traceable]) -> Vec<String> {
    let mut names: Vec<String> = tokens
        .iter()
        .filter_map(column_name)
        .filter(|(table, _)| *table == TableKind::Input)
        .map(|(_, name)| name)
        .collect();
    names.sort();
    names.dedup();
    names
}

fn entry<'r>(report: &'r DependencyReport, output: &str) -> &'r scope_dependency::features::processor::ColumnDependency {
    report
        .columns
        .iter()
        .find(|e| matches!(&e.column, ReportedColumn::Column(c) if c.column.name() == Some(output)))
        .unwrap_or_else(|| {
            panic!(
                "Expected an entry for output column {output}, got: {:?}",
                report.columns.iter().map(|e| e.column.to_string()).collect::<Vec<_>>()
            )
        })
}

/// Data dependencies of `output`, every token kind included
pub fn data_of<'r>(report: &'r DependencyReport, output: &str) -> &'r [Traceable] {
    &entry(report, output).data
}

pub fn assert_not_top(report: &DependencyReport) {
    assert!(
        !report.is_top(),
        "Expected a precise report, got top. Diagnostics: {:?}",
        report.diagnostics
    );
}

pub fn assert_top(report: &DependencyReport) {
    assert!(report.is_top(), "Expected a top report, got: {:?}", report.columns);
    assert_eq!(report.columns.len(), 1);
    assert_eq!(report.columns[0].column, ReportedColumn::Top);
}

/// `output` depends on exactly the `inputs` data columns
pub fn assert_data_dependencies(report: &DependencyReport, output: &str, inputs: &[&str]) {
    let found = input_names(&entry(report, output).data);
    assert_eq!(found, inputs, "Data dependencies of output column {output}");
}

/// `output` is written under a condition on every column of `inputs`
pub fn assert_control_dependencies(report: &DependencyReport, output: &str, inputs: &[&str]) {
    let found = input_names(&entry(report, output).control);
    for input in inputs {
        assert!(
            found.iter().any(|f| f == input),
            "Expected control dependency of {output} on {input}, got {found:?}"
        );
    }
}

pub fn assert_diagnostic(report: &DependencyReport, needle: &str) {
    assert!(
        report.diagnostics.iter().any(|d| d.contains(needle)),
        "Expected a diagnostic mentioning {needle:?}, got {:?}",
        report.diagnostics
    );
}
