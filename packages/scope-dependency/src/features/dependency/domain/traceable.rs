//! Traceable provenance tokens
//!
//! A traceable names where a value came from: a whole table, one of its
//! columns, a keyed entry of a map column, a JSON document parsed from a
//! column (or a field / element of it), a row counter, or an opaque
//! [`Traceable::Other`] for constants and untracked values.

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use super::column::Column;

/// Deterministically ordered token set
pub type TraceableSet = BTreeSet<Traceable>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TableKind {
    Input,
    Output,
    Json,
    Unknown,
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TableKind::Input => "Input",
            TableKind::Output => "Output",
            TableKind::Json => "Json",
            TableKind::Unknown => "Unknown",
        };
        write!(f, "{}", name)
    }
}

/// A column of a table
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ColumnRef {
    pub table: TableKind,
    pub column: Column,
}

impl ColumnRef {
    pub fn new(table: TableKind, column: Column) -> Self {
        Self { table, column }
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Col({},{})", self.table, self.column)
    }
}

/// A JSON value parsed from a column: the document itself, or any element
/// of a JSON collection inside it
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum JsonSource {
    Document(ColumnRef),
    Element(ColumnRef),
}

impl JsonSource {
    pub fn column(&self) -> &ColumnRef {
        match self {
            JsonSource::Document(c) | JsonSource::Element(c) => c,
        }
    }
}

impl fmt::Display for JsonSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JsonSource::Document(c) => write!(f, "Json({})", c),
            JsonSource::Element(c) => write!(f, "Json({}).[*]", c),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Traceable {
    Table(TableKind),
    Column(ColumnRef),
    ScopeMap { column: ColumnRef, key: String },
    Json(ColumnRef),
    JsonField { json: JsonSource, key: String },
    JsonCollectionElement(ColumnRef),
    Counter(TableKind),
    Other(String),
}

impl Traceable {
    pub fn column(table: TableKind, column: Column) -> Self {
        Traceable::Column(ColumnRef::new(table, column))
    }

    pub fn other(label: impl Into<String>) -> Self {
        Traceable::Other(label.into())
    }

    pub fn is_other(&self) -> bool {
        matches!(self, Traceable::Other(_))
    }

    pub fn is_table(&self) -> bool {
        matches!(self, Traceable::Table(_))
    }

    pub fn table_kind(&self) -> TableKind {
        match self {
            Traceable::Table(kind) | Traceable::Counter(kind) => *kind,
            Traceable::Other(_) => TableKind::Unknown,
            _ => self.column_ref().map_or(TableKind::Unknown, |c| c.table),
        }
    }

    /// Column behind every column-derived token (plain, map entry, JSON)
    pub fn column_ref(&self) -> Option<&ColumnRef> {
        match self {
            Traceable::Column(c)
            | Traceable::ScopeMap { column: c, .. }
            | Traceable::Json(c)
            | Traceable::JsonCollectionElement(c) => Some(c),
            Traceable::JsonField { json, .. } => Some(json.column()),
            _ => None,
        }
    }

    /// JSON value this token denotes, if it denotes a whole JSON value
    pub fn as_json(&self) -> Option<JsonSource> {
        match self {
            Traceable::Json(c) => Some(JsonSource::Document(c.clone())),
            Traceable::JsonCollectionElement(c) => Some(JsonSource::Element(c.clone())),
            _ => None,
        }
    }

    pub fn is_json(&self) -> bool {
        self.as_json().is_some()
    }

    /// Column-derived token of the given table
    pub fn is_column_of(&self, table: TableKind) -> bool {
        self.column_ref().map_or(false, |c| c.table == table)
    }
}

impl fmt::Display for Traceable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Traceable::Table(kind) => write!(f, "Table({})", kind),
            Traceable::Column(c) => write!(f, "{}", c),
            Traceable::ScopeMap { column, key } => {
                write!(f, "Col({},{}[{}])", column.table, column.column, key)
            }
            Traceable::Json(c) => write!(f, "Json({})", c),
            Traceable::JsonField { json, key } => write!(f, "Col({},{}.{})", json.column().table, json, key),
            Traceable::JsonCollectionElement(c) => write!(f, "Json({}).[*]", c),
            Traceable::Counter(kind) => write!(f, "RC({})", kind),
            Traceable::Other(label) => write!(f, "{}", label),
        }
    }
}

/// Tokens that are not [`Traceable::Other`]
pub fn non_other(tokens: &TraceableSet) -> TraceableSet {
    tokens.iter().filter(|t| !t.is_other()).cloned().collect()
}

/// Distinct tables mentioned by `Table` tokens, in order
pub fn tables(tokens: &TraceableSet) -> Vec<TableKind> {
    let mut seen = FxHashSet::default();
    tokens
        .iter()
        .filter_map(|t| match t {
            Traceable::Table(kind) => Some(*kind),
            _ => None,
        })
        .filter(|k| seen.insert(*k))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::range_analysis::RangeValue;

    fn input(name: &str) -> ColumnRef {
        ColumnRef::new(TableKind::Input, Column::named(name))
    }

    #[test]
    fn test_display_forms() {
        assert_eq!(Traceable::Table(TableKind::Input).to_string(), "Table(Input)");
        assert_eq!(Traceable::Column(input("count")).to_string(), "Col(Input,count)");
        assert_eq!(
            Traceable::ScopeMap {
                column: input("props"),
                key: "k".into()
            }
            .to_string(),
            "Col(Input,props[k])"
        );
        assert_eq!(Traceable::Json(input("doc")).to_string(), "Json(Col(Input,doc))");
        assert_eq!(
            Traceable::JsonField {
                json: JsonSource::Document(input("doc")),
                key: "id".into()
            }
            .to_string(),
            "Col(Input,Json(Col(Input,doc)).id)"
        );
        assert_eq!(
            Traceable::JsonCollectionElement(input("doc")).to_string(),
            "Json(Col(Input,doc)).[*]"
        );
        assert_eq!(Traceable::Counter(TableKind::Input).to_string(), "RC(Input)");
        assert_eq!(Traceable::other("Int32").to_string(), "Int32");
    }

    #[test]
    fn test_structural_equality() {
        let a = Traceable::column(TableKind::Input, Column::at(RangeValue::singleton(1)));
        let b = Traceable::column(TableKind::Input, Column::at(RangeValue::singleton(1)));
        let c = Traceable::column(TableKind::Output, Column::at(RangeValue::singleton(1)));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(Traceable::Json(input("x")), Traceable::JsonCollectionElement(input("x")));
    }

    #[test]
    fn test_classification() {
        let field = Traceable::JsonField {
            json: JsonSource::Element(input("doc")),
            key: "a".into(),
        };
        assert!(field.is_column_of(TableKind::Input));
        assert!(!field.is_json());
        assert!(Traceable::JsonCollectionElement(input("doc")).is_json());
        assert_eq!(Traceable::other("x").table_kind(), TableKind::Unknown);
        assert_eq!(Traceable::Counter(TableKind::Output).table_kind(), TableKind::Output);
    }

    #[test]
    fn test_helpers() {
        let tokens: TraceableSet = [
            Traceable::Table(TableKind::Output),
            Traceable::other("1"),
            Traceable::Table(TableKind::Input),
        ]
        .into_iter()
        .collect();
        assert_eq!(non_other(&tokens).len(), 2);
        assert_eq!(tables(&tokens), vec![TableKind::Input, TableKind::Output]);
    }
}
