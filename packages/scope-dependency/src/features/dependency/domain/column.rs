//! Columns of a row table
//!
//! A column is TOP (unknown), ALL (every column, e.g. a whole-row copy
//! with an unknown schema) or a record with partial information: the name,
//! the position or the type may each be missing.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::features::range_analysis::RangeValue;

static NAME_AND_POSITION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Col\((\w+),(\w+)\[(\d+)\]\)").expect("valid column regex"));
static POSITION_ONLY: Lazy<Regex> = Lazy::new(|| Regex::new(r"Col\((\w+),(\d+)\)").expect("valid column regex"));
static NAME_ONLY: Lazy<Regex> = Lazy::new(|| Regex::new(r"Col\((\w+),(\w+)\)").expect("valid column regex"));

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: Option<String>,
    /// `Bottom` when the position is unknown
    pub position: RangeValue,
    pub ty: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Column {
    Top,
    All,
    Known(ColumnInfo),
}

impl Column {
    pub fn new(name: Option<String>, position: RangeValue, ty: Option<String>) -> Self {
        Column::Known(ColumnInfo { name, position, ty })
    }

    /// Column known by name only
    pub fn named(name: impl Into<String>) -> Self {
        Self::new(Some(name.into()), RangeValue::Bottom, None)
    }

    /// Column known by position only
    pub fn at(position: RangeValue) -> Self {
        Self::new(None, position, None)
    }

    pub fn is_top(&self) -> bool {
        matches!(self, Column::Top)
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Column::All)
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Column::Known(info) => info.name.as_deref(),
            _ => None,
        }
    }

    pub fn position(&self) -> Option<&RangeValue> {
        match self {
            Column::Known(info) => Some(&info.position),
            _ => None,
        }
    }

    pub fn ty(&self) -> Option<&str> {
        match self {
            Column::Known(info) => info.ty.as_deref(),
            _ => None,
        }
    }

    /// Recover the column of a `Col(table,column)` rendering. The table
    /// name is not part of the column and is discarded.
    pub fn parse(text: &str) -> Option<Column> {
        if text.trim().is_empty() {
            return None;
        }
        if let Some(caps) = NAME_AND_POSITION.captures(text) {
            let position: i64 = caps[3].parse().ok()?;
            return Some(Self::new(Some(caps[2].to_string()), RangeValue::singleton(position), None));
        }
        if let Some(caps) = POSITION_ONLY.captures(text) {
            let position: i64 = caps[2].parse().ok()?;
            return Some(Self::at(RangeValue::singleton(position)));
        }
        NAME_ONLY.captures(text).map(|caps| Self::named(&caps[2]))
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Column::Top => write!(f, "_TOP_"),
            Column::All => write!(f, "_All_"),
            Column::Known(info) => match (&info.name, info.position.is_bottom()) {
                (None, false) => write!(f, "{}", info.position),
                (Some(name), true) => write!(f, "{}", name),
                (name, _) => write!(f, "{}[{}]", name.as_deref().unwrap_or_default(), info.position),
            },
        }
    }
}
