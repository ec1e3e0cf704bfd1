//! Table schemas
//!
//! Ordered columns of an input or output table, supplied by the job
//! description as `name:type` pairs.

use serde::{Deserialize, Serialize};

use super::column::Column;
use crate::features::range_analysis::RangeValue;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    columns: Vec<Column>,
}

impl Schema {
    pub fn new(columns: Vec<Column>) -> Self {
        Self { columns }
    }

    /// Parse `"JobGUID:string,SubmitTime:DateTime?,Tags:Dictionary<string,int>"`.
    /// Commas inside generic arguments do not split columns. Column `i`
    /// gets position `i`.
    pub fn parse(text: &str) -> Self {
        let mut pieces: Vec<String> = Vec::new();
        let mut parts = text.split(',').peekable();
        while let Some(part) = parts.next() {
            let mut piece = part.to_string();
            if piece.contains('<') && !piece.contains('>') {
                if let Some(next) = parts.next_if(|p| p.contains('>')) {
                    piece.push(',');
                    piece.push_str(next);
                }
            }
            if !piece.trim().is_empty() {
                pieces.push(piece);
            }
        }

        let columns = pieces
            .iter()
            .enumerate()
            .map(|(i, piece)| {
                let (name, ty) = match piece.split_once(':') {
                    Some((name, ty)) => (name.trim(), Some(ty.trim().to_string())),
                    None => (piece.trim(), None),
                };
                Column::new(Some(name.to_string()), RangeValue::singleton(i as i64), ty)
            })
            .collect();
        Self { columns }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn column_by_name(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name() == Some(name))
    }

    pub fn column_by_range(&self, position: &RangeValue) -> Option<&Column> {
        self.columns.iter().find(|c| c.position() == Some(position))
    }

    pub fn column_by_position(&self, position: i64) -> Option<&Column> {
        self.column_by_range(&RangeValue::singleton(position))
    }

}
