use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use shared::domain::RowObject;

/// A single cell. Stores hold JSON scalars: strings, numbers or null.
pub type Cell = Value;
pub type Row = Vec<Cell>;

/// Row-oriented access to named tables whose first row is the header.
///
/// Row indices passed to [`TableStore::update_cell`] and
/// [`TableStore::delete_row`] address the vector returned by
/// [`TableStore::read_rows`], so index 0 is the header row.
#[async_trait]
pub trait TableStore: Send + Sync {
    async fn table_exists(&self, table: &str) -> Result<bool>;

    /// Creates an empty table holding only `header`. Fails if it exists.
    async fn create_table(&self, table: &str, header: Row) -> Result<()>;

    /// All rows including the header, or `None` when the table is missing.
    async fn read_rows(&self, table: &str) -> Result<Option<Vec<Row>>>;

    async fn append_row(&self, table: &str, row: Row) -> Result<()>;

    async fn update_cell(
        &self,
        table: &str,
        row: usize,
        column: usize,
        value: Cell,
    ) -> Result<()>;

    async fn delete_row(&self, table: &str, row: usize) -> Result<()>;

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}

/// Textual view of a cell, as a spreadsheet would print it.
pub fn cell_text(cell: &Cell) -> String {
    match cell {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i.to_string()
            } else if let Some(u) = n.as_u64() {
                u.to_string()
            } else {
                let f = n.as_f64().unwrap_or_default();
                if f.fract() == 0.0 && f.abs() < MAX_SAFE_INTEGER {
                    format!("{}", f as i64)
                } else {
                    f.to_string()
                }
            }
        }
        other => other.to_string(),
    }
}

/// Numeric view of a cell. Blank or unparsable cells read as 0.
pub fn cell_number(cell: &Cell) -> f64 {
    match cell {
        Value::Number(n) => n.as_f64().filter(|f| f.is_finite()).unwrap_or_default(),
        Value::String(s) => parse_number(s),
        Value::Bool(true) => 1.0,
        _ => 0.0,
    }
}

/// Parses a user supplied number, falling back to 0.
pub fn parse_number(raw: &str) -> f64 {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .unwrap_or_default()
}

const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// Builds a numeric cell, integral when the value has no fraction.
pub fn number_cell(value: f64) -> Cell {
    if !value.is_finite() {
        return Value::from(0);
    }
    if value.fract() == 0.0 && value.abs() <= MAX_SAFE_INTEGER {
        return Value::from(value as i64);
    }
    serde_json::Number::from_f64(value)
        .map(Value::Number)
        .unwrap_or_else(|| Value::from(0))
}

/// Lookup key for a header cell: lowercase, whitespace removed.
pub fn normalize_header(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Maps header names to column positions for one table read.
#[derive(Debug, Clone)]
pub struct HeaderIndex {
    names: Vec<String>,
    positions: HashMap<String, usize>,
}

impl HeaderIndex {
    pub fn from_row(header: &[Cell]) -> Self {
        let names: Vec<String> = header
            .iter()
            .map(|cell| cell_text(cell).trim().to_string())
            .collect();
        let mut positions = HashMap::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            positions.insert(normalize_header(name), i);
        }
        Self { names, positions }
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.positions.get(&normalize_header(name)).copied()
    }

    /// Keys every header name to the cell beneath it; short rows read as "".
    pub fn row_object(&self, row: &[Cell]) -> RowObject {
        let mut object = RowObject::new();
        for (i, name) in self.names.iter().enumerate() {
            let cell = row
                .get(i)
                .cloned()
                .unwrap_or_else(|| Value::String(String::new()));
            object.insert(name.clone(), cell);
        }
        object
    }
}
