use std::{collections::HashMap, sync::Arc};

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::table::{Cell, Row, TableStore};

/// Process-local table store. Cloning shares the same tables.
#[derive(Debug, Default, Clone)]
pub struct MemoryTableStore {
    tables: Arc<Mutex<HashMap<String, Vec<Row>>>>,
}

impl MemoryTableStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TableStore for MemoryTableStore {
    async fn table_exists(&self, table: &str) -> Result<bool> {
        Ok(self.tables.lock().await.contains_key(table))
    }

    async fn create_table(&self, table: &str, header: Row) -> Result<()> {
        let mut tables = self.tables.lock().await;
        if tables.contains_key(table) {
            bail!("table '{table}' already exists");
        }
        tables.insert(table.to_string(), vec![header]);
        Ok(())
    }

    async fn read_rows(&self, table: &str) -> Result<Option<Vec<Row>>> {
        Ok(self.tables.lock().await.get(table).cloned())
    }

    async fn append_row(&self, table: &str, row: Row) -> Result<()> {
        let mut tables = self.tables.lock().await;
        let rows = tables
            .get_mut(table)
            .ok_or_else(|| anyhow!("table '{table}' does not exist"))?;
        rows.push(row);
        Ok(())
    }

    async fn update_cell(
        &self,
        table: &str,
        row: usize,
        column: usize,
        value: Cell,
    ) -> Result<()> {
        let mut tables = self.tables.lock().await;
        let rows = tables
            .get_mut(table)
            .ok_or_else(|| anyhow!("table '{table}' does not exist"))?;
        let cells = rows
            .get_mut(row)
            .ok_or_else(|| anyhow!("row {row} out of range for table '{table}'"))?;
        if cells.len() <= column {
            cells.resize(column + 1, Value::String(String::new()));
        }
        cells[column] = value;
        Ok(())
    }

    async fn delete_row(&self, table: &str, row: usize) -> Result<()> {
        let mut tables = self.tables.lock().await;
        let rows = tables
            .get_mut(table)
            .ok_or_else(|| anyhow!("table '{table}' does not exist"))?;
        if row >= rows.len() {
            bail!("row {row} out of range for table '{table}'");
        }
        rows.remove(row);
        Ok(())
    }
}
