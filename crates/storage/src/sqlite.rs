use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Pool, Row as _, Sqlite,
};

use crate::table::{Cell, Row, TableStore};

/// Tables kept in SQLite. Each row is one JSON-encoded cell array; the
/// autoincrement id gives the physical row order.
#[derive(Clone)]
pub struct SqliteTableStore {
    pool: Pool<Sqlite>,
}

impl SqliteTableStore {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    async fn require_table(&self, table: &str) -> Result<()> {
        if self.table_exists(table).await? {
            Ok(())
        } else {
            Err(anyhow!("table '{table}' does not exist"))
        }
    }
}

#[async_trait]
impl TableStore for SqliteTableStore {
    async fn table_exists(&self, table: &str) -> Result<bool> {
        let row = sqlx::query("SELECT 1 FROM sheet_tables WHERE name = ?")
            .bind(table)
            .fetch_optional(&self.pool)
            .await
            .context("failed to look up table")?;
        Ok(row.is_some())
    }

    async fn create_table(&self, table: &str, header: Row) -> Result<()> {
        let header = serde_json::to_string(&header)?;
        let mut tx = self.pool.begin().await?;
        sqlx::query("INSERT INTO sheet_tables (name) VALUES (?)")
            .bind(table)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("failed to create table '{table}'"))?;
        sqlx::query("INSERT INTO sheet_rows (table_name, cells) VALUES (?, ?)")
            .bind(table)
            .bind(header)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn read_rows(&self, table: &str) -> Result<Option<Vec<Row>>> {
        if !self.table_exists(table).await? {
            return Ok(None);
        }
        let rows = sqlx::query("SELECT cells FROM sheet_rows WHERE table_name = ? ORDER BY id")
            .bind(table)
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("failed to read rows of '{table}'"))?;
        let rows = rows
            .into_iter()
            .map(|r| decode_cells(&r.get::<String, _>(0)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Some(rows))
    }

    async fn append_row(&self, table: &str, row: Row) -> Result<()> {
        self.require_table(table).await?;
        sqlx::query("INSERT INTO sheet_rows (table_name, cells) VALUES (?, ?)")
            .bind(table)
            .bind(serde_json::to_string(&row)?)
            .execute(&self.pool)
            .await
            .with_context(|| format!("failed to append row to '{table}'"))?;
        Ok(())
    }

    async fn update_cell(
        &self,
        table: &str,
        row: usize,
        column: usize,
        value: Cell,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        let record = sqlx::query(
            "SELECT id, cells FROM sheet_rows WHERE table_name = ? ORDER BY id LIMIT 1 OFFSET ?",
        )
        .bind(table)
        .bind(offset(row)?)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| anyhow!("row {row} out of range for table '{table}'"))?;

        let id = record.get::<i64, _>(0);
        let mut cells = decode_cells(&record.get::<String, _>(1))?;
        if cells.len() <= column {
            cells.resize(column + 1, Value::String(String::new()));
        }
        cells[column] = value;

        sqlx::query("UPDATE sheet_rows SET cells = ? WHERE id = ?")
            .bind(serde_json::to_string(&cells)?)
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn delete_row(&self, table: &str, row: usize) -> Result<()> {
        let deleted = sqlx::query(
            "DELETE FROM sheet_rows WHERE id = (
                SELECT id FROM sheet_rows WHERE table_name = ? ORDER BY id LIMIT 1 OFFSET ?
             )",
        )
        .bind(table)
        .bind(offset(row)?)
        .execute(&self.pool)
        .await?
        .rows_affected();
        if deleted == 0 {
            return Err(anyhow!("row {row} out of range for table '{table}'"));
        }
        Ok(())
    }

    async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }
}

fn offset(row: usize) -> Result<i64> {
    i64::try_from(row).context("row index too large")
}

fn decode_cells(raw: &str) -> Result<Row> {
    serde_json::from_str(raw).context("corrupt row cells")
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url == "sqlite::memory:" || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}
