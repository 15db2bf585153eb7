use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use serde_json::Value;
use shared::{
    domain::{OrderId, Product, RowObject, ORDER_STATUS_NEW},
    protocol::{NewOrder, OrderUpdate},
};
use thiserror::Error;
use uuid::Uuid;

mod memory;
pub mod schema;
mod sqlite;
pub mod table;

pub use memory::MemoryTableStore;
pub use sqlite::SqliteTableStore;
pub use table::{Cell, HeaderIndex, Row, TableStore};

use schema::{orders, products, ORDERS, PRODUCTS};
use table::{cell_number, cell_text, number_cell};

pub const DEFAULT_PRODUCTS_TABLE: &str = "Products";
pub const DEFAULT_ORDERS_TABLE: &str = "Orders";

/// Database URL that selects the process-local [`MemoryTableStore`].
pub const MEMORY_DATABASE_URL: &str = "memory:";

#[derive(Debug, Error)]
pub enum OrderStoreError {
    #[error("orderId required")]
    MissingId,
    #[error("{0}")]
    NotFound(String),
    #[error("table store unavailable: {0:#}")]
    Unavailable(#[from] anyhow::Error),
}

pub type StoreResult<T> = std::result::Result<T, OrderStoreError>;

/// Product and order operations over a [`TableStore`].
#[derive(Clone)]
pub struct Storage {
    tables: Arc<dyn TableStore>,
    products_table: String,
    orders_table: String,
}

impl Storage {
    pub fn new(tables: Arc<dyn TableStore>) -> Self {
        Self {
            tables,
            products_table: DEFAULT_PRODUCTS_TABLE.to_string(),
            orders_table: DEFAULT_ORDERS_TABLE.to_string(),
        }
    }

    /// Opens the backend named by `database_url`: [`MEMORY_DATABASE_URL`] or
    /// any SQLite URL.
    pub async fn open(database_url: &str) -> anyhow::Result<Self> {
        let tables: Arc<dyn TableStore> = if database_url == MEMORY_DATABASE_URL {
            Arc::new(MemoryTableStore::new())
        } else {
            Arc::new(SqliteTableStore::new(database_url).await?)
        };
        Ok(Self::new(tables))
    }

    pub fn with_table_names(
        mut self,
        products_table: impl Into<String>,
        orders_table: impl Into<String>,
    ) -> Self {
        self.products_table = products_table.into();
        self.orders_table = orders_table.into();
        self
    }

    pub fn tables(&self) -> &Arc<dyn TableStore> {
        &self.tables
    }

    pub fn products_table(&self) -> &str {
        &self.products_table
    }

    pub fn orders_table(&self) -> &str {
        &self.orders_table
    }

    pub async fn health_check(&self) -> StoreResult<()> {
        Ok(self.tables.health_check().await?)
    }

    pub async fn list_products(&self) -> StoreResult<Vec<Product>> {
        let Some(rows) = self.tables.read_rows(&self.products_table).await? else {
            return Ok(Vec::new());
        };
        let Some((header, data)) = rows.split_first() else {
            return Ok(Vec::new());
        };
        let index = HeaderIndex::from_row(header);

        Ok(data
            .iter()
            .map(|row| {
                let field = |name: &str| -> Cell {
                    let raw = index
                        .position(name)
                        .and_then(|i| row.get(i))
                        .cloned()
                        .unwrap_or(Value::Null);
                    match PRODUCTS.column(name) {
                        Some(column) => column.kind.coerce(&raw),
                        None => raw,
                    }
                };
                Product {
                    id: cell_text(&field(products::ID)),
                    title: cell_text(&field(products::TITLE)),
                    description: cell_text(&field(products::DESCRIPTION)),
                    price: cell_number(&field(products::PRICE)),
                    image_url: cell_text(&field(products::IMAGE_URL)),
                }
            })
            .collect())
    }

    /// Appends a new order with status `NEW`, creating the orders table with
    /// the standard header on first use. Cells follow the stored header, so a
    /// table with reordered or missing columns still lines up.
    pub async fn create_order(&self, order: &NewOrder) -> StoreResult<OrderId> {
        if !self.tables.table_exists(&self.orders_table).await? {
            if let Err(err) = self
                .tables
                .create_table(&self.orders_table, ORDERS.header())
                .await
            {
                // Lost a creation race; the table is there now.
                if !self.tables.table_exists(&self.orders_table).await? {
                    return Err(err.into());
                }
            }
        }

        let header = self
            .tables
            .read_rows(&self.orders_table)
            .await?
            .and_then(|rows| rows.into_iter().next())
            .unwrap_or_else(|| ORDERS.header());

        let order_id = OrderId(Uuid::new_v4().to_string());
        let created_at = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let row = order_row(&header, &order_id, &created_at, order);
        self.tables.append_row(&self.orders_table, row).await?;
        Ok(order_id)
    }

    pub async fn list_all_orders(&self) -> StoreResult<Vec<RowObject>> {
        self.select_orders(|_, _| true).await
    }

    /// Orders whose trimmed phone equals the trimmed `phone`.
    pub async fn list_orders_by_phone(&self, phone: &str) -> StoreResult<Vec<RowObject>> {
        let wanted = phone.trim();
        self.select_orders(|index, row| {
            index
                .position(orders::PHONE)
                .and_then(|i| row.get(i))
                .is_some_and(|cell| cell_text(cell).trim() == wanted)
        })
        .await
    }

    async fn select_orders<F>(&self, keep: F) -> StoreResult<Vec<RowObject>>
    where
        F: Fn(&HeaderIndex, &[Cell]) -> bool,
    {
        let Some(rows) = self.tables.read_rows(&self.orders_table).await? else {
            return Ok(Vec::new());
        };
        let Some((header, data)) = rows.split_first() else {
            return Ok(Vec::new());
        };
        let index = HeaderIndex::from_row(header);
        Ok(data
            .iter()
            .filter(|row| keep(&index, row.as_slice()))
            .map(|row| index.row_object(row))
            .collect())
    }

    /// Overwrites the supplied non-empty fields of the first matching order.
    /// Fields whose column is absent from the header are skipped.
    pub async fn update_order(&self, update: &OrderUpdate) -> StoreResult<()> {
        if update.order_id.is_empty() {
            return Err(OrderStoreError::MissingId);
        }
        let rows = self
            .tables
            .read_rows(&self.orders_table)
            .await?
            .ok_or_else(|| OrderStoreError::NotFound("Orders table not found".into()))?;
        if rows.len() <= 1 {
            return Err(OrderStoreError::NotFound("No orders".into()));
        }
        let index = HeaderIndex::from_row(&rows[0]);
        let row = find_order_row(&rows, &update.order_id)
            .ok_or_else(|| OrderStoreError::NotFound("Order not found".into()))?;

        let changes = [
            (orders::STATUS, &update.status),
            (orders::PHONE, &update.phone),
            (orders::ADDRESS, &update.address),
            (orders::PIN_CODE, &update.pin),
            (orders::PLACE, &update.place),
        ];
        for (name, value) in changes {
            let Some(value) = value.as_deref().filter(|v| !v.is_empty()) else {
                continue;
            };
            let Some(column) = index.position(name) else {
                continue;
            };
            self.tables
                .update_cell(&self.orders_table, row, column, Value::from(value))
                .await?;
        }
        Ok(())
    }

    /// Physically removes the first order whose id matches.
    pub async fn delete_order(&self, order_id: &str) -> StoreResult<()> {
        if order_id.is_empty() {
            return Err(OrderStoreError::MissingId);
        }
        let rows = self
            .tables
            .read_rows(&self.orders_table)
            .await?
            .ok_or_else(|| OrderStoreError::NotFound("Orders table not found".into()))?;
        let row = find_order_row(&rows, order_id)
            .ok_or_else(|| OrderStoreError::NotFound("Order not found".into()))?;
        self.tables.delete_row(&self.orders_table, row).await?;
        Ok(())
    }
}

/// Index of the first data row whose first cell equals `order_id`.
fn find_order_row(rows: &[Row], order_id: &str) -> Option<usize> {
    rows.iter()
        .enumerate()
        .skip(1)
        .find(|(_, row)| row.first().is_some_and(|cell| cell_text(cell) == order_id))
        .map(|(i, _)| i)
}

/// Lays the order out under `header`. Header columns the order has no value
/// for stay blank; order fields without a header column are dropped.
fn order_row(header: &[Cell], order_id: &OrderId, created_at: &str, order: &NewOrder) -> Row {
    let index = HeaderIndex::from_row(header);
    let mut row = vec![Value::String(String::new()); header.len()];
    for column in ORDERS.columns() {
        let Some(position) = index.position(column.name) else {
            continue;
        };
        let raw = match column.name {
            orders::ORDER_ID => Value::from(order_id.as_str()),
            orders::TIMESTAMP => Value::from(created_at),
            orders::PRODUCT_ID => Value::from(order.product_id.as_str()),
            orders::PRODUCT_TITLE => Value::from(order.product_title.as_str()),
            orders::UNIT_PRICE => number_cell(order.unit_price),
            orders::QUANTITY => number_cell(order.quantity),
            orders::EXTRA_AMOUNT => number_cell(order.extra_amount),
            orders::TOTAL_AMOUNT => number_cell(order.total_amount),
            orders::CUSTOMER_NAME => Value::from(order.customer_name.as_str()),
            orders::PHONE => Value::from(order.phone.as_str()),
            orders::ADDRESS => Value::from(order.address.as_str()),
            orders::PIN_CODE => Value::from(order.pin_code.as_str()),
            orders::PLACE => Value::from(order.place.as_str()),
            orders::STATUS => Value::from(ORDER_STATUS_NEW),
            _ => continue,
        };
        row[position] = column.kind.coerce(&raw);
    }
    row
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
