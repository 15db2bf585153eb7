use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;

use crate::table::{cell_number, cell_text, number_cell, Cell, Row};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Number,
    Timestamp,
}

impl ColumnKind {
    /// Normalises a raw cell to this column's type.
    pub fn coerce(self, cell: &Cell) -> Cell {
        match self {
            ColumnKind::Text => Value::String(cell_text(cell)),
            ColumnKind::Number => number_cell(cell_number(cell)),
            ColumnKind::Timestamp => Value::String(timestamp_text(&cell_text(cell))),
        }
    }
}

/// RFC 3339 input is rewritten as UTC with millisecond precision; anything
/// else is kept as typed.
fn timestamp_text(raw: &str) -> String {
    match DateTime::parse_from_rfc3339(raw.trim()) {
        Ok(ts) => ts
            .with_timezone(&Utc)
            .to_rfc3339_opts(SecondsFormat::Millis, true),
        Err(_) => raw.to_string(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub kind: ColumnKind,
}

const fn text(name: &'static str) -> Column {
    Column {
        name,
        kind: ColumnKind::Text,
    }
}

const fn number(name: &'static str) -> Column {
    Column {
        name,
        kind: ColumnKind::Number,
    }
}

/// Ordered column layout of a table, shared by the code that writes rows and
/// the code that reads them back.
#[derive(Debug, Clone, Copy)]
pub struct Schema {
    columns: &'static [Column],
}

impl Schema {
    pub const fn columns(&self) -> &'static [Column] {
        self.columns
    }

    pub fn header(&self) -> Row {
        self.columns
            .iter()
            .map(|c| Value::String(c.name.to_string()))
            .collect()
    }

    pub fn column(&self, name: &str) -> Option<&'static Column> {
        self.columns.iter().find(|c| c.name == name)
    }
}

pub mod orders {
    pub const ORDER_ID: &str = "OrderID";
    pub const TIMESTAMP: &str = "Timestamp";
    pub const PRODUCT_ID: &str = "ProductID";
    pub const PRODUCT_TITLE: &str = "ProductTitle";
    pub const UNIT_PRICE: &str = "UnitPrice";
    pub const QUANTITY: &str = "Quantity";
    pub const EXTRA_AMOUNT: &str = "ExtraAmount";
    pub const TOTAL_AMOUNT: &str = "TotalAmount";
    pub const CUSTOMER_NAME: &str = "CustomerName";
    pub const PHONE: &str = "Phone";
    pub const ADDRESS: &str = "Address";
    pub const PIN_CODE: &str = "PinCode";
    pub const PLACE: &str = "Place";
    pub const STATUS: &str = "Status";
}

pub mod products {
    pub const ID: &str = "ID";
    pub const TITLE: &str = "Title";
    pub const DESCRIPTION: &str = "Description";
    pub const PRICE: &str = "Price";
    pub const IMAGE_URL: &str = "ImageURL";
}

pub const ORDERS: Schema = Schema {
    columns: &[
        text(orders::ORDER_ID),
        Column {
            name: orders::TIMESTAMP,
            kind: ColumnKind::Timestamp,
        },
        text(orders::PRODUCT_ID),
        text(orders::PRODUCT_TITLE),
        number(orders::UNIT_PRICE),
        number(orders::QUANTITY),
        number(orders::EXTRA_AMOUNT),
        number(orders::TOTAL_AMOUNT),
        text(orders::CUSTOMER_NAME),
        text(orders::PHONE),
        text(orders::ADDRESS),
        text(orders::PIN_CODE),
        text(orders::PLACE),
        text(orders::STATUS),
    ],
};

/// Products are matched by normalised header name, so `Image URL` or
/// `imageurl` both resolve to [`products::IMAGE_URL`].
pub const PRODUCTS: Schema = Schema {
    columns: &[
        text(products::ID),
        text(products::TITLE),
        text(products::DESCRIPTION),
        number(products::PRICE),
        text(products::IMAGE_URL),
    ],
};
