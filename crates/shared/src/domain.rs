use std::fmt;

use serde::{Deserialize, Serialize};

/// Status written to every freshly created order.
pub const ORDER_STATUS_NEW: &str = "NEW";

/// One record of a table, keyed by its (trimmed) header text.
pub type RowObject = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub String);

impl OrderId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub title: String,
    pub description: String,
    pub price: f64,
    #[serde(rename = "imageUrl")]
    pub image_url: String,
}
