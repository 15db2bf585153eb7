use serde::{Deserialize, Serialize};

use crate::{
    domain::{OrderId, Product, RowObject},
    error::ApiError,
};

/// Request parameters in arrival order. Repeated keys are kept, lookups see
/// the first occurrence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestParams {
    pairs: Vec<(String, String)>,
}

impl RequestParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut params = Self::new();
        params.extend(pairs);
        params
    }

    pub fn extend<I, K, V>(&mut self, pairs: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.pairs
            .extend(pairs.into_iter().map(|(k, v)| (k.into(), v.into())));
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Like [`RequestParams::get`] but treats an empty value as absent.
    pub fn get_non_empty(&self, key: &str) -> Option<&str> {
        self.get(key).filter(|v| !v.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadAction {
    Products,
    AllOrders,
    OrdersByPhone(String),
    Ping,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewOrder {
    pub product_id: String,
    pub product_title: String,
    pub unit_price: f64,
    pub quantity: f64,
    pub extra_amount: f64,
    pub total_amount: f64,
    pub customer_name: String,
    pub phone: String,
    pub address: String,
    pub pin_code: String,
    pub place: String,
}

/// Partial update of an order. `None` leaves the stored cell untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderUpdate {
    pub order_id: String,
    pub status: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub pin: Option<String>,
    pub place: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WriteCommand {
    Create(NewOrder),
    Update(OrderUpdate),
    Delete { order_id: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvelopeStatus {
    Ok,
    Success,
    Error,
}

/// Uniform `{status, ...}` body used for every non-listing response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub status: EnvelopeStatus,
    #[serde(rename = "orderId", default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<OrderId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Envelope {
    pub fn ok() -> Self {
        Self {
            status: EnvelopeStatus::Ok,
            order_id: None,
            message: None,
        }
    }

    pub fn created(order_id: OrderId) -> Self {
        Self {
            status: EnvelopeStatus::Success,
            order_id: Some(order_id),
            message: None,
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: EnvelopeStatus::Success,
            order_id: None,
            message: Some(message.into()),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: EnvelopeStatus::Error,
            order_id: None,
            message: Some(message.into()),
        }
    }
}

impl From<ApiError> for Envelope {
    fn from(value: ApiError) -> Self {
        Self::error(value.message)
    }
}

/// Body of a read request. Listings are returned bare, everything else is
/// wrapped in an [`Envelope`].
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ReadResponse {
    Products(Vec<Product>),
    Orders(Vec<RowObject>),
    Envelope(Envelope),
}

impl From<ApiError> for ReadResponse {
    fn from(value: ApiError) -> Self {
        Self::Envelope(value.into())
    }
}
