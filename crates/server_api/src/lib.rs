use shared::{
    error::{ApiError, ApiException, ErrorCode},
    protocol::{Envelope, NewOrder, OrderUpdate, ReadAction, ReadResponse, RequestParams, WriteCommand},
};
use storage::{table::parse_number, OrderStoreError, Storage};
use tracing::{info, warn};

pub const INVALID_ACTION_MESSAGE: &str =
    "Invalid action. Use action=products|getAllOrders|getOrders&phone=...";

#[derive(Clone)]
pub struct ApiContext {
    pub storage: Storage,
}

/// Trimmed, lowercased `action` parameter; empty when absent.
pub fn normalize_action(params: &RequestParams) -> String {
    params
        .get("action")
        .unwrap_or_default()
        .trim()
        .to_lowercase()
}

pub fn parse_read_action(params: &RequestParams) -> Result<ReadAction, ApiException> {
    match normalize_action(params).as_str() {
        "products" => Ok(ReadAction::Products),
        "getallorders" => Ok(ReadAction::AllOrders),
        "getorders" => params
            .get_non_empty("phone")
            .map(|phone| ReadAction::OrdersByPhone(phone.to_string()))
            .ok_or_else(invalid_action),
        "ping" => Ok(ReadAction::Ping),
        _ => Err(invalid_action()),
    }
}

/// `update` and `delete` are explicit; any other action creates an order.
pub fn parse_write_command(params: &RequestParams) -> Result<WriteCommand, ApiException> {
    match normalize_action(params).as_str() {
        "update" => Ok(WriteCommand::Update(OrderUpdate {
            order_id: required_order_id(params)?,
            status: optional_field(params, "status"),
            phone: optional_field(params, "phone"),
            address: optional_field(params, "address"),
            pin: optional_field(params, "pin"),
            place: optional_field(params, "place"),
        })),
        "delete" => Ok(WriteCommand::Delete {
            order_id: required_order_id(params)?,
        }),
        _ => Ok(WriteCommand::Create(new_order(params))),
    }
}

fn new_order(params: &RequestParams) -> NewOrder {
    let number = |key: &str| params.get(key).map(parse_number).unwrap_or_default();
    let text = |key: &str| params.get(key).unwrap_or_default().to_string();

    let unit_price = number("unitPrice");
    let quantity = number("quantity");
    let extra_amount = number("extraAmount");
    let total_amount = match params.get_non_empty("totalAmount") {
        Some(raw) => parse_number(raw),
        None => unit_price * quantity + extra_amount,
    };
    let pin_code = params
        .get_non_empty("pin")
        .or_else(|| params.get_non_empty("pinCode"))
        .unwrap_or_default()
        .to_string();

    NewOrder {
        product_id: text("productId"),
        product_title: text("productTitle"),
        unit_price,
        quantity,
        extra_amount,
        total_amount,
        customer_name: text("customerName"),
        phone: text("phone"),
        address: text("address"),
        pin_code,
        place: text("place"),
    }
}

fn required_order_id(params: &RequestParams) -> Result<String, ApiException> {
    params
        .get_non_empty("orderId")
        .map(str::to_string)
        .ok_or_else(|| ApiException::new(ErrorCode::MissingId, "orderId required"))
}

fn optional_field(params: &RequestParams, key: &str) -> Option<String> {
    params.get_non_empty(key).map(str::to_string)
}

fn invalid_action() -> ApiException {
    ApiException::new(ErrorCode::InvalidAction, INVALID_ACTION_MESSAGE)
}

/// Answers a read request. Never fails: errors come back as an error envelope.
pub async fn handle_read(ctx: &ApiContext, params: &RequestParams) -> ReadResponse {
    match read(ctx, params).await {
        Ok(response) => response,
        Err(err) => {
            warn!(code = ?err.code, message = %err.message, "read request failed");
            err.into()
        }
    }
}

async fn read(ctx: &ApiContext, params: &RequestParams) -> Result<ReadResponse, ApiError> {
    let action = parse_read_action(params)?;
    let response = match action {
        ReadAction::Products => {
            ReadResponse::Products(ctx.storage.list_products().await.map_err(store_error)?)
        }
        ReadAction::AllOrders => {
            ReadResponse::Orders(ctx.storage.list_all_orders().await.map_err(store_error)?)
        }
        ReadAction::OrdersByPhone(phone) => ReadResponse::Orders(
            ctx.storage
                .list_orders_by_phone(&phone)
                .await
                .map_err(store_error)?,
        ),
        ReadAction::Ping => ReadResponse::Envelope(Envelope::ok()),
    };
    Ok(response)
}

/// Answers a write request. Never fails: errors come back as an error envelope.
pub async fn handle_write(ctx: &ApiContext, params: &RequestParams) -> Envelope {
    match write(ctx, params).await {
        Ok(envelope) => envelope,
        Err(err) => {
            warn!(code = ?err.code, message = %err.message, "write request failed");
            err.into()
        }
    }
}

async fn write(ctx: &ApiContext, params: &RequestParams) -> Result<Envelope, ApiError> {
    match parse_write_command(params)? {
        WriteCommand::Create(order) => {
            let order_id = ctx
                .storage
                .create_order(&order)
                .await
                .map_err(store_error)?;
            info!(%order_id, product_id = %order.product_id, total = order.total_amount, "order created");
            Ok(Envelope::created(order_id))
        }
        WriteCommand::Update(update) => {
            ctx.storage
                .update_order(&update)
                .await
                .map_err(store_error)?;
            info!(order_id = %update.order_id, "order updated");
            Ok(Envelope::success("Order updated"))
        }
        WriteCommand::Delete { order_id } => {
            ctx.storage
                .delete_order(&order_id)
                .await
                .map_err(store_error)?;
            info!(%order_id, "order deleted");
            Ok(Envelope::success("Order deleted"))
        }
    }
}

fn store_error(err: OrderStoreError) -> ApiError {
    let code = match &err {
        OrderStoreError::MissingId => ErrorCode::MissingId,
        OrderStoreError::NotFound(_) => ErrorCode::NotFound,
        OrderStoreError::Unavailable(_) => ErrorCode::StoreUnavailable,
    };
    ApiError::new(code, err.to_string())
}
