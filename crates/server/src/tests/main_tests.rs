use super::*;
use axum::{body, body::Body, http::Request};
use serde_json::json;
use storage::{Cell, MemoryTableStore, Row, TableStore};
use tower::ServiceExt;

fn test_app() -> (Router, MemoryTableStore) {
    let tables = MemoryTableStore::new();
    let storage = Storage::new(Arc::new(tables.clone()));
    let app = build_router(Arc::new(AppState {
        api: ApiContext { storage },
    }));
    (app, tables)
}

async fn json_body(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json")
}

async fn get_json(app: &Router, uri: &str) -> Value {
    let request = Request::get(uri).body(Body::empty()).expect("request");
    let response = app.clone().oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).expect("content type"),
        "application/json"
    );
    json_body(response).await
}

async fn post_form(app: &Router, form: &str) -> Value {
    let request = Request::post("/")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(form.to_string()))
        .expect("request");
    let response = app.clone().oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    json_body(response).await
}

#[tokio::test]
async fn healthz_reports_ok_when_storage_is_ready() {
    let (app, _) = test_app();
    let request = Request::get("/healthz")
        .body(Body::empty())
        .expect("request");
    let response = app.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let body = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    assert_eq!(body.as_ref(), b"ok");
}

struct UnhealthyStore;

#[async_trait::async_trait]
impl TableStore for UnhealthyStore {
    async fn table_exists(&self, _table: &str) -> anyhow::Result<bool> {
        Ok(false)
    }

    async fn create_table(&self, _table: &str, _header: Row) -> anyhow::Result<()> {
        anyhow::bail!("disk offline")
    }

    async fn read_rows(&self, _table: &str) -> anyhow::Result<Option<Vec<Row>>> {
        Ok(None)
    }

    async fn append_row(&self, _table: &str, _row: Row) -> anyhow::Result<()> {
        anyhow::bail!("disk offline")
    }

    async fn update_cell(
        &self,
        _table: &str,
        _row: usize,
        _column: usize,
        _value: Cell,
    ) -> anyhow::Result<()> {
        anyhow::bail!("disk offline")
    }

    async fn delete_row(&self, _table: &str, _row: usize) -> anyhow::Result<()> {
        anyhow::bail!("disk offline")
    }

    async fn health_check(&self) -> anyhow::Result<()> {
        anyhow::bail!("disk offline")
    }
}

#[tokio::test]
async fn healthz_reports_unavailable_store() {
    let app = build_router(Arc::new(AppState {
        api: ApiContext {
            storage: Storage::new(Arc::new(UnhealthyStore)),
        },
    }));
    let request = Request::get("/healthz")
        .body(Body::empty())
        .expect("request");
    let response = app.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let body = json_body(response).await;
    assert_eq!(body["status"], "error");
    assert!(body["message"]
        .as_str()
        .expect("message")
        .contains("disk offline"));
}

#[tokio::test]
async fn oversized_body_gets_error_envelope() {
    let (app, _) = test_app();
    let form = format!("productId=P1&address={}", "x".repeat(MAX_BODY_BYTES));
    let request = Request::post("/")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .header(header::CONTENT_LENGTH, form.len())
        .body(Body::from(form))
        .expect("request");
    let response = app.clone().oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(
        json_body(response).await,
        json!({ "status": "error", "message": "Request body too large" })
    );
    assert_eq!(get_json(&app, "/?action=getallorders").await, json!([]));
}

#[tokio::test]
async fn ping_and_unknown_actions() {
    let (app, _) = test_app();
    assert_eq!(get_json(&app, "/?action=ping").await, json!({ "status": "ok" }));
    assert_eq!(get_json(&app, "/exec?action=%20PING%20").await, json!({ "status": "ok" }));

    let invalid = get_json(&app, "/").await;
    assert_eq!(invalid["status"], "error");
    assert!(invalid["message"]
        .as_str()
        .expect("message")
        .starts_with("Invalid action"));

    let missing_phone = get_json(&app, "/?action=getOrders").await;
    assert_eq!(missing_phone["status"], "error");
}

#[tokio::test]
async fn products_listing_is_a_bare_array() {
    let (app, tables) = test_app();
    assert_eq!(get_json(&app, "/?action=products").await, json!([]));

    tables
        .create_table(
            "Products",
            vec![json!("ID"), json!("Title"), json!("Description"), json!("Price"), json!("Image Url")],
        )
        .await
        .expect("table");
    tables
        .append_row(
            "Products",
            vec![json!("P1"), json!("Clay pot"), json!(""), json!(""), json!("https://img/pot.png")],
        )
        .await
        .expect("row");

    let products = get_json(&app, "/?action=products").await;
    assert_eq!(
        products,
        json!([{
            "id": "P1",
            "title": "Clay pot",
            "description": "",
            "price": 0.0,
            "imageUrl": "https://img/pot.png"
        }])
    );
}

#[tokio::test]
async fn form_order_flow_end_to_end() {
    let (app, _) = test_app();

    let created = post_form(
        &app,
        "productId=P1&productTitle=Clay+pot&unitPrice=10&quantity=3&customerName=Asha&phone=555-1234&pinCode=560001",
    )
    .await;
    assert_eq!(created["status"], "success");
    let order_id = created["orderId"].as_str().expect("order id").to_string();

    let all = get_json(&app, "/?action=getAllOrders").await;
    let rows = all.as_array().expect("array");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["OrderID"], order_id.as_str());
    assert_eq!(rows[0]["TotalAmount"], 30);
    assert_eq!(rows[0]["Status"], "NEW");
    assert_eq!(rows[0]["PinCode"], "560001");

    let mine = get_json(&app, "/?action=getOrders&phone=%20555-1234%20").await;
    assert_eq!(mine.as_array().expect("array").len(), 1);

    let updated = post_form(
        &app,
        &format!("action=update&orderId={order_id}&status=SHIPPED&address="),
    )
    .await;
    assert_eq!(updated, json!({ "status": "success", "message": "Order updated" }));

    let all = get_json(&app, "/?action=getallorders").await;
    assert_eq!(all[0]["Status"], "SHIPPED");
    assert_eq!(all[0]["Address"], "");

    let deleted = post_form(&app, &format!("action=delete&orderId={order_id}")).await;
    assert_eq!(deleted, json!({ "status": "success", "message": "Order deleted" }));
    assert_eq!(get_json(&app, "/?action=getallorders").await, json!([]));
}

#[tokio::test]
async fn write_errors_stay_in_the_envelope() {
    let (app, _) = test_app();

    let missing_id = post_form(&app, "action=update&status=SHIPPED").await;
    assert_eq!(missing_id, json!({ "status": "error", "message": "orderId required" }));

    let no_table = post_form(&app, "action=delete&orderId=nope").await;
    assert_eq!(no_table["status"], "error");

    post_form(&app, "productId=P1").await;
    let not_found = post_form(&app, "action=delete&orderId=nope").await;
    assert_eq!(not_found, json!({ "status": "error", "message": "Order not found" }));
    assert_eq!(
        get_json(&app, "/?action=getallorders")
            .await
            .as_array()
            .expect("array")
            .len(),
        1
    );
}

#[tokio::test]
async fn json_bodies_and_query_params_are_accepted() {
    let (app, _) = test_app();
    let request = Request::post("/exec?action=create")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({ "productId": "P2", "unitPrice": 2.5, "quantity": 4, "extraAmount": "1" })
                .to_string(),
        ))
        .expect("request");
    let response = app.clone().oneshot(request).await.expect("response");
    let created = json_body(response).await;
    assert_eq!(created["status"], "success");

    let all = get_json(&app, "/?action=getallorders").await;
    assert_eq!(all[0]["ProductID"], "P2");
    assert_eq!(all[0]["TotalAmount"], 11);
}

#[test]
fn malformed_json_body_yields_no_params() {
    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, "application/json".parse().expect("header"));
    assert!(body_params(&headers, b"{oops").is_empty());
}

#[test]
fn repeated_form_keys_keep_first_value() {
    let pairs = body_params(&HeaderMap::new(), b"phone=1&phone=2");
    let params = RequestParams::from_pairs(pairs);
    assert_eq!(params.get("phone"), Some("1"));
}
