use serde_json::json;
use shared::protocol::{NewOrder, OrderUpdate};
use storage::{OrderStoreError, Storage};

#[tokio::test]
async fn order_lifecycle_survives_reopening_the_database() {
    let temp_root = tempfile::tempdir().expect("tempdir");
    let database_url = format!(
        "sqlite://{}",
        temp_root
            .path()
            .join("orders.db")
            .to_string_lossy()
            .replace('\\', "/")
    );

    let storage = Storage::open(&database_url).await.expect("db");
    let order_id = storage
        .create_order(&NewOrder {
            product_id: "P1".into(),
            unit_price: 10.0,
            quantity: 3.0,
            total_amount: 30.0,
            phone: "555-1234".into(),
            ..NewOrder::default()
        })
        .await
        .expect("create");
    drop(storage);

    let storage = Storage::open(&database_url).await.expect("reopen");
    let orders = storage.list_all_orders().await.expect("orders");
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0]["OrderID"], json!(order_id.as_str()));
    assert_eq!(orders[0]["TotalAmount"], json!(30));
    assert_eq!(orders[0]["Status"], "NEW");

    storage
        .update_order(&OrderUpdate {
            order_id: order_id.0.clone(),
            status: Some("CANCELLED".into()),
            ..OrderUpdate::default()
        })
        .await
        .expect("update");
    let mine = storage
        .list_orders_by_phone("555-1234")
        .await
        .expect("by phone");
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0]["Status"], "CANCELLED");

    storage.delete_order(order_id.as_str()).await.expect("delete");
    let err = storage
        .delete_order(order_id.as_str())
        .await
        .expect_err("already deleted");
    assert!(matches!(err, OrderStoreError::NotFound(_)));
    assert!(storage.list_all_orders().await.expect("orders").is_empty());
}
