use std::path::Path;

use anyhow::Context;
use serde::Deserialize;
use serde_json::Value;
use storage::{schema::PRODUCTS, table::number_cell, Storage};
use tracing::info;

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SeedProduct {
    id: String,
    title: String,
    description: String,
    price: f64,
    image_url: String,
}

/// Creates the products table from a JSON array when it does not exist yet.
/// Returns how many products were written.
pub async fn seed_products(storage: &Storage, path: &Path) -> anyhow::Result<usize> {
    let table = storage.products_table();
    if storage.tables().table_exists(table).await? {
        info!(table, "products table already present, skipping seed");
        return Ok(0);
    }

    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read product seed '{}'", path.display()))?;
    let products: Vec<SeedProduct> = serde_json::from_str(&raw)
        .with_context(|| format!("invalid product seed '{}'", path.display()))?;

    storage
        .tables()
        .create_table(table, PRODUCTS.header())
        .await?;
    for product in &products {
        let row = vec![
            Value::from(product.id.as_str()),
            Value::from(product.title.as_str()),
            Value::from(product.description.as_str()),
            number_cell(product.price),
            Value::from(product.image_url.as_str()),
        ];
        storage.tables().append_row(table, row).await?;
    }
    info!(table, count = products.len(), "seeded products");
    Ok(products.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use storage::MemoryTableStore;

    #[tokio::test]
    async fn seeds_missing_table_once() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("products.json");
        std::fs::write(
            &path,
            r#"[{"id":"P1","title":"Clay pot","price":249.5,"imageUrl":"https://img/pot.png"},
                {"id":"P2","title":"Lid"}]"#,
        )
        .expect("write seed");

        let storage = Storage::new(Arc::new(MemoryTableStore::new()));
        assert_eq!(seed_products(&storage, &path).await.expect("seed"), 2);
        assert_eq!(seed_products(&storage, &path).await.expect("reseed"), 0);

        let products = storage.list_products().await.expect("products");
        assert_eq!(products.len(), 2);
        assert_eq!(products[0].price, 249.5);
        assert_eq!(products[0].image_url, "https://img/pot.png");
        assert_eq!(products[1].price, 0.0);
        assert_eq!(products[1].description, "");
    }

    #[tokio::test]
    async fn rejects_malformed_seed() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("products.json");
        std::fs::write(&path, "{not json").expect("write seed");

        let storage = Storage::new(Arc::new(MemoryTableStore::new()));
        assert!(seed_products(&storage, &path).await.is_err());
        assert!(!storage
            .tables()
            .table_exists(storage.products_table())
            .await
            .expect("exists"));
    }
}
