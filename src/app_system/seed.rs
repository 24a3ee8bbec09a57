use std::path::Path;

use anyhow::Context;
use serde::Deserialize;
use tracing::{info, instrument};

use crate::clients::ProductClient;
use crate::domain::ProductCreate;

/// A catalog entry with the id it is stored under.
#[derive(Debug, Deserialize)]
pub struct SeedProduct {
    pub id: String,
    #[serde(flatten)]
    pub product: ProductCreate,
}

pub fn parse_catalog(json: &str) -> anyhow::Result<Vec<SeedProduct>> {
    serde_json::from_str(json).context("catalog must be a JSON array of products")
}

/// Loads the products in `path` into the ledger under their own ids.
#[instrument(skip(products))]
pub async fn seed_catalog(products: &ProductClient, path: &Path) -> anyhow::Result<usize> {
    let json = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading catalog {}", path.display()))?;
    let count = insert_all(products, parse_catalog(&json)?).await?;
    info!(count, "Catalog seeded");
    Ok(count)
}

pub async fn insert_all(products: &ProductClient, entries: Vec<SeedProduct>) -> anyhow::Result<usize> {
    let count = entries.len();
    for entry in entries {
        products
            .insert_product(entry.id.clone(), entry.product)
            .await
            .with_context(|| format!("seeding product {}", entry.id))?;
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;
    use crate::actor_framework::ResourceActor;
    use crate::domain::Product;

    const CATALOG: &str = r#"[
        {"id": "1", "name": "Wireless Headphones", "price": "199.99", "stock": 10, "category": "Audio"},
        {"id": "2", "name": "Smart Watch", "price": "149.50", "stock": 3, "features": ["GPS", "Heart rate"]}
    ]"#;

    #[tokio::test]
    async fn seeds_products_under_their_ids() {
        let (actor, inner) = ResourceActor::<Product>::new(16, || "generated".to_string());
        tokio::spawn(actor.run());
        let products = ProductClient::new(inner);

        let count = insert_all(&products, parse_catalog(CATALOG).unwrap()).await.unwrap();
        assert_eq!(count, 2);

        let headphones = products.get_product("1".into()).await.unwrap().unwrap();
        assert_eq!(headphones.price, Decimal::new(19999, 2));
        assert_eq!(headphones.stock, 10);
        let watch = products.get_product("2".into()).await.unwrap().unwrap();
        assert_eq!(watch.features, vec!["GPS".to_string(), "Heart rate".to_string()]);

        // Seeding twice hits the existing ids.
        assert!(insert_all(&products, parse_catalog(CATALOG).unwrap()).await.is_err());
    }

    #[test]
    fn rejects_malformed_catalog() {
        assert!(parse_catalog(r#"{"id": "1"}"#).is_err());
        assert!(parse_catalog(r#"[{"id": "1", "name": "No price"}]"#).is_err());
    }
}
