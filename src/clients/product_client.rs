use chrono::{DateTime, Utc};
use tracing::{debug, instrument, warn};

use crate::actor_framework::{Filter, ResourceClient};
use crate::domain::{Product, ProductCreate, ProductPatch};
use crate::product_actor::{ProductAction, ProductActionResult, ProductError};

/// Inventory ledger client.
///
/// `reserve` is a single conditional decrement evaluated inside the products
/// actor; concurrent reservations against one product are serialized there and
/// can never drive stock below zero.
#[derive(Clone)]
pub struct ProductClient {
    inner: ResourceClient<Product>,
}

impl_basic_client!(ProductClient, Product, ProductError, get = get_product);

fn unexpected(result: ProductActionResult) -> ProductError {
    ProductError::ValidationError(format!("Unexpected action result: {result:?}"))
}

impl ProductClient {
    #[instrument(skip(self, product), fields(product_name = %product.name))]
    pub async fn create_product(&self, product: ProductCreate) -> Result<String, ProductError> {
        debug!("Sending request");
        self.inner.create(product).await
    }

    /// Inserts a product under a caller-chosen id (catalog seeding).
    #[instrument(skip(self, product))]
    pub async fn insert_product(&self, id: String, product: ProductCreate) -> Result<String, ProductError> {
        debug!("Sending request");
        self.inner.insert(id, product).await
    }

    #[instrument(skip(self))]
    pub async fn update_product(&self, id: String, patch: ProductPatch) -> Result<Product, ProductError> {
        debug!("Sending request");
        self.inner.update(id, patch).await
    }

    #[instrument(skip(self))]
    pub async fn list_products(&self) -> Result<Vec<Product>, ProductError> {
        debug!("Sending request");
        let mut products = self.inner.query(Filter::all()).await?;
        products.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(products)
    }

    #[cfg(test)]
    pub async fn check_stock(&self, id: String) -> Result<u32, ProductError> {
        match self.inner.perform_action(id, ProductAction::CheckStock).await? {
            ProductActionResult::StockLevel(level) => Ok(level),
            other => Err(unexpected(other)),
        }
    }

    /// Atomically moves `quantity` units into a hold for `order_id`, returning
    /// the stock left for sale.
    #[instrument(skip(self))]
    pub async fn reserve(&self, id: String, order_id: String, quantity: u32) -> Result<u32, ProductError> {
        debug!("Sending request");
        match self.inner.perform_action(id, ProductAction::Reserve { order_id, quantity }).await? {
            ProductActionResult::Reserved { remaining } => Ok(remaining),
            other => Err(unexpected(other)),
        }
    }

    /// Returns the units held for `order_id` to stock. Returns how many units
    /// went back, zero if the order held none.
    #[instrument(skip(self))]
    pub async fn release(&self, id: String, order_id: String) -> Result<u32, ProductError> {
        debug!("Sending request");
        match self.inner.perform_action(id, ProductAction::Release { order_id }).await {
            Ok(ProductActionResult::Released { quantity, .. }) => Ok(quantity),
            Ok(other) => Err(unexpected(other)),
            Err(e) => {
                warn!(error = %e, "Stock release failed");
                Err(e)
            }
        }
    }

    /// Drops the hold for `order_id` without restocking.
    #[instrument(skip(self))]
    pub async fn commit(&self, id: String, order_id: String) -> Result<u32, ProductError> {
        debug!("Sending request");
        match self.inner.perform_action(id, ProductAction::Commit { order_id }).await? {
            ProductActionResult::Committed { quantity } => Ok(quantity),
            other => Err(unexpected(other)),
        }
    }

    /// Every hold placed before `cutoff`, as `(product_id, order_id)` pairs.
    #[instrument(skip(self))]
    pub async fn find_holds_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<(String, String)>, ProductError> {
        debug!("Sending request");
        let products = self
            .inner
            .query(Filter::new(move |product: &Product| {
                product.holds.values().any(|hold| hold.reserved_at < cutoff)
            }))
            .await?;
        Ok(products
            .into_iter()
            .flat_map(|product| {
                let product_id = product.id;
                product
                    .holds
                    .into_iter()
                    .filter(|(_, hold)| hold.reserved_at < cutoff)
                    .map(move |(order_id, _)| (product_id.clone(), order_id))
            })
            .collect())
    }
}
