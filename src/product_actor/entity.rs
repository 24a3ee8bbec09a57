use std::collections::BTreeMap;

use chrono::Utc;
use rust_decimal::Decimal;

use super::actions::{ProductAction, ProductActionResult};
use super::error::ProductError;
use crate::actor_framework::Entity;
use crate::domain::{Product, ProductCreate, ProductPatch, StockHold};

fn validate(product: &Product) -> Result<(), ProductError> {
    if product.name.trim().is_empty() {
        return Err(ProductError::ValidationError("name is required".to_string()));
    }
    if product.price < Decimal::ZERO {
        return Err(ProductError::InvalidPrice(product.price));
    }
    Ok(())
}

impl Entity for Product {
    const COLLECTION: &'static str = "products";

    type Id = String;
    type CreateParams = ProductCreate;
    type Patch = ProductPatch;
    type Action = ProductAction;
    type ActionResult = ProductActionResult;
    type Error = ProductError;

    fn from_create_params(id: String, params: ProductCreate) -> Result<Self, ProductError> {
        let product = Self {
            id,
            name: params.name,
            description: params.description,
            price: params.price,
            stock: params.stock,
            category: params.category,
            images: params.images,
            features: params.features,
            holds: BTreeMap::new(),
        };
        validate(&product)?;
        Ok(product)
    }

    fn not_found(id: &String) -> ProductError {
        ProductError::NotFound(id.clone())
    }

    fn already_exists(id: &String) -> ProductError {
        ProductError::AlreadyExists(id.clone())
    }

    /// Applies an admin edit. A stock value replaces the count outright.
    fn on_update(&mut self, patch: ProductPatch) -> Result<(), ProductError> {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
        if let Some(price) = patch.price {
            self.price = price;
        }
        if let Some(stock) = patch.stock {
            self.stock = stock;
        }
        if let Some(category) = patch.category {
            self.category = category;
        }
        if let Some(images) = patch.images {
            self.images = images;
        }
        if let Some(features) = patch.features {
            self.features = features;
        }
        validate(self)
    }

    fn handle_action(&mut self, action: ProductAction) -> Result<ProductActionResult, ProductError> {
        match action {
            #[cfg(test)]
            ProductAction::CheckStock => Ok(ProductActionResult::StockLevel(self.stock)),
            ProductAction::Reserve { order_id, quantity } => {
                if quantity == 0 {
                    return Err(ProductError::InvalidQuantity(quantity));
                }
                if let Some(hold) = self.holds.get(&order_id) {
                    if hold.quantity == quantity {
                        return Ok(ProductActionResult::Reserved { remaining: self.stock });
                    }
                    return Err(ProductError::ValidationError(format!(
                        "order {order_id} already holds {} units of product {}",
                        hold.quantity, self.id
                    )));
                }
                if self.stock < quantity {
                    return Err(ProductError::InsufficientStock {
                        product_id: self.id.clone(),
                        requested: quantity,
                        available: self.stock,
                    });
                }
                self.stock -= quantity;
                self.holds.insert(order_id, StockHold { quantity, reserved_at: Utc::now() });
                Ok(ProductActionResult::Reserved { remaining: self.stock })
            }
            ProductAction::Release { order_id } => {
                let Some(quantity) = self.holds.get(&order_id).map(|hold| hold.quantity) else {
                    return Ok(ProductActionResult::Released { quantity: 0, stock: self.stock });
                };
                let stock = self.stock.checked_add(quantity).ok_or_else(|| {
                    ProductError::ValidationError(format!("stock for product {} would overflow", self.id))
                })?;
                self.holds.remove(&order_id);
                self.stock = stock;
                Ok(ProductActionResult::Released { quantity, stock })
            }
            ProductAction::Commit { order_id } => {
                let quantity = self.holds.remove(&order_id).map_or(0, |hold| hold.quantity);
                Ok(ProductActionResult::Committed { quantity })
            }
        }
    }
}
