use rust_decimal::Decimal;
use thiserror::Error;

use crate::actor_framework::StorageError;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ProductError {
    #[error("Product not found: {0}")]
    NotFound(String),
    #[error("Product already exists: {0}")]
    AlreadyExists(String),
    #[error("Insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: String,
        requested: u32,
        available: u32,
    },
    #[error("Invalid quantity: {0}")]
    InvalidQuantity(u32),
    #[error("Invalid price: {0}")]
    InvalidPrice(Decimal),
    #[error("Product validation error: {0}")]
    ValidationError(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
}
