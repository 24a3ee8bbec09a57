use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Units one order holds against a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockHold {
    pub quantity: u32,
    pub reserved_at: DateTime<Utc>,
}

/// A catalog product and its ledger stock count.
///
/// `stock` counts units still for sale; units reserved by orders sit in
/// `holds`, keyed by order id, until the order ships or its reservation is
/// released.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Decimal,
    pub stock: u32,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(skip)]
    pub holds: BTreeMap<String, StockHold>,
}

/// Payload for creating a new product.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductCreate {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Decimal,
    #[serde(default)]
    pub stock: u32,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub features: Vec<String>,
}

/// Admin edit of an existing product. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub stock: Option<u32>,
    pub category: Option<String>,
    pub images: Option<Vec<String>>,
    pub features: Option<Vec<String>>,
}

#[cfg(test)]
impl ProductCreate {
    pub fn new(name: impl Into<String>, price: Decimal, stock: u32) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            price,
            stock,
            category: String::new(),
            images: Vec::new(),
            features: Vec::new(),
        }
    }
}
