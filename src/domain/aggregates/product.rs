//! Product snapshot handed over by the catalog when an item is added.
//!
//! The cart never fetches or revalidates products itself. Price, stock and
//! minimum order quantity are frozen into the line at the moment it is created.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};
use crate::domain::value_objects::{LineId, QuantityBounds};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ProductSnapshot {
    #[validate(length(min = 1, max = 128))]
    pub product_id: String,
    #[serde(default)]
    #[validate(length(max = 64))]
    pub variant_key: String,
    #[serde(with = "rust_decimal::serde::float")]
    #[validate(custom = "non_negative_price")]
    pub unit_price: Decimal,
    #[validate(length(equal = 3))]
    pub currency: String,
    pub stock_ceiling: u32,
    #[serde(default)]
    pub min_order_quantity: Option<u32>,
    #[validate(length(min = 1))]
    pub name: String,
    #[serde(default)]
    pub image: Option<String>,
}

impl ProductSnapshot {
    pub fn new(product_id: impl Into<String>, name: impl Into<String>, unit_price: Decimal, currency: &str, stock_ceiling: u32) -> Self {
        Self {
            product_id: product_id.into(), variant_key: String::new(), unit_price,
            currency: currency.to_string(), stock_ceiling, min_order_quantity: None,
            name: name.into(), image: None,
        }
    }

    pub fn with_variant(mut self, variant_key: impl Into<String>) -> Self { self.variant_key = variant_key.into(); self }
    pub fn with_min_order_quantity(mut self, quantity: u32) -> Self { self.min_order_quantity = Some(quantity); self }
    pub fn with_image(mut self, image: impl Into<String>) -> Self { self.image = Some(image.into()); self }

    pub fn line_id(&self) -> LineId { LineId::derive(&self.product_id, &self.variant_key) }

    pub fn bounds(&self) -> QuantityBounds {
        QuantityBounds::new(self.min_order_quantity.unwrap_or(1), self.stock_ceiling)
    }
}

fn non_negative_price(price: &Decimal) -> Result<(), ValidationError> {
    if price.is_sign_negative() && !price.is_zero() {
        return Err(ValidationError::new("negative_price"));
    }
    Ok(())
}
