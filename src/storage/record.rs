//! Persisted cart layout and its one-time normalization.
//!
//! The whole cart is stored under a single key as a JSON array of lines in
//! camelCase. Older clients wrote lines without a `lineId`; those are backfilled
//! here and nowhere else.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use crate::domain::aggregates::CartLine;
use crate::domain::value_objects::{LineId, QuantityBounds};
use crate::{CartError, Result};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredLine {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_id: Option<LineId>,
    pub product_id: String,
    #[serde(default)]
    pub variant_key: String,
    pub quantity: u32,
    #[serde(with = "rust_decimal::serde::float")]
    pub unit_price: Decimal,
    pub currency: String,
    pub stock_ceiling: u32,
    #[serde(default)]
    pub min_order_quantity: Option<u32>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub image: Option<String>,
}

impl From<&CartLine> for StoredLine {
    fn from(line: &CartLine) -> Self {
        Self {
            line_id: Some(line.line_id.clone()),
            product_id: line.product_id.clone(),
            variant_key: line.variant_key.clone(),
            quantity: line.quantity,
            unit_price: line.unit_price,
            currency: line.currency.clone(),
            stock_ceiling: line.stock_ceiling,
            min_order_quantity: Some(line.min_order_quantity),
            name: line.name.clone(),
            image: line.image.clone(),
        }
    }
}

impl StoredLine {
    /// Rebuild a cart line, or `None` if the record cannot satisfy the
    /// quantity window. Quantities above stock are clamped like any add.
    fn into_line(self) -> Option<CartLine> {
        let line_id = self.line_id
            .filter(|id| !id.as_str().is_empty())
            .unwrap_or_else(|| LineId::derive(&self.product_id, &self.variant_key));
        let bounds = QuantityBounds::new(self.min_order_quantity.unwrap_or(1), self.stock_ceiling);
        let quantity = bounds.clamp_to_ceiling(self.quantity);
        if !bounds.contains(quantity) {
            return None;
        }
        Some(CartLine {
            line_id,
            product_id: self.product_id,
            variant_key: self.variant_key,
            unit_price: self.unit_price,
            currency: self.currency,
            quantity,
            stock_ceiling: bounds.ceiling(),
            min_order_quantity: bounds.floor(),
            name: self.name,
            image: self.image,
        })
    }
}

/// Turn persisted records into valid cart lines. Returns the lines and how many
/// records were dropped. A record repeating an earlier line id, or an earlier
/// product+variant, is a duplicate and the first occurrence wins.
pub fn normalize(records: Vec<StoredLine>) -> (Vec<CartLine>, usize) {
    let mut lines: Vec<CartLine> = Vec::with_capacity(records.len());
    let mut dropped = 0;
    for record in records {
        match record.into_line() {
            Some(line) if !lines.iter().any(|l| l.same_item(&line)) => lines.push(line),
            _ => dropped += 1,
        }
    }
    (lines, dropped)
}

pub fn encode_lines(lines: &[CartLine]) -> Result<String> {
    let records: Vec<StoredLine> = lines.iter().map(StoredLine::from).collect();
    Ok(serde_json::to_string(&records)?)
}

/// `null` decodes to an empty cart; anything else that is not an array of lines
/// is [`CartError::CorruptState`].
pub fn decode_lines(raw: &str) -> Result<Vec<StoredLine>> {
    let records: Option<Vec<StoredLine>> = serde_json::from_str(raw)
        .map_err(|e| CartError::CorruptState(e.to_string()))?;
    Ok(records.unwrap_or_default())
}
