//! Domain events
use crate::domain::value_objects::LineId;
use serde::Serialize;

/// What a command did to the cart.
///
/// The reducer stays silent about clamps and rejections; these events are how a
/// caller finds out that an add was only partially fulfilled.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum CartEvent {
    #[serde(rename_all = "camelCase")]
    ItemAdded { line_id: LineId, requested: u32, accepted: u32 },
    #[serde(rename_all = "camelCase")]
    QuantityChanged { line_id: LineId, from: u32, to: u32 },
    #[serde(rename_all = "camelCase")]
    QuantityClamped { line_id: LineId, requested: u64, ceiling: u32 },
    #[serde(rename_all = "camelCase")]
    QuantityRejected { line_id: LineId, requested: i64, floor: u32 },
    #[serde(rename_all = "camelCase")]
    ItemRemoved { line_id: LineId },
    CartCleared,
    #[serde(rename_all = "camelCase")]
    CartLoaded { lines: usize, dropped: usize },
    #[serde(rename_all = "camelCase")]
    Ignored { reason: IgnoreReason },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum IgnoreReason {
    #[serde(rename_all = "camelCase")]
    LineNotFound { line_id: LineId },
    ZeroQuantity,
    #[serde(rename_all = "camelCase")]
    OutOfStock { line_id: LineId },
    #[serde(rename_all = "camelCase")]
    AlreadyAtCeiling { line_id: LineId },
    /// A stored line of another product already uses this id.
    #[serde(rename_all = "camelCase")]
    LineIdTaken { line_id: LineId },
}

impl CartEvent {
    /// Whether this event leaves the cart as it was.
    pub fn is_noop(&self) -> bool {
        matches!(self, Self::Ignored { .. } | Self::QuantityRejected { .. })
    }
}
