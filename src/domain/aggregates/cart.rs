//! Cart Aggregate
//!
//! The cart is a deterministic reducer: [`apply`] maps a state and a command to
//! the next state and never fails. Clamps, rejections and lookups of absent
//! lines degrade to no-ops; [`apply_with_events`] reports what actually
//! happened for callers that need to tell the user.

use rust_decimal::Decimal;
use serde::Serialize;
use crate::domain::aggregates::product::ProductSnapshot;
use crate::domain::events::{CartEvent, IgnoreReason};
use crate::domain::value_objects::{LineId, QuantityBounds};
use crate::storage::record::{self, StoredLine};

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub(crate) line_id: LineId,
    pub(crate) product_id: String,
    pub(crate) variant_key: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub(crate) unit_price: Decimal,
    pub(crate) currency: String,
    pub(crate) quantity: u32,
    pub(crate) stock_ceiling: u32,
    pub(crate) min_order_quantity: u32,
    pub(crate) name: String,
    pub(crate) image: Option<String>,
}

impl CartLine {
    fn from_snapshot(product: ProductSnapshot, quantity: u32) -> Self {
        let bounds = product.bounds();
        Self {
            line_id: product.line_id(),
            product_id: product.product_id,
            variant_key: product.variant_key,
            unit_price: product.unit_price,
            currency: product.currency,
            quantity,
            stock_ceiling: bounds.ceiling(),
            min_order_quantity: bounds.floor(),
            name: product.name,
            image: product.image,
        }
    }

    pub fn line_id(&self) -> &LineId { &self.line_id }
    pub fn product_id(&self) -> &str { &self.product_id }
    pub fn variant_key(&self) -> &str { &self.variant_key }
    pub fn unit_price(&self) -> Decimal { self.unit_price }
    pub fn currency(&self) -> &str { &self.currency }
    pub fn quantity(&self) -> u32 { self.quantity }
    pub fn stock_ceiling(&self) -> u32 { self.stock_ceiling }
    pub fn min_order_quantity(&self) -> u32 { self.min_order_quantity }
    pub fn name(&self) -> &str { &self.name }
    pub fn image(&self) -> Option<&str> { self.image.as_deref() }
    pub fn bounds(&self) -> QuantityBounds { QuantityBounds::new(self.min_order_quantity, self.stock_ceiling) }
    pub fn line_total(&self) -> Decimal { self.unit_price.saturating_mul(Decimal::from(self.quantity)) }

    fn is_for(&self, product: &ProductSnapshot) -> bool {
        self.product_id == product.product_id && self.variant_key == product.variant_key
    }

    pub(crate) fn same_item(&self, other: &CartLine) -> bool {
        self.line_id == other.line_id
            || (self.product_id == other.product_id && self.variant_key == other.variant_key)
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct CartState {
    lines: Vec<CartLine>,
    total_quantity: u64,
    total_value: Decimal,
}

impl CartState {
    pub fn new() -> Self { Self::default() }

    /// Totals are always recomputed from the lines, never patched.
    fn from_lines(lines: Vec<CartLine>) -> Self {
        let total_quantity = lines.iter().map(|l| u64::from(l.quantity)).sum();
        let total_value = lines.iter().fold(Decimal::ZERO, |acc, l| acc.saturating_add(l.line_total()));
        Self { lines, total_quantity, total_value }
    }

    pub fn lines(&self) -> &[CartLine] { &self.lines }
    pub fn line(&self, line_id: &LineId) -> Option<&CartLine> { self.lines.iter().find(|l| &l.line_id == line_id) }
    pub fn total_quantity(&self) -> u64 { self.total_quantity }
    pub fn total_value(&self) -> Decimal { self.total_value }
    pub fn item_count(&self) -> usize { self.lines.len() }
    pub fn is_empty(&self) -> bool { self.lines.is_empty() }

    pub fn add_item(&mut self, product: ProductSnapshot, quantity: u32) {
        *self = apply(self, CartCommand::AddItem { product, quantity });
    }

    pub fn remove_item(&mut self, line_id: &LineId) {
        *self = apply(self, CartCommand::RemoveItem { line_id: line_id.clone() });
    }

    pub fn update_quantity(&mut self, line_id: &LineId, quantity: i64) {
        *self = apply(self, CartCommand::UpdateQuantity { line_id: line_id.clone(), quantity });
    }

    pub fn clear(&mut self) { *self = apply(self, CartCommand::ClearCart); }

    pub fn load(&mut self, lines: Vec<StoredLine>) {
        *self = apply(self, CartCommand::LoadCart { lines });
    }
}

/// The closed set of cart mutations.
#[derive(Clone, Debug, PartialEq)]
pub enum CartCommand {
    AddItem { product: ProductSnapshot, quantity: u32 },
    RemoveItem { line_id: LineId },
    UpdateQuantity { line_id: LineId, quantity: i64 },
    ClearCart,
    /// Startup hydration only.
    LoadCart { lines: Vec<StoredLine> },
}

impl CartCommand {
    /// `AddItem` with the default quantity of one.
    pub fn add(product: ProductSnapshot) -> Self { Self::AddItem { product, quantity: 1 } }

    pub fn name(&self) -> &'static str {
        match self {
            Self::AddItem { .. } => "add_item",
            Self::RemoveItem { .. } => "remove_item",
            Self::UpdateQuantity { .. } => "update_quantity",
            Self::ClearCart => "clear_cart",
            Self::LoadCart { .. } => "load_cart",
        }
    }
}

pub fn apply(state: &CartState, command: CartCommand) -> CartState {
    apply_with_events(state, command).0
}

pub fn apply_with_events(state: &CartState, command: CartCommand) -> (CartState, Vec<CartEvent>) {
    let mut lines = state.lines.clone();
    let events = match command {
        CartCommand::AddItem { product, quantity } => add_line(&mut lines, product, quantity),
        CartCommand::RemoveItem { line_id } => remove_line(&mut lines, line_id),
        CartCommand::UpdateQuantity { line_id, quantity } => update_line(&mut lines, line_id, quantity),
        CartCommand::ClearCart => {
            lines.clear();
            vec![CartEvent::CartCleared]
        }
        CartCommand::LoadCart { lines: stored } => {
            let (loaded, dropped) = record::normalize(stored);
            lines = loaded;
            vec![CartEvent::CartLoaded { lines: lines.len(), dropped }]
        }
    };
    (CartState::from_lines(lines), events)
}

fn add_line(lines: &mut Vec<CartLine>, product: ProductSnapshot, requested: u32) -> Vec<CartEvent> {
    if requested == 0 {
        return vec![CartEvent::Ignored { reason: IgnoreReason::ZeroQuantity }];
    }

    // Merge on product+variant: a line loaded with a legacy id still belongs to
    // its product.
    if let Some(line) = lines.iter_mut().find(|l| l.is_for(&product)) {
        let line_id = line.line_id.clone();
        let bounds = line.bounds();
        let wanted = u64::from(line.quantity) + u64::from(requested);
        let next = bounds.clamp_to_ceiling(u32::try_from(wanted).unwrap_or(u32::MAX));
        if next == line.quantity {
            return vec![CartEvent::Ignored { reason: IgnoreReason::AlreadyAtCeiling { line_id } }];
        }
        let accepted = next - line.quantity;
        line.quantity = next;
        let mut events = vec![CartEvent::ItemAdded { line_id: line_id.clone(), requested, accepted }];
        if wanted > u64::from(next) {
            events.push(CartEvent::QuantityClamped { line_id, requested: wanted, ceiling: bounds.ceiling() });
        }
        return events;
    }

    let line_id = product.line_id();
    if lines.iter().any(|l| l.line_id == line_id) {
        return vec![CartEvent::Ignored { reason: IgnoreReason::LineIdTaken { line_id } }];
    }
    let bounds = product.bounds();
    let Some(quantity) = bounds.initial(requested) else {
        return vec![CartEvent::Ignored { reason: IgnoreReason::OutOfStock { line_id } }];
    };
    lines.push(CartLine::from_snapshot(product, quantity));
    let mut events = vec![CartEvent::ItemAdded { line_id: line_id.clone(), requested, accepted: quantity }];
    let wanted = requested.max(bounds.floor());
    if wanted > quantity {
        events.push(CartEvent::QuantityClamped { line_id, requested: u64::from(wanted), ceiling: bounds.ceiling() });
    }
    events
}

fn remove_line(lines: &mut Vec<CartLine>, line_id: LineId) -> Vec<CartEvent> {
    let before = lines.len();
    lines.retain(|l| l.line_id != line_id);
    if lines.len() == before {
        return vec![CartEvent::Ignored { reason: IgnoreReason::LineNotFound { line_id } }];
    }
    vec![CartEvent::ItemRemoved { line_id }]
}

fn update_line(lines: &mut Vec<CartLine>, line_id: LineId, target: i64) -> Vec<CartEvent> {
    let Some(index) = lines.iter().position(|l| l.line_id == line_id) else {
        return vec![CartEvent::Ignored { reason: IgnoreReason::LineNotFound { line_id } }];
    };
    if target <= 0 {
        lines.remove(index);
        return vec![CartEvent::ItemRemoved { line_id }];
    }

    let line = &mut lines[index];
    let bounds = line.bounds();
    if target < i64::from(bounds.floor()) {
        return vec![CartEvent::QuantityRejected { line_id, requested: target, floor: bounds.floor() }];
    }

    let requested = u32::try_from(target).unwrap_or(u32::MAX);
    let next = bounds.clamp_to_ceiling(requested);
    let mut events = Vec::new();
    if next != line.quantity {
        events.push(CartEvent::QuantityChanged { line_id: line_id.clone(), from: line.quantity, to: next });
        line.quantity = next;
    }
    if target > i64::from(next) {
        events.push(CartEvent::QuantityClamped { line_id, requested: target.unsigned_abs(), ceiling: bounds.ceiling() });
    }
    events
}
