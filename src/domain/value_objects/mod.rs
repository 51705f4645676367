//! Value Objects for the cart engine

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

const SEPARATOR: char = '~';

/// Identity of a cart line: the product id, suffixed with `~` and the variant
/// key when the product has one.
///
/// `%` and `~` inside either part are percent-escaped, so the separator only
/// ever appears between the parts and distinct product+variant pairs never
/// share an id.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LineId(String);

impl LineId {
    pub fn derive(product_id: &str, variant_key: &str) -> Self {
        let product = escape(product_id);
        if variant_key.is_empty() {
            Self(product.into_owned())
        } else {
            Self(format!("{product}{SEPARATOR}{}", escape(variant_key)))
        }
    }
    pub fn as_str(&self) -> &str { &self.0 }
}

fn escape(part: &str) -> Cow<'_, str> {
    if part.contains(['%', SEPARATOR]) {
        Cow::Owned(part.replace('%', "%25").replace(SEPARATOR, "%7E"))
    } else {
        Cow::Borrowed(part)
    }
}

impl From<&str> for LineId {
    fn from(value: &str) -> Self { Self(value.to_string()) }
}

impl From<String> for LineId {
    fn from(value: String) -> Self { Self(value) }
}

impl fmt::Display for LineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

/// Quantity window a line must stay inside: `floor ..= ceiling`.
///
/// The ceiling clamps, the floor rejects.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QuantityBounds {
    floor: u32,
    ceiling: u32,
}

impl QuantityBounds {
    /// A floor of 0 is treated as unspecified and becomes 1.
    pub fn new(floor: u32, ceiling: u32) -> Self {
        Self { floor: floor.max(1), ceiling }
    }
    pub fn floor(&self) -> u32 { self.floor }
    pub fn ceiling(&self) -> u32 { self.ceiling }

    /// False when stock can never satisfy the floor, e.g. sold out.
    pub fn is_satisfiable(&self) -> bool { self.floor <= self.ceiling }

    pub fn contains(&self, quantity: u32) -> bool {
        quantity >= self.floor && quantity <= self.ceiling
    }

    pub fn clamp_to_ceiling(&self, quantity: u32) -> u32 { quantity.min(self.ceiling) }

    /// Quantity for a freshly inserted line. `None` if nothing can be sold.
    pub fn initial(&self, requested: u32) -> Option<u32> {
        if requested == 0 || !self.is_satisfiable() { return None; }
        Some(requested.max(self.floor).min(self.ceiling))
    }
}
