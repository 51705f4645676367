//! Aggregates module
pub mod product;
pub mod cart;

pub use product::ProductSnapshot;
pub use cart::{apply, apply_with_events, CartCommand, CartLine, CartState};
