//! Storefront Cart
//!
//! Client-side shopping cart engine for the storefront.
//!
//! ## Features
//! - Pure cart reducer: add, remove, update quantity, clear, load
//! - Stock ceilings (clamped) and minimum order quantities (enforced)
//! - Derived totals, recomputed on every transition
//! - Persistence to a single key-value entry, gated on hydration
//! - Per-session HTTP cart API

pub mod api;
pub mod config;
pub mod domain;
pub mod session;
pub mod storage;

pub use config::Config;
pub use domain::aggregates::{apply, apply_with_events, CartCommand, CartLine, CartState, ProductSnapshot};
pub use domain::events::{CartEvent, IgnoreReason};
pub use domain::value_objects::{LineId, QuantityBounds};
pub use session::{CartSession, RegistryConfig, SessionRegistry};
pub use storage::{FileStore, KeyValueStore, MemoryStore};

use thiserror::Error;

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum CartError {
    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Corrupt cart state: {0}")]
    CorruptState(String),

    #[error("Cart session not found: {0}")]
    SessionNotFound(String),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, CartError>;
