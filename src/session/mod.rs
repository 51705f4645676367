//! Cart session: the layer that owns one cart and keeps it in storage.
//!
//! The reducer is pure; this is where its side effects live. Persistence runs
//! as a post-commit hook after every state change, but only once the one-time
//! hydration read has finished. Commands that arrive earlier are queued and
//! replayed on top of the hydrated cart instead of being overwritten by it.

pub mod registry;

use std::collections::VecDeque;
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use crate::domain::aggregates::{apply_with_events, CartCommand, CartState, ProductSnapshot};
use crate::domain::events::CartEvent;
use crate::domain::value_objects::LineId;
use crate::storage::{record, KeyValueStore};

pub use registry::{RegistryConfig, SessionRegistry};

pub const DEFAULT_STORAGE_KEY: &str = "cart";

#[derive(Debug)]
pub struct CartSession<S> {
    store: S,
    key: String,
    state: CartState,
    hydrated: bool,
    pending: VecDeque<CartCommand>,
    updated_at: DateTime<Utc>,
}

impl<S: KeyValueStore> CartSession<S> {
    pub fn new(store: S, key: impl Into<String>) -> Self {
        Self {
            store, key: key.into(), state: CartState::default(), hydrated: false,
            pending: VecDeque::new(), updated_at: Utc::now(),
        }
    }

    pub fn state(&self) -> &CartState { &self.state }
    pub fn is_hydrated(&self) -> bool { self.hydrated }
    pub fn pending(&self) -> usize { self.pending.len() }
    pub fn updated_at(&self) -> DateTime<Utc> { self.updated_at }
    pub fn store(&self) -> &S { &self.store }

    /// Load the persisted cart once. Corrupt data is discarded and the cart
    /// starts empty. Later calls do nothing.
    ///
    /// If the store cannot be read at all the session stays unhydrated: commands
    /// keep queueing, nothing is written over the unread entry, and the next
    /// call tries again.
    pub fn hydrate(&mut self) -> &CartState {
        if self.hydrated {
            return &self.state;
        }

        let mut repaired = false;
        let stored = match self.store.get(&self.key) {
            Ok(Some(raw)) => match record::decode_lines(&raw) {
                Ok(lines) => lines,
                Err(e) => {
                    warn!(key = %self.key, error = %e, "discarding corrupt persisted cart");
                    repaired = true;
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!(key = %self.key, error = %e, queued = self.pending.len(), "failed to read persisted cart, hydration deferred");
                return &self.state;
            }
        };

        let (events, _) = self.commit(CartCommand::LoadCart { lines: stored });
        if let Some(CartEvent::CartLoaded { lines, dropped }) = events.first() {
            info!(key = %self.key, lines, dropped, "cart hydrated");
            repaired |= *dropped > 0;
        }
        self.hydrated = true;

        let queued = self.pending.len();
        while let Some(command) = self.pending.pop_front() {
            self.commit(command);
        }
        if queued > 0 || repaired {
            debug!(key = %self.key, queued, "replayed commands issued before hydration");
            self.persist();
        }
        &self.state
    }

    /// Apply a command. Before hydration the command is queued and no events
    /// are returned.
    pub fn dispatch(&mut self, command: CartCommand) -> Vec<CartEvent> {
        if !self.hydrated {
            debug!(key = %self.key, command = command.name(), "queueing command until hydration completes");
            self.pending.push_back(command);
            return Vec::new();
        }
        let (events, changed) = self.commit(command);
        if changed {
            self.persist();
        }
        events
    }

    pub fn add_item(&mut self, product: ProductSnapshot, quantity: u32) -> Vec<CartEvent> {
        self.dispatch(CartCommand::AddItem { product, quantity })
    }

    pub fn remove_item(&mut self, line_id: &LineId) -> Vec<CartEvent> {
        self.dispatch(CartCommand::RemoveItem { line_id: line_id.clone() })
    }

    pub fn update_quantity(&mut self, line_id: &LineId, quantity: i64) -> Vec<CartEvent> {
        self.dispatch(CartCommand::UpdateQuantity { line_id: line_id.clone(), quantity })
    }

    pub fn clear(&mut self) -> Vec<CartEvent> { self.dispatch(CartCommand::ClearCart) }

    /// Called by the checkout flow once the order has been placed.
    pub fn complete_checkout(&mut self) -> Vec<CartEvent> {
        info!(key = %self.key, lines = self.state.item_count(), "checkout completed, clearing cart");
        self.clear()
    }

    fn commit(&mut self, command: CartCommand) -> (Vec<CartEvent>, bool) {
        let name = command.name();
        let (next, events) = apply_with_events(&self.state, command);
        debug!(key = %self.key, command = name, events = ?events, "cart command applied");
        let changed = next != self.state;
        if changed {
            self.state = next;
            self.updated_at = Utc::now();
        }
        (events, changed)
    }

    /// Best effort: failures are logged and the in-memory cart stays
    /// authoritative.
    fn persist(&mut self) {
        let result = record::encode_lines(self.state.lines())
            .and_then(|raw| self.store.set(&self.key, &raw));
        if let Err(e) = result {
            warn!(key = %self.key, error = %e, "failed to persist cart");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use crate::CartError;
    use rust_decimal::Decimal;
    use std::cell::Cell;

    fn knife() -> ProductSnapshot {
        ProductSnapshot::new("KN-1", "Hunting Knife", Decimal::new(80, 0), "USD", 5)
    }

    struct FailingStore;

    impl KeyValueStore for FailingStore {
        fn get(&self, _key: &str) -> crate::Result<Option<String>> { Ok(None) }
        fn set(&mut self, _key: &str, _value: &str) -> crate::Result<()> {
            Err(CartError::Storage(std::io::Error::new(std::io::ErrorKind::Other, "quota exceeded")))
        }
        fn remove(&mut self, _key: &str) -> crate::Result<()> { Ok(()) }
    }

    /// Fails the first `failures` reads, then behaves like the wrapped store.
    struct FlakyStore {
        inner: MemoryStore,
        failures: Cell<u32>,
    }

    impl KeyValueStore for FlakyStore {
        fn get(&self, key: &str) -> crate::Result<Option<String>> {
            if self.failures.get() > 0 {
                self.failures.set(self.failures.get() - 1);
                return Err(CartError::Storage(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "locked")));
            }
            self.inner.get(key)
        }
        fn set(&mut self, key: &str, value: &str) -> crate::Result<()> { self.inner.set(key, value) }
        fn remove(&mut self, key: &str) -> crate::Result<()> { self.inner.remove(key) }
    }

    #[test]
    fn test_persists_after_mutation() {
        let mut session = CartSession::new(MemoryStore::new(), DEFAULT_STORAGE_KEY);
        session.hydrate();
        assert_eq!(session.store().get("cart").unwrap(), None);

        session.add_item(knife(), 2);
        let raw = session.store().get("cart").unwrap().unwrap();
        assert_eq!(record::decode_lines(&raw).unwrap()[0].quantity, 2);
    }

    #[test]
    fn test_hydrates_persisted_cart() {
        let store = MemoryStore::with_entry("cart", r#"[{"productId":"KN-1","quantity":3,"unitPrice":80,"currency":"USD","stockCeiling":5,"name":"Hunting Knife"}]"#);
        let mut session = CartSession::new(store, "cart");
        let state = session.hydrate();
        assert_eq!(state.total_quantity(), 3);
        assert_eq!(state.total_value(), Decimal::new(240, 0));
        assert_eq!(state.lines()[0].line_id().as_str(), "KN-1");
    }

    #[test]
    fn test_no_write_before_hydration() {
        let store = MemoryStore::with_entry("cart", r#"[{"productId":"KN-1","quantity":1,"unitPrice":80,"currency":"USD","stockCeiling":5}]"#);
        let mut session = CartSession::new(store, "cart");
        assert!(session.add_item(knife(), 1).is_empty());
        assert_eq!(session.pending(), 1);
        assert!(session.state().is_empty());
        let raw = session.store().get("cart").unwrap().unwrap();
        assert_eq!(record::decode_lines(&raw).unwrap()[0].quantity, 1);
    }

    #[test]
    fn test_queued_commands_replay_after_hydration() {
        let store = MemoryStore::with_entry("cart", r#"[{"productId":"KN-1","quantity":1,"unitPrice":80,"currency":"USD","stockCeiling":5}]"#);
        let mut session = CartSession::new(store, "cart");
        session.add_item(knife(), 2);
        session.hydrate();
        assert_eq!(session.pending(), 0);
        assert_eq!(session.state().lines()[0].quantity(), 3);
        let raw = session.store().get("cart").unwrap().unwrap();
        assert_eq!(record::decode_lines(&raw).unwrap()[0].quantity, 3);
    }

    #[test]
    fn test_corrupt_state_starts_empty() {
        let mut session = CartSession::new(MemoryStore::with_entry("cart", "{{garbage"), "cart");
        assert!(session.hydrate().is_empty());
        assert_eq!(session.store().get("cart").unwrap().as_deref(), Some("[]"));
    }

    #[test]
    fn test_read_failure_defers_hydration() {
        let stored = r#"[{"productId":"KN-1","quantity":1,"unitPrice":80,"currency":"USD","stockCeiling":5}]"#;
        let store = FlakyStore { inner: MemoryStore::with_entry("cart", stored), failures: Cell::new(1) };
        let mut session = CartSession::new(store, "cart");

        assert!(session.hydrate().is_empty());
        assert!(!session.is_hydrated());
        assert!(session.add_item(knife(), 2).is_empty());
        assert_eq!(session.pending(), 1);
        assert_eq!(session.store().inner.get("cart").unwrap().as_deref(), Some(stored));

        assert_eq!(session.hydrate().total_quantity(), 3);
        assert!(session.is_hydrated());
        let raw = session.store().inner.get("cart").unwrap().unwrap();
        assert_eq!(record::decode_lines(&raw).unwrap()[0].quantity, 3);
    }

    #[test]
    fn test_hydrate_runs_once() {
        let mut session = CartSession::new(MemoryStore::new(), "cart");
        session.hydrate();
        session.add_item(knife(), 1);
        session.hydrate();
        assert_eq!(session.state().total_quantity(), 1);
    }

    #[test]
    fn test_persist_failure_keeps_memory_state() {
        let mut session = CartSession::new(FailingStore, "cart");
        session.hydrate();
        let events = session.add_item(knife(), 2);
        assert!(!events.is_empty());
        assert_eq!(session.state().total_quantity(), 2);
    }

    #[test]
    fn test_checkout_clears_and_persists() {
        let mut session = CartSession::new(MemoryStore::new(), "cart");
        session.hydrate();
        session.add_item(knife(), 2);
        assert_eq!(session.complete_checkout(), vec![CartEvent::CartCleared]);
        assert!(session.state().is_empty());
        assert_eq!(session.store().get("cart").unwrap().as_deref(), Some("[]"));
    }
}
