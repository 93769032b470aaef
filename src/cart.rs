//! Client-side cart state as an explicit observable store.
//!
//! The cart is the source of truth until checkout begins. All surfaces read
//! through [`CartStore`]; none touch the underlying slot directly. Every
//! mutation rewrites the whole serialized list under one key and fires two
//! notification channels: the store's own subscriber channel (same-process
//! surfaces) and the slot's watch channel (other browsing contexts observing
//! the storage itself). A checkout can complete in a different context than
//! the one that built the cart, so both channels are load-bearing.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;
use tracing::warn;
use uuid::Uuid;

/// Storage key holding the serialized cart
pub const CART_SLOT_KEY: &str = "cart";

const CHANGE_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, thiserror::Error)]
pub enum SlotError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    #[error("storage quota exceeded")]
    QuotaExceeded,
}

/// Change notification emitted by the storage layer itself, observed by
/// contexts that did not perform the mutation.
#[derive(Debug, Clone)]
pub struct SlotChange {
    pub key: String,
    pub new_value: Option<String>,
}

/// One named slot of durable client-side storage.
pub trait CartSlot: Send + Sync {
    fn read(&self, key: &str) -> Result<Option<String>, SlotError>;
    fn write(&self, key: &str, value: &str) -> Result<(), SlotError>;
    fn remove(&self, key: &str) -> Result<(), SlotError>;
    /// Cross-context change stream; fires on every successful write/remove.
    fn watch(&self) -> broadcast::Receiver<SlotChange>;
}

/// In-memory slot backend.
#[derive(Debug)]
pub struct MemorySlot {
    data: RwLock<HashMap<String, String>>,
    changes: broadcast::Sender<SlotChange>,
}

impl MemorySlot {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            data: RwLock::new(HashMap::new()),
            changes,
        }
    }
}

impl Default for MemorySlot {
    fn default() -> Self {
        Self::new()
    }
}

impl CartSlot for MemorySlot {
    fn read(&self, key: &str) -> Result<Option<String>, SlotError> {
        let data = self
            .data
            .read()
            .map_err(|e| SlotError::Unavailable(e.to_string()))?;
        Ok(data.get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<(), SlotError> {
        let mut data = self
            .data
            .write()
            .map_err(|e| SlotError::Unavailable(e.to_string()))?;
        data.insert(key.to_string(), value.to_string());
        let _ = self.changes.send(SlotChange {
            key: key.to_string(),
            new_value: Some(value.to_string()),
        });
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), SlotError> {
        let mut data = self
            .data
            .write()
            .map_err(|e| SlotError::Unavailable(e.to_string()))?;
        data.remove(key);
        let _ = self.changes.send(SlotChange {
            key: key.to_string(),
            new_value: None,
        });
        Ok(())
    }

    fn watch(&self) -> broadcast::Receiver<SlotChange> {
        self.changes.subscribe()
    }
}

/// One selected product with its price snapshot taken at add-time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: Uuid,
    pub name: String,
    pub unit_price: Decimal,
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl CartLine {
    /// Snapshot a catalog product into a cart line.
    pub fn from_product(product: &crate::entities::product::Model, quantity: u32) -> Self {
        Self {
            product_id: product.id,
            name: product.name.clone(),
            unit_price: product.price,
            quantity,
            image_url: product.image_url.clone(),
        }
    }

    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// Same-process change notification for mounted surfaces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartEvent {
    Updated,
    Cleared,
}

/// Observable cart store over a [`CartSlot`].
#[derive(Clone)]
pub struct CartStore {
    slot: Arc<dyn CartSlot>,
    key: String,
    updates: broadcast::Sender<CartEvent>,
}

impl CartStore {
    pub fn new(slot: Arc<dyn CartSlot>) -> Self {
        Self::with_key(slot, CART_SLOT_KEY)
    }

    pub fn with_key(slot: Arc<dyn CartSlot>, key: &str) -> Self {
        let (updates, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            slot,
            key: key.to_string(),
            updates,
        }
    }

    /// Same-process subscriber channel.
    pub fn subscribe(&self) -> broadcast::Receiver<CartEvent> {
        self.updates.subscribe()
    }

    /// Cross-context subscriber channel (storage-level changes).
    pub fn watch_slot(&self) -> broadcast::Receiver<SlotChange> {
        self.slot.watch()
    }

    /// Current lines, read through storage. An unreadable or corrupt slot
    /// reads as an empty cart rather than an error.
    pub fn lines(&self) -> Vec<CartLine> {
        match self.slot.read(&self.key) {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!("Discarding unparseable cart state: {}", e);
                Vec::new()
            }),
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!("Cart storage unreadable, treating cart as empty: {}", e);
                Vec::new()
            }
        }
    }

    /// Adds an item, merging into an existing line by product id.
    pub fn add_item(&self, item: CartLine) {
        if item.quantity == 0 {
            return;
        }
        let mut lines = self.lines();
        match lines.iter_mut().find(|l| l.product_id == item.product_id) {
            Some(existing) => existing.quantity += item.quantity,
            None => lines.push(item),
        }
        self.persist(&lines, CartEvent::Updated);
    }

    /// Replaces a line's quantity. A quantity of zero or less is a guard
    /// no-op, not a removal.
    pub fn update_quantity(&self, product_id: Uuid, new_quantity: i64) {
        if new_quantity <= 0 {
            return;
        }
        let mut lines = self.lines();
        let Some(line) = lines.iter_mut().find(|l| l.product_id == product_id) else {
            return;
        };
        line.quantity = new_quantity as u32;
        self.persist(&lines, CartEvent::Updated);
    }

    /// Removes a line entirely.
    pub fn remove_item(&self, product_id: Uuid) {
        let mut lines = self.lines();
        let before = lines.len();
        lines.retain(|l| l.product_id != product_id);
        if lines.len() == before {
            return;
        }
        self.persist(&lines, CartEvent::Updated);
    }

    /// Empties the cart; invoked after a completed checkout redirect.
    pub fn clear(&self) {
        if let Err(e) = self.slot.remove(&self.key) {
            warn!("Failed to clear cart storage: {}", e);
            return;
        }
        let _ = self.updates.send(CartEvent::Cleared);
    }

    pub fn total(&self) -> Decimal {
        self.lines().iter().map(CartLine::line_total).sum()
    }

    pub fn item_count(&self) -> u32 {
        self.lines().iter().map(|l| l.quantity).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.lines().is_empty()
    }

    fn persist(&self, lines: &[CartLine], event: CartEvent) {
        let serialized = match serde_json::to_string(lines) {
            Ok(s) => s,
            Err(e) => {
                warn!("Failed to serialize cart, dropping mutation: {}", e);
                return;
            }
        };
        // A failed write drops the mutation; surfaces keep whatever state
        // storage still holds.
        if let Err(e) = self.slot.write(&self.key, &serialized) {
            warn!("Cart storage write failed, dropping mutation: {}", e);
            return;
        }
        let _ = self.updates.send(event);
    }
}
