//! Keyed storage of overlay layers.

use std::collections::HashMap;

use tracing::debug;

use crate::layer::OverlayLayer;

/// Holds at most one layer per id.
#[derive(Debug, Default)]
pub struct LayerStore {
    layers: HashMap<String, OverlayLayer>,
}

impl LayerStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a layer, replacing any prior entry with the same id.
    pub fn insert(&mut self, layer: OverlayLayer) {
        if let Some(mut previous) = self.layers.insert(layer.id().to_string(), layer) {
            previous.delete_payload();
        }
    }

    /// Look up a layer by id.
    pub fn get(&self, id: &str) -> Option<&OverlayLayer> {
        self.layers.get(id)
    }

    /// Mark a layer drawable or not. A missing id is a silent no-op.
    /// Returns whether anything changed.
    pub fn set_active(&mut self, id: &str, active: bool) -> bool {
        match self.layers.get_mut(id) {
            Some(layer) if layer.is_active() != active => {
                layer.set_active(active);
                true
            }
            Some(_) => false,
            None => {
                debug!(id, "set_active on unknown overlay");
                false
            }
        }
    }

    /// Remove a layer and delete its payload. Returns whether it existed.
    pub fn remove(&mut self, id: &str) -> bool {
        match self.layers.remove(id) {
            Some(mut layer) => {
                layer.delete_payload();
                true
            }
            None => false,
        }
    }

    /// Layers ordered by ascending z.
    pub fn iter_by_z(&self) -> Vec<&OverlayLayer> {
        let mut layers: Vec<&OverlayLayer> = self.layers.values().collect();
        layers.sort_by_key(|layer| layer.z_index());
        layers
    }

    /// Number of stored layers.
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Delete every payload and drop all entries.
    pub fn clear(&mut self) {
        for (_, mut layer) in self.layers.drain() {
            layer.delete_payload();
        }
    }
}
