//! Lightweight diagnostic graph for runtime metrics.
//!
//! The pump and the mixer each own a [`Graph`] and publish a small set of
//! gauges (`frame-time`, `tick-time`, `input-buffer`) and event tags
//! (`seek`) through it. Values are also mirrored to `tracing` at trace
//! level; a consumer that wants to chart them reads snapshots.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

/// A named set of gauges and event counters.
pub struct Graph {
    name: String,
    values: Mutex<HashMap<&'static str, f32>>,
    tags: Mutex<HashMap<&'static str, u64>>,
}

impl Graph {
    /// Creates a new graph identified by `name` in log output.
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            values: Mutex::new(HashMap::new()),
            tags: Mutex::new(HashMap::new()),
        })
    }

    /// Sets the gauge `key` to `value`.
    pub fn set_value(&self, key: &'static str, value: f32) {
        tracing::trace!(graph = %self.name, key, value, "gauge");
        self.values.lock().insert(key, value);
    }

    /// Alias of [`set_value`](Self::set_value) for continuously updated
    /// gauges.
    pub fn update_value(&self, key: &'static str, value: f32) {
        self.set_value(key, value);
    }

    /// Records one occurrence of the event `key`.
    pub fn tag(&self, key: &'static str) {
        tracing::trace!(graph = %self.name, key, "tag");
        *self.tags.lock().entry(key).or_insert(0) += 1;
    }

    /// Returns the last value set for the gauge `key`.
    pub fn value(&self, key: &str) -> Option<f32> {
        self.values.lock().get(key).copied()
    }

    /// Returns how many times the event `key` has been tagged.
    pub fn tag_count(&self, key: &str) -> u64 {
        self.tags.lock().get(key).copied().unwrap_or(0)
    }
}
