//! Registry of active tweened transforms, per layer plus a root.
//!
//! The mixer owns one registry per transform kind. Mutations always start
//! from the currently evaluated value, so chained `set` calls hand off
//! smoothly mid-flight. Indexing a missing layer materializes an identity
//! tween, mirroring how absent layers behave as pass-through.
//!
//! All mutation and evaluation is serialized on the mixer executor; the
//! registry itself is a plain data structure.

use std::collections::HashMap;

use crate::easing::Easing;
use crate::tween::{Interpolate, Tween};

/// Per-layer tween map with a root tween applied above every layer.
#[derive(Default)]
pub struct TweenRegistry<T> {
    root: Tween<T>,
    layers: HashMap<usize, Tween<T>>,
}

impl<T> TweenRegistry<T>
where
    T: Interpolate + Clone + Default,
{
    pub fn new() -> Self {
        Self {
            root: Tween::default(),
            layers: HashMap::new(),
        }
    }

    /// Evaluates and advances the root tween by `num` ticks.
    pub fn fetch_and_tick_root(&mut self, num: u32) -> T {
        self.root.fetch_and_tick(num)
    }

    /// Evaluates and advances the tween for `layer` by `num` ticks.
    pub fn fetch_and_tick_layer(&mut self, layer: usize, num: u32) -> T {
        self.layers
            .entry(layer)
            .or_default()
            .fetch_and_tick(num)
    }

    /// Replaces the root tween with one going from its current value to
    /// `dest`.
    pub fn set_root(&mut self, dest: T, duration: u32, easing: Easing) {
        let source = self.root.fetch();
        self.root = Tween::new(source, dest, duration, easing);
    }

    /// Replaces `layer`'s tween with one going from its current value to
    /// `dest`.
    pub fn set_layer(&mut self, layer: usize, dest: T, duration: u32, easing: Easing) {
        let source = self.layers.entry(layer).or_default().fetch();
        self.layers
            .insert(layer, Tween::new(source, dest, duration, easing));
    }

    /// Like [`set_root`](Self::set_root) with the destination derived from
    /// the current value.
    pub fn apply_root(&mut self, f: impl FnOnce(T) -> T, duration: u32, easing: Easing) {
        let source = self.root.fetch();
        let dest = f(source.clone());
        self.root = Tween::new(source, dest, duration, easing);
    }

    /// Like [`set_layer`](Self::set_layer) with the destination derived
    /// from the current value.
    pub fn apply_layer(
        &mut self,
        layer: usize,
        f: impl FnOnce(T) -> T,
        duration: u32,
        easing: Easing,
    ) {
        let source = self.layers.entry(layer).or_default().fetch();
        let dest = f(source.clone());
        self.layers
            .insert(layer, Tween::new(source, dest, duration, easing));
    }

    /// Replaces every entry, root included, with a tween toward the
    /// identity value.
    pub fn reset(&mut self, duration: u32, easing: Easing) {
        for tween in self.layers.values_mut() {
            *tween = Tween::new(tween.fetch(), T::default(), duration, easing);
        }
        self.root = Tween::new(self.root.fetch(), T::default(), duration, easing);
    }
}
