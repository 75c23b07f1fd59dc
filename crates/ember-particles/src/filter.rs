//! Chainable emitter selection

use crate::emitter::{BlendMode, Emitter, EmitterHandle, Space};

/// Narrows a list of emitters step by step.
///
/// ```ignore
/// let glowing = engine
///     .filter()
///     .include_layers(&[1, 2])
///     .exclude_blend_mode(BlendMode::Opaque)
///     .into_vec();
/// ```
#[derive(Debug, Clone, Default)]
pub struct EmitterFilter {
    emitters: Vec<EmitterHandle>,
}

impl EmitterFilter {
    pub fn new(emitters: Vec<EmitterHandle>) -> Self {
        Self { emitters }
    }

    /// Keep emitters matching `pred`
    pub fn include(mut self, pred: impl Fn(&Emitter) -> bool) -> Self {
        self.emitters.retain(|h| pred(&h.lock()));
        self
    }

    /// Drop emitters matching `pred`
    pub fn exclude(self, pred: impl Fn(&Emitter) -> bool) -> Self {
        self.include(|e| !pred(e))
    }

    pub fn include_layer(self, layer: u8) -> Self {
        self.include(|e| e.layer() == layer)
    }

    pub fn exclude_layer(self, layer: u8) -> Self {
        self.exclude(|e| e.layer() == layer)
    }

    pub fn include_layers(self, layers: &[u8]) -> Self {
        self.include(|e| layers.contains(&e.layer()))
    }

    pub fn exclude_layers(self, layers: &[u8]) -> Self {
        self.exclude(|e| layers.contains(&e.layer()))
    }

    pub fn include_blend_mode(self, mode: BlendMode) -> Self {
        self.include(|e| e.blend_mode() == mode)
    }

    pub fn exclude_blend_mode(self, mode: BlendMode) -> Self {
        self.exclude(|e| e.blend_mode() == mode)
    }

    pub fn include_space(self, space: Space) -> Self {
        self.include(|e| e.space() == space)
    }

    pub fn exclude_space(self, space: Space) -> Self {
        self.exclude(|e| e.space() == space)
    }

    pub fn len(&self) -> usize {
        self.emitters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.emitters.is_empty()
    }

    pub fn into_vec(self) -> Vec<EmitterHandle> {
        self.emitters
    }
}
