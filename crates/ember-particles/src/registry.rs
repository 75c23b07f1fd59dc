//! Render-key registry: emitters bucketed by `(layer, blend mode)`

use crate::emitter::{BlendMode, Emitter, EmitterHandle, RenderKey};
use bitflags::bitflags;
use ember_core::EmitterId;
use std::collections::BTreeMap;

bitflags! {
    /// Extra conditions on registry queries. Empty matches every emitter.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SearchFlags: u8 {
        const VISIBLE = 1 << 0;
        const ENABLED = 1 << 1;
    }
}

impl SearchFlags {
    pub fn matches(self, emitter: &Emitter) -> bool {
        (!self.contains(SearchFlags::VISIBLE) || emitter.is_visible())
            && (!self.contains(SearchFlags::ENABLED) || emitter.is_enabled())
    }
}

/// Emitters sharing one render key, in registration order
#[derive(Debug)]
pub struct EmitterContainer {
    key: RenderKey,
    emitters: Vec<EmitterHandle>,
}

impl EmitterContainer {
    pub fn new(key: RenderKey) -> Self {
        Self {
            key,
            emitters: Vec::new(),
        }
    }

    pub fn key(&self) -> RenderKey {
        self.key
    }

    pub fn layer(&self) -> u8 {
        self.key.layer
    }

    pub fn blend_mode(&self) -> BlendMode {
        self.key.blend_mode
    }

    pub fn len(&self) -> usize {
        self.emitters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.emitters.is_empty()
    }

    pub fn emitters(&self) -> &[EmitterHandle] {
        &self.emitters
    }

    pub fn contains(&self, id: EmitterId) -> bool {
        self.emitters.iter().any(|h| h.id() == id)
    }

    /// Locks each emitter in turn; the caller must not hold any of them.
    pub fn search(&self, flags: SearchFlags) -> Vec<EmitterHandle> {
        if flags.is_empty() {
            return self.emitters.clone();
        }
        self.emitters
            .iter()
            .filter(|h| flags.matches(&h.lock()))
            .cloned()
            .collect()
    }

    pub fn particle_count(&self) -> usize {
        self.emitters.iter().map(|h| h.lock().num_active()).sum()
    }

    fn add(&mut self, handle: EmitterHandle) {
        if !self.contains(handle.id()) {
            self.emitters.push(handle);
        }
    }

    fn remove(&mut self, id: EmitterId) -> Option<EmitterHandle> {
        let index = self.emitters.iter().position(|h| h.id() == id)?;
        Some(self.emitters.remove(index))
    }
}

/// Containers ordered by render key, which is also the draw order.
#[derive(Debug, Default)]
pub struct EmitterRegistry {
    containers: BTreeMap<RenderKey, EmitterContainer>,
}

impl EmitterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: RenderKey, handle: EmitterHandle) {
        self.containers
            .entry(key)
            .or_insert_with(|| EmitterContainer::new(key))
            .add(handle);
    }

    pub fn remove(&mut self, key: RenderKey, id: EmitterId) -> Option<EmitterHandle> {
        let container = self.containers.get_mut(&key)?;
        let removed = container.remove(id);
        if container.is_empty() {
            self.containers.remove(&key);
        }
        removed
    }

    /// Re-bucket an emitter. Returns false if it was not under `from`.
    pub fn rekey(&mut self, from: RenderKey, to: RenderKey, id: EmitterId) -> bool {
        if from == to {
            return self.container(from).is_some_and(|c| c.contains(id));
        }
        match self.remove(from, id) {
            Some(handle) => {
                self.insert(to, handle);
                true
            }
            None => false,
        }
    }

    pub fn container(&self, key: RenderKey) -> Option<&EmitterContainer> {
        self.containers.get(&key)
    }

    pub fn containers(&self) -> impl Iterator<Item = &EmitterContainer> {
        self.containers.values()
    }

    pub fn len(&self) -> usize {
        self.containers.values().map(EmitterContainer::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.containers.is_empty()
    }

    pub fn by_key(&self, key: RenderKey, flags: SearchFlags) -> Vec<EmitterHandle> {
        self.container(key)
            .map(|c| c.search(flags))
            .unwrap_or_default()
    }

    pub fn by_layer(&self, layer: u8, flags: SearchFlags) -> Vec<EmitterHandle> {
        self.containers
            .values()
            .filter(|c| c.layer() == layer)
            .flat_map(|c| c.search(flags))
            .collect()
    }

    pub fn by_blend_mode(&self, blend_mode: BlendMode, flags: SearchFlags) -> Vec<EmitterHandle> {
        self.containers
            .values()
            .filter(|c| c.blend_mode() == blend_mode)
            .flat_map(|c| c.search(flags))
            .collect()
    }

    pub fn clear(&mut self) {
        self.containers.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::EmissionShape;

    fn handle() -> EmitterHandle {
        EmitterHandle::new(Emitter::new(4, EmissionShape::Point))
    }

    #[test]
    fn insert_and_query() {
        let mut reg = EmitterRegistry::new();
        let a = handle();
        let b = handle();
        let c = handle();
        reg.insert(RenderKey::new(0, BlendMode::Alpha), a.clone());
        reg.insert(RenderKey::new(0, BlendMode::Additive), b.clone());
        reg.insert(RenderKey::new(2, BlendMode::Alpha), c.clone());

        assert_eq!(reg.len(), 3);
        assert_eq!(reg.by_layer(0, SearchFlags::empty()).len(), 2);
        assert_eq!(reg.by_blend_mode(BlendMode::Alpha, SearchFlags::empty()).len(), 2);
        assert_eq!(
            reg.by_key(RenderKey::new(2, BlendMode::Alpha), SearchFlags::empty()),
            vec![c]
        );
        assert!(reg.by_key(RenderKey::new(9, BlendMode::Opaque), SearchFlags::empty()).is_empty());
    }

    #[test]
    fn containers_in_draw_order() {
        let mut reg = EmitterRegistry::new();
        reg.insert(RenderKey::new(3, BlendMode::Opaque), handle());
        reg.insert(RenderKey::new(1, BlendMode::Subtractive), handle());
        reg.insert(RenderKey::new(1, BlendMode::Alpha), handle());
        let keys: Vec<RenderKey> = reg.containers().map(|c| c.key()).collect();
        assert_eq!(
            keys,
            vec![
                RenderKey::new(1, BlendMode::Alpha),
                RenderKey::new(1, BlendMode::Subtractive),
                RenderKey::new(3, BlendMode::Opaque),
            ]
        );
    }

    #[test]
    fn search_flags_filter() {
        let mut reg = EmitterRegistry::new();
        let key = RenderKey::default();
        let shown = handle();
        let hidden = handle();
        hidden.lock().set_visible(false);
        let disabled = handle();
        disabled.lock().set_enabled(false);
        for h in [&shown, &hidden, &disabled] {
            reg.insert(key, h.clone());
        }

        assert_eq!(reg.by_key(key, SearchFlags::VISIBLE).len(), 2);
        assert_eq!(reg.by_key(key, SearchFlags::ENABLED).len(), 2);
        assert_eq!(reg.by_key(key, SearchFlags::all()), vec![shown]);
    }

    #[test]
    fn rekey_moves_and_drops_empty_containers() {
        let mut reg = EmitterRegistry::new();
        let from = RenderKey::new(0, BlendMode::Alpha);
        let to = RenderKey::new(5, BlendMode::Additive);
        let h = handle();
        reg.insert(from, h.clone());

        assert!(reg.rekey(from, to, h.id()));
        assert!(reg.container(from).is_none());
        assert!(reg.container(to).is_some_and(|c| c.contains(h.id())));
        assert!(!reg.rekey(from, to, h.id()));
    }

    #[test]
    fn duplicate_insert_ignored() {
        let mut reg = EmitterRegistry::new();
        let h = handle();
        reg.insert(RenderKey::default(), h.clone());
        reg.insert(RenderKey::default(), h);
        assert_eq!(reg.len(), 1);
    }
}
