//! Particle modules: per-emitter behaviors that reshape particles over their
//! lifetime.
//!
//! A module is owned by exactly one emitter. Modules that need per-particle
//! state keep it in an [`IdArray`] indexed by the particle's stable id, never
//! by slot, because slots move when particles die.

pub mod bridge;
mod channel;
mod color;
mod rotation;
mod scale;
mod speed;
mod texture;

pub use bridge::{AnimationDesc, BridgeMessage, NativeBridge, TransitionDesc};
pub use channel::{Channel, ChannelModule, ChannelTransition};
pub use color::{ColorModule, ColorTransition};
pub use rotation::{RotationTransition, SpriteRotationModule};
pub use scale::{ScaleModule, ScaleTransition};
pub use speed::{SpeedModule, SpeedTransition};
pub use texture::{AnimationMode, TextureAnimationModule};

use crate::config::TextureConfig;
use crate::particle::Particle;
use crate::rand::ParticleRng;
use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_MODULE_KEY: AtomicU64 = AtomicU64::new(1);

/// Identity of a module instance as seen by a [`NativeBridge`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleKey(pub u64);

impl ModuleKey {
    fn next() -> Self {
        Self(NEXT_MODULE_KEY.fetch_add(1, Ordering::Relaxed))
    }
}

/// What a module learns about its emitter when attached
#[derive(Debug, Clone, Copy)]
pub struct ModuleContext<'a> {
    pub capacity: usize,
    pub texture: &'a TextureConfig,
}

/// State every module carries
pub struct ModuleCore {
    key: ModuleKey,
    pub enabled: bool,
    delegated: bool,
    bridge: Option<Arc<dyn NativeBridge>>,
}

impl ModuleCore {
    pub fn new() -> Self {
        Self {
            key: ModuleKey::next(),
            enabled: true,
            delegated: false,
            bridge: None,
        }
    }

    pub fn key(&self) -> ModuleKey {
        self.key
    }

    pub fn is_delegated(&self) -> bool {
        self.delegated
    }

    pub fn bridge(&self) -> Option<&Arc<dyn NativeBridge>> {
        self.bridge.as_ref()
    }

    /// Core for a deep copy: new identity, same enabled flag, no bridge
    pub fn copy(&self) -> Self {
        Self {
            enabled: self.enabled,
            ..Self::new()
        }
    }
}

impl Default for ModuleCore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ModuleCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleCore")
            .field("key", &self.key)
            .field("enabled", &self.enabled)
            .field("delegated", &self.delegated)
            .field("bridged", &self.bridge.is_some())
            .finish()
    }
}

/// Behavior attached to an emitter.
///
/// The emitter calls `on_initialize` once when the module is attached,
/// `on_particles_activated` with the slots filled this frame (before they
/// age), and `on_update` over the live slice. While the module is delegated
/// the emitter calls its bridge instead of the last two.
pub trait ParticleModule: Send + Any {
    fn name(&self) -> &'static str;

    fn core(&self) -> &ModuleCore;

    fn core_mut(&mut self) -> &mut ModuleCore;

    /// Size per-id state for the owning emitter
    fn on_initialize(&mut self, ctx: &ModuleContext<'_>);

    fn on_particles_activated(
        &mut self,
        _indices: &[usize],
        _particles: &[Particle],
        _rng: &mut ParticleRng,
    ) {
    }

    fn on_update(&mut self, dt: f32, particles: &mut [Particle]);

    /// Current configuration, as forwarded to the bridge
    fn describe(&self) -> BridgeMessage;

    /// Same configuration, fresh identity and empty per-id state
    fn deep_copy(&self) -> Box<dyn ParticleModule>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    fn is_enabled(&self) -> bool {
        self.core().enabled
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.core_mut().enabled = enabled;
    }

    /// Attach a native mirror and push the current configuration to it
    fn attach_bridge(&mut self, bridge: Arc<dyn NativeBridge>) {
        self.core_mut().bridge = Some(bridge);
        self.mirror();
    }

    /// Hand execution to the bridge. Setters keep mirroring either way.
    fn set_delegated(&mut self, delegated: bool) {
        self.core_mut().delegated = delegated;
    }

    /// Forward the current configuration to the bridge, if any
    fn mirror(&self) {
        let core = self.core();
        if let Some(bridge) = &core.bridge {
            bridge.configure(core.key, &self.describe());
        }
    }
}

/// Fixed-size per-particle storage indexed by particle id
#[derive(Debug, Clone, Default)]
pub struct IdArray<T> {
    values: Vec<T>,
}

impl<T: Copy + Default> IdArray<T> {
    pub fn new() -> Self {
        Self { values: Vec::new() }
    }

    /// Drop all state and size for `capacity` ids
    pub fn reset(&mut self, capacity: usize) {
        self.values.clear();
        self.values.resize(capacity, T::default());
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[inline]
    pub fn get(&self, id: usize) -> Option<T> {
        self.values.get(id).copied()
    }

    #[inline]
    pub fn set(&mut self, id: usize, value: T) {
        if let Some(slot) = self.values.get_mut(id) {
            *slot = value;
        }
    }
}

/// Activation hook shared by the modules that only need a random parameter
/// per particle
pub(crate) fn roll_params(
    params: &mut IdArray<f32>,
    indices: &[usize],
    particles: &[Particle],
    rng: &mut ParticleRng,
) {
    for &index in indices {
        if let Some(p) = particles.get(index) {
            params.set(p.key(), rng.next_f32());
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_array_ignores_out_of_range() {
        let mut arr: IdArray<f32> = IdArray::new();
        arr.set(3, 1.0);
        assert_eq!(arr.get(3), None);
        arr.reset(4);
        arr.set(3, 1.0);
        assert_eq!(arr.get(3), Some(1.0));
        assert_eq!(arr.len(), 4);
    }

    #[test]
    fn core_copy_gets_new_key() {
        let mut core = ModuleCore::new();
        core.enabled = false;
        let copy = core.copy();
        assert_ne!(copy.key(), core.key());
        assert!(!copy.enabled);
        assert!(copy.bridge().is_none());
    }
}
