//! Render boundary: per-emitter observers and packed draw batches

use crate::emitter::{EmitterHandle, RenderKey};
use crate::particle::{Particle, ParticleInstance};
use ember_core::{Bounds, EmitterId};

/// Receives an emitter's live particles once per frame, after integration.
///
/// Runs on whichever thread updated the emitter, with the emitter lock held.
pub trait EmitterObserver: Send {
    fn on_emitter_update(&mut self, emitter: EmitterId, particles: &[Particle], bounds: &Bounds);
}

/// Packed instances of every visible emitter sharing one render key
#[derive(Debug, Clone, Default)]
pub struct DrawBatch {
    pub key: RenderKey,
    pub emitters: Vec<EmitterId>,
    pub instances: Vec<ParticleInstance>,
}

impl DrawBatch {
    pub fn new(key: RenderKey) -> Self {
        Self {
            key,
            emitters: Vec::new(),
            instances: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Append the live particles of `emitter` if it is visible
    pub fn push_emitter(&mut self, emitter: &EmitterHandle) {
        let guard = emitter.lock();
        if !guard.is_visible() || guard.num_active() == 0 {
            return;
        }
        self.emitters.push(guard.id());
        pack_instances(guard.active_particles(), &mut self.instances);
    }

    /// Raw bytes for a GPU instance buffer
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.instances)
    }
}

pub fn pack_instances(particles: &[Particle], out: &mut Vec<ParticleInstance>) {
    out.reserve(particles.len());
    out.extend(particles.iter().map(ParticleInstance::from_particle));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emitter::{BlendMode, Emitter};
    use crate::shape::EmissionShape;
    use parking_lot::Mutex;
    use std::sync::Arc;

    struct Counting(Arc<Mutex<Vec<usize>>>);

    impl EmitterObserver for Counting {
        fn on_emitter_update(&mut self, _emitter: EmitterId, particles: &[Particle], _bounds: &Bounds) {
            self.0.lock().push(particles.len());
        }
    }

    #[test]
    fn observer_sees_active_slice_each_frame() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut e = Emitter::new(8, EmissionShape::Point);
        e.config_mut().life.set_normal(5.0);
        e.set_observer(Box::new(Counting(Arc::clone(&seen))));
        e.emit(3);
        e.update(0.1, 0.1);
        e.emit(2);
        e.update(0.1, 0.1);
        assert_eq!(*seen.lock(), vec![3, 5]);
    }

    #[test]
    fn batch_skips_invisible_and_empty() {
        let key = RenderKey::new(0, BlendMode::Additive);
        let mut batch = DrawBatch::new(key);

        let mut e = Emitter::new(4, EmissionShape::Point);
        e.emit(4);
        let visible = EmitterHandle::new(e);
        let empty = EmitterHandle::new(Emitter::new(4, EmissionShape::Point));
        let mut hidden = Emitter::new(4, EmissionShape::Point);
        hidden.emit(2);
        hidden.set_visible(false);
        let hidden = EmitterHandle::new(hidden);

        batch.push_emitter(&visible);
        batch.push_emitter(&empty);
        batch.push_emitter(&hidden);
        assert_eq!(batch.emitters, vec![visible.id()]);
        assert_eq!(batch.instances.len(), 4);
        assert_eq!(batch.as_bytes().len(), 4 * std::mem::size_of::<ParticleInstance>());
    }
}
