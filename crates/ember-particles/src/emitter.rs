//! Emitter: fixed-capacity particle buffer plus the emission and per-frame
//! update logic that drives it

use crate::area::AreaModuleHandle;
use crate::config::{checked_bounds_size, EmitterConfig};
use crate::module::{ModuleContext, ParticleModule, TextureAnimationModule};
use crate::particle::{Particle, DEAD_POSITION};
use crate::pool::ParticleBuffers;
use crate::rand::ParticleRng;
use crate::render::EmitterObserver;
use crate::shape::{EmissionShape, ShapeSample};
use ember_core::{AreaModuleId, Bounds, EmberError, EmitterId, ErrorPolicy, Result, Vec2};
use parking_lot::{Mutex, MutexGuard};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Bounds size of emitters created without one
pub const DEFAULT_BOUNDS_SIZE: Vec2 = Vec2::splat(512.0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum BlendMode {
    Opaque,
    #[default]
    Alpha,
    Additive,
    Subtractive,
}

impl BlendMode {
    pub const ALL: [BlendMode; 4] = [
        BlendMode::Opaque,
        BlendMode::Alpha,
        BlendMode::Additive,
        BlendMode::Subtractive,
    ];

    pub fn name(self) -> &'static str {
        match self {
            BlendMode::Opaque => "opaque",
            BlendMode::Alpha => "alpha",
            BlendMode::Additive => "additive",
            BlendMode::Subtractive => "subtractive",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.name() == name)
    }
}

/// Whether live particles follow the emitter when it moves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Space {
    #[default]
    World,
    Local,
}

/// Draw-order bucket of an emitter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct RenderKey {
    pub layer: u8,
    pub blend_mode: BlendMode,
}

impl RenderKey {
    pub const fn new(layer: u8, blend_mode: BlendMode) -> Self {
        Self { layer, blend_mode }
    }
}

/// Owner of a particle buffer and its emission/update behavior.
///
/// Slots `[0, num_active)` hold live particles. Particle ids over the whole
/// buffer are always a permutation of `0..capacity`; an id stays with its
/// particle when deactivation moves it to another slot.
pub struct Emitter {
    id: EmitterId,
    name: String,
    buffers: ParticleBuffers,
    num_active: usize,
    shape: EmissionShape,
    config: EmitterConfig,
    modules: Vec<Box<dyn ParticleModule>>,
    area_modules: HashMap<AreaModuleId, AreaModuleHandle>,
    position: Vec2,
    last_position: Vec2,
    first_update: bool,
    rotation: f32,
    bounds_size: Vec2,
    bounds: Bounds,
    render_key: RenderKey,
    space: Space,
    enabled: bool,
    emission_enabled: bool,
    visible: bool,
    disposed: bool,
    error_policy: ErrorPolicy,
    observer: Option<Box<dyn EmitterObserver>>,
    rng: ParticleRng,
}

impl Emitter {
    /// Standalone emitter with freshly allocated buffers
    pub fn new(capacity: usize, shape: EmissionShape) -> Self {
        Self::from_buffers(ParticleBuffers::allocate(capacity), shape)
    }

    /// Emitter over rented buffers. Capacity is the buffer length.
    pub fn from_buffers(buffers: ParticleBuffers, shape: EmissionShape) -> Self {
        Self {
            id: EmitterId::new(),
            name: String::new(),
            buffers,
            num_active: 0,
            shape,
            config: EmitterConfig::default(),
            modules: Vec::new(),
            area_modules: HashMap::new(),
            position: Vec2::ZERO,
            last_position: Vec2::ZERO,
            first_update: true,
            rotation: 0.0,
            bounds_size: DEFAULT_BOUNDS_SIZE,
            bounds: Bounds::from_center(Vec2::ZERO, DEFAULT_BOUNDS_SIZE),
            render_key: RenderKey::default(),
            space: Space::World,
            enabled: true,
            emission_enabled: true,
            visible: true,
            disposed: false,
            error_policy: ErrorPolicy::default(),
            observer: None,
            rng: ParticleRng::from_counter(),
        }
    }

    pub fn id(&self) -> EmitterId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn capacity(&self) -> usize {
        self.buffers.particles.len()
    }

    pub fn num_active(&self) -> usize {
        self.num_active
    }

    /// Live particles. Read-only: renderers must not mutate simulation state.
    pub fn active_particles(&self) -> &[Particle] {
        &self.buffers.particles[..self.num_active]
    }

    /// Every slot, live ones first
    pub fn slots(&self) -> &[Particle] {
        &self.buffers.particles
    }

    pub fn particle(&self, index: usize) -> Option<&Particle> {
        self.active_particles().get(index)
    }

    /// Slots filled since the last update, not yet seen by modules
    pub fn new_particle_indices(&self) -> &[usize] {
        &self.buffers.new_indices
    }

    pub fn shape(&self) -> &EmissionShape {
        &self.shape
    }

    pub fn set_shape(&mut self, shape: EmissionShape) {
        self.shape = shape;
    }

    pub fn config(&self) -> &EmitterConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut EmitterConfig {
        &mut self.config
    }

    pub fn seed(&mut self, seed: u32) {
        self.rng = ParticleRng::new(seed);
    }

    // ── Transform and bounds ──

    pub fn position(&self) -> Vec2 {
        self.position
    }

    pub fn set_position(&mut self, position: Vec2) {
        self.position = position;
        self.bounds = Bounds::from_center(position, self.bounds_size);
    }

    pub fn rotation(&self) -> f32 {
        self.rotation
    }

    pub fn set_rotation(&mut self, rotation: f32) {
        self.rotation = rotation;
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    pub fn bounds_size(&self) -> Vec2 {
        self.bounds_size
    }

    /// Non-positive components are corrected to 1 or rejected, per policy
    pub fn set_bounds_size(&mut self, size: Vec2) -> Result<()> {
        self.bounds_size = checked_bounds_size(size, self.error_policy)?;
        self.bounds = Bounds::from_center(self.position, self.bounds_size);
        Ok(())
    }

    pub fn space(&self) -> Space {
        self.space
    }

    pub fn set_space(&mut self, space: Space) {
        self.space = space;
    }

    // ── Render key ──

    pub fn render_key(&self) -> RenderKey {
        self.render_key
    }

    pub fn layer(&self) -> u8 {
        self.render_key.layer
    }

    pub fn blend_mode(&self) -> BlendMode {
        self.render_key.blend_mode
    }

    /// Only the engine may change the key of a registered emitter, it has to
    /// move it between registry containers.
    pub(crate) fn set_render_key(&mut self, key: RenderKey) {
        self.render_key = key;
    }

    // ── Flags ──

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_emission_enabled(&self) -> bool {
        self.emission_enabled
    }

    pub fn set_emission_enabled(&mut self, enabled: bool) {
        self.emission_enabled = enabled;
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub(crate) fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn error_policy(&self) -> ErrorPolicy {
        self.error_policy
    }

    pub fn set_error_policy(&mut self, policy: ErrorPolicy) {
        self.error_policy = policy;
    }

    // ── Playback ──

    pub fn play(&mut self) {
        self.config.emission.play();
    }

    pub fn stop(&mut self) {
        self.config.emission.stop();
    }

    pub fn is_playing(&self) -> bool {
        self.config.emission.is_playing()
    }

    // ── Texture ──

    pub fn set_texture_whole(&mut self, full_size: Vec2) {
        self.config.texture.set_whole(full_size);
        self.texture_changed();
    }

    pub fn set_texture_slice(&mut self, full_size: Vec2, size: Vec2) -> Result<()> {
        self.config
            .texture
            .set_slice(full_size, size, self.error_policy)?;
        self.texture_changed();
        Ok(())
    }

    pub fn set_texture_sheet(&mut self, full_size: Vec2, columns: u32, rows: u32) -> Result<()> {
        self.config
            .texture
            .set_sheet(full_size, columns, rows, self.error_policy)?;
        self.texture_changed();
        Ok(())
    }

    fn texture_changed(&mut self) {
        let full_size = self.config.texture.full_size();
        for module in &mut self.modules {
            if let Some(anim) = module.as_any_mut().downcast_mut::<TextureAnimationModule>() {
                anim.set_texture_size(full_size);
            }
        }
    }

    // ── Observer ──

    pub fn set_observer(&mut self, observer: Box<dyn EmitterObserver>) {
        self.observer = Some(observer);
    }

    pub fn take_observer(&mut self) -> Option<Box<dyn EmitterObserver>> {
        self.observer.take()
    }

    // ── Buffer and slots ──

    /// Activate up to `amount` particles and return how many were emitted.
    ///
    /// Does nothing while the emitter or its emission is disabled, or when
    /// the buffer is full. Otherwise `amount` is clamped to
    /// `[1, capacity - num_active]`.
    pub fn emit(&mut self, amount: usize) -> usize {
        let remaining = self.capacity() - self.num_active;
        if !self.enabled || !self.emission_enabled || remaining == 0 {
            return 0;
        }
        let amount = amount.clamp(1, remaining);

        let start = self.num_active;
        let blend_mode = self.render_key.blend_mode;
        for i in 0..amount {
            let slot = start + i;
            let sample = self
                .shape
                .sample(i as f32 / amount as f32, self.rotation, &mut self.rng);
            spawn_particle(
                &mut self.buffers.particles[slot],
                sample,
                self.position,
                &self.config,
                blend_mode,
                &mut self.rng,
            );
            self.buffers.new_indices.push(slot);
        }

        // Published only once every new slot is initialized
        self.num_active += amount;
        amount
    }

    /// Deactivate the particle in slot `index`.
    ///
    /// The last live particle moves into the slot and the freed id moves to
    /// the vacated tail slot, so every live particle keeps its id.
    pub fn deactivate_particle(&mut self, index: usize) -> Result<()> {
        if index >= self.num_active {
            return Err(EmberError::IndexOutOfRange {
                index,
                len: self.num_active,
            });
        }
        self.deactivate_at(index);
        Ok(())
    }

    fn deactivate_at(&mut self, index: usize) {
        let particles = &mut self.buffers.particles;
        particles[index].position = DEAD_POSITION;
        self.num_active -= 1;

        let last = self.num_active;
        if index != last {
            let freed_id = particles[index].id;
            particles[index] = particles[last];
            particles[last].id = freed_id;
            particles[last].position = DEAD_POSITION;
        }
    }

    /// Drop every live particle
    pub fn clear(&mut self) {
        self.num_active = 0;
        self.buffers.new_indices.clear();
    }

    /// Age live particles and deactivate the expired ones.
    ///
    /// A particle swapped into slot `i` comes from the unvisited tail, so the
    /// cursor stays on `i` and ages it in turn.
    fn age_particles(&mut self, dt: f32) {
        let mut i = 0;
        while i < self.num_active {
            let p = &mut self.buffers.particles[i];
            p.time_alive += dt;
            if p.is_expired() {
                self.deactivate_at(i);
            } else {
                i += 1;
            }
        }
    }

    // ── Modules ──

    /// Attach a module and size its per-particle state
    pub fn add_module(&mut self, mut module: Box<dyn ParticleModule>) {
        let ctx = ModuleContext {
            capacity: self.capacity(),
            texture: &self.config.texture,
        };
        module.on_initialize(&ctx);
        self.modules.push(module);
    }

    /// Remove the most recently added module of type `T`
    pub fn remove_module<T: ParticleModule>(&mut self) -> Option<Box<dyn ParticleModule>> {
        let index = self.modules.iter().rposition(|m| m.as_any().is::<T>())?;
        Some(self.modules.remove(index))
    }

    /// Remove every module of type `T`, returning how many were removed
    pub fn remove_modules<T: ParticleModule>(&mut self) -> usize {
        let before = self.modules.len();
        self.modules.retain(|m| !m.as_any().is::<T>());
        before - self.modules.len()
    }

    pub fn get_module<T: ParticleModule>(&self) -> Option<&T> {
        self.modules
            .iter()
            .find_map(|m| m.as_any().downcast_ref::<T>())
    }

    pub fn get_module_mut<T: ParticleModule>(&mut self) -> Option<&mut T> {
        self.modules
            .iter_mut()
            .find_map(|m| m.as_any_mut().downcast_mut::<T>())
    }

    pub fn module_count(&self) -> usize {
        self.modules.len()
    }

    pub fn modules(&self) -> impl Iterator<Item = &dyn ParticleModule> {
        self.modules.iter().map(|m| m.as_ref())
    }

    pub fn modules_mut(&mut self) -> impl Iterator<Item = &mut Box<dyn ParticleModule>> {
        self.modules.iter_mut()
    }

    pub fn modules_named(&self, name: &str) -> Vec<&dyn ParticleModule> {
        self.modules()
            .filter(|m| m.name() == name)
            .collect()
    }

    // ── Area modules ──

    /// Whether `area` currently influences this emitter
    pub fn influenced_by(&self, area: AreaModuleId) -> bool {
        self.area_modules.contains_key(&area)
    }

    pub fn area_module_ids(&self) -> Vec<AreaModuleId> {
        self.area_modules.keys().copied().collect()
    }

    pub fn area_module_count(&self) -> usize {
        self.area_modules.len()
    }

    pub(crate) fn link_area(&mut self, area: &AreaModuleHandle) -> bool {
        if self.area_modules.contains_key(&area.id()) {
            return false;
        }
        self.area_modules.insert(area.id(), Arc::clone(area));
        true
    }

    pub(crate) fn unlink_area(&mut self, area: AreaModuleId) -> Option<AreaModuleHandle> {
        self.area_modules.remove(&area)
    }

    pub(crate) fn take_area_modules(&mut self) -> Vec<AreaModuleHandle> {
        self.area_modules.drain().map(|(_, handle)| handle).collect()
    }

    // ── Frame update ──

    /// Advance one frame.
    ///
    /// `max_emission_step` caps the `dt` fed to emission scheduling so a long
    /// frame doesn't dump a burst of particles; aging uses the full `dt`.
    pub fn update(&mut self, dt: f32, max_emission_step: f32) {
        if self.first_update {
            self.last_position = self.position;
            self.first_update = false;
        }

        self.bounds = Bounds::from_center(self.position, self.bounds_size);

        let due = self.config.emission.advance(dt.min(max_emission_step));
        if due > 0 {
            self.emit(due);
        }

        self.notify_activated();
        self.buffers.new_indices.clear();

        self.age_particles(dt);

        let active = &mut self.buffers.particles[..self.num_active];
        for module in &mut self.modules {
            let core = module.core();
            if !core.enabled {
                continue;
            }
            if core.is_delegated() {
                if let Some(bridge) = core.bridge() {
                    bridge.on_update(core.key(), dt, active);
                }
                continue;
            }
            module.on_update(dt, active);
        }

        for area in self.area_modules.values() {
            area.process_particles(dt, active);
        }

        let displacement = match self.space {
            Space::World => Vec2::ZERO,
            Space::Local => self.position - self.last_position,
        };
        for p in active.iter_mut() {
            p.position += p.direction * p.speed * dt + displacement;
        }

        if let Some(observer) = &mut self.observer {
            observer.on_emitter_update(self.id, active, &self.bounds);
        }

        self.last_position = self.position;
    }

    fn notify_activated(&mut self) {
        let indices = &self.buffers.new_indices;
        if indices.is_empty() {
            return;
        }
        let particles = &self.buffers.particles;
        for module in &mut self.modules {
            let core = module.core();
            if core.is_delegated() {
                if let Some(bridge) = core.bridge() {
                    bridge.on_particles_activated(core.key(), indices, particles);
                }
                continue;
            }
            module.on_particles_activated(indices, particles, &mut self.rng);
        }
    }

    // ── Copy and teardown ──

    /// Independent emitter with the same configuration and module setup.
    /// Particles, area links and the observer are not copied.
    pub fn deep_copy(&self) -> Emitter {
        self.deep_copy_into(ParticleBuffers::allocate(self.capacity()))
    }

    pub(crate) fn deep_copy_into(&self, buffers: ParticleBuffers) -> Emitter {
        let mut copy = Emitter::from_buffers(buffers, self.shape.clone());
        copy.name = self.name.clone();
        copy.config = self.config.deep_copy();
        copy.position = self.position;
        copy.rotation = self.rotation;
        copy.bounds_size = self.bounds_size;
        copy.bounds = Bounds::from_center(self.position, self.bounds_size);
        copy.render_key = self.render_key;
        copy.space = self.space;
        copy.enabled = self.enabled;
        copy.emission_enabled = self.emission_enabled;
        copy.error_policy = self.error_policy;
        for module in &self.modules {
            copy.add_module(module.deep_copy());
        }
        copy
    }

    /// Release the buffers and disable the emitter for good
    pub(crate) fn finalize(&mut self) -> ParticleBuffers {
        self.stop();
        self.num_active = 0;
        self.enabled = false;
        self.visible = false;
        self.disposed = true;
        std::mem::take(&mut self.buffers)
    }
}

impl fmt::Debug for Emitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Emitter")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("capacity", &self.capacity())
            .field("num_active", &self.num_active)
            .field("render_key", &self.render_key)
            .field("position", &self.position)
            .field("modules", &self.modules.len())
            .field("area_modules", &self.area_modules.len())
            .finish()
    }
}

/// Initialize a freshly activated slot
fn spawn_particle(
    p: &mut Particle,
    sample: ShapeSample,
    origin: Vec2,
    config: &EmitterConfig,
    blend_mode: BlendMode,
    rng: &mut ParticleRng,
) {
    p.position = sample.position + origin;
    p.direction = sample.direction;
    p.time_alive = 0.0;
    p.source_rect = config.texture.source_rect();
    // Opaque particles need a real draw order
    p.layer_depth = if blend_mode == BlendMode::Opaque {
        rng.next_f32()
    } else {
        1.0
    };
    p.speed = config.speed.sample(rng);
    p.scale = config.scale.sample(rng);
    p.color = config.color.sample(rng);
    p.initial_life = config.life.sample(rng);
    p.sprite_rotation = 0.0;
}

/// Shared, lockable emitter.
///
/// The mutex is the emitter's exclusive lock: updates, module changes and
/// area links all go through it, so a module attached from the game thread
/// can never race a worker thread mid-update.
#[derive(Clone)]
pub struct EmitterHandle {
    id: EmitterId,
    inner: Arc<Mutex<Emitter>>,
}

impl EmitterHandle {
    pub fn new(emitter: Emitter) -> Self {
        Self {
            id: emitter.id(),
            inner: Arc::new(Mutex::new(emitter)),
        }
    }

    pub fn id(&self) -> EmitterId {
        self.id
    }

    pub fn lock(&self) -> MutexGuard<'_, Emitter> {
        self.inner.lock()
    }

    pub fn try_lock(&self) -> Option<MutexGuard<'_, Emitter>> {
        self.inner.try_lock()
    }

    pub fn ptr_eq(&self, other: &EmitterHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for EmitterHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EmitterHandle").field(&self.id).finish()
    }
}

impl PartialEq for EmitterHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for EmitterHandle {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::{Channel, ChannelModule, ScaleModule};
    use std::collections::HashSet;

    fn emitter(capacity: usize) -> Emitter {
        let mut e = Emitter::new(capacity, EmissionShape::Point);
        e.seed(42);
        e.config_mut().life.set_normal(2.0);
        e
    }

    fn ids(e: &Emitter) -> Vec<u32> {
        e.active_particles().iter().map(|p| p.id).collect()
    }

    fn all_ids_form_permutation(e: &Emitter) -> bool {
        let set: HashSet<u32> = e.buffers.particles.iter().map(|p| p.id).collect();
        set.len() == e.capacity() && set.iter().all(|&id| (id as usize) < e.capacity())
    }

    #[test]
    fn emit_clamps_to_remaining_capacity() {
        let mut e = emitter(10);
        assert_eq!(e.emit(7), 7);
        assert_eq!(e.emit(7), 3);
        assert_eq!(e.num_active(), 10);
        assert_eq!(e.emit(1), 0);
    }

    #[test]
    fn emit_zero_emits_one() {
        let mut e = emitter(4);
        assert_eq!(e.emit(0), 1);
    }

    #[test]
    fn emit_noop_when_disabled() {
        let mut e = emitter(4);
        e.set_enabled(false);
        assert_eq!(e.emit(2), 0);
        e.set_enabled(true);
        e.set_emission_enabled(false);
        assert_eq!(e.emit(2), 0);
        assert_eq!(e.num_active(), 0);
    }

    #[test]
    fn emit_records_new_indices_and_offsets_position() {
        let mut e = emitter(8);
        e.set_position(Vec2::new(100.0, -50.0));
        e.emit(3);
        assert_eq!(e.new_particle_indices(), &[0, 1, 2]);
        for p in e.active_particles() {
            assert_eq!(p.position, Vec2::new(100.0, -50.0));
            assert_eq!(p.time_alive, 0.0);
            assert_eq!(p.initial_life, 2.0);
            assert_eq!(p.layer_depth, 1.0);
        }
    }

    #[test]
    fn deactivate_moves_last_and_keeps_ids() {
        let mut e = emitter(5);
        e.emit(5);
        assert_eq!(ids(&e), vec![0, 1, 2, 3, 4]);

        e.deactivate_particle(1).unwrap();
        assert_eq!(ids(&e), vec![0, 4, 2, 3]);
        assert_eq!(e.buffers.particles[4].id, 1);
        assert_eq!(e.buffers.particles[4].position, DEAD_POSITION);
        assert!(all_ids_form_permutation(&e));

        // Last slot: no move
        e.deactivate_particle(3).unwrap();
        assert_eq!(ids(&e), vec![0, 4, 2]);
        assert!(all_ids_form_permutation(&e));
    }

    #[test]
    fn deactivate_out_of_range() {
        let mut e = emitter(5);
        e.emit(2);
        let err = e.deactivate_particle(2).unwrap_err();
        assert!(matches!(err, EmberError::IndexOutOfRange { index: 2, len: 2 }));
    }

    #[test]
    fn expired_particles_die_on_first_update_past_life() {
        let mut e = emitter(4);
        e.emit(4);
        e.update(1.0, 1.0);
        assert_eq!(e.num_active(), 4);
        e.update(1.0, 1.0);
        assert_eq!(e.num_active(), 0);
    }

    #[test]
    fn death_loop_ages_each_particle_once() {
        let mut e = emitter(4);
        e.emit(4);
        // Slots 0 and 1 about to expire, slots 2 and 3 young
        e.buffers.particles[0].time_alive = 1.5;
        e.buffers.particles[1].time_alive = 1.5;
        e.update(0.5, 1.0);

        assert_eq!(e.num_active(), 2);
        for p in e.active_particles() {
            assert!((p.time_alive - 0.5).abs() < 1e-6);
        }
        let mut live = ids(&e);
        live.sort();
        assert_eq!(live, vec![2, 3]);
    }

    #[test]
    fn world_space_integrates_velocity() {
        let mut e = emitter(1);
        e.config_mut().speed.set_normal(10.0);
        e.emit(1);
        let dir = e.active_particles()[0].direction;
        e.update(0.5, 1.0);
        let p = e.active_particles()[0];
        assert!((p.position - dir * 5.0).length() < 1e-4);
    }

    #[test]
    fn local_space_follows_emitter() {
        let mut e = emitter(1);
        e.set_space(Space::Local);
        e.emit(1);
        e.update(0.1, 1.0);
        e.set_position(Vec2::new(10.0, 0.0));
        e.update(0.1, 1.0);
        let p = e.active_particles()[0];
        assert!((p.position.x - 10.0).abs() < 1e-4);
    }

    #[test]
    fn update_emits_from_schedule_and_clears_new_list() {
        let mut e = emitter(10);
        e.config_mut().emission.set_constant(5.0);
        e.config_mut().emission.set_duration(10.0);
        e.config_mut().emission.looping = true;
        e.play();
        e.update(1.0, 1.0);
        assert_eq!(e.num_active(), 5);
        assert!(e.new_particle_indices().is_empty());
    }

    #[test]
    fn emission_step_is_capped() {
        let mut e = emitter(100);
        e.config_mut().emission.set_constant(10.0);
        e.config_mut().emission.set_duration(100.0);
        e.play();
        e.update(5.0, 0.5);
        assert_eq!(e.num_active(), 0); // all born and aged past life 2 in one step
        e.config_mut().life.set_normal(10.0);
        e.update(5.0, 0.5);
        assert_eq!(e.num_active(), 5);
    }

    #[test]
    fn module_management() {
        let mut e = emitter(4);
        e.add_module(Box::new(ChannelModule::lerp(Channel::Alpha, 0.0)));
        e.add_module(Box::new(ScaleModule::lerp(1.0, 2.0)));
        e.add_module(Box::new(ChannelModule::lerp(Channel::Hue, 0.0)));
        assert_eq!(e.module_count(), 3);
        assert_eq!(e.modules_named("alpha").len(), 1);
        assert!(e.get_module::<ScaleModule>().is_some());

        let removed = e.remove_module::<ChannelModule>().unwrap();
        assert_eq!(removed.name(), "hue");
        assert_eq!(e.remove_modules::<ChannelModule>(), 1);
        assert_eq!(e.module_count(), 1);
        assert!(e.get_module::<ChannelModule>().is_none());
    }

    #[test]
    fn bounds_size_policy() {
        let mut e = emitter(1);
        e.set_bounds_size(Vec2::new(0.0, 4.0)).unwrap();
        assert_eq!(e.bounds_size(), Vec2::new(1.0, 4.0));

        e.set_error_policy(ErrorPolicy::Throw);
        assert!(e.set_bounds_size(Vec2::new(-2.0, 4.0)).is_err());
        assert_eq!(e.bounds_size(), Vec2::new(1.0, 4.0));
    }

    #[test]
    fn opaque_gets_random_depth() {
        let mut e = emitter(16);
        e.set_render_key(RenderKey::new(0, BlendMode::Opaque));
        e.emit(16);
        assert!(e.active_particles().iter().any(|p| p.layer_depth < 1.0));
    }

    #[test]
    fn deep_copy_is_independent() {
        let mut e = emitter(6);
        e.config_mut().emission.set_constant(3.0);
        e.add_module(Box::new(ScaleModule::lerp(1.0, 0.0)));
        e.emit(4);

        let copy = e.deep_copy();
        assert_ne!(copy.id(), e.id());
        assert_eq!(copy.capacity(), 6);
        assert_eq!(copy.num_active(), 0);
        assert_eq!(copy.config().emission.rate(), e.config().emission.rate());
        assert_eq!(copy.module_count(), 1);
        assert_eq!(
            copy.get_module::<ScaleModule>().unwrap().transition(),
            e.get_module::<ScaleModule>().unwrap().transition()
        );
    }

    #[test]
    fn finalize_releases_buffers() {
        let mut e = emitter(3);
        e.emit(3);
        let buffers = e.finalize();
        assert_eq!(buffers.capacity(), 3);
        assert_eq!(e.capacity(), 0);
        assert!(e.is_disposed());
        assert_eq!(e.emit(1), 0);
    }

    #[test]
    fn blend_mode_names_roundtrip() {
        for mode in BlendMode::ALL {
            assert_eq!(BlendMode::from_name(mode.name()), Some(mode));
        }
        assert_eq!(BlendMode::from_name("screen"), None);
    }
}
