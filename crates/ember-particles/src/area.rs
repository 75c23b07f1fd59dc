//! Area modules: spatial influence fields shared by every emitter they
//! overlap

use crate::particle::Particle;
use crate::shape::AreaShape;
use ember_core::math::{lerp, ratio};
use ember_core::{AreaModuleId, Bounds, EmitterId, Vec2};
use parking_lot::{Mutex, RwLock};
use std::collections::HashSet;
use std::sync::Arc;

/// Shared handle. The engine, and every emitter the module currently
/// influences, hold one.
pub type AreaModuleHandle = Arc<AreaModule>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ForceMode {
    #[default]
    Attract,
    Repel,
}

/// Pulls particles toward (or pushes them away from) the area center.
///
/// Strength falls off linearly from `min_distance` (full) to `max_distance`
/// (none). This is a steering heuristic, not physics.
#[derive(Debug, Clone, PartialEq)]
pub struct ForceModule {
    min_distance: f32,
    max_distance: f32,
    intensity: f32,
    speed_increase: f32,
    pub mode: ForceMode,
}

impl ForceModule {
    pub fn attract(min_distance: f32, max_distance: f32, intensity: f32, speed_increase: f32) -> Self {
        Self::with_mode(ForceMode::Attract, min_distance, max_distance, intensity, speed_increase)
    }

    pub fn repel(min_distance: f32, max_distance: f32, intensity: f32, speed_increase: f32) -> Self {
        Self::with_mode(ForceMode::Repel, min_distance, max_distance, intensity, speed_increase)
    }

    fn with_mode(
        mode: ForceMode,
        min_distance: f32,
        max_distance: f32,
        intensity: f32,
        speed_increase: f32,
    ) -> Self {
        let mut force = Self {
            mode,
            ..Self::default()
        };
        force.set_max_distance(max_distance);
        force.set_min_distance(min_distance);
        force.set_intensity(intensity);
        force.set_speed_increase(speed_increase);
        force
    }

    pub fn min_distance(&self) -> f32 {
        self.min_distance
    }

    pub fn max_distance(&self) -> f32 {
        self.max_distance
    }

    pub fn intensity(&self) -> f32 {
        self.intensity
    }

    pub fn speed_increase(&self) -> f32 {
        self.speed_increase
    }

    /// Never below the current minimum distance
    pub fn set_max_distance(&mut self, value: f32) {
        self.max_distance = value.max(self.min_distance);
    }

    /// Kept within `[0, max_distance]`
    pub fn set_min_distance(&mut self, value: f32) {
        self.min_distance = value.max(0.0).min(self.max_distance);
    }

    /// Set both distances at once
    pub fn set_distance(&mut self, value: f32) {
        self.max_distance = value.max(0.0);
        self.min_distance = self.max_distance;
    }

    pub fn set_intensity(&mut self, value: f32) {
        self.intensity = value.max(0.0);
    }

    pub fn set_speed_increase(&mut self, value: f32) {
        self.speed_increase = value.max(0.0);
    }

    /// Falloff in [0, 1]: 1 at or inside `min_distance`, 0 at `max_distance`
    fn falloff(&self, distance: f32) -> f32 {
        if self.max_distance - self.min_distance <= f32::EPSILON {
            return 1.0;
        }
        ratio(self.max_distance, self.min_distance, distance).clamp(0.0, 1.0)
    }

    fn apply(&self, shape: &AreaShape, center: Vec2, dt: f32, particles: &mut [Particle]) {
        for p in particles.iter_mut() {
            if !shape.intersects_point(center, p.position) {
                continue;
            }
            let distance = center.distance(p.position);
            if distance > self.max_distance {
                continue;
            }

            let falloff = self.falloff(distance);
            let mut toward = (center - p.position).normalize_or_zero();
            let angle = (-toward.x).atan2(toward.y);
            if self.mode == ForceMode::Repel {
                toward = -toward;
            }

            let amount = falloff * self.intensity * dt;
            p.direction = p.direction.lerp(toward, amount);
            p.sprite_rotation = lerp(p.sprite_rotation, angle, amount);
            p.speed += self.speed_increase * falloff;
        }
    }
}

impl Default for ForceModule {
    fn default() -> Self {
        Self {
            min_distance: 0.0,
            max_distance: f32::MAX,
            intensity: 25.0,
            speed_increase: 12.0,
            mode: ForceMode::Attract,
        }
    }
}

/// What an area module does to the particles inside it
#[derive(Debug, Clone, PartialEq)]
pub enum AreaEffect {
    Force(ForceModule),
}

impl AreaEffect {
    pub fn name(&self) -> &'static str {
        match self {
            AreaEffect::Force(_) => "force",
        }
    }
}

#[derive(Debug)]
struct AreaState {
    shape: AreaShape,
    position: Vec2,
    effect: AreaEffect,
}

/// Spatial influence field.
///
/// Shape, position and effect sit behind a read/write lock so the module can
/// be moved while emitters read it from worker threads. The coverage set
/// names the emitters currently linked to this module and is maintained by
/// the engine's link pass.
#[derive(Debug)]
pub struct AreaModule {
    id: AreaModuleId,
    state: RwLock<AreaState>,
    coverage: Mutex<HashSet<EmitterId>>,
}

impl AreaModule {
    pub fn new(shape: AreaShape, position: Vec2, effect: AreaEffect) -> AreaModuleHandle {
        Arc::new(Self {
            id: AreaModuleId::new(),
            state: RwLock::new(AreaState {
                shape,
                position,
                effect,
            }),
            coverage: Mutex::new(HashSet::new()),
        })
    }

    pub fn force(shape: AreaShape, position: Vec2, force: ForceModule) -> AreaModuleHandle {
        Self::new(shape, position, AreaEffect::Force(force))
    }

    pub fn id(&self) -> AreaModuleId {
        self.id
    }

    pub fn shape(&self) -> AreaShape {
        self.state.read().shape
    }

    pub fn set_shape(&self, shape: AreaShape) {
        self.state.write().shape = shape;
    }

    pub fn position(&self) -> Vec2 {
        self.state.read().position
    }

    pub fn set_position(&self, position: Vec2) {
        self.state.write().position = position;
    }

    pub fn effect(&self) -> AreaEffect {
        self.state.read().effect.clone()
    }

    pub fn set_effect(&self, effect: AreaEffect) {
        self.state.write().effect = effect;
    }

    /// World-space extent of the shape
    pub fn bounds(&self) -> Bounds {
        let state = self.state.read();
        state.shape.bounds(state.position)
    }

    pub fn intersects_bounds(&self, bounds: &Bounds) -> bool {
        let state = self.state.read();
        state.shape.intersects_bounds(state.position, bounds)
    }

    pub fn intersects_point(&self, point: Vec2) -> bool {
        let state = self.state.read();
        state.shape.intersects_point(state.position, point)
    }

    /// Whether `emitter` is currently linked to this module
    pub fn covers(&self, emitter: EmitterId) -> bool {
        self.coverage.lock().contains(&emitter)
    }

    pub fn coverage(&self) -> Vec<EmitterId> {
        self.coverage.lock().iter().copied().collect()
    }

    pub fn coverage_len(&self) -> usize {
        self.coverage.lock().len()
    }

    pub(crate) fn add_coverage(&self, emitter: EmitterId) -> bool {
        self.coverage.lock().insert(emitter)
    }

    pub(crate) fn remove_coverage(&self, emitter: EmitterId) -> bool {
        self.coverage.lock().remove(&emitter)
    }

    pub(crate) fn take_coverage(&self) -> Vec<EmitterId> {
        self.coverage.lock().drain().collect()
    }

    /// Apply the effect to every particle inside the shape
    pub fn process_particles(&self, dt: f32, particles: &mut [Particle]) {
        let state = self.state.read();
        match &state.effect {
            AreaEffect::Force(force) => force.apply(&state.shape, state.position, dt, particles),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn particle_at(position: Vec2) -> Particle {
        let mut p = Particle::with_id(0);
        p.position = position;
        p.direction = Vec2::X;
        p.initial_life = 10.0;
        p
    }

    #[test]
    fn distance_setters_clamp() {
        let mut force = ForceModule::default();
        force.set_max_distance(10.0);
        force.set_min_distance(20.0);
        assert_eq!(force.min_distance(), 10.0);
        force.set_min_distance(-1.0);
        assert_eq!(force.min_distance(), 0.0);
        force.set_max_distance(-5.0);
        assert_eq!(force.max_distance(), 0.0);
        force.set_intensity(-3.0);
        assert_eq!(force.intensity(), 0.0);
    }

    #[test]
    fn attract_steers_toward_center() {
        let module = AreaModule::force(
            AreaShape::Circle { radius: 100.0 },
            Vec2::ZERO,
            ForceModule::attract(0.0, 100.0, 1.0, 2.0),
        );
        let mut ps = [particle_at(Vec2::new(0.0, 50.0))];
        module.process_particles(1.0, &mut ps);

        // falloff 0.5: halfway from +X toward -Y
        assert!((ps[0].direction - Vec2::new(0.5, -0.5)).length() < 1e-5);
        assert!((ps[0].speed - 1.0).abs() < 1e-5);
    }

    #[test]
    fn repel_steers_away() {
        let module = AreaModule::force(
            AreaShape::Circle { radius: 100.0 },
            Vec2::ZERO,
            ForceModule::repel(0.0, 100.0, 1.0, 0.0),
        );
        let mut ps = [particle_at(Vec2::new(0.0, 50.0))];
        module.process_particles(1.0, &mut ps);
        assert!(ps[0].direction.y > 0.0);
    }

    #[test]
    fn outside_shape_untouched() {
        let module = AreaModule::force(
            AreaShape::Circle { radius: 10.0 },
            Vec2::ZERO,
            ForceModule::default(),
        );
        let mut ps = [particle_at(Vec2::new(0.0, 50.0))];
        let before = ps[0];
        module.process_particles(1.0, &mut ps);
        assert_eq!(ps[0], before);
    }

    #[test]
    fn coverage_tracks_emitters() {
        let module = AreaModule::force(AreaShape::Point, Vec2::ZERO, ForceModule::default());
        let id = EmitterId::new();
        assert!(module.add_coverage(id));
        assert!(!module.add_coverage(id));
        assert!(module.covers(id));
        assert_eq!(module.take_coverage(), vec![id]);
        assert!(!module.covers(id));
    }
}
