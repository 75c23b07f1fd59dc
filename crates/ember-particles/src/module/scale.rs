//! Particle scale over life

use super::{roll_params, BridgeMessage, IdArray, ModuleContext, ModuleCore, ParticleModule, TransitionDesc};
use crate::particle::Particle;
use crate::rand::ParticleRng;
use ember_core::math::between;
use ember_core::{Curve, Vec2};
use std::any::Any;

#[derive(Debug, Clone, PartialEq)]
pub enum ScaleTransition {
    Lerp { start: f32, end: f32 },
    /// Curve over life ratio
    Curve(Curve),
    /// Curve sampled once per particle at a random parameter
    RandomCurve(Curve),
}

/// Scales particles uniformly.
///
/// With `absolute` the value replaces the scale, otherwise it multiplies the
/// scale the particle was spawned with.
#[derive(Debug)]
pub struct ScaleModule {
    core: ModuleCore,
    transition: ScaleTransition,
    absolute: bool,
    start_scales: IdArray<Vec2>,
    params: IdArray<f32>,
}

impl ScaleModule {
    pub fn new(transition: ScaleTransition) -> Self {
        Self {
            core: ModuleCore::new(),
            transition,
            absolute: false,
            start_scales: IdArray::new(),
            params: IdArray::new(),
        }
    }

    pub fn lerp(start: f32, end: f32) -> Self {
        Self::new(ScaleTransition::Lerp { start, end })
    }

    pub fn curve(curve: Curve) -> Self {
        Self::new(ScaleTransition::Curve(curve))
    }

    pub fn random_curve(curve: Curve) -> Self {
        Self::new(ScaleTransition::RandomCurve(curve))
    }

    pub fn transition(&self) -> &ScaleTransition {
        &self.transition
    }

    pub fn is_absolute(&self) -> bool {
        self.absolute
    }

    pub fn set_absolute(&mut self, absolute: bool) {
        if self.absolute == absolute {
            return;
        }
        self.absolute = absolute;
        self.mirror();
    }

    pub fn set_lerp(&mut self, start: f32, end: f32) {
        self.transition = ScaleTransition::Lerp { start, end };
        self.mirror();
    }

    pub fn set_curve(&mut self, curve: Curve) {
        self.transition = ScaleTransition::Curve(curve);
        self.mirror();
    }

    pub fn set_random_curve(&mut self, curve: Curve) {
        self.transition = ScaleTransition::RandomCurve(curve);
        self.mirror();
    }
}

impl ParticleModule for ScaleModule {
    fn name(&self) -> &'static str {
        "scale"
    }

    fn core(&self) -> &ModuleCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ModuleCore {
        &mut self.core
    }

    fn on_initialize(&mut self, ctx: &ModuleContext<'_>) {
        self.start_scales.reset(ctx.capacity);
        self.params.reset(ctx.capacity);
    }

    fn on_particles_activated(&mut self, indices: &[usize], particles: &[Particle], rng: &mut ParticleRng) {
        for &index in indices {
            if let Some(p) = particles.get(index) {
                self.start_scales.set(p.key(), p.scale);
            }
        }
        if matches!(self.transition, ScaleTransition::RandomCurve(_)) {
            roll_params(&mut self.params, indices, particles, rng);
        }
    }

    fn on_update(&mut self, _dt: f32, particles: &mut [Particle]) {
        for p in particles.iter_mut() {
            let value = match &self.transition {
                ScaleTransition::Lerp { start, end } => between(*start, *end, p.life_ratio()),
                ScaleTransition::Curve(curve) => curve.evaluate(p.life_ratio()),
                ScaleTransition::RandomCurve(curve) => {
                    curve.evaluate(self.params.get(p.key()).unwrap_or(0.0))
                }
            };
            let scale = Vec2::splat(value);
            p.scale = if self.absolute {
                scale
            } else {
                scale * self.start_scales.get(p.key()).unwrap_or(Vec2::ONE)
            };
        }
    }

    fn describe(&self) -> BridgeMessage {
        let transition = match &self.transition {
            ScaleTransition::Lerp { start, end } => TransitionDesc::Lerp {
                start: vec![*start],
                end: vec![*end],
            },
            ScaleTransition::Curve(curve) => TransitionDesc::Curve {
                curves: vec![curve.clone()],
            },
            ScaleTransition::RandomCurve(curve) => TransitionDesc::RandomCurve {
                curves: vec![curve.clone()],
            },
        };
        BridgeMessage::Transition {
            module: "scale".to_string(),
            transition,
            absolute: self.absolute,
        }
    }

    fn deep_copy(&self) -> Box<dyn ParticleModule> {
        Box::new(Self {
            core: self.core.copy(),
            transition: self.transition.clone(),
            absolute: self.absolute,
            start_scales: IdArray::new(),
            params: IdArray::new(),
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TextureConfig;
    use crate::module::testing::{context, particles};

    #[test]
    fn relative_scale_multiplies_start() {
        let tex = TextureConfig::default();
        let mut module = ScaleModule::lerp(1.0, 3.0);
        module.on_initialize(&context(1, &tex));
        let mut ps = particles(1);
        ps[0].scale = Vec2::new(2.0, 4.0);
        module.on_particles_activated(&[0], &ps, &mut ParticleRng::new(1));
        module.on_update(0.1, &mut ps);
        assert_eq!(ps[0].scale, Vec2::new(4.0, 8.0));
    }

    #[test]
    fn absolute_scale_replaces() {
        let tex = TextureConfig::default();
        let mut module = ScaleModule::curve(Curve::linear(0.0, 10.0));
        module.set_absolute(true);
        module.on_initialize(&context(1, &tex));
        let mut ps = particles(1);
        ps[0].scale = Vec2::new(2.0, 4.0);
        module.on_particles_activated(&[0], &ps, &mut ParticleRng::new(1));
        module.on_update(0.1, &mut ps);
        assert_eq!(ps[0].scale, Vec2::splat(5.0));
    }

    #[test]
    fn random_curve_is_fixed_per_particle() {
        let tex = TextureConfig::default();
        let mut module = ScaleModule::random_curve(Curve::linear(1.0, 2.0));
        module.set_absolute(true);
        module.on_initialize(&context(1, &tex));
        let mut ps = particles(1);
        module.on_particles_activated(&[0], &ps, &mut ParticleRng::new(6));
        module.on_update(0.1, &mut ps);
        let first = ps[0].scale;
        ps[0].time_alive = 1.9;
        module.on_update(0.1, &mut ps);
        assert_eq!(ps[0].scale, first);
        assert!((1.0..=2.0).contains(&first.x));
    }
}
