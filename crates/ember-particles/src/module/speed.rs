//! Particle speed over life

use super::{roll_params, BridgeMessage, IdArray, ModuleContext, ModuleCore, ParticleModule, TransitionDesc};
use crate::particle::Particle;
use crate::rand::ParticleRng;
use ember_core::math::lerp;
use ember_core::Curve;
use std::any::Any;

#[derive(Debug, Clone, PartialEq)]
pub enum SpeedTransition {
    Lerp { start: f32, end: f32 },
    Curve(Curve),
    RandomCurve(Curve),
}

/// Sets speed directly when `absolute`, otherwise treats the value as an
/// acceleration (`speed += value * dt`).
#[derive(Debug)]
pub struct SpeedModule {
    core: ModuleCore,
    transition: SpeedTransition,
    absolute: bool,
    params: IdArray<f32>,
}

impl SpeedModule {
    pub fn new(transition: SpeedTransition) -> Self {
        Self {
            core: ModuleCore::new(),
            transition,
            absolute: false,
            params: IdArray::new(),
        }
    }

    pub fn lerp(start: f32, end: f32) -> Self {
        Self::new(SpeedTransition::Lerp { start, end })
    }

    pub fn curve(curve: Curve) -> Self {
        Self::new(SpeedTransition::Curve(curve))
    }

    pub fn random_curve(curve: Curve) -> Self {
        Self::new(SpeedTransition::RandomCurve(curve))
    }

    pub fn transition(&self) -> &SpeedTransition {
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
        self.transition = SpeedTransition::Lerp { start, end };
        self.mirror();
    }

    pub fn set_curve(&mut self, curve: Curve) {
        self.transition = SpeedTransition::Curve(curve);
        self.mirror();
    }

    pub fn set_random_curve(&mut self, curve: Curve) {
        self.transition = SpeedTransition::RandomCurve(curve);
        self.mirror();
    }
}

impl ParticleModule for SpeedModule {
    fn name(&self) -> &'static str {
        "speed"
    }

    fn core(&self) -> &ModuleCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ModuleCore {
        &mut self.core
    }

    fn on_initialize(&mut self, ctx: &ModuleContext<'_>) {
        self.params.reset(ctx.capacity);
    }

    fn on_particles_activated(&mut self, indices: &[usize], particles: &[Particle], rng: &mut ParticleRng) {
        if matches!(self.transition, SpeedTransition::RandomCurve(_)) {
            roll_params(&mut self.params, indices, particles, rng);
        }
    }

    fn on_update(&mut self, dt: f32, particles: &mut [Particle]) {
        for p in particles.iter_mut() {
            let value = match &self.transition {
                SpeedTransition::Lerp { start, end } => lerp(*start, *end, p.life_ratio()),
                SpeedTransition::Curve(curve) => curve.evaluate(p.life_ratio()),
                SpeedTransition::RandomCurve(curve) => {
                    curve.evaluate(self.params.get(p.key()).unwrap_or(0.0))
                }
            };
            if self.absolute {
                p.speed = value;
            } else {
                p.speed += value * dt;
            }
        }
    }

    fn describe(&self) -> BridgeMessage {
        let transition = match &self.transition {
            SpeedTransition::Lerp { start, end } => TransitionDesc::Lerp {
                start: vec![*start],
                end: vec![*end],
            },
            SpeedTransition::Curve(curve) => TransitionDesc::Curve {
                curves: vec![curve.clone()],
            },
            SpeedTransition::RandomCurve(curve) => TransitionDesc::RandomCurve {
                curves: vec![curve.clone()],
            },
        };
        BridgeMessage::Transition {
            module: "speed".to_string(),
            transition,
            absolute: self.absolute,
        }
    }

    fn deep_copy(&self) -> Box<dyn ParticleModule> {
        Box::new(Self {
            core: self.core.copy(),
            transition: self.transition.clone(),
            absolute: self.absolute,
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
    fn additive_speed_accelerates() {
        let tex = TextureConfig::default();
        let mut module = SpeedModule::lerp(10.0, 10.0);
        module.on_initialize(&context(1, &tex));
        let mut ps = particles(1);
        ps[0].speed = 1.0;
        module.on_update(0.5, &mut ps);
        assert!((ps[0].speed - 6.0).abs() < 1e-6);
    }

    #[test]
    fn absolute_speed_sets() {
        let tex = TextureConfig::default();
        let mut module = SpeedModule::lerp(0.0, 8.0);
        module.set_absolute(true);
        module.on_initialize(&context(1, &tex));
        let mut ps = particles(1);
        ps[0].speed = 100.0;
        module.on_update(0.5, &mut ps);
        assert!((ps[0].speed - 4.0).abs() < 1e-6);
    }

    #[test]
    fn set_absolute_mirrors_only_on_change() {
        use crate::module::testing::RecordingBridge;
        use std::sync::Arc;

        let bridge = Arc::new(RecordingBridge::default());
        let mut module = SpeedModule::curve(Curve::linear(0.0, 1.0));
        module.attach_bridge(bridge.clone());
        module.set_absolute(false);
        module.set_absolute(true);
        assert_eq!(bridge.configured.lock().len(), 2);
    }
}
