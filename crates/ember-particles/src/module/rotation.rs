//! Sprite spin: adds an angular velocity to each particle's sprite rotation

use super::{roll_params, BridgeMessage, IdArray, ModuleContext, ModuleCore, ParticleModule, TransitionDesc};
use crate::particle::Particle;
use crate::rand::ParticleRng;
use ember_core::math::{between, lerp, ordered};
use ember_core::Curve;
use std::any::Any;

/// Angular velocity source, radians per second
#[derive(Debug, Clone, PartialEq)]
pub enum RotationTransition {
    Constant(f32),
    Lerp { start: f32, end: f32 },
    Curve(Curve),
    /// Per-particle constant drawn from `[min, max]`
    RandomConstant { min: f32, max: f32 },
    RandomCurve(Curve),
}

impl RotationTransition {
    fn is_random(&self) -> bool {
        matches!(
            self,
            RotationTransition::RandomConstant { .. } | RotationTransition::RandomCurve(_)
        )
    }
}

#[derive(Debug)]
pub struct SpriteRotationModule {
    core: ModuleCore,
    transition: RotationTransition,
    params: IdArray<f32>,
}

impl SpriteRotationModule {
    pub fn new(transition: RotationTransition) -> Self {
        Self {
            core: ModuleCore::new(),
            transition: normalize(transition),
            params: IdArray::new(),
        }
    }

    pub fn constant(value: f32) -> Self {
        Self::new(RotationTransition::Constant(value))
    }

    pub fn lerp(start: f32, end: f32) -> Self {
        Self::new(RotationTransition::Lerp { start, end })
    }

    pub fn curve(curve: Curve) -> Self {
        Self::new(RotationTransition::Curve(curve))
    }

    pub fn random_constant(min: f32, max: f32) -> Self {
        Self::new(RotationTransition::RandomConstant { min, max })
    }

    pub fn random_curve(curve: Curve) -> Self {
        Self::new(RotationTransition::RandomCurve(curve))
    }

    pub fn transition(&self) -> &RotationTransition {
        &self.transition
    }

    pub fn set_transition(&mut self, transition: RotationTransition) {
        self.transition = normalize(transition);
        self.mirror();
    }
}

fn normalize(transition: RotationTransition) -> RotationTransition {
    match transition {
        RotationTransition::RandomConstant { min, max } => {
            let (min, max) = ordered(min, max);
            RotationTransition::RandomConstant { min, max }
        }
        other => other,
    }
}

impl ParticleModule for SpriteRotationModule {
    fn name(&self) -> &'static str {
        "sprite_rotation"
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
        if self.transition.is_random() {
            roll_params(&mut self.params, indices, particles, rng);
        }
    }

    fn on_update(&mut self, dt: f32, particles: &mut [Particle]) {
        for p in particles.iter_mut() {
            let velocity = match &self.transition {
                RotationTransition::Constant(v) => *v,
                RotationTransition::Lerp { start, end } => lerp(*start, *end, p.life_ratio()),
                RotationTransition::Curve(curve) => curve.evaluate(p.life_ratio()),
                RotationTransition::RandomConstant { min, max } => {
                    between(*min, *max, self.params.get(p.key()).unwrap_or(0.0))
                }
                RotationTransition::RandomCurve(curve) => {
                    curve.evaluate(self.params.get(p.key()).unwrap_or(0.0))
                }
            };
            p.sprite_rotation += velocity * dt;
        }
    }

    fn describe(&self) -> BridgeMessage {
        let transition = match &self.transition {
            RotationTransition::Constant(v) => TransitionDesc::Constant { value: vec![*v] },
            RotationTransition::Lerp { start, end } => TransitionDesc::Lerp {
                start: vec![*start],
                end: vec![*end],
            },
            RotationTransition::Curve(curve) => TransitionDesc::Curve {
                curves: vec![curve.clone()],
            },
            RotationTransition::RandomConstant { min, max } => TransitionDesc::RandomConstant {
                min: vec![*min],
                max: vec![*max],
            },
            RotationTransition::RandomCurve(curve) => TransitionDesc::RandomCurve {
                curves: vec![curve.clone()],
            },
        };
        BridgeMessage::Transition {
            module: "sprite_rotation".to_string(),
            transition,
            absolute: false,
        }
    }

    fn deep_copy(&self) -> Box<dyn ParticleModule> {
        Box::new(Self {
            core: self.core.copy(),
            transition: self.transition.clone(),
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
    fn constant_spin_scales_with_dt() {
        let tex = TextureConfig::default();
        let mut module = SpriteRotationModule::constant(2.0);
        module.on_initialize(&context(1, &tex));
        let mut ps = particles(1);
        module.on_update(0.25, &mut ps);
        module.on_update(0.25, &mut ps);
        assert!((ps[0].sprite_rotation - 1.0).abs() < 1e-6);
    }

    #[test]
    fn random_constant_within_range() {
        let tex = TextureConfig::default();
        let mut module = SpriteRotationModule::random_constant(4.0, 2.0);
        assert_eq!(
            *module.transition(),
            RotationTransition::RandomConstant { min: 2.0, max: 4.0 }
        );
        module.on_initialize(&context(3, &tex));
        let mut ps = particles(3);
        module.on_particles_activated(&[0, 1, 2], &ps, &mut ParticleRng::new(21));
        module.on_update(1.0, &mut ps);
        for p in &ps {
            assert!((2.0..=4.0).contains(&p.sprite_rotation));
        }
    }
}
