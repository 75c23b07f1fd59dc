//! Full HSLA color over life

use super::{BridgeMessage, IdArray, ModuleContext, ModuleCore, ParticleModule, TransitionDesc};
use crate::particle::Particle;
use crate::rand::ParticleRng;
use ember_core::math::between;
use ember_core::{Curve4, Hsla};
use std::any::Any;

#[derive(Debug, Clone, PartialEq)]
pub enum ColorTransition {
    Lerp { end: Hsla },
    Curve(Curve4),
    /// Per-particle end color, each channel drawn independently
    RandomLerp { min: Hsla, max: Hsla },
}

#[derive(Debug)]
pub struct ColorModule {
    core: ModuleCore,
    transition: ColorTransition,
    start_colors: IdArray<Hsla>,
    end_colors: IdArray<Hsla>,
}

impl ColorModule {
    pub fn new(transition: ColorTransition) -> Self {
        Self {
            core: ModuleCore::new(),
            transition,
            start_colors: IdArray::new(),
            end_colors: IdArray::new(),
        }
    }

    pub fn lerp(end: Hsla) -> Self {
        Self::new(ColorTransition::Lerp { end })
    }

    pub fn curve(curve: Curve4) -> Self {
        Self::new(ColorTransition::Curve(curve))
    }

    pub fn random_lerp(min: Hsla, max: Hsla) -> Self {
        Self::new(ColorTransition::RandomLerp { min, max })
    }

    pub fn transition(&self) -> &ColorTransition {
        &self.transition
    }

    pub fn set_lerp(&mut self, end: Hsla) {
        self.transition = ColorTransition::Lerp { end };
        self.mirror();
    }

    pub fn set_curve(&mut self, curve: Curve4) {
        self.transition = ColorTransition::Curve(curve);
        self.mirror();
    }

    pub fn set_random_lerp(&mut self, min: Hsla, max: Hsla) {
        self.transition = ColorTransition::RandomLerp { min, max };
        self.mirror();
    }
}

impl ParticleModule for ColorModule {
    fn name(&self) -> &'static str {
        "color"
    }

    fn core(&self) -> &ModuleCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ModuleCore {
        &mut self.core
    }

    fn on_initialize(&mut self, ctx: &ModuleContext<'_>) {
        self.start_colors.reset(ctx.capacity);
        self.end_colors.reset(ctx.capacity);
    }

    fn on_particles_activated(&mut self, indices: &[usize], particles: &[Particle], rng: &mut ParticleRng) {
        for &index in indices {
            let Some(p) = particles.get(index) else {
                continue;
            };
            self.start_colors.set(p.key(), p.color);
            if let ColorTransition::RandomLerp { min, max } = self.transition {
                let end = Hsla::new(
                    between(min.hue, max.hue, rng.next_f32()),
                    between(min.saturation, max.saturation, rng.next_f32()),
                    between(min.lightness, max.lightness, rng.next_f32()),
                    between(min.alpha, max.alpha, rng.next_f32()),
                );
                self.end_colors.set(p.key(), end);
            }
        }
    }

    fn on_update(&mut self, _dt: f32, particles: &mut [Particle]) {
        for p in particles.iter_mut() {
            let t = p.life_ratio();
            p.color = match &self.transition {
                ColorTransition::Lerp { end } => {
                    let start = self.start_colors.get(p.key()).unwrap_or(p.color);
                    Hsla::lerp(start, *end, t)
                }
                ColorTransition::Curve(curve) => Hsla::from_array(curve.evaluate(t)),
                ColorTransition::RandomLerp { .. } => {
                    let start = self.start_colors.get(p.key()).unwrap_or(p.color);
                    let end = self.end_colors.get(p.key()).unwrap_or(start);
                    Hsla::lerp(start, end, t)
                }
            };
        }
    }

    fn describe(&self) -> BridgeMessage {
        let transition = match &self.transition {
            ColorTransition::Lerp { end } => TransitionDesc::Lerp {
                start: Vec::new(),
                end: end.to_array().to_vec(),
            },
            ColorTransition::Curve(curve) => TransitionDesc::Curve {
                curves: vec![
                    curve.x.clone(),
                    curve.y.clone(),
                    curve.z.clone(),
                    curve.w.clone(),
                ],
            },
            ColorTransition::RandomLerp { min, max } => TransitionDesc::RandomLerp {
                min: min.to_array().to_vec(),
                max: max.to_array().to_vec(),
            },
        };
        BridgeMessage::Transition {
            module: "color".to_string(),
            transition,
            absolute: true,
        }
    }

    fn deep_copy(&self) -> Box<dyn ParticleModule> {
        Box::new(Self {
            core: self.core.copy(),
            transition: self.transition.clone(),
            start_colors: IdArray::new(),
            end_colors: IdArray::new(),
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
    use ember_core::Curve;

    #[test]
    fn color_lerp_halfway() {
        let tex = TextureConfig::default();
        let mut module = ColorModule::lerp(Hsla::new(200.0, 50.0, 50.0, 0.0));
        module.on_initialize(&context(2, &tex));
        let mut ps = particles(1);
        ps[0].color = Hsla::new(0.0, 50.0, 50.0, 1.0);
        module.on_particles_activated(&[0], &ps, &mut ParticleRng::new(2));
        module.on_update(0.1, &mut ps);
        assert!((ps[0].color.hue - 100.0).abs() < 1e-4);
        assert!((ps[0].color.alpha - 0.5).abs() < 1e-6);
    }

    #[test]
    fn color_random_end_within_range() {
        let tex = TextureConfig::default();
        let min = Hsla::new(0.0, 0.0, 0.0, 0.0);
        let max = Hsla::new(360.0, 100.0, 100.0, 1.0);
        let mut module = ColorModule::random_lerp(min, max);
        module.on_initialize(&context(4, &tex));
        let mut ps = particles(4);
        for p in &mut ps {
            p.time_alive = p.initial_life;
        }
        module.on_particles_activated(&[0, 1, 2, 3], &ps, &mut ParticleRng::new(8));
        module.on_update(0.1, &mut ps);
        for p in &ps {
            assert!((0.0..=360.0).contains(&p.color.hue));
            assert!((0.0..=1.0).contains(&p.color.alpha));
        }
    }

    #[test]
    fn color_curve_sets_all_channels() {
        let tex = TextureConfig::default();
        let curve = Curve4::new(
            Curve::linear(0.0, 360.0),
            Curve::linear(100.0, 100.0),
            Curve::linear(50.0, 50.0),
            Curve::linear(1.0, 0.0),
        );
        let mut module = ColorModule::curve(curve);
        module.on_initialize(&context(1, &tex));
        let mut ps = particles(1);
        module.on_update(0.1, &mut ps);
        assert!((ps[0].color.hue - 180.0).abs() < 1e-3);
        assert!((ps[0].color.alpha - 0.5).abs() < 1e-6);
    }
}
