//! Single HSLA channel over life: hue, saturation, lightness or alpha

use super::{BridgeMessage, IdArray, ModuleContext, ModuleCore, ParticleModule, TransitionDesc};
use crate::particle::Particle;
use crate::rand::ParticleRng;
use ember_core::math::{between, lerp, ordered};
use ember_core::{Curve, Hsla};
use std::any::Any;

/// Which color channel a [`ChannelModule`] drives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Hue,
    Saturation,
    Lightness,
    Alpha,
}

impl Channel {
    pub fn get(self, color: &Hsla) -> f32 {
        match self {
            Channel::Hue => color.hue,
            Channel::Saturation => color.saturation,
            Channel::Lightness => color.lightness,
            Channel::Alpha => color.alpha,
        }
    }

    pub fn set(self, color: &mut Hsla, value: f32) {
        match self {
            Channel::Hue => color.hue = value,
            Channel::Saturation => color.saturation = value,
            Channel::Lightness => color.lightness = value,
            Channel::Alpha => color.alpha = value,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Channel::Hue => "hue",
            Channel::Saturation => "saturation",
            Channel::Lightness => "lightness",
            Channel::Alpha => "alpha",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChannelTransition {
    /// From the particle's starting value to `end`
    Lerp { end: f32 },
    /// Curve over life ratio, absolute values
    Curve(Curve),
    /// From the starting value to a per-particle end drawn from `[min, max]`
    RandomLerp { min: f32, max: f32 },
}

#[derive(Debug)]
pub struct ChannelModule {
    core: ModuleCore,
    channel: Channel,
    transition: ChannelTransition,
    start_values: IdArray<f32>,
    end_values: IdArray<f32>,
}

impl ChannelModule {
    pub fn new(channel: Channel, transition: ChannelTransition) -> Self {
        Self {
            core: ModuleCore::new(),
            channel,
            transition: normalize(transition),
            start_values: IdArray::new(),
            end_values: IdArray::new(),
        }
    }

    pub fn lerp(channel: Channel, end: f32) -> Self {
        Self::new(channel, ChannelTransition::Lerp { end })
    }

    pub fn curve(channel: Channel, curve: Curve) -> Self {
        Self::new(channel, ChannelTransition::Curve(curve))
    }

    pub fn random_lerp(channel: Channel, min: f32, max: f32) -> Self {
        Self::new(channel, ChannelTransition::RandomLerp { min, max })
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    pub fn transition(&self) -> &ChannelTransition {
        &self.transition
    }

    pub fn set_lerp(&mut self, end: f32) {
        self.set_transition(ChannelTransition::Lerp { end });
    }

    pub fn set_curve(&mut self, curve: Curve) {
        self.set_transition(ChannelTransition::Curve(curve));
    }

    pub fn set_random_lerp(&mut self, min: f32, max: f32) {
        self.set_transition(ChannelTransition::RandomLerp { min, max });
    }

    fn set_transition(&mut self, transition: ChannelTransition) {
        self.transition = normalize(transition);
        self.mirror();
    }
}

fn normalize(transition: ChannelTransition) -> ChannelTransition {
    match transition {
        ChannelTransition::RandomLerp { min, max } => {
            let (min, max) = ordered(min, max);
            ChannelTransition::RandomLerp { min, max }
        }
        other => other,
    }
}

impl ParticleModule for ChannelModule {
    fn name(&self) -> &'static str {
        self.channel.name()
    }

    fn core(&self) -> &ModuleCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ModuleCore {
        &mut self.core
    }

    fn on_initialize(&mut self, ctx: &ModuleContext<'_>) {
        self.start_values.reset(ctx.capacity);
        self.end_values.reset(ctx.capacity);
    }

    fn on_particles_activated(&mut self, indices: &[usize], particles: &[Particle], rng: &mut ParticleRng) {
        for &index in indices {
            let Some(p) = particles.get(index) else {
                continue;
            };
            self.start_values.set(p.key(), self.channel.get(&p.color));
            if let ChannelTransition::RandomLerp { min, max } = self.transition {
                self.end_values.set(p.key(), between(min, max, rng.next_f32()));
            }
        }
    }

    fn on_update(&mut self, _dt: f32, particles: &mut [Particle]) {
        let channel = self.channel;
        for p in particles.iter_mut() {
            let t = p.life_ratio();
            let current = channel.get(&p.color);
            let value = match &self.transition {
                ChannelTransition::Lerp { end } => {
                    lerp(self.start_values.get(p.key()).unwrap_or(current), *end, t)
                }
                ChannelTransition::Curve(curve) => curve.evaluate(t),
                ChannelTransition::RandomLerp { .. } => {
                    let start = self.start_values.get(p.key()).unwrap_or(current);
                    let end = self.end_values.get(p.key()).unwrap_or(start);
                    lerp(start, end, t)
                }
            };
            channel.set(&mut p.color, value);
        }
    }

    fn describe(&self) -> BridgeMessage {
        let transition = match &self.transition {
            ChannelTransition::Lerp { end } => TransitionDesc::Lerp {
                start: Vec::new(),
                end: vec![*end],
            },
            ChannelTransition::Curve(curve) => TransitionDesc::Curve {
                curves: vec![curve.clone()],
            },
            ChannelTransition::RandomLerp { min, max } => TransitionDesc::RandomLerp {
                min: vec![*min],
                max: vec![*max],
            },
        };
        BridgeMessage::Transition {
            module: self.channel.name().to_string(),
            transition,
            absolute: true,
        }
    }

    fn deep_copy(&self) -> Box<dyn ParticleModule> {
        Box::new(Self {
            core: self.core.copy(),
            channel: self.channel,
            transition: self.transition.clone(),
            start_values: IdArray::new(),
            end_values: IdArray::new(),
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
