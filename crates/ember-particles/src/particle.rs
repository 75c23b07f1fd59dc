//! Particle types: simulation record and packed render instance

use bytemuck::{Pod, Zeroable};
use ember_core::{Hsla, SourceRect, Vec2};

/// Position written into a slot when its particle is deactivated
pub const DEAD_POSITION: Vec2 = Vec2::splat(f32::MIN);

/// Simulation state of one particle.
///
/// Plain old data so emitter buffers stay contiguous and can be handed to a
/// native collaborator or a renderer as raw bytes.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct Particle {
    pub position: Vec2,
    pub scale: Vec2,
    /// Unit heading. Velocity is `direction * speed`.
    pub direction: Vec2,
    pub color: Hsla,
    pub mass: f32,
    pub speed: f32,
    pub sprite_rotation: f32,
    pub initial_life: f32,
    pub time_alive: f32,
    pub layer_depth: f32,
    pub source_rect: SourceRect,
    /// Stable label that follows the particle when its slot moves.
    pub id: u32,
}

impl Particle {
    /// Inactive particle carrying the given id
    pub fn with_id(id: u32) -> Self {
        Self {
            position: DEAD_POSITION,
            scale: Vec2::ONE,
            direction: Vec2::ZERO,
            color: Hsla::WHITE,
            mass: 1.0,
            speed: 0.0,
            sprite_rotation: 0.0,
            initial_life: 0.0,
            time_alive: 0.0,
            layer_depth: 1.0,
            source_rect: SourceRect::default(),
            id,
        }
    }

    /// Normalized age in [0, 1]
    pub fn life_ratio(&self) -> f32 {
        if self.initial_life <= 0.0 {
            1.0
        } else {
            (self.time_alive / self.initial_life).min(1.0)
        }
    }

    pub fn is_expired(&self) -> bool {
        self.time_alive >= self.initial_life
    }

    /// Slot index into per-id auxiliary arrays
    #[inline]
    pub fn key(&self) -> usize {
        self.id as usize
    }
}

impl Default for Particle {
    fn default() -> Self {
        Self::with_id(0)
    }
}

/// Render instance data, 48 bytes.
///
/// Color is converted from HSLA to RGBA so shaders never deal with HSL.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct ParticleInstance {
    pub position: [f32; 2],
    pub scale: [f32; 2],
    pub color: [f32; 4],
    pub rotation: f32,
    pub depth: f32,
    /// x, y, width, height in texels
    pub source_rect: [u16; 4],
}

impl ParticleInstance {
    pub fn from_particle(p: &Particle) -> Self {
        let rect = p.source_rect;
        Self {
            position: p.position.to_array(),
            scale: p.scale.to_array(),
            color: p.color.to_rgba(),
            rotation: p.sprite_rotation,
            depth: p.layer_depth,
            source_rect: [
                texel(rect.x),
                texel(rect.y),
                texel(rect.width),
                texel(rect.height),
            ],
        }
    }
}

fn texel(v: i32) -> u16 {
    v.clamp(0, u16::MAX as i32) as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn particle_layout_is_packed() {
        assert_eq!(std::mem::size_of::<Particle>(), 84);
        assert_eq!(std::mem::align_of::<Particle>(), 4);
    }

    #[test]
    fn particle_instance_layout() {
        assert_eq!(std::mem::size_of::<ParticleInstance>(), 48);
        assert_eq!(std::mem::align_of::<ParticleInstance>(), 4);
    }

    #[test]
    fn life_ratio_clamps() {
        let mut p = Particle::with_id(3);
        p.initial_life = 2.0;
        p.time_alive = 1.0;
        assert!((p.life_ratio() - 0.5).abs() < 1e-6);
        p.time_alive = 5.0;
        assert_eq!(p.life_ratio(), 1.0);
        assert!(p.is_expired());

        p.initial_life = 0.0;
        assert_eq!(p.life_ratio(), 1.0);
    }

    #[test]
    fn instance_converts_color_and_rect() {
        let mut p = Particle::with_id(0);
        p.position = Vec2::new(3.0, 4.0);
        p.color = Hsla::new(0.0, 0.0, 100.0, 0.5);
        p.source_rect = SourceRect::new(-5, 0, 16, 70000);
        let inst = ParticleInstance::from_particle(&p);
        assert_eq!(inst.position, [3.0, 4.0]);
        assert_eq!(inst.color, [1.0, 1.0, 1.0, 0.5]);
        assert_eq!(inst.source_rect, [0, 0, 16, u16::MAX]);
    }
}
