//! Sprite sheet animation

use super::{AnimationDesc, BridgeMessage, ModuleContext, ModuleCore, ParticleModule};
use crate::particle::Particle;
use ember_core::{SourceRect, Vec2};
use std::any::Any;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AnimationMode {
    /// The whole sheet plays once over the particle's life
    OverLifetime,
    /// Frames advance at a fixed rate and wrap around
    Looping { fps: f32 },
}

/// Walks particles through a `columns x rows` sprite sheet, row by row.
#[derive(Debug)]
pub struct TextureAnimationModule {
    core: ModuleCore,
    columns: u32,
    rows: u32,
    mode: AnimationMode,
    full_size: Vec2,
}

impl TextureAnimationModule {
    /// Zero counts are treated as 1
    pub fn new(columns: u32, rows: u32, mode: AnimationMode) -> Self {
        Self {
            core: ModuleCore::new(),
            columns: columns.max(1),
            rows: rows.max(1),
            mode,
            full_size: Vec2::ZERO,
        }
    }

    pub fn over_lifetime(columns: u32, rows: u32) -> Self {
        Self::new(columns, rows, AnimationMode::OverLifetime)
    }

    pub fn looping(columns: u32, rows: u32, fps: f32) -> Self {
        Self::new(columns, rows, AnimationMode::Looping { fps })
    }

    pub fn columns(&self) -> u32 {
        self.columns
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn mode(&self) -> AnimationMode {
        self.mode
    }

    pub fn frame_count(&self) -> u32 {
        self.columns * self.rows
    }

    pub fn set_sheet(&mut self, columns: u32, rows: u32) {
        self.columns = columns.max(1);
        self.rows = rows.max(1);
        self.mirror();
    }

    pub fn set_mode(&mut self, mode: AnimationMode) {
        self.mode = mode;
        self.mirror();
    }

    /// Texture dimensions the frames are cut from
    pub fn set_texture_size(&mut self, full_size: Vec2) {
        self.full_size = full_size;
    }

    fn frame_for(&self, p: &Particle) -> u32 {
        let frames = self.frame_count();
        match self.mode {
            AnimationMode::OverLifetime => {
                ((p.life_ratio() * frames as f32) as u32).min(frames - 1)
            }
            AnimationMode::Looping { fps } => {
                let elapsed = (p.time_alive * fps).max(0.0) as u32;
                elapsed % frames
            }
        }
    }

    fn frame_rect(&self, frame: u32) -> SourceRect {
        let width = (self.full_size.x / self.columns as f32) as i32;
        let height = (self.full_size.y / self.rows as f32) as i32;
        let column = (frame % self.columns) as i32;
        let row = (frame / self.columns) as i32;
        SourceRect::new(column * width, row * height, width, height)
    }
}

impl ParticleModule for TextureAnimationModule {
    fn name(&self) -> &'static str {
        "texture_animation"
    }

    fn core(&self) -> &ModuleCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ModuleCore {
        &mut self.core
    }

    fn on_initialize(&mut self, ctx: &ModuleContext<'_>) {
        self.full_size = ctx.texture.full_size();
    }

    fn on_update(&mut self, _dt: f32, particles: &mut [Particle]) {
        for p in particles.iter_mut() {
            p.source_rect = self.frame_rect(self.frame_for(p));
        }
    }

    fn describe(&self) -> BridgeMessage {
        let animation = match self.mode {
            AnimationMode::OverLifetime => AnimationDesc::OverLifetime,
            AnimationMode::Looping { fps } => AnimationDesc::Looping { fps },
        };
        BridgeMessage::SpriteSheet {
            columns: self.columns,
            rows: self.rows,
            animation,
        }
    }

    fn deep_copy(&self) -> Box<dyn ParticleModule> {
        Box::new(Self {
            core: self.core.copy(),
            columns: self.columns,
            rows: self.rows,
            mode: self.mode,
            full_size: Vec2::ZERO,
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

    fn sheet_texture() -> TextureConfig {
        let mut tex = TextureConfig::default();
        tex.set_whole(Vec2::new(64.0, 32.0));
        tex
    }

    #[test]
    fn over_lifetime_picks_frame_from_ratio() {
        let tex = sheet_texture();
        let mut module = TextureAnimationModule::over_lifetime(4, 2);
        module.on_initialize(&context(1, &tex));
        let mut ps = particles(1);
        // ratio 0.5 of 8 frames -> frame 4 = column 0, row 1
        module.on_update(0.1, &mut ps);
        assert_eq!(ps[0].source_rect, SourceRect::new(0, 16, 16, 16));

        ps[0].time_alive = ps[0].initial_life;
        module.on_update(0.1, &mut ps);
        assert_eq!(ps[0].source_rect, SourceRect::new(48, 16, 16, 16));
    }

    #[test]
    fn looping_wraps() {
        let tex = sheet_texture();
        let mut module = TextureAnimationModule::looping(4, 1, 10.0);
        module.on_initialize(&context(1, &tex));
        let mut ps = particles(1);
        ps[0].time_alive = 0.55;
        module.on_update(0.1, &mut ps);
        // frame 5 % 4 = 1
        assert_eq!(ps[0].source_rect.x, 16);
    }

    #[test]
    fn zero_sheet_dimensions_clamped() {
        let module = TextureAnimationModule::over_lifetime(0, 0);
        assert_eq!(module.frame_count(), 1);
    }
}
