//! Emitter configuration: starting values for new particles, emission
//! scheduling and texture layout

use crate::rand::ParticleRng;
use ember_core::math::between;
use ember_core::{Curve, Curve2, Curve4, EmberError, ErrorPolicy, Hsla, Result, SourceRect, Vec2};
use log::warn;

/// Durations below this never emit
const MIN_DURATION: f32 = 0.00001;

/// Starting speed of new particles
#[derive(Debug, Clone, PartialEq)]
pub enum SpeedConfig {
    Normal(f32),
    Random { min: f32, max: f32 },
    /// Curve evaluated at a uniform random parameter
    RandomCurve(Curve),
}

impl SpeedConfig {
    pub fn set_normal(&mut self, value: f32) {
        *self = Self::Normal(value);
    }

    pub fn set_random_between(&mut self, min: f32, max: f32) {
        *self = Self::Random { min, max };
    }

    pub fn set_random_curve(&mut self, curve: Curve) {
        *self = Self::RandomCurve(curve);
    }

    pub fn sample(&self, rng: &mut ParticleRng) -> f32 {
        match self {
            Self::Normal(v) => *v,
            Self::Random { min, max } => between(*min, *max, rng.next_f32()),
            Self::RandomCurve(curve) => curve.evaluate(rng.next_f32()),
        }
    }
}

impl Default for SpeedConfig {
    fn default() -> Self {
        Self::Normal(0.0)
    }
}

/// Starting life (seconds) of new particles
#[derive(Debug, Clone, PartialEq)]
pub enum LifeConfig {
    Normal(f32),
    Random { min: f32, max: f32 },
    RandomCurve(Curve),
}

impl LifeConfig {
    pub fn set_normal(&mut self, value: f32) {
        *self = Self::Normal(value);
    }

    pub fn set_random_between(&mut self, min: f32, max: f32) {
        *self = Self::Random { min, max };
    }

    pub fn set_random_curve(&mut self, curve: Curve) {
        *self = Self::RandomCurve(curve);
    }

    /// Longest life a new particle can get. Default wait before a disposed
    /// emitter is finalized.
    pub fn max_life(&self) -> f32 {
        match self {
            Self::Normal(v) => *v,
            Self::Random { max, .. } => *max,
            Self::RandomCurve(curve) => curve.max_value().max(0.0),
        }
    }

    pub fn sample(&self, rng: &mut ParticleRng) -> f32 {
        match self {
            Self::Normal(v) => *v,
            Self::Random { min, max } => between(*min, *max, rng.next_f32()),
            Self::RandomCurve(curve) => curve.evaluate(rng.next_f32()),
        }
    }
}

impl Default for LifeConfig {
    fn default() -> Self {
        Self::Normal(1.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScaleSource {
    Normal(Vec2),
    Random { min: Vec2, max: Vec2 },
    RandomCurve(Curve2),
}

/// Starting scale of new particles.
///
/// When `two_dimensional` is false one random parameter drives both axes so
/// particles keep their aspect ratio.
#[derive(Debug, Clone, PartialEq)]
pub struct ScaleConfig {
    pub source: ScaleSource,
    pub two_dimensional: bool,
}

impl ScaleConfig {
    pub fn set_normal(&mut self, value: f32) {
        self.source = ScaleSource::Normal(Vec2::splat(value));
        self.two_dimensional = false;
    }

    pub fn set_normal_2d(&mut self, value: Vec2) {
        self.source = ScaleSource::Normal(value);
        self.two_dimensional = true;
    }

    pub fn set_random_between(&mut self, min: f32, max: f32) {
        self.source = ScaleSource::Random {
            min: Vec2::splat(min),
            max: Vec2::splat(max),
        };
        self.two_dimensional = false;
    }

    pub fn set_random_between_2d(&mut self, min: Vec2, max: Vec2) {
        self.source = ScaleSource::Random { min, max };
        self.two_dimensional = true;
    }

    pub fn set_random_curve(&mut self, curve: Curve) {
        self.source = ScaleSource::RandomCurve(Curve2::uniform(curve));
        self.two_dimensional = false;
    }

    pub fn set_random_curve_2d(&mut self, curve: Curve2) {
        self.source = ScaleSource::RandomCurve(curve);
        self.two_dimensional = true;
    }

    pub fn sample(&self, rng: &mut ParticleRng) -> Vec2 {
        match &self.source {
            ScaleSource::Normal(v) => *v,
            ScaleSource::Random { min, max } => {
                let (rx, ry) = self.params(rng);
                Vec2::new(between(min.x, max.x, rx), between(min.y, max.y, ry))
            }
            ScaleSource::RandomCurve(curve) => {
                let (rx, ry) = self.params(rng);
                Vec2::new(curve.x.evaluate(rx), curve.y.evaluate(ry))
            }
        }
    }

    fn params(&self, rng: &mut ParticleRng) -> (f32, f32) {
        let rx = rng.next_f32();
        let ry = if self.two_dimensional {
            rng.next_f32()
        } else {
            rx
        };
        (rx, ry)
    }
}

impl Default for ScaleConfig {
    fn default() -> Self {
        Self {
            source: ScaleSource::Normal(Vec2::ONE),
            two_dimensional: false,
        }
    }
}

/// Starting color of new particles
#[derive(Debug, Clone, PartialEq)]
pub enum ColorConfig {
    Normal(Hsla),
    /// Each channel drawn independently
    Random { min: Hsla, max: Hsla },
    RandomCurve(Curve4),
}

impl ColorConfig {
    pub fn set_normal(&mut self, value: Hsla) {
        *self = Self::Normal(value);
    }

    pub fn set_random_between(&mut self, min: Hsla, max: Hsla) {
        *self = Self::Random { min, max };
    }

    pub fn set_random_curve(&mut self, curve: Curve4) {
        *self = Self::RandomCurve(curve);
    }

    pub fn sample(&self, rng: &mut ParticleRng) -> Hsla {
        match self {
            Self::Normal(v) => *v,
            Self::Random { min, max } => Hsla::new(
                between(min.hue, max.hue, rng.next_f32()),
                between(min.saturation, max.saturation, rng.next_f32()),
                between(min.lightness, max.lightness, rng.next_f32()),
                between(min.alpha, max.alpha, rng.next_f32()),
            ),
            Self::RandomCurve(curve) => Hsla::new(
                curve.x.evaluate(rng.next_f32()),
                curve.y.evaluate(rng.next_f32()),
                curve.z.evaluate(rng.next_f32()),
                curve.w.evaluate(rng.next_f32()),
            ),
        }
    }
}

impl Default for ColorConfig {
    fn default() -> Self {
        Self::Normal(Hsla::WHITE)
    }
}

/// Particles-per-second source
#[derive(Debug, Clone, Default, PartialEq)]
pub enum EmissionRate {
    #[default]
    None,
    Constant(f32),
    /// Evaluated over normalized playback time
    Curve(Curve),
}

/// Emission playback state and rate.
#[derive(Debug, Clone, PartialEq)]
pub struct EmissionConfig {
    is_playing: bool,
    current_time: f32,
    duration: f32,
    pub looping: bool,
    rate: EmissionRate,
    queued_particles: f32,
}

impl EmissionConfig {
    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    pub fn current_time(&self) -> f32 {
        self.current_time
    }

    pub fn duration(&self) -> f32 {
        self.duration
    }

    /// Negative durations are clamped to zero, which disables emission
    pub fn set_duration(&mut self, duration: f32) {
        self.duration = duration.max(0.0);
    }

    pub fn rate(&self) -> &EmissionRate {
        &self.rate
    }

    /// Fractional particles carried over to the next tick
    pub fn queued_particles(&self) -> f32 {
        self.queued_particles
    }

    /// A negative rate turns emission off
    pub fn set_constant(&mut self, per_second: f32) {
        self.rate = if per_second < 0.0 {
            EmissionRate::None
        } else {
            EmissionRate::Constant(per_second)
        };
    }

    /// An empty curve turns emission off
    pub fn set_curve(&mut self, curve: Curve) {
        self.rate = if curve.is_empty() {
            EmissionRate::None
        } else {
            EmissionRate::Curve(curve)
        };
    }

    pub fn set_none(&mut self) {
        self.rate = EmissionRate::None;
    }

    pub fn play(&mut self) {
        self.current_time = 0.0;
        self.is_playing = true;
    }

    pub fn stop(&mut self) {
        self.is_playing = false;
    }

    /// Advance playback by `dt` and return how many whole particles are due.
    ///
    /// `dt` must already be clamped to the engine's max emission step.
    pub fn advance(&mut self, dt: f32) -> usize {
        if !self.is_playing
            || matches!(self.rate, EmissionRate::None)
            || self.duration < MIN_DURATION
        {
            return 0;
        }

        self.current_time += dt;
        let mut norm = self.current_time / self.duration;
        if norm >= 1.0 {
            norm = 1.0;
            if self.looping {
                self.current_time = 0.0;
            } else {
                self.is_playing = false;
            }
        }

        let per_second = match &self.rate {
            EmissionRate::None => 0.0,
            EmissionRate::Constant(v) => *v,
            EmissionRate::Curve(curve) => curve.evaluate(norm),
        };
        self.queued_particles += per_second * dt;

        if self.queued_particles < 1.0 {
            return 0;
        }
        let due = self.queued_particles.floor();
        self.queued_particles -= due;
        due as usize
    }

    /// Same schedule, fresh playback state
    pub fn deep_copy(&self) -> Self {
        Self {
            is_playing: false,
            current_time: 0.0,
            queued_particles: 0.0,
            ..self.clone()
        }
    }
}

impl Default for EmissionConfig {
    fn default() -> Self {
        Self {
            is_playing: false,
            current_time: 0.0,
            duration: 1.0,
            looping: false,
            rate: EmissionRate::None,
            queued_particles: 0.0,
        }
    }
}

/// How the texture is cut into per-particle source rectangles
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TextureMode {
    #[default]
    Whole,
    Slice,
    Sheet {
        columns: u32,
        rows: u32,
    },
}

/// Texture layout. The texture itself is owned by the renderer; only its
/// dimensions matter to the simulation.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TextureConfig {
    mode: TextureMode,
    full_size: Vec2,
    size: Vec2,
}

impl TextureConfig {
    pub fn mode(&self) -> TextureMode {
        self.mode
    }

    pub fn full_size(&self) -> Vec2 {
        self.full_size
    }

    /// Size of one particle's source rectangle
    pub fn size(&self) -> Vec2 {
        self.size
    }

    pub fn source_rect(&self) -> SourceRect {
        SourceRect::new(0, 0, self.size.x as i32, self.size.y as i32)
    }

    pub fn set_whole(&mut self, full_size: Vec2) {
        self.mode = TextureMode::Whole;
        self.full_size = full_size;
        self.size = full_size;
    }

    /// Use a `size` sub-rectangle of the texture. A non-positive size falls
    /// back to the whole texture under `AutoCorrect`.
    pub fn set_slice(&mut self, full_size: Vec2, size: Vec2, policy: ErrorPolicy) -> Result<()> {
        let checked = if size.x <= 0.0 || size.y <= 0.0 {
            Err(EmberError::InvalidEmitterValue(format!(
                "texture slice size must be positive, got {size}"
            )))
        } else {
            Ok(size)
        };
        self.size = policy.resolve(checked, || {
            warn!("texture slice size {size} corrected to {full_size}");
            full_size
        })?;
        self.mode = TextureMode::Slice;
        self.full_size = full_size;
        Ok(())
    }

    /// Use the texture as a `columns x rows` sprite sheet. Zero counts are
    /// corrected to 1 under `AutoCorrect`.
    pub fn set_sheet(
        &mut self,
        full_size: Vec2,
        columns: u32,
        rows: u32,
        policy: ErrorPolicy,
    ) -> Result<()> {
        let columns = sheet_count(columns, "columns", policy)?;
        let rows = sheet_count(rows, "rows", policy)?;
        self.mode = TextureMode::Sheet { columns, rows };
        self.full_size = full_size;
        self.size = Vec2::new(full_size.x / columns as f32, full_size.y / rows as f32);
        Ok(())
    }
}

fn sheet_count(value: u32, what: &str, policy: ErrorPolicy) -> Result<u32> {
    let checked = if value == 0 {
        Err(EmberError::InvalidEmitterValue(format!(
            "sprite sheet {what} must be at least 1"
        )))
    } else {
        Ok(value)
    };
    policy.resolve(checked, || {
        warn!("sprite sheet {what} corrected from 0 to 1");
        1
    })
}

/// Validate an emitter bounds size. Components below 1 are corrected to 1
/// under `AutoCorrect`.
pub fn checked_bounds_size(size: Vec2, policy: ErrorPolicy) -> Result<Vec2> {
    let checked = if size.x <= 0.0 || size.y <= 0.0 {
        Err(EmberError::InvalidEmitterValue(format!(
            "bounds size must be positive, got {size}"
        )))
    } else {
        Ok(size)
    };
    policy.resolve(checked, || {
        let corrected = size.max(Vec2::ONE);
        warn!("bounds size {size} corrected to {corrected}");
        corrected
    })
}

/// Largest particle buffer a single emitter may own
pub const MAX_CAPACITY: usize = 1 << 20;

/// Capacities above [`MAX_CAPACITY`] are a value error; auto-correct clamps.
pub fn checked_capacity(capacity: usize, policy: ErrorPolicy) -> Result<usize> {
    let checked = if capacity > MAX_CAPACITY {
        Err(EmberError::InvalidEmitterValue(format!(
            "capacity {capacity} exceeds the limit of {MAX_CAPACITY}"
        )))
    } else {
        Ok(capacity)
    };
    policy.resolve(checked, || {
        warn!("capacity {capacity} corrected to {MAX_CAPACITY}");
        MAX_CAPACITY
    })
}

/// Everything that decides how an emitter's particles start out
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmitterConfig {
    pub color: ColorConfig,
    pub scale: ScaleConfig,
    pub life: LifeConfig,
    pub speed: SpeedConfig,
    pub emission: EmissionConfig,
    pub texture: TextureConfig,
}

impl EmitterConfig {
    /// Value copy with emission playback reset
    pub fn deep_copy(&self) -> Self {
        Self {
            emission: self.emission.deep_copy(),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn constant(rate: f32, duration: f32, looping: bool) -> EmissionConfig {
        let mut e = EmissionConfig::default();
        e.set_constant(rate);
        e.set_duration(duration);
        e.looping = looping;
        e.play();
        e
    }

    #[test]
    fn negative_rate_disables_emission() {
        let mut e = EmissionConfig::default();
        e.set_constant(-1.0);
        assert_eq!(*e.rate(), EmissionRate::None);
        e.set_curve(Curve::new());
        assert_eq!(*e.rate(), EmissionRate::None);
    }

    #[test]
    fn duration_never_negative() {
        let mut e = EmissionConfig::default();
        e.set_duration(-3.0);
        assert_eq!(e.duration(), 0.0);
    }

    #[test]
    fn fractional_queue_carries_over() {
        let mut e = constant(2.5, 100.0, true);
        assert_eq!(e.advance(1.0), 2);
        assert!((e.queued_particles() - 0.5).abs() < 1e-6);
        assert_eq!(e.advance(1.0), 3);
        assert!(e.queued_particles().abs() < 1e-6);
    }

    #[test]
    fn one_long_tick_matches_many_short_ones() {
        let expected = (3.3f32 * 10.0).floor() as i64;

        let mut once = constant(3.3, 100.0, true);
        let single = once.advance(10.0) as i64;

        let mut stepped = constant(3.3, 100.0, true);
        let total: i64 = (0..10).map(|_| stepped.advance(1.0) as i64).sum();

        assert!((single - expected).abs() <= 1, "single tick emitted {single}");
        assert!((total - expected).abs() <= 1, "unit ticks emitted {total}");
        assert!((single - total).abs() <= 1);
    }

    #[test]
    fn non_looping_stops_after_duration() {
        let mut e = constant(10.0, 1.0, false);
        assert_eq!(e.advance(1.0), 10);
        assert!(!e.is_playing());
        assert_eq!(e.advance(1.0), 0);
    }

    #[test]
    fn looping_restarts_time() {
        let mut e = constant(1.0, 2.0, true);
        e.advance(1.0);
        e.advance(1.0);
        assert!(e.is_playing());
        assert_eq!(e.current_time(), 0.0);
    }

    #[test]
    fn zero_duration_never_emits() {
        let mut e = constant(100.0, 0.0, true);
        assert_eq!(e.advance(1.0), 0);
    }

    #[test]
    fn curve_rate_uses_normalized_time() {
        let mut e = EmissionConfig::default();
        e.set_curve(Curve::from_points(&[(0.0, 0.0), (1.0, 10.0)]));
        e.set_duration(2.0);
        e.looping = true;
        e.play();
        // norm 0.5 -> 5/s for one second
        assert_eq!(e.advance(1.0), 5);
    }

    #[test]
    fn life_max_per_policy() {
        let mut life = LifeConfig::default();
        life.set_normal(2.0);
        assert_eq!(life.max_life(), 2.0);
        life.set_random_between(1.0, 4.0);
        assert_eq!(life.max_life(), 4.0);
        life.set_random_curve(Curve::from_points(&[(0.0, 3.0), (1.0, 6.0)]));
        assert_eq!(life.max_life(), 6.0);
    }

    #[test]
    fn uniform_scale_keeps_aspect() {
        let mut scale = ScaleConfig::default();
        scale.set_random_between(1.0, 3.0);
        let mut rng = ParticleRng::new(4);
        for _ in 0..20 {
            let s = scale.sample(&mut rng);
            assert_eq!(s.x, s.y);
            assert!((1.0..3.0).contains(&s.x));
        }
    }

    #[test]
    fn slice_size_policy() {
        let full = Vec2::new(64.0, 32.0);
        let mut tex = TextureConfig::default();
        tex.set_slice(full, Vec2::new(0.0, 8.0), ErrorPolicy::AutoCorrect)
            .unwrap();
        assert_eq!(tex.size(), full);

        let err = tex
            .set_slice(full, Vec2::new(-1.0, 8.0), ErrorPolicy::Throw)
            .unwrap_err();
        assert!(matches!(err, EmberError::InvalidEmitterValue(_)));
    }

    #[test]
    fn sheet_divides_texture() {
        let mut tex = TextureConfig::default();
        tex.set_sheet(Vec2::new(64.0, 32.0), 4, 0, ErrorPolicy::AutoCorrect)
            .unwrap();
        assert_eq!(tex.mode(), TextureMode::Sheet { columns: 4, rows: 1 });
        assert_eq!(tex.source_rect(), SourceRect::new(0, 0, 16, 32));
    }

    #[test]
    fn bounds_size_clamped() {
        let v = checked_bounds_size(Vec2::new(-5.0, 20.0), ErrorPolicy::AutoCorrect).unwrap();
        assert_eq!(v, Vec2::new(1.0, 20.0));
        assert!(checked_bounds_size(Vec2::ZERO, ErrorPolicy::Throw).is_err());
    }

    #[test]
    fn capacity_limit_per_policy() {
        assert_eq!(checked_capacity(64, ErrorPolicy::Throw).unwrap(), 64);
        assert_eq!(
            checked_capacity(usize::MAX, ErrorPolicy::AutoCorrect).unwrap(),
            MAX_CAPACITY
        );
        assert!(matches!(
            checked_capacity(MAX_CAPACITY + 1, ErrorPolicy::Throw),
            Err(EmberError::InvalidEmitterValue(_))
        ));
    }

    #[test]
    fn deep_copy_resets_playback() {
        let mut config = EmitterConfig::default();
        config.emission = constant(2.5, 10.0, true);
        config.emission.advance(1.0);
        let copy = config.deep_copy();
        assert_eq!(copy.emission.rate(), config.emission.rate());
        assert_eq!(copy.emission.queued_particles(), 0.0);
        assert!(!copy.emission.is_playing());
        assert_eq!(copy.color, config.color);
    }
}
