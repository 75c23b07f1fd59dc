//! TOML scene descriptions
//!
//! A scene file has an optional `[engine]` table (see [`EngineSettings`]),
//! any number of `[[emitter]]` tables with nested `[[emitter.module]]`
//! tables, and `[[area]]` tables:
//!
//! ```toml
//! [engine]
//! update_mode = "parallel_sync"
//!
//! [[emitter]]
//! name = "sparks"
//! capacity = 512
//! shape = "circle"
//! radius = 16
//! rate = 120
//! life = [0.5, 1.5]
//! speed = [40, 90]
//! blend_mode = "additive"
//!
//! [[emitter.module]]
//! kind = "alpha"
//! end = 0
//!
//! [[area]]
//! shape = "circle"
//! radius = 200
//! position = [0, 300]
//! mode = "attract"
//! ```
//!
//! Values are read leniently: integers and floats are interchangeable and
//! malformed values fall back to defaults. Scalar-or-pair fields like
//! `life = 2` / `life = [1, 3]` select a fixed or random value. Unknown
//! module kinds are an error.

use crate::area::{AreaModule, AreaModuleHandle, ForceMode, ForceModule};
use crate::config::{ColorConfig, EmissionRate, LifeConfig, ScaleConfig, SpeedConfig};
use crate::emitter::{BlendMode, Emitter, EmitterHandle, RenderKey, Space, DEFAULT_BOUNDS_SIZE};
use crate::engine::ParticleEngine;
use crate::module::{
    AnimationMode, Channel, ChannelModule, ChannelTransition, ColorModule, ColorTransition,
    ParticleModule, RotationTransition, ScaleModule, ScaleTransition, SpeedModule,
    SpeedTransition, SpriteRotationModule, TextureAnimationModule,
};
use crate::settings::{clamp_emission_step, EngineSettings};
use crate::shape::{AreaShape, CircleDirection, EmissionShape};
use ember_core::{Curve, EmberError, Hsla, Result, Vec2};
use log::warn;
use std::path::Path;

type Table = toml::value::Table;

/// A parsed scene file
#[derive(Debug, Clone, Default)]
pub struct SceneDesc {
    pub engine: EngineSettings,
    pub emitters: Vec<EmitterDesc>,
    pub areas: Vec<AreaDesc>,
}

/// What [`SceneDesc::instantiate`] created
#[derive(Debug, Default)]
pub struct Scene {
    pub emitters: Vec<EmitterHandle>,
    pub areas: Vec<AreaModuleHandle>,
}

impl SceneDesc {
    pub fn load(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    pub fn from_toml_str(source: &str) -> Result<Self> {
        let root: Table = toml::from_str(source)?;
        let mut scene = SceneDesc::default();

        if let Some(engine) = root.get("engine") {
            let mut settings = engine.clone().try_into::<EngineSettings>()?;
            settings.max_emission_time_step = clamp_emission_step(settings.max_emission_time_step);
            scene.engine = settings;
        }

        for (index, table) in tables(&root, "emitter")?.into_iter().enumerate() {
            let desc = EmitterDesc::from_toml(table)
                .map_err(|e| EmberError::ParseError(format!("emitter #{index}: {e}")))?;
            scene.emitters.push(desc);
        }
        for table in tables(&root, "area")? {
            scene.areas.push(AreaDesc::from_toml(table));
        }
        Ok(scene)
    }

    /// Spawn every emitter and register every area module on `engine`
    pub fn instantiate(&self, engine: &mut ParticleEngine) -> Result<Scene> {
        let mut scene = Scene::default();
        for desc in &self.emitters {
            scene.emitters.push(engine.spawn(desc)?);
        }
        for desc in &self.areas {
            let area = desc.build();
            engine.add_area_module(area.clone())?;
            scene.areas.push(area);
        }
        Ok(scene)
    }
}

/// Texture layout of a described emitter
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TextureDesc {
    Whole(Vec2),
    Slice { full_size: Vec2, size: Vec2 },
    Sheet { full_size: Vec2, columns: u32, rows: u32 },
}

#[derive(Debug, Clone)]
pub struct EmitterDesc {
    pub name: String,
    pub capacity: usize,
    pub shape: EmissionShape,
    pub position: Vec2,
    pub rotation: f32,
    pub bounds_size: Vec2,
    pub layer: u8,
    pub blend_mode: BlendMode,
    pub space: Space,
    pub enabled: bool,
    pub emission_enabled: bool,
    pub autoplay: bool,
    pub seed: Option<u32>,
    pub life: LifeConfig,
    pub speed: SpeedConfig,
    pub scale: ScaleConfig,
    pub color: ColorConfig,
    pub rate: EmissionRate,
    pub duration: f32,
    pub looping: bool,
    pub texture: Option<TextureDesc>,
    pub modules: Vec<ModuleDesc>,
}

impl Default for EmitterDesc {
    fn default() -> Self {
        Self {
            name: String::new(),
            capacity: 256,
            shape: EmissionShape::Point,
            position: Vec2::ZERO,
            rotation: 0.0,
            bounds_size: DEFAULT_BOUNDS_SIZE,
            layer: 0,
            blend_mode: BlendMode::Alpha,
            space: Space::World,
            enabled: true,
            emission_enabled: true,
            autoplay: true,
            seed: None,
            life: LifeConfig::default(),
            speed: SpeedConfig::default(),
            scale: ScaleConfig::default(),
            color: ColorConfig::default(),
            rate: EmissionRate::None,
            duration: 1.0,
            looping: true,
            texture: None,
            modules: Vec::new(),
        }
    }
}

impl EmitterDesc {
    /// Parse one `[[emitter]]` table
    pub fn from_toml(table: &Table) -> Result<Self> {
        let mut desc = Self::default();

        if let Some(v) = table.get("name").and_then(|v| v.as_str()) {
            desc.name = v.to_string();
        }
        if let Some(v) = table.get("capacity") {
            desc.capacity = v.as_integer().unwrap_or(256).max(0) as usize;
        }
        desc.shape = emission_shape(table);
        if let Some(v) = table.get("position") {
            desc.position = toml_vec2(v, desc.position);
        }
        if let Some(v) = table.get("rotation") {
            desc.rotation = toml_f32(v, 0.0);
        }
        if let Some(v) = table.get("bounds") {
            desc.bounds_size = toml_vec2(v, desc.bounds_size);
        }
        if let Some(v) = table.get("layer") {
            desc.layer = v.as_integer().unwrap_or(0).clamp(0, u8::MAX as i64) as u8;
        }
        if let Some(v) = table.get("blend_mode").and_then(|v| v.as_str()) {
            desc.blend_mode = BlendMode::from_name(v).unwrap_or_else(|| {
                warn!("unknown blend mode '{v}', using alpha");
                BlendMode::Alpha
            });
        }
        if let Some(v) = table.get("space").and_then(|v| v.as_str()) {
            desc.space = match v {
                "local" => Space::Local,
                _ => Space::World,
            };
        }
        if let Some(v) = table.get("enabled") {
            desc.enabled = v.as_bool().unwrap_or(true);
        }
        if let Some(v) = table.get("emission_enabled") {
            desc.emission_enabled = v.as_bool().unwrap_or(true);
        }
        if let Some(v) = table.get("autoplay") {
            desc.autoplay = v.as_bool().unwrap_or(true);
        }
        if let Some(v) = table.get("seed").and_then(|v| v.as_integer()) {
            desc.seed = Some(v as u32);
        }

        // Spawn values
        if let Some(v) = table.get("life") {
            match toml_range(v) {
                Some(Range::Fixed(x)) => desc.life.set_normal(x),
                Some(Range::Between(min, max)) => desc.life.set_random_between(min, max),
                None => {}
            }
        }
        if let Some(curve) = table.get("life_curve").and_then(toml_curve) {
            desc.life.set_random_curve(curve);
        }
        if let Some(v) = table.get("speed") {
            match toml_range(v) {
                Some(Range::Fixed(x)) => desc.speed.set_normal(x),
                Some(Range::Between(min, max)) => desc.speed.set_random_between(min, max),
                None => {}
            }
        }
        if let Some(curve) = table.get("speed_curve").and_then(toml_curve) {
            desc.speed.set_random_curve(curve);
        }
        if let Some(v) = table.get("scale") {
            match toml_range(v) {
                Some(Range::Fixed(x)) => desc.scale.set_normal(x),
                Some(Range::Between(min, max)) => desc.scale.set_random_between(min, max),
                None => {}
            }
        }
        if let Some(curve) = table.get("scale_curve").and_then(toml_curve) {
            desc.scale.set_random_curve(curve);
        }
        if let Some(v) = table.get("color") {
            desc.color.set_normal(toml_hsla(v, Hsla::WHITE));
        }
        if let (Some(min), Some(max)) = (table.get("color_min"), table.get("color_max")) {
            desc.color
                .set_random_between(toml_hsla(min, Hsla::WHITE), toml_hsla(max, Hsla::WHITE));
        }

        // Emission
        if let Some(v) = table.get("rate") {
            let rate = toml_f32(v, 0.0);
            desc.rate = if rate < 0.0 {
                EmissionRate::None
            } else {
                EmissionRate::Constant(rate)
            };
        }
        if let Some(curve) = table.get("rate_curve").and_then(toml_curve) {
            desc.rate = EmissionRate::Curve(curve);
        }
        if let Some(v) = table.get("duration") {
            desc.duration = toml_f32(v, desc.duration).max(0.0);
        }
        if let Some(v) = table.get("looping") {
            desc.looping = v.as_bool().unwrap_or(true);
        }

        desc.texture = texture(table);

        for module in tables(table, "module")? {
            desc.modules.push(ModuleDesc::from_toml(module)?);
        }
        Ok(desc)
    }

    /// Configure `emitter` from this description. Value errors follow the
    /// emitter's error policy.
    pub fn apply(&self, emitter: &mut Emitter) -> Result<()> {
        emitter.set_name(self.name.clone());
        emitter.set_render_key(RenderKey::new(self.layer, self.blend_mode));
        emitter.set_space(self.space);
        emitter.set_rotation(self.rotation);
        emitter.set_bounds_size(self.bounds_size)?;
        emitter.set_position(self.position);
        if let Some(seed) = self.seed {
            emitter.seed(seed);
        }

        {
            let config = emitter.config_mut();
            config.life = self.life.clone();
            config.speed = self.speed.clone();
            config.scale = self.scale.clone();
            config.color = self.color.clone();
            config.emission.set_duration(self.duration);
            config.emission.looping = self.looping;
            match &self.rate {
                EmissionRate::None => config.emission.set_none(),
                EmissionRate::Constant(rate) => config.emission.set_constant(*rate),
                EmissionRate::Curve(curve) => config.emission.set_curve(curve.clone()),
            }
        }

        match self.texture {
            Some(TextureDesc::Whole(full_size)) => emitter.set_texture_whole(full_size),
            Some(TextureDesc::Slice { full_size, size }) => emitter.set_texture_slice(full_size, size)?,
            Some(TextureDesc::Sheet {
                full_size,
                columns,
                rows,
            }) => emitter.set_texture_sheet(full_size, columns, rows)?,
            None => {}
        }

        for module in &self.modules {
            emitter.add_module(module.build());
        }

        emitter.set_enabled(self.enabled);
        emitter.set_emission_enabled(self.emission_enabled);
        if self.autoplay {
            emitter.play();
        }
        Ok(())
    }
}

fn emission_shape(table: &Table) -> EmissionShape {
    let get_f32 = |key: &str, default: f32| table.get(key).map_or(default, |v| toml_f32(v, default));
    let get_bool = |key: &str| table.get(key).and_then(|v| v.as_bool()).unwrap_or(false);

    match table.get("shape").and_then(|v| v.as_str()).unwrap_or("point") {
        "circle" => EmissionShape::Circle {
            radius: get_f32("radius", 1.0),
            edge_only: get_bool("edge_only"),
            uniform: get_bool("uniform"),
            direction: match table.get("direction").and_then(|v| v.as_str()) {
                Some("inward") => CircleDirection::Inward,
                Some("random") => CircleDirection::Random,
                _ => CircleDirection::Outward,
            },
        },
        "rectangle" => EmissionShape::Rectangle {
            size: table
                .get("size")
                .map_or(Vec2::ONE, |v| toml_vec2(v, Vec2::ONE)),
            edge_only: get_bool("edge_only"),
        },
        "line" => EmissionShape::Line {
            length: get_f32("length", 1.0),
            random_direction: get_bool("random_direction"),
        },
        "point" => EmissionShape::Point,
        other => {
            warn!("unknown emission shape '{other}', using point");
            EmissionShape::Point
        }
    }
}

fn texture(table: &Table) -> Option<TextureDesc> {
    let full_size = toml_vec2(table.get("texture_size")?, Vec2::ONE);
    if let Some(v) = table.get("sheet") {
        let [columns, rows] = toml_vec2(v, Vec2::ONE).to_array();
        return Some(TextureDesc::Sheet {
            full_size,
            columns: columns.max(0.0) as u32,
            rows: rows.max(0.0) as u32,
        });
    }
    if let Some(v) = table.get("slice") {
        return Some(TextureDesc::Slice {
            full_size,
            size: toml_vec2(v, full_size),
        });
    }
    Some(TextureDesc::Whole(full_size))
}

/// A particle module to attach, as read from `[[emitter.module]]`
#[derive(Debug, Clone, PartialEq)]
pub enum ModuleKind {
    Channel(Channel, ChannelTransition),
    Color(ColorTransition),
    Scale { transition: ScaleTransition, absolute: bool },
    Speed { transition: SpeedTransition, absolute: bool },
    Rotation(RotationTransition),
    TextureAnimation { columns: u32, rows: u32, mode: AnimationMode },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModuleDesc {
    pub kind: ModuleKind,
    pub enabled: bool,
}

impl ModuleDesc {
    pub fn from_toml(table: &Table) -> Result<Self> {
        let kind_name = table
            .get("kind")
            .and_then(|v| v.as_str())
            .ok_or_else(|| EmberError::ParseError("module without a 'kind'".into()))?;
        let f = |key: &str| table.get(key).map(|v| toml_f32(v, 0.0));
        let curve = |key: &str| table.get(key).and_then(toml_curve);
        let absolute = table.get("absolute").and_then(|v| v.as_bool()).unwrap_or(false);

        let kind = match kind_name {
            "hue" | "saturation" | "lightness" | "alpha" => {
                let channel = match kind_name {
                    "hue" => Channel::Hue,
                    "saturation" => Channel::Saturation,
                    "lightness" => Channel::Lightness,
                    _ => Channel::Alpha,
                };
                let transition = if let Some(c) = curve("curve") {
                    ChannelTransition::Curve(c)
                } else if let (Some(min), Some(max)) = (f("min"), f("max")) {
                    ChannelTransition::RandomLerp { min, max }
                } else {
                    ChannelTransition::Lerp {
                        end: f("end").unwrap_or(0.0),
                    }
                };
                ModuleKind::Channel(channel, transition)
            }
            "color" => {
                let color = |key: &str| table.get(key).map(|v| toml_hsla(v, Hsla::WHITE));
                let transition = match (color("min"), color("max")) {
                    (Some(min), Some(max)) => ColorTransition::RandomLerp { min, max },
                    _ => ColorTransition::Lerp {
                        end: color("end").unwrap_or(Hsla::WHITE),
                    },
                };
                ModuleKind::Color(transition)
            }
            "scale" => {
                let transition = if let Some(c) = curve("random_curve") {
                    ScaleTransition::RandomCurve(c)
                } else if let Some(c) = curve("curve") {
                    ScaleTransition::Curve(c)
                } else {
                    ScaleTransition::Lerp {
                        start: f("start").unwrap_or(1.0),
                        end: f("end").unwrap_or(1.0),
                    }
                };
                ModuleKind::Scale { transition, absolute }
            }
            "speed" => {
                let transition = if let Some(c) = curve("random_curve") {
                    SpeedTransition::RandomCurve(c)
                } else if let Some(c) = curve("curve") {
                    SpeedTransition::Curve(c)
                } else {
                    SpeedTransition::Lerp {
                        start: f("start").unwrap_or(0.0),
                        end: f("end").unwrap_or(0.0),
                    }
                };
                ModuleKind::Speed { transition, absolute }
            }
            "rotation" => {
                let transition = if let Some(c) = curve("random_curve") {
                    RotationTransition::RandomCurve(c)
                } else if let Some(c) = curve("curve") {
                    RotationTransition::Curve(c)
                } else if let (Some(min), Some(max)) = (f("min"), f("max")) {
                    RotationTransition::RandomConstant { min, max }
                } else if let (Some(start), Some(end)) = (f("start"), f("end")) {
                    RotationTransition::Lerp { start, end }
                } else {
                    RotationTransition::Constant(f("value").unwrap_or(0.0))
                };
                ModuleKind::Rotation(transition)
            }
            "texture_animation" => {
                let count = |key: &str| {
                    table
                        .get(key)
                        .and_then(|v| v.as_integer())
                        .unwrap_or(1)
                        .max(1) as u32
                };
                let mode = match f("fps") {
                    Some(fps) => AnimationMode::Looping { fps },
                    None => AnimationMode::OverLifetime,
                };
                ModuleKind::TextureAnimation {
                    columns: count("columns"),
                    rows: count("rows"),
                    mode,
                }
            }
            other => {
                return Err(EmberError::ParseError(format!("unknown module kind '{other}'")));
            }
        };

        Ok(Self {
            kind,
            enabled: table.get("enabled").and_then(|v| v.as_bool()).unwrap_or(true),
        })
    }

    pub fn build(&self) -> Box<dyn ParticleModule> {
        let mut module: Box<dyn ParticleModule> = match &self.kind {
            ModuleKind::Channel(channel, transition) => {
                Box::new(ChannelModule::new(*channel, transition.clone()))
            }
            ModuleKind::Color(transition) => Box::new(ColorModule::new(transition.clone())),
            ModuleKind::Scale {
                transition,
                absolute,
            } => {
                let mut scale = ScaleModule::new(transition.clone());
                scale.set_absolute(*absolute);
                Box::new(scale)
            }
            ModuleKind::Speed {
                transition,
                absolute,
            } => {
                let mut speed = SpeedModule::new(transition.clone());
                speed.set_absolute(*absolute);
                Box::new(speed)
            }
            ModuleKind::Rotation(transition) => {
                Box::new(SpriteRotationModule::new(transition.clone()))
            }
            ModuleKind::TextureAnimation {
                columns,
                rows,
                mode,
            } => Box::new(TextureAnimationModule::new(*columns, *rows, *mode)),
        };
        module.set_enabled(self.enabled);
        module
    }
}

/// An area module to register, as read from `[[area]]`
#[derive(Debug, Clone, PartialEq)]
pub struct AreaDesc {
    pub shape: AreaShape,
    pub position: Vec2,
    pub force: ForceModule,
}

impl AreaDesc {
    pub fn from_toml(table: &Table) -> Self {
        let get_f32 = |key: &str, default: f32| table.get(key).map_or(default, |v| toml_f32(v, default));

        let shape = match table.get("shape").and_then(|v| v.as_str()).unwrap_or("circle") {
            "point" => AreaShape::Point,
            "rectangle" => AreaShape::Rectangle {
                size: table
                    .get("size")
                    .map_or(Vec2::ONE, |v| toml_vec2(v, Vec2::ONE)),
            },
            _ => AreaShape::Circle {
                radius: get_f32("radius", 1.0),
            },
        };

        let defaults = ForceModule::default();
        let mut force = ForceModule::default();
        force.mode = match table.get("mode").and_then(|v| v.as_str()) {
            Some("repel") => ForceMode::Repel,
            _ => ForceMode::Attract,
        };
        force.set_max_distance(get_f32("max_distance", defaults.max_distance()));
        force.set_min_distance(get_f32("min_distance", defaults.min_distance()));
        force.set_intensity(get_f32("intensity", defaults.intensity()));
        force.set_speed_increase(get_f32("speed_increase", defaults.speed_increase()));

        Self {
            shape,
            position: table
                .get("position")
                .map_or(Vec2::ZERO, |v| toml_vec2(v, Vec2::ZERO)),
            force,
        }
    }

    pub fn build(&self) -> AreaModuleHandle {
        AreaModule::force(self.shape, self.position, self.force.clone())
    }
}

// ── TOML helpers (handle integer/float coercion) ──

/// Array of tables under `key`; a missing key is an empty list
fn tables<'a>(table: &'a Table, key: &str) -> Result<Vec<&'a Table>> {
    let Some(value) = table.get(key) else {
        return Ok(Vec::new());
    };
    let array = value
        .as_array()
        .ok_or_else(|| EmberError::ParseError(format!("'{key}' must be an array of tables")))?;
    array
        .iter()
        .map(|v| {
            v.as_table()
                .ok_or_else(|| EmberError::ParseError(format!("'{key}' entries must be tables")))
        })
        .collect()
}

fn toml_f32(v: &toml::Value, default: f32) -> f32 {
    v.as_float()
        .map(|f| f as f32)
        .or_else(|| v.as_integer().map(|i| i as f32))
        .unwrap_or(default)
}

fn toml_vec2(v: &toml::Value, default: Vec2) -> Vec2 {
    if let Some(arr) = v.as_array() {
        if arr.len() >= 2 {
            return Vec2::new(toml_f32(&arr[0], default.x), toml_f32(&arr[1], default.y));
        }
    }
    default
}

fn toml_hsla(v: &toml::Value, default: Hsla) -> Hsla {
    if let Some(arr) = v.as_array() {
        if arr.len() >= 4 {
            return Hsla::new(
                toml_f32(&arr[0], default.hue),
                toml_f32(&arr[1], default.saturation),
                toml_f32(&arr[2], default.lightness),
                toml_f32(&arr[3], default.alpha),
            );
        }
    }
    default
}

/// `[[position, value], ...]`; pairs that don't parse are skipped
fn toml_curve(v: &toml::Value) -> Option<Curve> {
    let points: Vec<(f32, f32)> = v
        .as_array()?
        .iter()
        .filter_map(|key| {
            let pair = key.as_array()?;
            match pair.as_slice() {
                [p, v] => Some((toml_f32(p, 0.0), toml_f32(v, 0.0))),
                _ => None,
            }
        })
        .collect();
    (!points.is_empty()).then(|| Curve::from_points(&points))
}

enum Range {
    Fixed(f32),
    Between(f32, f32),
}

fn toml_range(v: &toml::Value) -> Option<Range> {
    if let Some(arr) = v.as_array() {
        if arr.len() >= 2 {
            return Some(Range::Between(toml_f32(&arr[0], 0.0), toml_f32(&arr[1], 0.0)));
        }
        return None;
    }
    if v.is_float() || v.is_integer() {
        return Some(Range::Fixed(toml_f32(v, 0.0)));
    }
    None
}
