//! Spatial and color types

use bytemuck::{Pod, Zeroable};
use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::math::lerp;

/// Color in HSLA space.
///
/// Hue is in degrees `[0, 360]`, saturation and lightness in `[0, 100]`,
/// alpha in `[0, 1]`.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
pub struct Hsla {
    pub hue: f32,
    pub saturation: f32,
    pub lightness: f32,
    pub alpha: f32,
}

impl Hsla {
    pub const WHITE: Self = Self::new(0.0, 0.0, 100.0, 1.0);
    pub const BLACK: Self = Self::new(0.0, 0.0, 0.0, 1.0);
    pub const TRANSPARENT: Self = Self::new(0.0, 0.0, 0.0, 0.0);

    pub const fn new(hue: f32, saturation: f32, lightness: f32, alpha: f32) -> Self {
        Self {
            hue,
            saturation,
            lightness,
            alpha,
        }
    }

    pub fn from_array(arr: [f32; 4]) -> Self {
        Self::new(arr[0], arr[1], arr[2], arr[3])
    }

    pub fn to_array(&self) -> [f32; 4] {
        [self.hue, self.saturation, self.lightness, self.alpha]
    }

    /// Component-wise linear interpolation
    pub fn lerp(a: Self, b: Self, t: f32) -> Self {
        Self {
            hue: lerp(a.hue, b.hue, t),
            saturation: lerp(a.saturation, b.saturation, t),
            lightness: lerp(a.lightness, b.lightness, t),
            alpha: lerp(a.alpha, b.alpha, t),
        }
    }

    /// Convert to RGBA with every channel in `[0, 1]`
    pub fn to_rgba(&self) -> [f32; 4] {
        let s = self.saturation / 100.0;
        let l = self.lightness / 100.0;
        if s == 0.0 {
            return [l, l, l, self.alpha];
        }

        let h = self.hue.rem_euclid(360.0) / 360.0;
        let q = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
        let p = 2.0 * l - q;

        [
            component_from_hue(p, q, h + 1.0 / 3.0),
            component_from_hue(p, q, h),
            component_from_hue(p, q, h - 1.0 / 3.0),
            self.alpha,
        ]
    }

    /// Build from RGBA channels in `[0, 1]`
    pub fn from_rgba(rgba: [f32; 4]) -> Self {
        let [r, g, b, a] = rgba;
        let max = r.max(g).max(b);
        let min = r.min(g).min(b);
        let chroma = max - min;
        let sum = max + min;
        let l = sum * 0.5;

        if chroma == 0.0 {
            return Self::new(0.0, 0.0, l * 100.0, a);
        }

        let h = if r == max {
            (60.0 * (g - b) / chroma + 360.0) % 360.0
        } else if g == max {
            60.0 * (b - r) / chroma + 120.0
        } else {
            60.0 * (r - g) / chroma + 240.0
        };
        let s = if l <= 0.5 {
            chroma / sum
        } else {
            chroma / (2.0 - sum)
        };

        Self::new(h, s * 100.0, l * 100.0, a)
    }
}

impl Default for Hsla {
    fn default() -> Self {
        Self::WHITE
    }
}

fn component_from_hue(p: f32, q: f32, mut t: f32) -> f32 {
    if t < 0.0 {
        t += 1.0;
    }
    if t > 1.0 {
        t -= 1.0;
    }
    if t < 1.0 / 6.0 {
        return p + (q - p) * 6.0 * t;
    }
    if t < 0.5 {
        return q;
    }
    if t < 2.0 / 3.0 {
        return p + (q - p) * (2.0 / 3.0 - t) * 6.0;
    }
    p
}

/// Integer texture sub-rectangle. Opaque to the simulation.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable, Serialize, Deserialize)]
pub struct SourceRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl SourceRect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// Axis-aligned rectangle: top-left corner plus size.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Bounds {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Bounds of `size` centered on `center`
    pub fn from_center(center: Vec2, size: Vec2) -> Self {
        Self {
            x: center.x - size.x / 2.0,
            y: center.y - size.y / 2.0,
            width: size.x,
            height: size.y,
        }
    }

    pub fn min(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }

    pub fn max(&self) -> Vec2 {
        Vec2::new(self.x + self.width, self.y + self.height)
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Overlap test; touching edges count as intersecting
    pub fn intersects(&self, other: &Bounds) -> bool {
        self.x <= other.x + other.width
            && other.x <= self.x + self.width
            && self.y <= other.y + other.height
            && other.y <= self.y + self.height
    }

    pub fn contains(&self, point: Vec2) -> bool {
        point.x >= self.x
            && point.x <= self.x + self.width
            && point.y >= self.y
            && point.y <= self.y + self.height
    }

    /// Squared distance from `point` to the closest point of the rectangle
    pub fn distance_squared(&self, point: Vec2) -> f32 {
        let closest = point.clamp(self.min(), self.max());
        closest.distance_squared(point)
    }
}
