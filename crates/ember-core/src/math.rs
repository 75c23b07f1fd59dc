//! Scalar helpers shared by the simulation

/// Linear interpolation between two floats
#[inline]
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Value between `min` and `max` at `ratio`. Same as [`lerp`], reads better
/// when sampling a random range.
#[inline]
pub fn between(min: f32, max: f32, ratio: f32) -> f32 {
    min + (max - min) * ratio
}

/// Inverse of [`between`]: where `val` sits between `min` and `max`.
///
/// `min` may be greater than `max`, which inverts the ratio (used by the
/// force falloff where the maximum distance maps to zero).
#[inline]
pub fn ratio(min: f32, max: f32, val: f32) -> f32 {
    (val - min) / (max - min)
}

/// Clamp that never panics, unlike `f32::clamp` with `min > max`.
/// `min` wins when the range is inverted.
#[inline]
pub fn clamp(val: f32, min: f32, max: f32) -> f32 {
    if val < min {
        return min;
    }
    if val > max {
        return max;
    }
    val
}

/// Order a pair so the first element is the smaller one
#[inline]
pub fn ordered(a: f32, b: f32) -> (f32, f32) {
    if a > b {
        (b, a)
    } else {
        (a, b)
    }
}
