//! Keyframed curves: binary search + linear interpolation.
//!
//! Curves drive emission rates and value-over-life transitions. They are
//! immutable once built: every owner holds its own clone, so evaluation from
//! several emitter threads at once needs no locking.

use serde::{Deserialize, Serialize};

use crate::math::lerp;

/// A single keyframe.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurveKey {
    pub position: f32,
    pub value: f32,
}

impl CurveKey {
    pub const fn new(position: f32, value: f32) -> Self {
        Self { position, value }
    }
}

/// Piecewise-linear curve over sorted keyframes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<CurveKey>", into = "Vec<CurveKey>")]
pub struct Curve {
    keys: Vec<CurveKey>,
}

impl Curve {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(position, value)` pairs in any order
    pub fn from_points(points: &[(f32, f32)]) -> Self {
        Self::from(
            points
                .iter()
                .map(|&(p, v)| CurveKey::new(p, v))
                .collect::<Vec<_>>(),
        )
    }

    /// Two-key curve from `start` at 0 to `end` at 1
    pub fn linear(start: f32, end: f32) -> Self {
        Self::from_points(&[(0.0, start), (1.0, end)])
    }

    /// Insert a key, keeping keys sorted by position
    pub fn add(&mut self, position: f32, value: f32) {
        let idx = self
            .keys
            .partition_point(|k| k.position.total_cmp(&position).is_le());
        self.keys.insert(idx, CurveKey::new(position, value));
    }

    pub fn keys(&self) -> &[CurveKey] {
        &self.keys
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Largest key value, or 0 for an empty curve
    pub fn max_value(&self) -> f32 {
        self.keys
            .iter()
            .map(|k| k.value)
            .fold(None, |acc: Option<f32>, v| Some(acc.map_or(v, |a| a.max(v))))
            .unwrap_or(0.0)
    }

    /// Sample the curve at `t`.
    ///
    /// Clamps to the first/last key outside the key range and returns 0 for
    /// an empty curve.
    pub fn evaluate(&self, t: f32) -> f32 {
        let keys = &self.keys;
        let Some(first) = keys.first() else {
            return 0.0;
        };
        if t <= first.position {
            return first.value;
        }
        let last = &keys[keys.len() - 1];
        if t >= last.position {
            return last.value;
        }

        let idx = match keys.binary_search_by(|k| k.position.total_cmp(&t)) {
            Ok(i) => return keys[i].value,
            Err(i) => i,
        };

        let prev = &keys[idx - 1];
        let next = &keys[idx];
        let span = next.position - prev.position;
        if span <= 0.0 {
            return prev.value;
        }
        lerp(prev.value, next.value, (t - prev.position) / span)
    }
}

impl From<Vec<CurveKey>> for Curve {
    fn from(mut keys: Vec<CurveKey>) -> Self {
        keys.sort_by(|a, b| a.position.total_cmp(&b.position));
        Self { keys }
    }
}

impl From<Curve> for Vec<CurveKey> {
    fn from(curve: Curve) -> Self {
        curve.keys
    }
}

/// Two curves evaluated together (scale X/Y).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Curve2 {
    pub x: Curve,
    pub y: Curve,
}

impl Curve2 {
    pub fn new(x: Curve, y: Curve) -> Self {
        Self { x, y }
    }

    /// Same curve on both axes
    pub fn uniform(curve: Curve) -> Self {
        Self {
            x: curve.clone(),
            y: curve,
        }
    }
}

/// Four curves evaluated together (HSLA channels).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Curve4 {
    pub x: Curve,
    pub y: Curve,
    pub z: Curve,
    pub w: Curve,
}

impl Curve4 {
    pub fn new(x: Curve, y: Curve, z: Curve, w: Curve) -> Self {
        Self { x, y, z, w }
    }

    pub fn evaluate(&self, t: f32) -> [f32; 4] {
        [
            self.x.evaluate(t),
            self.y.evaluate(t),
            self.z.evaluate(t),
            self.w.evaluate(t),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_curve_evaluates_to_zero() {
        let curve = Curve::new();
        assert_eq!(curve.evaluate(0.5), 0.0);
        assert_eq!(curve.max_value(), 0.0);
    }

    #[test]
    fn evaluate_clamps_outside_range() {
        let curve = Curve::from_points(&[(0.25, 2.0), (0.75, 6.0)]);
        assert_eq!(curve.evaluate(0.0), 2.0);
        assert_eq!(curve.evaluate(1.0), 6.0);
    }

    #[test]
    fn evaluate_interpolates_between_keys() {
        let curve = Curve::from_points(&[(1.0, 10.0), (0.0, 0.0), (0.5, 2.0)]);
        assert!((curve.evaluate(0.25) - 1.0).abs() < 1e-6);
        assert!((curve.evaluate(0.75) - 6.0).abs() < 1e-6);
        assert_eq!(curve.evaluate(0.5), 2.0);
    }

    #[test]
    fn add_keeps_keys_sorted() {
        let mut curve = Curve::new();
        curve.add(1.0, 1.0);
        curve.add(0.0, 5.0);
        curve.add(0.5, 3.0);
        let positions: Vec<f32> = curve.keys().iter().map(|k| k.position).collect();
        assert_eq!(positions, vec![0.0, 0.5, 1.0]);
        assert_eq!(curve.max_value(), 5.0);
    }

    #[test]
    fn curve_serializes_as_key_list() {
        let curve = Curve::linear(0.0, 1.0);
        let json = serde_json::to_string(&curve).unwrap();
        assert!(json.starts_with('['));
        let back: Curve = serde_json::from_str(&json).unwrap();
        assert_eq!(back, curve);
    }
}
