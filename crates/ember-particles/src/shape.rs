//! Emission shapes (where particles spawn) and area shapes (what an area
//! module covers)

use crate::rand::ParticleRng;
use ember_core::{Bounds, Vec2};

/// Initial heading of particles spawned from a circle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CircleDirection {
    #[default]
    Outward,
    Inward,
    Random,
}

/// Spawn shape of an emitter.
///
/// Positions are emitter-local; the emitter offsets them by its world
/// position.
#[derive(Debug, Clone, PartialEq)]
pub enum EmissionShape {
    Point,
    Circle {
        radius: f32,
        /// Spawn on the circumference only
        edge_only: bool,
        /// Spread the particles of one burst evenly around the circle
        uniform: bool,
        direction: CircleDirection,
    },
    Rectangle {
        size: Vec2,
        edge_only: bool,
    },
    Line {
        length: f32,
        /// Random heading instead of the line normal
        random_direction: bool,
    },
}

/// One sampled spawn point
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShapeSample {
    pub position: Vec2,
    pub direction: Vec2,
}

impl EmissionShape {
    pub fn circle(radius: f32) -> Self {
        Self::Circle {
            radius,
            edge_only: false,
            uniform: false,
            direction: CircleDirection::Outward,
        }
    }

    pub fn rectangle(size: Vec2) -> Self {
        Self::Rectangle {
            size,
            edge_only: false,
        }
    }

    pub fn line(length: f32) -> Self {
        Self::Line {
            length,
            random_direction: false,
        }
    }

    /// Sample a spawn point.
    ///
    /// `ratio` is `i / amount` for the i-th particle of a burst and is used
    /// by shapes that distribute a burst evenly.
    pub fn sample(&self, ratio: f32, rotation: f32, rng: &mut ParticleRng) -> ShapeSample {
        match *self {
            EmissionShape::Point => ShapeSample {
                position: Vec2::ZERO,
                direction: rng.unit_vector(),
            },
            EmissionShape::Circle {
                radius,
                edge_only,
                uniform,
                direction,
            } => {
                let angle = if uniform {
                    ratio * std::f32::consts::TAU
                } else {
                    rng.angle()
                };
                let normal = Vec2::from_angle(angle + rotation);
                let distance = if edge_only {
                    radius
                } else {
                    rng.range(0.0, radius)
                };
                let heading = match direction {
                    CircleDirection::Outward => normal,
                    CircleDirection::Inward => -normal,
                    CircleDirection::Random => rng.unit_vector(),
                };
                ShapeSample {
                    position: normal * distance,
                    direction: heading,
                }
            }
            EmissionShape::Rectangle { size, edge_only } => {
                let half = size / 2.0;
                let local = if edge_only {
                    perimeter_point(size, rng.next_f32()) - half
                } else {
                    Vec2::new(rng.range(-half.x, half.x), rng.range(-half.y, half.y))
                };
                ShapeSample {
                    position: Vec2::from_angle(rotation).rotate(local),
                    direction: rng.unit_vector(),
                }
            }
            EmissionShape::Line {
                length,
                random_direction,
            } => {
                let axis = Vec2::from_angle(rotation);
                let offset = rng.range(-length / 2.0, length / 2.0);
                let direction = if random_direction {
                    rng.unit_vector()
                } else {
                    axis.perp()
                };
                ShapeSample {
                    position: axis * offset,
                    direction,
                }
            }
        }
    }
}

impl Default for EmissionShape {
    fn default() -> Self {
        Self::Point
    }
}

/// Point on the outline of a `size` rectangle anchored at the origin, `t` in
/// [0, 1) walks the perimeter clockwise from the top-left corner.
fn perimeter_point(size: Vec2, t: f32) -> Vec2 {
    let perimeter = 2.0 * (size.x + size.y);
    if perimeter <= 0.0 {
        return Vec2::ZERO;
    }
    let mut d = t * perimeter;
    if d < size.x {
        return Vec2::new(d, 0.0);
    }
    d -= size.x;
    if d < size.y {
        return Vec2::new(size.x, d);
    }
    d -= size.y;
    if d < size.x {
        return Vec2::new(size.x - d, size.y);
    }
    d -= size.x;
    Vec2::new(0.0, (size.y - d).max(0.0))
}

/// Region covered by an area module, centered on the module position
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AreaShape {
    Point,
    Circle { radius: f32 },
    Rectangle { size: Vec2 },
}

impl AreaShape {
    pub fn intersects_point(&self, center: Vec2, point: Vec2) -> bool {
        match *self {
            AreaShape::Point => point == center,
            AreaShape::Circle { radius } => center.distance_squared(point) <= radius * radius,
            AreaShape::Rectangle { size } => Bounds::from_center(center, size).contains(point),
        }
    }

    pub fn intersects_bounds(&self, center: Vec2, bounds: &Bounds) -> bool {
        match *self {
            AreaShape::Point => bounds.contains(center),
            AreaShape::Circle { radius } => bounds.distance_squared(center) <= radius * radius,
            AreaShape::Rectangle { size } => Bounds::from_center(center, size).intersects(bounds),
        }
    }

    /// Axis-aligned extent of the shape around `center`
    pub fn bounds(&self, center: Vec2) -> Bounds {
        match *self {
            AreaShape::Point => Bounds::from_center(center, Vec2::ZERO),
            AreaShape::Circle { radius } => Bounds::from_center(center, Vec2::splat(radius * 2.0)),
            AreaShape::Rectangle { size } => Bounds::from_center(center, size),
        }
    }
}
