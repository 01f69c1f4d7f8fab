//! Primitive solids and the math shared by every region shape.
//!
//! Overlap between two shapes is decided by [`Solid::overlaps`], a function
//! of the unordered pair: each combination of primitives has exactly one
//! arm and the arm's expression is symmetric in its operands, so
//! `a.overlaps(b) == b.overlaps(a)` for every pair.

use glam::DVec3;

/// One of the primitive volumes a region can occupy.
///
/// All solids are axis-aligned. Cylinders stand upright: `base` is the
/// centre of the bottom disc.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Solid {
    Cuboid { min: DVec3, max: DVec3 },
    Cylinder { base: DVec3, radius: f64, height: f64 },
    Sphere { center: DVec3, radius: f64 },
}

impl Solid {
    /// Minimum corner of the bounding box.
    pub fn min(&self) -> DVec3 {
        match *self {
            Self::Cuboid { min, .. } => min,
            Self::Cylinder { base, radius, .. } => {
                DVec3::new(base.x - radius, base.y, base.z - radius)
            }
            Self::Sphere { center, radius } => center - DVec3::splat(radius),
        }
    }

    /// Maximum corner of the bounding box.
    pub fn max(&self) -> DVec3 {
        match *self {
            Self::Cuboid { max, .. } => max,
            Self::Cylinder {
                base,
                radius,
                height,
            } => DVec3::new(base.x + radius, base.y + height, base.z + radius),
            Self::Sphere { center, radius } => center + DVec3::splat(radius),
        }
    }

    pub fn center(&self) -> DVec3 {
        match *self {
            Self::Cuboid { min, max } => (min + max) * 0.5,
            Self::Cylinder { base, height, .. } => base + DVec3::new(0.0, height * 0.5, 0.0),
            Self::Sphere { center, .. } => center,
        }
    }

    fn within_bounds(&self, p: DVec3) -> bool {
        p.cmpge(self.min()).all() && p.cmple(self.max()).all()
    }

    /// Exact containment test; boundaries count as inside.
    ///
    /// Round solids also require the bounding-box test so that a contained
    /// point can never fall outside `min()..=max()` through rounding.
    pub fn contains(&self, p: DVec3) -> bool {
        if !self.within_bounds(p) {
            return false;
        }
        match *self {
            Self::Cuboid { .. } => true,
            Self::Cylinder { base, radius, .. } => {
                let dx = p.x - base.x;
                let dz = p.z - base.z;
                dx * dx + dz * dz <= radius * radius
            }
            Self::Sphere { center, radius } => p.distance_squared(center) <= radius * radius,
        }
    }

    /// The point of this solid closest to `p` (`p` itself when inside).
    pub fn closest_point(&self, p: DVec3) -> DVec3 {
        match *self {
            Self::Cuboid { min, max } => p.clamp(min, max),
            Self::Cylinder {
                base,
                radius,
                height,
            } => {
                let y = p.y.clamp(base.y, base.y + height);
                let flat = glam::DVec2::new(p.x - base.x, p.z - base.z);
                let flat = if flat.length_squared() <= radius * radius {
                    flat
                } else {
                    flat.normalize_or_zero() * radius
                };
                DVec3::new(base.x + flat.x, y, base.z + flat.y)
            }
            Self::Sphere { center, radius } => {
                let offset = p - center;
                if offset.length_squared() <= radius * radius {
                    p
                } else {
                    center + offset.normalize_or_zero() * radius
                }
            }
        }
    }

    /// Euclidean distance from `p` to the solid; zero when inside.
    pub fn distance_to(&self, p: DVec3) -> f64 {
        p.distance(self.closest_point(p))
    }

    pub fn has_volume(&self) -> bool {
        match *self {
            Self::Cuboid { min, max } => max.cmpgt(min).all(),
            Self::Cylinder { radius, height, .. } => radius > 0.0 && height > 0.0,
            Self::Sphere { radius, .. } => radius > 0.0,
        }
    }

    /// Whether the two solids share at least one point.
    pub fn overlaps(&self, other: &Solid) -> bool {
        match (self, other) {
            (Self::Cuboid { .. }, Self::Cuboid { .. }) => boxes_overlap(self, other),
            (
                Self::Sphere {
                    center: a,
                    radius: ra,
                },
                Self::Sphere {
                    center: b,
                    radius: rb,
                },
            ) => a.distance(*b) <= ra + rb,
            (Self::Sphere { center, radius }, solid) | (solid, Self::Sphere { center, radius }) => {
                solid.distance_to(*center) <= *radius
            }
            (
                Self::Cylinder {
                    base: a,
                    radius: ra,
                    ..
                },
                Self::Cylinder {
                    base: b,
                    radius: rb,
                    ..
                },
            ) => {
                let flat = glam::DVec2::new(a.x - b.x, a.z - b.z);
                heights_overlap(self, other) && flat.length() <= ra + rb
            }
            (Self::Cylinder { base, radius, .. }, cuboid @ Self::Cuboid { .. })
            | (cuboid @ Self::Cuboid { .. }, Self::Cylinder { base, radius, .. }) => {
                let (min, max) = (cuboid.min(), cuboid.max());
                let cx = base.x.clamp(min.x, max.x);
                let cz = base.z.clamp(min.z, max.z);
                let flat = glam::DVec2::new(base.x - cx, base.z - cz);
                heights_overlap(self, other) && flat.length_squared() <= radius * radius
            }
        }
    }
}

fn boxes_overlap(a: &Solid, b: &Solid) -> bool {
    a.min().cmple(b.max()).all() && b.min().cmple(a.max()).all()
}

fn heights_overlap(a: &Solid, b: &Solid) -> bool {
    a.min().y <= b.max().y && b.min().y <= a.max().y
}
