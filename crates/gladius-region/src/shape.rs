//! The region shape contract and the built-in shapes.
//!
//! Every shape describes itself as a [`Solid`]; the provided methods of
//! [`RegionShape`] derive containment, bounds, distance and overlap from
//! that description. Extension shapes only need `kind`, `solid`, the two
//! mutators and `clone_shape`, and may override the queries when they can
//! answer them more precisely.

use std::fmt;

use glam::{DVec3, IVec3};
use serde::{Deserialize, Serialize};

use crate::{RegionHeader, Solid};

/// Axis directions used by the move/extend operations.
///
/// North is -Z, east is +X, up is +Y.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    North,
    South,
    East,
    West,
    Up,
    Down,
}

impl Direction {
    pub fn unit(self) -> DVec3 {
        match self {
            Self::North => DVec3::NEG_Z,
            Self::South => DVec3::Z,
            Self::East => DVec3::X,
            Self::West => DVec3::NEG_X,
            Self::Up => DVec3::Y,
            Self::Down => DVec3::NEG_Y,
        }
    }

    /// Whether the direction points along a positive axis.
    pub fn is_positive(self) -> bool {
        matches!(self, Self::South | Self::East | Self::Up)
    }

    pub fn is_vertical(self) -> bool {
        matches!(self, Self::Up | Self::Down)
    }
}

/// Geometry behind a region.
///
/// `move_by` and `extend` are the only mutators and both keep the shape's
/// type: a cylinder stays a cylinder however it is resized.
pub trait RegionShape: fmt::Debug + Send + Sync {
    /// Registry name of the shape type, e.g. `"cuboid"`.
    fn kind(&self) -> &str;

    /// Called once when the shape is bound to its region.
    fn initialize(&mut self, _region: &RegionHeader) {}

    fn solid(&self) -> Solid;

    fn contains(&self, point: DVec3) -> bool {
        self.solid().contains(point)
    }

    fn overlaps(&self, other: &dyn RegionShape) -> bool {
        self.solid().overlaps(&other.solid())
    }

    fn bounding_min(&self) -> DVec3 {
        self.solid().min()
    }

    fn bounding_max(&self) -> DVec3 {
        self.solid().max()
    }

    fn center(&self) -> DVec3 {
        self.solid().center()
    }

    /// Whether `point` lies more than `radius` away from the shape.
    fn too_far_away(&self, radius: f64, point: DVec3) -> bool {
        self.solid().distance_to(point) > radius
    }

    fn has_volume(&self) -> bool {
        self.solid().has_volume()
    }

    fn move_by(&mut self, direction: Direction, amount: f64);

    fn extend(&mut self, direction: Direction, amount: f64);

    /// Every block coordinate whose corner lies inside the shape.
    ///
    /// Walks the whole bounding box; only meant for rare bulk work such as
    /// clearing entities after a match.
    fn block_points(&self) -> Vec<IVec3> {
        let min = self.bounding_min().floor();
        let max = self.bounding_max().floor();
        let mut points = Vec::new();
        for x in min.x as i32..=max.x as i32 {
            for y in min.y as i32..=max.y as i32 {
                for z in min.z as i32..=max.z as i32 {
                    let p = DVec3::new(x as f64, y as f64, z as f64);
                    if self.contains(p) {
                        points.push(IVec3::new(x, y, z));
                    }
                }
            }
        }
        points
    }

    fn clone_shape(&self) -> Box<dyn RegionShape>;
}

// ---------------------------------------------------------------------------
// Cuboid
// ---------------------------------------------------------------------------

/// An axis-aligned box, inclusive on both corners.
#[derive(Debug, Clone, PartialEq)]
pub struct Cuboid {
    min: DVec3,
    max: DVec3,
}

impl Cuboid {
    pub fn from_corners(a: DVec3, b: DVec3) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }
}

impl RegionShape for Cuboid {
    fn kind(&self) -> &str {
        "cuboid"
    }

    fn solid(&self) -> Solid {
        Solid::Cuboid {
            min: self.min,
            max: self.max,
        }
    }

    fn move_by(&mut self, direction: Direction, amount: f64) {
        let delta = direction.unit() * amount;
        self.min += delta;
        self.max += delta;
    }

    fn extend(&mut self, direction: Direction, amount: f64) {
        let delta = direction.unit() * amount;
        if direction.is_positive() {
            self.max = (self.max + delta).max(self.min);
        } else {
            self.min = (self.min + delta).min(self.max);
        }
    }

    fn clone_shape(&self) -> Box<dyn RegionShape> {
        Box::new(self.clone())
    }
}

// ---------------------------------------------------------------------------
// Cylinder
// ---------------------------------------------------------------------------

/// An upright cylinder.
#[derive(Debug, Clone, PartialEq)]
pub struct Cylinder {
    base: DVec3,
    radius: f64,
    height: f64,
}

impl Cylinder {
    /// The largest upright cylinder inside the box spanned by `a` and `b`.
    pub fn from_corners(a: DVec3, b: DVec3) -> Self {
        let (lo, hi) = (a.min(b), a.max(b));
        Self {
            base: DVec3::new((lo.x + hi.x) * 0.5, lo.y, (lo.z + hi.z) * 0.5),
            radius: (hi.x - lo.x).min(hi.z - lo.z) * 0.5,
            height: hi.y - lo.y,
        }
    }
}

impl RegionShape for Cylinder {
    fn kind(&self) -> &str {
        "cylinder"
    }

    fn solid(&self) -> Solid {
        Solid::Cylinder {
            base: self.base,
            radius: self.radius,
            height: self.height,
        }
    }

    fn move_by(&mut self, direction: Direction, amount: f64) {
        self.base += direction.unit() * amount;
    }

    fn extend(&mut self, direction: Direction, amount: f64) {
        match direction {
            Direction::Up => self.height = (self.height + amount).max(0.0),
            Direction::Down => {
                let grown = (self.height + amount).max(0.0);
                self.base.y -= grown - self.height;
                self.height = grown;
            }
            _ => self.radius = (self.radius + amount).max(0.0),
        }
    }

    fn clone_shape(&self) -> Box<dyn RegionShape> {
        Box::new(self.clone())
    }
}

// ---------------------------------------------------------------------------
// Sphere
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Sphere {
    center: DVec3,
    radius: f64,
}

impl Sphere {
    /// The largest sphere inside the box spanned by `a` and `b`.
    pub fn from_corners(a: DVec3, b: DVec3) -> Self {
        let (lo, hi) = (a.min(b), a.max(b));
        Self {
            center: (lo + hi) * 0.5,
            radius: (hi - lo).min_element() * 0.5,
        }
    }
}

impl RegionShape for Sphere {
    fn kind(&self) -> &str {
        "sphere"
    }

    fn solid(&self) -> Solid {
        Solid::Sphere {
            center: self.center,
            radius: self.radius,
        }
    }

    fn move_by(&mut self, direction: Direction, amount: f64) {
        self.center += direction.unit() * amount;
    }

    /// Spheres grow evenly; the direction only selects the call site.
    fn extend(&mut self, _direction: Direction, amount: f64) {
        self.radius = (self.radius + amount).max(0.0);
    }

    fn clone_shape(&self) -> Box<dyn RegionShape> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cuboid_from_corners_normalizes() {
        let c = Cuboid::from_corners(DVec3::new(10.0, 0.0, 5.0), DVec3::new(0.0, 10.0, 0.0));
        assert_eq!(c.bounding_min(), DVec3::new(0.0, 0.0, 0.0));
        assert_eq!(c.bounding_max(), DVec3::new(10.0, 10.0, 5.0));
    }

    #[test]
    fn test_cuboid_extend_moves_one_face() {
        let mut c = Cuboid::from_corners(DVec3::ZERO, DVec3::splat(10.0));
        c.extend(Direction::Up, 5.0);
        c.extend(Direction::West, 2.0);
        assert_eq!(c.bounding_min(), DVec3::new(-2.0, 0.0, 0.0));
        assert_eq!(c.bounding_max(), DVec3::new(10.0, 15.0, 10.0));
        assert_eq!(c.kind(), "cuboid");
    }

    #[test]
    fn test_cuboid_move_keeps_size() {
        let mut c = Cuboid::from_corners(DVec3::ZERO, DVec3::splat(10.0));
        c.move_by(Direction::North, 3.0);
        assert_eq!(c.bounding_min(), DVec3::new(0.0, 0.0, -3.0));
        assert_eq!(c.bounding_max(), DVec3::new(10.0, 10.0, 7.0));
    }

    #[test]
    fn test_cylinder_from_corners_uses_short_side() {
        let c = Cylinder::from_corners(DVec3::ZERO, DVec3::new(10.0, 4.0, 6.0));
        assert_eq!(c.center(), DVec3::new(5.0, 2.0, 3.0));
        assert_eq!(c.bounding_min(), DVec3::new(2.0, 0.0, 0.0));
        assert_eq!(c.bounding_max(), DVec3::new(8.0, 4.0, 6.0));
    }

    #[test]
    fn test_cylinder_extend_down_lowers_base() {
        let mut c = Cylinder::from_corners(DVec3::ZERO, DVec3::new(4.0, 4.0, 4.0));
        c.extend(Direction::Down, 2.0);
        assert_eq!(c.bounding_min().y, -2.0);
        assert_eq!(c.bounding_max().y, 4.0);
        c.extend(Direction::East, 1.0);
        assert_eq!(c.bounding_max().x, 5.0);
        assert_eq!(c.kind(), "cylinder");
    }

    #[test]
    fn test_sphere_rebuilds_from_its_bounds() {
        let s = Sphere::from_corners(DVec3::ZERO, DVec3::new(6.0, 6.0, 6.0));
        let again = Sphere::from_corners(s.bounding_min(), s.bounding_max());
        assert_eq!(s, again);
    }

    #[test]
    fn test_block_points_of_small_cuboid() {
        let c = Cuboid::from_corners(DVec3::ZERO, DVec3::splat(1.0));
        assert_eq!(c.block_points().len(), 8);
    }

    #[test]
    fn test_shapes_overlap_through_trait_objects() {
        let a: Box<dyn RegionShape> = Box::new(Cuboid::from_corners(DVec3::ZERO, DVec3::splat(10.0)));
        let b: Box<dyn RegionShape> = Box::new(Sphere::from_corners(DVec3::splat(8.0), DVec3::splat(14.0)));
        assert!(a.overlaps(b.as_ref()));
        assert!(b.overlaps(a.as_ref()));
        assert!(!b.too_far_away(1.0, DVec3::splat(11.0)));
        assert!(a.too_far_away(1.0, DVec3::new(12.0, 5.0, 5.0)));
    }
}
