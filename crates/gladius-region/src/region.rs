//! Regions: named, typed volumes bound to one world.

use glam::DVec3;
use gladius_protocol::Location;
use serde::{Deserialize, Serialize};

use crate::{FlagSet, RegionError, RegionFlag, RegionProtection, RegionShape};

/// What a region is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionKind {
    Custom,
    Watch,
    Lounge,
    Battle,
    Join,
    Spawn,
    BlacklistInventory,
    WhitelistInventory,
}

/// Identity of the region a shape is being bound to.
#[derive(Debug, Clone)]
pub struct RegionHeader {
    pub name: String,
    pub kind: RegionKind,
    pub world: String,
}

/// A region as stored on disk.
///
/// The shape is stored as its registry name plus its bounding corners;
/// every shape type must be able to rebuild itself from those corners.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionDefinition {
    pub name: String,
    pub kind: RegionKind,
    pub world: String,
    pub shape: String,
    pub min: DVec3,
    pub max: DVec3,
    #[serde(default)]
    pub flags: u64,
    #[serde(default)]
    pub protections: u64,
}

/// A live region.
#[derive(Debug)]
pub struct Region {
    header: RegionHeader,
    shape: Box<dyn RegionShape>,
    pub flags: FlagSet<RegionFlag>,
    pub protections: FlagSet<RegionProtection>,
}

impl Clone for Region {
    fn clone(&self) -> Self {
        Self {
            header: self.header.clone(),
            shape: self.shape.clone_shape(),
            flags: self.flags,
            protections: self.protections,
        }
    }
}

impl Region {
    /// Binds `shape` to a new region and runs the shape's initialize hook.
    ///
    /// # Errors
    /// [`RegionError::MissingWorld`] when `world` is empty.
    pub fn new(
        name: impl Into<String>,
        kind: RegionKind,
        world: impl Into<String>,
        mut shape: Box<dyn RegionShape>,
    ) -> Result<Self, RegionError> {
        let header = RegionHeader {
            name: name.into(),
            kind,
            world: world.into(),
        };
        if header.world.is_empty() {
            return Err(RegionError::MissingWorld(header.name));
        }
        shape.initialize(&header);
        Ok(Self {
            header,
            shape,
            flags: FlagSet::empty(),
            protections: FlagSet::empty(),
        })
    }

    /// Rebuilds a stored region around an already constructed shape.
    pub fn from_definition(
        def: &RegionDefinition,
        shape: Box<dyn RegionShape>,
    ) -> Result<Self, RegionError> {
        if !def.min.cmple(def.max).all() {
            return Err(RegionError::InvalidShape {
                region: def.name.clone(),
                reason: format!("min {} exceeds max {}", def.min, def.max),
            });
        }
        let mut region = Self::new(def.name.clone(), def.kind, def.world.clone(), shape)?;
        region.flags = FlagSet::from_bits(def.flags);
        region.protections = FlagSet::from_bits(def.protections);
        tracing::debug!(
            region = %def.name,
            shape = %def.shape,
            flags = ?region.flags,
            "region restored"
        );
        Ok(region)
    }

    pub fn to_definition(&self) -> RegionDefinition {
        RegionDefinition {
            name: self.header.name.clone(),
            kind: self.header.kind,
            world: self.header.world.clone(),
            shape: self.shape.kind().to_string(),
            min: self.shape.bounding_min(),
            max: self.shape.bounding_max(),
            flags: self.flags.bits(),
            protections: self.protections.bits(),
        }
    }

    pub fn name(&self) -> &str {
        &self.header.name
    }

    pub fn kind(&self) -> RegionKind {
        self.header.kind
    }

    pub fn world(&self) -> &str {
        &self.header.world
    }

    pub fn shape(&self) -> &dyn RegionShape {
        self.shape.as_ref()
    }

    pub fn contains(&self, location: &Location) -> bool {
        location.world == self.header.world && self.shape.contains(location.position())
    }

    /// Same world and intersecting shapes.
    pub fn overlaps(&self, other: &Region) -> bool {
        self.header.world == other.header.world && self.shape.overlaps(other.shape.as_ref())
    }

    /// Whether every corner of `inner`'s bounding box lies inside this region.
    pub fn contains_region(&self, inner: &Region) -> bool {
        if self.header.world != inner.header.world {
            return false;
        }
        let (lo, hi) = (inner.shape.bounding_min(), inner.shape.bounding_max());
        (0..8).all(|i| {
            let corner = DVec3::new(
                if i & 1 == 0 { lo.x } else { hi.x },
                if i & 2 == 0 { lo.y } else { hi.y },
                if i & 4 == 0 { lo.z } else { hi.z },
            );
            self.shape.contains(corner)
        })
    }

    /// Cross-world locations are always too far away.
    pub fn too_far_away(&self, radius: f64, location: &Location) -> bool {
        location.world != self.header.world || self.shape.too_far_away(radius, location.position())
    }

    pub fn has_flag(&self, flag: RegionFlag) -> bool {
        self.flags.contains(flag)
    }

    pub fn is_protected(&self, protection: RegionProtection) -> bool {
        self.protections.contains(protection)
    }

    pub fn move_by(&mut self, direction: crate::Direction, amount: f64) {
        self.shape.move_by(direction, amount);
    }

    pub fn extend(&mut self, direction: crate::Direction, amount: f64) {
        self.shape.extend(direction, amount);
    }
}

/// Join-range test against a set of battle regions.
///
/// With no battle regions the point is compared to `fallback_center`
/// (usually derived from the spawn points); with no fallback either there is
/// nothing to measure against and the point is accepted. With battle regions
/// the point is too far only if it is out of range of every one of them.
pub fn too_far_away(
    battle: &[&Region],
    fallback_center: Option<&Location>,
    radius: f64,
    point: &Location,
) -> bool {
    if battle.is_empty() {
        return match fallback_center {
            Some(center) => center.distance(point).is_none_or(|d| d > radius),
            None => false,
        };
    }
    battle.iter().all(|r| r.too_far_away(radius, point))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Cuboid, Sphere};

    fn cuboid(name: &str, world: &str, a: f64, b: f64) -> Region {
        Region::new(
            name,
            RegionKind::Battle,
            world,
            Box::new(Cuboid::from_corners(DVec3::splat(a), DVec3::splat(b))),
        )
        .unwrap()
    }

    #[test]
    fn test_new_without_world_fails() {
        let shape = Box::new(Cuboid::from_corners(DVec3::ZERO, DVec3::ONE));
        assert!(matches!(
            Region::new("battle", RegionKind::Battle, "", shape),
            Err(RegionError::MissingWorld(name)) if name == "battle"
        ));
    }

    #[test]
    fn test_contains_checks_world() {
        let r = cuboid("battle", "arena", 0.0, 10.0);
        assert!(r.contains(&Location::new("arena", 5.0, 5.0, 5.0)));
        assert!(!r.contains(&Location::new("other", 5.0, 5.0, 5.0)));
    }

    #[test]
    fn test_overlaps_requires_same_world() {
        let a = cuboid("a", "w1", 0.0, 10.0);
        let b = cuboid("b", "w2", 0.0, 10.0);
        let c = cuboid("c", "w1", 5.0, 15.0);
        assert!(!a.overlaps(&b));
        assert!(a.overlaps(&c));
        assert!(c.overlaps(&a));
    }

    #[test]
    fn test_contains_region_checks_all_corners() {
        let outer = cuboid("battle", "w", 0.0, 10.0);
        let inner = cuboid("spawn", "w", 2.0, 4.0);
        let straddling = cuboid("spawn", "w", 8.0, 12.0);
        assert!(outer.contains_region(&inner));
        assert!(!outer.contains_region(&straddling));
        assert!(!inner.contains_region(&outer));
    }

    #[test]
    fn test_definition_roundtrip_keeps_bits() {
        let mut r = Region::new(
            "pit",
            RegionKind::Custom,
            "w",
            Box::new(Sphere::from_corners(DVec3::ZERO, DVec3::splat(4.0))),
        )
        .unwrap();
        r.flags.insert(RegionFlag::Death);
        r.protections.insert(RegionProtection::Place);
        r.protections.insert(RegionProtection::Teleport);

        let def = r.to_definition();
        assert_eq!(def.shape, "sphere");
        let shape = Box::new(Sphere::from_corners(def.min, def.max));
        let back = Region::from_definition(&def, shape).unwrap();
        assert_eq!(back.to_definition(), def);
        assert!(back.has_flag(RegionFlag::Death));
        assert!(back.is_protected(RegionProtection::Teleport));
        assert!(!back.is_protected(RegionProtection::Break));
    }

    #[test]
    fn test_from_definition_rejects_inverted_corners() {
        let def = RegionDefinition {
            name: "bad".into(),
            kind: RegionKind::Battle,
            world: "w".into(),
            shape: "cuboid".into(),
            min: DVec3::splat(5.0),
            max: DVec3::ZERO,
            flags: 0,
            protections: 0,
        };
        let shape = Box::new(Cuboid::from_corners(def.min, def.max));
        assert!(matches!(
            Region::from_definition(&def, shape),
            Err(RegionError::InvalidShape { .. })
        ));
    }

    #[test]
    fn test_too_far_away_needs_every_battle_region_out_of_range() {
        let a = cuboid("a", "w", 0.0, 10.0);
        let b = cuboid("b", "w", 100.0, 110.0);
        let near_b = Location::new("w", 112.0, 105.0, 105.0);
        let far = Location::new("w", 50.0, 50.0, 50.0);
        assert!(!too_far_away(&[&a, &b], None, 5.0, &near_b));
        assert!(too_far_away(&[&a, &b], None, 5.0, &far));
        assert!(too_far_away(&[&a], None, 1000.0, &Location::new("elsewhere", 1.0, 1.0, 1.0)));
    }

    #[test]
    fn test_too_far_away_falls_back_to_center() {
        let center = Location::new("w", 0.0, 0.0, 0.0);
        assert!(!too_far_away(&[], Some(&center), 10.0, &Location::new("w", 6.0, 0.0, 8.0)));
        assert!(too_far_away(&[], Some(&center), 9.0, &Location::new("w", 6.0, 0.0, 8.0)));
        assert!(too_far_away(&[], Some(&center), 9.0, &Location::new("x", 0.0, 0.0, 0.0)));
        assert!(!too_far_away(&[], None, 1.0, &Location::new("w", 500.0, 0.0, 0.0)));
    }
}
