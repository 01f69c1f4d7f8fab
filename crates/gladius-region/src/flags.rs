//! Region flags and protections, and the bitmask that stores them.
//!
//! A region persists its flag set and its protection set as one integer
//! each: bit `n` is set when the variant with ordinal `n` is present.
//! Loading keeps only bits that name a known variant, so a mask written by
//! a newer build (or simply corrupted) never fails to load.

use std::fmt;
use std::marker::PhantomData;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A closed enumeration whose variants map to bit positions.
pub trait Ordinal: Copy + fmt::Debug + 'static {
    /// Every variant, in ordinal order.
    const ALL: &'static [Self];

    /// The bit index of this variant (< 64).
    fn ordinal(self) -> u8;

    fn mask(self) -> u64 {
        1u64 << self.ordinal()
    }
}

// ---------------------------------------------------------------------------
// FlagSet
// ---------------------------------------------------------------------------

/// A set of [`Ordinal`] values packed into a `u64`.
pub struct FlagSet<T> {
    bits: u64,
    _marker: PhantomData<T>,
}

impl<T: Ordinal> FlagSet<T> {
    pub const fn empty() -> Self {
        Self {
            bits: 0,
            _marker: PhantomData,
        }
    }

    /// Rebuilds a set from a stored mask, dropping unknown bits.
    pub fn from_bits(bits: u64) -> Self {
        let known = T::ALL.iter().fold(0u64, |acc, v| acc | v.mask());
        Self {
            bits: bits & known,
            _marker: PhantomData,
        }
    }

    pub fn bits(&self) -> u64 {
        self.bits
    }

    pub fn insert(&mut self, value: T) {
        self.bits |= value.mask();
    }

    pub fn remove(&mut self, value: T) {
        self.bits &= !value.mask();
    }

    /// Flips `value`; returns whether it is now set.
    pub fn toggle(&mut self, value: T) -> bool {
        self.bits ^= value.mask();
        self.contains(value)
    }

    pub fn contains(&self, value: T) -> bool {
        self.bits & value.mask() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.bits == 0
    }

    /// Members in ordinal order.
    pub fn iter(&self) -> impl Iterator<Item = T> + '_ {
        T::ALL.iter().copied().filter(|v| self.contains(*v))
    }
}

impl<T: Ordinal> Default for FlagSet<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T> Clone for FlagSet<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for FlagSet<T> {}

impl<T> PartialEq for FlagSet<T> {
    fn eq(&self, other: &Self) -> bool {
        self.bits == other.bits
    }
}

impl<T> Eq for FlagSet<T> {}

impl<T: Ordinal> fmt::Debug for FlagSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl<T: Ordinal> FromIterator<T> for FlagSet<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut set = Self::empty();
        for v in iter {
            set.insert(v);
        }
        set
    }
}

impl<T> Serialize for FlagSet<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(self.bits)
    }
}

impl<'de, T: Ordinal> Deserialize<'de> for FlagSet<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        u64::deserialize(deserializer).map(Self::from_bits)
    }
}

// ---------------------------------------------------------------------------
// RegionFlag / RegionProtection
// ---------------------------------------------------------------------------

/// Behavioural flags evaluated while fighters move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum RegionFlag {
    /// Standing still inside the region hurts.
    NoCamp,
    /// Entering the region kills (without costing a life).
    Death,
    /// Entering the region wins the match for the entrant's side.
    Win,
    /// Entering the region loses the match for the entrant's side.
    Lose,
    /// Fighters inside the region take no damage.
    NoDamage,
}

impl Ordinal for RegionFlag {
    const ALL: &'static [Self] = &[
        Self::NoCamp,
        Self::Death,
        Self::Win,
        Self::Lose,
        Self::NoDamage,
    ];

    fn ordinal(self) -> u8 {
        self as u8
    }
}

/// World interactions a region can forbid.
///
/// The region only stores these bits; cancelling the matching host event is
/// the event layer's job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum RegionProtection {
    Break,
    Fire,
    Mobs,
    Nature,
    Painting,
    Piston,
    Place,
    Tnt,
    TntBreak,
    Drop,
    Inventory,
    Pickup,
    Craft,
    Teleport,
}

impl Ordinal for RegionProtection {
    const ALL: &'static [Self] = &[
        Self::Break,
        Self::Fire,
        Self::Mobs,
        Self::Nature,
        Self::Painting,
        Self::Piston,
        Self::Place,
        Self::Tnt,
        Self::TntBreak,
        Self::Drop,
        Self::Inventory,
        Self::Pickup,
        Self::Craft,
        Self::Teleport,
    ];

    fn ordinal(self) -> u8 {
        self as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bits_follow_ordinals() {
        let mut set = FlagSet::<RegionFlag>::empty();
        set.insert(RegionFlag::NoCamp);
        set.insert(RegionFlag::Lose);
        assert_eq!(set.bits(), 0b01001);
    }

    #[test]
    fn test_from_bits_restores_exact_set() {
        let set: FlagSet<RegionProtection> = [
            RegionProtection::Break,
            RegionProtection::Craft,
            RegionProtection::Teleport,
        ]
        .into_iter()
        .collect();
        let restored = FlagSet::<RegionProtection>::from_bits(set.bits());
        assert_eq!(restored, set);
        assert_eq!(
            restored.iter().collect::<Vec<_>>(),
            vec![
                RegionProtection::Break,
                RegionProtection::Craft,
                RegionProtection::Teleport
            ]
        );
    }

    #[test]
    fn test_from_bits_ignores_out_of_range() {
        let set = FlagSet::<RegionFlag>::from_bits(u64::MAX);
        assert_eq!(set.iter().count(), RegionFlag::ALL.len());
        assert_eq!(set.bits(), 0b11111);

        let only_unknown = FlagSet::<RegionFlag>::from_bits(1 << 40);
        assert!(only_unknown.is_empty());
    }

    #[test]
    fn test_toggle_reports_new_state() {
        let mut set = FlagSet::<RegionFlag>::empty();
        assert!(set.toggle(RegionFlag::Win));
        assert!(!set.toggle(RegionFlag::Win));
        assert!(set.is_empty());
    }

    #[test]
    fn test_serde_as_integer() {
        let set: FlagSet<RegionFlag> = [RegionFlag::Death].into_iter().collect();
        let json = serde_json::to_string(&set).unwrap();
        assert_eq!(json, "2");
        let back: FlagSet<RegionFlag> = serde_json::from_str("130").unwrap();
        assert_eq!(back.iter().collect::<Vec<_>>(), vec![RegionFlag::Death]);
    }
}
