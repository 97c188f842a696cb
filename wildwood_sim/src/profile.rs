// Footprint profiles and the profile verifier.
//
// A `Profile` describes the space a creature (or a placement) needs: a small
// 3D array of `Condition`s laid over a box of offsets around an origin cell.
// Each condition carries a packed `RangeCheck` (an inclusive density range
// and an inclusive material range, one byte per bound) and three flags:
//
// - `required` (AND): the check must pass.
// - `any_of` (OR): the cell belongs to a group where at least one member
//   must pass.
// - `placement_only` (EXCLUDE): checked when placing, skipped when
//   pathfinding. A hawk must land on ground to spawn but can path over open
//   air.
//
// `verify()` folds every cell into one verdict:
// `all_ok && (!has_or_group || any_ok)`.
//
// See also: `world.rs` for the `TerrainOracle` sampled here,
// `pathfinding.rs` which calls `verify()` once per popped cell,
// `species.rs` which picks the preset profiles per species.

use crate::error::ProfileError;
use crate::geometry::Aabb;
use crate::types::{SOLID_DENSITY, TerrainSample, VoxelCoord, material};
use crate::world::TerrainOracle;
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

// ---------------------------------------------------------------------------
// RangeCheck
// ---------------------------------------------------------------------------

/// Two inclusive byte ranges packed into a `u32`:
/// `density_min | density_max << 8 | material_min << 16 | material_max << 24`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(from = "RangeCheckRepr", into = "RangeCheckRepr")]
pub struct RangeCheck(u32);

/// Readable form used for serialization.
#[derive(Clone, Copy, Serialize, Deserialize)]
struct RangeCheckRepr {
    density: (u8, u8),
    material: (u8, u8),
}

impl From<RangeCheckRepr> for RangeCheck {
    fn from(r: RangeCheckRepr) -> Self {
        Self::new(r.density.0..=r.density.1, r.material.0..=r.material.1)
    }
}

impl From<RangeCheck> for RangeCheckRepr {
    fn from(c: RangeCheck) -> Self {
        Self {
            density: (c.density_min(), c.density_max()),
            material: (c.material_min(), c.material_max()),
        }
    }
}

impl RangeCheck {
    /// Accepts every sample.
    pub const ANY: Self = Self::from_bytes(0, u8::MAX, 0, u8::MAX);
    /// Open cells a body can occupy.
    pub const OPEN: Self = Self::from_bytes(0, SOLID_DENSITY - 1, 0, u8::MAX);
    /// Solid cells that can carry weight.
    pub const SOLID: Self = Self::from_bytes(SOLID_DENSITY, u8::MAX, 0, u8::MAX);
    /// Solid cells topped with grass.
    pub const GRASS: Self =
        Self::from_bytes(SOLID_DENSITY, u8::MAX, material::GRASS, material::GRASS);

    pub fn new(density: RangeInclusive<u8>, material: RangeInclusive<u8>) -> Self {
        Self::from_bytes(
            *density.start(),
            *density.end(),
            *material.start(),
            *material.end(),
        )
    }

    const fn from_bytes(d_min: u8, d_max: u8, m_min: u8, m_max: u8) -> Self {
        Self(
            (d_min as u32)
                | ((d_max as u32) << 8)
                | ((m_min as u32) << 16)
                | ((m_max as u32) << 24),
        )
    }

    pub const fn density_min(self) -> u8 {
        self.0 as u8
    }

    pub const fn density_max(self) -> u8 {
        (self.0 >> 8) as u8
    }

    pub const fn material_min(self) -> u8 {
        (self.0 >> 16) as u8
    }

    pub const fn material_max(self) -> u8 {
        (self.0 >> 24) as u8
    }

    pub fn accepts(self, sample: TerrainSample) -> bool {
        let d = sample.density();
        let m = sample.material();
        d >= self.density_min()
            && d <= self.density_max()
            && m >= self.material_min()
            && m <= self.material_max()
    }
}

// ---------------------------------------------------------------------------
// Conditions
// ---------------------------------------------------------------------------

/// How a cell's check feeds the profile verdict.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConditionFlags {
    /// AND: the check must pass.
    pub required: bool,
    /// OR: at least one `any_of` cell in the profile must pass.
    pub any_of: bool,
    /// EXCLUDE: skipped by callers that honor it (pathfinding).
    pub placement_only: bool,
}

impl ConditionFlags {
    pub const NONE: Self = Self {
        required: false,
        any_of: false,
        placement_only: false,
    };
    pub const REQUIRED: Self = Self {
        required: true,
        ..Self::NONE
    };
    pub const ANY_OF: Self = Self {
        any_of: true,
        ..Self::NONE
    };

    pub const fn placement_only(self) -> Self {
        Self {
            placement_only: true,
            ..self
        }
    }
}

/// One cell of a profile. The default condition has no flags and never
/// affects the verdict.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Condition {
    pub check: RangeCheck,
    pub flags: ConditionFlags,
}

impl Default for Condition {
    fn default() -> Self {
        Self {
            check: RangeCheck::ANY,
            flags: ConditionFlags::NONE,
        }
    }
}

impl Condition {
    pub const fn required(check: RangeCheck) -> Self {
        Self {
            check,
            flags: ConditionFlags::REQUIRED,
        }
    }

    pub const fn any_of(check: RangeCheck) -> Self {
        Self {
            check,
            flags: ConditionFlags::ANY_OF,
        }
    }
}

// ---------------------------------------------------------------------------
// Profile
// ---------------------------------------------------------------------------

/// A 3D array of conditions over `bounds`, given as offsets from the origin
/// cell being tested.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ProfileRepr", into = "ProfileRepr")]
pub struct Profile {
    bounds: Aabb,
    /// Flat storage, x fastest, then z, then y (same as `Aabb::cells`).
    /// Always exactly `bounds.volume()` long.
    conditions: Vec<Condition>,
}

/// Unchecked serialized form of `Profile`.
#[derive(Clone, Serialize, Deserialize)]
struct ProfileRepr {
    bounds: Aabb,
    conditions: Vec<Condition>,
}

impl TryFrom<ProfileRepr> for Profile {
    type Error = ProfileError;

    fn try_from(repr: ProfileRepr) -> Result<Self, ProfileError> {
        let ProfileRepr { bounds, conditions } = repr;
        if bounds.min.min(bounds.max) != bounds.min {
            return Err(ProfileError::InvertedBounds {
                min: bounds.min,
                max: bounds.max,
            });
        }
        let expected = bounds.volume();
        if expected != conditions.len() as u64 {
            return Err(ProfileError::ConditionCount {
                expected,
                found: conditions.len(),
            });
        }
        Ok(Self { bounds, conditions })
    }
}

impl From<Profile> for ProfileRepr {
    fn from(profile: Profile) -> Self {
        Self {
            bounds: profile.bounds,
            conditions: profile.conditions,
        }
    }
}

impl Profile {
    /// A profile over `bounds` with every cell unconstrained.
    pub fn new(bounds: Aabb) -> Self {
        let len = usize::try_from(bounds.volume()).unwrap_or(usize::MAX);
        debug_assert!(len <= 4096, "profile bounds {bounds:?} are implausibly large");
        Self {
            bounds,
            conditions: vec![Condition::default(); len],
        }
    }

    /// Single unconstrained cell: every origin passes.
    pub fn permissive() -> Self {
        Self::new(Aabb::point(VoxelCoord::ZERO))
    }

    /// A ground creature `height` cells tall: solid footing directly below,
    /// open cells for the body.
    pub fn walker(height: i32) -> Self {
        let height = height.max(1);
        let mut profile = Self::new(Aabb::new(
            VoxelCoord::new(0, -1, 0),
            VoxelCoord::new(0, height - 1, 0),
        ));
        profile.set(VoxelCoord::new(0, -1, 0), Condition::required(RangeCheck::SOLID));
        for y in 0..height {
            profile.set(VoxelCoord::new(0, y, 0), Condition::required(RangeCheck::OPEN));
        }
        profile
    }

    /// A flier: open cells for the body. Footing is still needed to place
    /// one, but not to fly over a cell.
    pub fn flyer(height: i32) -> Self {
        let mut profile = Self::walker(height);
        profile.set(
            VoxelCoord::new(0, -1, 0),
            Condition {
                check: RangeCheck::SOLID,
                flags: ConditionFlags::REQUIRED.placement_only(),
            },
        );
        profile
    }

    /// Somewhere a grazer can stand and eat: a walkable cell with grass on at
    /// least one of the eight cells ringing its footing.
    pub fn grazing_spot(height: i32) -> Self {
        let height = height.max(1);
        let mut profile = Self::new(Aabb::new(
            VoxelCoord::new(-1, -1, -1),
            VoxelCoord::new(1, height - 1, 1),
        ));
        profile.set(VoxelCoord::new(0, -1, 0), Condition::required(RangeCheck::SOLID));
        for y in 0..height {
            profile.set(VoxelCoord::new(0, y, 0), Condition::required(RangeCheck::OPEN));
        }
        for dx in -1..=1 {
            for dz in -1..=1 {
                if (dx, dz) != (0, 0) {
                    profile.set(VoxelCoord::new(dx, -1, dz), Condition::any_of(RangeCheck::GRASS));
                }
            }
        }
        profile
    }

    pub fn bounds(&self) -> Aabb {
        self.bounds
    }

    fn slot(&self, offset: VoxelCoord) -> Option<usize> {
        if !self.bounds.contains_point(offset) {
            return None;
        }
        let (sx, _, sz) = self.bounds.extent();
        let local = offset - self.bounds.min;
        let (sx, sz) = (sx as usize, sz as usize);
        Some(local.x as usize + local.z as usize * sx + local.y as usize * sx * sz)
    }

    /// The condition at `offset`, or `None` outside the bounds.
    pub fn condition(&self, offset: VoxelCoord) -> Option<Condition> {
        self.slot(offset).map(|i| self.conditions[i])
    }

    /// Replace the condition at `offset`. Offsets outside the bounds are a
    /// caller bug.
    pub fn set(&mut self, offset: VoxelCoord, condition: Condition) {
        match self.slot(offset) {
            Some(i) => self.conditions[i] = condition,
            None => debug_assert!(false, "offset {offset} outside profile {:?}", self.bounds),
        }
    }

    /// Every `(offset, condition)` pair, in storage order.
    pub fn iter(&self) -> impl Iterator<Item = (VoxelCoord, Condition)> + '_ {
        self.bounds.cells().zip(self.conditions.iter().copied())
    }
}

/// Evaluate `profile` with its origin at `origin`.
///
/// `honor_exclude` is `true` for pathfinding (skip `placement_only` cells) and
/// `false` for placement.
pub fn verify<O: TerrainOracle + ?Sized>(
    origin: VoxelCoord,
    profile: &Profile,
    oracle: &O,
    honor_exclude: bool,
) -> bool {
    let mut all_ok = true;
    let mut any_ok = false;
    let mut has_or_group = false;

    for (offset, condition) in profile.iter() {
        let flags = condition.flags;
        if flags.placement_only && honor_exclude {
            continue;
        }
        if !flags.required && !flags.any_of {
            continue;
        }
        let valid = condition.check.accepts(oracle.sample(origin + offset));
        all_ok &= valid || !flags.required;
        any_ok |= valid && flags.any_of;
        has_or_group |= flags.any_of;
        if !all_ok {
            return false;
        }
    }

    all_ok && (!has_or_group || any_ok)
}
