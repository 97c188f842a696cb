// Core types shared across the simulation.
//
// Defines grid coordinates (`VoxelCoord`), creature identifiers (UUID v4
// wrappers generated from the sim PRNG), the packed terrain sample returned by
// the terrain oracle, and the `Species` enum.
//
// `TerrainSample` packs the two attributes every footprint check reads into a
// single `u16` (low byte density, high byte material class), which is what a
// terrain sampler hands back per cell.
//
// **Critical constraint: determinism.** IDs come from the sim's `GameRng`.
// Do not use external UUID libraries or OS entropy.

use crate::prng::GameRng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::ops::{Add, Neg, Sub};

// ---------------------------------------------------------------------------
// Grid coordinates
// ---------------------------------------------------------------------------

/// A cell in the 3D voxel grid. Y is up.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VoxelCoord {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl VoxelCoord {
    pub const ZERO: Self = Self::new(0, 0, 0);

    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    pub const fn splat(v: i32) -> Self {
        Self::new(v, v, v)
    }

    /// Largest per-axis distance. A window of radius `r` holds every offset
    /// whose Chebyshev length is at most `r`.
    pub fn chebyshev_length(self) -> u32 {
        self.x
            .unsigned_abs()
            .max(self.y.unsigned_abs())
            .max(self.z.unsigned_abs())
    }

    pub fn abs(self) -> Self {
        Self::new(self.x.abs(), self.y.abs(), self.z.abs())
    }

    pub fn min(self, other: Self) -> Self {
        Self::new(
            self.x.min(other.x),
            self.y.min(other.y),
            self.z.min(other.z),
        )
    }

    pub fn max(self, other: Self) -> Self {
        Self::new(
            self.x.max(other.x),
            self.y.max(other.y),
            self.z.max(other.z),
        )
    }
}

impl Add for VoxelCoord {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for VoxelCoord {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Neg for VoxelCoord {
    type Output = Self;
    fn neg(self) -> Self {
        Self::new(-self.x, -self.y, -self.z)
    }
}

impl fmt::Display for VoxelCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

// ---------------------------------------------------------------------------
// Terrain samples
// ---------------------------------------------------------------------------

/// Material classes stored in the high byte of a `TerrainSample`.
pub mod material {
    pub const AIR: u8 = 0;
    pub const SOIL: u8 = 1;
    pub const GRASS: u8 = 2;
    pub const STONE: u8 = 3;
    pub const WATER: u8 = 4;
    pub const BEDROCK: u8 = 255;
}

/// Density at or above which a cell blocks a body and supports one.
pub const SOLID_DENSITY: u8 = 128;

/// Packed per-cell terrain attributes: `density | material << 8`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct TerrainSample(pub u16);

impl TerrainSample {
    pub const AIR: Self = Self::new(0, material::AIR);
    /// What the world reports outside its extent.
    pub const OUT_OF_BOUNDS: Self = Self::new(u8::MAX, material::BEDROCK);

    pub const fn new(density: u8, material: u8) -> Self {
        Self((density as u16) | ((material as u16) << 8))
    }

    pub const fn density(self) -> u8 {
        (self.0 & 0xFF) as u8
    }

    pub const fn material(self) -> u8 {
        (self.0 >> 8) as u8
    }

    pub const fn is_solid(self) -> bool {
        self.density() >= SOLID_DENSITY
    }
}

impl fmt::Debug for TerrainSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TerrainSample(density={}, material={})",
            self.density(),
            self.material()
        )
    }
}

// ---------------------------------------------------------------------------
// Creature IDs — deterministic UUID v4
// ---------------------------------------------------------------------------

/// A UUID v4, generated deterministically from the simulation PRNG.
///
/// Layout follows RFC 4122: version nibble (byte 6 high) is `0100`, variant
/// bits (byte 8 high two) are `10`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SimUuid([u8; 16]);

impl SimUuid {
    pub fn new_v4(rng: &mut GameRng) -> Self {
        let mut bytes = rng.next_128_bits();
        bytes[6] = (bytes[6] & 0x0F) | 0x40;
        bytes[8] = (bytes[8] & 0x3F) | 0x80;
        Self(bytes)
    }

    /// Parse the 8-4-4-4-12 hex form.
    pub fn parse(s: &str) -> Option<Self> {
        let hex: Vec<u8> = s.bytes().filter(|&c| c != b'-').collect();
        if hex.len() != 32 {
            return None;
        }
        let mut bytes = [0u8; 16];
        for (byte, pair) in bytes.iter_mut().zip(hex.chunks_exact(2)) {
            let pair = std::str::from_utf8(pair).ok()?;
            *byte = u8::from_str_radix(pair, 16).ok()?;
        }
        Some(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

// Serialized as the hex string so IDs work as JSON map keys.
impl Serialize for SimUuid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for SimUuid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        SimUuid::parse(&s).ok_or_else(|| serde::de::Error::custom("invalid UUID format"))
    }
}

impl fmt::Debug for SimUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SimUuid({self})")
    }
}

impl fmt::Display for SimUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, b) in self.0.iter().enumerate() {
            if matches!(i, 4 | 6 | 8 | 10) {
                f.write_str("-")?;
            }
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

/// Unique identifier for a creature. This is the key the spatial index stores
/// in its leaves.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CreatureId(pub SimUuid);

impl CreatureId {
    pub fn new(rng: &mut GameRng) -> Self {
        Self(SimUuid::new_v4(rng))
    }
}

impl fmt::Display for CreatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CreatureId({})", self.0)
    }
}

// ---------------------------------------------------------------------------
// Species
// ---------------------------------------------------------------------------

/// Creature species. Behavioral differences live in `SpeciesData`
/// (see `species.rs`), keyed by this enum in the config.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Species {
    Deer,
    Wolf,
    Hawk,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uuid_version_and_variant_bits() {
        let mut rng = GameRng::new(42);
        for _ in 0..1000 {
            let bytes = *SimUuid::new_v4(&mut rng).as_bytes();
            assert_eq!(bytes[6] >> 4, 4, "UUID version must be 4");
            assert_eq!(bytes[8] >> 6, 2, "UUID variant must be RFC 4122");
        }
    }

    #[test]
    fn uuid_display_parses_back() {
        let mut rng = GameRng::new(42);
        let uuid = SimUuid::new_v4(&mut rng);
        let s = uuid.to_string();
        assert_eq!(s.len(), 36);
        assert_eq!(&s[8..9], "-");
        assert_eq!(&s[23..24], "-");
        assert_eq!(SimUuid::parse(&s), Some(uuid));
    }

    #[test]
    fn uuid_parse_rejects_garbage() {
        assert_eq!(SimUuid::parse("not-a-uuid"), None);
        assert_eq!(SimUuid::parse("zz000000-0000-0000-0000-000000000000"), None);
    }

    #[test]
    fn creature_id_json_key() {
        let mut rng = GameRng::new(3);
        let id = CreatureId::new(&mut rng);
        let json = serde_json::to_string(&id).unwrap();
        let restored: CreatureId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, restored);
    }

    #[test]
    fn terrain_sample_packing() {
        let s = TerrainSample::new(200, material::STONE);
        assert_eq!(s.density(), 200);
        assert_eq!(s.material(), material::STONE);
        assert!(s.is_solid());
        assert!(!TerrainSample::AIR.is_solid());
        assert_eq!(TerrainSample::OUT_OF_BOUNDS.material(), material::BEDROCK);
    }

    #[test]
    fn coord_arithmetic() {
        let a = VoxelCoord::new(1, -2, 3);
        let b = VoxelCoord::new(4, 4, -4);
        assert_eq!(a + b, VoxelCoord::new(5, 2, -1));
        assert_eq!(a - b, VoxelCoord::new(-3, -6, 7));
        assert_eq!(-a, VoxelCoord::new(-1, 2, -3));
        assert_eq!((a - b).chebyshev_length(), 7);
        assert_eq!(a.min(b), VoxelCoord::new(1, -2, -4));
    }
}
