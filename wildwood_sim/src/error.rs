// Error types for the simulation core.
//
// Three families, all `thiserror` enums:
// - `ConfigError`: a `SimConfig` that failed to parse or describes an
//   unusable setup (non-positive radii, a species that references itself as
//   prey). Returned by `SimConfig::from_json()` and `SimConfig::validate()`.
// - `ProfileError`: a deserialized `Profile` whose condition array does not
//   cover its bounds. Surfaces through serde as a deserialization error.
// - `IndexCorruption`: a structural invariant of the `SpatialIndex` that does
//   not hold. Only `SpatialIndex::validate()` produces these; the hot paths
//   never check.
//
// Everything else in the core is infallible by contract: pathfinding always
// returns a (possibly empty) route, and deleting an unknown creature is a
// no-op.

use crate::types::{CreatureId, Species, VoxelCoord};

/// A configuration that cannot drive a simulation.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("config is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("{field} must be positive, got {value}")]
    NonPositive { field: String, value: i64 },

    #[error("default search radius {radius} exceeds the configured maximum {max}")]
    DefaultRadiusTooLarge { radius: i32, max: i32 },

    #[error("{species:?} search radius {radius} exceeds the configured maximum {max}")]
    RadiusTooLarge {
        species: Species,
        radius: i32,
        max: i32,
    },

    #[error("{0:?} lists itself as prey")]
    SelfPredation(Species),
}

/// A serialized profile that does not describe a well-formed footprint.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum ProfileError {
    #[error("profile bounds {min} .. {max} are inverted")]
    InvertedBounds { min: VoxelCoord, max: VoxelCoord },

    #[error("profile bounds cover {expected} cells but {found} conditions were given")]
    ConditionCount { expected: u64, found: usize },
}

/// A broken structural invariant in the spatial index.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum IndexCorruption {
    #[error("slot 0 is not a sentinel branch")]
    BadSentinel,

    #[error("slot {slot} points at slot {target}, past the logical length {len}")]
    DanglingSlot { slot: u32, target: u32, len: usize },

    #[error("slot {slot} records parent {found}, but is a child of {expected}")]
    ParentMismatch {
        slot: u32,
        expected: u32,
        found: u32,
    },

    #[error("branch {slot} bounds differ from the union of its children")]
    BoundsMismatch { slot: u32 },

    #[error("leaf {slot} bounds are not a single point")]
    ThickLeaf { slot: u32 },

    #[error("{id} maps to slot {recorded:?}, but its leaf is slot {actual}")]
    IdTableMismatch {
        id: CreatureId,
        recorded: Option<u32>,
        actual: u32,
    },

    #[error("tree reaches {reachable} nodes but the slot array holds {len}")]
    Unreachable { reachable: usize, len: usize },

    #[error("tree has {leaves} leaves but the id table holds {ids} ids")]
    LeafCountMismatch { leaves: usize, ids: usize },
}
