// Integer bounding boxes and the 27-value direction byte.
//
// `Aabb` is an axis-aligned box with inclusive integer corners. The spatial
// index stores one per node (degenerate single-point boxes at leaves) and
// profiles use one to describe the offsets they cover.
//
// `Direction` encodes a step in `{-1, 0, 1}^3` as a single byte:
// `(dx + 1) + 3 * (dy + 1) + 9 * (dz + 1)`. Value 13 is "no movement" and
// marks the start cell of a search. `Direction::NEIGHBORS` is the one table of
// the 26 real moves; the pathfinder expands in that order and decodes with
// `offset()`, so both sides always agree.
//
// See also: `spatial_index.rs` (node bounds), `pathfinding.rs` (direction
// bytes and step costs), `profile.rs` (profile extents).

use crate::types::VoxelCoord;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Aabb
// ---------------------------------------------------------------------------

/// Axis-aligned box with inclusive integer corners. `min <= max` on every axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Aabb {
    pub min: VoxelCoord,
    pub max: VoxelCoord,
}

impl Aabb {
    /// Box spanning two corners, given in any order.
    pub fn new(a: VoxelCoord, b: VoxelCoord) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    /// Degenerate box holding one cell.
    pub const fn point(p: VoxelCoord) -> Self {
        Self { min: p, max: p }
    }

    /// Cube of half-extent `radius` around `center`.
    pub fn cube(center: VoxelCoord, radius: i32) -> Self {
        let r = VoxelCoord::splat(radius.abs());
        Self {
            min: center - r,
            max: center + r,
        }
    }

    /// Box covering the whole representable grid.
    pub const fn everything() -> Self {
        Self {
            min: VoxelCoord::splat(i32::MIN),
            max: VoxelCoord::splat(i32::MAX),
        }
    }

    pub fn union(self, other: Self) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// This box grown just enough to include `p`.
    pub fn grown_to(self, p: VoxelCoord) -> Self {
        Self {
            min: self.min.min(p),
            max: self.max.max(p),
        }
    }

    pub fn contains_point(&self, p: VoxelCoord) -> bool {
        p.x >= self.min.x
            && p.x <= self.max.x
            && p.y >= self.min.y
            && p.y <= self.max.y
            && p.z >= self.min.z
            && p.z <= self.max.z
    }

    pub fn contains(&self, other: &Self) -> bool {
        self.contains_point(other.min) && self.contains_point(other.max)
    }

    /// Inclusive overlap test: boxes sharing a face cell intersect.
    pub fn intersects(&self, other: &Self) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }

    /// Cells per axis.
    pub fn extent(&self) -> (u64, u64, u64) {
        (
            (self.max.x as i64 - self.min.x as i64 + 1) as u64,
            (self.max.y as i64 - self.min.y as i64 + 1) as u64,
            (self.max.z as i64 - self.min.z as i64 + 1) as u64,
        )
    }

    /// Number of cells covered, saturating for absurdly large boxes.
    pub fn volume(&self) -> u64 {
        let (x, y, z) = self.extent();
        x.saturating_mul(y).saturating_mul(z)
    }

    /// Every cell in the box, x fastest, then z, then y.
    pub fn cells(&self) -> impl Iterator<Item = VoxelCoord> + '_ {
        (self.min.y..=self.max.y).flat_map(move |y| {
            (self.min.z..=self.max.z)
                .flat_map(move |z| (self.min.x..=self.max.x).map(move |x| VoxelCoord::new(x, y, z)))
        })
    }
}

// ---------------------------------------------------------------------------
// Direction byte
// ---------------------------------------------------------------------------

/// Cost of a face step (one axis changes).
pub const FACE_COST: u32 = 10;
/// Cost of an edge step (two axes change), about 10·√2.
pub const EDGE_COST: u32 = 14;
/// Cost of a corner step (all three axes change), about 10·√3.
pub const CORNER_COST: u32 = 17;

/// A step to one of the 26 neighbors, or `STAY`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Direction(u8);

impl Direction {
    /// No movement. Marks the start cell while searching.
    pub const STAY: Self = Self(13);

    /// All 26 moves in encoding order, `STAY` skipped.
    pub const NEIGHBORS: [Self; 26] = {
        let mut table = [Self::STAY; 26];
        let mut code = 0u8;
        let mut i = 0;
        while code < 27 {
            if code != 13 {
                table[i] = Self(code);
                i += 1;
            }
            code += 1;
        }
        table
    };

    /// Decode a raw byte. `None` for values above 26.
    pub const fn from_byte(byte: u8) -> Option<Self> {
        if byte < 27 { Some(Self(byte)) } else { None }
    }

    /// Encode a step. `None` unless every component is in `-1..=1`.
    pub fn from_offset(offset: VoxelCoord) -> Option<Self> {
        let unit = -1..=1;
        if !(unit.contains(&offset.x) && unit.contains(&offset.y) && unit.contains(&offset.z)) {
            return None;
        }
        Some(Self(
            ((offset.x + 1) + 3 * (offset.y + 1) + 9 * (offset.z + 1)) as u8,
        ))
    }

    pub const fn as_byte(self) -> u8 {
        self.0
    }

    pub const fn offset(self) -> VoxelCoord {
        let c = self.0 as i32;
        VoxelCoord::new(c % 3 - 1, (c / 3) % 3 - 1, c / 9 - 1)
    }

    /// Number of axes that change: 0 for `STAY`, up to 3 for corners.
    pub const fn axes(self) -> u32 {
        let o = self.offset();
        (o.x != 0) as u32 + (o.y != 0) as u32 + (o.z != 0) as u32
    }

    /// Traversal cost of this step (0 for `STAY`).
    pub const fn cost(self) -> u32 {
        match self.axes() {
            0 => 0,
            1 => FACE_COST,
            2 => EDGE_COST,
            _ => CORNER_COST,
        }
    }
}

/// Admissible, consistent estimate of the cost between two cells under the
/// face/edge/corner cost model.
pub fn octile_distance(a: VoxelCoord, b: VoxelCoord) -> u32 {
    let d = (a - b).abs();
    let mut axes = [d.x as u32, d.y as u32, d.z as u32];
    axes.sort_unstable();
    let [min, mid, max] = axes;
    min * CORNER_COST + (mid - min) * EDGE_COST + (max - mid) * FACE_COST
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aabb_intersection_is_inclusive() {
        let a = Aabb::new(VoxelCoord::new(0, 0, 0), VoxelCoord::new(2, 2, 2));
        let b = Aabb::new(VoxelCoord::new(2, 2, 2), VoxelCoord::new(5, 5, 5));
        let c = Aabb::new(VoxelCoord::new(3, 0, 0), VoxelCoord::new(5, 2, 2));
        assert!(a.intersects(&b));
        assert!(b.intersects(&a));
        assert!(!a.intersects(&c));
    }

    #[test]
    fn aabb_new_orders_corners() {
        let b = Aabb::new(VoxelCoord::new(5, -1, 2), VoxelCoord::new(1, 3, 0));
        assert_eq!(b.min, VoxelCoord::new(1, -1, 0));
        assert_eq!(b.max, VoxelCoord::new(5, 3, 2));
    }

    #[test]
    fn aabb_union_and_growth() {
        let p = Aabb::point(VoxelCoord::new(1, 1, 1));
        let grown = p.grown_to(VoxelCoord::new(-2, 4, 1));
        assert_eq!(grown, Aabb::new(VoxelCoord::new(-2, 1, 1), VoxelCoord::new(1, 4, 1)));
        assert_eq!(p.union(grown), grown);
        assert!(grown.contains(&p));
        assert_eq!(grown.volume(), 4 * 4);
        assert_eq!(p.volume(), 1);
    }

    #[test]
    fn everything_volume_saturates() {
        assert_eq!(Aabb::everything().volume(), u64::MAX);
        assert!(Aabb::everything().contains_point(VoxelCoord::new(i32::MIN, 0, i32::MAX)));
    }

    #[test]
    fn cells_visits_whole_box() {
        let b = Aabb::new(VoxelCoord::new(0, 0, 0), VoxelCoord::new(1, 2, 3));
        let cells: Vec<_> = b.cells().collect();
        assert_eq!(cells.len() as u64, b.volume());
        assert_eq!(cells[0], b.min);
        assert_eq!(cells[1], VoxelCoord::new(1, 0, 0));
        assert_eq!(*cells.last().unwrap(), b.max);
    }

    #[test]
    fn direction_table_round_trips_offsets() {
        assert_eq!(Direction::STAY.offset(), VoxelCoord::ZERO);
        for dir in Direction::NEIGHBORS {
            assert_ne!(dir, Direction::STAY);
            assert_eq!(Direction::from_offset(dir.offset()), Some(dir));
        }
    }

    #[test]
    fn direction_costs_by_kind() {
        let count = |cost| Direction::NEIGHBORS.iter().filter(|d| d.cost() == cost).count();
        assert_eq!(count(FACE_COST), 6);
        assert_eq!(count(EDGE_COST), 12);
        assert_eq!(count(CORNER_COST), 8);
        assert_eq!(Direction::STAY.cost(), 0);
    }

    #[test]
    fn direction_byte_layout() {
        let plus_x = Direction::from_offset(VoxelCoord::new(1, 0, 0)).unwrap();
        assert_eq!(plus_x.as_byte(), 14);
        assert_eq!(Direction::from_byte(27), None);
        assert_eq!(Direction::from_offset(VoxelCoord::new(2, 0, 0)), None);
    }

    #[test]
    fn octile_matches_step_costs() {
        let o = VoxelCoord::ZERO;
        assert_eq!(octile_distance(o, VoxelCoord::new(3, 0, 0)), 30);
        assert_eq!(octile_distance(o, VoxelCoord::new(1, 1, 1)), 17);
        assert_eq!(octile_distance(o, VoxelCoord::new(-2, 1, 0)), 14 + 10);
        assert_eq!(octile_distance(o, VoxelCoord::new(4, -2, 1)), 17 + 14 + 20);
    }

    #[test]
    fn octile_never_exceeds_any_single_step() {
        // Consistency: h(a) <= cost(a, b) + h(b) for each neighbor step.
        let target = VoxelCoord::new(5, -3, 2);
        let a = VoxelCoord::new(-1, 2, 0);
        for dir in Direction::NEIGHBORS {
            let b = a + dir.offset();
            assert!(octile_distance(a, target) <= dir.cost() + octile_distance(b, target));
        }
    }
}
