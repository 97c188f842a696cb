// Dense 3D terrain grid and the terrain oracle contract.
//
// `TerrainOracle` is the only way the footprint checks and the pathfinder see
// the world: a pure function from a cell to its packed `TerrainSample`.
// `VoxelWorld` is the stock implementation, a flat `Vec<TerrainSample>`
// indexed by `x + z * size_x + y * size_x * size_z`. Out-of-bounds reads
// return `TerrainSample::OUT_OF_BOUNDS` (solid bedrock), so creatures can
// stand on the bottom of the world but never walk off its edges. Any
// `Fn(VoxelCoord) -> TerrainSample` is also an oracle, which keeps tests and
// procedural samplers free of grid storage.
//
// See also: `profile.rs` which samples the oracle per footprint cell,
// `pathfinding.rs` which threads an oracle through every search, `sim.rs`
// which owns the `VoxelWorld`.
//
// **Critical constraint: determinism.** The world is only mutated between
// ticks, never during the parallel update phase.

use crate::geometry::Aabb;
use crate::types::{TerrainSample, VoxelCoord, material};

/// Source of terrain attributes. Implementations must be pure: the same cell
/// always yields the same sample while a tick is running.
pub trait TerrainOracle {
    fn sample(&self, cell: VoxelCoord) -> TerrainSample;
}

impl<F> TerrainOracle for F
where
    F: Fn(VoxelCoord) -> TerrainSample,
{
    fn sample(&self, cell: VoxelCoord) -> TerrainSample {
        self(cell)
    }
}

/// Dense 3D terrain grid.
#[derive(Clone, Debug, Default)]
pub struct VoxelWorld {
    /// Flat storage: index = x + z * size_x + y * size_x * size_z.
    cells: Vec<TerrainSample>,
    pub size_x: u32,
    pub size_y: u32,
    pub size_z: u32,
}

impl VoxelWorld {
    /// A world of open air.
    pub fn new(size_x: u32, size_y: u32, size_z: u32) -> Self {
        let total = (size_x as usize) * (size_y as usize) * (size_z as usize);
        Self {
            cells: vec![TerrainSample::AIR; total],
            size_x,
            size_y,
            size_z,
        }
    }

    /// Flat grassland: soil for `y < ground_height - 1`, a grass layer at
    /// `ground_height - 1`, air above.
    pub fn meadow(size_x: u32, size_y: u32, size_z: u32, ground_height: i32) -> Self {
        let mut world = Self::new(size_x, size_y, size_z);
        if ground_height > 0 {
            let top = ground_height - 1;
            let max_x = size_x as i32 - 1;
            let max_z = size_z as i32 - 1;
            if top > 0 {
                world.fill(
                    Aabb::new(VoxelCoord::new(0, 0, 0), VoxelCoord::new(max_x, top - 1, max_z)),
                    TerrainSample::new(u8::MAX, material::SOIL),
                );
            }
            world.fill(
                Aabb::new(VoxelCoord::new(0, top, 0), VoxelCoord::new(max_x, top, max_z)),
                TerrainSample::new(u8::MAX, material::GRASS),
            );
        }
        world
    }

    pub fn in_bounds(&self, coord: VoxelCoord) -> bool {
        coord.x >= 0
            && coord.y >= 0
            && coord.z >= 0
            && (coord.x as u32) < self.size_x
            && (coord.y as u32) < self.size_y
            && (coord.z as u32) < self.size_z
    }

    /// The box of valid coordinates, or `None` for a zero-sized world.
    pub fn bounds(&self) -> Option<Aabb> {
        if self.cells.is_empty() {
            return None;
        }
        Some(Aabb::new(
            VoxelCoord::ZERO,
            VoxelCoord::new(
                self.size_x as i32 - 1,
                self.size_y as i32 - 1,
                self.size_z as i32 - 1,
            ),
        ))
    }

    fn index(&self, coord: VoxelCoord) -> Option<usize> {
        if !self.in_bounds(coord) {
            return None;
        }
        let sx = self.size_x as usize;
        let sz = self.size_z as usize;
        Some(coord.x as usize + coord.z as usize * sx + coord.y as usize * sx * sz)
    }

    pub fn get(&self, coord: VoxelCoord) -> TerrainSample {
        self.index(coord)
            .map_or(TerrainSample::OUT_OF_BOUNDS, |i| self.cells[i])
    }

    /// No-op for out-of-bounds coordinates.
    pub fn set(&mut self, coord: VoxelCoord, sample: TerrainSample) {
        if let Some(i) = self.index(coord) {
            self.cells[i] = sample;
        }
    }

    /// Set every in-bounds cell of `region`.
    pub fn fill(&mut self, region: Aabb, sample: TerrainSample) {
        let Some(bounds) = self.bounds() else {
            return;
        };
        if !bounds.intersects(&region) {
            return;
        }
        let clipped = Aabb::new(region.min.max(bounds.min), region.max.min(bounds.max));
        for cell in clipped.cells() {
            self.set(cell, sample);
        }
    }

    /// Height of the first open cell above solid ground in column `(x, z)`,
    /// scanning down from the top. `None` if the column has no solid cell.
    pub fn surface_height(&self, x: i32, z: i32) -> Option<i32> {
        (0..self.size_y as i32)
            .rev()
            .find(|&y| self.get(VoxelCoord::new(x, y, z)).is_solid())
            .map(|y| y + 1)
    }
}

impl TerrainOracle for VoxelWorld {
    fn sample(&self, cell: VoxelCoord) -> TerrainSample {
        self.get(cell)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_world_is_air() {
        let world = VoxelWorld::new(4, 4, 4);
        assert_eq!(world.get(VoxelCoord::new(1, 2, 3)), TerrainSample::AIR);
    }

    #[test]
    fn out_of_bounds_reads_bedrock() {
        let world = VoxelWorld::new(4, 4, 4);
        assert_eq!(world.get(VoxelCoord::new(-1, 0, 0)), TerrainSample::OUT_OF_BOUNDS);
        assert_eq!(world.get(VoxelCoord::new(0, 4, 0)), TerrainSample::OUT_OF_BOUNDS);
    }

    #[test]
    fn out_of_bounds_write_is_noop() {
        let mut world = VoxelWorld::new(2, 2, 2);
        world.set(VoxelCoord::new(5, 5, 5), TerrainSample::new(200, material::STONE));
        assert!(world.cells.iter().all(|&c| c == TerrainSample::AIR));
    }

    #[test]
    fn fill_clips_to_world() {
        let mut world = VoxelWorld::new(4, 4, 4);
        let stone = TerrainSample::new(255, material::STONE);
        world.fill(Aabb::new(VoxelCoord::new(-5, -5, -5), VoxelCoord::new(0, 0, 0)), stone);
        assert_eq!(world.get(VoxelCoord::ZERO), stone);
        assert_eq!(world.get(VoxelCoord::new(1, 0, 0)), TerrainSample::AIR);
    }

    #[test]
    fn meadow_layers() {
        let world = VoxelWorld::meadow(8, 8, 8, 3);
        assert_eq!(world.get(VoxelCoord::new(2, 0, 2)).material(), material::SOIL);
        assert_eq!(world.get(VoxelCoord::new(2, 2, 2)).material(), material::GRASS);
        assert_eq!(world.get(VoxelCoord::new(2, 3, 2)), TerrainSample::AIR);
        assert_eq!(world.surface_height(2, 2), Some(3));
    }

    #[test]
    fn surface_height_of_empty_column() {
        let world = VoxelWorld::new(3, 3, 3);
        assert_eq!(world.surface_height(1, 1), None);
    }

    #[test]
    fn closures_are_oracles() {
        let oracle = |c: VoxelCoord| {
            if c.y < 0 {
                TerrainSample::new(255, material::STONE)
            } else {
                TerrainSample::AIR
            }
        };
        assert!(oracle.sample(VoxelCoord::new(0, -1, 0)).is_solid());
        assert!(!oracle.sample(VoxelCoord::new(0, 0, 0)).is_solid());
    }
}
