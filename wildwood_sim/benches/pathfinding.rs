//! Benchmarks for the pathfinder and the spatial index.
//!
//! Run with: cargo bench -p wildwood_sim
//!
//! To compare against baseline:
//! 1. First run: cargo bench -p wildwood_sim -- --save-baseline main
//! 2. After changes: cargo bench -p wildwood_sim -- --baseline main

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use wildwood_sim::geometry::Aabb;
use wildwood_sim::pathfinding::{find_path, find_path_along_ray};
use wildwood_sim::prng::GameRng;
use wildwood_sim::profile::Profile;
use wildwood_sim::spatial_index::SpatialIndex;
use wildwood_sim::types::{CreatureId, TerrainSample, VoxelCoord, material};
use wildwood_sim::world::VoxelWorld;

// =============================================================================
// Terrain
// =============================================================================

const GROUND: i32 = 8;

/// Meadow with scattered two-high stone boulders.
fn rocky_meadow(seed: u64) -> VoxelWorld {
    let mut world = VoxelWorld::meadow(64, 24, 64, GROUND);
    let mut rng = GameRng::new(seed);
    let stone = TerrainSample::new(u8::MAX, material::STONE);
    for _ in 0..300 {
        let x = rng.range_i32_inclusive(0, 63);
        let z = rng.range_i32_inclusive(0, 63);
        world.fill(
            Aabb::new(VoxelCoord::new(x, GROUND, z), VoxelCoord::new(x, GROUND + 1, z)),
            stone,
        );
    }
    world
}

// =============================================================================
// Pathfinding
// =============================================================================

fn bench_find_path(c: &mut Criterion) {
    let world = rocky_meadow(1);
    let walker = Profile::walker(2);
    let origin = VoxelCoord::new(32, GROUND, 32);
    let mut group = c.benchmark_group("find_path");
    for radius in [4, 8, 12] {
        let target = VoxelCoord::new(radius, 0, radius / 2);
        group.bench_with_input(BenchmarkId::from_parameter(radius), &radius, |b, &r| {
            b.iter(|| find_path(&world, black_box(origin), black_box(target), r, &walker));
        });
    }
    group.finish();
}

fn bench_along_ray(c: &mut Criterion) {
    let world = rocky_meadow(2);
    let flyer = Profile::flyer(1);
    let origin = VoxelCoord::new(32, GROUND + 3, 32);
    c.bench_function("find_path_along_ray/flyer_r8", |b| {
        b.iter(|| {
            find_path_along_ray(&world, black_box(origin), VoxelCoord::new(1, 0, 1), 8, &flyer)
        });
    });
}

// =============================================================================
// Spatial index
// =============================================================================

fn populated_index(n: usize) -> (SpatialIndex, Vec<CreatureId>) {
    let mut rng = GameRng::new(3);
    let mut index = SpatialIndex::with_capacity(n);
    let mut ids = Vec::with_capacity(n);
    for _ in 0..n {
        let id = CreatureId::new(&mut rng);
        let p = VoxelCoord::new(
            rng.range_i32_inclusive(0, 255),
            rng.range_i32_inclusive(0, 31),
            rng.range_i32_inclusive(0, 255),
        );
        index.insert(p, id);
        ids.push(id);
    }
    (index, ids)
}

fn bench_index(c: &mut Criterion) {
    let mut group = c.benchmark_group("spatial_index");
    for n in [256, 4096] {
        let (index, ids) = populated_index(n);
        group.bench_with_input(BenchmarkId::new("query_cube_r12", n), &index, |b, index| {
            b.iter(|| {
                let mut hits = 0usize;
                index.query_cube(black_box(VoxelCoord::new(128, 16, 128)), 12, |_, _| hits += 1);
                hits
            });
        });
        group.bench_with_input(BenchmarkId::new("relocate", n), &ids, |b, ids| {
            let mut index = index.clone();
            let mut rng = GameRng::new(4);
            b.iter(|| {
                let id = ids[rng.index(ids.len())];
                let p = VoxelCoord::new(
                    rng.range_i32_inclusive(0, 255),
                    rng.range_i32_inclusive(0, 31),
                    rng.range_i32_inclusive(0, 255),
                );
                index.insert(p, id);
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_find_path, bench_along_ray, bench_index);
criterion_main!(benches);
