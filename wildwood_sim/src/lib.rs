// wildwood_sim — pure Rust simulation core for Wildwood.
//
// This crate holds the two structures that let many independently updated
// creatures share a voxel meadow: a dynamic AABB tree answering "who is near
// me", and a bounded-window A* pathfinder that checks every candidate cell
// against a multi-cell footprint. A small tick driver ties them together the
// way a game loop would. It has no rendering or engine dependencies and can
// be tested, benchmarked and run headless.
//
// Module overview:
// - `sim.rs`:           SimState, the tick loop (serial drain, parallel plan, apply).
// - `command.rs`:       SimCommand / SimAction, MutationQueue for deferred index changes.
// - `spatial_index.rs`: Dynamic AABB tree over creature positions.
// - `pathfinding.rs`:   Bounded-window A* with a per-call scratch arena.
// - `profile.rs`:       Footprint profiles and the AND/OR/EXCLUDE verifier.
// - `world.rs`:         TerrainOracle trait and the dense VoxelWorld grid.
// - `geometry.rs`:      Inclusive integer Aabb, Direction byte, step costs, heuristic.
// - `config.rs`:        SimConfig, loaded from JSON and validated.
// - `species.rs`:       SpeciesData, data-driven creature behavior.
// - `error.rs`:         ConfigError and IndexCorruption.
// - `prng`:             Re-exported from `wildwood_prng`, xoshiro256++ with SplitMix64 seeding.
// - `types.rs`:         VoxelCoord, TerrainSample, creature IDs, Species enum.
//
// **Critical constraint: determinism.** All randomness comes from a seeded
// xoshiro256++ PRNG (re-exported from `wildwood_prng`). No system time, no OS
// entropy. Use `BTreeMap` wherever iteration order is observable.

pub mod command;
pub mod config;
pub mod error;
pub mod geometry;
pub mod pathfinding;
pub use wildwood_prng as prng;
pub mod profile;
pub mod sim;
pub mod spatial_index;
pub mod species;
pub mod types;
pub mod world;
