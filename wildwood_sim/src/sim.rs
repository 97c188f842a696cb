// Simulation state and the reference tick loop.
//
// `SimState` owns the meadow (`VoxelWorld`), the creature store, the
// `SpatialIndex` over creature positions, the pending `MutationQueue`, the
// PRNG and the config. It exists to drive the index and the pathfinder the
// way a full game loop would; it is not a behavior scheduler.
//
// ## Tick phases
//
// `step()` advances one tick at a time up to `target_tick`. Each tick:
//
//   1. Commands tagged with this tick apply. Spawns add a creature to the
//      store and queue an `Insert`; despawns remove it and queue a `Delete`.
//   2. Serial mutation phase: the queue drains into the index. This is the
//      only place the index is mutated.
//   3. Parallel update phase (rayon): every creature plans against shared
//      `&` borrows of the index, the world and the store. Planning returns a
//      `Plan` value and writes nothing.
//   4. Plans apply in creature id order. A creature that stepped outside its
//      `SpatialIndex::locality()` queues a `Relocate`, applied in step 2 of
//      the next tick.
//
// Because relocation is lazy, index positions lag the store by up to a
// locality. Planners use the index only to find candidates and read real
// positions from the store.
//
// ## Behavior
//
// - A creature perceiving a predator (a species whose `prey` lists its own)
//   flees along the ray away from the nearest one.
// - A hunter perceiving prey approaches the nearest one with
//   `find_path_or_approach_target`.
// - A grazer stays put on a grazing spot, otherwise searches along its
//   heading with `find_match_along_ray`.
// - Everyone else cruises along their heading with `find_path_along_ray`
//   (hawks fly, since the flyer profile waives footing in transit).
// - A creature that cannot move turns its heading 90 degrees.
//
// "Nearest" is Chebyshev distance with ties broken by `CreatureId`.
//
// See also: `command.rs` for `SimCommand` and the mutation queue,
// `spatial_index.rs`, `pathfinding.rs`, `species.rs` for the per-species data
// that drives the planner.
//
// **Critical constraint: determinism.** All randomness comes from `rng` and is
// only drawn in the serial phases. The parallel phase is a pure function of
// the tick's starting state, and its results are applied in id order.

use crate::command::{DrainStats, MutationQueue, MutationRequest, SimAction, SimCommand};
use crate::config::SimConfig;
use crate::geometry::Direction;
use crate::pathfinding::{self, Path};
use crate::prng::GameRng;
use crate::profile::verify;
use crate::spatial_index::SpatialIndex;
use crate::types::*;
use crate::world::VoxelWorld;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Horizontal headings a spawned creature may start with.
const HEADINGS: [VoxelCoord; 8] = [
    VoxelCoord::new(1, 0, 0),
    VoxelCoord::new(1, 0, 1),
    VoxelCoord::new(0, 0, 1),
    VoxelCoord::new(-1, 0, 1),
    VoxelCoord::new(-1, 0, 0),
    VoxelCoord::new(-1, 0, -1),
    VoxelCoord::new(0, 0, -1),
    VoxelCoord::new(1, 0, -1),
];

/// What a creature decided to do on its last update.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Activity {
    #[default]
    Idle,
    Fleeing,
    Hunting,
    Grazing,
    Cruising,
}

/// A creature in the store. The index holds only its id and (lagging)
/// position.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Creature {
    pub id: CreatureId,
    pub species: Species,
    pub position: VoxelCoord,
    /// Cruising direction when nothing more urgent is going on.
    pub heading: VoxelCoord,
    pub activity: Activity,
}

/// Outcome of planning one creature's update.
#[derive(Clone, Copy, Debug)]
struct Plan {
    step: Option<Direction>,
    heading: VoxelCoord,
    activity: Activity,
}

/// Totals over the ticks one `step()` call advanced.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StepResult {
    /// Creature moves applied.
    pub moves: usize,
    /// Moves that left their locality and queued a `Relocate`.
    pub relocations: usize,
}

/// Top-level simulation state.
#[derive(Clone, Debug)]
pub struct SimState {
    /// Last tick fully processed.
    pub tick: u64,

    /// The simulation's deterministic PRNG.
    pub rng: GameRng,

    /// Configuration (immutable after initialization).
    pub config: SimConfig,

    pub world: VoxelWorld,

    /// All creatures, keyed by ID. BTreeMap for deterministic iteration.
    pub creatures: BTreeMap<CreatureId, Creature>,

    pub index: SpatialIndex,

    /// Index mutations waiting for the next serial phase.
    pub mutations: MutationQueue,
}

impl SimState {
    /// Create a new simulation with default config and the given seed.
    pub fn new(seed: u64) -> Self {
        Self::with_config(seed, SimConfig::default())
    }

    /// Create a new simulation with the given seed and config. The config is
    /// assumed valid (see `SimConfig::validate()`).
    pub fn with_config(seed: u64, config: SimConfig) -> Self {
        let (sx, sy, sz) = config.world_size;
        let world = VoxelWorld::meadow(sx, sy, sz, config.ground_height);
        let index = SpatialIndex::with_capacity(config.index.initial_capacity);
        Self {
            tick: 0,
            rng: GameRng::new(seed),
            config,
            world,
            creatures: BTreeMap::new(),
            index,
            mutations: MutationQueue::new(),
        }
    }

    /// Apply commands and advance the sim to `target_tick`, one tick at a
    /// time.
    ///
    /// Commands must be sorted by tick. Commands tagged at or before the
    /// current tick have already had their chance and are skipped; commands
    /// after `target_tick` wait for a later call.
    pub fn step(&mut self, commands: &[SimCommand], target_tick: u64) -> StepResult {
        let mut result = StepResult::default();
        let mut cmd_idx = commands.partition_point(|c| c.tick <= self.tick);

        while self.tick < target_tick {
            self.tick += 1;

            while let Some(cmd) = commands.get(cmd_idx).filter(|c| c.tick <= self.tick) {
                cmd_idx += 1;
                self.apply_command(cmd);
            }

            let tick_result = self.update();
            result.moves += tick_result.moves;
            result.relocations += tick_result.relocations;
        }

        result
    }

    /// Drain pending mutations into the index outside the tick loop.
    pub fn flush_mutations(&mut self) -> DrainStats {
        self.mutations.drain_into(&mut self.index)
    }

    pub fn creature_count(&self, species: Species) -> usize {
        self.creatures
            .values()
            .filter(|c| c.species == species)
            .count()
    }

    fn apply_command(&mut self, cmd: &SimCommand) {
        match cmd.action {
            SimAction::SpawnCreature { species, position } => {
                self.spawn_creature(species, position);
            }
            SimAction::DespawnCreature { creature_id } => {
                if self.creatures.remove(&creature_id).is_some() {
                    self.mutations.push(MutationRequest::Delete { id: creature_id });
                }
            }
        }
    }

    fn spawn_creature(&mut self, species: Species, requested: VoxelCoord) {
        let Some(data) = self.config.species.get(&species) else {
            debug!(?species, "no species data, spawn ignored");
            return;
        };
        let profile = data.path_profile();

        // Placement semantics: fliers need footing to be put down too.
        let standable = |p: &VoxelCoord| verify(*p, &profile, &self.world, false);
        let position = Some(requested).filter(standable).or_else(|| {
            self.world
                .surface_height(requested.x, requested.z)
                .map(|y| VoxelCoord::new(requested.x, y, requested.z))
                .filter(standable)
        });
        let Some(position) = position else {
            debug!(?species, %requested, "no standable cell, spawn ignored");
            return;
        };

        let id = CreatureId::new(&mut self.rng);
        let heading = HEADINGS[self.rng.index(HEADINGS.len())];
        self.creatures.insert(
            id,
            Creature {
                id,
                species,
                position,
                heading,
                activity: Activity::Idle,
            },
        );
        self.mutations.push(MutationRequest::Insert { id, position });
        debug!(%id, ?species, %position, "spawned creature");
    }

    /// One tick after commands: serial drain, parallel plan, serial apply.
    fn update(&mut self) -> StepResult {
        self.mutations.drain_into(&mut self.index);

        let plans: Vec<(CreatureId, Plan)> = {
            let snapshot: Vec<&Creature> = self.creatures.values().collect();
            snapshot
                .par_iter()
                .map(|c| (c.id, self.plan(c)))
                .collect()
        };

        let mut result = StepResult::default();
        for (id, plan) in plans {
            let Some(creature) = self.creatures.get_mut(&id) else {
                continue;
            };
            creature.heading = plan.heading;
            creature.activity = plan.activity;
            let Some(step) = plan.step else {
                continue;
            };
            creature.position = creature.position + step.offset();
            result.moves += 1;

            let inside = self
                .index
                .locality(id)
                .is_some_and(|b| b.contains_point(creature.position));
            if !inside {
                self.mutations.push(MutationRequest::Relocate {
                    id,
                    position: creature.position,
                });
                result.relocations += 1;
            }
        }

        debug!(
            tick = self.tick,
            creatures = self.creatures.len(),
            moves = result.moves,
            relocations = result.relocations,
            "tick complete"
        );
        result
    }

    /// Decide one creature's move. Reads shared state only.
    fn plan(&self, creature: &Creature) -> Plan {
        let idle = Plan {
            step: None,
            heading: creature.heading,
            activity: Activity::Idle,
        };
        let Some(data) = self.config.species.get(&creature.species) else {
            return idle;
        };
        let origin = creature.position;
        let radius = self.config.search_radius(creature.species);
        let profile = data.path_profile();

        let mut threat: Option<(u32, CreatureId, VoxelCoord)> = None;
        let mut prey: Option<(u32, CreatureId, VoxelCoord)> = None;
        self.index
            .query_cube(origin, data.perception_radius, |id, _| {
                if id == creature.id {
                    return;
                }
                let Some(other) = self.creatures.get(&id) else {
                    return;
                };
                let offset = other.position - origin;
                let candidate = Some((offset.chebyshev_length(), id, offset));
                let hunted_by_other = self
                    .config
                    .species
                    .get(&other.species)
                    .is_some_and(|o| o.hunts(creature.species));
                if hunted_by_other && (threat.is_none() || candidate < threat) {
                    threat = candidate;
                }
                if data.hunts(other.species) && (prey.is_none() || candidate < prey) {
                    prey = candidate;
                }
            });

        let (path, activity) = if let Some((_, _, offset)) = threat {
            let away = if offset == VoxelCoord::ZERO {
                creature.heading
            } else {
                -offset
            };
            let path =
                pathfinding::find_path_along_ray(&self.world, origin, away, radius, &profile);
            (path, Activity::Fleeing)
        } else if let Some((_, _, offset)) = prey {
            let path = pathfinding::find_path_or_approach_target(
                &self.world,
                origin,
                offset,
                radius,
                &profile,
            );
            (path, Activity::Hunting)
        } else if let Some(grazing) = data.grazing_profile() {
            if verify(origin, &grazing, &self.world, false) {
                return Plan {
                    activity: Activity::Grazing,
                    ..idle
                };
            }
            let found = pathfinding::find_match_along_ray(
                &self.world,
                origin,
                creature.heading,
                radius,
                &profile,
                &grazing,
            );
            (found.path, Activity::Grazing)
        } else {
            let path = pathfinding::find_path_along_ray(
                &self.world,
                origin,
                creature.heading,
                radius,
                &profile,
            );
            (path, Activity::Cruising)
        };

        plan_from_path(&path, creature.heading, activity)
    }
}

fn plan_from_path(path: &Path, heading: VoxelCoord, activity: Activity) -> Plan {
    match path.first_step() {
        Some(step) => Plan {
            step: Some(step),
            heading,
            activity,
        },
        None => Plan {
            step: None,
            heading: turned(heading),
            activity,
        },
    }
}

/// Quarter turn in the horizontal plane.
fn turned(heading: VoxelCoord) -> VoxelCoord {
    if heading == VoxelCoord::ZERO {
        return HEADINGS[0];
    }
    VoxelCoord::new(-heading.z, heading.y, heading.x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::material;

    fn spawn(tick: u64, species: Species, position: VoxelCoord) -> SimCommand {
        SimCommand {
            tick,
            action: SimAction::SpawnCreature { species, position },
        }
    }

    fn only(sim: &SimState, species: Species) -> &Creature {
        let mut found = sim.creatures.values().filter(|c| c.species == species);
        let creature = found.next().expect("no creature of that species");
        assert!(found.next().is_none(), "more than one {species:?}");
        creature
    }

    /// Ground level of the default config's meadow.
    const GROUND: i32 = 8;

    #[test]
    fn new_sim_is_empty_meadow() {
        let sim = SimState::new(42);
        assert_eq!(sim.tick, 0);
        assert!(sim.creatures.is_empty());
        assert!(sim.index.is_empty());
        assert_eq!(
            sim.world.get(VoxelCoord::new(0, GROUND - 1, 0)).material(),
            material::GRASS
        );
        assert_eq!(sim.world.surface_height(5, 5), Some(GROUND));
    }

    #[test]
    fn step_advances_tick() {
        let mut sim = SimState::new(42);
        let result = sim.step(&[], 10);
        assert_eq!(sim.tick, 10);
        assert_eq!(result, StepResult::default());
    }

    #[test]
    fn spawn_command_indexes_creature() {
        let mut sim = SimState::new(42);
        let pos = VoxelCoord::new(10, GROUND, 10);
        sim.step(&[spawn(1, Species::Deer, pos)], 1);
        let deer = only(&sim, Species::Deer);
        assert_eq!(sim.creature_count(Species::Deer), 1);
        assert_eq!(sim.creature_count(Species::Wolf), 0);
        assert_eq!(sim.index.len(), 1);
        assert_eq!(sim.index.position(deer.id), Some(pos));
    }

    #[test]
    fn spawn_snaps_to_surface() {
        let mut sim = SimState::new(42);
        sim.step(&[spawn(1, Species::Wolf, VoxelCoord::new(5, 20, 5))], 1);
        let wolf = only(&sim, Species::Wolf);
        // A walker on flat ground never leaves the surface layer.
        assert_eq!(wolf.position.y, GROUND);
    }

    #[test]
    fn spawn_of_unconfigured_species_is_ignored() {
        let mut config = SimConfig::default();
        config.species.remove(&Species::Hawk);
        let mut sim = SimState::with_config(42, config);
        sim.step(&[spawn(1, Species::Hawk, VoxelCoord::new(5, GROUND, 5))], 1);
        assert!(sim.creatures.is_empty());
        assert!(sim.mutations.is_empty());
    }

    #[test]
    fn command_waits_for_its_tick() {
        let mut sim = SimState::new(42);
        let commands = [spawn(5, Species::Deer, VoxelCoord::new(10, GROUND, 10))];
        sim.step(&commands, 3);
        assert!(sim.creatures.is_empty());
        sim.step(&commands, 5);
        assert_eq!(sim.creatures.len(), 1);
        // Already applied; passing it again is a no-op.
        sim.step(&commands, 6);
        assert_eq!(sim.creatures.len(), 1);
    }

    #[test]
    fn despawn_removes_from_index() {
        let mut sim = SimState::new(42);
        sim.step(&[spawn(1, Species::Deer, VoxelCoord::new(10, GROUND, 10))], 1);
        let id = only(&sim, Species::Deer).id;
        let despawn = SimCommand {
            tick: 2,
            action: SimAction::DespawnCreature { creature_id: id },
        };
        sim.step(&[despawn], 2);
        assert_eq!(sim.creature_count(Species::Deer), 0);
        assert!(sim.creatures.is_empty());
        assert!(!sim.index.contains(id));
    }

    #[test]
    fn lone_deer_grazes_in_place() {
        let mut sim = SimState::new(42);
        let pos = VoxelCoord::new(10, GROUND, 10);
        sim.step(&[spawn(1, Species::Deer, pos)], 5);
        let deer = only(&sim, Species::Deer);
        assert_eq!(deer.position, pos);
        assert_eq!(deer.activity, Activity::Grazing);
    }

    #[test]
    fn deer_walks_to_grass() {
        let mut sim = SimState::new(42);
        // Strip the grass around the spawn point down to bare soil.
        let soil = TerrainSample::new(u8::MAX, material::SOIL);
        sim.world.fill(
            crate::geometry::Aabb::new(
                VoxelCoord::new(7, GROUND - 1, 7),
                VoxelCoord::new(13, GROUND - 1, 13),
            ),
            soil,
        );
        let pos = VoxelCoord::new(10, GROUND, 10);
        sim.step(&[spawn(1, Species::Deer, pos)], 1);
        let deer = only(&sim, Species::Deer);
        assert_eq!(deer.activity, Activity::Grazing);
        assert_ne!(deer.position, pos, "deer should set off toward grass");
    }

    #[test]
    fn wolf_chases_and_deer_flees() {
        let mut sim = SimState::new(42);
        sim.step(
            &[
                spawn(1, Species::Wolf, VoxelCoord::new(10, GROUND, 10)),
                spawn(1, Species::Deer, VoxelCoord::new(14, GROUND, 10)),
            ],
            1,
        );
        let wolf = only(&sim, Species::Wolf);
        let deer = only(&sim, Species::Deer);
        assert_eq!(wolf.activity, Activity::Hunting);
        assert_eq!(deer.activity, Activity::Fleeing);
        assert_eq!(wolf.position, VoxelCoord::new(11, GROUND, 10));
        assert_eq!(deer.position, VoxelCoord::new(15, GROUND, 10));
    }

    #[test]
    fn hawk_cruises_along_heading() {
        let mut sim = SimState::new(42);
        let start = VoxelCoord::new(30, GROUND, 30);
        sim.step(&[spawn(1, Species::Hawk, start)], 1);
        let hawk = only(&sim, Species::Hawk);
        assert_eq!(hawk.activity, Activity::Cruising);
        assert_eq!(hawk.position - start, hawk.heading);
    }

    #[test]
    fn blocked_creature_turns() {
        assert_eq!(turned(VoxelCoord::new(1, 0, 0)), VoxelCoord::new(0, 0, 1));
        assert_eq!(turned(VoxelCoord::new(1, 0, 1)), VoxelCoord::new(-1, 0, 1));
        assert_eq!(turned(VoxelCoord::ZERO), HEADINGS[0]);
        let plan = plan_from_path(&Path::default(), VoxelCoord::new(0, 0, -1), Activity::Cruising);
        assert_eq!(plan.step, None);
        assert_eq!(plan.heading, VoxelCoord::new(1, 0, 0));
    }

    fn populated(seed: u64) -> SimState {
        let mut sim = SimState::new(seed);
        let mut commands = Vec::new();
        for i in 0..6 {
            commands.push(spawn(1, Species::Deer, VoxelCoord::new(8 + i * 7, GROUND, 20)));
            commands.push(spawn(1, Species::Hawk, VoxelCoord::new(8 + i * 7, GROUND, 40)));
        }
        commands.push(spawn(1, Species::Wolf, VoxelCoord::new(30, GROUND, 30)));
        commands.push(spawn(1, Species::Wolf, VoxelCoord::new(12, GROUND, 12)));
        sim.step(&commands, 40);
        sim
    }

    #[test]
    fn determinism_two_sims_same_seed() {
        let a = populated(7);
        let b = populated(7);
        assert_eq!(a.creatures, b.creatures);
        assert_eq!(a.rng, b.rng);
    }

    #[test]
    fn index_tracks_store_after_many_ticks() {
        let mut sim = populated(11);
        sim.flush_mutations();
        sim.index.validate().unwrap();
        assert_eq!(sim.index.len(), sim.creatures.len());
        for creature in sim.creatures.values() {
            assert!(sim.index.contains(creature.id));
            assert!(sim.world.in_bounds(creature.position));
        }
    }
}
