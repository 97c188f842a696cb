// Commands and deferred index mutations.
//
// Two kinds of input change the simulation:
// - `SimCommand`: external input, tagged with the tick it applies at. Current
//   actions are `SpawnCreature` and `DespawnCreature`.
// - `MutationRequest`: a change to the `SpatialIndex` that cannot happen
//   while creatures are reading it. Commands and the parallel update phase
//   push requests into a `MutationQueue`; the next serial phase drains them
//   into the index with `MutationQueue::drain_into()`.
//
// Requests apply in push order. A `Relocate` for a creature that is no longer
// indexed is dropped, so a creature despawned in the same tick it moved
// stays gone.
//
// See also: `sim.rs` for `step()` which applies commands and drains the queue,
// `spatial_index.rs` for the index being mutated.
//
// **Critical constraint: determinism.** Commands are the sole external input
// to the sim, and queue order is the order requests were pushed.

use crate::spatial_index::SpatialIndex;
use crate::types::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// An externally issued command targeting a specific simulation tick.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimCommand {
    pub tick: u64,
    pub action: SimAction,
}

/// The specific action a command performs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SimAction {
    /// Spawn a creature of the given species at the given position (snapped
    /// to the ground surface if the position itself is not standable).
    SpawnCreature {
        species: Species,
        position: VoxelCoord,
    },
    /// Remove a creature. Unknown ids are ignored.
    DespawnCreature { creature_id: CreatureId },
}

/// A deferred change to the spatial index.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MutationRequest {
    Insert {
        id: CreatureId,
        position: VoxelCoord,
    },
    Delete { id: CreatureId },
    /// Re-index a creature that moved out of its locality.
    Relocate {
        id: CreatureId,
        position: VoxelCoord,
    },
}

/// What one drain did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DrainStats {
    pub inserted: usize,
    pub deleted: usize,
    pub relocated: usize,
    /// Deletes of unknown ids and relocates of unindexed creatures.
    pub skipped: usize,
}

/// FIFO of pending index mutations.
#[derive(Clone, Debug, Default)]
pub struct MutationQueue {
    requests: Vec<MutationRequest>,
}

impl MutationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, request: MutationRequest) {
        self.requests.push(request);
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    /// Apply every pending request to `index` in push order, leaving the
    /// queue empty.
    pub fn drain_into(&mut self, index: &mut SpatialIndex) -> DrainStats {
        let mut stats = DrainStats::default();
        for request in self.requests.drain(..) {
            match request {
                MutationRequest::Insert { id, position } => {
                    index.insert(position, id);
                    stats.inserted += 1;
                }
                MutationRequest::Delete { id } => {
                    if index.delete(id) {
                        stats.deleted += 1;
                    } else {
                        stats.skipped += 1;
                    }
                }
                MutationRequest::Relocate { id, position } => {
                    if index.contains(id) {
                        index.insert(position, id);
                        stats.relocated += 1;
                    } else {
                        stats.skipped += 1;
                    }
                }
            }
        }
        if stats != DrainStats::default() {
            debug!(
                inserted = stats.inserted,
                deleted = stats.deleted,
                relocated = stats.relocated,
                skipped = stats.skipped,
                indexed = index.len(),
                "drained index mutations"
            );
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prng::GameRng;

    #[test]
    fn drain_applies_in_order_and_empties_queue() {
        let mut rng = GameRng::new(1);
        let a = CreatureId::new(&mut rng);
        let b = CreatureId::new(&mut rng);
        let mut index = SpatialIndex::new();
        let mut queue = MutationQueue::new();
        queue.push(MutationRequest::Insert {
            id: a,
            position: VoxelCoord::ZERO,
        });
        queue.push(MutationRequest::Insert {
            id: b,
            position: VoxelCoord::new(3, 0, 0),
        });
        queue.push(MutationRequest::Delete { id: a });
        queue.push(MutationRequest::Relocate {
            id: b,
            position: VoxelCoord::new(9, 0, 0),
        });
        assert_eq!(queue.len(), 4);

        let stats = queue.drain_into(&mut index);
        assert!(queue.is_empty());
        assert_eq!(
            stats,
            DrainStats {
                inserted: 2,
                deleted: 1,
                relocated: 1,
                skipped: 0
            }
        );
        assert!(!index.contains(a));
        assert_eq!(index.position(b), Some(VoxelCoord::new(9, 0, 0)));
        index.validate().unwrap();
    }

    #[test]
    fn relocate_after_delete_is_dropped() {
        let mut rng = GameRng::new(2);
        let a = CreatureId::new(&mut rng);
        let mut index = SpatialIndex::new();
        index.insert(VoxelCoord::ZERO, a);
        let mut queue = MutationQueue::new();
        queue.push(MutationRequest::Delete { id: a });
        queue.push(MutationRequest::Relocate {
            id: a,
            position: VoxelCoord::new(1, 0, 0),
        });
        queue.push(MutationRequest::Delete { id: a });
        let stats = queue.drain_into(&mut index);
        assert_eq!(stats.deleted, 1);
        assert_eq!(stats.skipped, 2);
        assert!(index.is_empty());
    }

    #[test]
    fn command_json_roundtrip() {
        let cmd = SimCommand {
            tick: 7,
            action: SimAction::SpawnCreature {
                species: Species::Hawk,
                position: VoxelCoord::new(1, 2, 3),
            },
        };
        let json = serde_json::to_string(&cmd).unwrap();
        let restored: SimCommand = serde_json::from_str(&json).unwrap();
        assert_eq!(cmd, restored);
    }
}
