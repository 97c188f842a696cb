// Dynamic AABB tree over creature positions.
//
// Creatures are points in grid space; the index answers "who is inside this
// box" without scanning every creature. It is a binary tree stored as a flat
// `Vec<Node>`: leaves hold one `CreatureId` and a single-point box, branches
// hold two child slots and the union of their boxes. Slot 0 is a sentinel
// branch whose left child is the root, so "rewrite my parent's pointer to me"
// works the same for the root as for every other node.
//
// ## Mutation
//
// `insert()` descends from the root, growing each branch it passes to cover
// the new point, preferring a child that already contains it, then a child
// whose grown box would stay clear of its sibling, then the child whose grown
// box is smaller (ties go left). The leaf it lands on is split into a branch
// holding the old leaf and the new one.
//
// `delete()` promotes the sibling into the parent's place, refits ancestor
// bounds bottom-up, then backfills the two freed slots from the tail of the
// array (higher slot first) so the array never has holes. Every node moved by
// the backfill has its parent's child pointer, its children's parent
// pointers, and (for leaves) its id-table entry rewritten.
//
// ## Concurrency
//
// Queries take `&self` and mutations take `&mut self`, so the borrow checker
// enforces the tick structure: one serial phase drains queued mutations, then
// any number of threads query. See `command.rs` for the mutation queue.
//
// See also: `geometry.rs` for `Aabb`, `sim.rs` for the tick phases,
// `error.rs` for `IndexCorruption`.
//
// **Critical constraint: determinism.** Tree shape depends only on the
// sequence of inserts and deletes. The id table is an `FxHashMap` for O(1)
// lookup and is never iterated to produce output.

use crate::error::IndexCorruption;
use crate::geometry::Aabb;
use crate::types::{CreatureId, VoxelCoord};
use rustc_hash::FxHashMap;
use smallvec::{SmallVec, smallvec};
use tracing::debug;

/// Slot of the sentinel node.
const SENTINEL: u32 = 0;
/// Null child pointer. Shares the sentinel's value: no real node lives there.
const NIL: u32 = 0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum NodeKind {
    Leaf(CreatureId),
    Branch { left: u32, right: u32 },
}

#[derive(Clone, Copy, Debug)]
struct Node {
    bounds: Aabb,
    parent: u32,
    kind: NodeKind,
}

impl Node {
    const fn sentinel() -> Self {
        Self {
            bounds: Aabb::point(VoxelCoord::ZERO),
            parent: SENTINEL,
            kind: NodeKind::Branch {
                left: NIL,
                right: NIL,
            },
        }
    }
}

/// Point index supporting insert, delete by id, and box queries.
#[derive(Clone, Debug)]
pub struct SpatialIndex {
    nodes: Vec<Node>,
    /// Creature -> leaf slot.
    slots: FxHashMap<CreatureId, u32>,
}

impl Default for SpatialIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl SpatialIndex {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Pre-size for `creatures` entries (a tree of n leaves has 2n - 1 nodes,
    /// plus the sentinel).
    pub fn with_capacity(creatures: usize) -> Self {
        let mut nodes = Vec::with_capacity(creatures.saturating_mul(2).max(1));
        nodes.push(Node::sentinel());
        Self {
            nodes,
            slots: FxHashMap::with_capacity_and_hasher(creatures, Default::default()),
        }
    }

    /// Number of indexed creatures.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn contains(&self, id: CreatureId) -> bool {
        self.slots.contains_key(&id)
    }

    /// The position `id` was indexed at.
    pub fn position(&self, id: CreatureId) -> Option<VoxelCoord> {
        self.slots
            .get(&id)
            .map(|&slot| self.nodes[slot as usize].bounds.min)
    }

    /// Box around every indexed position.
    pub fn bounds(&self) -> Option<Aabb> {
        self.root().map(|r| self.nodes[r as usize].bounds)
    }

    /// Bounds of the branch directly above `id`'s leaf (the leaf's own point
    /// if it is alone). A creature that moves within its locality can skip
    /// re-indexing; one that leaves it should be relocated.
    pub fn locality(&self, id: CreatureId) -> Option<Aabb> {
        let &slot = self.slots.get(&id)?;
        let leaf = &self.nodes[slot as usize];
        Some(if leaf.parent == SENTINEL {
            leaf.bounds
        } else {
            self.nodes[leaf.parent as usize].bounds
        })
    }

    fn root(&self) -> Option<u32> {
        match self.nodes[SENTINEL as usize].kind {
            NodeKind::Branch { left, .. } if left != NIL => Some(left),
            _ => None,
        }
    }

    // -- Insert -------------------------------------------------------------

    /// Index `id` at `position`. An id that is already present is moved.
    pub fn insert(&mut self, position: VoxelCoord, id: CreatureId) {
        if self.contains(id) {
            self.delete(id);
        }

        let Some(mut cur) = self.root() else {
            let leaf = self.push_node(Node {
                bounds: Aabb::point(position),
                parent: SENTINEL,
                kind: NodeKind::Leaf(id),
            });
            self.replace_child(SENTINEL, NIL, leaf);
            self.slots.insert(id, leaf);
            return;
        };

        while let NodeKind::Branch { left, right } = self.nodes[cur as usize].kind {
            let node = &mut self.nodes[cur as usize];
            node.bounds = node.bounds.grown_to(position);
            cur = self.choose_child(left, right, position);
        }

        // Split the leaf: a new branch takes its place, holding the old leaf
        // on the left and the new one on the right.
        let old = self.nodes[cur as usize];
        let branch = self.nodes.len() as u32;
        let leaf = branch + 1;
        self.push_node(Node {
            bounds: old.bounds.grown_to(position),
            parent: old.parent,
            kind: NodeKind::Branch {
                left: cur,
                right: leaf,
            },
        });
        self.push_node(Node {
            bounds: Aabb::point(position),
            parent: branch,
            kind: NodeKind::Leaf(id),
        });
        self.nodes[cur as usize].parent = branch;
        self.replace_child(old.parent, cur, branch);
        self.slots.insert(id, leaf);
    }

    fn choose_child(&self, left: u32, right: u32, p: VoxelCoord) -> u32 {
        let lb = self.nodes[left as usize].bounds;
        let rb = self.nodes[right as usize].bounds;
        match (lb.contains_point(p), rb.contains_point(p)) {
            (true, false) => return left,
            (false, true) => return right,
            _ => {}
        }
        let lg = lb.grown_to(p);
        let rg = rb.grown_to(p);
        match (!lg.intersects(&rb), !rg.intersects(&lb)) {
            (true, false) => left,
            (false, true) => right,
            _ if rg.volume() < lg.volume() => right,
            _ => left,
        }
    }

    fn push_node(&mut self, node: Node) -> u32 {
        if self.nodes.len() == self.nodes.capacity() {
            debug!(
                capacity = self.nodes.capacity(),
                creatures = self.slots.len(),
                "spatial index slot array growing"
            );
        }
        self.nodes.push(node);
        (self.nodes.len() - 1) as u32
    }

    /// Point `parent`'s child link that refers to `old` at `new` instead.
    fn replace_child(&mut self, parent: u32, old: u32, new: u32) {
        match &mut self.nodes[parent as usize].kind {
            NodeKind::Branch { left, .. } if *left == old => *left = new,
            NodeKind::Branch { right, .. } if *right == old => *right = new,
            kind => debug_assert!(false, "slot {parent} ({kind:?}) has no child {old}"),
        }
    }

    // -- Delete -------------------------------------------------------------

    /// Remove `id`. Returns `false` (and does nothing) if it is not indexed.
    pub fn delete(&mut self, id: CreatureId) -> bool {
        let Some(leaf) = self.slots.remove(&id) else {
            return false;
        };
        let parent = self.nodes[leaf as usize].parent;

        if parent == SENTINEL {
            self.replace_child(SENTINEL, leaf, NIL);
            self.release(leaf);
            return true;
        }

        let NodeKind::Branch { left, right } = self.nodes[parent as usize].kind else {
            debug_assert!(false, "leaf {leaf} has a leaf parent {parent}");
            return true;
        };
        let sibling = if left == leaf { right } else { left };
        let grandparent = self.nodes[parent as usize].parent;
        self.replace_child(grandparent, parent, sibling);
        self.nodes[sibling as usize].parent = grandparent;
        self.refit_from(grandparent);

        // Backfill the higher slot first so the lower freed slot is never the
        // tail that gets moved.
        self.release(leaf.max(parent));
        self.release(leaf.min(parent));
        true
    }

    /// Recompute branch bounds from `slot` up to the root, stopping early once
    /// a branch's bounds come out unchanged.
    fn refit_from(&mut self, mut slot: u32) {
        while slot != SENTINEL {
            let NodeKind::Branch { left, right } = self.nodes[slot as usize].kind else {
                break;
            };
            let bounds = self.nodes[left as usize]
                .bounds
                .union(self.nodes[right as usize].bounds);
            let node = &mut self.nodes[slot as usize];
            if node.bounds == bounds {
                break;
            }
            node.bounds = bounds;
            slot = node.parent;
        }
    }

    /// Drop a detached slot by moving the tail node into it.
    fn release(&mut self, slot: u32) {
        let last = (self.nodes.len() - 1) as u32;
        debug_assert!(slot != SENTINEL && slot <= last);
        if slot != last {
            let moved = self.nodes[last as usize];
            self.nodes[slot as usize] = moved;
            self.replace_child(moved.parent, last, slot);
            match moved.kind {
                NodeKind::Branch { left, right } => {
                    self.nodes[left as usize].parent = slot;
                    self.nodes[right as usize].parent = slot;
                }
                NodeKind::Leaf(id) => {
                    self.slots.insert(id, slot);
                }
            }
        }
        self.nodes.pop();
    }

    // -- Query --------------------------------------------------------------

    /// Call `visit(id, position)` for every creature inside `bounds`
    /// (inclusive). Visit order follows the tree, left child first.
    pub fn query<F>(&self, bounds: Aabb, mut visit: F)
    where
        F: FnMut(CreatureId, VoxelCoord),
    {
        let Some(root) = self.root() else {
            return;
        };
        let mut stack: SmallVec<[u32; 32]> = smallvec![root];
        while let Some(slot) = stack.pop() {
            let node = &self.nodes[slot as usize];
            if !node.bounds.intersects(&bounds) {
                continue;
            }
            match node.kind {
                NodeKind::Leaf(id) => visit(id, node.bounds.min),
                NodeKind::Branch { left, right } => {
                    stack.push(right);
                    stack.push(left);
                }
            }
        }
    }

    /// Every creature within `radius` cells of `center` on each axis.
    pub fn query_cube<F>(&self, center: VoxelCoord, radius: i32, visit: F)
    where
        F: FnMut(CreatureId, VoxelCoord),
    {
        self.query(Aabb::cube(center, radius), visit);
    }

    pub fn query_ids(&self, bounds: Aabb) -> Vec<CreatureId> {
        let mut ids = Vec::new();
        self.query(bounds, |id, _| ids.push(id));
        ids
    }

    /// Every `(id, position)` pair, in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (CreatureId, VoxelCoord)> + '_ {
        self.nodes.iter().filter_map(|n| match n.kind {
            NodeKind::Leaf(id) => Some((id, n.bounds.min)),
            NodeKind::Branch { .. } => None,
        })
    }

    // -- Validation ---------------------------------------------------------

    /// Check every structural invariant. Meant for tests and debug tooling;
    /// cost is linear in the number of nodes.
    pub fn validate(&self) -> Result<(), IndexCorruption> {
        let len = self.nodes.len();
        let sentinel = &self.nodes[SENTINEL as usize];
        let NodeKind::Branch { right: NIL, .. } = sentinel.kind else {
            return Err(IndexCorruption::BadSentinel);
        };

        let check_slot = |slot: u32, target: u32| {
            if target as usize >= len || target == SENTINEL {
                Err(IndexCorruption::DanglingSlot { slot, target, len })
            } else {
                Ok(())
            }
        };

        let mut reachable = 1;
        let mut leaves = 0;
        if let Some(root) = self.root() {
            check_slot(SENTINEL, root)?;
            let mut stack: Vec<(u32, u32)> = vec![(root, SENTINEL)];
            while let Some((slot, expected_parent)) = stack.pop() {
                reachable += 1;
                if reachable > len {
                    return Err(IndexCorruption::Unreachable { reachable, len });
                }
                let node = &self.nodes[slot as usize];
                if node.parent != expected_parent {
                    return Err(IndexCorruption::ParentMismatch {
                        slot,
                        expected: expected_parent,
                        found: node.parent,
                    });
                }
                match node.kind {
                    NodeKind::Leaf(id) => {
                        leaves += 1;
                        if node.bounds.min != node.bounds.max {
                            return Err(IndexCorruption::ThickLeaf { slot });
                        }
                        let recorded = self.slots.get(&id).copied();
                        if recorded != Some(slot) {
                            return Err(IndexCorruption::IdTableMismatch {
                                id,
                                recorded,
                                actual: slot,
                            });
                        }
                    }
                    NodeKind::Branch { left, right } => {
                        check_slot(slot, left)?;
                        check_slot(slot, right)?;
                        let union = self.nodes[left as usize]
                            .bounds
                            .union(self.nodes[right as usize].bounds);
                        if node.bounds != union {
                            return Err(IndexCorruption::BoundsMismatch { slot });
                        }
                        stack.push((left, slot));
                        stack.push((right, slot));
                    }
                }
            }
        }

        if reachable != len {
            return Err(IndexCorruption::Unreachable { reachable, len });
        }
        if leaves != self.slots.len() {
            return Err(IndexCorruption::LeafCountMismatch {
                leaves,
                ids: self.slots.len(),
            });
        }
        Ok(())
    }
}
