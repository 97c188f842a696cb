// Bounded-window A* over the voxel grid.
//
// Every search runs inside a cube of side `2R + 1` centered on the origin
// (local coordinate `(R, R, R)`), with 26-connected moves costing 10 / 14 / 17
// for face / edge / corner steps. The heuristic is the matching octile
// estimate (`geometry::octile_distance`), which is admissible and consistent
// for that cost model.
//
// All per-search state lives in a `SearchArena` sized exactly to the window:
// a closed bitset, best-known cost and predecessor direction per cell, and an
// embedded binary min-heap that keeps a cell -> heap-slot back-pointer so an
// improved cost is a decrease-key instead of a duplicate push. The arena is a
// plain local value, so it is dropped on every return path and concurrent
// searches from different creatures share nothing.
//
// One loop serves four entry points that differ only in their stop rule:
// - `find_path`: stop on the exact target cell.
// - `find_match_along_ray`: stop on the first cell that satisfies a second,
//   destination profile (placement semantics).
// - `find_path_along_ray`: travel a nominal `R * 10` cost along a direction.
// - `find_path_or_approach_target`: exact search if the destination passes the
//   path profile, otherwise the ray approach (proving unreachability would
//   cost a full window sweep).
//
// Cells other than the start are checked against the path profile when they
// are popped; failing cells are closed but never expanded, so no returned
// route passes through one. When the stop rule never fires, the route leads to
// the best-progress cell (lowest heuristic). Failing to arrive is never an
// error: the result is a possibly empty `Path`.
//
// See also: `profile.rs` for `verify()`, `geometry.rs` for the `Direction`
// byte and step costs, `sim.rs` for the per-creature callers.
//
// **Critical constraint: determinism.** Heap ties break on
// `(f, h, cell index)`, and neighbors expand in `Direction::NEIGHBORS` order,
// so identical terrain gives identical routes.

use crate::geometry::{Direction, FACE_COST, octile_distance};
use crate::profile::{Profile, verify};
use crate::types::VoxelCoord;
use crate::world::TerrainOracle;
use serde::{Deserialize, Serialize};
use tracing::trace;

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// A route as a sequence of single-cell steps from the origin.
///
/// An empty path means the origin is already the destination or no progress
/// was possible.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Path {
    steps: Vec<Direction>,
}

impl Path {
    pub fn new(steps: Vec<Direction>) -> Self {
        Self { steps }
    }

    pub fn steps(&self) -> &[Direction] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn first_step(&self) -> Option<Direction> {
        self.steps.first().copied()
    }

    /// Sum of step costs.
    pub fn cost(&self) -> u32 {
        self.steps.iter().map(|d| d.cost()).sum()
    }

    /// Offset from the origin to the final cell.
    pub fn end_offset(&self) -> VoxelCoord {
        self.steps
            .iter()
            .fold(VoxelCoord::ZERO, |acc, d| acc + d.offset())
    }

    /// The cells entered by each step, starting from `origin` (not included).
    pub fn cells(&self, origin: VoxelCoord) -> impl Iterator<Item = VoxelCoord> + '_ {
        self.steps.iter().scan(origin, |pos, d| {
            *pos = *pos + d.offset();
            Some(*pos)
        })
    }

    /// Direction bytes, one per step.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.steps.iter().map(|d| d.as_byte()).collect()
    }
}

/// Result of `find_match_along_ray`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RayMatch {
    pub path: Path,
    /// True when the route ends on a cell satisfying the destination profile.
    pub reached_end: bool,
}

// ---------------------------------------------------------------------------
// Search window
// ---------------------------------------------------------------------------

/// The cube of local cells `[0, 2R]^3` a search may touch.
#[derive(Clone, Copy, Debug)]
struct Window {
    radius: i32,
    side: i32,
}

impl Window {
    fn new(radius: i32) -> Self {
        Self {
            radius,
            side: 2 * radius + 1,
        }
    }

    fn cell_count(&self) -> usize {
        let s = self.side as usize;
        s * s * s
    }

    fn center(&self) -> VoxelCoord {
        VoxelCoord::splat(self.radius)
    }

    fn contains(&self, local: VoxelCoord) -> bool {
        let range = 0..self.side;
        range.contains(&local.x) && range.contains(&local.y) && range.contains(&local.z)
    }

    /// Flat index: x fastest, then z, then y.
    fn index(&self, local: VoxelCoord) -> u32 {
        (local.x + local.z * self.side + local.y * self.side * self.side) as u32
    }

    fn local(&self, index: u32) -> VoxelCoord {
        let i = index as i32;
        let layer = self.side * self.side;
        VoxelCoord::new(i % self.side, i / layer, (i % layer) / self.side)
    }
}

// ---------------------------------------------------------------------------
// Open set: binary min-heap with decrease-key
// ---------------------------------------------------------------------------

const NO_SLOT: u32 = u32::MAX;
const UNREACHED: u32 = u32::MAX;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct HeapEntry {
    /// Estimated total cost `g + h`.
    f: u32,
    h: u32,
    cell: u32,
}

impl HeapEntry {
    fn key(&self) -> (u32, u32, u32) {
        (self.f, self.h, self.cell)
    }
}

struct OpenHeap {
    entries: Vec<HeapEntry>,
    /// Inverse map: cell index -> position in `entries`, or `NO_SLOT`.
    slot_of: Vec<u32>,
}

impl OpenHeap {
    fn with_cells(cells: usize) -> Self {
        Self {
            entries: Vec::with_capacity(cells),
            slot_of: vec![NO_SLOT; cells],
        }
    }

    /// Insert `cell`, or lower its key if it is already queued with a worse
    /// one. A worse key for a queued cell is ignored.
    fn push_or_decrease(&mut self, cell: u32, f: u32, h: u32) {
        let entry = HeapEntry { f, h, cell };
        match self.slot_of[cell as usize] {
            NO_SLOT => {
                let slot = self.entries.len();
                self.entries.push(entry);
                self.slot_of[cell as usize] = slot as u32;
                self.sift_up(slot);
            }
            slot => {
                let slot = slot as usize;
                if entry.key() < self.entries[slot].key() {
                    self.entries[slot] = entry;
                    self.sift_up(slot);
                }
            }
        }
    }

    fn pop(&mut self) -> Option<HeapEntry> {
        let last = self.entries.pop()?;
        let top = if self.entries.is_empty() {
            last
        } else {
            let top = std::mem::replace(&mut self.entries[0], last);
            self.slot_of[last.cell as usize] = 0;
            self.sift_down(0);
            top
        };
        self.slot_of[top.cell as usize] = NO_SLOT;
        Some(top)
    }

    fn swap(&mut self, a: usize, b: usize) {
        self.entries.swap(a, b);
        self.slot_of[self.entries[a].cell as usize] = a as u32;
        self.slot_of[self.entries[b].cell as usize] = b as u32;
    }

    fn sift_up(&mut self, mut slot: usize) {
        while slot > 0 {
            let parent = (slot - 1) / 2;
            if self.entries[slot].key() >= self.entries[parent].key() {
                break;
            }
            self.swap(slot, parent);
            slot = parent;
        }
    }

    fn sift_down(&mut self, mut slot: usize) {
        let len = self.entries.len();
        loop {
            let left = 2 * slot + 1;
            let right = left + 1;
            let mut smallest = slot;
            if left < len && self.entries[left].key() < self.entries[smallest].key() {
                smallest = left;
            }
            if right < len && self.entries[right].key() < self.entries[smallest].key() {
                smallest = right;
            }
            if smallest == slot {
                break;
            }
            self.swap(slot, smallest);
            slot = smallest;
        }
    }
}

// ---------------------------------------------------------------------------
// Arena
// ---------------------------------------------------------------------------

/// Scratch state for one search, sized to the window.
struct SearchArena {
    window: Window,
    /// One bit per cell: finalized (popped) or not.
    closed: Vec<u64>,
    /// Best known cost from the start, `UNREACHED` until discovered.
    g: Vec<u32>,
    /// Step taken to reach each cell; `STAY` at the start.
    came_from: Vec<Direction>,
    open: OpenHeap,
}

impl SearchArena {
    fn new(window: Window) -> Self {
        let cells = window.cell_count();
        Self {
            window,
            closed: vec![0; cells.div_ceil(64)],
            g: vec![UNREACHED; cells],
            came_from: vec![Direction::STAY; cells],
            open: OpenHeap::with_cells(cells),
        }
    }

    fn is_closed(&self, cell: u32) -> bool {
        self.closed[cell as usize / 64] & (1 << (cell % 64)) != 0
    }

    fn close(&mut self, cell: u32) {
        self.closed[cell as usize / 64] |= 1 << (cell % 64);
    }

    /// Walk predecessors from `dest` back to the start twice: once to count,
    /// once to fill the exactly-sized buffer back to front.
    fn retrace(&self, dest: u32) -> Path {
        let w = self.window;
        let mut len = 0;
        let mut cur = w.local(dest);
        loop {
            let dir = self.came_from[w.index(cur) as usize];
            if dir == Direction::STAY {
                break;
            }
            len += 1;
            cur = cur - dir.offset();
        }

        let mut steps = vec![Direction::STAY; len];
        let mut cur = w.local(dest);
        for slot in steps.iter_mut().rev() {
            let dir = self.came_from[w.index(cur) as usize];
            *slot = dir;
            cur = cur - dir.offset();
        }
        Path::new(steps)
    }
}

// ---------------------------------------------------------------------------
// Search loop
// ---------------------------------------------------------------------------

/// When a popped, profile-valid cell ends the search.
#[derive(Clone, Copy)]
enum StopRule<'a> {
    /// The cell is the goal.
    Goal,
    /// The cell satisfies this destination profile.
    Match(&'a Profile),
    /// No face step fits in the remaining budget. Neighbors over budget are
    /// never queued.
    Budget(u32),
}

#[derive(Debug, Default)]
struct SearchStats {
    popped: u32,
    rejected: u32,
    expanded: u32,
}

/// Shared A* loop. Returns the route and whether the stop rule fired.
fn search<O: TerrainOracle + ?Sized>(
    oracle: &O,
    origin: VoxelCoord,
    goal_offset: VoxelCoord,
    radius: i32,
    profile: &Profile,
    rule: StopRule<'_>,
) -> (Path, bool) {
    debug_assert!(radius > 0, "search radius must be positive, got {radius}");
    debug_assert!(
        goal_offset.chebyshev_length() <= radius.unsigned_abs(),
        "goal offset {goal_offset} lies outside a window of radius {radius}"
    );

    // A window with no room to move yields no route rather than a wider one.
    if radius <= 0 {
        return (Path::default(), false);
    }

    let window = Window::new(radius);
    let mut arena = SearchArena::new(window);
    let center = window.center();
    let goal = center + goal_offset;
    let goal_cell = window.contains(goal).then(|| window.index(goal));
    let start = window.index(center);
    let budget = match rule {
        StopRule::Budget(b) => b,
        _ => u32::MAX,
    };

    let h0 = octile_distance(center, goal);
    arena.g[start as usize] = 0;
    arena.open.push_or_decrease(start, h0, h0);

    let mut best = (start, h0);
    let mut stopped = false;
    let mut stats = SearchStats::default();

    while let Some(entry) = arena.open.pop() {
        if arena.is_closed(entry.cell) {
            continue;
        }
        arena.close(entry.cell);
        stats.popped += 1;

        let local = window.local(entry.cell);
        let cell = origin + (local - center);
        if entry.cell != start && !verify(cell, profile, oracle, true) {
            stats.rejected += 1;
            continue;
        }

        if entry.h < best.1 {
            best = (entry.cell, entry.h);
        }

        let g = arena.g[entry.cell as usize];
        let done = match rule {
            StopRule::Goal => goal_cell == Some(entry.cell),
            StopRule::Match(dest) => verify(cell, dest, oracle, false),
            StopRule::Budget(limit) => g + FACE_COST > limit,
        };
        if done {
            best = (entry.cell, entry.h);
            stopped = true;
            break;
        }

        stats.expanded += 1;
        for dir in Direction::NEIGHBORS {
            let next = local + dir.offset();
            if !window.contains(next) {
                continue;
            }
            let ni = window.index(next);
            if arena.is_closed(ni) {
                continue;
            }
            let tentative = g + dir.cost();
            if tentative > budget || tentative >= arena.g[ni as usize] {
                continue;
            }
            arena.g[ni as usize] = tentative;
            arena.came_from[ni as usize] = dir;
            let h = octile_distance(next, goal);
            arena.open.push_or_decrease(ni, tentative + h, h);
        }
    }

    let path = arena.retrace(best.0);
    trace!(
        %origin,
        %goal_offset,
        radius,
        popped = stats.popped,
        rejected = stats.rejected,
        expanded = stats.expanded,
        stopped,
        steps = path.len(),
        "bounded search finished"
    );
    (path, stopped)
}

/// Point `reach` cells out along `ray`, scaled so its largest component is
/// `reach`. A zero ray stays at the origin.
fn ray_goal(ray: VoxelCoord, reach: i32) -> VoxelCoord {
    let len = ray.chebyshev_length() as i64;
    if len == 0 {
        return VoxelCoord::ZERO;
    }
    let scale = |c: i32| (c as i64 * reach as i64 / len) as i32;
    VoxelCoord::new(scale(ray.x), scale(ray.y), scale(ray.z))
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Route from `origin` to `origin + target_offset`.
///
/// `target_offset` must lie within `radius` on every axis, and `radius` must
/// be positive. Debug builds assert both; release builds return an empty
/// route for a non-positive radius. If the target cannot be reached, the
/// route leads to the reachable cell closest to it.
pub fn find_path<O: TerrainOracle + ?Sized>(
    oracle: &O,
    origin: VoxelCoord,
    target_offset: VoxelCoord,
    radius: i32,
    profile: &Profile,
) -> Path {
    search(oracle, origin, target_offset, radius, profile, StopRule::Goal).0
}

/// Walk toward the point `radius` cells along `ray` and stop at the first
/// cell that satisfies `destination_profile` (checked with placement
/// semantics). Cells along the way must satisfy `path_profile`.
pub fn find_match_along_ray<O: TerrainOracle + ?Sized>(
    oracle: &O,
    origin: VoxelCoord,
    ray: VoxelCoord,
    radius: i32,
    path_profile: &Profile,
    destination_profile: &Profile,
) -> RayMatch {
    let (path, reached_end) = search(
        oracle,
        origin,
        ray_goal(ray, radius),
        radius,
        path_profile,
        StopRule::Match(destination_profile),
    );
    RayMatch { path, reached_end }
}

/// Travel a nominal distance of `radius` cells (cost `radius * 10`) in the
/// direction of `ray`. The route never costs more than that.
pub fn find_path_along_ray<O: TerrainOracle + ?Sized>(
    oracle: &O,
    origin: VoxelCoord,
    ray: VoxelCoord,
    radius: i32,
    profile: &Profile,
) -> Path {
    approach(oracle, origin, ray, radius, radius, profile)
}

/// Exact search when the destination itself passes `profile`; otherwise
/// (including targets beyond the window) approach along the direction of the
/// target for at most `min(distance, radius)` cells of cost.
pub fn find_path_or_approach_target<O: TerrainOracle + ?Sized>(
    oracle: &O,
    origin: VoxelCoord,
    target_offset: VoxelCoord,
    radius: i32,
    profile: &Profile,
) -> Path {
    let distance = target_offset.chebyshev_length().min(i32::MAX as u32) as i32;
    if distance <= radius && verify(origin + target_offset, profile, oracle, true) {
        return find_path(oracle, origin, target_offset, radius, profile);
    }
    approach(oracle, origin, target_offset, radius, distance.min(radius), profile)
}

fn approach<O: TerrainOracle + ?Sized>(
    oracle: &O,
    origin: VoxelCoord,
    ray: VoxelCoord,
    radius: i32,
    reach: i32,
    profile: &Profile,
) -> Path {
    let budget = reach.max(0) as u32 * FACE_COST;
    search(
        oracle,
        origin,
        ray_goal(ray, reach),
        radius,
        profile,
        StopRule::Budget(budget),
    )
    .0
}
