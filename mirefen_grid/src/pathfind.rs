// Resumable A* search over the tile grid.
//
// The searcher is a long-lived object meant to be reused across many
// searches: per-node scores live in a flat `Vec` indexed like the grid and
// stamped with a generation counter, so `new_search` invalidates the
// previous search by bumping the generation instead of reallocating or
// zeroing anything. The open set is a `BinaryHeap` (min-heap via reversed
// ordering, the same pattern as the event queue in the sim crate) and is
// cleared, not dropped, between searches.
//
// Searches run through an explicit state machine so callers can slice the
// work: `new_search` puts the searcher in `Searching`, each `step(grid, n)`
// pops up to `n` nodes, and the search ends in `Succeeded`, `Failed`
// (open set exhausted or cancelled), or `OutOfMemory` (expansion budget
// exceeded — treated by callers exactly like `Failed`, never retried).
//
// Goals are a set: the search finalizes on reaching any member, which is
// how movers target "any access point of this designation" in one search.
//
// The heuristic is squared Euclidean distance to the nearest goal. It is
// deliberately not admissible — it overestimates long distances badly and
// drags the search hard toward the goal — which trades guaranteed
// shortest paths under weighted terrain for speed on an interactive grid.
// Step cost defaults to uniform 1.0; `with_step_cost` is the terrain hook.
//
// Ties on f are broken first-in-first-out via a monotonic sequence number,
// keeping results deterministic.

use crate::grid::TileGrid;
use crate::tile::{Direction, TilePos};
use smallvec::SmallVec;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Lifecycle of one search.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SearchState {
    /// No search has been started on this searcher yet.
    NotInitialised,
    /// A search is in progress; call `step` to advance it.
    Searching,
    /// A goal was reached; `final_result` is valid.
    Succeeded,
    /// The open set ran dry or the search was cancelled.
    Failed,
    /// The expansion budget was exceeded. Permanent for this search.
    OutOfMemory,
}

impl SearchState {
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::NotInitialised | Self::Searching)
    }
}

/// Cost of stepping onto a tile. The default charges 1.0 everywhere.
pub type StepCost = fn(&TileGrid, TilePos) -> f32;

fn uniform_cost(_grid: &TileGrid, _pos: TilePos) -> f32 {
    1.0
}

/// Per-node search record, validity gated by the generation stamp.
#[derive(Clone, Copy, Debug)]
struct NodeRec {
    generation: u64,
    g: f32,
    closed: bool,
    parent: Option<(TilePos, Direction)>,
}

impl Default for NodeRec {
    fn default() -> Self {
        Self {
            generation: 0,
            g: f32::INFINITY,
            closed: false,
            parent: None,
        }
    }
}

/// Entry in the open set (min-heap via reversed ordering).
struct OpenEntry {
    f: f32,
    seq: u64,
    pos: TilePos,
}

impl PartialEq for OpenEntry {
    fn eq(&self, other: &Self) -> bool {
        self.f.total_cmp(&other.f) == Ordering::Equal && self.seq == other.seq
    }
}

impl Eq for OpenEntry {}

impl PartialOrd for OpenEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OpenEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed for min-heap: smallest f is "greatest"; FIFO among ties.
        other
            .f
            .total_cmp(&self.f)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Reusable A* searcher. One instance per independent searcher; searches
/// on the same instance are strictly sequential.
#[derive(Debug)]
pub struct Pathfinder {
    nodes: Vec<NodeRec>,
    width: u32,
    height: u32,
    generation: u64,
    open: BinaryHeap<OpenEntry>,
    goals: SmallVec<[TilePos; 4]>,
    state: SearchState,
    start: TilePos,
    found_goal: Option<TilePos>,
    budget: usize,
    expanded: usize,
    next_seq: u64,
    cancel_requested: bool,
    step_cost: StepCost,
}

impl Default for Pathfinder {
    fn default() -> Self {
        Self::new()
    }
}

impl Pathfinder {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            width: 0,
            height: 0,
            generation: 0,
            open: BinaryHeap::new(),
            goals: SmallVec::new(),
            state: SearchState::NotInitialised,
            start: TilePos::new(0, 0),
            found_goal: None,
            budget: 0,
            expanded: 0,
            next_seq: 0,
            cancel_requested: false,
            step_cost: uniform_cost,
        }
    }

    /// Replace the uniform step cost with a terrain-aware one. Applies to
    /// subsequent searches.
    pub fn with_step_cost(mut self, step_cost: StepCost) -> Self {
        self.step_cost = step_cost;
        self
    }

    pub fn state(&self) -> SearchState {
        self.state
    }

    /// Request cancellation; honored at the next `step` call, after which
    /// the search reports `Failed`.
    pub fn cancel(&mut self) {
        self.cancel_requested = true;
    }

    /// Begin a new search from `start` to any member of `goals`, expanding
    /// at most `budget` nodes. Resets the previous search by generation
    /// bump; no allocation is repeated for same-sized grids.
    pub fn new_search(
        &mut self,
        grid: &TileGrid,
        start: TilePos,
        goals: &[TilePos],
        budget: usize,
    ) {
        if grid.width() != self.width || grid.height() != self.height {
            self.width = grid.width();
            self.height = grid.height();
            self.nodes.clear();
            self.nodes
                .resize(self.width as usize * self.height as usize, NodeRec::default());
        }
        self.generation += 1;
        self.open.clear();
        self.goals = goals.iter().copied().collect();
        self.start = start;
        self.found_goal = None;
        self.budget = budget;
        self.expanded = 0;
        self.next_seq = 0;
        self.cancel_requested = false;

        if self.goals.is_empty() || !grid.in_bounds(start) {
            self.state = SearchState::Failed;
            return;
        }
        if self.goals.contains(&start) {
            self.found_goal = Some(start);
            self.state = SearchState::Succeeded;
            return;
        }

        self.state = SearchState::Searching;
        let idx = self.index(start);
        self.nodes[idx] = NodeRec {
            generation: self.generation,
            g: 0.0,
            closed: false,
            parent: None,
        };
        let f = self.heuristic(start);
        self.push_open(f, start);
    }

    /// Advance the search by popping up to `n` nodes from the open set.
    /// Returns the state afterwards; call again while it is `Searching`.
    pub fn step(&mut self, grid: &TileGrid, n: usize) -> SearchState {
        if self.state != SearchState::Searching {
            return self.state;
        }

        for _ in 0..n {
            if self.cancel_requested {
                self.state = SearchState::Failed;
                break;
            }
            let Some(pos) = self.pop_open() else {
                self.state = SearchState::Failed;
                break;
            };
            if self.goals.contains(&pos) {
                self.found_goal = Some(pos);
                self.state = SearchState::Succeeded;
                break;
            }
            if self.expanded >= self.budget {
                self.state = SearchState::OutOfMemory;
                break;
            }
            self.expanded += 1;
            let idx = self.index(pos);
            self.nodes[idx].closed = true;
            let base_g = self.nodes[idx].g;

            for dir in Direction::ALL {
                let neighbor = pos.step(dir);
                if !grid.is_walkable(neighbor) {
                    continue;
                }
                let tentative = base_g + (self.step_cost)(grid, neighbor);
                let nidx = self.index(neighbor);
                let rec = &mut self.nodes[nidx];
                if rec.generation == self.generation && (rec.closed || rec.g <= tentative) {
                    continue;
                }
                *rec = NodeRec {
                    generation: self.generation,
                    g: tentative,
                    closed: false,
                    parent: Some((pos, dir)),
                };
                let f = tentative + self.heuristic(neighbor);
                self.push_open(f, neighbor);
            }
        }
        self.state
    }

    /// Drive the search to a terminal state in slices of 64 pops.
    pub fn run_to_completion(&mut self, grid: &TileGrid) -> SearchState {
        while self.state == SearchState::Searching {
            self.step(grid, 64);
        }
        self.state
    }

    /// The goal the search reached, once `Succeeded`.
    pub fn found_goal(&self) -> Option<TilePos> {
        self.found_goal
    }

    /// The step sequence from start to the reached goal.
    ///
    /// # Panics
    /// Only valid in `Succeeded`; calling in any other state is a caller
    /// bug and panics.
    pub fn final_result(&self) -> Vec<Direction> {
        assert_eq!(
            self.state,
            SearchState::Succeeded,
            "final_result requires a succeeded search"
        );
        let mut directions = Vec::new();
        let mut pos = self.found_goal.expect("succeeded search has a goal");
        while pos != self.start {
            let rec = &self.nodes[self.index(pos)];
            let (prev, dir) = rec.parent.expect("reached node has a parent link");
            directions.push(dir);
            pos = prev;
        }
        directions.reverse();
        directions
    }

    fn index(&self, pos: TilePos) -> usize {
        pos.x as usize + pos.y as usize * self.width as usize
    }

    fn heuristic(&self, pos: TilePos) -> f32 {
        self.goals
            .iter()
            .map(|&g| pos.squared_distance(g))
            .min()
            .unwrap_or(0) as f32
    }

    fn push_open(&mut self, f: f32, pos: TilePos) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.open.push(OpenEntry { f, seq, pos });
    }

    /// Pop the best open entry, skipping stale duplicates of already-closed
    /// nodes (the heap uses lazy deletion).
    fn pop_open(&mut self) -> Option<TilePos> {
        while let Some(entry) = self.open.pop() {
            let rec = &self.nodes[self.index(entry.pos)];
            if rec.generation == self.generation && !rec.closed {
                return Some(entry.pos);
            }
        }
        None
    }
}
