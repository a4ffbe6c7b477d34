// The walkability map — single entry point for all grid mutation.
//
// `TileMap` bundles the tile grid with the two consistency structures that
// must track it: the boundary-edge tracker and the area manager. All
// walkability changes go through `set_walkable`, which runs the full
// cascade synchronously before returning, in this order:
//
//   1. flip the flag and update the edge tracker,
//   2. notify every access listener registered on the tile,
//   3. update the area partition.
//
// There is no partial-failure state: each step is infallible by
// construction, and a broken invariant afterwards is a programming bug,
// not a runtime condition. No observer ever sees a half-applied change —
// by the time `set_walkable` returns, edges, listeners, and areas all
// agree with the new flag.
//
// Listener notification is pushed through the `AccessObserver` trait so
// the owning layer (designations, in the sim crate) can react inside the
// cascade rather than polling. The grid stores only opaque handles; the
// observer maps them back to its own subscribers.

use crate::area::{AreaId, AreaManager};
use crate::edge::EdgeTracker;
use crate::grid::{AccessHandle, TileGrid};
use crate::tile::TilePos;
use smallvec::SmallVec;

/// Receiver for tile-accessibility push notifications. Implemented by the
/// layer that registered the handles (one call per registered handle, in
/// registration order, within the `set_walkable` that changed the tile).
pub trait AccessObserver {
    fn access_changed(&mut self, handle: AccessHandle, pos: TilePos, can_access: bool);
}

/// Observer that ignores every notification. For bootstrap and tests.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopObserver;

impl AccessObserver for NoopObserver {
    fn access_changed(&mut self, _handle: AccessHandle, _pos: TilePos, _can_access: bool) {}
}

/// The grid plus its consistency structures. See the module header for the
/// mutation contract.
#[derive(Clone, Debug, Default)]
pub struct TileMap {
    pub grid: TileGrid,
    pub edges: EdgeTracker,
    pub areas: AreaManager,
}

impl TileMap {
    /// An all-unwalkable map. Callers set initial terrain through raw flag
    /// writes (`load_row`) and then `bootstrap` the derived structures.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            grid: TileGrid::new(width, height),
            edges: EdgeTracker::new(),
            areas: AreaManager::new(),
        }
    }

    /// Set initial walkability flags for one row without cascading.
    /// Only meaningful before `bootstrap`.
    pub fn load_row(&mut self, y: i32, walkable: &[bool]) {
        for (x, &flag) in walkable.iter().enumerate() {
            self.grid.set_walkable_flag(TilePos::new(x as i32, y), flag);
        }
    }

    /// Set one tile's initial walkability without cascading. Only
    /// meaningful before `bootstrap`; used when replaying entity blockers
    /// on top of loaded terrain.
    pub fn load_tile(&mut self, pos: TilePos, walkable: bool) {
        self.grid.set_walkable_flag(pos, walkable);
    }

    /// Derive edges and areas from the current flags. Called once after
    /// terrain loading, and again when rebuilding after deserialization.
    pub fn bootstrap(&mut self) {
        self.edges.rebuild(&self.grid);
        self.areas.build_initial_groups(&mut self.grid);
    }

    pub fn is_walkable(&self, pos: TilePos) -> bool {
        self.grid.is_walkable(pos)
    }

    pub fn area_of(&self, pos: TilePos) -> AreaId {
        self.grid.area_of(pos)
    }

    /// Change one tile's walkability, running the full cascade before
    /// returning. Out-of-bounds positions and writes of the current value
    /// are no-ops, which makes repeated calls idempotent.
    pub fn set_walkable(
        &mut self,
        pos: TilePos,
        walkable: bool,
        observer: &mut dyn AccessObserver,
    ) {
        if !self.grid.in_bounds(pos) || self.grid.is_walkable(pos) == walkable {
            return;
        }

        self.grid.set_walkable_flag(pos, walkable);
        if walkable {
            self.edges.tile_became_walkable(&self.grid, pos);
        } else {
            self.edges.tile_became_unwalkable(&self.grid, pos);
        }

        let handles: SmallVec<[AccessHandle; 2]> =
            self.grid.listeners(pos).iter().copied().collect();
        for handle in handles {
            observer.access_changed(handle, pos, walkable);
        }

        if walkable {
            self.areas.tile_became_walkable(&mut self.grid, pos);
        } else {
            self.areas.tile_became_unwalkable(&mut self.grid, pos);
        }

        debug_assert!(self.edges.verify_against(&self.grid));
    }
}
