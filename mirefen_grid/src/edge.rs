// Incremental tracker for walkable/blocked boundary edges.
//
// Every adjacency between a walkable tile and an unwalkable one carries
// exactly one directed edge between the two shared tile corners. Edges are
// oriented so that, walking from `a` to `b`, the walkable tile is on the
// left and the blocked tile on the right (with y growing southward this
// traces each walkable region clockwise on screen). The world rim is not a
// boundary: a tile at the edge of the grid has no neighbor on that side and
// contributes no edge there.
//
// Maintenance is strictly local: flipping one tile touches at most its four
// side edges, each an O(1) map operation — which is why this stays
// incremental while area maintenance (`area.rs`) re-derives connectivity by
// flood fill instead.
//
// Storage is two overlapping maps keyed by edge-start corner. A corner can
// be the start of up to two boundary edges at once (the checkerboard
// corner), and during a single tile's four-sided update the same start key
// can transiently host a dying edge and a newborn one; the overflow map
// absorbs both cases. A corner refcount table tracks which corners are in
// use.
//
// The area manager does not consume this structure yet — it re-derives
// connectivity the blunt way — so the tracker's only current consumers are
// inspection and tests. Its consistency invariant is maintained regardless:
// `verify_against` checks the full edge set against a grid.

use crate::grid::TileGrid;
use crate::tile::{Direction, TilePos};
use rustc_hash::FxHashMap;

/// A corner between tiles. Corner `(x, y)` is the north-west corner of tile
/// `(x, y)`; corners range over `0..=width` × `0..=height`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CornerPos {
    pub x: i32,
    pub y: i32,
}

impl CornerPos {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// A directed boundary segment between two adjacent corners.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoundaryEdge {
    pub a: CornerPos,
    pub b: CornerPos,
    /// The walkable tile on the left of the a→b direction.
    pub walkable_side: TilePos,
    /// The blocked tile on the right.
    pub blocked_side: TilePos,
}

/// The endpoints and sides of the boundary edge along one side of a
/// walkable tile. Orientation puts the walkable tile on the left.
fn edge_for(walkable: TilePos, side: Direction) -> BoundaryEdge {
    let TilePos { x, y } = walkable;
    let (a, b) = match side {
        Direction::North => (CornerPos::new(x + 1, y), CornerPos::new(x, y)),
        Direction::South => (CornerPos::new(x, y + 1), CornerPos::new(x + 1, y + 1)),
        Direction::West => (CornerPos::new(x, y), CornerPos::new(x, y + 1)),
        Direction::East => (CornerPos::new(x + 1, y + 1), CornerPos::new(x + 1, y)),
    };
    BoundaryEdge {
        a,
        b,
        walkable_side: walkable,
        blocked_side: walkable.step(side),
    }
}

/// Maintains the set of boundary edges as tiles flip walkability.
#[derive(Clone, Debug, Default)]
pub struct EdgeTracker {
    primary: FxHashMap<CornerPos, BoundaryEdge>,
    overflow: FxHashMap<CornerPos, BoundaryEdge>,
    /// Refcount of live edges touching each corner.
    corners: FxHashMap<CornerPos, u32>,
}

impl EdgeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Discard all edges and re-derive the full boundary set from a grid.
    /// Used at bootstrap and after deserialization.
    pub fn rebuild(&mut self, grid: &TileGrid) {
        self.primary.clear();
        self.overflow.clear();
        self.corners.clear();
        for pos in grid.positions() {
            if !grid.is_walkable(pos) {
                continue;
            }
            for side in Direction::ALL {
                let neighbor = pos.step(side);
                if grid.in_bounds(neighbor) && !grid.is_walkable(neighbor) {
                    self.insert(edge_for(pos, side));
                }
            }
        }
    }

    /// React to `pos` having just become walkable (the grid flag is already
    /// flipped). New boundaries appear against unwalkable neighbors; the old
    /// boundaries against walkable neighbors — where `pos` used to be the
    /// blocked side — disappear.
    pub fn tile_became_walkable(&mut self, grid: &TileGrid, pos: TilePos) {
        for side in Direction::ALL {
            let neighbor = pos.step(side);
            if !grid.in_bounds(neighbor) {
                continue;
            }
            if grid.is_walkable(neighbor) {
                self.remove(&edge_for(neighbor, side.opposite()));
            } else {
                self.insert(edge_for(pos, side));
            }
        }
    }

    /// Mirror of `tile_became_walkable`: `pos` has just become unwalkable.
    pub fn tile_became_unwalkable(&mut self, grid: &TileGrid, pos: TilePos) {
        for side in Direction::ALL {
            let neighbor = pos.step(side);
            if !grid.in_bounds(neighbor) {
                continue;
            }
            if grid.is_walkable(neighbor) {
                self.insert(edge_for(neighbor, side.opposite()));
            } else {
                self.remove(&edge_for(pos, side));
            }
        }
    }

    fn insert(&mut self, edge: BoundaryEdge) {
        *self.corners.entry(edge.a).or_insert(0) += 1;
        *self.corners.entry(edge.b).or_insert(0) += 1;
        match self.primary.entry(edge.a) {
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(edge);
            }
            std::collections::hash_map::Entry::Occupied(_) => {
                let displaced = self.overflow.insert(edge.a, edge);
                debug_assert!(
                    displaced.is_none(),
                    "three boundary edges starting at corner ({}, {})",
                    edge.a.x,
                    edge.a.y
                );
            }
        }
    }

    fn remove(&mut self, edge: &BoundaryEdge) {
        let removed = if self.primary.get(&edge.a).is_some_and(|e| e.b == edge.b) {
            let out = self.primary.remove(&edge.a);
            // Promote the overflow edge with the same start, if any, so the
            // primary map stays the first place to look.
            if let Some(promoted) = self.overflow.remove(&edge.a) {
                self.primary.insert(edge.a, promoted);
            }
            out
        } else if self.overflow.get(&edge.a).is_some_and(|e| e.b == edge.b) {
            self.overflow.remove(&edge.a)
        } else {
            None
        };
        debug_assert!(
            removed.is_some(),
            "removing a boundary edge that was never tracked"
        );
        if removed.is_some() {
            self.release_corner(edge.a);
            self.release_corner(edge.b);
        }
    }

    fn release_corner(&mut self, corner: CornerPos) {
        if let Some(count) = self.corners.get_mut(&corner) {
            *count -= 1;
            if *count == 0 {
                self.corners.remove(&corner);
            }
        }
    }

    /// Whether a boundary edge exists with the given walkable/blocked sides.
    pub fn has_boundary(&self, walkable: TilePos, blocked: TilePos) -> bool {
        self.edges()
            .any(|e| e.walkable_side == walkable && e.blocked_side == blocked)
    }

    pub fn edge_count(&self) -> usize {
        self.primary.len() + self.overflow.len()
    }

    pub fn corner_count(&self) -> usize {
        self.corners.len()
    }

    /// Iterate all live edges (unspecified order — callers that care sort).
    pub fn edges(&self) -> impl Iterator<Item = &BoundaryEdge> {
        self.primary.values().chain(self.overflow.values())
    }

    /// Check the full consistency invariant against a grid: every
    /// walkable/unwalkable adjacency has exactly one correctly-oriented
    /// edge, and no other edges exist.
    pub fn verify_against(&self, grid: &TileGrid) -> bool {
        let mut expected = 0usize;
        for pos in grid.positions() {
            if !grid.is_walkable(pos) {
                continue;
            }
            for side in Direction::ALL {
                let neighbor = pos.step(side);
                if !grid.in_bounds(neighbor) || grid.is_walkable(neighbor) {
                    continue;
                }
                expected += 1;
                let want = edge_for(pos, side);
                let found = self
                    .edges()
                    .any(|e| e.a == want.a && e.b == want.b && e.walkable_side == pos);
                if !found {
                    return false;
                }
            }
        }
        expected == self.edge_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Grid with the given walkable positions, flags set raw (no cascade).
    fn grid_with_walkable(width: u32, height: u32, walkable: &[(i32, i32)]) -> TileGrid {
        let mut grid = TileGrid::new(width, height);
        for &(x, y) in walkable {
            grid.set_walkable_flag(TilePos::new(x, y), true);
        }
        grid
    }

    #[test]
    fn rebuild_single_walkable_tile_in_center() {
        // Lone walkable tile surrounded by blocked neighbors: 4 edges.
        let grid = grid_with_walkable(3, 3, &[(1, 1)]);
        let mut edges = EdgeTracker::new();
        edges.rebuild(&grid);
        assert_eq!(edges.edge_count(), 4);
        assert_eq!(edges.corner_count(), 4);
        assert!(edges.verify_against(&grid));
    }

    #[test]
    fn rim_contributes_no_edges() {
        // Fully walkable grid: no boundaries at all, including the rim.
        let grid = grid_with_walkable(3, 3, &[
            (0, 0), (1, 0), (2, 0),
            (0, 1), (1, 1), (2, 1),
            (0, 2), (1, 2), (2, 2),
        ]);
        let mut edges = EdgeTracker::new();
        edges.rebuild(&grid);
        assert_eq!(edges.edge_count(), 0);
        assert!(edges.verify_against(&grid));
    }

    #[test]
    fn blocked_center_has_four_inward_edges() {
        let mut grid = grid_with_walkable(3, 3, &[
            (0, 0), (1, 0), (2, 0),
            (0, 1), (2, 1),
            (0, 2), (1, 2), (2, 2),
        ]);
        let mut edges = EdgeTracker::new();
        edges.rebuild(&grid);
        assert_eq!(edges.edge_count(), 4);
        let center = TilePos::new(1, 1);
        for neighbor in grid.neighbors(center) {
            assert!(edges.has_boundary(neighbor, center));
        }

        // Opening the center erases all four.
        grid.set_walkable_flag(center, true);
        edges.tile_became_walkable(&grid, center);
        assert_eq!(edges.edge_count(), 0);
        assert!(edges.verify_against(&grid));
    }

    #[test]
    fn flip_and_unflip_restores_edge_set() {
        let mut grid = grid_with_walkable(4, 4, &[
            (0, 0), (1, 0), (2, 0), (3, 0),
            (0, 1), (1, 1), (2, 1), (3, 1),
            (0, 2), (1, 2), (2, 2), (3, 2),
            (0, 3), (1, 3), (2, 3), (3, 3),
        ]);
        let mut edges = EdgeTracker::new();
        edges.rebuild(&grid);
        assert_eq!(edges.edge_count(), 0);

        let p = TilePos::new(2, 1);
        grid.set_walkable_flag(p, false);
        edges.tile_became_unwalkable(&grid, p);
        assert_eq!(edges.edge_count(), 4);
        assert!(edges.verify_against(&grid));

        grid.set_walkable_flag(p, true);
        edges.tile_became_walkable(&grid, p);
        assert_eq!(edges.edge_count(), 0);
        assert!(edges.verify_against(&grid));
    }

    #[test]
    fn checkerboard_corner_uses_overflow_map() {
        // (0,0) and (1,1) walkable; (1,0) and (0,1) blocked. Two boundary
        // edges start at the shared corner (1,1).
        let grid = grid_with_walkable(2, 2, &[(0, 0), (1, 1)]);
        let mut edges = EdgeTracker::new();
        edges.rebuild(&grid);
        assert_eq!(edges.edge_count(), 4);
        assert!(edges.verify_against(&grid));
        let shared = CornerPos::new(1, 1);
        let starting_at_shared = edges.edges().filter(|e| e.a == shared).count();
        assert_eq!(starting_at_shared, 2);
    }

    #[test]
    fn orientation_keeps_blocked_side_on_the_right() {
        let grid = grid_with_walkable(2, 1, &[(0, 0)]);
        let mut edges = EdgeTracker::new();
        edges.rebuild(&grid);
        // Single boundary: east side of (0,0), running south-to-north along
        // x=1 so the walkable tile sits on its left.
        let edge = *edges.edges().next().unwrap();
        assert_eq!(edge.a, CornerPos::new(1, 1));
        assert_eq!(edge.b, CornerPos::new(1, 0));
        assert_eq!(edge.walkable_side, TilePos::new(0, 0));
        assert_eq!(edge.blocked_side, TilePos::new(1, 0));
    }

    #[test]
    fn random_flip_sequence_stays_consistent() {
        // Deterministic pseudo-random walk over a 6x6 grid, checking the
        // invariant after every flip.
        let mut grid = TileGrid::new(6, 6);
        let mut edges = EdgeTracker::new();
        edges.rebuild(&grid);

        let mut seed = 0x2545_f491_4f6c_dd1du64;
        for _ in 0..200 {
            seed ^= seed << 13;
            seed ^= seed >> 7;
            seed ^= seed << 17;
            let x = (seed % 6) as i32;
            let y = ((seed >> 8) % 6) as i32;
            let pos = TilePos::new(x, y);
            let now_walkable = !grid.is_walkable(pos);
            grid.set_walkable_flag(pos, now_walkable);
            if now_walkable {
                edges.tile_became_walkable(&grid, pos);
            } else {
                edges.tile_became_unwalkable(&grid, pos);
            }
            assert!(edges.verify_against(&grid), "invariant broken at {pos}");
        }
    }
}
