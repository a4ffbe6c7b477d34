// Connected-region bookkeeping for walkable tiles.
//
// Every walkable tile belongs to exactly one positive-ID area — a maximal
// 4-connected component — and every unwalkable tile belongs to the single
// area `BLOCKED` (−1). Two tiles are mutually reachable iff their area IDs
// are equal and positive, which is what makes `area_of` comparisons a
// cheap reachability pre-check for job assignment and pathfinding callers.
//
// Maintenance strategy: merges are incremental (a tile becoming walkable
// can only join regions, and joining is resolved locally from its
// neighbors' IDs, smaller membership folded into larger); splits are not.
// Deciding whether removing one tile cut its region in two cannot be done
// locally in a general grid, so `tile_became_unwalkable` only evicts the
// tile to `BLOCKED` and leaves the remainder's IDs untouched — a severed
// half keeps a stale ID until the next full rebuild. Callers treat
// unreachability discovered by the pathfinder as the authoritative answer.
//
// `build_initial_groups` is the full rebuild: repeated bounded
// breadth-first fills from ungrouped walkable tiles.
//
// See also: `map.rs` which drives these hooks from `set_walkable`,
// `grid.rs` for where each tile's current ID is stored.

use crate::grid::TileGrid;
use crate::tile::TilePos;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// Identifier of a connected region. `0` is unassigned (only ever seen
/// mid-bootstrap), `−1` is the shared area of all unwalkable tiles, and
/// positive values name walkable regions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AreaId(pub i32);

impl AreaId {
    pub const UNGROUPED: Self = Self(0);
    pub const BLOCKED: Self = Self(-1);

    /// Whether this names a real walkable region.
    pub const fn is_region(self) -> bool {
        self.0 > 0
    }
}

/// A named connected component and its member tiles.
#[derive(Clone, Debug)]
pub struct Area {
    pub id: AreaId,
    pub members: BTreeSet<TilePos>,
}

impl Area {
    fn new(id: AreaId) -> Self {
        Self {
            id,
            members: BTreeSet::new(),
        }
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }
}

/// Tracks all areas and keeps tile IDs consistent with true connectivity
/// through merges. See the module header for the split caveat.
#[derive(Clone, Debug)]
pub struct AreaManager {
    areas: BTreeMap<AreaId, Area>,
    next_id: i32,
}

impl Default for AreaManager {
    fn default() -> Self {
        Self::new()
    }
}

impl AreaManager {
    pub fn new() -> Self {
        let mut areas = BTreeMap::new();
        areas.insert(AreaId::BLOCKED, Area::new(AreaId::BLOCKED));
        Self { areas, next_id: 1 }
    }

    fn fresh_id(&mut self) -> AreaId {
        let id = AreaId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Full (re)derivation of the area partition: every unwalkable tile is
    /// collected into `BLOCKED` up front, then ungrouped walkable tiles are
    /// flood-filled into fresh areas. Each fill is bounded by the grid size.
    pub fn build_initial_groups(&mut self, grid: &mut TileGrid) {
        self.areas.clear();
        self.areas.insert(AreaId::BLOCKED, Area::new(AreaId::BLOCKED));

        for pos in grid.positions().collect::<Vec<_>>() {
            if grid.is_walkable(pos) {
                grid.set_area(pos, AreaId::UNGROUPED);
            } else {
                grid.set_area(pos, AreaId::BLOCKED);
                self.areas
                    .get_mut(&AreaId::BLOCKED)
                    .unwrap()
                    .members
                    .insert(pos);
            }
        }

        let bound = grid.width() as usize * grid.height() as usize;
        for pos in grid.positions().collect::<Vec<_>>() {
            if grid.is_walkable(pos) && grid.area_of(pos) == AreaId::UNGROUPED {
                let id = self.fresh_id();
                self.flood_fill(grid, pos, id, bound);
            }
        }
    }

    /// Breadth-first fill of the walkable component containing `start`,
    /// assigning `id` to every tile reached. `bound` caps the visit count.
    fn flood_fill(&mut self, grid: &mut TileGrid, start: TilePos, id: AreaId, bound: usize) {
        let mut area = Area::new(id);
        let mut queue = VecDeque::new();
        grid.set_area(start, id);
        area.members.insert(start);
        queue.push_back(start);

        let mut visited = 1usize;
        while let Some(pos) = queue.pop_front() {
            for neighbor in grid.neighbors(pos) {
                if !grid.is_walkable(neighbor) || grid.area_of(neighbor) == id {
                    continue;
                }
                assert!(visited < bound, "flood fill exceeded grid size");
                visited += 1;
                grid.set_area(neighbor, id);
                area.members.insert(neighbor);
                queue.push_back(neighbor);
            }
        }
        self.areas.insert(id, area);
    }

    /// React to `pos` having just become walkable (flag already flipped):
    /// leave `BLOCKED`, then join — and if necessary merge — the adjacent
    /// walkable regions. With no walkable neighbor the tile becomes a fresh
    /// singleton area.
    pub fn tile_became_walkable(&mut self, grid: &mut TileGrid, pos: TilePos) {
        self.areas
            .get_mut(&AreaId::BLOCKED)
            .unwrap()
            .members
            .remove(&pos);

        let mut neighbor_ids: Vec<AreaId> = grid
            .neighbors(pos)
            .into_iter()
            .filter(|&n| grid.is_walkable(n))
            .map(|n| grid.area_of(n))
            .filter(|id| id.is_region())
            .collect();
        neighbor_ids.sort_unstable();
        neighbor_ids.dedup();

        let target = match neighbor_ids.as_slice() {
            [] => {
                let id = self.fresh_id();
                self.areas.insert(id, Area::new(id));
                id
            }
            ids => {
                // Keep the most populous region and fold the rest into it.
                let target = ids
                    .iter()
                    .copied()
                    .max_by_key(|id| self.areas[id].member_count())
                    .unwrap();
                for &id in ids {
                    if id != target {
                        self.merge_into(grid, id, target);
                    }
                }
                target
            }
        };

        grid.set_area(pos, target);
        self.areas.get_mut(&target).unwrap().members.insert(pos);
    }

    /// Reassign every member of `source` into `target` and destroy the
    /// emptied source area.
    fn merge_into(&mut self, grid: &mut TileGrid, source: AreaId, target: AreaId) {
        let source_area = self.areas.remove(&source).expect("merging unknown area");
        let target_area = self.areas.get_mut(&target).expect("merging into unknown area");
        for pos in source_area.members {
            grid.set_area(pos, target);
            target_area.members.insert(pos);
        }
    }

    /// React to `pos` having just become unwalkable: evict it to `BLOCKED`.
    /// No split detection — see the module header.
    pub fn tile_became_unwalkable(&mut self, grid: &mut TileGrid, pos: TilePos) {
        let old = grid.area_of(pos);
        if old.is_region() {
            if let Some(area) = self.areas.get_mut(&old) {
                area.members.remove(&pos);
                if area.members.is_empty() {
                    self.areas.remove(&old);
                }
            }
        }
        grid.set_area(pos, AreaId::BLOCKED);
        self.areas
            .get_mut(&AreaId::BLOCKED)
            .unwrap()
            .members
            .insert(pos);
    }

    pub fn area(&self, id: AreaId) -> Option<&Area> {
        self.areas.get(&id)
    }

    /// Number of walkable regions (excludes `BLOCKED`).
    pub fn region_count(&self) -> usize {
        self.areas.keys().filter(|id| id.is_region()).count()
    }

    /// Total tiles across all walkable regions. Conserved by merges.
    pub fn walkable_member_count(&self) -> usize {
        self.areas
            .values()
            .filter(|a| a.id.is_region())
            .map(Area::member_count)
            .sum()
    }

    pub fn regions(&self) -> impl Iterator<Item = &Area> {
        self.areas.values().filter(|a| a.id.is_region())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_grid(width: u32, height: u32, blocked: &[(i32, i32)]) -> TileGrid {
        let mut grid = TileGrid::new(width, height);
        for pos in grid.positions().collect::<Vec<_>>() {
            grid.set_walkable_flag(pos, true);
        }
        for &(x, y) in blocked {
            grid.set_walkable_flag(TilePos::new(x, y), false);
        }
        grid
    }

    #[test]
    fn bootstrap_single_region() {
        let mut grid = open_grid(3, 3, &[]);
        let mut areas = AreaManager::new();
        areas.build_initial_groups(&mut grid);

        assert_eq!(areas.region_count(), 1);
        assert_eq!(areas.walkable_member_count(), 9);
        let id = grid.area_of(TilePos::new(0, 0));
        assert!(id.is_region());
        for pos in grid.positions() {
            assert_eq!(grid.area_of(pos), id);
        }
    }

    #[test]
    fn bootstrap_separated_regions() {
        // A full-height wall at x=1 splits a 3x3 grid into two columns.
        let mut grid = open_grid(3, 3, &[(1, 0), (1, 1), (1, 2)]);
        let mut areas = AreaManager::new();
        areas.build_initial_groups(&mut grid);

        assert_eq!(areas.region_count(), 2);
        assert_eq!(areas.walkable_member_count(), 6);
        let left = grid.area_of(TilePos::new(0, 1));
        let right = grid.area_of(TilePos::new(2, 1));
        assert_ne!(left, right);
        assert_eq!(grid.area_of(TilePos::new(1, 1)), AreaId::BLOCKED);
        assert_eq!(areas.area(AreaId::BLOCKED).unwrap().member_count(), 3);
    }

    #[test]
    fn walkable_bridge_merges_smaller_into_larger() {
        // Left column (3 tiles) and right 2x3 block (6 tiles), wall between.
        let mut grid = open_grid(4, 3, &[(1, 0), (1, 1), (1, 2)]);
        let mut areas = AreaManager::new();
        areas.build_initial_groups(&mut grid);
        assert_eq!(areas.region_count(), 2);

        let left = grid.area_of(TilePos::new(0, 1));
        let right = grid.area_of(TilePos::new(2, 1));

        // Open the middle of the wall: regions merge, the big one survives.
        let bridge = TilePos::new(1, 1);
        grid.set_walkable_flag(bridge, true);
        areas.tile_became_walkable(&mut grid, bridge);

        assert_eq!(areas.region_count(), 1);
        assert_eq!(grid.area_of(bridge), right);
        assert_eq!(grid.area_of(TilePos::new(0, 1)), right);
        assert_eq!(areas.walkable_member_count(), 10);
        assert!(areas.area(left).is_none(), "emptied area is destroyed");
    }

    #[test]
    fn merge_conserves_walkable_count_and_flags() {
        let mut grid = open_grid(5, 5, &[(2, 0), (2, 1), (2, 2), (2, 3), (2, 4)]);
        let mut areas = AreaManager::new();
        areas.build_initial_groups(&mut grid);
        let before_flags = grid.walkable_count();

        grid.set_walkable_flag(TilePos::new(2, 2), true);
        areas.tile_became_walkable(&mut grid, TilePos::new(2, 2));

        assert_eq!(grid.walkable_count(), before_flags + 1);
        assert_eq!(areas.walkable_member_count(), grid.walkable_count());
    }

    #[test]
    fn isolated_tile_gets_fresh_singleton_area() {
        let mut grid = TileGrid::new(3, 3);
        let mut areas = AreaManager::new();
        areas.build_initial_groups(&mut grid);
        assert_eq!(areas.region_count(), 0);

        let pos = TilePos::new(1, 1);
        grid.set_walkable_flag(pos, true);
        areas.tile_became_walkable(&mut grid, pos);

        assert_eq!(areas.region_count(), 1);
        let id = grid.area_of(pos);
        assert!(id.is_region());
        assert_eq!(areas.area(id).unwrap().member_count(), 1);
    }

    #[test]
    fn eviction_moves_tile_to_blocked() {
        let mut grid = open_grid(3, 3, &[]);
        let mut areas = AreaManager::new();
        areas.build_initial_groups(&mut grid);
        let id = grid.area_of(TilePos::new(1, 1));

        grid.set_walkable_flag(TilePos::new(1, 1), false);
        areas.tile_became_unwalkable(&mut grid, TilePos::new(1, 1));

        assert_eq!(grid.area_of(TilePos::new(1, 1)), AreaId::BLOCKED);
        assert_eq!(areas.area(id).unwrap().member_count(), 8);
        assert!(areas
            .area(AreaId::BLOCKED)
            .unwrap()
            .members
            .contains(&TilePos::new(1, 1)));
    }

    #[test]
    fn last_member_eviction_destroys_area() {
        let mut grid = TileGrid::new(2, 2);
        grid.set_walkable_flag(TilePos::new(0, 0), true);
        let mut areas = AreaManager::new();
        areas.build_initial_groups(&mut grid);
        let id = grid.area_of(TilePos::new(0, 0));

        grid.set_walkable_flag(TilePos::new(0, 0), false);
        areas.tile_became_unwalkable(&mut grid, TilePos::new(0, 0));

        assert!(areas.area(id).is_none());
        assert_eq!(areas.region_count(), 0);
    }
}
