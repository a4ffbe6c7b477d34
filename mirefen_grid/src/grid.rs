// Dense 2D tile grid — walkability, area membership, access listeners.
//
// The grid is stored as a flat `Vec<Tile>` indexed by `x + y * width`,
// giving O(1) read/write access. Out-of-bounds reads report unwalkable /
// blocked; out-of-bounds writes are no-ops.
//
// Each tile carries, besides its walkability flag and area ID, a small
// inline list of access-listener handles. A handle is an opaque `u64`
// owned by whoever subscribed (the sim layer registers designations here);
// the grid only stores and iterates them. Notification itself is driven by
// `TileMap::set_walkable` in `map.rs` — the raw mutators in this file never
// fire the cascade, which is why they are crate-private.
//
// See also: `map.rs` for the one public mutation entry point, `area.rs`
// for what the `AreaId` values mean, `tile.rs` for `TilePos`.

use crate::area::AreaId;
use crate::tile::{Direction, TilePos};
use smallvec::SmallVec;

/// Opaque subscriber handle for tile-accessibility notifications.
///
/// The grid never interprets the value; the sim layer encodes whatever it
/// needs (designation IDs) into the 64 bits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AccessHandle(pub u64);

/// A single grid cell.
#[derive(Clone, Debug)]
pub struct Tile {
    pub walkable: bool,
    pub area: AreaId,
    /// Subscribers to notify when this tile's walkability changes.
    listeners: SmallVec<[AccessHandle; 2]>,
}

impl Default for Tile {
    fn default() -> Self {
        Self {
            walkable: false,
            area: AreaId::BLOCKED,
            listeners: SmallVec::new(),
        }
    }
}

/// Dense 2D tile storage.
#[derive(Clone, Debug, Default)]
pub struct TileGrid {
    tiles: Vec<Tile>,
    width: u32,
    height: u32,
}

impl TileGrid {
    /// Create a grid of the given size with every tile unwalkable.
    pub fn new(width: u32, height: u32) -> Self {
        let total = (width as usize) * (height as usize);
        Self {
            tiles: vec![Tile::default(); total],
            width,
            height,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn in_bounds(&self, pos: TilePos) -> bool {
        pos.x >= 0 && pos.y >= 0 && (pos.x as u32) < self.width && (pos.y as u32) < self.height
    }

    fn index(&self, pos: TilePos) -> Option<usize> {
        if self.in_bounds(pos) {
            Some(pos.x as usize + pos.y as usize * self.width as usize)
        } else {
            None
        }
    }

    /// Whether the tile is walkable. Out-of-bounds positions are not.
    pub fn is_walkable(&self, pos: TilePos) -> bool {
        self.index(pos).is_some_and(|i| self.tiles[i].walkable)
    }

    /// The area a tile belongs to. Out-of-bounds positions report `BLOCKED`.
    pub fn area_of(&self, pos: TilePos) -> AreaId {
        self.index(pos).map_or(AreaId::BLOCKED, |i| self.tiles[i].area)
    }

    /// The in-bounds 4-neighbors of a position. Boundary tiles have fewer.
    pub fn neighbors(&self, pos: TilePos) -> SmallVec<[TilePos; 4]> {
        Direction::ALL
            .into_iter()
            .map(|d| pos.step(d))
            .filter(|&n| self.in_bounds(n))
            .collect()
    }

    /// Raw flag write. Does NOT run the edge/listener/area cascade — all
    /// outside mutation goes through `TileMap::set_walkable`.
    pub(crate) fn set_walkable_flag(&mut self, pos: TilePos, walkable: bool) {
        if let Some(i) = self.index(pos) {
            self.tiles[i].walkable = walkable;
        }
    }

    pub(crate) fn set_area(&mut self, pos: TilePos, area: AreaId) {
        if let Some(i) = self.index(pos) {
            self.tiles[i].area = area;
        }
    }

    /// Register a subscriber for walkability changes on one tile.
    /// Registering the same handle twice is a no-op.
    pub fn register_listener(&mut self, pos: TilePos, handle: AccessHandle) {
        if let Some(i) = self.index(pos) {
            let listeners = &mut self.tiles[i].listeners;
            if !listeners.contains(&handle) {
                listeners.push(handle);
            }
        }
    }

    /// Remove a subscriber from one tile. Unknown handles are ignored.
    pub fn unregister_listener(&mut self, pos: TilePos, handle: AccessHandle) {
        if let Some(i) = self.index(pos) {
            self.tiles[i].listeners.retain(|&mut h| h != handle);
        }
    }

    /// The subscribers registered on one tile, in registration order.
    pub fn listeners(&self, pos: TilePos) -> &[AccessHandle] {
        match self.index(pos) {
            Some(i) => &self.tiles[i].listeners,
            None => &[],
        }
    }

    /// Iterate every in-bounds position, row-major.
    pub fn positions(&self) -> impl Iterator<Item = TilePos> + '_ {
        let (w, h) = (self.width as i32, self.height as i32);
        (0..h).flat_map(move |y| (0..w).map(move |x| TilePos::new(x, y)))
    }

    /// Total number of walkable tiles.
    pub fn walkable_count(&self) -> usize {
        self.tiles.iter().filter(|t| t.walkable).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_grid_is_all_unwalkable() {
        let grid = TileGrid::new(4, 3);
        for pos in grid.positions() {
            assert!(!grid.is_walkable(pos));
            assert_eq!(grid.area_of(pos), AreaId::BLOCKED);
        }
        assert_eq!(grid.walkable_count(), 0);
    }

    #[test]
    fn out_of_bounds_reads() {
        let grid = TileGrid::new(4, 4);
        assert!(!grid.is_walkable(TilePos::new(-1, 0)));
        assert!(!grid.is_walkable(TilePos::new(0, 4)));
        assert_eq!(grid.area_of(TilePos::new(100, 100)), AreaId::BLOCKED);
        assert!(grid.listeners(TilePos::new(-1, -1)).is_empty());
    }

    #[test]
    fn neighbors_clip_at_boundary() {
        let grid = TileGrid::new(3, 3);
        assert_eq!(grid.neighbors(TilePos::new(1, 1)).len(), 4);
        assert_eq!(grid.neighbors(TilePos::new(0, 0)).len(), 2);
        assert_eq!(grid.neighbors(TilePos::new(1, 0)).len(), 3);
        assert_eq!(grid.neighbors(TilePos::new(2, 2)).len(), 2);
    }

    #[test]
    fn listener_registration_is_idempotent() {
        let mut grid = TileGrid::new(4, 4);
        let pos = TilePos::new(2, 2);
        let handle = AccessHandle(7);
        grid.register_listener(pos, handle);
        grid.register_listener(pos, handle);
        assert_eq!(grid.listeners(pos), &[handle]);

        grid.unregister_listener(pos, handle);
        assert!(grid.listeners(pos).is_empty());
        // Unregistering again is harmless.
        grid.unregister_listener(pos, handle);
    }

    #[test]
    fn listeners_keep_registration_order() {
        let mut grid = TileGrid::new(4, 4);
        let pos = TilePos::new(1, 1);
        grid.register_listener(pos, AccessHandle(3));
        grid.register_listener(pos, AccessHandle(1));
        grid.register_listener(pos, AccessHandle(2));
        assert_eq!(
            grid.listeners(pos),
            &[AccessHandle(3), AccessHandle(1), AccessHandle(2)]
        );
    }
}
