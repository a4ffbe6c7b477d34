// Tile coordinates and cardinal directions.
//
// The world is a 2D grid addressed by `TilePos` with y growing southward
// (screen convention for the isometric projection layered on top of this
// crate). Movement and adjacency are strictly 4-directional; diagonals do
// not exist anywhere in the simulation.
//
// See also: `grid.rs` for the tile storage these coordinates index into,
// `pathfind.rs` which returns paths as `Direction` sequences.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A position in the 2D tile grid, in whole-tile units.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TilePos {
    pub x: i32,
    pub y: i32,
}

impl TilePos {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// The adjacent position one step in the given direction.
    pub const fn step(self, dir: Direction) -> Self {
        let (dx, dy) = dir.offset();
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }

    /// Manhattan distance between two positions.
    pub fn manhattan_distance(self, other: Self) -> u32 {
        (self.x - other.x).unsigned_abs() + (self.y - other.y).unsigned_abs()
    }

    /// Squared Euclidean distance. Used as the pathfinding heuristic —
    /// monotonically correlated with true distance but not admissible.
    pub fn squared_distance(self, other: Self) -> i64 {
        let dx = i64::from(self.x - other.x);
        let dy = i64::from(self.y - other.y);
        dx * dx + dy * dy
    }
}

impl fmt::Display for TilePos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// One of the four cardinal directions. North is −y, East is +x.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    North,
    South,
    East,
    West,
}

impl Direction {
    /// All four directions, in the order neighbor expansion visits them.
    pub const ALL: [Self; 4] = [Self::North, Self::South, Self::East, Self::West];

    /// The (dx, dy) offset of one step in this direction.
    pub const fn offset(self) -> (i32, i32) {
        match self {
            Self::North => (0, -1),
            Self::South => (0, 1),
            Self::East => (1, 0),
            Self::West => (-1, 0),
        }
    }

    pub const fn opposite(self) -> Self {
        match self {
            Self::North => Self::South,
            Self::South => Self::North,
            Self::East => Self::West,
            Self::West => Self::East,
        }
    }

    /// The direction of travel from `from` to an adjacent tile `to`, or
    /// `None` if the two are not 4-adjacent.
    pub fn between(from: TilePos, to: TilePos) -> Option<Self> {
        Self::ALL.into_iter().find(|&d| from.step(d) == to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_and_opposite_invert() {
        let p = TilePos::new(3, 7);
        for dir in Direction::ALL {
            assert_eq!(p.step(dir).step(dir.opposite()), p);
        }
    }

    #[test]
    fn between_adjacent_tiles() {
        let p = TilePos::new(0, 0);
        assert_eq!(Direction::between(p, TilePos::new(1, 0)), Some(Direction::East));
        assert_eq!(Direction::between(p, TilePos::new(-1, 0)), Some(Direction::West));
        assert_eq!(Direction::between(p, TilePos::new(0, -1)), Some(Direction::North));
        assert_eq!(Direction::between(p, TilePos::new(0, 1)), Some(Direction::South));
        // Diagonal and distant tiles have no connecting direction.
        assert_eq!(Direction::between(p, TilePos::new(1, 1)), None);
        assert_eq!(Direction::between(p, TilePos::new(5, 0)), None);
        assert_eq!(Direction::between(p, p), None);
    }

    #[test]
    fn distances() {
        let a = TilePos::new(0, 0);
        let b = TilePos::new(3, -4);
        assert_eq!(a.manhattan_distance(b), 7);
        assert_eq!(a.squared_distance(b), 25);
        assert_eq!(b.squared_distance(a), 25);
    }

    #[test]
    fn tile_pos_ordering_for_btree_keys() {
        let a = TilePos::new(0, 0);
        let b = TilePos::new(1, 0);
        assert!(a < b);
    }
}
