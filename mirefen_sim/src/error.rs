// Simulation error types.
//
// Only operations whose failure indicates a content or caller bug return
// errors — spawning from an unknown template name, placing entities out of
// bounds or onto occupied tiles. Runtime conditions the sim absorbs on its
// own (an unreachable designation, a cancelled search) are not errors; they
// surface through the narrative event stream instead. Broken internal
// invariants are asserts, never `Err`.

use crate::types::{ItemId, ResourceId};
use mirefen_grid::tile::TilePos;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SimError {
    /// A spawn referenced a template name content never registered.
    #[error("unknown {kind} template `{name}`")]
    UnknownTemplate { kind: &'static str, name: String },

    /// A position outside the world grid.
    #[error("position {pos} is outside the {width}x{height} world")]
    OutOfBounds { pos: TilePos, width: u32, height: u32 },

    /// An actor must spawn on a walkable tile.
    #[error("tile {pos} is not walkable")]
    NotWalkable { pos: TilePos },

    /// Buildings and resource nodes need an empty tile.
    #[error("tile {pos} already holds a building or resource")]
    Occupied { pos: TilePos },

    /// A designation referenced a resource node that does not exist.
    #[error("no such resource node {0}")]
    NoSuchResource(ResourceId),

    /// A designation referenced an item that does not exist.
    #[error("no such item {0}")]
    NoSuchItem(ItemId),

    /// Transport designations need an item lying on the ground.
    #[error("item {0} is not on the ground")]
    ItemNotOnGround(ItemId),
}
