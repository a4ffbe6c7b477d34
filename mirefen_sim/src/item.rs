// Item entities — portable goods lying on the ground or carried by actors.
//
// Items have no behavior of their own; they are moved around by transport
// designations (see `designation.rs`) and produced by harvesting (see
// `resource.rs`). An item is always in exactly one place: on a tile or in
// an actor's hands.

use crate::types::{ActorId, ItemId};
use mirefen_grid::tile::TilePos;
use serde::{Deserialize, Serialize};

/// Where an item currently is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemLocation {
    OnGround(TilePos),
    Held(ActorId),
}

/// An item instance. `template` names the `ItemTemplate` it was spawned
/// from; `texture` is copied out of it at spawn time.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub template: String,
    pub texture: String,
    pub location: ItemLocation,
}

impl Item {
    /// The tile the item occupies, if it is on the ground.
    pub fn ground_position(&self) -> Option<TilePos> {
        match self.location {
            ItemLocation::OnGround(pos) => Some(pos),
            ItemLocation::Held(_) => None,
        }
    }
}
