// Building entities — construction sites and completed structures.
//
// A building starts life as a site with a build designation attached
// (`SimState::start_construction`). Workers claim the designation, walk to
// an adjacent tile, and add one unit of progress per work visit. When
// progress reaches the template's `build_work` the site becomes `Complete`,
// and a building whose template blocks movement flips its tile unwalkable
// through the map's one mutation entry point — which is what routes the
// change into the edge tracker, area manager, and any designations
// watching that tile.
//
// Sites never block movement; only completed blocking buildings do.

use crate::types::BuildingId;
use mirefen_grid::tile::TilePos;
use serde::{Deserialize, Serialize};

/// Construction lifecycle of a building.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BuildingState {
    /// Under construction. `progress` counts completed work units toward
    /// the template's `build_work`.
    Site { progress: u32, required: u32 },
    Complete,
}

/// A building instance.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Building {
    pub id: BuildingId,
    pub template: String,
    pub texture: String,
    pub position: TilePos,
    pub state: BuildingState,
    pub blocks_walk: bool,
}

impl Building {
    pub fn is_complete(&self) -> bool {
        matches!(self.state, BuildingState::Complete)
    }

    /// Add one unit of work. Returns `true` when this unit finished the
    /// building. No-op on completed buildings.
    pub fn add_work_unit(&mut self) -> bool {
        match self.state {
            BuildingState::Site { progress, required } => {
                let progress = progress + 1;
                if progress >= required {
                    self.state = BuildingState::Complete;
                    true
                } else {
                    self.state = BuildingState::Site { progress, required };
                    false
                }
            }
            BuildingState::Complete => false,
        }
    }
}
