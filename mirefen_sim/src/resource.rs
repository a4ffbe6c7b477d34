// Resource node entities — harvestable, slowly regrowing material sources.
//
// A standing node blocks its tile (a willow stand is not walkable terrain).
// Harvest work removes one unit of material per visit and yields one item
// of the template's `yield_item` kind at the worker's tile. A node whose
// material reaches zero is felled: removed from the world, its tile
// unblocked through the map cascade.
//
// Regrowth runs on the node's own schedule: while a standing node is below
// `max_material`, a `TimedEventor::Resource` entry restores one unit per
// regrowth interval (see `sim.rs`). Felled nodes do not come back.

use crate::types::ResourceId;
use mirefen_grid::tile::TilePos;
use serde::{Deserialize, Serialize};

/// A resource node instance.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResourceNode {
    pub id: ResourceId,
    pub template: String,
    pub texture: String,
    pub position: TilePos,
    pub material: u32,
    pub max_material: u32,
    /// Copied from the template: the item each harvested unit yields.
    pub yield_item: String,
    /// Copied from the template: the job type of harvest designations.
    pub job_type: String,
}

impl ResourceNode {
    /// Remove one unit of material. Returns `true` if the node is now
    /// exhausted and should be felled.
    pub fn harvest_unit(&mut self) -> bool {
        self.material = self.material.saturating_sub(1);
        self.material == 0
    }

    /// Restore one unit of material, capped at the maximum. Returns `true`
    /// while the node still has room to regrow afterwards.
    pub fn regrow_unit(&mut self) -> bool {
        self.material = (self.material + 1).min(self.max_material);
        self.material < self.max_material
    }
}
