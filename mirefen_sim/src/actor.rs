// Actor entities — the mobile agents that do the colony's work.
//
// Actors own their state stack exclusively (see `states.rs`); the sim's
// scheduler visits each actor at its own cadence and delegates to the
// stack. Everything behavioral lives in the stack and the sim's drain loop;
// this file is the entity data itself.
//
// Instances are constructed by copying template fields (`spawn` below), so
// two actors from the same template never share a collection.

use crate::states::StateStack;
use crate::template::ActorTemplate;
use crate::types::{ActorId, DesignationId, ItemId};
use mirefen_grid::tile::TilePos;
use serde::{Deserialize, Serialize};

/// A mobile agent.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Actor {
    pub id: ActorId,
    pub template: String,
    pub texture: String,
    pub position: TilePos,
    /// Job types this actor claims, in preference order.
    pub capable_jobs: Vec<String>,
    /// Ticks to traverse one tile (template override or config default).
    pub move_ticks: u64,
    pub held_item: Option<ItemId>,
    /// The designation this actor has claimed, if any.
    pub designation: Option<DesignationId>,
    pub stack: StateStack,
}

impl Actor {
    /// Build a live instance from a template. Fields are copied, never
    /// shared with the template or with other instances.
    pub fn spawn(
        id: ActorId,
        template: &ActorTemplate,
        position: TilePos,
        default_move_ticks: u64,
    ) -> Self {
        Self {
            id,
            template: template.name.clone(),
            texture: template.texture.clone(),
            position,
            capable_jobs: template.capable_jobs.clone(),
            move_ticks: template.move_ticks_override.unwrap_or(default_move_ticks),
            held_item: None,
            designation: None,
            stack: StateStack::new(),
        }
    }
}
