// Content templates — immutable blueprints for spawnable entities.
//
// Content loading hands the sim fully-constructed templates keyed by string
// name; `spawn_actor("bog_drover", ...)` and friends copy template fields
// into a fresh runtime instance. Templates are plain immutable values, so
// instances never alias each other's collections — each spawn gets its own
// copies.
//
// Unknown names at spawn time are a content bug, reported as
// `SimError::UnknownTemplate` (see `error.rs`).

use crate::error::SimError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Blueprint for a mobile agent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActorTemplate {
    pub name: String,
    pub texture: String,
    /// Job types this actor will claim designations for, in preference order.
    pub capable_jobs: Vec<String>,
    /// Per-template movement speed; `None` uses `SimConfig::move_ticks_per_tile`.
    pub move_ticks_override: Option<u64>,
}

/// Blueprint for an item that can lie on the ground or be carried.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ItemTemplate {
    pub name: String,
    pub texture: String,
}

/// Blueprint for a building.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BuildingTemplate {
    pub name: String,
    pub texture: String,
    /// Whether the completed building makes its tile unwalkable.
    pub blocks_walk: bool,
    /// Units of work to finish construction (one unit per work visit).
    pub build_work: u32,
}

/// Blueprint for a harvestable resource node.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResourceTemplate {
    pub name: String,
    pub texture: String,
    /// Material units the node starts with and regrows toward.
    pub max_material: u32,
    /// Item template spawned per harvested unit.
    pub yield_item: String,
    /// Job type of the harvest designation ("chop", "quarry", ...).
    pub job_type: String,
}

/// Registry of all templates, keyed by name. Populated by content loading
/// before the sim starts; the sim only reads it.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TemplateLibrary {
    actors: BTreeMap<String, ActorTemplate>,
    items: BTreeMap<String, ItemTemplate>,
    buildings: BTreeMap<String, BuildingTemplate>,
    resources: BTreeMap<String, ResourceTemplate>,
}

impl TemplateLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_actor(&mut self, template: ActorTemplate) {
        self.actors.insert(template.name.clone(), template);
    }

    pub fn register_item(&mut self, template: ItemTemplate) {
        self.items.insert(template.name.clone(), template);
    }

    pub fn register_building(&mut self, template: BuildingTemplate) {
        self.buildings.insert(template.name.clone(), template);
    }

    pub fn register_resource(&mut self, template: ResourceTemplate) {
        self.resources.insert(template.name.clone(), template);
    }

    pub fn actor(&self, name: &str) -> Result<&ActorTemplate, SimError> {
        self.actors.get(name).ok_or_else(|| SimError::UnknownTemplate {
            kind: "actor",
            name: name.to_string(),
        })
    }

    pub fn item(&self, name: &str) -> Result<&ItemTemplate, SimError> {
        self.items.get(name).ok_or_else(|| SimError::UnknownTemplate {
            kind: "item",
            name: name.to_string(),
        })
    }

    pub fn building(&self, name: &str) -> Result<&BuildingTemplate, SimError> {
        self.buildings.get(name).ok_or_else(|| SimError::UnknownTemplate {
            kind: "building",
            name: name.to_string(),
        })
    }

    pub fn resource(&self, name: &str) -> Result<&ResourceTemplate, SimError> {
        self.resources.get(name).ok_or_else(|| SimError::UnknownTemplate {
            kind: "resource",
            name: name.to_string(),
        })
    }
}
