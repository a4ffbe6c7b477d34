// Data-driven simulation configuration.
//
// All tunable parameters live in `SimConfig`, loadable from JSON. The sim
// reads durations and budgets from here instead of using magic numbers, so
// balance iteration never needs recompilation.
//
// Work durations are keyed by job type string ("chop", "build", ...) with
// a fallback for job types the table doesn't name — job types are
// content-defined, so the table can't be closed.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Tunable simulation parameters. See field docs for units.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Ticks an actor spends traversing one tile.
    pub move_ticks_per_tile: u64,
    /// Ticks between an idle actor's checks for available work.
    pub idle_recheck_ticks: u64,
    /// Ticks per unit of work, keyed by job type.
    pub work_ticks: BTreeMap<String, u64>,
    /// Fallback work duration for job types absent from `work_ticks`.
    pub default_work_ticks: u64,
    /// Maximum nodes one pathfinding search may expand.
    pub pathfinder_node_budget: usize,
    /// Ticks between a depleted resource node regaining one unit of material.
    pub resource_regrow_ticks: u64,
    /// Initial time scale multiplier.
    pub default_scale: u32,
    /// Ground texture for tiles no content has customized.
    pub default_ground_texture: String,
}

impl Default for SimConfig {
    fn default() -> Self {
        let mut work_ticks = BTreeMap::new();
        work_ticks.insert("chop".to_string(), 2000);
        work_ticks.insert("build".to_string(), 1500);
        Self {
            move_ticks_per_tile: 500,
            idle_recheck_ticks: 1000,
            work_ticks,
            default_work_ticks: 1000,
            pathfinder_node_budget: 4096,
            resource_regrow_ticks: 60_000,
            default_scale: 1,
            default_ground_texture: "ground".to_string(),
        }
    }
}

impl SimConfig {
    /// Ticks one unit of work takes for the given job type.
    pub fn work_duration(&self, job_type: &str) -> u64 {
        self.work_ticks
            .get(job_type)
            .copied()
            .unwrap_or(self.default_work_ticks)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
