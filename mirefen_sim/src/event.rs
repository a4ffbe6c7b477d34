// Player-visible narrative events.
//
// The sim has no logging layer; everything worth telling the player about
// comes out of `SimState::tick` as a `Vec<SimEvent>` in `StepResult`. The
// UI turns these into an event log; tests use them to observe behavior that
// would otherwise require poking at internals.
//
// These are output only. The scheduling of future work is a separate
// concern — see `scheduler.rs` for the timed event queue that drives the
// sim forward.

use crate::types::{ActorId, BuildingId, DesignationId, ItemId, ResourceId, SimTime};
use serde::{Deserialize, Serialize};

/// A narrative event emitted by the simulation for the UI / event log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimEvent {
    pub time: SimTime,
    pub kind: SimEventKind,
}

/// Types of narrative events visible to the player.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SimEventKind {
    /// A new actor has arrived.
    ActorSpawned { actor: ActorId, template: String },
    /// An item has appeared on the ground (spawned or harvested).
    ItemSpawned { item: ItemId, template: String },
    /// A construction site was placed and its build designation published.
    ConstructionStarted { building: BuildingId },
    /// A construction site finished building.
    ConstructionCompleted { building: BuildingId },
    /// A building — site or completed — was demolished.
    BuildingRemoved { building: BuildingId },
    /// A unit of work was published for actors to claim.
    DesignationCreated { designation: DesignationId, job_type: String },
    /// A designation finished for good.
    DesignationCompleted { designation: DesignationId },
    /// A designation went back to the available pool (repeatable work, or
    /// its worker could not reach it).
    DesignationReleased { designation: DesignationId },
    /// A designation was withdrawn before it could finish.
    DesignationCancelled { designation: DesignationId },
    /// An actor could not compute a route to its goal.
    PathFailed { actor: ActorId, designation: DesignationId },
    /// A resource node ran out of material and was removed.
    ResourceDepleted { resource: ResourceId },
    /// Simulation speed changed.
    ScaleChanged { scale: u32 },
}
