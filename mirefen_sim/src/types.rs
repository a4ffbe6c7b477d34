// Entity identifiers and shared simulation types.
//
// IDs are compact sequential integers, allocated from per-kind counters on
// `SimState` — cheap to copy, total-ordered, and stable across save/load.
// Designation IDs double as the grid crate's opaque access-listener
// handles via a lossless widening (see `designation.rs`).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Absolute simulation time, in ticks. 1000 ticks ≈ one simulated second.
pub type SimTime = u64;

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        pub struct $name(pub u32);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}#{}", stringify!($name), self.0)
            }
        }
    };
}

entity_id!(/// Unique identifier for an actor (a mobile agent).
ActorId);
entity_id!(/// Unique identifier for an item lying around or being carried.
ItemId);
entity_id!(/// Unique identifier for a building (site or completed).
BuildingId);
entity_id!(/// Unique identifier for a harvestable resource node.
ResourceId);
entity_id!(/// Unique identifier for a designation (a claimable unit of work).
DesignationId);

/// The kind of action an actor's state stack settles on for one scheduler
/// visit. The sim maps this to a duration from `SimConfig` to decide when
/// the actor is next due.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionKind {
    /// Nothing to do; recheck for work after the idle interval.
    Idle,
    /// Traversing one tile of a computed path.
    Move,
    /// One increment of job work at a designation.
    Work,
}
