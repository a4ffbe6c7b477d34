// The timed event manager — absolute-time scheduling of sim entities.
//
// Every time-driven entity (actors, regrowing resource nodes) is keyed in a
// sorted map by the absolute tick at which it next acts. `SimState::tick`
// advances the clock and drains due entries in ascending key order; each
// drained entity performs one action, decides its own next delay from the
// action it just performed, and is re-inserted under the new key.
//
// The map is single-valued, so colliding keys are disambiguated by nudging
// the incoming entry forward one tick at a time until a free slot is found.
// Nothing is ever overwritten or dropped; the order among exact-tie entries
// is the probe order, which callers must not rely on.
//
// A reverse index (entity → scheduled tick) makes `stop` a map lookup
// instead of a scan. It is derived state: serialization goes through a
// plain entry list and both maps are rebuilt on deserialization.
//
// See also: `sim.rs` for the drain loop, `event.rs` for the narrative
// events the drained entities emit.
//
// **Critical constraint: determinism.** `BTreeMap` keys give a total
// processing order; no hashing is involved anywhere in scheduling.

use crate::types::{ActorId, ResourceId, SimTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Anything schedulable by absolute next-action time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TimedEventor {
    Actor(ActorId),
    Resource(ResourceId),
}

/// Sorted schedule of entities keyed by their absolute next-action tick.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(from = "SchedulerRepr", into = "SchedulerRepr")]
pub struct TimedEventManager {
    queue: BTreeMap<SimTime, TimedEventor>,
    when: BTreeMap<TimedEventor, SimTime>,
}

/// Serialized form: the entry list alone. Both maps are rebuilt from it.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct SchedulerRepr {
    entries: Vec<(SimTime, TimedEventor)>,
}

impl From<SchedulerRepr> for TimedEventManager {
    fn from(repr: SchedulerRepr) -> Self {
        let mut manager = Self::new();
        for (time, eventor) in repr.entries {
            manager.start(eventor, time);
        }
        manager
    }
}

impl From<TimedEventManager> for SchedulerRepr {
    fn from(manager: TimedEventManager) -> Self {
        Self {
            entries: manager.queue.into_iter().collect(),
        }
    }
}

impl TimedEventManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `eventor` to act at `at`, nudging forward past occupied
    /// keys. An already-scheduled entity is moved to the new time.
    pub fn start(&mut self, eventor: TimedEventor, at: SimTime) {
        self.stop(&eventor);
        let mut slot = at;
        while self.queue.contains_key(&slot) {
            slot += 1;
        }
        self.queue.insert(slot, eventor);
        self.when.insert(eventor, slot);
    }

    /// Remove an entity from the schedule without destroying it. Unknown
    /// entities are a no-op.
    pub fn stop(&mut self, eventor: &TimedEventor) {
        if let Some(time) = self.when.remove(eventor) {
            self.queue.remove(&time);
        }
    }

    pub fn contains(&self, eventor: &TimedEventor) -> bool {
        self.when.contains_key(eventor)
    }

    /// The earliest scheduled tick, if any entity is scheduled.
    pub fn peek_next(&self) -> Option<SimTime> {
        self.queue.keys().next().copied()
    }

    /// Remove and return the earliest entry if it is due at or before `now`.
    pub fn pop_due(&mut self, now: SimTime) -> Option<(SimTime, TimedEventor)> {
        let (&time, &eventor) = self.queue.first_key_value()?;
        if time > now {
            return None;
        }
        self.queue.remove(&time);
        self.when.remove(&eventor);
        Some((time, eventor))
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
