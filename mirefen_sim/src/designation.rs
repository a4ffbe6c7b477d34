// Designations — claimable units of user-requested work.
//
// A designation names a job type ("chop", "build", "haul"), a kind-specific
// target, and the set of tiles the work can be done from. Availability is
// the heart of the protocol:
//
//   available ⟺ ≥1 access point currently walkable
//             ∧ no unmet prerequisites
//             ∧ not taken
//             ∧ not complete
//
// Availability is push-maintained, never polled. Each designation registers
// itself as an access listener on its access-point tiles (through the grid
// crate's opaque handle registry); when `TileMap::set_walkable` flips one of
// those tiles, the notification lands in `access_changed` below and updates
// exactly that designation's accessible set and bucket membership — all
// inside the same `set_walkable` call. Recomputing every designation on
// every tile change would not survive a real map.
//
// The manager keeps per-job-type "available" buckets so an idle actor's
// work scan is a bucket lookup plus an area check, not a rescan of all
// designations. Bucket membership changes are O(log n) set operations on
// every availability transition.
//
// Prerequisites form a DAG: a designation with unmet prerequisites stays
// out of the buckets; completing a prerequisite detaches it from its
// postrequisite and can flip the postrequisite available within the same
// call.
//
// See also: `sim.rs` for assignment (the idle-state scan) and completion
// effects, `map.rs` in the grid crate for the notification cascade.
//
// **Critical constraint: determinism.** Buckets and the registry are
// `BTreeMap`/`BTreeSet`; claim order is ascending designation ID within the
// actor's job-type preference order.

use crate::types::{ActorId, BuildingId, DesignationId, ItemId, ResourceId};
use mirefen_grid::area::AreaId;
use mirefen_grid::grid::{AccessHandle, TileGrid};
use mirefen_grid::map::AccessObserver;
use mirefen_grid::tile::TilePos;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::{BTreeMap, BTreeSet};

/// What a designation's work actually does, with its kind-specific target.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DesignationKind {
    /// Remove material from a resource node, yielding items.
    Harvest { target: ResourceId },
    /// Add work units to a building site until it completes.
    Construct { site: BuildingId },
    /// Carry an item to a destination tile.
    Transport { item: ItemId, destination: TilePos },
}

/// A claimable unit of work tied to one or more map locations.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Designation {
    pub id: DesignationId,
    pub job_type: String,
    pub kind: DesignationKind,
    pub taken_by: Option<ActorId>,
    pub complete: bool,
    /// Tiles the work can be done from. Watched for walkability changes.
    pub access_points: SmallVec<[TilePos; 4]>,
    /// The subset of `access_points` that is currently walkable.
    pub accessible_points: SmallVec<[TilePos; 4]>,
    /// Unmet prerequisite designations. Emptied as they complete.
    pub prerequisites: BTreeSet<DesignationId>,
    /// The designation this one unblocks on completion, if any.
    pub postrequisite: Option<DesignationId>,
}

impl Designation {
    pub fn new(id: DesignationId, job_type: impl Into<String>, kind: DesignationKind) -> Self {
        Self {
            id,
            job_type: job_type.into(),
            kind,
            taken_by: None,
            complete: false,
            access_points: SmallVec::new(),
            accessible_points: SmallVec::new(),
            prerequisites: BTreeSet::new(),
            postrequisite: None,
        }
    }

    pub fn is_available(&self) -> bool {
        !self.complete
            && self.taken_by.is_none()
            && self.prerequisites.is_empty()
            && !self.accessible_points.is_empty()
    }

    /// The grid-crate listener handle encoding this designation's ID.
    fn handle(&self) -> AccessHandle {
        handle_of(self.id)
    }
}

fn handle_of(id: DesignationId) -> AccessHandle {
    AccessHandle(u64::from(id.0))
}

fn id_of(handle: AccessHandle) -> DesignationId {
    DesignationId(handle.0 as u32)
}

/// Registry of all designations plus the per-job-type available buckets.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DesignationManager {
    designations: BTreeMap<DesignationId, Designation>,
    /// Available designation IDs, bucketed by job type.
    available: BTreeMap<String, BTreeSet<DesignationId>>,
}

impl DesignationManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: DesignationId) -> Option<&Designation> {
        self.designations.get(&id)
    }

    /// All designations, ascending by ID.
    pub fn iter(&self) -> impl Iterator<Item = &Designation> {
        self.designations.values()
    }

    pub fn len(&self) -> usize {
        self.designations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.designations.is_empty()
    }

    /// IDs currently available for the given job type, ascending.
    pub fn available_for(&self, job_type: &str) -> impl Iterator<Item = DesignationId> + '_ {
        self.available
            .get(job_type)
            .into_iter()
            .flat_map(|bucket| bucket.iter().copied())
    }

    /// Add a designation and watch its access points. The designation's
    /// availability is derived and bucketed before this returns.
    pub fn insert(&mut self, mut designation: Designation, grid: &mut TileGrid) {
        let handle = designation.handle();
        for &pos in &designation.access_points {
            grid.register_listener(pos, handle);
        }
        designation.accessible_points = designation
            .access_points
            .iter()
            .copied()
            .filter(|&pos| grid.is_walkable(pos))
            .collect();
        let id = designation.id;
        self.designations.insert(id, designation);
        self.refresh(id);
    }

    /// Replace a designation's watched tiles: unregister the old set,
    /// register the new one, re-derive accessibility and availability.
    pub fn set_access_points(&mut self, id: DesignationId, points: &[TilePos], grid: &mut TileGrid) {
        let Some(designation) = self.designations.get_mut(&id) else {
            return;
        };
        let handle = designation.handle();
        for &pos in &designation.access_points {
            grid.unregister_listener(pos, handle);
        }
        designation.access_points = points.iter().copied().collect();
        for &pos in &designation.access_points {
            grid.register_listener(pos, handle);
        }
        designation.accessible_points = designation
            .access_points
            .iter()
            .copied()
            .filter(|&pos| grid.is_walkable(pos))
            .collect();
        self.refresh(id);
    }

    /// Make `post` wait on `pre`. Re-derives `post`'s availability.
    pub fn link(&mut self, pre: DesignationId, post: DesignationId) {
        if !self.designations.contains_key(&pre) || !self.designations.contains_key(&post) {
            return;
        }
        self.designations.get_mut(&post).unwrap().prerequisites.insert(pre);
        self.designations.get_mut(&pre).unwrap().postrequisite = Some(post);
        self.refresh(post);
    }

    /// The first available designation matching one of `jobs` (in the given
    /// preference order) with an accessible point in `area`.
    pub fn claim_candidate(
        &self,
        jobs: &[String],
        area: AreaId,
        grid: &TileGrid,
    ) -> Option<DesignationId> {
        for job in jobs {
            let Some(bucket) = self.available.get(job) else {
                continue;
            };
            for &id in bucket {
                let designation = &self.designations[&id];
                if designation
                    .accessible_points
                    .iter()
                    .any(|&pos| grid.area_of(pos) == area)
                {
                    return Some(id);
                }
            }
        }
        None
    }

    /// Bind a designation to the actor that claimed it. Only called from
    /// the single-threaded idle scan, so a taken designation can never be
    /// claimed twice.
    pub fn assign(&mut self, id: DesignationId, actor: ActorId) {
        if let Some(designation) = self.designations.get_mut(&id) {
            debug_assert!(designation.taken_by.is_none(), "designation assigned twice");
            designation.taken_by = Some(actor);
            self.refresh(id);
        }
    }

    /// Return an incomplete designation to the unassigned pool.
    pub fn release(&mut self, id: DesignationId) {
        if let Some(designation) = self.designations.get_mut(&id) {
            designation.taken_by = None;
            self.refresh(id);
        }
    }

    /// Mark a designation complete for good: stop watching its tiles and
    /// detach it from its postrequisite. Returns the postrequisite's ID if
    /// this completion flipped it available.
    pub fn complete(&mut self, id: DesignationId, grid: &mut TileGrid) -> Option<DesignationId> {
        let Some(designation) = self.designations.get_mut(&id) else {
            return None;
        };
        let handle = designation.handle();
        designation.complete = true;
        designation.taken_by = None;
        let watched: SmallVec<[TilePos; 4]> = designation.access_points.clone();
        let post = designation.postrequisite;
        for pos in watched {
            grid.unregister_listener(pos, handle);
        }
        self.refresh(id);

        let post = post?;
        let was_available = self.is_available(post);
        if let Some(postreq) = self.designations.get_mut(&post) {
            postreq.prerequisites.remove(&id);
        }
        self.refresh(post);
        (!was_available && self.is_available(post)).then_some(post)
    }

    pub fn is_available(&self, id: DesignationId) -> bool {
        self.designations.get(&id).is_some_and(Designation::is_available)
    }

    /// Re-register every live designation's tile subscriptions and re-derive
    /// accessibility. Used when rebuilding the map after deserialization —
    /// the grid's listener registry is transient state.
    pub fn reattach_listeners(&mut self, grid: &mut TileGrid) {
        let ids: Vec<DesignationId> = self.designations.keys().copied().collect();
        for id in ids {
            let designation = self.designations.get_mut(&id).unwrap();
            if designation.complete {
                continue;
            }
            let handle = designation.handle();
            for &pos in &designation.access_points {
                grid.register_listener(pos, handle);
            }
            designation.accessible_points = designation
                .access_points
                .iter()
                .copied()
                .filter(|&pos| grid.is_walkable(pos))
                .collect();
            self.refresh(id);
        }
    }

    /// Re-derive one designation's bucket membership from its current state.
    fn refresh(&mut self, id: DesignationId) {
        let Some(designation) = self.designations.get(&id) else {
            return;
        };
        let job_type = designation.job_type.clone();
        if designation.is_available() {
            self.available.entry(job_type).or_default().insert(id);
        } else if let Some(bucket) = self.available.get_mut(&job_type) {
            bucket.remove(&id);
            if bucket.is_empty() {
                self.available.remove(&job_type);
            }
        }
    }
}

impl AccessObserver for DesignationManager {
    fn access_changed(&mut self, handle: AccessHandle, pos: TilePos, can_access: bool) {
        let id = id_of(handle);
        let Some(designation) = self.designations.get_mut(&id) else {
            return;
        };
        if can_access {
            if !designation.accessible_points.contains(&pos) {
                designation.accessible_points.push(pos);
            }
        } else {
            designation.accessible_points.retain(|&mut p| p != pos);
        }
        self.refresh(id);
    }
}
