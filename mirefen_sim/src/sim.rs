// Core simulation state and tick loop.
//
// `SimState` is the single source of truth for the whole colony: the
// walkability map and its consistency structures (owned via the grid
// crate's `TileMap`), every entity registry, the designation manager, the
// timed event scheduler, and the config. External code drives it through a
// small surface: `tick(delta)` advances time, spawn/designate calls add
// work and entities, `textures_at` is the pull-based render query.
//
// ## Scheduling
//
// The sim is a discrete event simulation. Every time-driven entity is keyed
// in `TimedEventManager` by the absolute tick of its next action. `tick`
// advances the clock to `total_time + delta * scale` and drains due entries
// in ascending key order, jumping the clock to each entry's due time as it
// is processed; empty stretches are free. An entity that acts decides its
// own next delay from the action it performed (idle recheck, one tile of
// movement, one unit of work) and is re-inserted. Idle actors stay
// scheduled — idle is a cheap no-op action, not an unscheduling event.
//
// ## Actor execution
//
// A visited actor delegates to its state stack (`states.rs`). The drain
// loop here pops finished frames (running their finish hooks), enters
// unentered frames, and ticks the top, repeating until the stack settles on
// an entered, unfinished, time-consuming state; that state's `ActionKind`
// is charged against the config to pick the actor's next wake-up. At most
// one time-consuming state is ticked per visit; zero-time bookkeeping
// states drain synchronously in the same visit. The loop is an explicit
// iteration so a deep finished cascade cannot recurse.
//
// The idle root scans the designation buckets (filtered by the actor's
// capable jobs and the area of the tile it stands on — an area-ID
// comparison is a constant-time reachability pre-check) and claims at most
// one designation, pushing a `SatisfyDesignation` coordinator that
// decomposes into move / work / carry children per designation kind.
//
// A move whose path cannot be computed (no route, or the node budget was
// exhausted) does not kill the actor or the designation: a `PathFailed`
// event is emitted and the designation goes back to the unassigned pool
// for another actor — or the same one, after a recheck interval — to try.
//
// ## Walkability mutation
//
// All walkability changes funnel through `TileMap::set_walkable` with the
// designation manager as the access observer, so edges, listeners, and
// areas update inside the same call. The sim layers one thing on top: the
// persisted base terrain. Entity blockers (standing resource nodes,
// completed blocking buildings) override terrain while they exist; felling
// or demolishing restores the base flag.
//
// ## Save/load
//
// `SimState` serializes with serde. The spatial structures (`TileMap`) and
// the pathfinder are `#[serde(skip)]` transients rebuilt by
// `rebuild_transient_state()` from the persisted terrain plus entity
// placement; designation tile subscriptions are re-registered in the same
// pass. `to_json`/`from_json` wrap the full cycle.
//
// See also: `scheduler.rs` for the timed queue, `designation.rs` for the
// availability protocol, `states.rs` for the stack frames, `event.rs` for
// what `StepResult` carries.
//
// **Critical constraint: determinism.** All registries are `BTreeMap`; the
// scheduler key order is total; the pathfinder breaks ties FIFO. Two sims
// given the same calls in the same order stay byte-identical.

use crate::actor::Actor;
use crate::building::{Building, BuildingState};
use crate::config::SimConfig;
use crate::designation::{Designation, DesignationKind, DesignationManager};
use crate::error::SimError;
use crate::event::{SimEvent, SimEventKind};
use crate::item::{Item, ItemLocation};
use crate::resource::ResourceNode;
use crate::scheduler::{TimedEventManager, TimedEventor};
use crate::states::{StateFrame, StateKind, StateStack};
use crate::template::TemplateLibrary;
use crate::types::{
    ActionKind, ActorId, BuildingId, DesignationId, ItemId, ResourceId, SimTime,
};
use mirefen_grid::map::TileMap;
use mirefen_grid::pathfind::{Pathfinder, SearchState};
use mirefen_grid::tile::{Direction, TilePos};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The result of advancing the simulation.
pub struct StepResult {
    /// Narrative events emitted since the previous step, for the UI log.
    pub events: Vec<SimEvent>,
}

/// Top-level simulation state. This is the entire colony.
#[derive(Debug, Serialize, Deserialize)]
pub struct SimState {
    pub config: SimConfig,
    pub width: u32,
    pub height: u32,
    /// Base terrain walkability, row-major. Entity blockers are applied on
    /// top of this when the map is (re)built.
    terrain: Vec<bool>,

    /// Current absolute simulation time, in ticks.
    pub total_time: SimTime,
    pub paused: bool,
    pub scale: u32,
    pub scheduler: TimedEventManager,

    pub actors: BTreeMap<ActorId, Actor>,
    pub items: BTreeMap<ItemId, Item>,
    pub buildings: BTreeMap<BuildingId, Building>,
    pub resources: BTreeMap<ResourceId, ResourceNode>,
    pub designations: DesignationManager,
    pub templates: TemplateLibrary,

    next_actor: u32,
    next_item: u32,
    next_building: u32,
    next_resource: u32,
    next_designation: u32,

    /// Events accumulated since the last `tick` returned.
    pending_events: Vec<SimEvent>,

    /// The walkability map and its consistency structures. Rebuilt from
    /// `terrain` + entity placement after deserialization.
    #[serde(skip)]
    pub map: TileMap,

    /// Shared reusable A* searcher. Pure scratch state.
    #[serde(skip)]
    pathfinder: Pathfinder,
}

impl SimState {
    /// A sim over an all-walkable `width × height` world with default
    /// config. Use `load_terrain` to replace the base terrain afterwards.
    pub fn new(width: u32, height: u32, templates: TemplateLibrary) -> Self {
        Self::with_config(width, height, templates, SimConfig::default())
    }

    pub fn with_config(
        width: u32,
        height: u32,
        templates: TemplateLibrary,
        config: SimConfig,
    ) -> Self {
        let scale = config.default_scale.max(1);
        let mut state = Self {
            terrain: vec![true; width as usize * height as usize],
            width,
            height,
            config,
            templates,
            total_time: 0,
            paused: false,
            scale,
            scheduler: TimedEventManager::new(),
            actors: BTreeMap::new(),
            items: BTreeMap::new(),
            buildings: BTreeMap::new(),
            resources: BTreeMap::new(),
            designations: DesignationManager::new(),
            next_actor: 0,
            next_item: 0,
            next_building: 0,
            next_resource: 0,
            next_designation: 0,
            pending_events: Vec::new(),
            map: TileMap::default(),
            pathfinder: Pathfinder::new(),
        };
        state.rebuild_transient_state();
        state
    }

    /// Replace the base terrain (row-major, `width * height` flags) and
    /// rebuild the derived spatial state.
    pub fn load_terrain(&mut self, walkable: &[bool]) {
        assert_eq!(
            walkable.len(),
            self.terrain.len(),
            "terrain flag count must match the world size"
        );
        self.terrain.copy_from_slice(walkable);
        self.rebuild_transient_state();
    }

    /// Rebuild the map, edge tracker, and area partition from the persisted
    /// terrain plus entity blockers, and re-register designation listeners.
    /// Called from the constructor and after deserialization.
    pub fn rebuild_transient_state(&mut self) {
        let mut map = TileMap::new(self.width, self.height);
        for y in 0..self.height as i32 {
            let start = y as usize * self.width as usize;
            map.load_row(y, &self.terrain[start..start + self.width as usize]);
        }
        for node in self.resources.values() {
            map.load_tile(node.position, false);
        }
        for building in self.buildings.values() {
            if building.is_complete() && building.blocks_walk {
                map.load_tile(building.position, false);
            }
        }
        map.bootstrap();
        self.map = map;
        self.designations.reattach_listeners(&mut self.map.grid);
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let mut state: Self = serde_json::from_str(json)?;
        state.rebuild_transient_state();
        Ok(state)
    }

    // -----------------------------------------------------------------------
    // Clock
    // -----------------------------------------------------------------------

    /// Advance simulated time by `delta * scale` ticks, processing every
    /// due entity in ascending due-time order. No-op while paused.
    pub fn tick(&mut self, delta: SimTime) -> StepResult {
        if self.paused {
            return StepResult { events: Vec::new() };
        }
        let target = self.total_time + delta * u64::from(self.scale);
        while let Some((due, eventor)) = self.scheduler.pop_due(target) {
            // The clock jumps to each event; everything an entity does is
            // stamped with its own due time, not the window end.
            self.total_time = due;
            match eventor {
                TimedEventor::Actor(id) => self.tick_actor(id),
                TimedEventor::Resource(id) => self.tick_resource(id),
            }
        }
        self.total_time = target;
        StepResult {
            events: std::mem::take(&mut self.pending_events),
        }
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    pub fn set_scale(&mut self, scale: u32) {
        self.scale = scale.max(1);
        self.push_event(SimEventKind::ScaleChanged { scale: self.scale });
    }

    // -----------------------------------------------------------------------
    // External entry points: terrain, spawning, designating
    // -----------------------------------------------------------------------

    /// Change the base terrain walkability of one tile, cascading through
    /// edges, designation listeners, and areas before returning. A tile
    /// held unwalkable by a standing entity stays blocked until the entity
    /// goes away.
    pub fn set_walkable(&mut self, pos: TilePos, walkable: bool) {
        let Some(index) = self.terrain_index(pos) else {
            return;
        };
        self.terrain[index] = walkable;
        let effective = walkable && !self.tile_blocked_by_entity(pos);
        self.map.set_walkable(pos, effective, &mut self.designations);
    }

    pub fn spawn_actor(&mut self, template: &str, pos: TilePos) -> Result<ActorId, SimError> {
        let template = self.templates.actor(template)?.clone();
        self.ensure_in_bounds(pos)?;
        if !self.map.is_walkable(pos) {
            return Err(SimError::NotWalkable { pos });
        }
        let id = ActorId(self.next_actor);
        self.next_actor += 1;
        let actor = Actor::spawn(id, &template, pos, self.config.move_ticks_per_tile);
        self.actors.insert(id, actor);
        // First visit one tick out, so a freshly spawned actor looks for
        // work immediately instead of after a full idle interval.
        self.scheduler
            .start(TimedEventor::Actor(id), self.total_time + 1);
        self.push_event(SimEventKind::ActorSpawned {
            actor: id,
            template: template.name,
        });
        Ok(id)
    }

    pub fn spawn_item(&mut self, template: &str, pos: TilePos) -> Result<ItemId, SimError> {
        self.ensure_in_bounds(pos)?;
        self.create_item(template, pos)
    }

    /// Place a full resource node, blocking its tile.
    pub fn spawn_resource(&mut self, template: &str, pos: TilePos) -> Result<ResourceId, SimError> {
        let template = self.templates.resource(template)?.clone();
        self.ensure_in_bounds(pos)?;
        if self.tile_occupied(pos) {
            return Err(SimError::Occupied { pos });
        }
        let id = ResourceId(self.next_resource);
        self.next_resource += 1;
        self.resources.insert(
            id,
            ResourceNode {
                id,
                template: template.name,
                texture: template.texture,
                position: pos,
                material: template.max_material,
                max_material: template.max_material,
                yield_item: template.yield_item,
                job_type: template.job_type,
            },
        );
        self.map.set_walkable(pos, false, &mut self.designations);
        Ok(id)
    }

    /// Place a construction site and publish its build designation, worked
    /// from any adjacent tile.
    pub fn start_construction(
        &mut self,
        template: &str,
        pos: TilePos,
    ) -> Result<BuildingId, SimError> {
        let template = self.templates.building(template)?.clone();
        self.ensure_in_bounds(pos)?;
        if self.tile_occupied(pos) {
            return Err(SimError::Occupied { pos });
        }
        let id = BuildingId(self.next_building);
        self.next_building += 1;
        self.buildings.insert(
            id,
            Building {
                id,
                template: template.name,
                texture: template.texture,
                position: pos,
                state: BuildingState::Site {
                    progress: 0,
                    required: template.build_work.max(1),
                },
                blocks_walk: template.blocks_walk,
            },
        );
        self.push_event(SimEventKind::ConstructionStarted { building: id });
        let access = self.map.grid.neighbors(pos).into_vec();
        self.create_designation("build", DesignationKind::Construct { site: id }, &access);
        Ok(id)
    }

    /// Publish a harvest designation for a resource node, worked from any
    /// adjacent tile. Repeatable: the designation returns to the pool after
    /// each unit until the node is exhausted.
    pub fn designate_harvest(&mut self, resource: ResourceId) -> Result<DesignationId, SimError> {
        let Some(node) = self.resources.get(&resource) else {
            return Err(SimError::NoSuchResource(resource));
        };
        let (pos, job_type) = (node.position, node.job_type.clone());
        let access = self.map.grid.neighbors(pos).into_vec();
        Ok(self.create_designation(&job_type, DesignationKind::Harvest { target: resource }, &access))
    }

    /// Publish a transport designation: carry `item` to `destination`.
    pub fn designate_transport(
        &mut self,
        item: ItemId,
        destination: TilePos,
    ) -> Result<DesignationId, SimError> {
        self.ensure_in_bounds(destination)?;
        let Some(found) = self.items.get(&item) else {
            return Err(SimError::NoSuchItem(item));
        };
        let Some(pos) = found.ground_position() else {
            return Err(SimError::ItemNotOnGround(item));
        };
        Ok(self.create_designation(
            "haul",
            DesignationKind::Transport { item, destination },
            &[pos],
        ))
    }

    /// Make `post` wait for `pre` to complete before becoming available.
    pub fn link_designations(&mut self, pre: DesignationId, post: DesignationId) {
        self.designations.link(pre, post);
    }

    /// Withdraw a designation before it finishes. The claimed worker, if
    /// any, abandons the task in place — a carried item goes down where the
    /// worker stands. Cancelling an unknown or already-finished designation
    /// is a silent no-op.
    pub fn cancel_designation(&mut self, designation: DesignationId) {
        let Some(found) = self.designations.get(designation) else {
            return;
        };
        if found.complete {
            return;
        }
        let worker = found.taken_by;
        self.designations.complete(designation, &mut self.map.grid);
        self.push_event(SimEventKind::DesignationCancelled { designation });
        if let Some(worker) = worker {
            self.interrupt_worker(worker);
        }
    }

    /// Remove a building — a site under construction or a completed
    /// structure. A blocking building's tile reverts to the base terrain
    /// through the full cascade, and a site's pending build designation is
    /// cancelled. Unknown buildings are a silent no-op.
    pub fn demolish_building(&mut self, building: BuildingId) {
        let Some(removed) = self.buildings.remove(&building) else {
            return;
        };
        self.push_event(SimEventKind::BuildingRemoved { building });
        if removed.is_complete() && removed.blocks_walk {
            let base = self.base_walkable(removed.position);
            self.map
                .set_walkable(removed.position, base, &mut self.designations);
        }
        let pending: Vec<DesignationId> = self
            .designations
            .iter()
            .filter(|d| !d.complete && d.kind == DesignationKind::Construct { site: building })
            .map(|d| d.id)
            .collect();
        for designation in pending {
            self.cancel_designation(designation);
        }
    }

    /// The ordered texture stack to draw at one tile: ground, then
    /// building, resource node, actors, and items on the ground.
    pub fn textures_at(&self, pos: TilePos) -> Vec<&str> {
        if !self.map.grid.in_bounds(pos) {
            return Vec::new();
        }
        let mut textures = vec![self.config.default_ground_texture.as_str()];
        textures.extend(
            self.buildings
                .values()
                .filter(|b| b.position == pos)
                .map(|b| b.texture.as_str()),
        );
        textures.extend(
            self.resources
                .values()
                .filter(|n| n.position == pos)
                .map(|n| n.texture.as_str()),
        );
        textures.extend(
            self.actors
                .values()
                .filter(|a| a.position == pos)
                .map(|a| a.texture.as_str()),
        );
        textures.extend(
            self.items
                .values()
                .filter(|i| i.ground_position() == Some(pos))
                .map(|i| i.texture.as_str()),
        );
        textures
    }

    // -----------------------------------------------------------------------
    // Scheduled entity processing
    // -----------------------------------------------------------------------

    /// One scheduler visit of an actor: drain its state stack to the next
    /// time-consuming state and reschedule after that action's duration.
    fn tick_actor(&mut self, id: ActorId) {
        let Some(actor) = self.actors.get_mut(&id) else {
            return;
        };
        // Detach the stack so the drain loop can borrow the rest of the sim
        // freely while it runs frames.
        let mut stack = std::mem::take(&mut actor.stack);
        let action = self.drain_stack(id, &mut stack);
        if let Some(actor) = self.actors.get_mut(&id) {
            actor.stack = stack;
        }
        let delay = self.action_delay(id, action).max(1);
        self.scheduler
            .start(TimedEventor::Actor(id), self.total_time + delay);
    }

    /// One regrowth heartbeat of a resource node. Reschedules itself while
    /// the node has room to regrow; a full or felled node goes quiet.
    fn tick_resource(&mut self, id: ResourceId) {
        let Some(node) = self.resources.get_mut(&id) else {
            return;
        };
        if node.regrow_unit() {
            self.scheduler.start(
                TimedEventor::Resource(id),
                self.total_time + self.config.resource_regrow_ticks,
            );
        }
    }

    /// Ticks charged for the action an actor's stack settled on.
    fn action_delay(&self, id: ActorId, action: ActionKind) -> u64 {
        match action {
            ActionKind::Idle => self.config.idle_recheck_ticks,
            ActionKind::Move => self
                .actors
                .get(&id)
                .map_or(self.config.move_ticks_per_tile, |a| a.move_ticks),
            ActionKind::Work => {
                let job_type = self
                    .actors
                    .get(&id)
                    .and_then(|a| a.designation)
                    .and_then(|did| self.designations.get(did))
                    .map(|d| d.job_type.clone());
                match job_type {
                    Some(job_type) => self.config.work_duration(&job_type),
                    None => self.config.default_work_ticks,
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // State stack drain loop
    // -----------------------------------------------------------------------

    /// Run the stack until it settles on an entered, unfinished,
    /// time-consuming state, and return that state's action. At most one
    /// time-consuming state is ticked per visit; zero-time states drain
    /// here without consuming scheduler time.
    fn drain_stack(&mut self, id: ActorId, stack: &mut StateStack) -> ActionKind {
        let mut ticked_timed = false;
        let mut settle = 0u32;
        loop {
            settle += 1;
            assert!(settle < 256, "state stack failed to settle for {id}");

            if stack.top().finished {
                let frame = stack.pop();
                self.on_finish(id, frame);
                continue;
            }
            if !stack.top().entered {
                stack.top_mut().entered = true;
                self.enter_state(id, stack);
                let top = stack.top();
                if !top.finished && top.kind.requires_time() {
                    return top.kind.action_kind();
                }
                continue;
            }
            let requires_time = stack.top().kind.requires_time();
            if requires_time && ticked_timed {
                return stack.top().kind.action_kind();
            }
            ticked_timed |= requires_time;
            self.tick_state(id, stack);
        }
    }

    /// Enter hook. Only moves do real work here: the path is computed once,
    /// when the state first lands on top of the stack.
    fn enter_state(&mut self, id: ActorId, stack: &mut StateStack) {
        let StateKind::Move { goals, .. } = &stack.top().kind else {
            return;
        };
        let goals = goals.clone();
        if goals.is_empty() {
            self.abort_task(id, stack);
            return;
        }
        let start = self.actors[&id].position;
        self.pathfinder.new_search(
            &self.map.grid,
            start,
            &goals,
            self.config.pathfinder_node_budget,
        );
        match self.pathfinder.run_to_completion(&self.map.grid) {
            SearchState::Succeeded => {
                let path = self.pathfinder.final_result();
                let finished = path.is_empty();
                let top = stack.top_mut();
                top.kind = StateKind::Move {
                    goals,
                    path,
                    next: 0,
                };
                top.finished = finished;
            }
            // Failed and OutOfMemory are handled identically: this move
            // cannot proceed, so the task chain dies and the designation
            // goes back to the pool.
            _ => {
                self.report_path_failure(id);
                self.abort_task(id, stack);
            }
        }
    }

    fn report_path_failure(&mut self, id: ActorId) {
        if let Some(designation) = self.actors.get(&id).and_then(|a| a.designation) {
            self.push_event(SimEventKind::PathFailed {
                actor: id,
                designation,
            });
        }
    }

    /// Finish hook, run as a finished frame is popped.
    fn on_finish(&mut self, id: ActorId, frame: StateFrame) {
        if matches!(frame.kind, StateKind::SatisfyDesignation { .. }) {
            if let Some(actor) = self.actors.get_mut(&id) {
                actor.designation = None;
            }
        }
    }

    /// Tick the entered top frame once.
    fn tick_state(&mut self, id: ActorId, stack: &mut StateStack) {
        let kind = stack.top().kind.clone();
        match kind {
            StateKind::Idle => self.tick_idle(id, stack),
            StateKind::SatisfyDesignation { designation, phase } => {
                self.tick_satisfy(id, stack, designation, phase);
            }
            StateKind::Move { goals, path, next } => {
                self.tick_move(id, stack, goals, path, next);
            }
            StateKind::PerformJob { designation } => {
                if self.apply_work_unit(id, designation) {
                    stack.top_mut().finished = true;
                }
            }
            StateKind::PickUpItem { item } => {
                let pos = self.actors[&id].position;
                let on_tile = self
                    .items
                    .get(&item)
                    .is_some_and(|found| found.location == ItemLocation::OnGround(pos));
                if on_tile {
                    self.items.get_mut(&item).unwrap().location = ItemLocation::Held(id);
                    self.actors.get_mut(&id).unwrap().held_item = Some(item);
                    stack.top_mut().finished = true;
                } else {
                    // The item is not where the claim found it; this carry
                    // cannot proceed.
                    self.abort_task(id, stack);
                }
            }
            StateKind::PlaceItem => {
                let pos = self.actors[&id].position;
                if let Some(held) = self.actors.get_mut(&id).unwrap().held_item.take() {
                    if let Some(found) = self.items.get_mut(&held) {
                        found.location = ItemLocation::OnGround(pos);
                    }
                }
                stack.top_mut().finished = true;
            }
        }
    }

    /// The idle scan: claim at most one available designation matching the
    /// actor's capable jobs whose access shares the actor's area.
    fn tick_idle(&mut self, id: ActorId, stack: &mut StateStack) {
        let actor = &self.actors[&id];
        let jobs = actor.capable_jobs.clone();
        let area = self.map.area_of(actor.position);
        if let Some(designation) = self.designations.claim_candidate(&jobs, area, &self.map.grid) {
            self.designations.assign(designation, id);
            self.actors.get_mut(&id).unwrap().designation = Some(designation);
            stack.push(StateKind::SatisfyDesignation {
                designation,
                phase: 0,
            });
        }
    }

    /// Advance a claimed designation's coordinator by one phase, pushing
    /// the next child state. Zero-time: a whole phase transition happens
    /// within one scheduler visit.
    fn tick_satisfy(
        &mut self,
        id: ActorId,
        stack: &mut StateStack,
        designation: DesignationId,
        phase: u8,
    ) {
        let Some(found) = self.designations.get(designation) else {
            stack.top_mut().finished = true;
            return;
        };
        if found.complete || found.taken_by != Some(id) {
            // Cancelled or reassigned under us; abandon quietly.
            stack.top_mut().finished = true;
            return;
        }
        let kind = found.kind.clone();
        let accessible: Vec<TilePos> = found.accessible_points.to_vec();

        let advance = |stack: &mut StateStack, phase: u8| {
            stack.top_mut().kind = StateKind::SatisfyDesignation { designation, phase };
        };

        match kind {
            DesignationKind::Harvest { .. } | DesignationKind::Construct { .. } => match phase {
                0 => {
                    advance(stack, 1);
                    stack.push(StateKind::Move {
                        goals: accessible,
                        path: Vec::new(),
                        next: 0,
                    });
                }
                1 => {
                    advance(stack, 2);
                    stack.push(StateKind::PerformJob { designation });
                }
                _ => {
                    self.finish_designation(designation);
                    stack.top_mut().finished = true;
                }
            },
            DesignationKind::Transport { item, destination } => match phase {
                0 => {
                    advance(stack, 1);
                    stack.push(StateKind::Move {
                        goals: accessible,
                        path: Vec::new(),
                        next: 0,
                    });
                }
                1 => {
                    advance(stack, 2);
                    stack.push(StateKind::PickUpItem { item });
                }
                2 => {
                    advance(stack, 3);
                    stack.push(StateKind::Move {
                        goals: vec![destination],
                        path: Vec::new(),
                        next: 0,
                    });
                }
                3 => {
                    advance(stack, 4);
                    stack.push(StateKind::PlaceItem);
                }
                _ => {
                    self.finish_designation(designation);
                    stack.top_mut().finished = true;
                }
            },
        }
    }

    /// Consume one step of a computed path. If the next tile went
    /// unwalkable mid-walk, re-plan to the same goals; if no route remains,
    /// the task chain dies.
    fn tick_move(
        &mut self,
        id: ActorId,
        stack: &mut StateStack,
        goals: Vec<TilePos>,
        path: Vec<Direction>,
        next: usize,
    ) {
        if next >= path.len() {
            stack.top_mut().finished = true;
            return;
        }
        let pos = self.actors[&id].position;
        let target = pos.step(path[next]);
        if self.map.is_walkable(target) {
            self.actors.get_mut(&id).unwrap().position = target;
            let arrived = next + 1 >= path.len();
            let top = stack.top_mut();
            top.kind = StateKind::Move {
                goals,
                path,
                next: next + 1,
            };
            top.finished = arrived;
            return;
        }

        // The world changed under the path; plan again from here.
        self.pathfinder.new_search(
            &self.map.grid,
            pos,
            &goals,
            self.config.pathfinder_node_budget,
        );
        if self.pathfinder.run_to_completion(&self.map.grid) != SearchState::Succeeded {
            self.report_path_failure(id);
            self.abort_task(id, stack);
            return;
        }
        let path = self.pathfinder.final_result();
        if path.is_empty() {
            stack.top_mut().finished = true;
            return;
        }
        let target = pos.step(path[0]);
        self.actors.get_mut(&id).unwrap().position = target;
        let arrived = path.len() == 1;
        let top = stack.top_mut();
        top.kind = StateKind::Move {
            goals,
            path,
            next: 1,
        };
        top.finished = arrived;
    }

    /// One work visit at a designation. Returns `true` when the work state
    /// is done and the coordinator should take over again.
    fn apply_work_unit(&mut self, id: ActorId, designation: DesignationId) -> bool {
        let Some(found) = self.designations.get(designation) else {
            return true;
        };
        match found.kind.clone() {
            DesignationKind::Harvest { target } => {
                let Some(node) = self.resources.get_mut(&target) else {
                    return true;
                };
                let exhausted = node.harvest_unit();
                let yield_item = node.yield_item.clone();
                let node_pos = node.position;
                let worker_pos = self.actors[&id].position;
                self.create_item(&yield_item, worker_pos)
                    .expect("resource yield references an unknown item template");
                if exhausted {
                    // Felled: the node leaves the world and its tile reverts
                    // to the base terrain through the full cascade.
                    self.scheduler.stop(&TimedEventor::Resource(target));
                    self.resources.remove(&target);
                    let base = self.base_walkable(node_pos);
                    self.map.set_walkable(node_pos, base, &mut self.designations);
                    self.push_event(SimEventKind::ResourceDepleted { resource: target });
                } else if !self.scheduler.contains(&TimedEventor::Resource(target)) {
                    self.scheduler.start(
                        TimedEventor::Resource(target),
                        self.total_time + self.config.resource_regrow_ticks,
                    );
                }
                true
            }
            DesignationKind::Construct { site } => {
                let Some(building) = self.buildings.get_mut(&site) else {
                    return true;
                };
                let completed = building.add_work_unit();
                if completed {
                    let pos = building.position;
                    let blocks = building.blocks_walk;
                    self.push_event(SimEventKind::ConstructionCompleted { building: site });
                    if blocks {
                        self.map.set_walkable(pos, false, &mut self.designations);
                    }
                }
                completed
            }
            // Transport has no work state; carrying is done by the
            // pick-up/place children.
            DesignationKind::Transport { .. } => true,
        }
    }

    /// A claimed designation's work has run: repeatable designations go
    /// back to the pool, everything else completes for good.
    fn finish_designation(&mut self, designation: DesignationId) {
        let Some(found) = self.designations.get(designation) else {
            return;
        };
        let repeatable = match found.kind {
            DesignationKind::Harvest { target } => self
                .resources
                .get(&target)
                .is_some_and(|node| node.material > 0),
            _ => false,
        };
        if repeatable {
            self.designations.release(designation);
            self.push_event(SimEventKind::DesignationReleased { designation });
        } else {
            self.designations.complete(designation, &mut self.map.grid);
            self.push_event(SimEventKind::DesignationCompleted { designation });
        }
    }

    /// Kill the current task chain: a carried item goes down where the
    /// actor stands, the designation returns to the pool, and the actor
    /// falls back to idle.
    fn abort_task(&mut self, id: ActorId, stack: &mut StateStack) {
        let pos = self.actors[&id].position;
        let held = self.actors.get_mut(&id).unwrap().held_item.take();
        let designation = self.actors.get_mut(&id).and_then(|a| a.designation.take());
        if let Some(held) = held {
            if let Some(found) = self.items.get_mut(&held) {
                found.location = ItemLocation::OnGround(pos);
            }
            // A transport follows its item: the next claimant starts from
            // the drop tile, not the original pickup tile.
            if let Some(d) = designation {
                let carries_it = matches!(
                    self.designations.get(d).map(|found| &found.kind),
                    Some(DesignationKind::Transport { item, .. }) if *item == held
                );
                if carries_it {
                    self.designations.set_access_points(d, &[pos], &mut self.map.grid);
                }
            }
        }
        if let Some(designation) = designation {
            self.designations.release(designation);
            self.push_event(SimEventKind::DesignationReleased { designation });
        }
        stack.truncate_to_root();
    }

    /// A cancelled designation's worker abandons in place: dropped item,
    /// cleared claim, stack back to the idle root. The worker stays
    /// scheduled and picks new work at its next visit.
    fn interrupt_worker(&mut self, id: ActorId) {
        let Some(actor) = self.actors.get_mut(&id) else {
            return;
        };
        actor.designation = None;
        let pos = actor.position;
        let held = actor.held_item.take();
        actor.stack.truncate_to_root();
        if let Some(held) = held {
            if let Some(found) = self.items.get_mut(&held) {
                found.location = ItemLocation::OnGround(pos);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn create_item(&mut self, template: &str, pos: TilePos) -> Result<ItemId, SimError> {
        let template = self.templates.item(template)?.clone();
        let id = ItemId(self.next_item);
        self.next_item += 1;
        self.items.insert(
            id,
            Item {
                id,
                template: template.name.clone(),
                texture: template.texture,
                location: ItemLocation::OnGround(pos),
            },
        );
        self.push_event(SimEventKind::ItemSpawned {
            item: id,
            template: template.name,
        });
        Ok(id)
    }

    fn create_designation(
        &mut self,
        job_type: &str,
        kind: DesignationKind,
        access: &[TilePos],
    ) -> DesignationId {
        let id = DesignationId(self.next_designation);
        self.next_designation += 1;
        let mut designation = Designation::new(id, job_type, kind);
        designation.access_points = access.iter().copied().collect();
        self.designations.insert(designation, &mut self.map.grid);
        self.push_event(SimEventKind::DesignationCreated {
            designation: id,
            job_type: job_type.to_string(),
        });
        id
    }

    fn push_event(&mut self, kind: SimEventKind) {
        self.pending_events.push(SimEvent {
            time: self.total_time,
            kind,
        });
    }

    fn ensure_in_bounds(&self, pos: TilePos) -> Result<(), SimError> {
        if self.map.grid.in_bounds(pos) {
            Ok(())
        } else {
            Err(SimError::OutOfBounds {
                pos,
                width: self.width,
                height: self.height,
            })
        }
    }

    fn terrain_index(&self, pos: TilePos) -> Option<usize> {
        self.map
            .grid
            .in_bounds(pos)
            .then(|| pos.x as usize + pos.y as usize * self.width as usize)
    }

    fn base_walkable(&self, pos: TilePos) -> bool {
        self.terrain_index(pos).is_some_and(|i| self.terrain[i])
    }

    fn tile_occupied(&self, pos: TilePos) -> bool {
        self.resources.values().any(|n| n.position == pos)
            || self.buildings.values().any(|b| b.position == pos)
    }

    fn tile_blocked_by_entity(&self, pos: TilePos) -> bool {
        self.resources.values().any(|n| n.position == pos)
            || self
                .buildings
                .values()
                .any(|b| b.position == pos && b.is_complete() && b.blocks_walk)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::{ActorTemplate, BuildingTemplate, ItemTemplate, ResourceTemplate};

    fn library() -> TemplateLibrary {
        let mut templates = TemplateLibrary::new();
        templates.register_actor(ActorTemplate {
            name: "bog_drover".to_string(),
            texture: "actor_bog_drover".to_string(),
            capable_jobs: vec!["chop".to_string(), "build".to_string(), "haul".to_string()],
            move_ticks_override: None,
        });
        templates.register_item(ItemTemplate {
            name: "willow_log".to_string(),
            texture: "item_willow_log".to_string(),
        });
        templates.register_building(BuildingTemplate {
            name: "reed_hut".to_string(),
            texture: "building_reed_hut".to_string(),
            blocks_walk: true,
            build_work: 2,
        });
        templates.register_resource(ResourceTemplate {
            name: "willow".to_string(),
            texture: "resource_willow".to_string(),
            max_material: 5,
            yield_item: "willow_log".to_string(),
            job_type: "chop".to_string(),
        });
        templates
    }

    fn sim(width: u32, height: u32) -> SimState {
        SimState::new(width, height, library())
    }

    fn kinds(events: &[SimEvent]) -> Vec<&SimEventKind> {
        events.iter().map(|e| &e.kind).collect()
    }

    #[test]
    fn unknown_templates_are_fatal_at_spawn() {
        let mut sim = sim(4, 4);
        assert!(matches!(
            sim.spawn_actor("marsh_wisp", TilePos::new(0, 0)),
            Err(SimError::UnknownTemplate { kind: "actor", .. })
        ));
        assert!(matches!(
            sim.start_construction("palace", TilePos::new(1, 1)),
            Err(SimError::UnknownTemplate { kind: "building", .. })
        ));
        assert!(sim.actors.is_empty());
        assert!(sim.buildings.is_empty());
    }

    #[test]
    fn spawn_validations() {
        let mut sim = sim(4, 4);
        assert!(matches!(
            sim.spawn_actor("bog_drover", TilePos::new(9, 0)),
            Err(SimError::OutOfBounds { .. })
        ));
        sim.set_walkable(TilePos::new(1, 1), false);
        assert!(matches!(
            sim.spawn_actor("bog_drover", TilePos::new(1, 1)),
            Err(SimError::NotWalkable { .. })
        ));

        let resource = sim.spawn_resource("willow", TilePos::new(2, 2)).unwrap();
        assert!(matches!(
            sim.start_construction("reed_hut", TilePos::new(2, 2)),
            Err(SimError::Occupied { .. })
        ));
        assert!(!sim.map.is_walkable(TilePos::new(2, 2)));
        assert!(sim.resources.contains_key(&resource));
    }

    #[test]
    fn paused_tick_is_a_noop() {
        let mut sim = sim(4, 4);
        sim.spawn_actor("bog_drover", TilePos::new(0, 0)).unwrap();
        sim.set_paused(true);
        let result = sim.tick(5000);
        assert!(result.events.is_empty());
        assert_eq!(sim.total_time, 0);

        sim.set_paused(false);
        sim.tick(10);
        assert_eq!(sim.total_time, 10);
    }

    #[test]
    fn scale_multiplies_advancement() {
        let mut sim = sim(4, 4);
        sim.set_scale(3);
        sim.tick(100);
        assert_eq!(sim.total_time, 300);
    }

    #[test]
    fn idle_actor_stays_scheduled_forever() {
        let mut sim = sim(4, 4);
        let actor = sim.spawn_actor("bog_drover", TilePos::new(1, 1)).unwrap();
        // Many idle intervals with no work anywhere.
        sim.tick(20 * sim.config.idle_recheck_ticks);
        assert!(sim.scheduler.contains(&TimedEventor::Actor(actor)));
        assert_eq!(sim.actors[&actor].position, TilePos::new(1, 1));
        assert!(sim.actors[&actor].stack.is_idle());
    }

    #[test]
    fn colliding_actors_both_get_ticked() {
        let mut sim = sim(6, 6);
        // Both spawn at time 0, so both are scheduled at tick 1 — a key
        // collision the scheduler must resolve without dropping either.
        let a = sim.spawn_actor("bog_drover", TilePos::new(0, 0)).unwrap();
        let b = sim.spawn_actor("bog_drover", TilePos::new(5, 5)).unwrap();
        sim.tick(3 * sim.config.idle_recheck_ticks);
        assert!(sim.scheduler.contains(&TimedEventor::Actor(a)));
        assert!(sim.scheduler.contains(&TimedEventor::Actor(b)));
        assert_eq!(sim.scheduler.len(), 2);
    }

    #[test]
    fn idle_actor_claims_work_and_walks_to_it() {
        let mut sim = sim(6, 1);
        let actor = sim.spawn_actor("bog_drover", TilePos::new(0, 0)).unwrap();
        let resource = sim.spawn_resource("willow", TilePos::new(3, 0)).unwrap();
        let designation = sim.designate_harvest(resource).unwrap();

        // One tick: the actor claims the designation and plans its move.
        sim.tick(1);
        assert_eq!(sim.actors[&actor].designation, Some(designation));
        assert!(!sim.actors[&actor].stack.is_idle());
        assert!(matches!(
            sim.actors[&actor].stack.top().kind,
            StateKind::Move { .. }
        ));
        assert!(!sim.designations.is_available(designation));

        // Two move intervals later the actor stands at the access tile.
        sim.tick(2 * sim.config.move_ticks_per_tile);
        assert_eq!(sim.actors[&actor].position, TilePos::new(2, 0));
    }

    #[test]
    fn harvest_runs_to_depletion_and_unblocks_the_tile() {
        let mut sim = sim(6, 1);
        let actor = sim.spawn_actor("bog_drover", TilePos::new(0, 0)).unwrap();
        let node_pos = TilePos::new(3, 0);
        let resource = sim.spawn_resource("willow", node_pos).unwrap();
        let designation = sim.designate_harvest(resource).unwrap();
        assert!(!sim.map.is_walkable(node_pos));

        // Walk (2 × 500) + 5 work units (5 × 2000) + idle rechecks between
        // repeats; 20_000 ticks is comfortable.
        let result = sim.tick(20_000);

        assert!(!sim.resources.contains_key(&resource));
        assert_eq!(sim.items.len(), 5);
        assert!(sim
            .items
            .values()
            .all(|i| i.location == ItemLocation::OnGround(TilePos::new(2, 0))));
        assert!(sim.designations.get(designation).unwrap().complete);
        assert_eq!(sim.actors[&actor].designation, None);
        assert!(sim.actors[&actor].stack.is_idle());

        // The felled node's tile reverts to base terrain and rejoins the
        // walkable region.
        assert!(sim.map.is_walkable(node_pos));
        assert_eq!(
            sim.map.area_of(node_pos),
            sim.map.area_of(TilePos::new(0, 0))
        );

        let kinds = kinds(&result.events);
        assert!(kinds
            .iter()
            .any(|k| matches!(k, SimEventKind::ResourceDepleted { resource: r } if *r == resource)));
        assert!(kinds
            .iter()
            .any(|k| matches!(k, SimEventKind::DesignationCompleted { designation: d } if *d == designation)));
        // Four repeat releases before the final completion.
        let releases = kinds
            .iter()
            .filter(|k| matches!(k, SimEventKind::DesignationReleased { .. }))
            .count();
        assert_eq!(releases, 4);
    }

    #[test]
    fn construction_completes_and_blocks_its_tile() {
        let mut sim = sim(5, 5);
        sim.spawn_actor("bog_drover", TilePos::new(0, 0)).unwrap();
        let site_pos = TilePos::new(2, 0);
        let building = sim.start_construction("reed_hut", site_pos).unwrap();
        // A site does not block movement while under construction.
        assert!(sim.map.is_walkable(site_pos));

        let result = sim.tick(10_000);

        assert!(sim.buildings[&building].is_complete());
        assert!(!sim.map.is_walkable(site_pos));
        let kinds = kinds(&result.events);
        assert!(kinds
            .iter()
            .any(|k| matches!(k, SimEventKind::ConstructionCompleted { building: b } if *b == building)));
        // The worker stands beside the finished building, not inside it.
        let worker = sim.actors.values().next().unwrap();
        assert_ne!(worker.position, site_pos);
    }

    #[test]
    fn transport_carries_an_item_to_its_destination() {
        let mut sim = sim(5, 5);
        let actor = sim.spawn_actor("bog_drover", TilePos::new(0, 0)).unwrap();
        let item = sim.spawn_item("willow_log", TilePos::new(3, 0)).unwrap();
        let destination = TilePos::new(0, 3);
        let designation = sim.designate_transport(item, destination).unwrap();

        sim.tick(10_000);

        assert_eq!(sim.items[&item].location, ItemLocation::OnGround(destination));
        assert_eq!(sim.actors[&actor].held_item, None);
        assert_eq!(sim.actors[&actor].position, destination);
        assert!(sim.designations.get(designation).unwrap().complete);
    }

    #[test]
    fn transport_designation_validations() {
        let mut sim = sim(5, 5);
        assert!(matches!(
            sim.designate_transport(ItemId(42), TilePos::new(1, 1)),
            Err(SimError::NoSuchItem(_))
        ));
        let item = sim.spawn_item("willow_log", TilePos::new(2, 2)).unwrap();
        assert!(matches!(
            sim.designate_transport(item, TilePos::new(9, 9)),
            Err(SimError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn cancel_frees_the_worker_immediately() {
        let mut sim = sim(6, 1);
        let actor = sim.spawn_actor("bog_drover", TilePos::new(0, 0)).unwrap();
        let resource = sim.spawn_resource("willow", TilePos::new(3, 0)).unwrap();
        let designation = sim.designate_harvest(resource).unwrap();
        sim.tick(1);
        assert_eq!(sim.actors[&actor].designation, Some(designation));

        sim.cancel_designation(designation);
        assert!(sim.actors[&actor].stack.is_idle());
        assert_eq!(sim.actors[&actor].designation, None);
        assert!(sim.designations.get(designation).unwrap().complete);
        assert!(!sim.designations.is_available(designation));

        // Cancelling again is a silent no-op; nothing re-claims the
        // withdrawn work.
        sim.cancel_designation(designation);
        let result = sim.tick(5 * sim.config.idle_recheck_ticks);
        let cancellations = kinds(&result.events)
            .iter()
            .filter(|k| matches!(k, SimEventKind::DesignationCancelled { .. }))
            .count();
        assert_eq!(cancellations, 1);
        assert!(sim.actors[&actor].stack.is_idle());
        assert_eq!(sim.resources[&resource].material, 5);
    }

    #[test]
    fn cancelled_transport_drops_the_carried_item() {
        let mut sim = sim(5, 5);
        let actor = sim.spawn_actor("bog_drover", TilePos::new(0, 0)).unwrap();
        let item = sim.spawn_item("willow_log", TilePos::new(2, 0)).unwrap();
        let designation = sim.designate_transport(item, TilePos::new(0, 4)).unwrap();

        // Claim, walk two tiles, pick the item up.
        sim.tick(1 + 2 * sim.config.move_ticks_per_tile);
        assert_eq!(sim.actors[&actor].held_item, Some(item));

        sim.cancel_designation(designation);
        assert_eq!(sim.actors[&actor].held_item, None);
        assert_eq!(
            sim.items[&item].location,
            ItemLocation::OnGround(TilePos::new(2, 0))
        );
        assert!(sim.actors[&actor].stack.is_idle());
    }

    #[test]
    fn moved_item_aborts_the_transport() {
        let mut sim = sim(6, 1);
        let actor = sim.spawn_actor("bog_drover", TilePos::new(0, 0)).unwrap();
        let item = sim.spawn_item("willow_log", TilePos::new(3, 0)).unwrap();
        let designation = sim.designate_transport(item, TilePos::new(5, 0)).unwrap();
        sim.tick(1);

        // The item vanishes from its tile while the hauler is en route.
        sim.items.get_mut(&item).unwrap().location =
            ItemLocation::OnGround(TilePos::new(5, 0));
        sim.tick(4 * sim.config.move_ticks_per_tile);

        // Arrived to find nothing: the claim goes back into the pool.
        assert!(sim.designations.is_available(designation));
        assert_eq!(sim.actors[&actor].designation, None);
        assert_eq!(sim.actors[&actor].held_item, None);
    }

    #[test]
    fn demolish_site_cancels_its_designation() {
        let mut sim = sim(5, 5);
        let site = sim.start_construction("reed_hut", TilePos::new(2, 2)).unwrap();
        let build = sim.designations.available_for("build").next().unwrap();

        sim.demolish_building(site);
        assert!(sim.buildings.is_empty());
        assert!(sim.designations.get(build).unwrap().complete);
        assert_eq!(sim.designations.available_for("build").count(), 0);
    }

    #[test]
    fn demolish_completed_building_unblocks_its_tile() {
        let mut sim = sim(5, 5);
        sim.spawn_actor("bog_drover", TilePos::new(0, 0)).unwrap();
        let site_pos = TilePos::new(2, 0);
        let building = sim.start_construction("reed_hut", site_pos).unwrap();
        sim.tick(10_000);
        assert!(!sim.map.is_walkable(site_pos));

        sim.demolish_building(building);
        assert!(sim.buildings.is_empty());
        assert!(sim.map.is_walkable(site_pos));
        assert_eq!(
            sim.map.area_of(site_pos),
            sim.map.area_of(TilePos::new(0, 0))
        );
        // Demolishing it again is harmless.
        sim.demolish_building(building);
    }

    #[test]
    fn failed_route_releases_the_designation() {
        // Node budget of zero: every search reports OutOfMemory, which the
        // mover treats like any unreachable goal.
        let config = SimConfig {
            pathfinder_node_budget: 0,
            ..SimConfig::default()
        };
        let mut sim = SimState::with_config(6, 1, library(), config);
        let actor = sim.spawn_actor("bog_drover", TilePos::new(0, 0)).unwrap();
        let resource = sim.spawn_resource("willow", TilePos::new(3, 0)).unwrap();
        let designation = sim.designate_harvest(resource).unwrap();

        let result = sim.tick(1);

        let kinds = kinds(&result.events);
        assert!(kinds
            .iter()
            .any(|k| matches!(k, SimEventKind::PathFailed { actor: a, .. } if *a == actor)));
        // Graceful failure: back in the pool, actor back to idle.
        assert!(sim.designations.is_available(designation));
        assert_eq!(sim.actors[&actor].designation, None);
        assert!(sim.actors[&actor].stack.is_idle());
        assert_eq!(sim.actors[&actor].position, TilePos::new(0, 0));
    }

    #[test]
    fn work_across_a_wall_is_not_claimed() {
        let mut sim = sim(5, 5);
        for y in 0..5 {
            sim.set_walkable(TilePos::new(2, y), false);
        }
        let actor = sim.spawn_actor("bog_drover", TilePos::new(0, 0)).unwrap();
        let resource = sim.spawn_resource("willow", TilePos::new(4, 4)).unwrap();
        let designation = sim.designate_harvest(resource).unwrap();

        sim.tick(5 * sim.config.idle_recheck_ticks);

        // Available, but in another area: the idle scan never claims it.
        assert!(sim.designations.is_available(designation));
        assert_eq!(sim.actors[&actor].designation, None);

        // Breach the wall: the next recheck picks it up.
        sim.set_walkable(TilePos::new(2, 2), true);
        sim.tick(2 * sim.config.idle_recheck_ticks);
        assert!(!sim.designations.is_available(designation));
        assert_eq!(sim.actors[&actor].designation, Some(designation));
    }

    #[test]
    fn opening_an_access_tile_flips_availability_in_call() {
        let mut sim = sim(5, 5);
        let resource = sim.spawn_resource("willow", TilePos::new(4, 4)).unwrap();
        // Wall off both access tiles of the corner node.
        sim.set_walkable(TilePos::new(3, 4), false);
        sim.set_walkable(TilePos::new(4, 3), false);
        let designation = sim.designate_harvest(resource).unwrap();
        assert!(!sim.designations.is_available(designation));

        sim.set_walkable(TilePos::new(3, 4), true);
        assert!(sim.designations.is_available(designation));
    }

    #[test]
    fn regrowth_restores_material_over_time() {
        let mut sim = sim(5, 5);
        let resource = sim.spawn_resource("willow", TilePos::new(2, 2)).unwrap();
        sim.resources.get_mut(&resource).unwrap().material = 2;
        sim.scheduler.start(
            TimedEventor::Resource(resource),
            sim.config.resource_regrow_ticks,
        );

        sim.tick(3 * sim.config.resource_regrow_ticks + 10);

        let node = &sim.resources[&resource];
        assert_eq!(node.material, 5);
        // Full again: the heartbeat goes quiet.
        assert!(!sim.scheduler.contains(&TimedEventor::Resource(resource)));
    }

    #[test]
    fn prerequisite_chain_runs_in_order() {
        let mut sim = sim(7, 1);
        sim.spawn_actor("bog_drover", TilePos::new(0, 0)).unwrap();
        let resource = sim.spawn_resource("willow", TilePos::new(5, 0)).unwrap();
        sim.resources.get_mut(&resource).unwrap().material = 1;
        let harvest = sim.designate_harvest(resource).unwrap();
        let site = sim.start_construction("reed_hut", TilePos::new(2, 0)).unwrap();
        // The build waits for the harvest.
        let build = sim.designations.available_for("build").next().unwrap();
        sim.link_designations(harvest, build);
        assert!(!sim.designations.is_available(build));

        sim.tick(30_000);

        assert!(sim.designations.get(harvest).unwrap().complete);
        assert!(sim.designations.get(build).unwrap().complete);
        assert!(sim.buildings[&site].is_complete());
    }

    #[test]
    fn textures_stack_in_draw_order() {
        let mut sim = sim(5, 5);
        let pos = TilePos::new(2, 2);
        sim.spawn_actor("bog_drover", pos).unwrap();
        sim.spawn_item("willow_log", pos).unwrap();

        assert_eq!(
            sim.textures_at(pos),
            vec!["ground", "actor_bog_drover", "item_willow_log"]
        );
        assert_eq!(sim.textures_at(TilePos::new(0, 0)), vec!["ground"]);
        assert!(sim.textures_at(TilePos::new(9, 9)).is_empty());

        let node_pos = TilePos::new(1, 1);
        sim.spawn_resource("willow", node_pos).unwrap();
        assert_eq!(sim.textures_at(node_pos), vec!["ground", "resource_willow"]);
    }

    #[test]
    fn json_roundtrip_preserves_and_continues_the_sim() {
        let mut sim = sim(6, 1);
        let actor = sim.spawn_actor("bog_drover", TilePos::new(0, 0)).unwrap();
        let resource = sim.spawn_resource("willow", TilePos::new(3, 0)).unwrap();
        sim.designate_harvest(resource).unwrap();

        // Stop mid-walk: claimed, one move done.
        sim.tick(1 + sim.config.move_ticks_per_tile);
        assert_eq!(sim.actors[&actor].position, TilePos::new(1, 0));

        let mut restored = SimState::from_json(&sim.to_json().unwrap()).unwrap();
        assert_eq!(restored.total_time, sim.total_time);
        assert_eq!(restored.actors[&actor].position, TilePos::new(1, 0));
        assert_eq!(restored.scheduler.len(), sim.scheduler.len());
        assert!(!restored.map.is_walkable(TilePos::new(3, 0)));

        // Both sims continue identically.
        sim.tick(20_000);
        restored.tick(20_000);
        assert_eq!(
            sim.actors[&actor].position,
            restored.actors[&actor].position
        );
        assert_eq!(sim.items.len(), restored.items.len());
        assert_eq!(sim.resources.len(), restored.resources.len());
        assert_eq!(sim.total_time, restored.total_time);
    }

    #[test]
    fn from_json_rejects_garbage() {
        assert!(SimState::from_json("not valid json {{{").is_err());
        assert!(SimState::from_json(r#"{"total_time": "soon"}"#).is_err());
    }

    #[test]
    fn compact_binary_roundtrip() {
        let mut sim = sim(4, 4);
        sim.spawn_actor("bog_drover", TilePos::new(0, 0)).unwrap();
        sim.tick(1500);

        let bytes = bincode::serialize(&sim).unwrap();
        let mut restored: SimState = bincode::deserialize(&bytes).unwrap();
        restored.rebuild_transient_state();

        assert_eq!(restored.total_time, sim.total_time);
        assert_eq!(restored.actors.len(), 1);
        assert_eq!(restored.map.grid.width(), 4);
    }
}
