// The actor state stack — cooperative, interruptible task decomposition.
//
// An actor's current activity is a LIFO stack of state frames. The bottom
// frame is always the root `Idle` state, which never finishes; everything
// above it is a task in progress, decomposed into child states that execute
// before control returns to their parent. A "satisfy designation" frame,
// for example, pushes a move frame, then a work frame, then finishes.
//
// Each frame tracks two lifecycle bits: `entered` (its on-enter hook ran)
// and `finished` (it should be popped). Whether a state consumes scheduler
// time is a property of its kind: zero-time bookkeeping states (push the
// next child, pick up an item) drain synchronously within one scheduler
// visit, while time-consuming states (move one tile, one unit of work)
// return an `ActionKind` whose configured duration decides when the actor
// is next due. That drain loop lives in `sim.rs` — it needs the whole sim —
// and is an explicit iteration, not recursion, so a deep finished cascade
// cannot grow the call stack.
//
// Frames hold only their own data (a computed path, a phase counter);
// everything else is looked up from the sim when the frame runs.

use crate::types::{ActionKind, DesignationId, ItemId};
use mirefen_grid::tile::{Direction, TilePos};
use serde::{Deserialize, Serialize};

/// One kind of actor activity, with the data it carries across ticks.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum StateKind {
    /// The root fallback: periodically scan for available work.
    Idle,
    /// Coordinator for one claimed designation. Zero-time; each visit
    /// advances `phase` and pushes the next child state.
    SatisfyDesignation { designation: DesignationId, phase: u8 },
    /// Walk a computed path, one direction per visit. `goals` is kept for
    /// re-planning when the path is invalidated mid-walk.
    Move {
        goals: Vec<TilePos>,
        path: Vec<Direction>,
        next: usize,
    },
    /// One or more visits of job work at the current designation.
    PerformJob { designation: DesignationId },
    /// Take an item from the actor's tile into its hands. Zero-time.
    PickUpItem { item: ItemId },
    /// Put the held item down on the actor's tile. Zero-time.
    PlaceItem,
}

impl StateKind {
    /// Whether a scheduler visit of this state consumes simulated time.
    /// Zero-time states are drained synchronously in one visit.
    pub fn requires_time(&self) -> bool {
        matches!(self, Self::Idle | Self::Move { .. } | Self::PerformJob { .. })
    }

    /// Only the root state; it never finishes and is never popped.
    pub fn is_root(&self) -> bool {
        matches!(self, Self::Idle)
    }

    /// The action the scheduler charges time for when this state is on top
    /// at the end of a visit. Only meaningful for time-consuming states.
    pub fn action_kind(&self) -> ActionKind {
        match self {
            Self::Idle => ActionKind::Idle,
            Self::Move { .. } => ActionKind::Move,
            Self::PerformJob { .. } => ActionKind::Work,
            Self::SatisfyDesignation { .. } | Self::PickUpItem { .. } | Self::PlaceItem => {
                ActionKind::Idle
            }
        }
    }
}

/// A stack entry: the state plus its lifecycle bits.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StateFrame {
    pub kind: StateKind,
    pub entered: bool,
    pub finished: bool,
}

impl StateFrame {
    pub fn new(kind: StateKind) -> Self {
        Self {
            kind,
            entered: false,
            finished: false,
        }
    }
}

/// Per-actor LIFO execution structure. Never empty: the root `Idle` frame
/// sits at the bottom for the actor's whole life.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StateStack {
    frames: Vec<StateFrame>,
}

impl Default for StateStack {
    fn default() -> Self {
        Self::new()
    }
}

impl StateStack {
    pub fn new() -> Self {
        let mut root = StateFrame::new(StateKind::Idle);
        root.entered = true;
        Self { frames: vec![root] }
    }

    pub fn top(&self) -> &StateFrame {
        self.frames.last().expect("state stack never empty")
    }

    pub fn top_mut(&mut self) -> &mut StateFrame {
        self.frames.last_mut().expect("state stack never empty")
    }

    pub fn push(&mut self, kind: StateKind) {
        self.frames.push(StateFrame::new(kind));
    }

    /// Pop the top frame. The root frame is never popped.
    ///
    /// # Panics
    /// If called with only the root frame on the stack.
    pub fn pop(&mut self) -> StateFrame {
        assert!(self.frames.len() > 1, "attempted to pop the root state");
        self.frames.pop().expect("state stack never empty")
    }

    /// Abandon everything above the root. Used when a task dies mid-chain
    /// (unreachable goal, designation cancelled under the actor).
    pub fn truncate_to_root(&mut self) {
        self.frames.truncate(1);
    }

    /// Whether only the root frame remains.
    pub fn is_idle(&self) -> bool {
        self.frames.len() == 1
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }
}
