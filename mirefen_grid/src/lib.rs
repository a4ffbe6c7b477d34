// mirefen_grid — the spatial-consistency subsystem of Mirefen.
//
// This crate owns the 2D walkability grid and everything that must stay
// consistent with it as tiles flip between walkable and blocked at runtime.
// It knows nothing about actors, jobs, or rendering; the sim crate layers
// those on top through the `AccessObserver` seam.
//
// Module overview:
// - `tile.rs`:     TilePos and the four cardinal directions.
// - `grid.rs`:     Dense tile storage — walkability, area IDs, listeners.
// - `edge.rs`:     Incremental walkable/blocked boundary-edge tracker.
// - `area.rs`:     Connected-region (area) bookkeeping via flood fill.
// - `map.rs`:      TileMap — the single mutation entry point; runs the
//                  edge → listener → area cascade synchronously.
// - `pathfind.rs`: Resumable, budgeted, multi-goal A* searcher.
//
// The one rule that matters: all walkability mutation goes through
// `TileMap::set_walkable`. The raw flag writers are crate-private so the
// cascade cannot be skipped from outside.

pub mod area;
pub mod edge;
pub mod grid;
pub mod map;
pub mod pathfind;
pub mod tile;

pub use area::{Area, AreaId, AreaManager};
pub use edge::{BoundaryEdge, CornerPos, EdgeTracker};
pub use grid::{AccessHandle, TileGrid};
pub use map::{AccessObserver, NoopObserver, TileMap};
pub use pathfind::{Pathfinder, SearchState};
pub use tile::{Direction, TilePos};
