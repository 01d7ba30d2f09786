//! Tiled heightfield terrain: fBm height synthesis, per-tile LOD meshes,
//! viewpoint-driven streaming, and time-budgeted bulk generation.

mod budget;
mod coord;
mod events;
mod heightfield;
mod lod;
mod mesh;
mod streamer;
mod tile;

pub use budget::{BudgetClock, GenerationQueue, StepBudget, SystemClock};
pub use coord::{TerrainBounds, TileCoord};
pub use events::{EventBus, TerrainEvent};
pub use heightfield::HeightField;
pub use lod::{LodLevel, LodThresholds, MAX_LOD};
pub use mesh::{TileMesh, lod_resolution};
pub use streamer::{TerrainQuery, TileStreamer};
pub use tile::Tile;
