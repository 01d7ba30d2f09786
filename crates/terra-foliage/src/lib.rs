//! Procedural foliage placement over a tiled terrain.
//!
//! Candidates come from Poisson-disk sampling per tile and foliage type, are
//! filtered by spawn height and surface slope, and the accepted instance
//! transforms are appended to the type's buffer in one batch per tile.

mod collector;
mod placer;
mod poisson;
mod transform;

pub use collector::InstanceBuffer;
pub use placer::{FoliageEvent, FoliagePlacer, MAX_SAMPLE_ATTEMPTS, tile_seed};
pub use poisson::poisson_disk_2d;
pub use transform::{
    InstanceTransform, NORMAL_SAMPLE_OFFSET, Rejection, build_transform, check_candidate,
    check_height, check_slope, slope_angle, surface_alignment, surface_normal,
};
