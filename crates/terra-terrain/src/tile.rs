//! A single terrain tile: cached base-resolution heights plus the current LOD mesh.

use std::sync::Arc;

use glam::{DVec2, DVec3};
use terra_config::TerrainConfig;

use crate::coord::TileCoord;
use crate::heightfield::HeightField;
use crate::lod::{LodLevel, LodThresholds};
use crate::mesh::{TileMesh, lod_resolution};

/// One tile of the world grid.
///
/// Heights are sampled once, at [`Tile::initialize`], on a `(resolution + 1)²`
/// grid at absolute world coordinates. Meshes at every LOD and all point
/// queries interpolate that cached grid; the noise is never evaluated again.
#[derive(Clone, Debug)]
pub struct Tile {
    coord: TileCoord,
    origin: DVec2,
    size: DVec2,
    resolution: u32,
    config: Arc<TerrainConfig>,
    heights: Vec<f64>,
    lod: LodLevel,
    mesh: TileMesh,
    mesh_builds: u64,
    initialized: bool,
    visible: bool,
    collision: bool,
}

impl Tile {
    /// An uninitialized tile at `coord`. Queries return defaults until
    /// [`Tile::initialize`] runs.
    pub fn new(coord: TileCoord, config: Arc<TerrainConfig>) -> Self {
        Self {
            coord,
            origin: coord.origin(&config),
            size: DVec2::new(config.tile_size_x, config.tile_size_y),
            resolution: config.tile_resolution,
            config,
            heights: Vec::new(),
            lod: 0,
            mesh: TileMesh::default(),
            mesh_builds: 0,
            initialized: false,
            visible: true,
            collision: true,
        }
    }

    /// Samples the height grid from `field` and builds the LOD 0 mesh.
    pub fn initialize(&mut self, field: &HeightField) {
        let res = self.resolution;
        let verts = res as usize + 1;
        let mut heights = Vec::with_capacity(verts * verts);

        // `(index + i / res) * size` keeps shared edges bit-identical between
        // neighbouring tiles.
        for gy in 0..=res {
            let world_y = (self.coord.y as f64 + gy as f64 / res as f64) * self.size.y;
            for gx in 0..=res {
                let world_x = (self.coord.x as f64 + gx as f64 / res as f64) * self.size.x;
                heights.push(field.height(world_x, world_y));
            }
        }

        self.heights = heights;
        self.initialized = true;
        self.lod = 0;
        self.generate_mesh();
    }

    /// Rebuilds the mesh for the current LOD from the cached height grid.
    pub fn generate_mesh(&mut self) {
        if !self.initialized {
            return;
        }
        let resolution = lod_resolution(self.resolution, self.lod);
        let range = (self.config.min_height, self.config.max_height);
        let mesh = TileMesh::build_grid(resolution, self.size, range, |x, y| {
            self.sample_local(x, y)
        });
        self.mesh = mesh;
        self.mesh_builds += 1;
    }

    /// Re-evaluates the LOD for `viewpoint`; rebuilds the mesh only when the
    /// level changes. Returns `true` if the mesh was rebuilt.
    pub fn update_lod(&mut self, viewpoint: DVec3) -> bool {
        if !self.initialized {
            return false;
        }
        let distance = viewpoint.distance(self.center());
        let lod = LodThresholds::from_config(&self.config).select(distance);
        if lod == self.lod {
            return false;
        }
        self.lod = lod;
        self.generate_mesh();
        true
    }

    /// Bilinearly interpolated height at `world_pos`, clamped to this tile.
    ///
    /// Always reads the base-resolution grid, whatever the current LOD.
    pub fn height_at(&self, world_pos: DVec2) -> f64 {
        if !self.initialized || self.heights.is_empty() {
            return 0.0;
        }
        let local = world_pos - self.origin;
        self.sample_local(local.x, local.y)
    }

    /// Half-open footprint test: `[origin, origin + size)` on both axes.
    pub fn contains(&self, world_pos: DVec2) -> bool {
        let max = self.origin + self.size;
        world_pos.x >= self.origin.x
            && world_pos.x < max.x
            && world_pos.y >= self.origin.y
            && world_pos.y < max.y
    }

    /// Centre of the footprint at mid height.
    pub fn center(&self) -> DVec3 {
        let c = self.origin + self.size * 0.5;
        DVec3::new(
            c.x,
            c.y,
            (self.config.min_height + self.config.max_height) * 0.5,
        )
    }

    fn sample_local(&self, local_x: f64, local_y: f64) -> f64 {
        let res = self.resolution as usize;
        let stride = res + 1;

        let lx = local_x.clamp(0.0, self.size.x);
        let ly = local_y.clamp(0.0, self.size.y);
        let gx = lx / (self.size.x / res as f64);
        let gy = ly / (self.size.y / res as f64);

        let x0 = (gx.floor() as usize).min(res);
        let y0 = (gy.floor() as usize).min(res);
        let x1 = (x0 + 1).min(res);
        let y1 = (y0 + 1).min(res);
        let fx = gx - x0 as f64;
        let fy = gy - y0 as f64;

        let h00 = self.heights[y0 * stride + x0];
        let h10 = self.heights[y0 * stride + x1];
        let h01 = self.heights[y1 * stride + x0];
        let h11 = self.heights[y1 * stride + x1];

        let h0 = h00 + (h10 - h00) * fx;
        let h1 = h01 + (h11 - h01) * fx;
        h0 + (h1 - h0) * fy
    }

    pub(crate) fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
        self.collision = visible;
    }

    pub fn coord(&self) -> TileCoord {
        self.coord
    }

    pub fn origin(&self) -> DVec2 {
        self.origin
    }

    pub fn lod(&self) -> LodLevel {
        self.lod
    }

    pub fn mesh(&self) -> &TileMesh {
        &self.mesh
    }

    /// Cached base-resolution samples, row-major.
    pub fn heights(&self) -> &[f64] {
        &self.heights
    }

    /// Number of mesh builds so far, including the initial one.
    pub fn mesh_builds(&self) -> u64 {
        self.mesh_builds
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn collision_enabled(&self) -> bool {
        self.collision
    }
}
