//! Sparse tile registry with viewpoint streaming, LOD updates, and budgeted bulk generation.

use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::Receiver;
use glam::{DVec2, DVec3};
use rustc_hash::{FxHashMap, FxHashSet};
use terra_config::{ConfigError, TerrainConfig, WORLD_UNITS_PER_KM};
use tracing::{debug, info, warn};

use crate::budget::{BudgetClock, GenerationQueue, StepBudget, SystemClock};
use crate::coord::{TerrainBounds, TileCoord};
use crate::events::{EventBus, TerrainEvent};
use crate::heightfield::HeightField;
use crate::tile::Tile;

/// Read-only terrain access used by systems that sit on top of the terrain.
pub trait TerrainQuery {
    /// The configuration the terrain was built with.
    fn terrain_config(&self) -> &TerrainConfig;
    /// Surface height at a world position; `0.0` where no tile exists.
    fn height_at(&self, world_pos: DVec2) -> f64;
    /// Whether the terrain has been initialized.
    fn is_initialized(&self) -> bool;
}

/// Owns every tile, keeps the ones near the viewpoint loaded, and drains
/// bulk generation jobs under a per-step time budget.
///
/// Tiles are created lazily and never destroyed; leaving the streaming radius
/// only hides them (geometry and heights are retained).
pub struct TileStreamer {
    config: Arc<TerrainConfig>,
    field: HeightField,
    tiles: FxHashMap<TileCoord, Tile>,
    loaded: FxHashSet<TileCoord>,
    initialized: bool,
    queue: GenerationQueue,
    clock: Box<dyn BudgetClock>,
    events: EventBus<TerrainEvent>,
    host_time: f64,
}

impl TileStreamer {
    /// Validates `config` and builds an empty streamer.
    ///
    /// `budget` is the wall-clock time a step may spend on bulk generation.
    pub fn new(config: TerrainConfig, budget: Duration) -> Result<Self, ConfigError> {
        config.validate()?;

        info!(
            "Terrain size {:.0} x {:.0} ({:.2} km x {:.2} km), {} x {} = {} tiles",
            config.total_size_x,
            config.total_size_y,
            config.total_size_x / WORLD_UNITS_PER_KM,
            config.total_size_y / WORLD_UNITS_PER_KM,
            config.num_tiles_x(),
            config.num_tiles_y(),
            config.total_tiles()
        );

        Ok(Self {
            field: HeightField::new(&config),
            config: Arc::new(config),
            tiles: FxHashMap::default(),
            loaded: FxHashSet::default(),
            initialized: false,
            queue: GenerationQueue::new(budget),
            clock: Box::new(SystemClock::new()),
            events: EventBus::new(),
            host_time: 0.0,
        })
    }

    /// Replaces the clock used to measure step budgets.
    pub fn with_clock(mut self, clock: impl BudgetClock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Receives every [`TerrainEvent`] emitted from now on.
    pub fn subscribe(&mut self) -> Receiver<TerrainEvent> {
        self.events.subscribe()
    }

    /// Marks the terrain ready for streaming. Tiles are only created on demand.
    pub fn initialize(&mut self) {
        if self.initialized {
            warn!("Terrain already initialized");
            return;
        }
        self.initialized = true;
        info!("Terrain initialized; tiles are created by streaming or bulk generation");
    }

    /// One host step: drain bulk generation, then stream and update LODs
    /// around `viewpoint` when streaming is enabled.
    pub fn step(&mut self, dt: f64, viewpoint: DVec3) {
        self.host_time += dt;

        if self.queue.is_active() {
            self.process_generation();
        }

        if self.initialized && self.config.enable_streaming {
            self.update_streaming(viewpoint);
            self.update_lods(viewpoint);
        }
    }

    /// Valid tiles whose centre lies within `radius` of `center` (XY only).
    pub fn tiles_in_radius(&self, center: DVec2, radius: f64) -> Vec<TileCoord> {
        let mut result = Vec::new();
        if radius.is_nan() || radius < 0.0 {
            return result;
        }

        let config = &self.config;
        let center_tile = TileCoord::from_world(center, config);
        let tile_radius = (radius / config.tile_size_x.min(config.tile_size_y)).ceil();
        let tile_radius = tile_radius.min(i32::MAX as f64) as i64;

        let min_x = (center_tile.x as i64 - tile_radius).max(0);
        let max_x = (center_tile.x as i64 + tile_radius).min(config.num_tiles_x() as i64 - 1);
        let min_y = (center_tile.y as i64 - tile_radius).max(0);
        let max_y = (center_tile.y as i64 + tile_radius).min(config.num_tiles_y() as i64 - 1);

        for y in min_y..=max_y {
            for x in min_x..=max_x {
                let coord = TileCoord::new(x as i32, y as i32);
                if coord.center(config).distance(center) <= radius {
                    result.push(coord);
                }
            }
        }
        result
    }

    /// Hides loaded tiles outside the streaming radius, creates missing tiles
    /// inside it, and re-shows hidden tiles that came back into range.
    pub fn update_streaming(&mut self, viewpoint: DVec3) {
        if !self.initialized {
            return;
        }

        let wanted = self.tiles_in_radius(viewpoint.truncate(), self.config.streaming_distance);
        let wanted_set: FxHashSet<TileCoord> = wanted.iter().copied().collect();

        let mut to_hide: Vec<TileCoord> = self
            .loaded
            .iter()
            .filter(|coord| !wanted_set.contains(coord))
            .copied()
            .collect();
        to_hide.sort_unstable();

        for coord in to_hide {
            self.loaded.remove(&coord);
            if let Some(tile) = self.tiles.get_mut(&coord) {
                tile.set_visible(false);
                debug!("Hid tile {coord}");
                self.events.emit(TerrainEvent::TileHidden(coord));
            }
        }

        for coord in wanted {
            if !self.tiles.contains_key(&coord) {
                self.create_tile(coord);
            } else if !self.loaded.contains(&coord)
                && let Some(tile) = self.tiles.get_mut(&coord)
            {
                tile.set_visible(true);
                self.loaded.insert(coord);
                debug!("Showed tile {coord}");
                self.events.emit(TerrainEvent::TileShown(coord));
            }
        }
    }

    /// Re-evaluates the LOD of every loaded tile against `viewpoint`.
    pub fn update_lods(&mut self, viewpoint: DVec3) {
        for coord in &self.loaded {
            if let Some(tile) = self.tiles.get_mut(coord)
                && tile.update_lod(viewpoint)
            {
                debug!("Rebuilt tile {coord} at LOD {}", tile.lod());
                self.events.emit(TerrainEvent::MeshRebuilt {
                    coord: *coord,
                    lod: tile.lod(),
                });
            }
        }
    }

    /// Queues every tile of the world for budgeted generation.
    ///
    /// Returns `false` if a bulk job is already running.
    pub fn generate_all_tiles(&mut self) -> bool {
        let mut coords = Vec::with_capacity(self.config.total_tiles().max(0) as usize);
        for y in 0..self.config.num_tiles_y() {
            for x in 0..self.config.num_tiles_x() {
                coords.push(TileCoord::new(x, y));
            }
        }
        self.start_generation(coords, "all")
    }

    /// Queues the tiles within `radius` of `center` for budgeted generation.
    ///
    /// Returns `false` if a bulk job is already running.
    pub fn generate_tiles_around_position(&mut self, center: DVec2, radius: f64) -> bool {
        let coords = self.tiles_in_radius(center, radius);
        self.start_generation(coords, "nearby")
    }

    fn start_generation(&mut self, coords: Vec<TileCoord>, scope: &str) -> bool {
        if self.queue.is_active() {
            warn!("Already generating tiles; ignoring request for {scope} tiles");
            return false;
        }
        if !self.initialized {
            self.initialize();
        }
        info!("Starting generation of {} {scope} tiles", coords.len());
        self.queue.start(coords)
    }

    /// Drains queued tiles until the step budget is spent. Emits progress
    /// after each tile and one completion event when the queue empties.
    ///
    /// Returns the number of tiles processed in this step.
    pub fn process_generation(&mut self) -> usize {
        if !self.queue.is_active() {
            return 0;
        }

        let budget = StepBudget::start(self.clock.as_ref(), self.queue.budget());
        let mut processed = 0;

        while let Some(coord) = self.queue.next_item() {
            if !self.tiles.contains_key(&coord) {
                self.create_tile(coord);
            }
            processed += 1;

            let (done, total) = self.queue.progress();
            self.events.emit(TerrainEvent::GenerationProgress {
                processed: done,
                total,
            });

            if budget.is_exhausted(self.clock.as_ref()) {
                break;
            }
        }

        if self.queue.is_drained() {
            self.queue.finish();
            info!(
                "Terrain generation complete: {} tiles exist ({:.2}s host time)",
                self.tiles.len(),
                self.host_time
            );
            self.events.emit(TerrainEvent::GenerationComplete);
        }

        processed
    }

    /// Stops draining the current bulk job. Tiles already built are kept.
    pub fn cancel_generation(&mut self) {
        if self.queue.is_active() {
            let (done, total) = self.queue.progress();
            info!("Cancelled terrain generation after {done}/{total} tiles");
        }
        self.queue.cancel();
    }

    pub fn is_generating(&self) -> bool {
        self.queue.is_active()
    }

    /// Returns the tile at `coord`, creating it (loaded and visible) if absent.
    ///
    /// Returns `None` for coordinates outside the world grid.
    pub fn ensure_tile(&mut self, coord: TileCoord) -> Option<&Tile> {
        if !self.tiles.contains_key(&coord) {
            self.create_tile(coord);
        }
        self.tiles.get(&coord)
    }

    fn create_tile(&mut self, coord: TileCoord) -> bool {
        if !coord.is_valid(&self.config) {
            warn!("Refusing to create tile at invalid coordinate {coord}");
            return false;
        }

        let mut tile = Tile::new(coord, Arc::clone(&self.config));
        tile.initialize(&self.field);
        self.tiles.insert(coord, tile);
        self.loaded.insert(coord);

        debug!("Created tile {coord}");
        self.events.emit(TerrainEvent::TileCreated(coord));
        true
    }

    /// Height at `world_pos`, or `0.0` if the owning tile does not exist.
    pub fn height_at(&self, world_pos: DVec2) -> f64 {
        self.tile_at(world_pos)
            .map_or(0.0, |tile| tile.height_at(world_pos))
    }

    /// The existing tile whose footprint contains `world_pos`.
    pub fn tile_at(&self, world_pos: DVec2) -> Option<&Tile> {
        self.tiles.get(&self.world_to_tile(world_pos))
    }

    pub fn tile(&self, x: i32, y: i32) -> Option<&Tile> {
        self.tiles.get(&TileCoord::new(x, y))
    }

    pub fn world_to_tile(&self, world_pos: DVec2) -> TileCoord {
        TileCoord::from_world(world_pos, &self.config)
    }

    pub fn is_valid_coord(&self, coord: TileCoord) -> bool {
        coord.is_valid(&self.config)
    }

    /// Half-open test against the world footprint `[0, total_size)`.
    pub fn contains_world_location(&self, world_pos: DVec2) -> bool {
        world_pos.x >= 0.0
            && world_pos.x < self.config.total_size_x
            && world_pos.y >= 0.0
            && world_pos.y < self.config.total_size_y
    }

    pub fn bounds(&self) -> TerrainBounds {
        TerrainBounds::from_config(&self.config)
    }

    pub fn is_loaded(&self, coord: TileCoord) -> bool {
        self.loaded.contains(&coord)
    }

    /// Currently loaded tile coordinates, sorted.
    pub fn loaded_tiles(&self) -> Vec<TileCoord> {
        let mut coords: Vec<_> = self.loaded.iter().copied().collect();
        coords.sort_unstable();
        coords
    }

    /// Number of tiles ever created (loaded or hidden).
    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    pub fn config(&self) -> &TerrainConfig {
        &self.config
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }
}

impl TerrainQuery for TileStreamer {
    fn terrain_config(&self) -> &TerrainConfig {
        &self.config
    }

    fn height_at(&self, world_pos: DVec2) -> f64 {
        TileStreamer::height_at(self, world_pos)
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }
}
