//! Per-tile foliage placement and the budgeted whole-terrain foliage loop.

use std::time::Duration;

use crossbeam_channel::Receiver;
use glam::{DVec2, DVec3};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rustc_hash::FxHashSet;
use terra_config::{ConfigError, FoliageConfig, FoliageTypeSpec, WORLD_UNITS_PER_KM};
use terra_terrain::{
    BudgetClock, EventBus, GenerationQueue, StepBudget, SystemClock, TerrainQuery, TileCoord,
};
use tracing::{debug, info, warn};

use crate::collector::InstanceBuffer;
use crate::poisson::poisson_disk_2d;
use crate::transform::{
    InstanceTransform, NORMAL_SAMPLE_OFFSET, build_transform, check_height, check_slope,
    surface_normal,
};

/// Candidates tried around each active point during Poisson-disk sampling.
pub const MAX_SAMPLE_ATTEMPTS: u32 = 30;

/// Notifications produced by the foliage placer.
#[derive(Clone, Debug, PartialEq)]
pub enum FoliageEvent {
    /// A tile's accepted instances of one type were appended.
    InstancesAdded {
        type_name: String,
        tile: TileCoord,
        count: usize,
    },
    /// One more tile of the bulk job was processed.
    GenerationProgress { processed: usize, total: usize },
    /// The bulk job finished.
    GenerationComplete { total_instances: usize },
}

/// Deterministic seed for one tile and foliage type:
/// `base + x * 10000 + y + type_index`, with wrapping arithmetic.
pub fn tile_seed(base: i64, coord: TileCoord, type_index: usize) -> u64 {
    base.wrapping_add((coord.x as i64).wrapping_mul(10_000))
        .wrapping_add(coord.y as i64)
        .wrapping_add(type_index as i64) as u64
}

struct FoliageLayer {
    spec: FoliageTypeSpec,
    type_index: usize,
    buffer: InstanceBuffer,
}

/// Places foliage instances over terrain tiles.
///
/// Each tile is processed at most once until [`FoliagePlacer::clear_all_foliage`];
/// bulk jobs drain under the same per-step budget as terrain generation.
pub struct FoliagePlacer {
    config: FoliageConfig,
    layers: Vec<FoliageLayer>,
    generated: FxHashSet<TileCoord>,
    initialized: bool,
    queue: GenerationQueue,
    clock: Box<dyn BudgetClock>,
    events: EventBus<FoliageEvent>,
    host_time: f64,
}

impl FoliagePlacer {
    pub fn new(config: FoliageConfig, budget: Duration) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            layers: Vec::new(),
            generated: FxHashSet::default(),
            initialized: false,
            queue: GenerationQueue::new(budget),
            clock: Box::new(SystemClock::new()),
            events: EventBus::new(),
            host_time: 0.0,
        })
    }

    pub fn with_clock(mut self, clock: impl BudgetClock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn subscribe(&mut self) -> Receiver<FoliageEvent> {
        self.events.subscribe()
    }

    /// Creates one instance buffer per foliage type that has an asset.
    pub fn initialize(&mut self) {
        if self.initialized {
            warn!("Foliage already initialized");
            return;
        }

        for (type_index, spec) in self.config.types.iter().enumerate() {
            let Some(asset) = &spec.asset else {
                warn!("Foliage type '{}' has no asset; skipping", spec.type_name);
                continue;
            };
            self.layers.push(FoliageLayer {
                spec: spec.clone(),
                type_index,
                buffer: InstanceBuffer::new(spec.type_name.clone(), asset.clone()),
            });
        }
        self.initialized = true;
        info!(
            "Foliage initialized with {} of {} types",
            self.layers.len(),
            self.config.types.len()
        );
    }

    fn ensure_initialized(&mut self) {
        if !self.initialized {
            self.initialize();
        }
    }

    /// One host step: drains the bulk job, if any.
    pub fn step(&mut self, dt: f64, terrain: &dyn TerrainQuery) {
        self.host_time += dt;
        if self.queue.is_active() {
            self.process_generation(terrain);
        }
    }

    /// Places every foliage type on tile `coord` and appends each type's
    /// accepted instances as a single batch.
    ///
    /// Returns the number of instances added. Already generated tiles,
    /// invalid coordinates and uninitialized terrain add nothing.
    pub fn generate_foliage_for_tile(
        &mut self,
        terrain: &dyn TerrainQuery,
        coord: TileCoord,
    ) -> usize {
        self.ensure_initialized();

        if !terrain.is_initialized() {
            warn!("Terrain not initialized; skipping foliage for tile {coord}");
            return 0;
        }
        let terrain_config = terrain.terrain_config();
        if !coord.is_valid(terrain_config) {
            warn!("Skipping foliage for invalid tile {coord}");
            return 0;
        }
        if self.generated.contains(&coord) {
            return 0;
        }

        let origin = coord.origin(terrain_config);
        let size = DVec2::new(terrain_config.tile_size_x, terrain_config.tile_size_y);
        let area = size.x * size.y;
        let area_km2 = area / (WORLD_UNITS_PER_KM * WORLD_UNITS_PER_KM);

        let mut total = 0;
        for layer in &mut self.layers {
            let target = (layer.spec.density_per_km2 * area_km2).round();
            if target < 1.0 {
                continue;
            }

            let seed = tile_seed(self.config.seed, coord, layer.type_index);
            let min_distance = (area / target).sqrt() * 0.5;
            let points = poisson_disk_2d(seed, size.x, size.y, min_distance, MAX_SAMPLE_ATTEMPTS);

            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            rng.set_stream(1);

            let mut batch: Vec<InstanceTransform> = Vec::with_capacity(points.len());
            let (mut out_of_range, mut too_steep) = (0usize, 0usize);
            for local in &points {
                let world = origin + *local;
                let height = terrain.height_at(world);
                if check_height(&layer.spec, height).is_err() {
                    out_of_range += 1;
                    continue;
                }
                let normal = surface_normal(terrain, world, NORMAL_SAMPLE_OFFSET);
                if check_slope(&layer.spec, normal).is_err() {
                    too_steep += 1;
                    continue;
                }
                batch.push(build_transform(
                    &layer.spec,
                    &mut rng,
                    world.extend(height),
                    normal,
                ));
            }

            debug!(
                "Tile {coord} '{}': {} candidates, {} rejected by height, {} by slope",
                layer.spec.type_name,
                points.len(),
                out_of_range,
                too_steep
            );

            let added = layer.buffer.add_instances(batch);
            if added > 0 {
                self.events.emit(FoliageEvent::InstancesAdded {
                    type_name: layer.spec.type_name.clone(),
                    tile: coord,
                    count: added,
                });
            }
            total += added;
        }

        self.generated.insert(coord);
        debug!("Generated {total} foliage instances on tile {coord}");
        total
    }

    /// Queues every tile that has no foliage yet.
    ///
    /// Returns `false` if a job is already running or the terrain is not initialized.
    pub fn generate_all_foliage(&mut self, terrain: &dyn TerrainQuery) -> bool {
        let config = terrain.terrain_config();
        let mut coords = Vec::new();
        for y in 0..config.num_tiles_y() {
            for x in 0..config.num_tiles_x() {
                let coord = TileCoord::new(x, y);
                if !self.generated.contains(&coord) {
                    coords.push(coord);
                }
            }
        }
        self.start_generation(terrain, coords)
    }

    /// Queues the tiles of the bounding box around a circle that have no foliage yet.
    ///
    /// The box spans `floor((center - radius) / tile)` to `ceil((center + radius) / tile)`
    /// on each axis, clamped to the world grid.
    pub fn generate_foliage_in_area(
        &mut self,
        terrain: &dyn TerrainQuery,
        center: DVec2,
        radius: f64,
    ) -> bool {
        let config = terrain.terrain_config();
        let tile = DVec2::new(config.tile_size_x, config.tile_size_y);
        let lo = ((center - DVec2::splat(radius)) / tile).floor();
        let hi = ((center + DVec2::splat(radius)) / tile).ceil();

        let min_x = (lo.x.max(0.0) as i64).min(config.num_tiles_x() as i64);
        let min_y = (lo.y.max(0.0) as i64).min(config.num_tiles_y() as i64);
        let max_x = (hi.x.min(config.num_tiles_x() as f64 - 1.0)) as i64;
        let max_y = (hi.y.min(config.num_tiles_y() as f64 - 1.0)) as i64;

        let mut coords = Vec::new();
        for y in min_y..=max_y {
            for x in min_x..=max_x {
                let coord = TileCoord::new(x as i32, y as i32);
                if coord.is_valid(config) && !self.generated.contains(&coord) {
                    coords.push(coord);
                }
            }
        }
        self.start_generation(terrain, coords)
    }

    fn start_generation(&mut self, terrain: &dyn TerrainQuery, coords: Vec<TileCoord>) -> bool {
        if self.queue.is_active() {
            warn!("Already generating foliage; ignoring request");
            return false;
        }
        if !terrain.is_initialized() {
            warn!("Terrain not initialized; cannot generate foliage");
            return false;
        }
        self.ensure_initialized();
        info!("Starting foliage generation for {} tiles", coords.len());
        self.queue.start(coords)
    }

    /// Drains queued tiles until the step budget is spent.
    ///
    /// Returns the number of tiles processed in this step.
    pub fn process_generation(&mut self, terrain: &dyn TerrainQuery) -> usize {
        if !self.queue.is_active() {
            return 0;
        }

        let budget = StepBudget::start(self.clock.as_ref(), self.queue.budget());
        let mut processed = 0;

        while let Some(coord) = self.queue.next_item() {
            if !self.generated.contains(&coord) {
                self.generate_foliage_for_tile(terrain, coord);
            }
            processed += 1;

            let (done, total) = self.queue.progress();
            self.events
                .emit(FoliageEvent::GenerationProgress { processed: done, total });

            if budget.is_exhausted(self.clock.as_ref()) {
                break;
            }
        }

        if self.queue.is_drained() {
            self.queue.finish();
            let total_instances = self.total_instance_count();
            info!(
                "Foliage generation complete: {total_instances} instances ({:.2}s host time)",
                self.host_time
            );
            self.events
                .emit(FoliageEvent::GenerationComplete { total_instances });
        }

        processed
    }

    pub fn cancel_generation(&mut self) {
        if self.queue.is_active() {
            let (done, total) = self.queue.progress();
            info!("Cancelled foliage generation after {done}/{total} tiles");
        }
        self.queue.cancel();
    }

    pub fn is_generating(&self) -> bool {
        self.queue.is_active()
    }

    /// Removes every instance and forgets which tiles were generated.
    pub fn clear_all_foliage(&mut self) {
        for layer in &mut self.layers {
            layer.buffer.clear();
        }
        self.generated.clear();
        info!("Cleared all foliage");
    }

    /// Removes instances of every type within `radius` of `center`.
    ///
    /// Scans every instance. Tiles stay marked as generated.
    pub fn clear_foliage_in_area(&mut self, center: DVec3, radius: f64) -> usize {
        let removed: usize = self
            .layers
            .iter_mut()
            .map(|layer| layer.buffer.remove_within(center, radius))
            .sum();
        debug!("Removed {removed} foliage instances within {radius} of {center}");
        removed
    }

    pub fn total_instance_count(&self) -> usize {
        self.layers.iter().map(|layer| layer.buffer.len()).sum()
    }

    pub fn buffer(&self, type_name: &str) -> Option<&InstanceBuffer> {
        self.layer(type_name).map(|layer| &layer.buffer)
    }

    pub fn instances(&self, type_name: &str) -> Option<&[InstanceTransform]> {
        self.buffer(type_name).map(InstanceBuffer::instances)
    }

    /// Instances of `type_name` within the type's cull distance of `viewpoint`.
    /// A non-positive cull distance disables culling.
    pub fn visible_instances(&self, type_name: &str, viewpoint: DVec3) -> Vec<&InstanceTransform> {
        let Some(layer) = self.layer(type_name) else {
            return Vec::new();
        };
        let cull = layer.spec.cull_distance;
        layer
            .buffer
            .instances()
            .iter()
            .filter(|instance| cull <= 0.0 || instance.translation.distance(viewpoint) <= cull)
            .collect()
    }

    /// Names of the types that received an instance buffer.
    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.layers.iter().map(|layer| layer.spec.type_name.as_str())
    }

    pub fn is_tile_generated(&self, coord: TileCoord) -> bool {
        self.generated.contains(&coord)
    }

    pub fn generated_tile_count(&self) -> usize {
        self.generated.len()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn config(&self) -> &FoliageConfig {
        &self.config
    }

    fn layer(&self, type_name: &str) -> Option<&FoliageLayer> {
        self.layers
            .iter()
            .find(|layer| layer.spec.type_name == type_name)
    }
}
