//! Terra demo driver: streams terrain and foliage along a scripted flight path.

use std::path::PathBuf;

use clap::Parser;
use glam::{DVec2, DVec3};
use terra_config::{CliArgs, Config, ConfigError, TerrainConfig, default_config_dir};
use terra_foliage::{FoliageEvent, FoliagePlacer};
use terra_terrain::{TerrainEvent, TileStreamer};
use tracing::{debug, error, info};

/// Fixed host step, in seconds.
const DT: f64 = 1.0 / 60.0;

/// Steps between progress reports.
const REPORT_INTERVAL: u32 = 60;

/// Height of the viewpoint above the ground, in world units.
const EYE_HEIGHT: f64 = 2_000.0;

/// Straight flight from the world centre along +X with a slow sideways sway.
struct Flight {
    start: DVec2,
    speed: f64,
    sway: f64,
}

impl Flight {
    fn across(terrain: &TerrainConfig) -> Self {
        Self {
            start: DVec2::new(terrain.total_size_x, terrain.total_size_y) * 0.5,
            speed: terrain.tile_size_x * 0.5,
            sway: terrain.tile_size_y * 0.25,
        }
    }

    fn position_at(&self, t: f64) -> DVec2 {
        self.start + DVec2::new(self.speed * t, self.sway * (t * 0.5).sin())
    }
}

#[derive(Default)]
struct Stats {
    tiles_created: usize,
    tiles_shown: usize,
    tiles_hidden: usize,
    meshes_rebuilt: usize,
    instances_added: usize,
}

fn main() {
    let args = CliArgs::parse();

    let config_dir = args
        .config
        .clone()
        .or_else(default_config_dir)
        .unwrap_or_else(|| PathBuf::from("terra-config"));

    let mut config = Config::load_or_create(&config_dir).unwrap_or_else(|e| {
        eprintln!("Failed to load config: {e}, using defaults");
        Config::default()
    });
    config.apply_cli_overrides(&args);

    let log_dir = config_dir.join("logs");
    terra_log::init_logging(Some(&log_dir), cfg!(debug_assertions), Some(&config));

    if let Err(e) = run(&config, args.steps) {
        error!("Terra demo failed: {e}");
        std::process::exit(1);
    }
}

fn run(config: &Config, steps: u32) -> Result<(), ConfigError> {
    config.validate()?;

    let mut streamer =
        TileStreamer::new(config.terrain.clone(), config.generation.terrain_budget())?;
    let mut placer = FoliagePlacer::new(config.foliage.clone(), config.generation.foliage_budget())?;
    let terrain_events = streamer.subscribe();
    let foliage_events = placer.subscribe();

    streamer.initialize();
    placer.initialize();

    let flight = Flight::across(&config.terrain);
    if !config.terrain.enable_streaming {
        // Without streaming, build the starting area up front instead.
        streamer.generate_tiles_around_position(
            flight.position_at(0.0),
            config.terrain.streaming_distance,
        );
    }

    let mut stats = Stats::default();
    let mut viewpoint = DVec3::ZERO;

    for step in 0..steps {
        let ground = flight.position_at(step as f64 * DT);
        viewpoint = ground.extend(streamer.height_at(ground) + EYE_HEIGHT);

        streamer.step(DT, viewpoint);
        for event in terrain_events.try_iter() {
            match event {
                TerrainEvent::TileCreated(coord) => {
                    stats.tiles_created += 1;
                    placer.generate_foliage_for_tile(&streamer, coord);
                }
                TerrainEvent::TileShown(_) => stats.tiles_shown += 1,
                TerrainEvent::TileHidden(_) => stats.tiles_hidden += 1,
                TerrainEvent::MeshRebuilt { .. } => stats.meshes_rebuilt += 1,
                TerrainEvent::GenerationProgress { processed, total } => {
                    debug!("Terrain generation {processed}/{total}");
                }
                TerrainEvent::GenerationComplete => info!("Bulk terrain generation finished"),
            }
        }

        placer.step(DT, &streamer);
        for event in foliage_events.try_iter() {
            match event {
                FoliageEvent::InstancesAdded { count, .. } => stats.instances_added += count,
                FoliageEvent::GenerationProgress { processed, total } => {
                    debug!("Foliage generation {processed}/{total}");
                }
                FoliageEvent::GenerationComplete { total_instances } => {
                    info!("Bulk foliage generation finished with {total_instances} instances");
                }
            }
        }

        if (step + 1) % REPORT_INTERVAL == 0 {
            report(step + 1, viewpoint, &streamer, &placer);
        }
    }

    info!(
        "Finished {steps} steps: {} tiles created, {} shown, {} hidden, {} mesh rebuilds, {} foliage instances",
        stats.tiles_created,
        stats.tiles_shown,
        stats.tiles_hidden,
        stats.meshes_rebuilt,
        stats.instances_added
    );
    report(steps, viewpoint, &streamer, &placer);
    Ok(())
}

fn report(step: u32, viewpoint: DVec3, streamer: &TileStreamer, placer: &FoliagePlacer) {
    let tile = streamer.world_to_tile(viewpoint.truncate());
    info!(
        "Step {step}: viewpoint {:.0} over tile {tile}, {} loaded / {} created tiles, {} foliage instances",
        viewpoint,
        streamer.loaded_tiles().len(),
        streamer.tile_count(),
        placer.total_instance_count()
    );
    for name in placer.type_names() {
        debug!(
            "  {name}: {} visible",
            placer.visible_instances(name, viewpoint).len()
        );
    }
}
