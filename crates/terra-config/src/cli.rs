//! Command-line argument parsing for the terra demo driver.

use std::path::PathBuf;

use clap::Parser;

use crate::Config;

/// Terra command-line arguments.
///
/// CLI values override settings loaded from `config.ron`.
#[derive(Parser, Debug, Default)]
#[command(name = "terra", about = "Tiled terrain streaming and foliage placement")]
pub struct CliArgs {
    /// Terrain noise seed.
    #[arg(long)]
    pub seed: Option<u32>,

    /// Foliage placement seed.
    #[arg(long)]
    pub foliage_seed: Option<i64>,

    /// Height cells per tile edge.
    #[arg(long)]
    pub tile_resolution: Option<u32>,

    /// Streaming radius in world units.
    #[arg(long)]
    pub streaming_distance: Option<f64>,

    /// Disable viewpoint-driven streaming.
    #[arg(long)]
    pub no_streaming: bool,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Number of host steps the demo driver runs.
    #[arg(long, default_value_t = 600)]
    pub steps: u32,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(seed) = args.seed {
            self.terrain.noise_seed = seed;
        }
        if let Some(seed) = args.foliage_seed {
            self.foliage.seed = seed;
        }
        if let Some(resolution) = args.tile_resolution {
            self.terrain.tile_resolution = resolution;
        }
        if let Some(distance) = args.streaming_distance {
            self.terrain.streaming_distance = distance;
        }
        if args.no_streaming {
            self.terrain.enable_streaming = false;
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
    }
}
