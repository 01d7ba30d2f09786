//! Configuration system for the terra terrain engine.
//!
//! Holds the immutable per-session terrain and foliage settings, persists them
//! to disk as RON, validates them before use, and applies CLI overrides via clap.

mod cli;
mod config;
mod error;

pub use cli::CliArgs;
pub use config::{
    Config, DebugConfig, FoliageConfig, FoliageTypeSpec, GenerationConfig, MAX_TILES,
    TerrainConfig, WORLD_UNITS_PER_KM, default_config_dir,
};
pub use error::ConfigError;
