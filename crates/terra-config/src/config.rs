//! Configuration structs with sensible defaults, validation, and RON persistence.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// World units per kilometre. World space is measured in centimetres.
pub const WORLD_UNITS_PER_KM: f64 = 100_000.0;

/// Largest tile grid a terrain config may describe.
pub const MAX_TILES: i64 = 1 << 24;

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Heightfield, tiling, LOD and streaming settings.
    pub terrain: TerrainConfig,
    /// Foliage types and placement seed.
    pub foliage: FoliageConfig,
    /// Per-step time budgets for bulk generation jobs.
    pub generation: GenerationConfig,
    /// Debug/development settings.
    pub debug: DebugConfig,
}

/// Terrain generation settings. Immutable once a streamer has been built from it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TerrainConfig {
    /// Total world extent along X, in world units.
    pub total_size_x: f64,
    /// Total world extent along Y, in world units.
    pub total_size_y: f64,
    /// Tile extent along X, in world units.
    pub tile_size_x: f64,
    /// Tile extent along Y, in world units.
    pub tile_size_y: f64,
    /// Height cells per tile edge. The sample grid is `(resolution + 1)²`.
    pub tile_resolution: u32,
    /// Lowest height the generator produces.
    pub min_height: f64,
    /// Highest height the generator produces.
    pub max_height: f64,
    /// Frequency of the first noise octave.
    pub noise_scale: f64,
    /// Number of noise octaves summed per sample.
    pub noise_octaves: u32,
    /// Amplitude multiplier between successive octaves.
    pub noise_persistence: f64,
    /// Frequency multiplier between successive octaves.
    pub noise_lacunarity: f64,
    /// Base noise seed. Octave `i` uses `seed + i`.
    pub noise_seed: u32,
    /// Tiles closer than this use LOD 0.
    pub lod0_distance: f64,
    /// Tiles closer than this (and beyond `lod0_distance`) use LOD 1.
    pub lod1_distance: f64,
    /// Tiles closer than this (and beyond `lod1_distance`) use LOD 2; farther tiles use LOD 3.
    pub lod2_distance: f64,
    /// Tiles whose centre lies within this radius of the viewpoint are kept loaded.
    pub streaming_distance: f64,
    /// Whether the per-step update streams tiles around the viewpoint.
    pub enable_streaming: bool,
}

/// One kind of foliage scattered over the terrain.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FoliageTypeSpec {
    /// Unique name; also the key of the instance buffer.
    pub type_name: String,
    /// Visual asset the instances render with. Types without one are skipped.
    pub asset: Option<String>,
    /// Target instances per square kilometre.
    pub density_per_km2: f64,
    /// Lower bound of the uniform scale.
    pub min_scale: f64,
    /// Upper bound of the uniform scale.
    pub max_scale: f64,
    /// Candidates below this height are rejected.
    pub min_spawn_height: f64,
    /// Candidates above this height are rejected.
    pub max_spawn_height: f64,
    /// Maximum angle between the surface normal and up, in radians.
    pub max_spawn_slope: f64,
    /// Instances farther than this from the viewpoint are culled.
    pub cull_distance: f64,
    /// Tilt instances to follow the surface normal.
    pub align_to_surface: bool,
    /// Apply a random yaw in `[0, 360)` degrees.
    pub random_yaw: bool,
    /// Pitch and roll jitter range in degrees (`0` disables it).
    pub random_pitch_range: f64,
}

/// Foliage placement settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FoliageConfig {
    /// Base seed for per-tile placement.
    pub seed: i64,
    /// Foliage types, in placement order.
    pub types: Vec<FoliageTypeSpec>,
}

/// Time budgets for the incremental bulk generation loops.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GenerationConfig {
    /// Wall-clock budget per step for bulk tile generation, in milliseconds.
    pub terrain_budget_ms: f64,
    /// Wall-clock budget per step for bulk foliage generation, in milliseconds.
    pub foliage_budget_ms: f64,
}

/// Debug/development configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Log level override (e.g., "debug", "info", "terra_terrain=trace").
    pub log_level: String,
}

// --- Default implementations ---

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            total_size_x: 5_000_000.0,
            total_size_y: 5_000_000.0,
            tile_size_x: 100_000.0,
            tile_size_y: 100_000.0,
            tile_resolution: 64,
            min_height: 0.0,
            max_height: 50_000.0,
            noise_scale: 0.00001,
            noise_octaves: 6,
            noise_persistence: 0.5,
            noise_lacunarity: 2.0,
            noise_seed: 12345,
            lod0_distance: 500_000.0,
            lod1_distance: 1_000_000.0,
            lod2_distance: 2_000_000.0,
            streaming_distance: 1_500_000.0,
            enable_streaming: true,
        }
    }
}

impl Default for FoliageTypeSpec {
    fn default() -> Self {
        Self {
            type_name: "Tree".to_string(),
            asset: None,
            density_per_km2: 500.0,
            min_scale: 0.8,
            max_scale: 1.2,
            min_spawn_height: 0.0,
            max_spawn_height: 40_000.0,
            max_spawn_slope: 0.7,
            cull_distance: 1_000_000.0,
            align_to_surface: true,
            random_yaw: true,
            random_pitch_range: 5.0,
        }
    }
}

impl Default for FoliageConfig {
    fn default() -> Self {
        Self {
            seed: 54321,
            types: vec![
                FoliageTypeSpec {
                    type_name: "Tree".to_string(),
                    asset: Some("meshes/tree".to_string()),
                    density_per_km2: 500.0,
                    min_scale: 0.8,
                    max_scale: 1.5,
                    max_spawn_height: 40_000.0,
                    cull_distance: 1_000_000.0,
                    ..Default::default()
                },
                FoliageTypeSpec {
                    type_name: "Bush".to_string(),
                    asset: Some("meshes/bush".to_string()),
                    density_per_km2: 1000.0,
                    min_scale: 0.6,
                    max_scale: 1.2,
                    max_spawn_height: 35_000.0,
                    cull_distance: 500_000.0,
                    ..Default::default()
                },
            ],
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            terrain_budget_ms: 33.0,
            foliage_budget_ms: 33.0,
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

// --- Derived quantities ---

impl TerrainConfig {
    /// Number of tile columns: `ceil(total_size_x / tile_size_x)`.
    pub fn num_tiles_x(&self) -> i32 {
        (self.total_size_x / self.tile_size_x).ceil() as i32
    }

    /// Number of tile rows: `ceil(total_size_y / tile_size_y)`.
    pub fn num_tiles_y(&self) -> i32 {
        (self.total_size_y / self.tile_size_y).ceil() as i32
    }

    /// Total number of tiles in the world grid.
    pub fn total_tiles(&self) -> i64 {
        self.num_tiles_x() as i64 * self.num_tiles_y() as i64
    }

    /// Checks that the generators can work with these values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let numbers = [
            ("min_height", self.min_height),
            ("max_height", self.max_height),
            ("noise_scale", self.noise_scale),
            ("noise_persistence", self.noise_persistence),
            ("noise_lacunarity", self.noise_lacunarity),
            ("lod0_distance", self.lod0_distance),
            ("lod1_distance", self.lod1_distance),
            ("lod2_distance", self.lod2_distance),
            ("streaming_distance", self.streaming_distance),
        ];
        require_finite("terrain", &numbers)?;

        let sizes = [
            ("total_size_x", self.total_size_x),
            ("total_size_y", self.total_size_y),
            ("tile_size_x", self.tile_size_x),
            ("tile_size_y", self.tile_size_y),
        ];
        for (name, value) in sizes {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be positive, got {value}"
                )));
            }
        }

        let columns = (self.total_size_x / self.tile_size_x).ceil();
        let rows = (self.total_size_y / self.tile_size_y).ceil();
        if columns > i32::MAX as f64
            || rows > i32::MAX as f64
            || columns * rows > MAX_TILES as f64
        {
            return Err(ConfigError::Invalid(format!(
                "tile grid of {columns} x {rows} exceeds {MAX_TILES} tiles"
            )));
        }
        if !(2..=256).contains(&self.tile_resolution) {
            return Err(ConfigError::Invalid(format!(
                "tile_resolution must be in [2, 256], got {}",
                self.tile_resolution
            )));
        }
        if self.min_height >= self.max_height {
            return Err(ConfigError::Invalid(format!(
                "min_height ({}) must be below max_height ({})",
                self.min_height, self.max_height
            )));
        }
        if self.noise_octaves == 0 {
            return Err(ConfigError::Invalid("noise_octaves must be at least 1".into()));
        }
        if !(self.lod0_distance < self.lod1_distance && self.lod1_distance < self.lod2_distance) {
            return Err(ConfigError::Invalid(format!(
                "LOD distances must be strictly increasing, got {} / {} / {}",
                self.lod0_distance, self.lod1_distance, self.lod2_distance
            )));
        }
        if self.streaming_distance < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "streaming_distance must not be negative, got {}",
                self.streaming_distance
            )));
        }
        Ok(())
    }
}

impl FoliageTypeSpec {
    /// Checks that every number is finite, then density and scale ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let numbers = [
            ("density_per_km2", self.density_per_km2),
            ("min_scale", self.min_scale),
            ("max_scale", self.max_scale),
            ("min_spawn_height", self.min_spawn_height),
            ("max_spawn_height", self.max_spawn_height),
            ("max_spawn_slope", self.max_spawn_slope),
            ("cull_distance", self.cull_distance),
            ("random_pitch_range", self.random_pitch_range),
        ];
        require_finite(&self.type_name, &numbers)?;

        if self.density_per_km2 < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "{}: density_per_km2 must not be negative",
                self.type_name
            )));
        }
        if self.min_scale > self.max_scale {
            return Err(ConfigError::Invalid(format!(
                "{}: min_scale ({}) exceeds max_scale ({})",
                self.type_name, self.min_scale, self.max_scale
            )));
        }
        if self.random_pitch_range < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "{}: random_pitch_range must not be negative",
                self.type_name
            )));
        }
        Ok(())
    }
}

impl FoliageConfig {
    /// Validates every foliage type and rejects duplicate names.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (i, spec) in self.types.iter().enumerate() {
            spec.validate()?;
            if self.types[..i].iter().any(|t| t.type_name == spec.type_name) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate foliage type name '{}'",
                    spec.type_name
                )));
            }
        }
        Ok(())
    }
}

impl GenerationConfig {
    /// Budgets must be finite and non-negative.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let budgets = [
            ("terrain_budget_ms", self.terrain_budget_ms),
            ("foliage_budget_ms", self.foliage_budget_ms),
        ];
        require_finite("generation", &budgets)?;
        for (name, value) in budgets {
            if value < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "{name} must not be negative, got {value}"
                )));
            }
        }
        Ok(())
    }

    /// Terrain step budget as a [`std::time::Duration`].
    pub fn terrain_budget(&self) -> std::time::Duration {
        budget_duration(self.terrain_budget_ms)
    }

    /// Foliage step budget as a [`std::time::Duration`].
    pub fn foliage_budget(&self) -> std::time::Duration {
        budget_duration(self.foliage_budget_ms)
    }
}

/// Milliseconds to a duration; NaN and negatives give zero, overflow saturates.
fn budget_duration(ms: f64) -> std::time::Duration {
    std::time::Duration::try_from_secs_f64(ms.max(0.0) / 1000.0)
        .unwrap_or(std::time::Duration::MAX)
}

fn require_finite(section: &str, fields: &[(&str, f64)]) -> Result<(), ConfigError> {
    match fields.iter().find(|(_, value)| !value.is_finite()) {
        Some((name, value)) => Err(ConfigError::Invalid(format!(
            "{section}.{name} must be finite, got {value}"
        ))),
        None => Ok(()),
    }
}

/// Default config directory (`<platform config dir>/terra`), if the platform has one.
pub fn default_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("terra"))
}

// --- Load / Save / Reload ---

impl Config {
    /// Validates the terrain, foliage and generation sections.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.terrain.validate()?;
        self.foliage.validate()?;
        self.generation.validate()
    }

    /// Load config from the given directory, or create a default config file.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join("config.ron");

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
            let config: Config = ron::from_str(&contents).map_err(ConfigError::ParseError)?;
            log::info!("Loaded config from {}", config_path.display());
            Ok(config)
        } else {
            let config = Config::default();
            config.save(config_dir)?;
            log::info!("Created default config at {}", config_path.display());
            Ok(config)
        }
    }

    /// Save config to the given directory as `config.ron`.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        std::fs::create_dir_all(config_dir).map_err(ConfigError::WriteError)?;

        let config_path = config_dir.join("config.ron");
        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(4)
            .separate_tuple_members(true)
            .enumerate_arrays(false);

        let serialized =
            ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::SerializeError)?;

        std::fs::write(&config_path, serialized).map_err(ConfigError::WriteError)?;
        Ok(())
    }

    /// Hot-reload: returns `Some(new_config)` if the file changed, `None` otherwise.
    pub fn reload(&self, config_dir: &Path) -> Result<Option<Self>, ConfigError> {
        let config_path = config_dir.join("config.ron");
        let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
        let new_config: Config = ron::from_str(&contents).map_err(ConfigError::ParseError)?;

        if &new_config != self {
            log::info!("Config reloaded with changes");
            Ok(Some(new_config))
        } else {
            Ok(None)
        }
    }
}
