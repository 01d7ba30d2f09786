//! Multi-octave fractal noise heightfield.
//!
//! Heights are a pure function of the absolute world coordinate and the
//! terrain config, so two tiles sampling the same boundary point always agree.

use noise::{NoiseFn, Perlin};
use terra_config::TerrainConfig;

/// Maps world coordinates to terrain heights in `[min_height, max_height]`.
///
/// Octave `i` samples Perlin noise seeded with `noise_seed + i` at frequency
/// `noise_scale * lacunarity^i` with amplitude `persistence^i`. The sum is
/// normalized by the total amplitude mass and remapped to the height range.
#[derive(Clone, Debug)]
pub struct HeightField {
    octaves: Vec<Perlin>,
    base_frequency: f64,
    persistence: f64,
    lacunarity: f64,
    min_height: f64,
    max_height: f64,
}

impl HeightField {
    /// Build the per-octave noise sources for `config`.
    pub fn new(config: &TerrainConfig) -> Self {
        let octaves = (0..config.noise_octaves)
            .map(|i| Perlin::new(config.noise_seed.wrapping_add(i)))
            .collect();
        Self {
            octaves,
            base_frequency: config.noise_scale,
            persistence: config.noise_persistence,
            lacunarity: config.noise_lacunarity,
            min_height: config.min_height,
            max_height: config.max_height,
        }
    }

    /// Height at an absolute world position.
    pub fn height(&self, world_x: f64, world_y: f64) -> f64 {
        let mut total = 0.0;
        let mut amplitude = 1.0;
        let mut frequency = self.base_frequency;
        let mut amplitude_mass = 0.0;

        for octave in &self.octaves {
            total += octave.get([world_x * frequency, world_y * frequency]) * amplitude;
            amplitude_mass += amplitude;
            amplitude *= self.persistence;
            frequency *= self.lacunarity;
        }

        if amplitude_mass <= 0.0 {
            return self.min_height;
        }

        // [-1, 1] -> [0, 1]; clamped because Perlin may overshoot slightly.
        let t = ((total / amplitude_mass + 1.0) * 0.5).clamp(0.0, 1.0);
        self.min_height + (self.max_height - self.min_height) * t
    }

    /// Number of octaves summed per sample.
    pub fn octave_count(&self) -> usize {
        self.octaves.len()
    }

    /// The `(min, max)` range every sample falls in.
    pub fn height_range(&self) -> (f64, f64) {
        (self.min_height, self.max_height)
    }
}
