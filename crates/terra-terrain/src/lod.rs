//! Distance-based LOD selection over the three configured thresholds.
//!
//! There is no hysteresis band: a viewpoint that oscillates across a threshold
//! flips the level on every evaluation.

use terra_config::{ConfigError, TerrainConfig};

/// Level of detail; 0 is the nearest and most detailed.
pub type LodLevel = u8;

/// Coarsest level, used beyond the last threshold.
pub const MAX_LOD: LodLevel = 3;

/// The three ascending distance thresholds separating LOD 0..3.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LodThresholds {
    distances: [f64; 3],
}

impl LodThresholds {
    /// Thresholds from the `lod0/1/2_distance` config fields.
    pub fn from_config(config: &TerrainConfig) -> Self {
        Self {
            distances: [
                config.lod0_distance,
                config.lod1_distance,
                config.lod2_distance,
            ],
        }
    }

    /// Custom thresholds; they must be finite and strictly increasing.
    pub fn new(distances: [f64; 3]) -> Result<Self, ConfigError> {
        let [near, mid, far] = distances;
        if !(distances.iter().all(|d| d.is_finite()) && near < mid && mid < far) {
            return Err(ConfigError::Invalid(format!(
                "LOD thresholds must be finite and strictly increasing, got {near} / {mid} / {far}"
            )));
        }
        Ok(Self { distances })
    }

    /// Level for a tile whose centre is `distance` away from the viewpoint.
    ///
    /// A distance equal to a threshold still belongs to the nearer level.
    pub fn select(&self, distance: f64) -> LodLevel {
        self.distances
            .iter()
            .position(|&threshold| distance <= threshold)
            .map_or(MAX_LOD, |level| level as LodLevel)
    }

    pub fn distances(&self) -> &[f64; 3] {
        &self.distances
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thresholds() -> LodThresholds {
        LodThresholds::new([100.0, 200.0, 400.0]).unwrap()
    }

    #[test]
    fn test_zero_distance_returns_lod_0() {
        assert_eq!(thresholds().select(0.0), 0);
    }

    #[test]
    fn test_threshold_boundary_belongs_to_nearer_level() {
        let t = thresholds();
        assert_eq!(t.select(100.0), 0);
        assert_eq!(t.select(100.001), 1);
        assert_eq!(t.select(200.0), 1);
        assert_eq!(t.select(400.0), 2);
        assert_eq!(t.select(400.001), 3);
    }

    #[test]
    fn test_far_distance_returns_max_lod() {
        assert_eq!(thresholds().select(f64::MAX), MAX_LOD);
    }

    #[test]
    fn test_monotonically_increasing_with_distance() {
        let t = thresholds();
        let mut prev = 0;
        for d in [0.0, 50.0, 120.0, 199.0, 250.0, 399.0, 401.0, 10_000.0] {
            let lod = t.select(d);
            assert!(lod >= prev, "LOD must not decrease with distance: d={d}");
            prev = lod;
        }
    }

    #[test]
    fn test_from_config() {
        let config = TerrainConfig::default();
        let t = LodThresholds::from_config(&config);
        assert_eq!(t.distances(), &[500_000.0, 1_000_000.0, 2_000_000.0]);
    }

    #[test]
    fn test_invalid_thresholds_rejected() {
        let err = LodThresholds::new([100.0, 50.0, 200.0]).unwrap_err();
        assert!(err.to_string().contains("strictly increasing"));
        assert!(LodThresholds::new([100.0, 200.0, f64::INFINITY]).is_err());
        assert!(LodThresholds::new([f64::NAN, 200.0, 400.0]).is_err());
    }
}
