//! Integer tile addressing and world-space bounds.

use std::fmt;

use glam::{DVec2, DVec3};
use terra_config::TerrainConfig;

/// Address of a tile in the world grid. Tile `(x, y)` covers
/// `[x * tile_size_x, (x + 1) * tile_size_x) × [y * tile_size_y, (y + 1) * tile_size_y)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileCoord {
    pub x: i32,
    pub y: i32,
}

impl TileCoord {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// The tile containing `pos` (floor division; no bounds check).
    pub fn from_world(pos: DVec2, config: &TerrainConfig) -> Self {
        Self {
            x: (pos.x / config.tile_size_x).floor() as i32,
            y: (pos.y / config.tile_size_y).floor() as i32,
        }
    }

    /// World-space corner with the smallest coordinates.
    pub fn origin(self, config: &TerrainConfig) -> DVec2 {
        DVec2::new(
            self.x as f64 * config.tile_size_x,
            self.y as f64 * config.tile_size_y,
        )
    }

    /// World-space centre of the tile footprint.
    pub fn center(self, config: &TerrainConfig) -> DVec2 {
        DVec2::new(
            (self.x as f64 + 0.5) * config.tile_size_x,
            (self.y as f64 + 0.5) * config.tile_size_y,
        )
    }

    /// `true` iff `0 <= x < num_tiles_x` and `0 <= y < num_tiles_y`.
    pub fn is_valid(self, config: &TerrainConfig) -> bool {
        self.x >= 0
            && self.x < config.num_tiles_x()
            && self.y >= 0
            && self.y < config.num_tiles_y()
    }
}

impl From<(i32, i32)> for TileCoord {
    fn from((x, y): (i32, i32)) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Axis-aligned world-space box.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TerrainBounds {
    pub min: DVec3,
    pub max: DVec3,
}

impl TerrainBounds {
    /// The box spanning the whole world extent and the configured height range.
    pub fn from_config(config: &TerrainConfig) -> Self {
        Self {
            min: DVec3::new(0.0, 0.0, config.min_height),
            max: DVec3::new(config.total_size_x, config.total_size_y, config.max_height),
        }
    }

    /// Returns true if the point lies inside or on the boundary.
    pub fn contains_point(&self, p: DVec3) -> bool {
        p.cmpge(self.min).all() && p.cmple(self.max).all()
    }

    pub fn size(&self) -> DVec3 {
        self.max - self.min
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_world() -> TerrainConfig {
        TerrainConfig {
            total_size_x: 300.0,
            total_size_y: 300.0,
            tile_size_x: 100.0,
            tile_size_y: 100.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_from_world_floors_negative_positions() {
        let config = small_world();
        assert_eq!(
            TileCoord::from_world(DVec2::new(-0.5, 150.0), &config),
            TileCoord::new(-1, 1)
        );
        assert_eq!(
            TileCoord::from_world(DVec2::new(100.0, 99.999), &config),
            TileCoord::new(1, 0)
        );
    }

    #[test]
    fn test_validity_bounds() {
        let config = small_world();
        assert!(TileCoord::new(0, 0).is_valid(&config));
        assert!(TileCoord::new(2, 2).is_valid(&config));
        assert!(!TileCoord::new(3, 0).is_valid(&config));
        assert!(!TileCoord::new(0, -1).is_valid(&config));
    }

    #[test]
    fn test_center_and_origin() {
        let config = small_world();
        let coord = TileCoord::new(1, 2);
        assert_eq!(coord.origin(&config), DVec2::new(100.0, 200.0));
        assert_eq!(coord.center(&config), DVec2::new(150.0, 250.0));
    }

    #[test]
    fn test_bounds_span_world_and_heights() {
        let config = TerrainConfig {
            min_height: -10.0,
            max_height: 90.0,
            ..small_world()
        };
        let bounds = TerrainBounds::from_config(&config);
        assert_eq!(bounds.size(), DVec3::new(300.0, 300.0, 100.0));
        assert!(bounds.contains_point(DVec3::new(300.0, 0.0, -10.0)));
        assert!(!bounds.contains_point(DVec3::new(150.0, 150.0, 100.0)));
    }
}
