//! Poisson-disk (blue-noise) sampling with a uniform acceleration grid.

use std::f64::consts::{SQRT_2, TAU};

use glam::DVec2;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Generate Poisson disk sample points in `[0, width) x [0, height)`.
///
/// Dart throwing around an active list: each round picks a random active
/// point and tries up to `max_attempts` candidates at a distance in
/// `[min_distance, 2 * min_distance]`. A candidate is accepted when no point
/// in the surrounding 5x5 grid cells is closer than `min_distance`. Active
/// points that run out of attempts are retired; sampling ends when none remain.
///
/// The same `seed` and parameters always reproduce the same point set.
/// Non-positive dimensions or spacing produce no points.
pub fn poisson_disk_2d(
    seed: u64,
    width: f64,
    height: f64,
    min_distance: f64,
    max_attempts: u32,
) -> Vec<DVec2> {
    if !(width > 0.0 && height > 0.0 && min_distance > 0.0) {
        return Vec::new();
    }

    let cell_size = min_distance / SQRT_2;
    let grid = Grid::new(width, height, cell_size);
    let mut sampler = Sampler {
        grid,
        points: Vec::new(),
        width,
        height,
        min_distance,
    };

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let first = DVec2::new(rng.random_range(0.0..width), rng.random_range(0.0..height));
    sampler.insert(first);
    let mut active = vec![0usize];

    while !active.is_empty() {
        let slot = rng.random_range(0..active.len());
        let origin = sampler.points[active[slot]];
        let mut accepted = false;

        for _ in 0..max_attempts {
            let angle = rng.random_range(0.0..TAU);
            let radius = rng.random_range(min_distance..=2.0 * min_distance);
            let candidate = origin + DVec2::from_angle(angle) * radius;

            if sampler.accepts(candidate) {
                active.push(sampler.insert(candidate));
                accepted = true;
                break;
            }
        }

        if !accepted {
            active.swap_remove(slot);
        }
    }

    sampler.points
}

struct Grid {
    cells: Vec<Option<usize>>,
    cols: usize,
    rows: usize,
    cell_size: f64,
}

impl Grid {
    fn new(width: f64, height: f64, cell_size: f64) -> Self {
        let cols = ((width / cell_size).ceil() as usize).max(1);
        let rows = ((height / cell_size).ceil() as usize).max(1);
        Self {
            cells: vec![None; cols * rows],
            cols,
            rows,
            cell_size,
        }
    }

    fn cell_of(&self, p: DVec2) -> (usize, usize) {
        let cx = ((p.x / self.cell_size) as usize).min(self.cols - 1);
        let cy = ((p.y / self.cell_size) as usize).min(self.rows - 1);
        (cx, cy)
    }
}

struct Sampler {
    grid: Grid,
    points: Vec<DVec2>,
    width: f64,
    height: f64,
    min_distance: f64,
}

impl Sampler {
    fn insert(&mut self, p: DVec2) -> usize {
        let index = self.points.len();
        let (cx, cy) = self.grid.cell_of(p);
        self.grid.cells[cy * self.grid.cols + cx] = Some(index);
        self.points.push(p);
        index
    }

    fn accepts(&self, p: DVec2) -> bool {
        if !(p.x >= 0.0 && p.x < self.width && p.y >= 0.0 && p.y < self.height) {
            return false;
        }

        let (cx, cy) = self.grid.cell_of(p);
        let x_range = cx.saturating_sub(2)..=(cx + 2).min(self.grid.cols - 1);
        let y_range = cy.saturating_sub(2)..=(cy + 2).min(self.grid.rows - 1);

        for y in y_range {
            for x in x_range.clone() {
                if let Some(index) = self.grid.cells[y * self.grid.cols + x]
                    && self.points[index].distance(p) < self.min_distance
                {
                    return false;
                }
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poisson_sampling_maintains_minimum_distance() {
        let min_distance = 7.5;
        let points = poisson_disk_2d(123, 200.0, 150.0, min_distance, 30);
        assert!(points.len() > 100);

        for (i, a) in points.iter().enumerate() {
            for b in &points[i + 1..] {
                let d = a.distance(*b);
                assert!(
                    d >= min_distance,
                    "points {a} and {b} are {d} apart, less than {min_distance}"
                );
            }
        }
    }

    #[test]
    fn test_points_stay_inside_region() {
        let points = poisson_disk_2d(9, 50.0, 20.0, 2.0, 30);
        assert!(!points.is_empty());
        for p in &points {
            assert!(p.x >= 0.0 && p.x < 50.0, "x out of range: {p}");
            assert!(p.y >= 0.0 && p.y < 20.0, "y out of range: {p}");
        }
    }

    #[test]
    fn test_same_seed_reproduces_points() {
        let a = poisson_disk_2d(42, 100.0, 100.0, 5.0, 30);
        let b = poisson_disk_2d(42, 100.0, 100.0, 5.0, 30);
        assert_eq!(a, b);

        let c = poisson_disk_2d(43, 100.0, 100.0, 5.0, 30);
        assert_ne!(a, c);
    }

    #[test]
    fn test_sampling_covers_the_region() {
        // Blue noise leaves no large holes.
        let min_distance = 5.0;
        let points = poisson_disk_2d(7, 100.0, 100.0, min_distance, 30);
        for gy in 0..10 {
            for gx in 0..10 {
                let probe = DVec2::new(gx as f64 * 10.0 + 5.0, gy as f64 * 10.0 + 5.0);
                let nearest = points
                    .iter()
                    .map(|p| p.distance(probe))
                    .fold(f64::INFINITY, f64::min);
                assert!(nearest < 3.0 * min_distance, "hole at {probe}");
            }
        }
    }

    #[test]
    fn test_degenerate_parameters_produce_nothing() {
        assert!(poisson_disk_2d(1, 0.0, 10.0, 1.0, 30).is_empty());
        assert!(poisson_disk_2d(1, 10.0, -1.0, 1.0, 30).is_empty());
        assert!(poisson_disk_2d(1, 10.0, 10.0, 0.0, 30).is_empty());
        assert!(poisson_disk_2d(1, 10.0, 10.0, f64::NAN, 30).is_empty());
    }

    #[test]
    fn test_spacing_larger_than_region_yields_single_point() {
        let points = poisson_disk_2d(5, 10.0, 10.0, 100.0, 30);
        assert_eq!(points.len(), 1);
    }

    #[test]
    fn test_zero_attempts_keeps_only_seed_point() {
        let points = poisson_disk_2d(5, 100.0, 100.0, 5.0, 0);
        assert_eq!(points.len(), 1);
    }
}
