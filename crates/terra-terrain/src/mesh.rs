//! Regular-grid tile mesh: positions, smooth normals, UVs, height colours, and indices.

use glam::{DVec2, Vec3};

use crate::lod::LodLevel;

/// Grid cells per edge at `lod`: `max(2, base_resolution >> lod)`.
pub fn lod_resolution(base_resolution: u32, lod: LodLevel) -> u32 {
    (base_resolution >> lod).max(2)
}

/// Geometry for one tile at one LOD, ready for a full mesh-replace upload.
///
/// Positions are tile-local (origin at the tile corner, Z up).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TileMesh {
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub uvs: Vec<[f32; 2]>,
    /// Greyscale RGBA; the grey value is the height normalized to `[0, 1]`.
    pub colors: Vec<[f32; 4]>,
    /// Triangle list, counter-clockwise seen from above.
    pub indices: Vec<u32>,
    /// Cells per edge this mesh was built with.
    pub resolution: u32,
}

impl TileMesh {
    /// Builds a `(resolution + 1)²` vertex grid over a tile of `size`.
    ///
    /// `height_at` receives tile-local coordinates. `height_range` maps heights
    /// to vertex colours.
    pub fn build_grid(
        resolution: u32,
        size: DVec2,
        height_range: (f64, f64),
        height_at: impl Fn(f64, f64) -> f64,
    ) -> Self {
        let verts_per_edge = resolution as usize + 1;
        let vertex_count = verts_per_edge * verts_per_edge;
        let (min_height, max_height) = height_range;
        let span = max_height - min_height;

        let mut mesh = Self {
            positions: Vec::with_capacity(vertex_count),
            normals: Vec::new(),
            uvs: Vec::with_capacity(vertex_count),
            colors: Vec::with_capacity(vertex_count),
            indices: Vec::with_capacity(resolution as usize * resolution as usize * 6),
            resolution,
        };

        for gy in 0..=resolution {
            for gx in 0..=resolution {
                let u = gx as f64 / resolution as f64;
                let v = gy as f64 / resolution as f64;
                let local_x = u * size.x;
                let local_y = v * size.y;
                let height = height_at(local_x, local_y);

                mesh.positions
                    .push([local_x as f32, local_y as f32, height as f32]);
                mesh.uvs.push([u as f32, v as f32]);

                let grey = if span > 0.0 {
                    ((height - min_height) / span).clamp(0.0, 1.0) as f32
                } else {
                    0.0
                };
                mesh.colors.push([grey, grey, grey, 1.0]);
            }
        }

        let stride = verts_per_edge as u32;
        for gy in 0..resolution {
            for gx in 0..resolution {
                let i00 = gy * stride + gx;
                let i10 = i00 + 1;
                let i01 = i00 + stride;
                let i11 = i01 + 1;
                mesh.indices
                    .extend_from_slice(&[i00, i10, i01, i10, i11, i01]);
            }
        }

        mesh.normals = smooth_normals(&mesh.positions, &mesh.indices);
        mesh
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// Accumulates unit face normals into each triangle's vertices, then normalizes.
fn smooth_normals(positions: &[[f32; 3]], indices: &[u32]) -> Vec<[f32; 3]> {
    let mut accum = vec![Vec3::ZERO; positions.len()];

    for tri in indices.chunks_exact(3) {
        let [a, b, c] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
        let v0 = Vec3::from(positions[a]);
        let v1 = Vec3::from(positions[b]);
        let v2 = Vec3::from(positions[c]);
        let face = (v1 - v0).cross(v2 - v0).normalize_or_zero();
        accum[a] += face;
        accum[b] += face;
        accum[c] += face;
    }

    accum
        .into_iter()
        .map(|n| n.normalize_or(Vec3::Z).to_array())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat(resolution: u32) -> TileMesh {
        TileMesh::build_grid(resolution, DVec2::new(100.0, 100.0), (0.0, 10.0), |_, _| 5.0)
    }

    #[test]
    fn test_lod_resolution_halves_with_floor_of_two() {
        assert_eq!(lod_resolution(64, 0), 64);
        assert_eq!(lod_resolution(64, 1), 32);
        assert_eq!(lod_resolution(64, 3), 8);
        assert_eq!(lod_resolution(4, 2), 2);
        assert_eq!(lod_resolution(4, 3), 2);
    }

    #[test]
    fn test_grid_counts() {
        let mesh = flat(4);
        assert_eq!(mesh.vertex_count(), 25);
        assert_eq!(mesh.uvs.len(), 25);
        assert_eq!(mesh.colors.len(), 25);
        assert_eq!(mesh.normals.len(), 25);
        assert_eq!(mesh.triangle_count(), 32);
        assert!(mesh.indices.iter().all(|&i| (i as usize) < mesh.vertex_count()));
    }

    #[test]
    fn test_flat_grid_normals_point_up() {
        let mesh = flat(3);
        for n in &mesh.normals {
            assert!((n[2] - 1.0).abs() < 1e-6, "normal {n:?} should be +Z");
        }
    }

    #[test]
    fn test_winding_is_counter_clockwise_from_above() {
        let mesh = flat(2);
        for tri in mesh.indices.chunks_exact(3) {
            let v0 = Vec3::from(mesh.positions[tri[0] as usize]);
            let v1 = Vec3::from(mesh.positions[tri[1] as usize]);
            let v2 = Vec3::from(mesh.positions[tri[2] as usize]);
            assert!((v1 - v0).cross(v2 - v0).z > 0.0);
        }
    }

    #[test]
    fn test_uvs_span_unit_square() {
        let mesh = flat(4);
        assert_eq!(mesh.uvs[0], [0.0, 0.0]);
        assert_eq!(mesh.uvs[24], [1.0, 1.0]);
        assert_eq!(mesh.positions[24], [100.0, 100.0, 5.0]);
    }

    #[test]
    fn test_colors_are_normalized_heights() {
        let mesh = TileMesh::build_grid(2, DVec2::new(10.0, 10.0), (0.0, 10.0), |x, _| x);
        assert_eq!(mesh.colors[0], [0.0, 0.0, 0.0, 1.0]);
        assert_eq!(mesh.colors[1], [0.5, 0.5, 0.5, 1.0]);
        assert_eq!(mesh.colors[2], [1.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_sloped_grid_normals_tilt_against_slope() {
        // Height rises along +X, so normals lean toward -X.
        let mesh = TileMesh::build_grid(2, DVec2::new(10.0, 10.0), (0.0, 10.0), |x, _| x);
        for n in &mesh.normals {
            assert!(n[0] < 0.0 && n[2] > 0.0, "unexpected normal {n:?}");
            let len = (n[0] * n[0] + n[1] * n[1] + n[2] * n[2]).sqrt();
            assert!((len - 1.0).abs() < 1e-5);
        }
    }
}
