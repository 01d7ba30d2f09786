//! Candidate filtering and instance transforms.

use glam::{DMat3, DMat4, DQuat, DVec2, DVec3, EulerRot};
use rand::Rng;
use terra_config::FoliageTypeSpec;
use terra_terrain::TerrainQuery;

/// Offset of the central-difference height samples used for surface normals.
pub const NORMAL_SAMPLE_OFFSET: f64 = 100.0;

/// Placement of one foliage instance.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct InstanceTransform {
    pub translation: DVec3,
    pub rotation: DQuat,
    /// Uniform scale.
    pub scale: f64,
}

impl InstanceTransform {
    pub fn to_matrix(&self) -> DMat4 {
        DMat4::from_scale_rotation_translation(
            DVec3::splat(self.scale),
            self.rotation,
            self.translation,
        )
    }
}

/// Why a candidate position was not used.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rejection {
    /// Height outside `[min_spawn_height, max_spawn_height]`.
    Height,
    /// Surface steeper than `max_spawn_slope`.
    Slope,
}

/// Unit surface normal at `pos` from central differences at `offset` in ±X and ±Y.
pub fn surface_normal(terrain: &dyn TerrainQuery, pos: DVec2, offset: f64) -> DVec3 {
    let left = terrain.height_at(pos - DVec2::new(offset, 0.0));
    let right = terrain.height_at(pos + DVec2::new(offset, 0.0));
    let down = terrain.height_at(pos - DVec2::new(0.0, offset));
    let up = terrain.height_at(pos + DVec2::new(0.0, offset));

    let tangent_x = DVec3::new(2.0 * offset, 0.0, right - left);
    let tangent_y = DVec3::new(0.0, 2.0 * offset, up - down);
    tangent_x.cross(tangent_y).normalize_or(DVec3::Z)
}

/// Angle between `normal` and +Z, in radians.
pub fn slope_angle(normal: DVec3) -> f64 {
    normal.dot(DVec3::Z).clamp(-1.0, 1.0).acos()
}

pub fn check_height(spec: &FoliageTypeSpec, height: f64) -> Result<(), Rejection> {
    if height < spec.min_spawn_height || height > spec.max_spawn_height {
        return Err(Rejection::Height);
    }
    Ok(())
}

pub fn check_slope(spec: &FoliageTypeSpec, normal: DVec3) -> Result<(), Rejection> {
    if slope_angle(normal) > spec.max_spawn_slope {
        return Err(Rejection::Slope);
    }
    Ok(())
}

/// Height window first, then slope.
pub fn check_candidate(
    spec: &FoliageTypeSpec,
    height: f64,
    normal: DVec3,
) -> Result<(), Rejection> {
    check_height(spec, height)?;
    check_slope(spec, normal)
}

/// Rotation taking +Z onto `normal`, with +X kept perpendicular to world Y.
pub fn surface_alignment(normal: DVec3) -> DQuat {
    let up = normal.normalize_or(DVec3::Z);
    let forward = DVec3::Y.cross(up).normalize_or(DVec3::X);
    let right = up.cross(forward);
    DQuat::from_mat3(&DMat3::from_cols(forward, right, up))
}

/// Draws scale and rotation jitter for one accepted candidate.
///
/// Yaw is drawn in `[0, 360)` degrees, pitch and roll in
/// `[-random_pitch_range, random_pitch_range]`. With `align_to_surface` the
/// jitter is applied in the surface frame.
pub fn build_transform(
    spec: &FoliageTypeSpec,
    rng: &mut impl Rng,
    position: DVec3,
    normal: DVec3,
) -> InstanceTransform {
    let scale = rng.random_range(spec.min_scale..=spec.max_scale);

    let yaw = if spec.random_yaw {
        rng.random_range(0.0..360.0)
    } else {
        0.0
    };
    let (pitch, roll) = if spec.random_pitch_range > 0.0 {
        let range = spec.random_pitch_range;
        (
            rng.random_range(-range..=range),
            rng.random_range(-range..=range),
        )
    } else {
        (0.0, 0.0)
    };

    let jitter = DQuat::from_euler(
        EulerRot::ZYX,
        f64::to_radians(yaw),
        f64::to_radians(pitch),
        f64::to_radians(roll),
    );
    let rotation = if spec.align_to_surface {
        surface_alignment(normal) * jitter
    } else {
        jitter
    };

    InstanceTransform {
        translation: position,
        rotation,
        scale,
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use terra_config::TerrainConfig;

    use super::*;

    struct Plane {
        config: TerrainConfig,
        gradient: DVec2,
    }

    impl TerrainQuery for Plane {
        fn terrain_config(&self) -> &TerrainConfig {
            &self.config
        }

        fn height_at(&self, world_pos: DVec2) -> f64 {
            world_pos.dot(self.gradient)
        }

        fn is_initialized(&self) -> bool {
            true
        }
    }

    fn spec() -> FoliageTypeSpec {
        FoliageTypeSpec {
            min_spawn_height: 0.0,
            max_spawn_height: 100.0,
            max_spawn_slope: 0.7,
            ..Default::default()
        }
    }

    fn tilted(angle: f64) -> DVec3 {
        DVec3::new(angle.sin(), 0.0, angle.cos())
    }

    #[test]
    fn test_height_and_slope_worked_scenario() {
        let spec = spec();
        assert_eq!(
            check_candidate(&spec, 150.0, DVec3::Z),
            Err(Rejection::Height)
        );
        assert_eq!(
            check_candidate(&spec, 150.0, tilted(1.2)),
            Err(Rejection::Height)
        );
        assert_eq!(check_candidate(&spec, 50.0, tilted(0.5)), Ok(()));
        assert_eq!(
            check_candidate(&spec, 50.0, tilted(0.9)),
            Err(Rejection::Slope)
        );
    }

    #[test]
    fn test_height_window_is_inclusive() {
        let spec = spec();
        assert!(check_height(&spec, 0.0).is_ok());
        assert!(check_height(&spec, 100.0).is_ok());
        assert!(check_height(&spec, -0.001).is_err());
    }

    #[test]
    fn test_flat_terrain_normal_is_up() {
        let plane = Plane {
            config: TerrainConfig::default(),
            gradient: DVec2::ZERO,
        };
        let n = surface_normal(&plane, DVec2::new(500.0, 500.0), NORMAL_SAMPLE_OFFSET);
        assert!((n - DVec3::Z).length() < 1e-12);
        assert_eq!(slope_angle(n), 0.0);
    }

    #[test]
    fn test_sloped_normal_matches_gradient() {
        // 45 degrees rising along +X.
        let plane = Plane {
            config: TerrainConfig::default(),
            gradient: DVec2::new(1.0, 0.0),
        };
        let n = surface_normal(&plane, DVec2::new(0.0, 0.0), NORMAL_SAMPLE_OFFSET);
        assert!(n.x < 0.0 && n.z > 0.0);
        assert!((n.length() - 1.0).abs() < 1e-12);
        assert!((slope_angle(n) - std::f64::consts::FRAC_PI_4).abs() < 1e-12);
    }

    #[test]
    fn test_surface_alignment_maps_up_to_normal() {
        assert!(surface_alignment(DVec3::Z).angle_between(DQuat::IDENTITY) < 1e-9);

        for normal in [tilted(0.4), DVec3::new(0.2, -0.3, 0.9).normalize(), DVec3::Y] {
            let q = surface_alignment(normal);
            assert!((q * DVec3::Z - normal).length() < 1e-9, "normal {normal}");
        }
    }

    #[test]
    fn test_transform_draws_within_ranges() {
        let spec = FoliageTypeSpec {
            min_scale: 0.5,
            max_scale: 2.0,
            random_yaw: true,
            random_pitch_range: 10.0,
            align_to_surface: false,
            ..Default::default()
        };
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        for _ in 0..100 {
            let t = build_transform(&spec, &mut rng, DVec3::new(1.0, 2.0, 3.0), DVec3::Z);
            assert!((0.5..=2.0).contains(&t.scale));
            assert_eq!(t.translation, DVec3::new(1.0, 2.0, 3.0));
            assert!((t.rotation.length() - 1.0).abs() < 1e-9);
            // Pitch and roll of at most 10 degrees each keep the up axis near +Z.
            let up = t.rotation * DVec3::Z;
            assert!(slope_angle(up) <= f64::to_radians(15.0));
        }
    }

    #[test]
    fn test_transform_without_jitter_is_identity_rotation() {
        let spec = FoliageTypeSpec {
            min_scale: 1.0,
            max_scale: 1.0,
            random_yaw: false,
            random_pitch_range: 0.0,
            align_to_surface: false,
            ..Default::default()
        };
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let t = build_transform(&spec, &mut rng, DVec3::ZERO, tilted(0.3));
        assert_eq!(t.scale, 1.0);
        assert!(t.rotation.angle_between(DQuat::IDENTITY) < 1e-12);
    }

    #[test]
    fn test_aligned_transform_follows_normal() {
        let spec = FoliageTypeSpec {
            random_yaw: true,
            random_pitch_range: 0.0,
            align_to_surface: true,
            ..Default::default()
        };
        let normal = tilted(0.5);
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let t = build_transform(&spec, &mut rng, DVec3::ZERO, normal);
        // Yaw spins about the local up axis, which the alignment maps onto the normal.
        assert!((t.rotation * DVec3::Z - normal).length() < 1e-9);
    }

    #[test]
    fn test_matrix_applies_scale_rotation_translation() {
        let t = InstanceTransform {
            translation: DVec3::new(10.0, 0.0, 0.0),
            rotation: DQuat::IDENTITY,
            scale: 2.0,
        };
        let p = t.to_matrix().transform_point3(DVec3::new(1.0, 1.0, 1.0));
        assert_eq!(p, DVec3::new(12.0, 2.0, 2.0));
    }
}
