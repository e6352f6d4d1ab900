// Copyright @yucwang 2023

use super::constants::{ Float, Vector2f, Vector3f, PI };

/// Maps the unit square onto the unit disk, preserving relative area.
pub fn sample_uniform_disk_concentric(u: &Vector2f) -> Vector2f {
    let r1: Float = 2.0 * u.x - 1.0;
    let r2: Float = 2.0 * u.y - 1.0;

    let phi: Float;
    let r:   Float;

    if r1 == 0. && r2 == 0. {
        r = 0.0;
        phi = 0.0;
    } else if r1 * r1 > r2 * r2 {
        r = r1;
        phi = (PI / 4.0) * (r2 / r1);
    } else {
        r = r2;
        phi = (PI / 2.0) - (r1 / r2) * (PI / 4.0);
    }

    let (sin_phi, cos_phi) = phi.sin_cos();

    Vector2f::new(r * cos_phi, r * sin_phi)
}

/// Maps the unit square onto the unit sphere surface.
pub fn sample_uniform_sphere(u: &Vector2f) -> Vector3f {
    let z: Float = 1.0 - 2.0 * u.x;
    let r: Float = (1.0 - z * z).max(0.0).sqrt();
    let phi: Float = 2.0 * PI * u.y;

    Vector3f::new(r * phi.cos(), r * phi.sin(), z)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disk_samples_stay_in_disk() {
        for i in 0..8 {
            for j in 0..8 {
                let u = Vector2f::new(i as Float / 7.0, j as Float / 7.0);
                let p = sample_uniform_disk_concentric(&u);
                assert!(p.norm() <= 1.0 + 1e-6);
            }
        }
    }

    #[test]
    fn test_disk_center_maps_to_center() {
        let p = sample_uniform_disk_concentric(&Vector2f::new(0.5, 0.5));
        assert!(p.norm() < 1e-6);
    }

    #[test]
    fn test_sphere_samples_are_unit() {
        for i in 0..8 {
            for j in 0..8 {
                let u = Vector2f::new(i as Float / 7.0, j as Float / 7.0);
                let p = sample_uniform_sphere(&u);
                assert!((p.norm() - 1.0).abs() < 1e-5);
            }
        }
    }
}
