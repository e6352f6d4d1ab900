// Copyright @yucwang 2026

use crate::core::config::Config;
use crate::math::constants::{ Float, Vector2f, Vector3f };
use crate::math::ray::{ RayType, WorldRay };
use crate::math::timebox::TimeBox;
use crate::math::transform::Transform;
use crate::math::warp::sample_uniform_disk_concentric;

/// A thin-lens camera with motion-blurred transforms.
///
/// Rays start on the lens disk and aim so that points at the focus
/// distance stay sharp; the lens diameter controls how quickly everything
/// else defocuses. Camera space looks down +z.
pub struct ThinLensCamera {
    transforms: TimeBox<Transform>,
    fov: Float,
    tfov: Float,
    lens_diameter: Float,
    focus_distance: Float,
}

impl ThinLensCamera {
    /// `transforms` carry camera space into world space, sampled across
    /// the shutter.
    pub fn new(transforms: Vec<Transform>, fov: Float,
               lens_diameter: Float, focus_distance: Float) -> Self {
        debug_assert!(!transforms.is_empty());
        debug_assert!(focus_distance > 0.0);
        Self {
            transforms: TimeBox::from_samples(transforms),
            fov,
            tfov: (fov / 2.0).sin() / (fov / 2.0).cos(),
            lens_diameter,
            focus_distance,
        }
    }

    pub fn fov(&self) -> Float {
        self.fov
    }

    /// Generates a camera ray for an image-plane position `(x, y)` (in
    /// screen window units), its pixel footprint `(dx, dy)`, a shutter
    /// time, and a lens sample `(u, v)`.
    pub fn generate_ray(&self, x: Float, y: Float, dx: Float, dy: Float,
                        time: Float, u: Float, v: Float) -> WorldRay {
        let focus_factor = Config::get().focus_factor;

        // Lens position: concentric square-to-disk, scaled to the lens.
        let disk = sample_uniform_disk_concentric(&Vector2f::new(u, v));
        let o = Vector3f::new(
            disk[0] * self.lens_diameter * 0.5,
            disk[1] * self.lens_diameter * 0.5,
            0.0,
        );

        // Aim through the in-focus point for this image position.
        let d = Vector3f::new(
            (x * self.tfov) - (o[0] / self.focus_distance),
            (y * self.tfov) - (o[1] / self.focus_distance),
            1.0,
        )
        .normalize();

        // Image-plane footprint on the direction, lens footprint on the
        // origin; the lens term converges toward the focus plane.
        let lens_spread = self.lens_diameter * focus_factor;
        let mut wray = WorldRay::new(o, d, time, RayType::Camera);
        wray.odx = Vector3f::new(lens_spread, 0.0, 0.0);
        wray.ody = Vector3f::new(0.0, lens_spread, 0.0);
        wray.ddx = Vector3f::new(dx - lens_spread / self.focus_distance, 0.0, 0.0);
        wray.ddy = Vector3f::new(0.0, dy - lens_spread / self.focus_distance, 0.0);

        let xform = self.transforms.at_time(time);
        wray.transformed(&xform)
    }
}

/* Tests for the thin-lens camera */

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::constants::PI;

    fn pinhole() -> ThinLensCamera {
        ThinLensCamera::new(vec![Transform::default()], PI / 2.0, 0.0, 10.0)
    }

    #[test]
    fn test_center_ray_points_forward() {
        let camera = pinhole();
        let wray = camera.generate_ray(0.0, 0.0, 0.01, 0.01, 0.0, 0.5, 0.5);

        assert!(wray.o.norm() < 1e-6);
        assert!((wray.d - Vector3f::new(0.0, 0.0, 1.0)).norm() < 1e-6);
    }

    #[test]
    fn test_image_position_tilts_direction() {
        let camera = pinhole();
        let wray = camera.generate_ray(1.0, 0.0, 0.01, 0.01, 0.0, 0.5, 0.5);

        // fov of 90 degrees puts x = 1 at 45 degrees off axis.
        assert!(wray.d[0] > 0.0);
        assert!((wray.d[0] - wray.d[2]).abs() < 1e-5);
    }

    #[test]
    fn test_ray_has_pixel_differentials() {
        let camera = pinhole();
        let wray = camera.generate_ray(0.0, 0.0, 0.02, 0.03, 0.0, 0.5, 0.5);
        let ray = wray.to_ray(0);

        // With a closed lens the footprint grows at the pixel rate.
        assert!((ray.width(10.0) - 0.2).abs() < 1e-4);
    }

    #[test]
    fn test_lens_samples_spread_origins() {
        let camera = ThinLensCamera::new(vec![Transform::default()], PI / 2.0, 1.0, 10.0);
        let a = camera.generate_ray(0.0, 0.0, 0.01, 0.01, 0.0, 0.1, 0.5);
        let b = camera.generate_ray(0.0, 0.0, 0.01, 0.01, 0.0, 0.9, 0.5);

        assert!((a.o - b.o).norm() > 1e-3);
        assert!(a.o.norm() <= 0.5 + 1e-5);
    }

    #[test]
    fn test_transform_motion_moves_rays() {
        let start = Transform::default();
        let end = Transform::from_translation(Vector3f::new(4.0, 0.0, 0.0));
        let camera = ThinLensCamera::new(vec![start, end], PI / 2.0, 0.0, 10.0);

        let early = camera.generate_ray(0.0, 0.0, 0.01, 0.01, 0.0, 0.5, 0.5);
        let mid = camera.generate_ray(0.0, 0.0, 0.01, 0.01, 0.5, 0.5, 0.5);

        assert!(early.o.norm() < 1e-6);
        assert!((mid.o[0] - 2.0).abs() < 1e-5);
    }
}
