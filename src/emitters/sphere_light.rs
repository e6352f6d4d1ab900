// Copyright @yucwang 2026

use crate::core::light::Light;
use crate::math::aabb::BBox;
use crate::math::constants::{ Float, Vector2f, Vector3f, EPSILON };
use crate::math::spectrum::RGBSpectrum;
use crate::math::timebox::TimeBox;
use crate::math::warp::sample_uniform_sphere;

/// A finite spherical emitter with a motion-blurred center. A zero radius
/// degenerates to a point light.
pub struct SphereLight {
    centers: TimeBox<Vector3f>,
    radius: Float,
    color: RGBSpectrum,
}

impl SphereLight {
    pub fn new(centers: Vec<Vector3f>, radius: Float, color: RGBSpectrum) -> Self {
        debug_assert!(!centers.is_empty());
        Self {
            centers: TimeBox::from_samples(centers),
            radius,
            color,
        }
    }
}

impl Light for SphereLight {
    fn sample(&self, arr: &Vector3f, u: Float, v: Float, time: Float,
              shadow_vec: &mut Vector3f) -> RGBSpectrum {
        let center = self.centers.at_time(time);
        let surface = center + sample_uniform_sphere(&Vector2f::new(u, v)) * self.radius;
        *shadow_vec = surface - arr;

        let dist2 = shadow_vec.norm_squared().max(EPSILON * EPSILON);
        self.color * (1.0 / dist2)
    }

    fn outgoing(&self, _dir: &Vector3f, _u: Float, _v: Float, _time: Float) -> RGBSpectrum {
        self.color
    }

    fn is_delta(&self) -> bool {
        self.radius == 0.0
    }

    fn is_infinite(&self) -> bool {
        false
    }

    fn total_energy(&self) -> Float {
        self.color.energy()
    }

    fn bounds(&self) -> BBox {
        let mut bbox = BBox::default();
        for center in self.centers.samples() {
            bbox.expand_by_point(center);
        }
        bbox.inflate(self.radius);
        bbox
    }
}
