// Copyright @yucwang 2026

use crate::math::aabb::BBox;
use crate::math::constants::{ Float, Vector3f };
use crate::math::spectrum::RGBSpectrum;

use std::sync::Arc;

/// A light source.
pub trait Light: Send + Sync {
    /// Samples the light for a point to be illuminated.
    ///
    /// `shadow_vec` receives the world-space vector to cast a shadow ray
    /// along; its length bounds the shadow ray's extent unless the light is
    /// infinite. Returns the radiance arriving at `arr`, ignoring
    /// occlusion.
    fn sample(&self, arr: &Vector3f, u: Float, v: Float, time: Float,
              shadow_vec: &mut Vector3f) -> RGBSpectrum;

    /// The radiance emitted in `dir` from the sampled point (u, v).
    fn outgoing(&self, dir: &Vector3f, u: Float, v: Float, time: Float) -> RGBSpectrum;

    /// The radiance that would arrive at `arr` assuming full visibility.
    fn arriving(&self, arr: &Vector3f, u: Float, v: Float, time: Float) -> RGBSpectrum {
        let mut shadow_vec = Vector3f::new(0.0, 0.0, 0.0);
        self.sample(arr, u, v, time, &mut shadow_vec)
    }

    /// Whether no random process can hit this light (point lights,
    /// single-direction emitters).
    fn is_delta(&self) -> bool;

    /// Whether the light exists outside the scene, direction-only (sun,
    /// sky dome).
    fn is_infinite(&self) -> bool;

    fn total_energy(&self) -> Float;

    fn bounds(&self) -> BBox;
}

/// A flat array of finite lights with uniform selection.
#[derive(Default)]
pub struct LightArray {
    lights: Vec<Arc<dyn Light>>,
    total_energy: Float,
}

impl LightArray {
    pub fn build(lights: Vec<Arc<dyn Light>>) -> Self {
        let total_energy = lights.iter().map(|l| l.total_energy()).sum();
        Self { lights, total_energy }
    }

    pub fn len(&self) -> usize {
        self.lights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lights.is_empty()
    }

    pub fn get(&self, index: usize) -> &dyn Light {
        self.lights[index].as_ref()
    }

    /// Picks a light uniformly from a unit random number. Returns the
    /// index and the reciprocal of the selection probability, the factor
    /// that keeps a single-light estimate unbiased.
    pub fn select(&self, n: Float) -> Option<(usize, Float)> {
        if self.lights.is_empty() {
            return None;
        }
        let count = self.lights.len();
        let index = ((n * count as Float) as usize).min(count - 1);
        Some((index, count as Float))
    }

    pub fn total_energy(&self) -> Float {
        self.total_energy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeLight {
        energy: Float,
    }

    impl Light for FakeLight {
        fn sample(&self, _arr: &Vector3f, _u: Float, _v: Float, _time: Float,
                  shadow_vec: &mut Vector3f) -> RGBSpectrum {
            *shadow_vec = Vector3f::new(0.0, 0.0, 1.0);
            RGBSpectrum::new(self.energy, self.energy, self.energy)
        }

        fn outgoing(&self, _dir: &Vector3f, _u: Float, _v: Float, _time: Float) -> RGBSpectrum {
            RGBSpectrum::default()
        }

        fn is_delta(&self) -> bool {
            true
        }

        fn is_infinite(&self) -> bool {
            false
        }

        fn total_energy(&self) -> Float {
            self.energy
        }

        fn bounds(&self) -> BBox {
            BBox::from_point(Vector3f::new(0.0, 0.0, 0.0))
        }
    }

    #[test]
    fn test_select_covers_all_lights() {
        let lights: Vec<Arc<dyn Light>> = (0..4)
            .map(|i| Arc::new(FakeLight { energy: i as Float }) as Arc<dyn Light>)
            .collect();
        let array = LightArray::build(lights);

        let (first, scale) = array.select(0.0).unwrap();
        assert_eq!(first, 0);
        assert_eq!(scale, 4.0);

        let (last, _) = array.select(1.0).unwrap();
        assert_eq!(last, 3);

        assert!((array.total_energy() - 6.0).abs() < 1e-6);
    }

    #[test]
    fn test_select_on_empty_array() {
        let array = LightArray::default();
        assert!(array.select(0.5).is_none());
    }
}
