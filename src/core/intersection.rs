// Copyright @yucwang 2026

use crate::math::constants::{ Float, Vector2f, Vector3f, FLOAT_MAX };
use crate::math::spectrum::RGBSpectrum;

/// Everything a ray test records about its closest hit.
///
/// `t` starts at infinity so it doubles as the closest-hit bound while the
/// tracer dispatches candidate tests for the same ray.
#[derive(Debug, Copy, Clone)]
pub struct Intersection {
    pub hit: bool,
    pub backfacing: bool,

    pub t: Float,
    pub p: Vector3f,
    pub n: Vector3f,
    pub uv: Vector2f,

    /// The incoming ray direction at the hit.
    pub incoming: Vector3f,
    /// Ray width parameters at the hit: width at t = 0 and its change rate.
    pub ow: Float,
    pub dw: Float,

    /// Offset for spawned rays to clear the surface. Add for reflection,
    /// subtract for transmission.
    pub offset: Vector3f,

    pub col: RGBSpectrum,
    pub instance_id: u64,
}

impl Default for Intersection {
    fn default() -> Self {
        Self {
            hit: false,
            backfacing: false,
            t: FLOAT_MAX,
            p: Vector3f::new(0.0, 0.0, 0.0),
            n: Vector3f::new(0.0, 0.0, 1.0),
            uv: Vector2f::new(0.0, 0.0),
            incoming: Vector3f::new(0.0, 0.0, 1.0),
            ow: 0.0,
            dw: 0.0,
            offset: Vector3f::new(0.0, 0.0, 0.0),
            col: RGBSpectrum::default(),
            instance_id: 0,
        }
    }
}

impl Intersection {
    /// The ray width at the hit point.
    pub fn width_at_hit(&self) -> Float {
        self.ow + self.dw * self.t
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_a_miss_at_infinity() {
        let isect = Intersection::default();
        assert!(!isect.hit);
        assert_eq!(isect.t, FLOAT_MAX);
    }

    #[test]
    fn test_width_at_hit() {
        let isect = Intersection {
            ow: 0.1,
            dw: 0.02,
            t: 5.0,
            ..Default::default()
        };
        assert!((isect.width_at_hit() - 0.2).abs() < 1e-6);
    }
}
