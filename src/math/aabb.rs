// Copyright 2020 @TwoCookingMice

use super::constants::{ Float, Vector3f, FLOAT_MAX, FLOAT_MIN };
use super::ray::Ray;
use super::timebox::Lerp;
use super::transform::Transform;

/// An axis-aligned bounding box.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct BBox {
    pub min: Vector3f,
    pub max: Vector3f
}

impl Default for BBox {
    fn default() -> Self {
        Self { min: Vector3f::new(FLOAT_MAX, FLOAT_MAX, FLOAT_MAX),
               max: Vector3f::new(FLOAT_MIN, FLOAT_MIN, FLOAT_MIN) }
    }
}

impl BBox {
    pub fn new(a: Vector3f, b: Vector3f) -> Self {
        let mut min = Vector3f::new(0.0, 0.0, 0.0);
        let mut max = Vector3f::new(0.0, 0.0, 0.0);
        for idx in 0..3 {
            min[idx] = a[idx].min(b[idx]);
            max[idx] = a[idx].max(b[idx]);
        }
        Self { min, max }
    }

    pub fn from_point(p: Vector3f) -> Self {
        Self { min: p, max: p }
    }

    pub fn center(&self) -> Vector3f {
        0.5f32 * self.min + 0.5f32 * self.max
    }

    pub fn expand_by_point(&mut self, p: &Vector3f) {
        for idx in 0..3 {
            self.min[idx] = self.min[idx].min(p[idx]);
            self.max[idx] = self.max[idx].max(p[idx]);
        }
    }

    pub fn expand_by_bbox(&mut self, other: &BBox) {
        for idx in 0..3 {
            self.min[idx] = self.min[idx].min(other.min[idx]);
            self.max[idx] = self.max[idx].max(other.max[idx]);
        }
    }

    /// Grows the box by a margin on every axis.
    pub fn inflate(&mut self, margin: Float) {
        for idx in 0..3 {
            self.min[idx] -= margin;
            self.max[idx] += margin;
        }
    }

    pub fn surface_area(&self) -> Float {
        let a = self.max[0] - self.min[0];
        let b = self.max[1] - self.min[1];
        let c = self.max[2] - self.min[2];

        2.0f32 * (a * b + a * c + b * c)
    }

    pub fn diagonal(&self) -> Vector3f {
        self.max - self.min
    }

    pub fn max_extent(&self) -> usize {
        let diagonal = self.diagonal();
        if diagonal[0] > diagonal[1] && diagonal[0] > diagonal[2] {
            0
        } else if diagonal[1] > diagonal[2] {
            1
        } else {
            2
        }
    }

    pub fn is_valid(&self) -> bool {
        for idx in 0..3 {
            if self.min[idx] > self.max[idx] {
                return false;
            }
        }
        true
    }

    /// The box carried through the inverse of a transform, as when instance
    /// local bounds are lifted into the parent assembly's space.
    pub fn inverse_transformed(&self, xform: &Transform) -> BBox {
        let mut out = BBox::default();
        for i in 0..8 {
            let corner = Vector3f::new(
                if i & 1 == 0 { self.min[0] } else { self.max[0] },
                if i & 2 == 0 { self.min[1] } else { self.max[1] },
                if i & 4 == 0 { self.min[2] } else { self.max[2] },
            );
            out.expand_by_point(&xform.inv_apply_point(corner));
        }
        out
    }

    /// Slab test using the ray's precomputed `d_inv` and `d_sign`. The
    /// tested interval is [ray.min_t, min(ray.max_t, t_cap)]. Returns the
    /// entry and exit distances on a hit. Axes the ray runs parallel to
    /// produce NaN slab distances, which min/max filtering discards.
    pub fn intersect_ray(&self, ray: &Ray, t_cap: Float) -> Option<(Float, Float)> {
        if !self.is_valid() {
            return None;
        }

        let bounds = [&self.min, &self.max];
        let mut tmin = ray.min_t;
        let mut tmax = ray.max_t.min(t_cap);

        for axis in 0..3 {
            let sign = ray.d_sign[axis];
            let near = (bounds[sign][axis] - ray.o[axis]) * ray.d_inv[axis];
            let far = (bounds[1 - sign][axis] - ray.o[axis]) * ray.d_inv[axis];
            tmin = tmin.max(near);
            tmax = tmax.min(far);
            if tmin > tmax {
                return None;
            }
        }

        Some((tmin, tmax))
    }
}

impl Lerp for BBox {
    fn lerp(&self, other: &Self, alpha: Float) -> Self {
        BBox {
            min: self.min.lerp(&other.min, alpha),
            max: self.max.lerp(&other.max, alpha),
        }
    }
}

/* Tests for BBox */

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::ray::{ RayType, WorldRay };

    fn ray_from(o: Vector3f, d: Vector3f) -> Ray {
        WorldRay::new(o, d, 0.0, RayType::Camera).to_ray(0)
    }

    #[test]
    fn test_bbox_geometry() {
        let mut bbox = BBox::new(Vector3f::new(1.0, 7.0, 3.0), Vector3f::new(4.0, 4.0, 4.0));
        assert!(bbox.is_valid());

        let center = bbox.center();
        assert!((center[0] - 2.5).abs() < 1e-6);
        assert!((center[1] - 5.5).abs() < 1e-6);
        assert!((center[2] - 3.5).abs() < 1e-6);

        bbox.expand_by_point(&Vector3f::new(-1.0, 5.0, 6.0));
        assert!((bbox.min[0] + 1.0).abs() < 1e-6);
        assert!((bbox.max[2] - 6.0).abs() < 1e-6);
        assert_eq!(bbox.max_extent(), 0);

        let mut merged = BBox::default();
        merged.expand_by_bbox(&bbox);
        assert!((merged.min[0] + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_slab_hit_and_miss() {
        let bbox = BBox::new(Vector3f::new(-1.0, -1.0, 4.0), Vector3f::new(1.0, 1.0, 6.0));

        let hit = ray_from(Vector3f::new(0.0, 0.0, 0.0), Vector3f::new(0.0, 0.0, 1.0));
        let (tnear, tfar) = bbox.intersect_ray(&hit, FLOAT_MAX).expect("expected hit");
        assert!((tnear - 4.0).abs() < 1e-5);
        assert!((tfar - 6.0).abs() < 1e-5);

        let miss = ray_from(Vector3f::new(0.0, 0.0, 0.0), Vector3f::new(0.0, 0.0, -1.0));
        assert!(bbox.intersect_ray(&miss, FLOAT_MAX).is_none());

        let offside = ray_from(Vector3f::new(5.0, 0.0, 0.0), Vector3f::new(0.0, 0.0, 1.0));
        assert!(bbox.intersect_ray(&offside, FLOAT_MAX).is_none());
    }

    #[test]
    fn test_slab_respects_t_cap() {
        let bbox = BBox::new(Vector3f::new(-1.0, -1.0, 9.0), Vector3f::new(1.0, 1.0, 11.0));
        let ray = ray_from(Vector3f::new(0.0, 0.0, 0.0), Vector3f::new(0.0, 0.0, 1.0));

        assert!(bbox.intersect_ray(&ray, 5.0).is_none());
        assert!(bbox.intersect_ray(&ray, 20.0).is_some());
    }

    #[test]
    fn test_slab_parallel_axis() {
        // Ray parallel to the X slabs, origin inside the X extent.
        let bbox = BBox::new(Vector3f::new(-1.0, -1.0, 4.0), Vector3f::new(1.0, 1.0, 6.0));
        let inside = ray_from(Vector3f::new(0.5, 0.0, 0.0), Vector3f::new(0.0, 0.0, 1.0));
        assert!(bbox.intersect_ray(&inside, FLOAT_MAX).is_some());

        let outside = ray_from(Vector3f::new(2.0, 0.0, 0.0), Vector3f::new(0.0, 0.0, 1.0));
        assert!(bbox.intersect_ray(&outside, FLOAT_MAX).is_none());
    }

    #[test]
    fn test_lerp_between_motion_samples() {
        let a = BBox::new(Vector3f::new(0.0, 0.0, 0.0), Vector3f::new(1.0, 1.0, 1.0));
        let b = BBox::new(Vector3f::new(2.0, 0.0, 0.0), Vector3f::new(3.0, 1.0, 1.0));
        let mid = a.lerp(&b, 0.5);
        assert!((mid.min[0] - 1.0).abs() < 1e-6);
        assert!((mid.max[0] - 2.0).abs() < 1e-6);
    }
}
