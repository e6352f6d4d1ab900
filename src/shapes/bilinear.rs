// Copyright @yucwang 2026

use super::grid::{micro_cache, Grid, MicroSurface};
use crate::core::config::Config;
use crate::core::intersection::Intersection;
use crate::core::lru_cache::CacheKey;
use crate::core::primitive::{Diceable, Primitive};
use crate::core::stats;
use crate::math::aabb::BBox;
use crate::math::constants::{ Float, Vector2f, Vector3f, FLOAT_MAX };
use crate::math::ray::Ray;
use crate::math::timebox::TimeBox;

use std::sync::{Arc, Mutex, MutexGuard};

/// A time-varying quadrilateral, diced on demand into a micropolygon grid
/// sized to the footprint of the rays that reach it.
///
/// Corner order runs around the quad: v0 -> v1 along u, v0 -> v3 along v.
pub struct BilinearPatch {
    verts: TimeBox<[Vector3f; 4]>,
    u_min: Float,
    u_max: Float,
    v_min: Float,
    v_max: Float,
    bbox: TimeBox<BBox>,
    dice: Mutex<DiceState>,
}

struct DiceState {
    microsurface_key: CacheKey,
    last_ray_width: Float,
}

impl BilinearPatch {
    pub fn new(verts: Vec<[Vector3f; 4]>) -> Self {
        Self::with_uv_range(verts, 0.0, 1.0, 0.0, 1.0)
    }

    pub fn from_corners(v1: Vector3f, v2: Vector3f, v3: Vector3f, v4: Vector3f) -> Self {
        Self::new(vec![[v1, v2, v3, v4]])
    }

    fn with_uv_range(verts: Vec<[Vector3f; 4]>,
                     u_min: Float, u_max: Float,
                     v_min: Float, v_max: Float) -> Self {
        debug_assert!(!verts.is_empty());

        let displace = Config::get().displace_distance;
        let bounds = verts
            .iter()
            .map(|corners| {
                let mut bbox = BBox::default();
                for corner in corners {
                    bbox.expand_by_point(corner);
                }
                bbox.inflate(displace);
                bbox
            })
            .collect();

        Self {
            verts: TimeBox::from_samples(verts),
            u_min,
            u_max,
            v_min,
            v_max,
            bbox: TimeBox::from_samples(bounds),
            dice: Mutex::new(DiceState {
                microsurface_key: 0,
                last_ray_width: FLOAT_MAX,
            }),
        }
    }

    pub fn uv_range(&self) -> (Float, Float, Float, Float) {
        (self.u_min, self.u_max, self.v_min, self.v_max)
    }

    /// Dicing rates along u and v for a target footprint, doubling until a
    /// micropolygon edge fits under it and clamping at the configured cap.
    fn uv_dice_rate(&self, width: Float) -> (usize, usize) {
        let config = Config::get();
        let max_rate = config.max_grid_size.max(1);
        let target = width * config.dice_rate;

        let corners = self.verts.get(0);
        let u_len = (corners[0] - corners[1]).norm().max((corners[3] - corners[2]).norm());
        let v_len = (corners[0] - corners[3]).norm().max((corners[1] - corners[2]).norm());

        (rate_for(u_len, target, max_rate), rate_for(v_len, target, max_rate))
    }

    fn dice(&self, res_u: usize, res_v: usize) -> Grid {
        let time_count = self.verts.len();
        let mut grid = Grid::new(res_u, res_v, time_count);
        grid.corner_uvs = [
            Vector2f::new(self.u_min, self.v_min),
            Vector2f::new(self.u_max, self.v_min),
            Vector2f::new(self.u_min, self.v_max),
            Vector2f::new(self.u_max, self.v_max),
        ];

        for time in 0..time_count {
            let corners = self.verts.get(time);

            let du1 = (corners[1] - corners[0]) / (res_u - 1) as Float;
            let du2 = (corners[2] - corners[3]) / (res_u - 1) as Float;

            let mut p1 = corners[0];
            let mut p2 = corners[3];

            for x in 0..res_u {
                let dv = (p2 - p1) / (res_v - 1) as Float;
                let mut p3 = p1;

                for y in 0..res_v {
                    let index = grid.vert_index(x, y, time);
                    grid.verts[index] = p3;
                    p3 += dv;
                }

                p1 += du1;
                p2 += du2;
            }
        }

        grid
    }

    fn dice_state(&self) -> MutexGuard<'_, DiceState> {
        match self.dice.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    #[cfg(test)]
    fn cached_key(&self) -> CacheKey {
        self.dice_state().microsurface_key
    }
}

impl Primitive for BilinearPatch {
    fn bounds(&self) -> &TimeBox<BBox> {
        &self.bbox
    }

    fn intersect_ray(&self, ray: &Ray, isect: &mut Intersection) -> bool {
        stats::add_primitive_ray_test();

        let bbox = self.bbox.at_time(ray.time);
        let (tnear, tfar) = match bbox.intersect_ray(ray, isect.t) {
            Some(range) => range,
            None => return false,
        };

        // Smallest footprint the ray can have inside the box; the grid must
        // resolve at least that.
        let width = ray.min_width(tnear, tfar);

        let micro_surface;
        {
            let mut state = self.dice_state();

            let mut redice = width < state.last_ray_width && width != 0.0;
            let mut cached = None;
            if !redice {
                cached = micro_cache().get(state.microsurface_key);
                if cached.is_none() {
                    if state.microsurface_key != 0 {
                        stats::add_cache_miss();
                    }
                    redice = true;
                }
            }

            micro_surface = if redice {
                let surface = Arc::new(self.micro_generate(width * 0.75));
                state.microsurface_key = micro_cache().put(surface.clone());
                state.last_ray_width = width * 0.75;
                surface
            } else {
                cached.unwrap()
            };
        }

        micro_surface.intersect_ray(ray, width, isect)
    }
}

impl Diceable for BilinearPatch {
    fn micro_estimate(&self, width: Float) -> usize {
        if width <= Config::get().min_upoly_size {
            1
        } else {
            let (u_rate, v_rate) = self.uv_dice_rate(width);
            u_rate * v_rate
        }
    }

    fn split(&self, out: &mut Vec<Box<dyn Diceable>>) {
        stats::add_split();

        let corners0 = self.verts.get(0);
        let lu = (corners0[0] - corners0[1]).norm() + (corners0[3] - corners0[2]).norm();
        let lv = (corners0[0] - corners0[3]).norm() + (corners0[1] - corners0[2]).norm();

        let mut first = Vec::with_capacity(self.verts.len());
        let mut second = Vec::with_capacity(self.verts.len());

        if lu > lv {
            // Split on u.
            for corners in self.verts.samples() {
                let mid01 = (corners[0] + corners[1]) * 0.5;
                let mid32 = (corners[2] + corners[3]) * 0.5;
                first.push([corners[0], mid01, mid32, corners[3]]);
                second.push([mid01, corners[1], corners[2], mid32]);
            }
            let u_mid = (self.u_min + self.u_max) * 0.5;
            out.push(Box::new(BilinearPatch::with_uv_range(
                first, self.u_min, u_mid, self.v_min, self.v_max,
            )));
            out.push(Box::new(BilinearPatch::with_uv_range(
                second, u_mid, self.u_max, self.v_min, self.v_max,
            )));
        } else {
            // Split on v.
            for corners in self.verts.samples() {
                let mid12 = (corners[1] + corners[2]) * 0.5;
                let mid30 = (corners[3] + corners[0]) * 0.5;
                first.push([corners[0], corners[1], mid12, mid30]);
                second.push([mid30, mid12, corners[2], corners[3]]);
            }
            let v_mid = (self.v_min + self.v_max) * 0.5;
            out.push(Box::new(BilinearPatch::with_uv_range(
                first, self.u_min, self.u_max, self.v_min, v_mid,
            )));
            out.push(Box::new(BilinearPatch::with_uv_range(
                second, self.u_min, self.u_max, v_mid, self.v_max,
            )));
        }
    }

    fn micro_generate(&self, width: Float) -> MicroSurface {
        let (u_rate, v_rate) = self.uv_dice_rate(width);
        stats::add_upolys_generated((u_rate * v_rate) as u64);

        MicroSurface::from_grid(self.dice(u_rate + 1, v_rate + 1))
    }
}

fn rate_for(len: Float, width: Float, max_rate: usize) -> usize {
    if width <= 0.0 {
        return max_rate;
    }
    let mut rate = 1usize;
    while len / rate as Float > width && rate < max_rate {
        rate *= 2;
    }
    rate.min(max_rate)
}

/* Tests for the bilinear patch */

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::ray::{ RayType, WorldRay };

    fn unit_quad_at(z: Float) -> BilinearPatch {
        BilinearPatch::from_corners(
            Vector3f::new(-1.0, -1.0, z),
            Vector3f::new(1.0, -1.0, z),
            Vector3f::new(1.0, 1.0, z),
            Vector3f::new(-1.0, 1.0, z),
        )
    }

    fn camera_ray(x: Float, y: Float, spread: Float) -> Ray {
        let mut wray = WorldRay::new(
            Vector3f::new(x, y, 0.0),
            Vector3f::new(0.0, 0.0, 1.0),
            0.0,
            RayType::Camera,
        );
        wray.ddx = Vector3f::new(spread, 0.0, 0.0);
        wray.ddy = Vector3f::new(0.0, spread, 0.0);
        wray.to_ray(0)
    }

    #[test]
    fn test_single_quad_hit() {
        let patch = unit_quad_at(5.0);
        let ray = camera_ray(0.0, 0.0, 0.02);
        let mut isect = Intersection::default();

        assert!(patch.intersect_ray(&ray, &mut isect));
        assert!(isect.hit);
        assert!((isect.t - 5.0).abs() < 1e-3);
        assert!((isect.n - Vector3f::new(0.0, 0.0, -1.0)).norm() < 1e-4);
    }

    #[test]
    fn test_narrower_footprint_forces_redice() {
        let patch = unit_quad_at(5.0);
        let mut isect = Intersection::default();

        let wide = camera_ray(0.0, 0.0, 0.1);
        assert!(patch.intersect_ray(&wide, &mut isect));
        let first_key = patch.cached_key();
        let coarse = micro_cache().get(first_key).expect("grid should be cached");

        let narrow = camera_ray(0.0, 0.0, 0.001);
        let mut isect2 = Intersection::default();
        assert!(patch.intersect_ray(&narrow, &mut isect2));
        let second_key = patch.cached_key();
        assert_ne!(first_key, second_key);

        let fine = micro_cache().get(second_key).expect("grid should be cached");
        assert!(fine.face_count() > coarse.face_count());

        // A wide ray after the narrow one keeps the fine grid.
        let mut isect3 = Intersection::default();
        assert!(patch.intersect_ray(&wide, &mut isect3));
        assert_eq!(patch.cached_key(), second_key);
    }

    #[test]
    fn test_split_on_longer_edge_halves_uv() {
        let patch = BilinearPatch::from_corners(
            Vector3f::new(0.0, 0.0, 0.0),
            Vector3f::new(4.0, 0.0, 0.0),
            Vector3f::new(4.0, 1.0, 0.0),
            Vector3f::new(0.0, 1.0, 0.0),
        );

        let mut children = Vec::new();
        patch.split(&mut children);
        assert_eq!(children.len(), 2);

        // The longer u direction is split, so children cover [0, 0.5] and
        // [0.5, 1] in u while v stays whole.
        let b0 = children[0].bounds().get(0);
        let b1 = children[1].bounds().get(0);
        assert!((b0.max[0] - 2.0).abs() < 1e-5);
        assert!((b1.min[0] - 2.0).abs() < 1e-5);
    }

    #[test]
    fn test_micro_estimate_scales_with_width() {
        let patch = unit_quad_at(0.0);
        let coarse = patch.micro_estimate(0.5);
        let fine = patch.micro_estimate(0.01);
        assert!(fine > coarse);
        assert_eq!(patch.micro_estimate(0.0), 1);
    }

    #[test]
    fn test_dice_rate_clamps_to_config_cap() {
        let patch = unit_quad_at(0.0);
        let cap = Config::get().max_grid_size;
        let estimate = patch.micro_estimate(1e-9);
        assert!(estimate <= cap * cap);
    }

    #[test]
    fn test_displaced_bounds_contain_quad() {
        let patch = unit_quad_at(5.0);
        let bbox = patch.bounds().get(0);
        assert!(bbox.min[2] <= 5.0 && bbox.max[2] >= 5.0);
        assert!(bbox.min[0] <= -1.0 && bbox.max[0] >= 1.0);
    }
}
