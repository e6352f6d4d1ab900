// Copyright @yucwang 2026

use crate::core::config::Config;
use crate::core::intersection::Intersection;
use crate::core::lru_cache::{ByteCount, LruCache};
use crate::math::aabb::BBox;
use crate::math::constants::{ Float, Vector2f, Vector3f };
use crate::math::ray::Ray;

use std::mem;
use std::sync::OnceLock;

static MICRO_CACHE: OnceLock<LruCache<MicroSurface>> = OnceLock::new();

/// The process-wide microsurface cache, sized from the installed config on
/// first use.
pub fn micro_cache() -> &'static LruCache<MicroSurface> {
    MICRO_CACHE.get_or_init(|| LruCache::new(Config::get().grid_cache_size))
}

/// A diced grid of vertices: `res_u` x `res_v` positions per time sample,
/// plus the patch-space uv coordinates of the four grid corners.
///
/// Vertex layout interleaves time innermost:
/// `index = (res_u * y + x) * time_count + time`.
#[derive(Debug, Clone)]
pub struct Grid {
    pub res_u: usize,
    pub res_v: usize,
    pub time_count: usize,
    pub verts: Vec<Vector3f>,
    pub corner_uvs: [Vector2f; 4],
}

impl Grid {
    pub fn new(res_u: usize, res_v: usize, time_count: usize) -> Self {
        debug_assert!(res_u >= 2 && res_v >= 2 && time_count >= 1);
        Self {
            res_u,
            res_v,
            time_count,
            verts: vec![Vector3f::new(0.0, 0.0, 0.0); res_u * res_v * time_count],
            corner_uvs: [
                Vector2f::new(0.0, 0.0),
                Vector2f::new(1.0, 0.0),
                Vector2f::new(0.0, 1.0),
                Vector2f::new(1.0, 1.0),
            ],
        }
    }

    #[inline]
    pub fn vert_index(&self, x: usize, y: usize, time: usize) -> usize {
        (self.res_u * y + x) * self.time_count + time
    }

    /// Patch-space uv for normalized grid coordinates, bilinear over the
    /// four corner uvs.
    fn uv_at(&self, gu: Float, gv: Float) -> Vector2f {
        let bottom = self.corner_uvs[0] * (1.0 - gu) + self.corner_uvs[1] * gu;
        let top = self.corner_uvs[2] * (1.0 - gu) + self.corner_uvs[3] * gu;
        bottom * (1.0 - gv) + top * gv
    }
}

/// Diced geometry ready for direct ray intersection. Immutable once built,
/// so cached surfaces are read concurrently without locking.
#[derive(Debug)]
pub struct MicroSurface {
    grid: Grid,
    bbox: BBox,
}

impl ByteCount for MicroSurface {
    fn bytes(&self) -> usize {
        self.grid.verts.len() * mem::size_of::<Vector3f>() + mem::size_of::<MicroSurface>()
    }
}

impl MicroSurface {
    pub fn from_grid(grid: Grid) -> Self {
        let mut bbox = BBox::default();
        for vert in &grid.verts {
            bbox.expand_by_point(vert);
        }
        Self { grid, bbox }
    }

    /// Grid resolution in micropolygons (faces), u by v.
    pub fn res(&self) -> (usize, usize) {
        (self.grid.res_u - 1, self.grid.res_v - 1)
    }

    pub fn face_count(&self) -> usize {
        (self.grid.res_u - 1) * (self.grid.res_v - 1)
    }

    /// Tests the ray against every micropolygon, recording the closest hit
    /// into `isect` if it beats the bound already there.
    pub fn intersect_ray(&self, ray: &Ray, width: Float, isect: &mut Intersection) -> bool {
        if self.bbox.intersect_ray(ray, isect.t).is_none() {
            return false;
        }

        // Motion sample bracketing for this ray's time.
        let (ti, alpha) = time_index(self.grid.time_count, ray.time);

        let vert_at = |x: usize, y: usize| -> Vector3f {
            let a = self.grid.verts[self.grid.vert_index(x, y, ti)];
            if alpha == 0.0 {
                a
            } else {
                let b = self.grid.verts[self.grid.vert_index(x, y, ti + 1)];
                a * (1.0 - alpha) + b * alpha
            }
        };

        let mut best: Option<MicroHit> = None;
        let mut closest = isect.t.min(ray.max_t);

        for y in 0..self.grid.res_v - 1 {
            for x in 0..self.grid.res_u - 1 {
                let p00 = vert_at(x, y);
                let p10 = vert_at(x + 1, y);
                let p01 = vert_at(x, y + 1);
                let p11 = vert_at(x + 1, y + 1);

                if let Some((t, bu, bv)) =
                    intersect_triangle(ray, &p00, &p10, &p11, ray.min_t, closest)
                {
                    closest = t;
                    best = Some(MicroHit {
                        t,
                        cell: (x, y),
                        frac: (bu + bv, bv),
                        e1: p10 - p00,
                        e2: p11 - p00,
                        diag: (p11 - p00).norm(),
                    });
                }
                if let Some((t, bu, bv)) =
                    intersect_triangle(ray, &p00, &p11, &p01, ray.min_t, closest)
                {
                    closest = t;
                    best = Some(MicroHit {
                        t,
                        cell: (x, y),
                        frac: (bu, bu + bv),
                        e1: p11 - p00,
                        e2: p01 - p00,
                        diag: (p11 - p00).norm(),
                    });
                }
            }
        }

        let hit = match best {
            Some(hit) => hit,
            None => return false,
        };

        let mut normal = hit.e1.cross(&hit.e2);
        let len = normal.norm();
        if len <= 0.0 {
            return false;
        }
        normal /= len;

        let backfacing = normal.dot(&ray.d) > 0.0;
        if backfacing {
            normal = -normal;
        }

        let gu = (hit.cell.0 as Float + hit.frac.0) / (self.grid.res_u - 1) as Float;
        let gv = (hit.cell.1 as Float + hit.frac.1) / (self.grid.res_v - 1) as Float;

        isect.hit = true;
        isect.backfacing = backfacing;
        isect.t = hit.t;
        isect.p = ray.at(hit.t);
        isect.n = normal;
        isect.uv = self.grid.uv_at(gu, gv);
        isect.incoming = ray.d;
        isect.ow = ray.width(0.0);
        isect.dw = if hit.t > 0.0 {
            (ray.width(hit.t) - isect.ow) / hit.t
        } else {
            0.0
        };
        isect.offset = normal * (hit.diag.max(width) * 0.5);

        true
    }
}

struct MicroHit {
    t: Float,
    cell: (usize, usize),
    frac: (Float, Float),
    e1: Vector3f,
    e2: Vector3f,
    diag: Float,
}

fn time_index(count: usize, time: Float) -> (usize, Float) {
    debug_assert!(count >= 1);
    if count == 1 {
        return (0, 0.0);
    }
    let scaled = time.clamp(0.0, 1.0) * ((count - 1) as Float);
    let mut index = scaled.floor() as usize;
    if index >= count - 1 {
        index = count - 2;
    }
    (index, scaled - index as Float)
}

/// Watertight-enough triangle test. Works with unnormalized directions, so
/// t stays in the caller's parameterization.
fn intersect_triangle(ray: &Ray, p0: &Vector3f, p1: &Vector3f, p2: &Vector3f,
                      t_min: Float, t_max: Float) -> Option<(Float, Float, Float)> {
    let e1 = p1 - p0;
    let e2 = p2 - p0;
    let pv = ray.d.cross(&e2);
    let det = e1.dot(&pv);
    if det.abs() < 1e-12 {
        return None;
    }

    let inv_det = 1.0 / det;
    let tv = ray.o - p0;
    let u = tv.dot(&pv) * inv_det;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }

    let qv = tv.cross(&e1);
    let v = ray.d.dot(&qv) * inv_det;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }

    let t = e2.dot(&qv) * inv_det;
    if t < t_min || t > t_max {
        return None;
    }

    Some((t, u, v))
}

/* Tests for ray-grid intersection */
