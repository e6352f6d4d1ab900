// Copyright @yucwang 2026

use super::bitstack::BitStack;
use super::constants::{ Float, Vector3f, FLOAT_MAX };
use super::transform::Transform;

/// Marks a ray as an any-hit visibility probe.
pub const RAY_IS_OCCLUSION: u32 = 1;
/// Set once traversal has exhausted the hierarchy for this ray.
pub const RAY_DONE: u32 = 1 << 1;
/// Set when a surface wanted a finer grid than the dicing cap allows.
pub const RAY_DEEPER_SPLIT: u32 = 1 << 2;

/// What spawned a ray. Occlusion rays are any-hit; everything else wants
/// the closest hit.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RayType {
    Camera,
    ReflectDiffuse,
    ReflectSpecular,
    TransmitDiffuse,
    TransmitSpecular,
    Occlusion,
}

/// The traversal-facing ray.
///
/// Instead of carrying full differential vectors, a Ray folds them into a
/// per-axis width function
///
/// ```text
/// w(t) = |ow - fw + dw * t| + fw
/// ```
///
/// which is linear toward a floor `fw` (the waist where the differential
/// ray crosses closest to the primary) and linear away from it. The ray's
/// footprint at distance t is the smaller of the two axis widths.
#[derive(Debug, Copy, Clone)]
pub struct Ray {
    pub o: Vector3f,
    pub d: Vector3f,
    pub min_t: Float,
    pub max_t: Float,
    pub time: Float,

    // Per-axis width state: offset at t = 0, change rate, floor.
    pub owx: Float,
    pub owy: Float,
    pub dwx: Float,
    pub dwy: Float,
    pub fwx: Float,
    pub fwy: Float,

    // Precomputed for slab tests.
    pub d_inv: Vector3f,
    pub d_sign: [usize; 3],

    pub flags: u32,
    pub id: u32,
    pub trav_stack: BitStack,
}

impl Default for Ray {
    fn default() -> Self {
        Self {
            o: Vector3f::new(0.0, 0.0, 0.0),
            d: Vector3f::new(0.0, 0.0, 1.0),
            min_t: 0.0,
            max_t: FLOAT_MAX,
            time: 0.0,
            owx: 0.0,
            owy: 0.0,
            dwx: 0.0,
            dwy: 0.0,
            fwx: 0.0,
            fwy: 0.0,
            d_inv: Vector3f::new(0.0, 0.0, 1.0),
            d_sign: [0, 0, 0],
            flags: 0,
            id: 0,
            trav_stack: BitStack::new(),
        }
    }
}

impl Ray {
    /// Computes the acceleration fields. Must be called after any change to
    /// the direction, before intersection testing. The direction must be
    /// non-degenerate.
    pub fn finalize(&mut self) {
        let len = self.d.norm();
        debug_assert!(len > 0.0);
        self.d /= len;
        self.update_accel();
    }

    /// Recomputes `d_inv` and `d_sign` without touching the direction's
    /// length. Used when a ray is lowered into an instance's local space,
    /// where the unnormalized direction keeps t measured in parent units.
    pub fn update_accel(&mut self) {
        self.d_inv = Vector3f::new(1.0 / self.d[0], 1.0 / self.d[1], 1.0 / self.d[2]);
        self.d_sign = [
            (self.d[0] < 0.0) as usize,
            (self.d[1] < 0.0) as usize,
            (self.d[2] < 0.0) as usize,
        ];
    }

    pub fn is_occlusion(&self) -> bool {
        self.flags & RAY_IS_OCCLUSION != 0
    }

    pub fn at(&self, t: Float) -> Vector3f {
        self.o + self.d * t
    }

    fn axis_width(ow: Float, dw: Float, fw: Float, t: Float) -> Float {
        (ow - fw + dw * t).abs() + fw
    }

    /// The footprint a micropolygon should have for this ray at distance t.
    pub fn width(&self, t: Float) -> Float {
        let wx = Self::axis_width(self.owx, self.dwx, self.fwx, t);
        let wy = Self::axis_width(self.owy, self.dwy, self.fwy, t);
        wx.min(wy)
    }

    fn axis_min_width(ow: Float, dw: Float, fw: Float, tnear: Float, tfar: Float) -> Float {
        if dw != 0.0 {
            // Where the linear term crosses zero the width dips to its floor.
            let tflip = (fw - ow) / dw;
            if tflip >= tnear && tflip <= tfar {
                return fw;
            }
        }
        Self::axis_width(ow, dw, fw, tnear).min(Self::axis_width(ow, dw, fw, tfar))
    }

    /// A lower bound of the ray width over [tnear, tfar].
    pub fn min_width(&self, tnear: Float, tfar: Float) -> Float {
        let wx = Self::axis_min_width(self.owx, self.dwx, self.fwx, tnear, tfar);
        let wy = Self::axis_min_width(self.owy, self.dwy, self.fwy, tnear, tfar);
        wx.min(wy)
    }
}

/// The integrator-facing ray: full origin and direction differentials in
/// some common space, lowered to a Ray for traversal.
#[derive(Debug, Copy, Clone)]
pub struct WorldRay {
    pub o: Vector3f,
    pub d: Vector3f,
    pub odx: Vector3f,
    pub ody: Vector3f,
    pub ddx: Vector3f,
    pub ddy: Vector3f,
    pub time: Float,
    pub min_t: Float,
    pub max_t: Float,
    pub kind: RayType,
}

impl Default for WorldRay {
    fn default() -> Self {
        Self {
            o: Vector3f::new(0.0, 0.0, 0.0),
            d: Vector3f::new(0.0, 0.0, 1.0),
            odx: Vector3f::new(0.0, 0.0, 0.0),
            ody: Vector3f::new(0.0, 0.0, 0.0),
            ddx: Vector3f::new(0.0, 0.0, 0.0),
            ddy: Vector3f::new(0.0, 0.0, 0.0),
            time: 0.0,
            min_t: 0.0,
            max_t: FLOAT_MAX,
            kind: RayType::Camera,
        }
    }
}

/// Collapses one differential pair into `(ow, dw, fw)` width parameters.
///
/// The differential ray `(o + od, d + dd)` sits at distance `|od + dd*t|`
/// from the primary. Its closest approach is the waist of the width
/// function; when that approach lies at t <= 0 the differentials diverge
/// from the origin and the raw lengths are used with a zero floor.
fn width_params(od: &Vector3f, dd: &Vector3f) -> (Float, Float, Float) {
    let ow = od.norm();
    let dd2 = dd.norm_squared();
    if dd2 <= 1e-20 {
        return (ow, 0.0, 0.0);
    }

    let t = -od.dot(dd) / dd2;
    if t <= 0.0 {
        (ow, dd2.sqrt(), 0.0)
    } else {
        let dist = (od + dd * t).norm();
        (ow, (dist - ow) / t, dist)
    }
}

impl WorldRay {
    pub fn new(o: Vector3f, d: Vector3f, time: Float, kind: RayType) -> Self {
        Self { o, d, time, kind, ..Default::default() }
    }

    /// Applies a transform; differentials move as directions.
    pub fn transformed(&self, xform: &Transform) -> WorldRay {
        WorldRay {
            o: xform.apply_point(self.o),
            d: xform.apply_vector(self.d),
            odx: xform.apply_vector(self.odx),
            ody: xform.apply_vector(self.ody),
            ddx: xform.apply_vector(self.ddx),
            ddy: xform.apply_vector(self.ddy),
            time: self.time,
            min_t: self.min_t,
            max_t: self.max_t,
            kind: self.kind,
        }
    }

    fn lower(&self, id: u32) -> Ray {
        let (owx, dwx, fwx) = width_params(&self.odx, &self.ddx);
        let (owy, dwy, fwy) = width_params(&self.ody, &self.ddy);

        let flags = if self.kind == RayType::Occlusion {
            RAY_IS_OCCLUSION
        } else {
            0
        };

        Ray {
            o: self.o,
            d: self.d,
            min_t: self.min_t,
            max_t: self.max_t,
            time: self.time,
            owx,
            owy,
            dwx,
            dwy,
            fwx,
            fwy,
            d_inv: Vector3f::new(0.0, 0.0, 0.0),
            d_sign: [0, 0, 0],
            flags,
            id,
            trav_stack: BitStack::new(),
        }
    }

    /// Lowers to a traversal ray with a unit direction.
    pub fn to_ray(&self, id: u32) -> Ray {
        let mut ray = self.lower(id);
        ray.finalize();
        ray
    }

    /// Lowers to a traversal ray in an instance's local space, keeping the
    /// direction unnormalized so t stays measured in the parent space.
    pub fn to_local_ray(&self, proto: &Ray) -> Ray {
        let mut ray = self.lower(proto.id);
        ray.flags = proto.flags;
        ray.trav_stack = proto.trav_stack;
        ray.update_accel();
        ray
    }
}

/* Tests for the ray width model */
