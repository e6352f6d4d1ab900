// Copyright @yucwang 2023

use super::intersection::Intersection;
use crate::math::aabb::BBox;
use crate::math::constants::Float;
use crate::math::ray::Ray;
use crate::math::timebox::TimeBox;
use crate::shapes::grid::MicroSurface;

/// Anything an assembly can instance and a ray can be tested against.
///
/// `intersect_ray` records the hit into `isect` only when it is closer than
/// the bound already stored there, so repeated candidate tests for one ray
/// converge on the closest hit.
pub trait Primitive: Send + Sync {
    fn bounds(&self) -> &TimeBox<BBox>;
    fn intersect_ray(&self, ray: &Ray, isect: &mut Intersection) -> bool;
}

/// A primitive that can trade between splitting in parameter space and
/// tessellating itself into a micropolygon grid.
pub trait Diceable: Primitive {
    /// Estimated micropolygon count if diced for the given ray footprint.
    fn micro_estimate(&self, width: Float) -> usize;

    /// Bisects into exactly two children along the longer parametric
    /// direction, appending them to `out`.
    fn split(&self, out: &mut Vec<Box<dyn Diceable>>);

    /// Tessellates into a grid for the given footprint.
    fn micro_generate(&self, width: Float) -> MicroSurface;
}
