// Copyright @yucwang 2026

use super::assembly::TraversalState;
use super::intersection::Intersection;
use super::scene::Scene;
use crate::math::ray::{ Ray, WorldRay, RAY_DONE };

use std::sync::Mutex;
use std::thread;

/// Candidates a ray may harvest per traversal round.
pub const MAX_POTINT: usize = 2;
/// Rays per unit of accumulate-phase work.
pub const RAY_JOB_SIZE: usize = 4096;
/// Candidate tests per unit of test-phase work.
pub const TEST_JOB_SIZE: usize = 10000;

/// A (ray, element) pair worth an intersection test.
#[derive(Debug, Copy, Clone, Default)]
struct PotentialHit {
    valid: bool,
    ray_index: u32,
    element_id: u64,
}

/// Traces large batches of rays breadth first.
///
/// Each round, every live ray resumes its hierarchy traversal just long
/// enough to name a few candidate primitives; the candidates are then
/// compacted and sorted by element id before testing, so all tests
/// against one surface run back to back and share its diced grid while it
/// is hot in the cache.
pub struct Tracer<'a> {
    scene: &'a Scene,
    thread_count: usize,

    rays: Vec<Ray>,
    states: Vec<TraversalState>,
    active: Vec<bool>,
    potints: Vec<PotentialHit>,
}

impl<'a> Tracer<'a> {
    pub fn new(scene: &'a Scene, thread_count: usize) -> Self {
        Self {
            scene,
            thread_count: thread_count.max(1),
            rays: Vec::new(),
            states: Vec::new(),
            active: Vec::new(),
            potints: Vec::new(),
        }
    }

    /// Traces a batch, leaving the closest (or for occlusion rays, any)
    /// hit per ray in `isects`. Returns the number of rays traced.
    pub fn trace(&mut self, wrays: &[WorldRay], isects: &mut [Intersection]) -> usize {
        debug_assert_eq!(wrays.len(), isects.len());
        let count = wrays.len();

        for isect in isects.iter_mut() {
            *isect = Intersection::default();
        }

        self.rays.clear();
        self.rays
            .extend(wrays.iter().enumerate().map(|(i, wray)| wray.to_ray(i as u32)));

        self.states.clear();
        self.states.resize(count, TraversalState::default());
        self.active.clear();
        self.active.resize(count, true);

        while self.accumulate_potential_intersections(wrays, isects) > 0 {
            self.sort_potential_intersections();
            self.trace_potential_intersections(wrays, isects);
        }

        count
    }

    /// Accumulate phase: every live ray contributes up to `MAX_POTINT`
    /// candidates, then the buffer is compacted to its valid prefix.
    /// Returns how many candidates this round produced.
    fn accumulate_potential_intersections(&mut self, wrays: &[WorldRay],
                                          isects: &[Intersection]) -> usize {
        let count = self.rays.len();
        self.potints.clear();
        self.potints.resize(count * MAX_POTINT, PotentialHit::default());

        let scene = self.scene;
        let mut jobs = Vec::with_capacity(count / RAY_JOB_SIZE + 1);
        {
            let mut base = 0;
            let mut rays = self.rays.as_mut_slice();
            let mut states = self.states.as_mut_slice();
            let mut active = self.active.as_mut_slice();
            let mut potints = self.potints.as_mut_slice();
            let mut wrays = wrays;
            let mut isects = isects;

            while !rays.is_empty() {
                let take = rays.len().min(RAY_JOB_SIZE);
                let (ray_chunk, rays_rest) = rays.split_at_mut(take);
                let (state_chunk, states_rest) = states.split_at_mut(take);
                let (active_chunk, active_rest) = active.split_at_mut(take);
                let (potint_chunk, potints_rest) = potints.split_at_mut(take * MAX_POTINT);
                let (wray_chunk, wrays_rest) = wrays.split_at(take);
                let (isect_chunk, isects_rest) = isects.split_at(take);

                jobs.push(AccumJob {
                    base,
                    rays: ray_chunk,
                    states: state_chunk,
                    active: active_chunk,
                    potints: potint_chunk,
                    wrays: wray_chunk,
                    isects: isect_chunk,
                });

                base += take;
                rays = rays_rest;
                states = states_rest;
                active = active_rest;
                potints = potints_rest;
                wrays = wrays_rest;
                isects = isects_rest;
            }
        }

        if self.thread_count == 1 || jobs.len() == 1 {
            for job in &mut jobs {
                run_accumulation_job(scene, job);
            }
        } else {
            let queue = Mutex::new(jobs);
            thread::scope(|scope| {
                for _ in 0..self.thread_count {
                    scope.spawn(|| loop {
                        let job = match queue.lock() {
                            Ok(mut guard) => guard.pop(),
                            Err(poisoned) => poisoned.into_inner().pop(),
                        };
                        match job {
                            Some(mut job) => run_accumulation_job(scene, &mut job),
                            None => break,
                        }
                    });
                }
            });
        }

        self.potints.retain(|potint| potint.valid);
        self.potints.len()
    }

    /// Groups candidates by element so tests against one surface run
    /// back to back. Ordering between rays does not matter; each ray's
    /// closest-hit bound makes its own results order-independent.
    fn sort_potential_intersections(&mut self) {
        self.potints.sort_unstable_by_key(|potint| potint.element_id);
    }

    /// Test phase. Candidate tests for one ray always run on one thread
    /// in submission order, keeping results independent of scheduling;
    /// currently the whole phase is serial and only batched into jobs.
    fn trace_potential_intersections(&mut self, wrays: &[WorldRay],
                                     isects: &mut [Intersection]) {
        for chunk in self.potints.chunks(TEST_JOB_SIZE) {
            run_test_job(self.scene, chunk, &self.rays, wrays, isects);
        }
    }
}

struct AccumJob<'t> {
    base: usize,
    rays: &'t mut [Ray],
    states: &'t mut [TraversalState],
    active: &'t mut [bool],
    potints: &'t mut [PotentialHit],
    wrays: &'t [WorldRay],
    isects: &'t [Intersection],
}

fn run_accumulation_job(scene: &Scene, job: &mut AccumJob<'_>) {
    let mut ids = [0u64; MAX_POTINT];

    for i in 0..job.rays.len() {
        if !job.active[i] {
            continue;
        }

        let found = scene.world.get_potential_intersections(
            &job.wrays[i],
            &mut job.rays[i],
            job.isects[i].t,
            &mut ids,
            &mut job.states[i],
        );

        if found == 0 {
            job.active[i] = false;
            job.rays[i].flags |= RAY_DONE;
            continue;
        }

        for (slot, id) in ids.iter().take(found).enumerate() {
            job.potints[i * MAX_POTINT + slot] = PotentialHit {
                valid: true,
                ray_index: (job.base + i) as u32,
                element_id: *id,
            };
        }
    }
}

fn run_test_job(scene: &Scene, potints: &[PotentialHit], rays: &[Ray],
                wrays: &[WorldRay], isects: &mut [Intersection]) {
    for potint in potints {
        let ray_index = potint.ray_index as usize;
        let ray = &rays[ray_index];
        let isect = &mut isects[ray_index];

        // Occlusion rays stop testing after their first hit.
        if ray.is_occlusion() && isect.hit {
            continue;
        }

        let (primitive, xform) = match scene.world.resolve(potint.element_id, ray.time) {
            Some(resolved) => resolved,
            None => continue,
        };

        let hit = match xform {
            None => primitive.intersect_ray(ray, isect),
            Some(xform) => {
                // Re-lower the world ray into the instance's space; t stays
                // in world units, so the hit record's t and bound carry over.
                let local_wray = wrays[ray_index].transformed(&xform);
                let local_ray = local_wray.to_local_ray(ray);
                let hit = primitive.intersect_ray(&local_ray, isect);
                if hit {
                    isect.p = xform.inv_apply_point(isect.p);
                    isect.offset = xform.inv_apply_vector(isect.offset);
                    isect.incoming = wrays[ray_index].d;
                    let normal = xform.inv_apply_normal(isect.n);
                    let len = normal.norm();
                    if len > 0.0 {
                        isect.n = normal / len;
                    }
                }
                hit
            }
        };

        if hit {
            isect.instance_id = potint.element_id;
        }
    }
}

/* Tests for the breadth-first pipeline */

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::assembly::Assembly;
    use crate::math::constants::{ Float, Vector3f, PI };
    use crate::math::ray::RayType;
    use crate::math::transform::Transform;
    use crate::sensors::thin_lens::ThinLensCamera;
    use crate::shapes::bilinear::BilinearPatch;

    fn quad(x0: Float, x1: Float, y0: Float, y1: Float, z: Float) -> Box<BilinearPatch> {
        Box::new(BilinearPatch::from_corners(
            Vector3f::new(x0, y0, z),
            Vector3f::new(x1, y0, z),
            Vector3f::new(x1, y1, z),
            Vector3f::new(x0, y1, z),
        ))
    }

    fn scene_with(world: Assembly) -> Scene {
        let camera = ThinLensCamera::new(vec![Transform::default()], PI / 2.0, 0.0, 10.0);
        Scene::new(camera, world)
    }

    fn camera_wray(x: Float, y: Float, time: Float) -> WorldRay {
        let mut wray = WorldRay::new(
            Vector3f::new(x, y, 0.0),
            Vector3f::new(0.0, 0.0, 1.0),
            time,
            RayType::Camera,
        );
        wray.ddx = Vector3f::new(0.01, 0.0, 0.0);
        wray.ddy = Vector3f::new(0.0, 0.01, 0.0);
        wray
    }

    #[test]
    fn test_single_patch_hit() {
        let mut world = Assembly::new();
        world.add_object("quad", quad(-1.0, 1.0, -1.0, 1.0, 5.0));
        world.create_object_instance("quad", &[]).unwrap();
        world.finalize();
        let scene = scene_with(world);

        let wrays = vec![camera_wray(0.0, 0.0, 0.0)];
        let mut isects = vec![Intersection::default()];
        let mut tracer = Tracer::new(&scene, 1);

        assert_eq!(tracer.trace(&wrays, &mut isects), 1);
        assert!(isects[0].hit);
        assert!((isects[0].t - 5.0).abs() < 1e-3);
        assert!((isects[0].n - Vector3f::new(0.0, 0.0, -1.0)).norm() < 1e-4);
    }

    #[test]
    fn test_closest_of_two_patches_wins() {
        let mut world = Assembly::new();
        world.add_object("near", quad(-1.0, 1.0, -1.0, 1.0, 5.0));
        world.add_object("far", quad(-1.0, 1.0, -1.0, 1.0, 10.0));
        world.create_object_instance("near", &[]).unwrap();
        world.create_object_instance("far", &[]).unwrap();
        world.finalize();
        let scene = scene_with(world);

        let wrays = vec![camera_wray(0.0, 0.0, 0.0)];
        let mut isects = vec![Intersection::default()];
        Tracer::new(&scene, 1).trace(&wrays, &mut isects);

        assert!(isects[0].hit);
        assert!((isects[0].t - 5.0).abs() < 1e-3);
    }

    #[test]
    fn test_shadow_ray_occluded() {
        let mut world = Assembly::new();
        world.add_object("near", quad(-1.0, 1.0, -1.0, 1.0, 5.0));
        world.add_object("far", quad(-1.0, 1.0, -1.0, 1.0, 10.0));
        world.create_object_instance("near", &[]).unwrap();
        world.create_object_instance("far", &[]).unwrap();
        world.finalize();
        let scene = scene_with(world);

        // From between the two patches toward the far one, capped short.
        let mut shadow = WorldRay::new(
            Vector3f::new(0.0, 0.0, 6.0),
            Vector3f::new(0.0, 0.0, 1.0),
            0.0,
            RayType::Occlusion,
        );
        shadow.min_t = 0.01;
        shadow.max_t = 5.0;

        let wrays = vec![shadow];
        let mut isects = vec![Intersection::default()];
        Tracer::new(&scene, 1).trace(&wrays, &mut isects);

        assert!(isects[0].hit);
        assert!(isects[0].t <= 4.0 + 1e-3);
    }

    #[test]
    fn test_empty_scene_all_misses() {
        let mut world = Assembly::new();
        world.finalize();
        let scene = scene_with(world);

        let wrays: Vec<WorldRay> = (0..16).map(|i| camera_wray(i as Float * 0.01, 0.0, 0.0)).collect();
        let mut isects = vec![Intersection::default(); wrays.len()];
        let traced = Tracer::new(&scene, 1).trace(&wrays, &mut isects);

        assert_eq!(traced, wrays.len());
        assert!(isects.iter().all(|isect| !isect.hit));
    }

    #[test]
    fn test_tracing_twice_is_idempotent() {
        let mut world = Assembly::new();
        for i in 0..5 {
            let name = format!("quad{}", i);
            world.add_object(&name, quad(-1.0, 1.0, -1.0, 1.0, 3.0 + i as Float));
            world.create_object_instance(&name, &[]).unwrap();
        }
        world.finalize();
        let scene = scene_with(world);

        let wrays: Vec<WorldRay> = (0..32)
            .map(|i| camera_wray((i % 8) as Float * 0.1 - 0.4, (i / 8) as Float * 0.1, 0.0))
            .collect();

        let mut first = vec![Intersection::default(); wrays.len()];
        let mut second = vec![Intersection::default(); wrays.len()];
        let mut tracer = Tracer::new(&scene, 1);
        tracer.trace(&wrays, &mut first);
        tracer.trace(&wrays, &mut second);

        for (a, b) in first.iter().zip(&second) {
            assert_eq!(a.hit, b.hit);
            assert_eq!(a.t, b.t);
            assert_eq!(a.instance_id, b.instance_id);
        }
    }

    #[test]
    fn test_instance_transform_motion_blur() {
        let mut world = Assembly::new();
        world.add_object("quad", quad(-0.25, 0.25, -0.25, 0.25, 5.0));
        // The instance slides from x = 0 to x = 1 over the shutter; the
        // world-to-local transforms subtract the motion.
        let start = Transform::default();
        let end = Transform::from_translation(Vector3f::new(-1.0, 0.0, 0.0));
        world.create_object_instance("quad", &[start, end]).unwrap();
        world.finalize();
        let scene = scene_with(world);

        let wrays = vec![camera_wray(0.5, 0.0, 0.5), camera_wray(0.5, 0.0, 0.0)];
        let mut isects = vec![Intersection::default(); 2];
        Tracer::new(&scene, 1).trace(&wrays, &mut isects);

        assert!(isects[0].hit, "mid-shutter ray should hit the moved instance");
        assert!((isects[0].t - 5.0).abs() < 1e-3);
        assert!(!isects[1].hit, "shutter-open ray should miss");
    }

    #[test]
    fn test_transformed_assembly_instance() {
        let mut inner = Assembly::new();
        inner.add_object("quad", quad(-0.5, 0.5, -0.5, 0.5, 5.0));
        inner.create_object_instance("quad", &[]).unwrap();

        let mut world = Assembly::new();
        world.add_assembly("inner", inner);
        // World-to-local shifts -2 in x, placing the sub-assembly at +2.
        world
            .create_assembly_instance("inner", &[
                Transform::from_translation(Vector3f::new(-2.0, 0.0, 0.0)),
            ])
            .unwrap();
        world.finalize();
        let scene = scene_with(world);

        let wrays = vec![camera_wray(2.0, 0.0, 0.0), camera_wray(0.0, 0.0, 0.0)];
        let mut isects = vec![Intersection::default(); 2];
        Tracer::new(&scene, 1).trace(&wrays, &mut isects);

        assert!(isects[0].hit);
        assert!((isects[0].t - 5.0).abs() < 1e-3);
        assert!((isects[0].p[0] - 2.0).abs() < 1e-3);
        assert!((isects[0].n - Vector3f::new(0.0, 0.0, -1.0)).norm() < 1e-4);
        assert!(!isects[1].hit);
    }

    #[test]
    fn test_thread_count_does_not_change_results() {
        let mut world = Assembly::new();
        world.add_object("quad", quad(-10.0, 10.0, -10.0, 10.0, 5.0));
        world.create_object_instance("quad", &[]).unwrap();
        world.finalize();
        let scene = scene_with(world);

        let wrays: Vec<WorldRay> = (0..100)
            .map(|i| camera_wray((i % 10) as Float * 0.02, (i / 10) as Float * 0.02, 0.0))
            .collect();
        let mut serial = vec![Intersection::default(); wrays.len()];
        let mut threaded = vec![Intersection::default(); wrays.len()];

        Tracer::new(&scene, 1).trace(&wrays, &mut serial);
        Tracer::new(&scene, 4).trace(&wrays, &mut threaded);

        for (a, b) in serial.iter().zip(&threaded) {
            assert_eq!(a.hit, b.hit);
            assert_eq!(a.t, b.t);
        }
    }
}
