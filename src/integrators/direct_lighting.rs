// Copyright @yucwang 2026

use crate::core::intersection::Intersection;
use crate::core::sampler::{ImageSampler, Sample};
use crate::core::scene::Scene;
use crate::core::tracer::Tracer;
use crate::math::constants::{ Float, Vector3f };
use crate::math::image::Image;
use crate::math::ray::{ RayType, WorldRay };
use crate::math::spectrum::RGBSpectrum;
use indicatif::{ProgressBar, ProgressStyle};

/// Samples processed per batch through the tracer.
pub const RAYS_AT_A_TIME: usize = 1 << 18;

const FILTER_RADIUS: i64 = 2;
const SHADOW_MIN_T: Float = 0.01;

/// Reconstruction filter for splatting sample contributions.
#[derive(Debug, Copy, Clone)]
pub enum PixelFilter {
    /// Mitchell-Netravali with the given C parameter (B = 1 - 2C).
    Mitchell(Float),
    /// Separable Gaussian with the given half-width.
    Gaussian(Float),
}

impl PixelFilter {
    pub fn eval(&self, x: Float, y: Float) -> Float {
        match self {
            PixelFilter::Mitchell(c) => mitchell_2d(x, y, *c),
            PixelFilter::Gaussian(width) => gaussian_2d(x, y, *width),
        }
    }
}

impl Default for PixelFilter {
    fn default() -> Self {
        PixelFilter::Mitchell(0.5)
    }
}

pub fn mitchell_1d(x: Float, c: Float) -> Float {
    let b = 1.0 - 2.0 * c;
    let x = x.abs();
    if x > 2.0 {
        0.0
    } else if x > 1.0 {
        ((-b - 6.0 * c) * x * x * x
            + (6.0 * b + 30.0 * c) * x * x
            + (-12.0 * b - 48.0 * c) * x
            + (8.0 * b + 24.0 * c))
            * (1.0 / 6.0)
    } else {
        ((12.0 - 9.0 * b - 6.0 * c) * x * x * x
            + (-18.0 + 12.0 * b + 6.0 * c) * x * x
            + (6.0 - 2.0 * b))
            * (1.0 / 6.0)
    }
}

pub fn mitchell_2d(x: Float, y: Float, c: Float) -> Float {
    mitchell_1d(x, c) * mitchell_1d(y, c)
}

pub fn gaussian_2d(x: Float, y: Float, width: Float) -> Float {
    let xf = (-x * x / (2.0 * width * width)).exp();
    let yf = (-y * y / (2.0 * width * width)).exp();
    xf * yf
}

/// One sample's progress through the batch: camera hit first, then the
/// shadow test decides its color.
#[derive(Debug, Copy, Clone)]
struct DlPath {
    done: bool,
    col: RGBSpectrum,
    lcol: RGBSpectrum,
    p: Vector3f,
    n: Vector3f,
    light_dir: Vector3f,
}

impl Default for DlPath {
    fn default() -> Self {
        Self {
            done: false,
            col: RGBSpectrum::default(),
            lcol: RGBSpectrum::default(),
            p: Vector3f::new(0.0, 0.0, 0.0),
            n: Vector3f::new(0.0, 0.0, 1.0),
            light_dir: Vector3f::new(0.0, 0.0, 1.0),
        }
    }
}

/// Single-bounce direct lighting over large ray batches.
///
/// Per batch: draw samples, trace the camera rays, pick one finite light
/// per hit (scaled by the light count to stay unbiased), trace the shadow
/// rays, and splat the lit contributions through the pixel filter. The
/// image is normalized by the accumulated filter weights at the end.
pub struct DirectLightingIntegrator {
    pub spp: u32,
    pub seed: u64,
    pub filter: PixelFilter,
    pub thread_count: usize,
}

impl DirectLightingIntegrator {
    pub fn new(spp: u32, seed: u64) -> Self {
        Self {
            spp,
            seed,
            filter: PixelFilter::default(),
            thread_count: 1,
        }
    }

    pub fn render(&self, scene: &Scene, image: &mut Image) {
        let mut sampler = ImageSampler::new(self.spp, image.width, image.height, self.seed);
        let mut weights = vec![0.0 as Float; image.width * image.height];
        let mut tracer = Tracer::new(scene, self.thread_count);

        let progress = ProgressBar::new(100);
        progress.set_style(
            ProgressStyle::with_template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}%")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );

        let mut samples: Vec<Sample> = Vec::with_capacity(RAYS_AT_A_TIME.min(4096));
        let mut scratch = Sample::default();
        let mut exhausted = false;

        while !exhausted {
            samples.clear();
            while samples.len() < RAYS_AT_A_TIME {
                if !sampler.get_next_sample(3, &mut scratch) {
                    exhausted = true;
                    break;
                }
                samples.push(scratch.clone());
            }
            if samples.is_empty() {
                break;
            }

            let paths = self.shade_batch(scene, &mut tracer, image, &samples);
            self.splat_batch(image, &mut weights, &samples, &paths);

            progress.set_position((sampler.percentage() * 100.0) as u64);
        }
        progress.finish_and_clear();

        normalize(image, &weights);
    }

    fn shade_batch(&self, scene: &Scene, tracer: &mut Tracer<'_>,
                   image: &Image, samples: &[Sample]) -> Vec<DlPath> {
        let mut paths = vec![DlPath::default(); samples.len()];

        // Camera rays.
        let window_x = image.max_x - image.min_x;
        let window_y = image.max_y - image.min_y;
        let dx = window_x / image.width as Float;
        let dy = window_y / image.height as Float;

        let wrays: Vec<WorldRay> = samples
            .iter()
            .map(|sample| {
                let rx = (sample.x - 0.5) * window_x;
                let ry = (0.5 - sample.y) * window_y;
                scene.camera.generate_ray(rx, ry, dx, dy, sample.t, sample.u, sample.v)
            })
            .collect();

        let mut isects = vec![Intersection::default(); wrays.len()];
        tracer.trace(&wrays, &mut isects);

        for (path, isect) in paths.iter_mut().zip(&isects) {
            if isect.hit {
                path.p = isect.p;
                path.n = isect.n;
            } else {
                path.done = true;
                path.col = RGBSpectrum::default();
            }
        }

        // One light sample per live path.
        let lights = scene.finite_lights();
        let mut shadow_rays = Vec::new();
        let mut shadow_paths = Vec::new();

        for (index, (path, sample)) in paths.iter_mut().zip(samples).enumerate() {
            if path.done {
                continue;
            }

            let (light_index, light_scale) = match lights.select(sample.ns[0]) {
                Some(selection) => selection,
                None => {
                    path.done = true;
                    continue;
                }
            };

            let mut shadow_vec = Vector3f::new(0.0, 0.0, 0.0);
            let lcol = lights.get(light_index).sample(
                &path.p, sample.ns[1], sample.ns[2], sample.t, &mut shadow_vec,
            ) * light_scale;

            let dist = shadow_vec.norm();
            if dist <= 0.0 {
                path.done = true;
                continue;
            }

            path.lcol = lcol;
            path.light_dir = shadow_vec / dist;

            let mut shadow = WorldRay::new(path.p, path.light_dir, sample.t, RayType::Occlusion);
            shadow.min_t = SHADOW_MIN_T;
            shadow.max_t = dist;
            shadow_rays.push(shadow);
            shadow_paths.push(index);
        }

        let mut shadow_isects = vec![Intersection::default(); shadow_rays.len()];
        if !shadow_rays.is_empty() {
            tracer.trace(&shadow_rays, &mut shadow_isects);
        }

        for (path_index, isect) in shadow_paths.iter().zip(&shadow_isects) {
            let path = &mut paths[*path_index];
            if isect.hit {
                path.col = RGBSpectrum::default();
            } else {
                let lambert = path.light_dir.dot(&path.n).max(0.0);
                path.col = path.lcol * lambert;
            }
            path.done = true;
        }

        paths
    }

    fn splat_batch(&self, image: &mut Image, weights: &mut [Float],
                   samples: &[Sample], paths: &[DlPath]) {
        let width = image.width as i64;
        let height = image.height as i64;

        for (sample, path) in samples.iter().zip(paths) {
            let x = sample.x * image.width as Float - 0.5;
            let y = sample.y * image.height as Float - 0.5;

            for j in -FILTER_RADIUS..=FILTER_RADIUS {
                for k in -FILTER_RADIUS..=FILTER_RADIUS {
                    let a = (x + j as Float).floor() as i64;
                    let b = (y + k as Float).floor() as i64;
                    if a < 0 || a >= width || b < 0 || b >= height {
                        continue;
                    }

                    let contrib = self.filter.eval(a as Float - x, b as Float - y);
                    weights[(b * width + a) as usize] += contrib;
                    if contrib == 0.0 {
                        continue;
                    }

                    image.add_to_pixel(
                        a as usize,
                        b as usize,
                        path.col.r() * contrib,
                        path.col.g() * contrib,
                        path.col.b() * contrib,
                    );
                }
            }
        }
    }
}

/// Divides out the filter weights and clamps the result to be
/// non-negative. Unsampled pixels stay black.
fn normalize(image: &mut Image, weights: &[Float]) {
    for y in 0..image.height {
        for x in 0..image.width {
            let weight = weights[y * image.width + x];
            let pixel = image.pixel_mut(x, y);
            if weight > 0.0 {
                for channel in pixel.iter_mut() {
                    *channel = (*channel / weight).max(0.0);
                }
            } else {
                for channel in pixel.iter_mut() {
                    *channel = 0.0;
                }
            }
        }
    }
}

/* Tests for the integrator and filters */
