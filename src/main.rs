// Copyright 2020 TwoCookingMice

use glaze::core::assembly::Assembly;
use glaze::core::config::Config;
use glaze::core::scene::Scene;
use glaze::core::stats;
use glaze::emitters::sphere_light::SphereLight;
use glaze::integrators::direct_lighting::DirectLightingIntegrator;
use glaze::io::exr_utils;
use glaze::math::constants::{ Vector3f, PI };
use glaze::math::image::Image;
use glaze::math::spectrum::RGBSpectrum;
use glaze::math::transform::Transform;
use glaze::sensors::thin_lens::ThinLensCamera;
use glaze::shapes::bilinear::BilinearPatch;

use std::env;
use std::sync::Arc;
use std::thread;

fn main() {
    env::set_var("RUST_LOG", "info");
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <output.exr> [--width N] [--height N] [--spp N] [--seed N]", args[0]);
        std::process::exit(1);
    }

    let output_path = &args[1];
    let mut width: usize = 640;
    let mut height: usize = 360;
    let mut spp: u32 = 16;
    let mut seed: u64 = 0;

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--width" => {
                i += 1;
                width = args.get(i).and_then(|v| v.parse::<usize>().ok()).unwrap_or(width);
            }
            "--height" => {
                i += 1;
                height = args.get(i).and_then(|v| v.parse::<usize>().ok()).unwrap_or(height);
            }
            "--spp" => {
                i += 1;
                spp = args.get(i).and_then(|v| v.parse::<u32>().ok()).unwrap_or(spp);
            }
            "--seed" => {
                i += 1;
                seed = args.get(i).and_then(|v| v.parse::<u64>().ok()).unwrap_or(seed);
            }
            _ => {}
        }
        i += 1;
    }

    Config::install(Config {
        grid_cache_size: 128 * 1024 * 1024,
        ..Config::default()
    });

    let scene = build_demo_scene();
    let mut image = Image::new(width, height);

    let thread_count = thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
    let mut integrator = DirectLightingIntegrator::new(spp, seed);
    integrator.thread_count = thread_count;

    log::info!("rendering {}x{} at {} spp with {} threads", width, height, spp, thread_count);
    integrator.render(&scene, &mut image);

    let totals = stats::snapshot();
    log::info!("primitive ray tests: {}", totals.primitive_ray_tests);
    log::info!("micropolygons generated: {}", totals.upoly_gen_count);
    log::info!("grid cache misses: {}", totals.cache_misses);

    exr_utils::write_exr_to_file(&image, output_path);
}

/// A couple of patches and lights with motion blur on the camera, one
/// object, and one instance transform.
fn build_demo_scene() -> Scene {
    let mut world = Assembly::new();

    // Ground plane.
    world.add_object("ground", Box::new(BilinearPatch::from_corners(
        Vector3f::new(-12.0, -1.0, 1.0),
        Vector3f::new(12.0, -1.0, 1.0),
        Vector3f::new(12.0, -1.0, 25.0),
        Vector3f::new(-12.0, -1.0, 25.0),
    )));
    world.create_object_instance("ground", &[]).expect("ground was just added");

    // Back wall.
    world.add_object("wall", Box::new(BilinearPatch::from_corners(
        Vector3f::new(-8.0, -1.0, 16.0),
        Vector3f::new(8.0, -1.0, 16.0),
        Vector3f::new(8.0, 6.0, 16.0),
        Vector3f::new(-8.0, 6.0, 16.0),
    )));
    world.create_object_instance("wall", &[]).expect("wall was just added");

    // A floating card that sweeps sideways over the shutter, instanced
    // twice.
    let card_t0 = [
        Vector3f::new(-1.5, 0.0, 8.0),
        Vector3f::new(-0.5, 0.0, 8.0),
        Vector3f::new(-0.5, 1.2, 8.5),
        Vector3f::new(-1.5, 1.2, 8.5),
    ];
    let card_t1 = [
        Vector3f::new(-0.9, 0.0, 8.0),
        Vector3f::new(0.1, 0.0, 8.0),
        Vector3f::new(0.1, 1.2, 8.5),
        Vector3f::new(-0.9, 1.2, 8.5),
    ];
    world.add_object("card", Box::new(BilinearPatch::new(vec![card_t0, card_t1])));
    world.create_object_instance("card", &[]).expect("card was just added");
    world
        .create_object_instance("card", &[
            Transform::from_translation(Vector3f::new(-2.5, -0.3, 0.0)),
        ])
        .expect("card was just added");

    // Lights.
    world.add_light(Arc::new(SphereLight::new(
        vec![Vector3f::new(3.0, 5.0, 6.0)],
        0.3,
        RGBSpectrum::new(160.0, 150.0, 140.0),
    )));
    world.add_light(Arc::new(SphereLight::new(
        vec![Vector3f::new(-4.0, 3.0, 10.0)],
        0.2,
        RGBSpectrum::new(60.0, 70.0, 90.0),
    )));

    world.finalize();

    // The camera drifts slightly during the shutter.
    let camera = ThinLensCamera::new(
        vec![
            Transform::default(),
            Transform::from_translation(Vector3f::new(0.05, 0.0, 0.0)),
        ],
        PI * 0.35,
        0.1,
        9.0,
    );

    Scene::new(camera, world)
}
