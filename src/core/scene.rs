// Copyright @yucwang 2026

use super::assembly::Assembly;
use super::light::LightArray;
use crate::sensors::thin_lens::ThinLensCamera;

/// The root of everything renderable: the camera and the world assembly.
pub struct Scene {
    pub camera: ThinLensCamera,
    pub world: Assembly,
}

impl Scene {
    /// Takes ownership of a finalized world assembly.
    pub fn new(camera: ThinLensCamera, world: Assembly) -> Self {
        Self { camera, world }
    }

    /// The finite lights the integrator can sample.
    pub fn finite_lights(&self) -> &LightArray {
        &self.world.light_accel
    }
}
