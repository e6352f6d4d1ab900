/* Copyright 2020 @TwoCookingMice */

use crate::math::image::Image;

use exr::prelude::*;

// Write an EXR image to file
pub fn write_exr_to_file(image: &Image, file_path: &str) {
    log::info!("Starting writing OpenEXR image: {}.", file_path);

    write_rgb_file(file_path, image.width, image.height, |x, y| {
        let pixel = image.pixel(x, y);
        (pixel[0], pixel[1], pixel[2])
    })
    .unwrap_or_else(|e| panic!("failed to write {}: {}", file_path, e));

    log::info!("OpenEXR written, width = {}, height = {}.", image.width, image.height);
}
