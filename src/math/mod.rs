// Copyright 2020 @TwoCookingMice

pub mod aabb;
pub mod bitstack;
pub mod constants;
pub mod image;
pub mod ray;
pub mod spectrum;
pub mod timebox;
pub mod transform;
pub mod warp;
