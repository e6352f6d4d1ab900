// Copyright 2020 @TwoCookingMice

use super::constants::{ Float, Vector3f };

use std::ops;

/// Linear RGB radiance. Only addition and scaling are meaningful here.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct RGBSpectrum {
    rgb: Vector3f
}

impl Default for RGBSpectrum {
    fn default() -> Self {
        Self { rgb: Vector3f::new(0.0, 0.0, 0.0) }
    }
}

impl RGBSpectrum {
    pub fn new(r: Float, g: Float, b: Float) -> Self {
        Self { rgb: Vector3f::new(r, g, b) }
    }

    pub fn r(&self) -> Float {
        self.rgb[0]
    }

    pub fn g(&self) -> Float {
        self.rgb[1]
    }

    pub fn b(&self) -> Float {
        self.rgb[2]
    }

    pub fn is_black(&self) -> bool {
        for idx in 0..3 {
            if self.rgb[idx] != 0.0 {
                return false;
            }
        }
        true
    }

    /// A single scalar stand-in for the spectrum's overall energy.
    pub fn energy(&self) -> Float {
        (self.rgb[0] + self.rgb[1] + self.rgb[2]) / 3.0
    }
}

impl ops::Add for RGBSpectrum {
    type Output = RGBSpectrum;

    fn add(self, other: RGBSpectrum) -> RGBSpectrum {
        RGBSpectrum { rgb: self.rgb + other.rgb }
    }
}

impl ops::AddAssign for RGBSpectrum {
    fn add_assign(&mut self, other: RGBSpectrum) {
        self.rgb += other.rgb;
    }
}

impl ops::Mul<Float> for RGBSpectrum {
    type Output = RGBSpectrum;

    fn mul(self, scale: Float) -> RGBSpectrum {
        RGBSpectrum { rgb: self.rgb * scale }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_scale() {
        let a = RGBSpectrum::new(0.5, 0.25, 0.0);
        let b = RGBSpectrum::new(0.5, 0.75, 1.0);
        let sum = a + b;
        assert!((sum.r() - 1.0).abs() < 1e-6);
        assert!((sum.g() - 1.0).abs() < 1e-6);
        assert!((sum.b() - 1.0).abs() < 1e-6);

        let scaled = a * 2.0;
        assert!((scaled.r() - 1.0).abs() < 1e-6);
        assert!((scaled.g() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_is_black() {
        assert!(RGBSpectrum::default().is_black());
        assert!(!RGBSpectrum::new(0.0, 0.1, 0.0).is_black());
    }
}
