// Copyright 2020 @TwoCookingMice

use super::constants::{ Float, Matrix4f, Vector3f };
use super::timebox::Lerp;

/// An affine transform paired with its precomputed inverse.
///
/// The forward matrix of an instance transform carries world space into the
/// instanced object's local space; bounds travel the other way through the
/// inverse.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Transform {
    matrix: Matrix4f,
    inv_matrix: Matrix4f
}

impl Default for Transform {
    fn default() -> Self {
        Self { matrix: Matrix4f::identity(),
               inv_matrix: Matrix4f::identity() }
    }
}

impl Transform {
    pub fn new(matrix: Matrix4f) -> Self {
        Self { matrix,
               inv_matrix: matrix.try_inverse().unwrap_or(Matrix4f::identity()) }
    }

    pub fn from_translation(offset: Vector3f) -> Self {
        Self::new(Matrix4f::new_translation(&offset))
    }

    pub fn matrix(&self) -> &Matrix4f {
        &self.matrix
    }

    pub fn inv_matrix(&self) -> &Matrix4f {
        &self.inv_matrix
    }

    /// The transform that applies `self` first, then `next`.
    pub fn then(&self, next: &Transform) -> Transform {
        Transform {
            matrix: next.matrix * self.matrix,
            inv_matrix: self.inv_matrix * next.inv_matrix,
        }
    }

    pub fn apply_point(&self, p: Vector3f) -> Vector3f {
        mult_pos(&self.matrix, p)
    }

    pub fn apply_vector(&self, v: Vector3f) -> Vector3f {
        mult_dir(&self.matrix, v)
    }

    // Normal transformation is different from point transformation.
    // Before transformation, we have n^Tx = 0
    // After transformation, we have (Sn)^T(Mx) = 0
    // Then, we will get: S = (M^{-1})^T
    pub fn apply_normal(&self, n: Vector3f) -> Vector3f {
        mult_dir(&self.inv_matrix.transpose(), n)
    }

    pub fn inv_apply_point(&self, p: Vector3f) -> Vector3f {
        mult_pos(&self.inv_matrix, p)
    }

    pub fn inv_apply_vector(&self, v: Vector3f) -> Vector3f {
        mult_dir(&self.inv_matrix, v)
    }

    pub fn inv_apply_normal(&self, n: Vector3f) -> Vector3f {
        mult_dir(&self.matrix.transpose(), n)
    }
}

impl Lerp for Transform {
    fn lerp(&self, other: &Self, alpha: Float) -> Self {
        Transform::new(self.matrix * (1.0 - alpha) + other.matrix * alpha)
    }
}

/// Applies the full affine transform, translation included.
fn mult_pos(m: &Matrix4f, p: Vector3f) -> Vector3f {
    let x = p[0] * m[(0, 0)] + p[1] * m[(0, 1)] + p[2] * m[(0, 2)] + m[(0, 3)];
    let y = p[0] * m[(1, 0)] + p[1] * m[(1, 1)] + p[2] * m[(1, 2)] + m[(1, 3)];
    let z = p[0] * m[(2, 0)] + p[1] * m[(2, 1)] + p[2] * m[(2, 2)] + m[(2, 3)];
    let w = p[0] * m[(3, 0)] + p[1] * m[(3, 1)] + p[2] * m[(3, 2)] + m[(3, 3)];

    Vector3f::new(x / w, y / w, z / w)
}

/// Applies the linear part only; directions ignore translation.
fn mult_dir(m: &Matrix4f, v: Vector3f) -> Vector3f {
    let x = v[0] * m[(0, 0)] + v[1] * m[(0, 1)] + v[2] * m[(0, 2)];
    let y = v[0] * m[(1, 0)] + v[1] * m[(1, 1)] + v[2] * m[(1, 2)];
    let z = v[0] * m[(2, 0)] + v[1] * m[(2, 1)] + v[2] * m[(2, 2)];

    Vector3f::new(x, y, z)
}

/* Tests for Transform */
