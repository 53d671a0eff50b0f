// Copyright (c) 2024-present Ember Engine contributors.
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.

//! Local transform of a scene node.
//!
//! The final local matrix is `T * R * S * C` where `C` is an optional custom
//! matrix for the rare cases (skewed sprites, billboards) that TRS cannot
//! express. The matrix and its inverse are lazily cached; any setter just
//! flips a dirty bit.

use crate::core::algebra::{Matrix4, UnitQuaternion, Vector3};
use crate::math::try_invert;
use std::cell::Cell;

/// See module docs.
#[derive(Clone, Debug)]
pub struct Transform {
    // Indicates that some property has changed and the matrices must be
    // recalculated before use.
    dirty: Cell<bool>,

    position: Vector3<f32>,
    rotation: UnitQuaternion<f32>,
    scale: Vector3<f32>,
    custom: Option<Matrix4<f32>>,

    matrix: Cell<Matrix4<f32>>,
    inv_matrix: Cell<Matrix4<f32>>,
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

impl Transform {
    pub fn identity() -> Self {
        Self {
            dirty: Cell::new(true),
            position: Vector3::zeros(),
            rotation: UnitQuaternion::identity(),
            scale: Vector3::new(1.0, 1.0, 1.0),
            custom: None,
            matrix: Cell::new(Matrix4::identity()),
            inv_matrix: Cell::new(Matrix4::identity()),
        }
    }

    #[inline]
    pub fn position(&self) -> Vector3<f32> {
        self.position
    }

    #[inline]
    pub fn set_position(&mut self, position: Vector3<f32>) -> &mut Self {
        if self.position != position {
            self.position = position;
            self.dirty.set(true);
        }
        self
    }

    #[inline]
    pub fn rotation(&self) -> UnitQuaternion<f32> {
        self.rotation
    }

    #[inline]
    pub fn set_rotation(&mut self, rotation: UnitQuaternion<f32>) -> &mut Self {
        if self.rotation != rotation {
            self.rotation = rotation;
            self.dirty.set(true);
        }
        self
    }

    #[inline]
    pub fn scale(&self) -> Vector3<f32> {
        self.scale
    }

    #[inline]
    pub fn set_scale(&mut self, scale: Vector3<f32>) -> &mut Self {
        if self.scale != scale {
            self.scale = scale;
            self.dirty.set(true);
        }
        self
    }

    #[inline]
    pub fn custom_matrix(&self) -> Option<Matrix4<f32>> {
        self.custom
    }

    #[inline]
    pub fn set_custom_matrix(&mut self, matrix: Option<Matrix4<f32>>) -> &mut Self {
        self.custom = matrix;
        self.dirty.set(true);
        self
    }

    fn update_cache(&self) {
        let trs = Matrix4::new_translation(&self.position)
            * self.rotation.to_homogeneous()
            * Matrix4::new_nonuniform_scaling(&self.scale);
        let matrix = match self.custom {
            Some(custom) => trs * custom,
            None => trs,
        };
        self.matrix.set(matrix);
        // A non-invertible local matrix (zero scale) degrades to identity.
        let (inverse, _) = try_invert(&matrix);
        self.inv_matrix.set(inverse);
        self.dirty.set(false);
    }

    /// Local matrix, recomputed when dirty.
    #[inline]
    pub fn matrix(&self) -> Matrix4<f32> {
        if self.dirty.get() {
            self.update_cache();
        }
        self.matrix.get()
    }

    /// Inverse of the local matrix; identity when the matrix is singular.
    #[inline]
    pub fn inv_matrix(&self) -> Matrix4<f32> {
        if self.dirty.get() {
            self.update_cache();
        }
        self.inv_matrix.get()
    }
}

/// Builder for initial node transforms.
pub struct TransformBuilder {
    transform: Transform,
}

impl Default for TransformBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TransformBuilder {
    pub fn new() -> Self {
        Self {
            transform: Transform::identity(),
        }
    }

    pub fn with_position(mut self, position: Vector3<f32>) -> Self {
        self.transform.set_position(position);
        self
    }

    pub fn with_rotation(mut self, rotation: UnitQuaternion<f32>) -> Self {
        self.transform.set_rotation(rotation);
        self
    }

    pub fn with_scale(mut self, scale: Vector3<f32>) -> Self {
        self.transform.set_scale(scale);
        self
    }

    pub fn with_custom_matrix(mut self, matrix: Matrix4<f32>) -> Self {
        self.transform.set_custom_matrix(Some(matrix));
        self
    }

    pub fn build(self) -> Transform {
        self.transform
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::math::m4x4_approx_eq;

    #[test]
    fn position_round_trip_is_bit_exact() {
        let mut transform = Transform::identity();
        let p = Vector3::new(0.1, -2.7, 3.33);
        transform.set_position(p);
        assert_eq!(transform.position(), p);
    }

    #[test]
    fn matrix_composition_order() {
        let transform = TransformBuilder::new()
            .with_position(Vector3::new(10.0, 0.0, 0.0))
            .with_scale(Vector3::new(2.0, 2.0, 2.0))
            .build();
        let m = transform.matrix();
        // Scale applies before translation.
        let p = m.transform_point(&Vector3::new(1.0, 0.0, 0.0).into());
        assert_eq!(p.coords, Vector3::new(12.0, 0.0, 0.0));
    }

    #[test]
    fn inverse_cancels() {
        let transform = TransformBuilder::new()
            .with_position(Vector3::new(1.0, 2.0, 3.0))
            .with_rotation(UnitQuaternion::from_axis_angle(
                &Vector3::z_axis(),
                std::f32::consts::FRAC_PI_3,
            ))
            .build();
        let product = transform.matrix() * transform.inv_matrix();
        assert!(m4x4_approx_eq(&product, &Matrix4::identity()));
    }

    #[test]
    fn singular_inverse_is_identity() {
        let transform = TransformBuilder::new()
            .with_scale(Vector3::zeros())
            .build();
        assert_eq!(transform.inv_matrix(), Matrix4::identity());
    }
}
