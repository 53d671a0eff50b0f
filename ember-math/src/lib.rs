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

//! Math and geometry for the engine.
//!
//! Everything here follows one failure policy: operations never panic. A
//! degenerate input either yields `None`/`false` or a neutral value (zero,
//! identity) with an explicit flag, and it is up to the caller to decide
//! whether that is an error.

pub mod aabb;
pub mod bezier;
pub mod curve;
pub mod easing;
pub mod noise;
pub mod plane;
pub mod ray;
pub mod shapes;

use nalgebra::{Matrix4, Quaternion, Unit, UnitQuaternion, Vector2, Vector3};

#[inline(always)]
pub fn lerpf(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

// https://en.wikipedia.org/wiki/Cubic_Hermite_spline
#[inline]
pub fn cubicf(p0: f32, p1: f32, t: f32, m0: f32, m1: f32) -> f32 {
    let t2 = t * t;
    let t3 = t2 * t;
    let scale = (p1 - p0).abs();

    (2.0 * t3 - 3.0 * t2 + 1.0) * p0
        + (t3 - 2.0 * t2 + t) * m0 * scale
        + (-2.0 * t3 + 3.0 * t2) * p1
        + (t3 - t2) * m1 * scale
}

/// Hermite interpolation with explicit slopes at both ends.
#[inline]
pub fn hermitef(t: f32, v0: f32, v1: f32, slope0: f32, slope1: f32) -> f32 {
    let t2 = t * t;
    let t3 = t2 * t;
    (2.0 * t3 - 3.0 * t2 + 1.0) * v0
        + (t3 - 2.0 * t2 + t) * slope0
        + (-2.0 * t3 + 3.0 * t2) * v1
        + (t3 - t2) * slope1
}

#[inline]
pub fn wrap_angle(angle: f32) -> f32 {
    let two_pi = 2.0 * std::f32::consts::PI;

    if angle > 0.0 {
        angle % two_pi
    } else {
        (angle + two_pi) % two_pi
    }
}

/// There are two versions of remainder, the standard `%` operator which does
/// `x - (x/y).trunc()*y` and IEEE remainder which does `x - (x/y).round()*y`.
#[inline]
pub fn ieee_remainder(x: f32, y: f32) -> f32 {
    x - (x / y).round() * y
}

#[inline]
pub fn round_to_step(x: f32, step: f32) -> f32 {
    x - ieee_remainder(x, step)
}

#[inline]
pub fn wrapf(mut n: f32, mut min_limit: f32, mut max_limit: f32) -> f32 {
    if n >= min_limit && n <= max_limit {
        return n;
    }

    if max_limit == 0.0 && min_limit == 0.0 {
        return 0.0;
    }

    max_limit -= min_limit;

    let offset = min_limit;
    min_limit = 0.0;
    n -= offset;

    let num_of_max = (n / max_limit).abs().floor();

    if n >= max_limit {
        n -= num_of_max * max_limit;
    } else if n < min_limit {
        n += (num_of_max + 1.0) * max_limit;
    }

    n + offset
}

/// Wraps an integer into `[0, b)`. `b` must be positive; non-positive `b`
/// yields 0.
#[inline]
pub fn repeat_i(a: i32, b: i32) -> i32 {
    if b <= 0 {
        return 0;
    }
    ((a % b) + b) % b
}

/// Safe normalisation. Returns `None` when the squared length is zero or
/// underflows, leaving the caller's value untouched.
#[inline]
pub fn normalize_checked2(v: Vector2<f32>) -> Option<Vector2<f32>> {
    let sq = v.norm_squared();
    if sq <= f32::MIN_POSITIVE {
        None
    } else {
        Some(v / sq.sqrt())
    }
}

/// Safe normalisation. Returns `None` when the squared length is zero or
/// underflows, leaving the caller's value untouched.
#[inline]
pub fn normalize_checked(v: Vector3<f32>) -> Option<Vector3<f32>> {
    let sq = v.norm_squared();
    if sq <= f32::MIN_POSITIVE {
        None
    } else {
        Some(v / sq.sqrt())
    }
}

/// Builds a rotation from axis and angle. Fails on a zero (or denormal) axis.
#[inline]
pub fn quat_from_axis_angle(axis: Vector3<f32>, angle: f32) -> Option<UnitQuaternion<f32>> {
    normalize_checked(axis)
        .map(|axis| UnitQuaternion::from_axis_angle(&Unit::new_unchecked(axis), angle))
}

/// Spherical interpolation that always follows the shorter arc: when the dot
/// product of the two rotations is negative, one of them is negated first.
/// At `t == 0` returns `a`, at `t == 1` returns `b` (possibly negated, which
/// represents the same rotation).
#[inline]
pub fn slerp_shortest(
    a: &UnitQuaternion<f32>,
    b: &UnitQuaternion<f32>,
    t: f32,
) -> UnitQuaternion<f32> {
    let qa = a.quaternion();
    let mut qb = *b.quaternion();

    let mut dot = qa.dot(&qb);
    if dot < 0.0 {
        qb = -qb;
        dot = -dot;
    }

    // Nearly parallel rotations degrade slerp numerically, fall back to nlerp.
    if dot > 0.9995 {
        return Unit::new_normalize(qa.lerp(&qb, t));
    }

    let theta = dot.clamp(-1.0, 1.0).acos();
    let sin_theta = theta.sin();
    let wa = ((1.0 - t) * theta).sin() / sin_theta;
    let wb = (t * theta).sin() / sin_theta;
    Unit::new_normalize(Quaternion::from(qa.coords * wa + qb.coords * wb))
}

/// Linear quaternion interpolation with renormalised result.
#[inline]
pub fn nlerp(a: &UnitQuaternion<f32>, b: &UnitQuaternion<f32>, t: f32) -> UnitQuaternion<f32> {
    Unit::new_normalize(a.quaternion().lerp(b.quaternion(), t))
}

/// Matrix inversion that never fails the caller: when the determinant is
/// exactly zero the identity is returned and the flag is `false`.
#[inline]
pub fn try_invert(m: &Matrix4<f32>) -> (Matrix4<f32>, bool) {
    if m.determinant() == 0.0 {
        (Matrix4::identity(), false)
    } else {
        match m.try_inverse() {
            Some(inv) => (inv, true),
            None => (Matrix4::identity(), false),
        }
    }
}

#[inline]
pub fn m4x4_approx_eq_eps(a: &Matrix4<f32>, b: &Matrix4<f32>, eps: f32) -> bool {
    a.iter().zip(b.iter()).all(|(a, b)| (*a - *b).abs() <= eps)
}

#[inline]
pub fn m4x4_approx_eq(a: &Matrix4<f32>, b: &Matrix4<f32>) -> bool {
    m4x4_approx_eq_eps(a, b, 0.001)
}

#[cfg(test)]
mod test {
    use super::*;
    use std::f32::consts::PI;

    #[test]
    fn normalize_zero_vector_fails() {
        assert!(normalize_checked(Vector3::zeros()).is_none());
        assert!(normalize_checked2(Vector2::zeros()).is_none());
        let n = normalize_checked(Vector3::new(0.0, 3.0, 4.0)).unwrap();
        assert!((n.norm() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn repeat_i_stays_in_range() {
        for a in -100..100 {
            for b in 1..10 {
                let r = repeat_i(a, b);
                assert!((0..b).contains(&r), "repeat_i({a}, {b}) = {r}");
            }
        }
        assert_eq!(repeat_i(5, 0), 0);
    }

    #[test]
    fn axis_angle_rejects_zero_axis() {
        assert!(quat_from_axis_angle(Vector3::zeros(), 1.0).is_none());
        assert!(quat_from_axis_angle(Vector3::x(), 1.0).is_some());
    }

    #[test]
    fn slerp_endpoints() {
        let a = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), 0.3);
        let b = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), 2.5);
        let r0 = slerp_shortest(&a, &b, 0.0);
        let r1 = slerp_shortest(&a, &b, 1.0);
        assert!(r0.angle_to(&a) < 1e-4);
        assert!(r1.angle_to(&b) < 1e-4);
    }

    #[test]
    fn slerp_takes_shorter_arc() {
        // 350 degrees apart the long way means 10 degrees the short way.
        let a = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), 0.0);
        let b = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), 350.0f32.to_radians());
        let mid = slerp_shortest(&a, &b, 0.5);
        assert!(mid.angle_to(&a) < 10.0f32.to_radians());
    }

    #[test]
    fn invert_singular_matrix_yields_identity() {
        let singular = Matrix4::from_diagonal(&nalgebra::Vector4::new(1.0, 0.0, 1.0, 1.0));
        let (inv, ok) = try_invert(&singular);
        assert!(!ok);
        assert_eq!(inv, Matrix4::identity());

        let m = Matrix4::new_translation(&Vector3::new(1.0, 2.0, 3.0));
        let (inv, ok) = try_invert(&m);
        assert!(ok);
        assert!(m4x4_approx_eq(&(m * inv), &Matrix4::identity()));
    }

    #[test]
    fn wrap_angle_range() {
        assert!((wrap_angle(3.0 * PI) - PI).abs() < 1e-6);
        assert!(wrap_angle(-PI / 2.0) >= 0.0);
    }
}
