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

//! Convex shapes used for the simple collision queries of the engine:
//! spheres, capsules and point-in-triangle tests.

use crate::ray::Ray;
use nalgebra::{Vector2, Vector3};

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Sphere {
    pub center: Vector3<f32>,
    pub radius: f32,
}

impl Sphere {
    #[inline]
    pub fn new(center: Vector3<f32>, radius: f32) -> Self {
        Self { center, radius }
    }

    #[inline]
    pub fn contains_point(&self, point: Vector3<f32>) -> bool {
        (point - self.center).norm_squared() <= self.radius * self.radius
    }

    /// Distance from a point to the sphere surface; zero inside.
    #[inline]
    pub fn distance_to_point(&self, point: Vector3<f32>) -> f32 {
        ((point - self.center).norm() - self.radius).max(0.0)
    }

    #[inline]
    pub fn sphere_test(&self, other: &Sphere) -> bool {
        let r = self.radius + other.radius;
        (other.center - self.center).norm_squared() <= r * r
    }

    #[inline]
    pub fn ray_test(&self, ray: &Ray) -> bool {
        ray.sphere_test(&self.center, self.radius)
    }
}

/// Returns the parametric position of the perpendicular foot of `p` on the
/// segment `a..b`, clamped into `[0, 1]`. A degenerate segment yields 0.
#[inline]
pub fn segment_closest_t(p: &Vector3<f32>, a: &Vector3<f32>, b: &Vector3<f32>) -> f32 {
    let ab = b - a;
    let sq = ab.norm_squared();
    if sq <= f32::MIN_POSITIVE {
        0.0
    } else {
        ((p - a).dot(&ab) / sq).clamp(0.0, 1.0)
    }
}

/// Foot of the perpendicular dropped from `p` onto the segment `a..b`,
/// clamped to the segment ends.
#[inline]
pub fn segment_perpendicular_foot(
    p: &Vector3<f32>,
    a: &Vector3<f32>,
    b: &Vector3<f32>,
) -> Vector3<f32> {
    a + (b - a).scale(segment_closest_t(p, a, b))
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Capsule {
    pub begin: Vector3<f32>,
    pub end: Vector3<f32>,
    pub radius: f32,
}

impl Capsule {
    #[inline]
    pub fn new(begin: Vector3<f32>, end: Vector3<f32>, radius: f32) -> Self {
        Self { begin, end, radius }
    }

    /// Distance from a point to the capsule surface; zero inside.
    #[inline]
    pub fn distance_to_point(&self, point: Vector3<f32>) -> f32 {
        let foot = segment_perpendicular_foot(&point, &self.begin, &self.end);
        ((point - foot).norm() - self.radius).max(0.0)
    }

    #[inline]
    pub fn contains_point(&self, point: Vector3<f32>) -> bool {
        let foot = segment_perpendicular_foot(&point, &self.begin, &self.end);
        (point - foot).norm_squared() <= self.radius * self.radius
    }

    #[inline]
    pub fn sphere_test(&self, sphere: &Sphere) -> bool {
        let foot = segment_perpendicular_foot(&sphere.center, &self.begin, &self.end);
        let r = self.radius + sphere.radius;
        (sphere.center - foot).norm_squared() <= r * r
    }

    /// Conservative ray test: samples the closest approach of the ray to the
    /// capsule axis by testing spheres at both caps and the segment foot of
    /// the ray origin and end points.
    pub fn ray_test(&self, ray: &Ray) -> bool {
        if ray.sphere_test(&self.begin, self.radius) || ray.sphere_test(&self.end, self.radius) {
            return true;
        }
        for point in [ray.origin, ray.origin + ray.dir] {
            let foot = segment_perpendicular_foot(&point, &self.begin, &self.end);
            if ray.sphere_test(&foot, self.radius) {
                return true;
            }
        }
        false
    }
}

/// Point-in-triangle via the three-edge-cross sign method. Points lying on an
/// edge or a vertex count as inside; a degenerate triangle contains nothing.
pub fn is_point_inside_triangle(p: &Vector3<f32>, vertices: &[Vector3<f32>; 3]) -> bool {
    let [a, b, c] = *vertices;

    let normal = (b - a).cross(&(c - a));
    if normal.norm_squared() <= f32::MIN_POSITIVE {
        return false;
    }

    let c0 = (b - a).cross(&(p - a)).dot(&normal);
    let c1 = (c - b).cross(&(p - b)).dot(&normal);
    let c2 = (a - c).cross(&(p - c)).dot(&normal);

    (c0 >= 0.0 && c1 >= 0.0 && c2 >= 0.0) || (c0 <= 0.0 && c1 <= 0.0 && c2 <= 0.0)
}

/// 2D variant of the edge-cross sign test, same edge/vertex inclusion rules.
pub fn is_point_inside_triangle_2d(
    p: Vector2<f32>,
    a: Vector2<f32>,
    b: Vector2<f32>,
    c: Vector2<f32>,
) -> bool {
    let cross2 = |u: Vector2<f32>, v: Vector2<f32>| u.x * v.y - u.y * v.x;

    // Degenerate triangle: zero signed area.
    if cross2(b - a, c - a) == 0.0 {
        return false;
    }

    let c0 = cross2(b - a, p - a);
    let c1 = cross2(c - b, p - b);
    let c2 = cross2(a - c, p - c);

    (c0 >= 0.0 && c1 >= 0.0 && c2 >= 0.0) || (c0 <= 0.0 && c1 <= 0.0 && c2 <= 0.0)
}
