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

//! Ray casting against the geometric primitives. A ray is a half-open
//! segment: `origin + dir * t` with `t` in `[0, 1]`, so `dir` carries the
//! length of the ray.

use crate::{aabb::AxisAlignedBoundingBox, plane::Plane, shapes::is_point_inside_triangle};
use nalgebra::{Matrix4, Point3, Vector3};

#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Ray {
    pub origin: Vector3<f32>,
    pub dir: Vector3<f32>,
}

/// Pair of parametric positions where a ray enters and leaves a convex shape.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct IntersectionResult {
    pub min: f32,
    pub max: f32,
}

impl IntersectionResult {
    #[inline]
    pub fn from_roots(a: f32, b: f32) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }
}

impl Ray {
    #[inline]
    pub fn new(origin: Vector3<f32>, dir: Vector3<f32>) -> Self {
        Self { origin, dir }
    }

    #[inline]
    pub fn from_two_points(begin: Vector3<f32>, end: Vector3<f32>) -> Self {
        Self {
            origin: begin,
            dir: end - begin,
        }
    }

    #[inline]
    pub fn get_point(&self, t: f32) -> Vector3<f32> {
        self.origin + self.dir.scale(t)
    }

    /// Projects the point on the ray's carrier line, returning the parametric
    /// position of the perpendicular foot.
    #[inline]
    pub fn project_point(&self, point: &Vector3<f32>) -> f32 {
        (point - self.origin).dot(&self.dir) / self.dir.norm_squared()
    }

    /// Solves the ray/sphere quadratic. Returns both roots even if they are
    /// outside `[0, 1]`; `None` when the ray misses entirely.
    pub fn sphere_intersection(
        &self,
        position: &Vector3<f32>,
        radius: f32,
    ) -> Option<IntersectionResult> {
        let d = self.origin - position;
        let a = self.dir.dot(&self.dir);
        let b = 2.0 * self.dir.dot(&d);
        let c = d.dot(&d) - radius * radius;
        let discriminant = b * b - 4.0 * a * c;
        if discriminant < 0.0 || a == 0.0 {
            return None;
        }
        let sq = discriminant.sqrt();
        Some(IntersectionResult::from_roots(
            (-b + sq) / (2.0 * a),
            (-b - sq) / (2.0 * a),
        ))
    }

    #[inline]
    pub fn sphere_test(&self, position: &Vector3<f32>, radius: f32) -> bool {
        self.sphere_intersection(position, radius)
            .is_some_and(|r| r.max >= 0.0 && r.min <= 1.0)
    }

    /// Slab test against an axis-aligned box.
    pub fn aabb_intersection(&self, aabb: &AxisAlignedBoundingBox) -> Option<IntersectionResult> {
        let mut tmin = 0.0f32;
        let mut tmax = 1.0f32;

        for i in 0..3 {
            if self.dir[i].abs() < f32::EPSILON {
                // Parallel to the slab; miss unless the origin is inside it.
                if self.origin[i] < aabb.min[i] || self.origin[i] > aabb.max[i] {
                    return None;
                }
            } else {
                let inv_d = 1.0 / self.dir[i];
                let mut t1 = (aabb.min[i] - self.origin[i]) * inv_d;
                let mut t2 = (aabb.max[i] - self.origin[i]) * inv_d;
                if t1 > t2 {
                    std::mem::swap(&mut t1, &mut t2);
                }
                tmin = tmin.max(t1);
                tmax = tmax.min(t2);
                if tmin > tmax {
                    return None;
                }
            }
        }

        Some(IntersectionResult {
            min: tmin,
            max: tmax,
        })
    }

    #[inline]
    pub fn aabb_test(&self, aabb: &AxisAlignedBoundingBox) -> bool {
        self.aabb_intersection(aabb).is_some()
    }

    /// Parametric position where the ray crosses the plane; negative when the
    /// plane is behind the origin, infinite when the ray is parallel.
    #[inline]
    pub fn plane_intersection(&self, plane: &Plane) -> f32 {
        -(self.origin.dot(&plane.normal) + plane.d) / self.dir.dot(&plane.normal)
    }

    pub fn plane_intersection_point(&self, plane: &Plane) -> Option<Vector3<f32>> {
        let t = self.plane_intersection(plane);
        if !t.is_finite() || !(0.0..=1.0).contains(&t) {
            None
        } else {
            Some(self.get_point(t))
        }
    }

    pub fn triangle_intersection_point(
        &self,
        vertices: &[Vector3<f32>; 3],
    ) -> Option<Vector3<f32>> {
        let plane = Plane::from_triangle(&vertices[0], &vertices[1], &vertices[2])?;
        let point = self.plane_intersection_point(&plane)?;
        is_point_inside_triangle(&point, vertices).then_some(point)
    }

    /// Returns a new ray with the origin and direction transformed by the
    /// given matrix.
    #[inline]
    pub fn transform(&self, mat: Matrix4<f32>) -> Self {
        Self {
            origin: mat.transform_point(&Point3::from(self.origin)).coords,
            dir: mat.transform_vector(&self.dir),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn ray_sphere() {
        let ray = Ray::from_two_points(Vector3::new(-2.0, 0.0, 0.0), Vector3::new(2.0, 0.0, 0.0));
        assert!(ray.sphere_test(&Vector3::zeros(), 1.0));
        assert!(!ray.sphere_test(&Vector3::new(0.0, 5.0, 0.0), 1.0));
        // Sphere behind the ray.
        let ray = Ray::from_two_points(Vector3::new(2.0, 0.0, 0.0), Vector3::new(4.0, 0.0, 0.0));
        assert!(!ray.sphere_test(&Vector3::zeros(), 1.0));
    }

    #[test]
    fn ray_aabb() {
        let aabb =
            AxisAlignedBoundingBox::from_min_max(Vector3::repeat(-1.0), Vector3::repeat(1.0));
        let hit = Ray::from_two_points(Vector3::new(-5.0, 0.0, 0.0), Vector3::new(5.0, 0.0, 0.0));
        assert!(hit.aabb_test(&aabb));
        let miss = Ray::from_two_points(Vector3::new(-5.0, 3.0, 0.0), Vector3::new(5.0, 3.0, 0.0));
        assert!(!miss.aabb_test(&aabb));
        // Origin inside.
        let inside = Ray::new(Vector3::zeros(), Vector3::new(0.1, 0.0, 0.0));
        assert!(inside.aabb_test(&aabb));
    }

    #[test]
    fn ray_plane_point() {
        let plane =
            Plane::from_normal_and_point(&Vector3::new(0.0, 1.0, 0.0), &Vector3::zeros()).unwrap();
        let ray = Ray::from_two_points(Vector3::new(0.0, 2.0, 0.0), Vector3::new(0.0, -2.0, 0.0));
        assert_eq!(
            ray.plane_intersection_point(&plane),
            Some(Vector3::zeros())
        );
    }

    #[test]
    fn ray_triangle() {
        let tri = [
            Vector3::new(-1.0, 0.0, -1.0),
            Vector3::new(1.0, 0.0, -1.0),
            Vector3::new(0.0, 0.0, 1.0),
        ];
        let ray = Ray::from_two_points(Vector3::new(0.0, 1.0, 0.0), Vector3::new(0.0, -1.0, 0.0));
        assert!(ray.triangle_intersection_point(&tri).is_some());
        let off = Ray::from_two_points(Vector3::new(5.0, 1.0, 0.0), Vector3::new(5.0, -1.0, 0.0));
        assert!(off.triangle_intersection_point(&tri).is_none());
    }
}
