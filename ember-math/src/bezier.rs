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

//! Cubic Bézier segments and multi-segment paths.

use nalgebra::Vector3;

/// One cubic segment: two anchors with a control point each.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BezierSegment {
    pub anchor0: Vector3<f32>,
    pub control0: Vector3<f32>,
    pub control1: Vector3<f32>,
    pub anchor1: Vector3<f32>,
}

impl BezierSegment {
    #[inline]
    pub fn new(
        anchor0: Vector3<f32>,
        control0: Vector3<f32>,
        control1: Vector3<f32>,
        anchor1: Vector3<f32>,
    ) -> Self {
        Self {
            anchor0,
            control0,
            control1,
            anchor1,
        }
    }

    /// Point on the segment. The endpoints are exact: `coord(0)` is the first
    /// anchor and `coord(1)` is the second, bit for bit.
    pub fn coord(&self, t: f32) -> Vector3<f32> {
        if t <= 0.0 {
            return self.anchor0;
        }
        if t >= 1.0 {
            return self.anchor1;
        }
        let u = 1.0 - t;
        self.anchor0.scale(u * u * u)
            + self.control0.scale(3.0 * u * u * t)
            + self.control1.scale(3.0 * u * t * t)
            + self.anchor1.scale(t * t * t)
    }

    /// First derivative with respect to `t`.
    pub fn tangent(&self, t: f32) -> Vector3<f32> {
        let t = t.clamp(0.0, 1.0);
        let u = 1.0 - t;
        (self.control0 - self.anchor0).scale(3.0 * u * u)
            + (self.control1 - self.control0).scale(6.0 * u * t)
            + (self.anchor1 - self.control1).scale(3.0 * t * t)
    }

    /// Approximate arc length by uniform subdivision.
    pub fn length(&self, steps: usize) -> f32 {
        let steps = steps.max(1);
        let mut total = 0.0;
        let mut prev = self.anchor0;
        for i in 1..=steps {
            let p = self.coord(i as f32 / steps as f32);
            total += (p - prev).norm();
            prev = p;
        }
        total
    }
}

/// A chain of cubic segments. Adjacent segments share anchors, but the path
/// does not enforce that; it simply evaluates whatever segments it holds.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BezierPath {
    segments: Vec<BezierSegment>,
}

impl BezierPath {
    #[inline]
    pub fn segments(&self) -> &[BezierSegment] {
        &self.segments
    }

    pub fn push(&mut self, segment: BezierSegment) {
        self.segments.push(segment);
    }

    /// Point on the given segment; `None` for an out-of-range index.
    pub fn coord(&self, segment: usize, t: f32) -> Option<Vector3<f32>> {
        self.segments.get(segment).map(|s| s.coord(t))
    }
}
