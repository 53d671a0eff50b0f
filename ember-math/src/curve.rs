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

//! Piecewise time-keyed curve. Keys are kept sorted by location and each key
//! chooses how the segment to its right is interpolated.

use crate::{cubicf, easing::Easing, lerpf};
use std::cmp::Ordering;

fn stepf(p0: f32, p1: f32, t: f32) -> f32 {
    if t.eq(&1.0) {
        p1
    } else {
        p0
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum CurveKeyKind {
    Constant,
    Linear,
    Cubic {
        /// A `tan(angle)` of left tangent.
        left_tangent: f32,
        /// A `tan(angle)` of right tangent.
        right_tangent: f32,
    },
    /// Named easing applied over the segment.
    Eased(Easing),
}

impl CurveKeyKind {
    #[inline]
    pub fn new_cubic(left_angle_radians: f32, right_angle_radians: f32) -> Self {
        Self::Cubic {
            left_tangent: left_angle_radians.tan(),
            right_tangent: right_angle_radians.tan(),
        }
    }
}

impl Default for CurveKeyKind {
    #[inline]
    fn default() -> Self {
        Self::Constant
    }
}

#[derive(Clone, Default, Debug, PartialEq)]
pub struct CurveKey {
    location: f32,
    pub value: f32,
    pub kind: CurveKeyKind,
}

impl CurveKey {
    #[inline]
    pub fn new(location: f32, value: f32, kind: CurveKeyKind) -> Self {
        Self {
            location,
            value,
            kind,
        }
    }

    #[inline]
    pub fn location(&self) -> f32 {
        self.location
    }

    #[inline]
    pub fn interpolate(&self, other: &Self, t: f32) -> f32 {
        match (&self.kind, &other.kind) {
            (CurveKeyKind::Constant, _) => stepf(self.value, other.value, t),

            (CurveKeyKind::Linear, _) => lerpf(self.value, other.value, t),

            (CurveKeyKind::Eased(easing), _) => {
                lerpf(self.value, other.value, (easing.function())(t))
            }

            // The right tangent of the left key meets the left tangent of the
            // right key; a non-cubic right key contributes a flat tangent.
            (
                CurveKeyKind::Cubic {
                    right_tangent: left_tangent,
                    ..
                },
                CurveKeyKind::Cubic {
                    left_tangent: right_tangent,
                    ..
                },
            ) => cubicf(self.value, other.value, t, *left_tangent, *right_tangent),

            (
                CurveKeyKind::Cubic {
                    right_tangent: left_tangent,
                    ..
                },
                _,
            ) => cubicf(self.value, other.value, t, *left_tangent, 0.0),
        }
    }
}

/// See module docs.
#[derive(Clone, Default, Debug, PartialEq)]
pub struct Curve {
    keys: Vec<CurveKey>,
}

fn sort_keys(keys: &mut [CurveKey]) {
    keys.sort_by(|a, b| {
        a.location
            .partial_cmp(&b.location)
            .unwrap_or(Ordering::Equal)
    });
}

impl From<Vec<CurveKey>> for Curve {
    fn from(mut keys: Vec<CurveKey>) -> Self {
        sort_keys(&mut keys);
        Self { keys }
    }
}

impl Curve {
    #[inline]
    pub fn keys(&self) -> &[CurveKey] {
        &self.keys
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Adds a key keeping the sort order.
    pub fn add_key(&mut self, new_key: CurveKey) {
        let pos = self
            .keys
            .partition_point(|k| k.location < new_key.location);
        self.keys.insert(pos, new_key);
    }

    /// Evaluates the curve at the given location. Out-of-range locations
    /// clamp to the first/last key value; an empty curve yields zero.
    pub fn value_at(&self, location: f32) -> f32 {
        match self.keys.as_slice() {
            [] => 0.0,
            [single] => single.value,
            keys @ [first, .., last] => {
                if location <= first.location {
                    first.value
                } else if location >= last.location {
                    last.value
                } else {
                    // Binary search for the segment containing the location.
                    let right_index = keys.partition_point(|k| k.location < location);
                    let left = &keys[right_index - 1];
                    let right = &keys[right_index];
                    let span = right.location - left.location;
                    let t = if span > 0.0 {
                        (location - left.location) / span
                    } else {
                        0.0
                    };
                    left.interpolate(right, t)
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn keys_are_sorted_on_construction() {
        let curve = Curve::from(vec![
            CurveKey::new(2.0, 20.0, CurveKeyKind::Linear),
            CurveKey::new(0.0, 0.0, CurveKeyKind::Linear),
            CurveKey::new(1.0, 10.0, CurveKeyKind::Linear),
        ]);
        let locations: Vec<f32> = curve.keys().iter().map(|k| k.location()).collect();
        assert_eq!(locations, vec![0.0, 1.0, 2.0]);
    }

    #[test]
    fn linear_segments() {
        let curve = Curve::from(vec![
            CurveKey::new(0.0, 0.0, CurveKeyKind::Linear),
            CurveKey::new(1.0, 10.0, CurveKeyKind::Linear),
        ]);
        assert_eq!(curve.value_at(0.5), 5.0);
        // Clamping outside the key range.
        assert_eq!(curve.value_at(-1.0), 0.0);
        assert_eq!(curve.value_at(2.0), 10.0);
    }

    #[test]
    fn constant_holds_until_next_key() {
        let curve = Curve::from(vec![
            CurveKey::new(0.0, 1.0, CurveKeyKind::Constant),
            CurveKey::new(1.0, 2.0, CurveKeyKind::Linear),
        ]);
        assert_eq!(curve.value_at(0.999), 1.0);
        assert_eq!(curve.value_at(1.0), 2.0);
    }

    #[test]
    fn empty_and_single() {
        assert_eq!(Curve::default().value_at(5.0), 0.0);
        let single = Curve::from(vec![CurveKey::new(0.0, 7.0, CurveKeyKind::Linear)]);
        assert_eq!(single.value_at(-10.0), 7.0);
        assert_eq!(single.value_at(10.0), 7.0);
    }

    #[test]
    fn eased_segment() {
        let curve = Curve::from(vec![
            CurveKey::new(0.0, 0.0, CurveKeyKind::Eased(Easing::InQuad)),
            CurveKey::new(1.0, 1.0, CurveKeyKind::Linear),
        ]);
        assert_eq!(curve.value_at(0.5), 0.25);
    }
}
