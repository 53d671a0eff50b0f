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

//! Colours in two flavours: [`Color`] is float RGBA in 0..1 used for mixing
//! and hierarchy inheritance, [`Color32`] is packed 8-bit RGBA used in vertex
//! data and texture pixels.

use crate::algebra::Vector4;
use bytemuck::{Pod, Zeroable};
use std::ops::{Add, AddAssign, Mul, MulAssign, Sub, SubAssign};

/// Float RGBA colour. Components are nominally in 0..1 but are not clamped
/// until packing, so intermediate arithmetic may leave the range.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Default for Color {
    #[inline]
    fn default() -> Self {
        Self::WHITE
    }
}

impl Color {
    pub const WHITE: Color = Color::repeat(1.0);
    pub const BLACK: Color = Color::new(0.0, 0.0, 0.0, 1.0);
    pub const TRANSPARENT: Color = Color::repeat(0.0);

    #[inline]
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    #[inline]
    pub const fn repeat(v: f32) -> Self {
        Self {
            r: v,
            g: v,
            b: v,
            a: v,
        }
    }

    #[inline]
    pub fn as_vector4(self) -> Vector4<f32> {
        Vector4::new(self.r, self.g, self.b, self.a)
    }

    /// Component-wise clamp into 0..1.
    #[inline]
    pub fn saturated(self) -> Self {
        Self {
            r: self.r.clamp(0.0, 1.0),
            g: self.g.clamp(0.0, 1.0),
            b: self.b.clamp(0.0, 1.0),
            a: self.a.clamp(0.0, 1.0),
        }
    }

    #[inline]
    pub fn lerp(self, other: Self, t: f32) -> Self {
        Self {
            r: self.r + (other.r - self.r) * t,
            g: self.g + (other.g - self.g) * t,
            b: self.b + (other.b - self.b) * t,
            a: self.a + (other.a - self.a) * t,
        }
    }

    /// True when every component differs by no more than `tolerance`.
    #[inline]
    pub fn approx_eq(self, other: Self, tolerance: f32) -> bool {
        (self.r - other.r).abs() <= tolerance
            && (self.g - other.g).abs() <= tolerance
            && (self.b - other.b).abs() <= tolerance
            && (self.a - other.a).abs() <= tolerance
    }
}

impl Add for Color {
    type Output = Color;

    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self::new(
            self.r + rhs.r,
            self.g + rhs.g,
            self.b + rhs.b,
            self.a + rhs.a,
        )
    }
}

impl AddAssign for Color {
    #[inline]
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sub for Color {
    type Output = Color;

    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Self::new(
            self.r - rhs.r,
            self.g - rhs.g,
            self.b - rhs.b,
            self.a - rhs.a,
        )
    }
}

impl SubAssign for Color {
    #[inline]
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

// Modulation, the operation used for colour inheritance down the node tree.
impl Mul for Color {
    type Output = Color;

    #[inline]
    fn mul(self, rhs: Self) -> Self {
        Self::new(
            self.r * rhs.r,
            self.g * rhs.g,
            self.b * rhs.b,
            self.a * rhs.a,
        )
    }
}

impl MulAssign for Color {
    #[inline]
    fn mul_assign(&mut self, rhs: Self) {
        *self = *self * rhs;
    }
}

/// Packed 8-bit RGBA colour.
#[derive(Copy, Clone, Debug, PartialOrd, PartialEq, Eq, Hash, Pod, Zeroable)]
#[repr(C)]
pub struct Color32 {
    // Do not change order! The GPU vertex layout requires this order.
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Default for Color32 {
    #[inline]
    fn default() -> Self {
        Self::WHITE
    }
}

impl Color32 {
    pub const WHITE: Color32 = Color32::new(255, 255, 255, 255);
    pub const BLACK: Color32 = Color32::new(0, 0, 0, 255);
    pub const TRANSPARENT: Color32 = Color32::new(0, 0, 0, 0);

    #[inline]
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }
}

impl From<Color> for Color32 {
    #[inline]
    fn from(c: Color) -> Self {
        Self {
            r: (c.r.clamp(0.0, 1.0) * 255.0) as u8,
            g: (c.g.clamp(0.0, 1.0) * 255.0) as u8,
            b: (c.b.clamp(0.0, 1.0) * 255.0) as u8,
            a: (c.a.clamp(0.0, 1.0) * 255.0) as u8,
        }
    }
}

impl From<Color32> for Color {
    #[inline]
    fn from(c: Color32) -> Self {
        Self {
            r: c.r as f32 / 255.0,
            g: c.g as f32 / 255.0,
            b: c.b as f32 / 255.0,
            a: c.a as f32 / 255.0,
        }
    }
}

impl From<Color32> for u32 {
    #[inline]
    fn from(c: Color32) -> u32 {
        ((c.a as u32) << 24) | ((c.b as u32) << 16) | ((c.g as u32) << 8) | (c.r as u32)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn modulation_is_componentwise() {
        let a = Color::new(0.5, 1.0, 0.25, 1.0);
        let b = Color::new(1.0, 0.5, 1.0, 0.5);
        assert_eq!(a * b, Color::new(0.5, 0.5, 0.25, 0.5));
    }

    #[test]
    fn pack_round_trip() {
        let c = Color32::new(10, 20, 30, 40);
        let f: Color = c.into();
        let back: Color32 = f.into();
        assert_eq!(c, back);
    }

    #[test]
    fn approx_eq_tolerance() {
        let a = Color::new(0.5, 0.5, 0.5, 1.0);
        let b = Color::new(0.5 + 3.0 / 255.0, 0.5, 0.5, 1.0);
        assert!(a.approx_eq(b, 4.0 / 255.0));
        assert!(!a.approx_eq(b, 1.0 / 255.0));
    }

    #[test]
    fn saturated_clamps() {
        let c = Color::new(-1.0, 2.0, 0.5, 1.5).saturated();
        assert_eq!(c, Color::new(0.0, 1.0, 0.5, 1.0));
    }
}
