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

//! Easing functions on normalised time.
//!
//! Every function maps `t` in `[0, 1]` to a blend weight; most keep the
//! output in `[0, 1]` as well, `back` overshoots on purpose. Compose with
//! [`crate::lerpf`] to ease between arbitrary values.

use std::f32::consts::PI;

/// Overshoot coefficient for a `back` easing that goes ~10% past the target.
pub const BACK_10: f32 = 1.70158;
/// Overshoot coefficient for ~20%.
pub const BACK_20: f32 = 2.59238;
/// Overshoot coefficient for ~30%.
pub const BACK_30: f32 = 3.39405;

/// Always 1, regardless of `t`.
#[inline]
pub fn one(_t: f32) -> f32 {
    1.0
}

/// 0 until `t` reaches 1, then 1.
#[inline]
pub fn keep(t: f32) -> f32 {
    if t < 1.0 {
        0.0
    } else {
        1.0
    }
}

/// 0 at `t <= 0`, 1 as soon as `t` exceeds 0.
#[inline]
pub fn step(t: f32) -> f32 {
    if t <= 0.0 {
        0.0
    } else {
        1.0
    }
}

#[inline]
pub fn linear(t: f32) -> f32 {
    t.clamp(0.0, 1.0)
}

#[inline]
pub fn smoothstep(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

#[inline]
pub fn smootherstep(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    t * t * t * (t * (t * 6.0 - 15.0) + 10.0)
}

/// One full sine arch: 0 at both ends, 1 in the middle.
#[inline]
pub fn wave(t: f32) -> f32 {
    (t.clamp(0.0, 1.0) * PI).sin()
}

#[inline]
pub fn in_sine(t: f32) -> f32 {
    1.0 - ((t.clamp(0.0, 1.0) * PI / 2.0).cos())
}

#[inline]
pub fn out_sine(t: f32) -> f32 {
    (t.clamp(0.0, 1.0) * PI / 2.0).sin()
}

#[inline]
pub fn in_out_sine(t: f32) -> f32 {
    -((t.clamp(0.0, 1.0) * PI).cos() - 1.0) / 2.0
}

#[inline]
pub fn in_quad(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    t * t
}

#[inline]
pub fn out_quad(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    1.0 - (1.0 - t) * (1.0 - t)
}

#[inline]
pub fn in_out_quad(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    if t < 0.5 {
        2.0 * t * t
    } else {
        1.0 - (-2.0 * t + 2.0).powi(2) / 2.0
    }
}

#[inline]
pub fn in_cubic(t: f32) -> f32 {
    t.clamp(0.0, 1.0).powi(3)
}

#[inline]
pub fn out_cubic(t: f32) -> f32 {
    1.0 - (1.0 - t.clamp(0.0, 1.0)).powi(3)
}

#[inline]
pub fn in_out_cubic(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    if t < 0.5 {
        4.0 * t * t * t
    } else {
        1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
    }
}

#[inline]
pub fn in_quart(t: f32) -> f32 {
    t.clamp(0.0, 1.0).powi(4)
}

#[inline]
pub fn out_quart(t: f32) -> f32 {
    1.0 - (1.0 - t.clamp(0.0, 1.0)).powi(4)
}

#[inline]
pub fn in_out_quart(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    if t < 0.5 {
        8.0 * t * t * t * t
    } else {
        1.0 - (-2.0 * t + 2.0).powi(4) / 2.0
    }
}

#[inline]
pub fn in_quint(t: f32) -> f32 {
    t.clamp(0.0, 1.0).powi(5)
}

#[inline]
pub fn out_quint(t: f32) -> f32 {
    1.0 - (1.0 - t.clamp(0.0, 1.0)).powi(5)
}

#[inline]
pub fn in_out_quint(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    if t < 0.5 {
        16.0 * t * t * t * t * t
    } else {
        1.0 - (-2.0 * t + 2.0).powi(5) / 2.0
    }
}

#[inline]
pub fn in_expo(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    if t == 0.0 {
        0.0
    } else {
        (2.0f32).powf(10.0 * t - 10.0)
    }
}

#[inline]
pub fn out_expo(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    if t == 1.0 {
        1.0
    } else {
        1.0 - (2.0f32).powf(-10.0 * t)
    }
}

#[inline]
pub fn in_out_expo(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    if t == 0.0 {
        0.0
    } else if t == 1.0 {
        1.0
    } else if t < 0.5 {
        (2.0f32).powf(20.0 * t - 10.0) / 2.0
    } else {
        (2.0 - (2.0f32).powf(-20.0 * t + 10.0)) / 2.0
    }
}

#[inline]
pub fn in_circ(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    1.0 - (1.0 - t * t).sqrt()
}

#[inline]
pub fn out_circ(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    (1.0 - (t - 1.0) * (t - 1.0)).sqrt()
}

#[inline]
pub fn in_out_circ(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    if t < 0.5 {
        (1.0 - (1.0 - (2.0 * t).powi(2)).sqrt()) / 2.0
    } else {
        ((1.0 - (-2.0 * t + 2.0).powi(2)).sqrt() + 1.0) / 2.0
    }
}

/// `back` easing with an explicit overshoot coefficient.
#[inline]
pub fn in_back_ex(t: f32, s: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    t * t * ((s + 1.0) * t - s)
}

#[inline]
pub fn out_back_ex(t: f32, s: f32) -> f32 {
    let t = t.clamp(0.0, 1.0) - 1.0;
    t * t * ((s + 1.0) * t + s) + 1.0
}

#[inline]
pub fn in_out_back_ex(t: f32, s: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    let s = s * 1.525;
    if t < 0.5 {
        let t = 2.0 * t;
        t * t * ((s + 1.0) * t - s) / 2.0
    } else {
        let t = 2.0 * t - 2.0;
        (t * t * ((s + 1.0) * t + s) + 2.0) / 2.0
    }
}

#[inline]
pub fn in_back(t: f32) -> f32 {
    in_back_ex(t, BACK_10)
}

#[inline]
pub fn out_back(t: f32) -> f32 {
    out_back_ex(t, BACK_10)
}

#[inline]
pub fn in_out_back(t: f32) -> f32 {
    in_out_back_ex(t, BACK_10)
}

/// Named easing expression, convertible to the backing function. Useful where
/// the easing is data rather than code, e.g. timeline keys.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum Easing {
    One,
    Keep,
    Step,
    #[default]
    Linear,
    Smoothstep,
    Smootherstep,
    Wave,
    InSine,
    OutSine,
    InOutSine,
    InQuad,
    OutQuad,
    InOutQuad,
    InCubic,
    OutCubic,
    InOutCubic,
    InQuart,
    OutQuart,
    InOutQuart,
    InQuint,
    OutQuint,
    InOutQuint,
    InExpo,
    OutExpo,
    InOutExpo,
    InCirc,
    OutCirc,
    InOutCirc,
    InBack,
    OutBack,
    InOutBack,
}

impl Easing {
    /// Returns the backing `t -> weight` function.
    pub fn function(self) -> fn(f32) -> f32 {
        match self {
            Easing::One => one,
            Easing::Keep => keep,
            Easing::Step => step,
            Easing::Linear => linear,
            Easing::Smoothstep => smoothstep,
            Easing::Smootherstep => smootherstep,
            Easing::Wave => wave,
            Easing::InSine => in_sine,
            Easing::OutSine => out_sine,
            Easing::InOutSine => in_out_sine,
            Easing::InQuad => in_quad,
            Easing::OutQuad => out_quad,
            Easing::InOutQuad => in_out_quad,
            Easing::InCubic => in_cubic,
            Easing::OutCubic => out_cubic,
            Easing::InOutCubic => in_out_cubic,
            Easing::InQuart => in_quart,
            Easing::OutQuart => out_quart,
            Easing::InOutQuart => in_out_quart,
            Easing::InQuint => in_quint,
            Easing::OutQuint => out_quint,
            Easing::InOutQuint => in_out_quint,
            Easing::InExpo => in_expo,
            Easing::OutExpo => out_expo,
            Easing::InOutExpo => in_out_expo,
            Easing::InCirc => in_circ,
            Easing::OutCirc => out_circ,
            Easing::InOutCirc => in_out_circ,
            Easing::InBack => in_back,
            Easing::OutBack => out_back,
            Easing::InOutBack => in_out_back,
        }
    }

    /// Evaluates the easing between `a` and `b`.
    #[inline]
    pub fn apply(self, t: f32, a: f32, b: f32) -> f32 {
        crate::lerpf(a, b, (self.function())(t))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const ALL: &[Easing] = &[
        Easing::One,
        Easing::Keep,
        Easing::Step,
        Easing::Linear,
        Easing::Smoothstep,
        Easing::Smootherstep,
        Easing::InSine,
        Easing::OutSine,
        Easing::InOutSine,
        Easing::InQuad,
        Easing::OutQuad,
        Easing::InOutQuad,
        Easing::InCubic,
        Easing::OutCubic,
        Easing::InOutCubic,
        Easing::InQuart,
        Easing::OutQuart,
        Easing::InOutQuart,
        Easing::InQuint,
        Easing::OutQuint,
        Easing::InOutQuint,
        Easing::InExpo,
        Easing::OutExpo,
        Easing::InOutExpo,
        Easing::InCirc,
        Easing::OutCirc,
        Easing::InOutCirc,
        Easing::InBack,
        Easing::OutBack,
        Easing::InOutBack,
    ];

    #[test]
    fn endpoints() {
        // Every curve except the step-likes must hit 0 at t=0 and 1 at t=1.
        for easing in ALL {
            let f = easing.function();
            if !matches!(easing, Easing::One | Easing::Wave) {
                assert!((f(1.0) - 1.0).abs() < 1e-5, "{easing:?} at t=1");
            }
            if !matches!(easing, Easing::One | Easing::Step) {
                assert!(f(0.0).abs() < 1e-5, "{easing:?} at t=0");
            }
        }
    }

    #[test]
    fn step_semantics() {
        assert_eq!(step(0.0), 0.0);
        assert_eq!(step(0.001), 1.0);
        assert_eq!(keep(0.999), 0.0);
        assert_eq!(keep(1.0), 1.0);
        assert_eq!(one(0.0), 1.0);
    }

    #[test]
    fn back_overshoots() {
        let mut min = f32::MAX;
        for i in 0..=100 {
            min = min.min(in_back(i as f32 / 100.0));
        }
        assert!(min < -0.05);
    }

    #[test]
    fn apply_blends() {
        assert_eq!(Easing::Linear.apply(0.5, 10.0, 20.0), 15.0);
        assert_eq!(Easing::Keep.apply(0.5, 10.0, 20.0), 10.0);
    }
}
