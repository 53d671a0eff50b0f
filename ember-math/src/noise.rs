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

//! Improved Perlin noise, tileable independently along each axis.
//!
//! The classic reference permutation table is used, so the field is
//! deterministic across runs and platforms.

// Ken Perlin's reference permutation.
const PERM: [u8; 256] = [
    151, 160, 137, 91, 90, 15, 131, 13, 201, 95, 96, 53, 194, 233, 7, 225, 140, 36, 103, 30, 69,
    142, 8, 99, 37, 240, 21, 10, 23, 190, 6, 148, 247, 120, 234, 75, 0, 26, 197, 62, 94, 252, 219,
    203, 117, 35, 11, 32, 57, 177, 33, 88, 237, 149, 56, 87, 174, 20, 125, 136, 171, 168, 68, 175,
    74, 165, 71, 134, 139, 48, 27, 166, 77, 146, 158, 231, 83, 111, 229, 122, 60, 211, 133, 230,
    220, 105, 92, 41, 55, 46, 245, 40, 244, 102, 143, 54, 65, 25, 63, 161, 1, 216, 80, 73, 209,
    76, 132, 187, 208, 89, 18, 169, 200, 196, 135, 130, 116, 188, 159, 86, 164, 100, 109, 198,
    173, 186, 3, 64, 52, 217, 226, 250, 124, 123, 5, 202, 38, 147, 118, 126, 255, 82, 85, 212,
    207, 206, 59, 227, 47, 16, 58, 17, 182, 189, 28, 42, 223, 183, 170, 213, 119, 248, 152, 2, 44,
    154, 163, 70, 221, 153, 101, 155, 167, 43, 172, 9, 129, 22, 39, 253, 19, 98, 108, 110, 79,
    113, 224, 232, 178, 185, 112, 104, 218, 246, 97, 228, 251, 34, 242, 193, 238, 210, 144, 12,
    191, 179, 162, 241, 81, 51, 145, 235, 249, 14, 239, 107, 49, 192, 214, 31, 181, 199, 106, 157,
    184, 84, 204, 176, 115, 121, 50, 45, 127, 4, 150, 254, 138, 236, 205, 93, 222, 114, 67, 29,
    24, 72, 243, 141, 128, 195, 78, 66, 215, 61, 156, 180,
];

#[inline]
fn perm(i: i32) -> i32 {
    PERM[(i & 255) as usize] as i32
}

#[inline]
fn fade(t: f32) -> f32 {
    t * t * t * (t * (t * 6.0 - 15.0) + 10.0)
}

#[inline]
fn grad(hash: i32, x: f32, y: f32, z: f32) -> f32 {
    let h = hash & 15;
    let u = if h < 8 { x } else { y };
    let v = if h < 4 {
        y
    } else if h == 12 || h == 14 {
        x
    } else {
        z
    };
    (if h & 1 == 0 { u } else { -u }) + (if h & 2 == 0 { v } else { -v })
}

#[inline]
fn wrap_cell(cell: i32, period: i32) -> i32 {
    if period > 0 {
        cell.rem_euclid(period)
    } else {
        cell
    }
}

/// Perlin noise at `(x, y, z)`, tiled with the given period along each axis.
/// A zero (or negative) period disables tiling for that axis. The result is
/// in `[-1, 1]`.
pub fn perlin(x: f32, y: f32, z: f32, period_x: i32, period_y: i32, period_z: i32) -> f32 {
    let xi = x.floor() as i32;
    let yi = y.floor() as i32;
    let zi = z.floor() as i32;

    let xf = x - x.floor();
    let yf = y - y.floor();
    let zf = z - z.floor();

    let u = fade(xf);
    let v = fade(yf);
    let w = fade(zf);

    // Lattice corner hash with per-axis wrap, so the field repeats exactly at
    // the period boundary.
    let hash = |dx: i32, dy: i32, dz: i32| {
        let cx = wrap_cell(xi + dx, period_x);
        let cy = wrap_cell(yi + dy, period_y);
        let cz = wrap_cell(zi + dz, period_z);
        perm(perm(perm(cx) + cy) + cz)
    };

    let lerp = crate::lerpf;

    let x0 = lerp(
        grad(hash(0, 0, 0), xf, yf, zf),
        grad(hash(1, 0, 0), xf - 1.0, yf, zf),
        u,
    );
    let x1 = lerp(
        grad(hash(0, 1, 0), xf, yf - 1.0, zf),
        grad(hash(1, 1, 0), xf - 1.0, yf - 1.0, zf),
        u,
    );
    let x2 = lerp(
        grad(hash(0, 0, 1), xf, yf, zf - 1.0),
        grad(hash(1, 0, 1), xf - 1.0, yf, zf - 1.0),
        u,
    );
    let x3 = lerp(
        grad(hash(0, 1, 1), xf, yf - 1.0, zf - 1.0),
        grad(hash(1, 1, 1), xf - 1.0, yf - 1.0, zf - 1.0),
        u,
    );

    let y0 = lerp(x0, x1, v);
    let y1 = lerp(x2, x3, v);

    lerp(y0, y1, w).clamp(-1.0, 1.0)
}

/// Same field as [`perlin`] remapped into `[0, 1]`.
#[inline]
pub fn perlin01(x: f32, y: f32, z: f32, period_x: i32, period_y: i32, period_z: i32) -> f32 {
    perlin(x, y, z, period_x, period_y, period_z) * 0.5 + 0.5
}
