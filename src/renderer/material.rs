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

//! Materials: the state bundle of a draw.

use crate::renderer::{
    device::{Blend, Filter},
    shader::ShaderHandle,
    texture::TextureHandle,
};
use crate::core::color::Color;
use std::sync::Arc;

/// Colour tolerance of material compatibility: diffuse and specular may
/// differ by a level of an 8-bit channel without breaking a batch.
pub const COMPAT_COLOR_TOLERANCE: f32 = 4.0 / 255.0;

/// Hook invoked around draws that use the material. A material carrying a
/// callback is never fused with anything.
pub trait MaterialCallback: Send + Sync {
    fn on_draw(&self, material: &Material);
}

/// See module docs.
#[derive(Clone, Default)]
pub struct Material {
    pub texture: Option<TextureHandle>,
    pub shader: Option<ShaderHandle>,
    pub blend: Blend,
    pub filter: Filter,
    pub wrap: bool,
    pub diffuse: Color,
    pub specular: Color,
    pub callback: Option<Arc<dyn MaterialCallback>>,
}

impl std::fmt::Debug for Material {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Material")
            .field("texture", &self.texture)
            .field("shader", &self.shader.is_some())
            .field("blend", &self.blend)
            .field("filter", &self.filter)
            .field("wrap", &self.wrap)
            .field("diffuse", &self.diffuse)
            .field("specular", &self.specular)
            .field("callback", &self.callback.is_some())
            .finish()
    }
}

impl Material {
    /// Two materials are compatible when a single device state setup can
    /// draw both: same texture and shader objects, same fixed state, colours
    /// within tolerance, and neither carries a callback.
    pub fn is_compatible(a: &Material, b: &Material, color_tolerance: f32) -> bool {
        if a.callback.is_some() || b.callback.is_some() {
            return false;
        }
        let same_texture = match (&a.texture, &b.texture) {
            (Some(x), Some(y)) => x.ptr_eq(y),
            (None, None) => true,
            _ => false,
        };
        let same_shader = match (&a.shader, &b.shader) {
            (Some(x), Some(y)) => x.ptr_eq(y),
            (None, None) => true,
            _ => false,
        };
        same_texture
            && same_shader
            && a.blend == b.blend
            && a.filter == b.filter
            && a.wrap == b.wrap
            && a.diffuse.approx_eq(b.diffuse, color_tolerance)
            && a.specular.approx_eq(b.specular, color_tolerance)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    struct Noop;
    impl MaterialCallback for Noop {
        fn on_draw(&self, _material: &Material) {}
    }

    #[test]
    fn default_materials_are_compatible() {
        let a = Material::default();
        let b = Material::default();
        assert!(Material::is_compatible(&a, &b, COMPAT_COLOR_TOLERANCE));
    }

    #[test]
    fn blend_breaks_compatibility() {
        let a = Material::default();
        let b = Material {
            blend: Blend::Add,
            ..Default::default()
        };
        assert!(!Material::is_compatible(&a, &b, COMPAT_COLOR_TOLERANCE));
    }

    #[test]
    fn colour_within_tolerance_is_compatible() {
        let a = Material::default();
        let mut b = Material::default();
        b.diffuse = Color::new(1.0 - 3.0 / 255.0, 1.0, 1.0, 1.0);
        assert!(Material::is_compatible(&a, &b, COMPAT_COLOR_TOLERANCE));
        b.diffuse = Color::new(0.5, 1.0, 1.0, 1.0);
        assert!(!Material::is_compatible(&a, &b, COMPAT_COLOR_TOLERANCE));
    }

    #[test]
    fn callback_disables_fusion() {
        let a = Material {
            callback: Some(Arc::new(Noop)),
            ..Default::default()
        };
        let b = Material::default();
        assert!(!Material::is_compatible(&a, &b, COMPAT_COLOR_TOLERANCE));
        assert!(!Material::is_compatible(&a, &a.clone(), COMPAT_COLOR_TOLERANCE));
    }
}
