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

//! Shader objects and their named parameter sets.
//!
//! A handful of parameters are auto-filled by the renderer every draw:
//! projection, view, elapsed time, the bound main texture and its size, and
//! the lazily captured screen texture. Everything else is user data attached
//! to the shader.

use crate::renderer::device::{DeviceShader, DeviceTexture, GraphicsDevice};
use crate::core::{
    algebra::{Matrix4, Vector2, Vector4},
    color::Color,
    log::Log,
    shared::Shared,
    sstorage::ImmutableString,
};
use fxhash::FxHashMap;

/// Shared handle to a shader.
pub type ShaderHandle = Shared<Shader>;

/// Auto-parameter names. Parameter lookup is by interned name, so these are
/// plain constants rather than an enum.
pub mod names {
    pub const PROJECTION: &str = "proj";
    pub const VIEW: &str = "view";
    pub const TIME_SECONDS: &str = "time_sec";
    pub const MAIN_TEXTURE: &str = "main_tex";
    pub const MAIN_TEXTURE_SIZE: &str = "main_tex_size";
    pub const SCREEN_TEXTURE: &str = "screen_tex";
    pub const SCREEN_TEXTURE_SIZE: &str = "screen_tex_size";
    pub const DIFFUSE: &str = "diffuse";
    pub const SPECULAR: &str = "specular";
}

/// A shader parameter value.
#[derive(Clone, Debug, PartialEq)]
pub enum ShaderValue {
    Int(i32),
    Float(f32),
    Vector2(Vector2<f32>),
    Vector4(Vector4<f32>),
    Matrix(Box<Matrix4<f32>>),
    Color(Color),
    Texture(Option<DeviceTexture>),
}

/// See module docs.
pub struct Shader {
    source: String,
    device_id: Option<DeviceShader>,
    params: FxHashMap<ImmutableString, ShaderValue>,
    uses_screen_texture: bool,
}

impl Shader {
    /// Compiles the shader from source text. A failed compile yields `None`
    /// and a log entry with the device's verdict.
    pub fn from_source(device: &mut dyn GraphicsDevice, source: &str) -> Option<ShaderHandle> {
        let Some(device_id) = device.create_shader(source) else {
            Log::err("shader compilation failed");
            return None;
        };
        Some(Shared::with_label(
            Self {
                uses_screen_texture: source.contains(names::SCREEN_TEXTURE),
                source: source.to_owned(),
                device_id: Some(device_id),
                params: Default::default(),
            },
            "shader",
        ))
    }

    #[inline]
    pub fn source(&self) -> &str {
        &self.source
    }

    #[inline]
    pub fn device_id(&self) -> Option<DeviceShader> {
        self.device_id
    }

    /// True when the source references the screen texture, which makes the
    /// renderer capture the current target before the pass.
    #[inline]
    pub fn uses_screen_texture(&self) -> bool {
        self.uses_screen_texture
    }

    pub fn set_param<S: AsRef<str>>(&mut self, name: S, value: ShaderValue) {
        self.params.insert(ImmutableString::new(name), value);
    }

    pub fn param<S: AsRef<str>>(&self, name: S) -> Option<&ShaderValue> {
        self.params.get(&ImmutableString::new(name))
    }

    pub fn params(&self) -> impl Iterator<Item = (&ImmutableString, &ShaderValue)> {
        self.params.iter()
    }

    pub fn destroy(&mut self, device: &mut dyn GraphicsDevice) {
        if let Some(id) = self.device_id.take() {
            device.destroy_shader(id);
        }
    }

    /// Shaders are rebuilt from source after a device reset; no backup is
    /// needed.
    pub fn on_device_lost(&mut self, device: &mut dyn GraphicsDevice) {
        if let Some(id) = self.device_id.take() {
            device.destroy_shader(id);
        }
    }

    pub fn on_device_reset(&mut self, device: &mut dyn GraphicsDevice) {
        if self.device_id.is_none() {
            self.device_id = device.create_shader(&self.source);
            if self.device_id.is_none() {
                Log::err("failed to recompile shader after device reset");
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::renderer::device::NullDevice;

    #[test]
    fn screen_texture_detection() {
        let mut device = NullDevice::new();
        let plain = Shader::from_source(&mut device, "void main() { diffuse; }").unwrap();
        assert!(!plain.lock().uses_screen_texture());

        let screen =
            Shader::from_source(&mut device, "void main() { sample(screen_tex); }").unwrap();
        assert!(screen.lock().uses_screen_texture());
    }

    #[test]
    fn user_params() {
        let mut device = NullDevice::new();
        let shader = Shader::from_source(&mut device, "void main() {}").unwrap();
        let mut s = shader.lock();
        s.set_param("wave_amp", ShaderValue::Float(0.25));
        assert_eq!(s.param("wave_amp"), Some(&ShaderValue::Float(0.25)));
        assert!(s.param("missing").is_none());
    }

    #[test]
    fn device_loss_recompiles_from_source() {
        let mut device = NullDevice::new();
        let shader = Shader::from_source(&mut device, "void main() {}").unwrap();
        let mut s = shader.lock();
        s.on_device_lost(&mut device);
        assert!(s.device_id().is_none());
        s.on_device_reset(&mut device);
        assert!(s.device_id().is_some());
    }
}
