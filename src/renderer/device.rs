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

//! The abstract graphics device. The engine core is backend-agnostic: a real
//! backend (GL, D3D, a software rasteriser) implements [`GraphicsDevice`],
//! and the bundled [`NullDevice`] records the command stream for tests and
//! headless runs.

use crate::{
    renderer::shader::ShaderValue,
    scene::mesh::{Primitive, Vertex},
};
use bitflags::bitflags;
use crate::core::{algebra::Matrix4, color::Color, sstorage::ImmutableString};
use fxhash::FxHashMap;

/// Backend handle of a texture.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct DeviceTexture(pub u64);

/// Backend handle of a compiled shader.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct DeviceShader(pub u64);

/// Pixel format of a texture.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    #[default]
    Rgba8,
    Bgra8,
}

impl TextureFormat {
    #[inline]
    pub fn bytes_per_pixel(self) -> usize {
        4
    }
}

/// Creation descriptor of a texture.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TextureDesc {
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub render_target: bool,
}

impl TextureDesc {
    #[inline]
    pub fn byte_size(&self) -> usize {
        self.width as usize * self.height as usize * self.format.bytes_per_pixel()
    }
}

/// Fixed-function blend modes.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum Blend {
    #[default]
    Alpha,
    Add,
    Sub,
    Mul,
    Screen,
    Max,
}

/// Texture sampling filter.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum Filter {
    #[default]
    Nearest,
    Linear,
}

/// Stencil comparison function.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum StencilFunc {
    Never,
    Less,
    Equal,
    LessEqual,
    Greater,
    NotEqual,
    GreaterEqual,
    #[default]
    Always,
}

/// Stencil write operation.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum StencilOp {
    Keep,
    Zero,
    #[default]
    Replace,
    Increment,
    Decrement,
    Invert,
}

/// Full stencil state of a draw.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct StencilSettings {
    pub func: StencilFunc,
    pub op: StencilOp,
    pub reference: i32,
}

bitflags! {
    /// Colour channel write mask.
    #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
    pub struct ColorMask: u8 {
        const R = 0b0001;
        const G = 0b0010;
        const B = 0b0100;
        const A = 0b1000;
    }
}

impl Default for ColorMask {
    fn default() -> Self {
        ColorMask::all()
    }
}

/// The device contract the engine renders through. See module docs.
pub trait GraphicsDevice {
    fn create_texture(
        &mut self,
        desc: &TextureDesc,
        pixels: Option<&[u8]>,
    ) -> Option<DeviceTexture>;
    fn destroy_texture(&mut self, texture: DeviceTexture);
    fn update_texture(&mut self, texture: DeviceTexture, pixels: &[u8]) -> bool;
    fn read_texture(&mut self, texture: DeviceTexture) -> Option<Vec<u8>>;

    fn create_shader(&mut self, source: &str) -> Option<DeviceShader>;
    fn destroy_shader(&mut self, shader: DeviceShader);

    /// `None` pushes the backbuffer.
    fn push_render_target(&mut self, target: Option<DeviceTexture>);
    fn pop_render_target(&mut self);
    /// Copies the current render target into `dst`, which must match its
    /// size.
    fn copy_render_target(&mut self, dst: DeviceTexture) -> bool;

    fn set_viewport(&mut self, x: i32, y: i32, width: u32, height: u32);
    fn set_projection(&mut self, matrix: &Matrix4<f32>);
    fn set_view(&mut self, matrix: &Matrix4<f32>);
    fn set_blend(&mut self, blend: Blend);
    fn set_filter(&mut self, filter: Filter);
    fn set_wrap(&mut self, wrap: bool);
    fn set_color_mask(&mut self, mask: ColorMask);
    fn set_stencil(&mut self, stencil: Option<StencilSettings>);

    fn bind_texture(&mut self, texture: Option<DeviceTexture>);
    fn bind_shader(&mut self, shader: Option<DeviceShader>);
    fn set_shader_param(&mut self, name: &ImmutableString, value: &ShaderValue);

    fn clear(&mut self, color: Option<Color>, depth: bool, stencil: bool);

    fn draw_vertices(&mut self, primitive: Primitive, vertices: &[Vertex]);
    fn draw_indexed(&mut self, primitive: Primitive, vertices: &[Vertex], indices: &[u32]);

    fn begin_scene(&mut self);
    fn end_scene(&mut self);
    fn present(&mut self);
}

/// One recorded primitive submission of the [`NullDevice`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordedDraw {
    pub primitive: Primitive,
    pub vertex_count: usize,
    pub index_count: usize,
}

/// A headless device that stores textures in memory and records draw calls.
/// It backs the test suite and lets the engine run without any backend.
#[derive(Default)]
pub struct NullDevice {
    next_id: u64,
    textures: FxHashMap<u64, (TextureDesc, Vec<u8>)>,
    shaders: FxHashMap<u64, String>,
    target_stack: Vec<Option<DeviceTexture>>,

    /// Every primitive submission since the last [`Self::reset_stats`].
    pub draws: Vec<RecordedDraw>,
    pub present_count: u32,
    pub clear_count: u32,
    pub state_changes: u32,
}

impl NullDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset_stats(&mut self) {
        self.draws.clear();
        self.present_count = 0;
        self.clear_count = 0;
        self.state_changes = 0;
    }

    fn alloc(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

impl GraphicsDevice for NullDevice {
    fn create_texture(
        &mut self,
        desc: &TextureDesc,
        pixels: Option<&[u8]>,
    ) -> Option<DeviceTexture> {
        let mut data = vec![0u8; desc.byte_size()];
        if let Some(pixels) = pixels {
            let n = pixels.len().min(data.len());
            data[..n].copy_from_slice(&pixels[..n]);
        }
        let id = self.alloc();
        self.textures.insert(id, (*desc, data));
        Some(DeviceTexture(id))
    }

    fn destroy_texture(&mut self, texture: DeviceTexture) {
        self.textures.remove(&texture.0);
    }

    fn update_texture(&mut self, texture: DeviceTexture, pixels: &[u8]) -> bool {
        match self.textures.get_mut(&texture.0) {
            Some((desc, data)) if pixels.len() == desc.byte_size() => {
                data.copy_from_slice(pixels);
                true
            }
            _ => false,
        }
    }

    fn read_texture(&mut self, texture: DeviceTexture) -> Option<Vec<u8>> {
        self.textures.get(&texture.0).map(|(_, data)| data.clone())
    }

    fn create_shader(&mut self, source: &str) -> Option<DeviceShader> {
        // The null backend accepts everything except an empty program.
        if source.trim().is_empty() {
            return None;
        }
        let id = self.alloc();
        self.shaders.insert(id, source.to_owned());
        Some(DeviceShader(id))
    }

    fn destroy_shader(&mut self, shader: DeviceShader) {
        self.shaders.remove(&shader.0);
    }

    fn push_render_target(&mut self, target: Option<DeviceTexture>) {
        self.target_stack.push(target);
    }

    fn pop_render_target(&mut self) {
        self.target_stack.pop();
    }

    fn copy_render_target(&mut self, dst: DeviceTexture) -> bool {
        let source = self.target_stack.last().copied().flatten();
        match source {
            Some(src) => {
                let Some(pixels) = self.read_texture(src) else {
                    return false;
                };
                self.update_texture(dst, &pixels)
            }
            // Backbuffer contents are not modelled; the copy yields black.
            None => match self.textures.get_mut(&dst.0) {
                Some((_, data)) => {
                    data.fill(0);
                    true
                }
                None => false,
            },
        }
    }

    fn set_viewport(&mut self, _x: i32, _y: i32, _width: u32, _height: u32) {
        self.state_changes += 1;
    }

    fn set_projection(&mut self, _matrix: &Matrix4<f32>) {
        self.state_changes += 1;
    }

    fn set_view(&mut self, _matrix: &Matrix4<f32>) {
        self.state_changes += 1;
    }

    fn set_blend(&mut self, _blend: Blend) {
        self.state_changes += 1;
    }

    fn set_filter(&mut self, _filter: Filter) {
        self.state_changes += 1;
    }

    fn set_wrap(&mut self, _wrap: bool) {
        self.state_changes += 1;
    }

    fn set_color_mask(&mut self, _mask: ColorMask) {
        self.state_changes += 1;
    }

    fn set_stencil(&mut self, _stencil: Option<StencilSettings>) {
        self.state_changes += 1;
    }

    fn bind_texture(&mut self, _texture: Option<DeviceTexture>) {
        self.state_changes += 1;
    }

    fn bind_shader(&mut self, _shader: Option<DeviceShader>) {
        self.state_changes += 1;
    }

    fn set_shader_param(&mut self, _name: &ImmutableString, _value: &ShaderValue) {
        self.state_changes += 1;
    }

    fn clear(&mut self, _color: Option<Color>, _depth: bool, _stencil: bool) {
        self.clear_count += 1;
    }

    fn draw_vertices(&mut self, primitive: Primitive, vertices: &[Vertex]) {
        self.draws.push(RecordedDraw {
            primitive,
            vertex_count: vertices.len(),
            index_count: 0,
        });
    }

    fn draw_indexed(&mut self, primitive: Primitive, vertices: &[Vertex], indices: &[u32]) {
        self.draws.push(RecordedDraw {
            primitive,
            vertex_count: vertices.len(),
            index_count: indices.len(),
        });
    }

    fn begin_scene(&mut self) {}

    fn end_scene(&mut self) {}

    fn present(&mut self) {
        self.present_count += 1;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn null_device_texture_round_trip() {
        let mut device = NullDevice::new();
        let desc = TextureDesc {
            width: 2,
            height: 2,
            format: TextureFormat::Rgba8,
            render_target: false,
        };
        let pixels: Vec<u8> = (0..16).collect();
        let id = device.create_texture(&desc, Some(&pixels)).unwrap();
        assert_eq!(device.read_texture(id), Some(pixels.clone()));

        let new_pixels: Vec<u8> = (16..32).collect();
        assert!(device.update_texture(id, &new_pixels));
        assert_eq!(device.read_texture(id), Some(new_pixels));

        device.destroy_texture(id);
        assert!(device.read_texture(id).is_none());
    }

    #[test]
    fn null_device_records_draws() {
        let mut device = NullDevice::new();
        device.draw_vertices(Primitive::Triangles, &[Vertex::default(); 3]);
        device.draw_indexed(Primitive::Lines, &[Vertex::default(); 2], &[0, 1]);
        assert_eq!(device.draws.len(), 2);
        assert_eq!(device.draws[1].index_count, 2);
    }

    #[test]
    fn empty_shader_fails_compilation() {
        let mut device = NullDevice::new();
        assert!(device.create_shader("  ").is_none());
        assert!(device.create_shader("void main() {}").is_some());
    }
}
