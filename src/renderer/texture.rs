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

//! Engine-side texture objects.
//!
//! Managed textures keep a CPU pixel copy and survive device loss for free.
//! Render targets live on the device; on device loss their pixels are pulled
//! into a backup buffer, the device object is released, and on reset the
//! object is recreated at the same size and format and refilled from the
//! backup.

use crate::renderer::{
    device::{ColorMask, DeviceTexture, GraphicsDevice, TextureDesc, TextureFormat},
    material::Material,
};
use crate::core::{color::Color, log::Log, shared::Shared};

/// Shared handle to a texture, the form the rest of the engine passes
/// around.
pub type TextureHandle = Shared<Texture>;

/// See module docs.
pub struct Texture {
    desc: TextureDesc,
    // CPU store of managed textures; empty for render targets.
    pixels: Vec<u8>,
    // Render-target pixels parked during device loss.
    backup: Option<Vec<u8>>,
    device_id: Option<DeviceTexture>,
    locked: Option<Vec<u8>>,
}

impl Texture {
    /// Creates a managed texture. Returns `None` (with a log entry) when the
    /// device rejects it.
    pub fn create(
        device: &mut dyn GraphicsDevice,
        width: u32,
        height: u32,
        format: TextureFormat,
    ) -> Option<TextureHandle> {
        let desc = TextureDesc {
            width,
            height,
            format,
            render_target: false,
        };
        let pixels = vec![0u8; desc.byte_size()];
        let Some(device_id) = device.create_texture(&desc, Some(&pixels)) else {
            Log::err(format!("failed to create {width}x{height} texture"));
            return None;
        };
        Some(Shared::with_label(
            Self {
                desc,
                pixels,
                backup: None,
                device_id: Some(device_id),
                locked: None,
            },
            format!("texture {width}x{height}"),
        ))
    }

    /// Creates a render target.
    pub fn create_render_target(
        device: &mut dyn GraphicsDevice,
        width: u32,
        height: u32,
        format: TextureFormat,
    ) -> Option<TextureHandle> {
        let desc = TextureDesc {
            width,
            height,
            format,
            render_target: true,
        };
        let Some(device_id) = device.create_texture(&desc, None) else {
            Log::err(format!("failed to create {width}x{height} render target"));
            return None;
        };
        Some(Shared::with_label(
            Self {
                desc,
                pixels: Vec::new(),
                backup: None,
                device_id: Some(device_id),
                locked: None,
            },
            format!("render target {width}x{height}"),
        ))
    }

    #[inline]
    pub fn descriptor(&self) -> TextureDesc {
        self.desc
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.desc.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.desc.height
    }

    #[inline]
    pub fn format(&self) -> TextureFormat {
        self.desc.format
    }

    #[inline]
    pub fn is_render_target(&self) -> bool {
        self.desc.render_target
    }

    #[inline]
    pub fn device_id(&self) -> Option<DeviceTexture> {
        self.device_id
    }

    /// Releases the device object. The handle stays usable for queries but
    /// draws referencing it are skipped.
    pub fn destroy(&mut self, device: &mut dyn GraphicsDevice) {
        if let Some(id) = self.device_id.take() {
            device.destroy_texture(id);
        }
    }

    fn current_pixels(&self, device: &mut dyn GraphicsDevice) -> Vec<u8> {
        if self.desc.render_target {
            self.device_id
                .and_then(|id| device.read_texture(id))
                .unwrap_or_else(|| vec![0u8; self.desc.byte_size()])
        } else {
            self.pixels.clone()
        }
    }

    fn write_pixels(&mut self, device: &mut dyn GraphicsDevice, pixels: Vec<u8>) {
        if pixels.len() != self.desc.byte_size() {
            Log::err("texture write with mismatched pixel buffer size");
            return;
        }
        if let Some(id) = self.device_id {
            device.update_texture(id, &pixels);
        }
        if !self.desc.render_target {
            self.pixels = pixels;
        }
    }

    /// Fills the selected channels of every pixel with the given colour.
    pub fn fill(&mut self, device: &mut dyn GraphicsDevice, color: Color, channels: ColorMask) {
        let c = color.saturated();
        let rgba = [
            (c.r * 255.0) as u8,
            (c.g * 255.0) as u8,
            (c.b * 255.0) as u8,
            (c.a * 255.0) as u8,
        ];
        let layout = channel_layout(self.desc.format);
        let mut pixels = self.current_pixels(device);
        for pixel in pixels.chunks_exact_mut(4) {
            for (slot, &channel) in layout.iter().enumerate() {
                if channels.contains(channel_bit(channel)) {
                    pixel[slot] = rgba[channel];
                }
            }
        }
        self.write_pixels(device, pixels);
    }

    /// Begins raw pixel access. Returns false when the texture is already
    /// locked.
    pub fn lock(&mut self, device: &mut dyn GraphicsDevice) -> bool {
        if self.locked.is_some() {
            Log::err("texture is already locked");
            return false;
        }
        self.locked = Some(self.current_pixels(device));
        true
    }

    /// The raw pixel span of a locked texture.
    pub fn locked_pixels(&mut self) -> Option<&mut [u8]> {
        self.locked.as_deref_mut()
    }

    /// Ends raw pixel access, applying the edits.
    pub fn unlock(&mut self, device: &mut dyn GraphicsDevice) {
        if let Some(pixels) = self.locked.take() {
            self.write_pixels(device, pixels);
        }
    }

    /// Copies `src` into this texture at the given offset, clipped to both
    /// sizes. With a material, the material's diffuse colour modulates the
    /// copied pixels.
    pub fn blit(
        &mut self,
        device: &mut dyn GraphicsDevice,
        src: &Texture,
        dst_x: u32,
        dst_y: u32,
        material: Option<&Material>,
    ) {
        let src_pixels = src.current_pixels(device);
        let mut dst_pixels = self.current_pixels(device);
        let modulate = material.map(|m| m.diffuse.saturated());

        let src_layout = channel_layout(src.desc.format);
        let dst_layout = channel_layout(self.desc.format);

        let copy_w = src.desc.width.min(self.desc.width.saturating_sub(dst_x)) as usize;
        let copy_h = src.desc.height.min(self.desc.height.saturating_sub(dst_y)) as usize;

        for row in 0..copy_h {
            for col in 0..copy_w {
                let src_off = (row * src.desc.width as usize + col) * 4;
                let dst_off =
                    ((row + dst_y as usize) * self.desc.width as usize + col + dst_x as usize) * 4;
                // Normalise through RGBA channel order.
                let mut rgba = [0u8; 4];
                for (slot, &channel) in src_layout.iter().enumerate() {
                    rgba[channel] = src_pixels[src_off + slot];
                }
                if let Some(m) = &modulate {
                    rgba[0] = (rgba[0] as f32 * m.r) as u8;
                    rgba[1] = (rgba[1] as f32 * m.g) as u8;
                    rgba[2] = (rgba[2] as f32 * m.b) as u8;
                    rgba[3] = (rgba[3] as f32 * m.a) as u8;
                }
                for (slot, &channel) in dst_layout.iter().enumerate() {
                    dst_pixels[dst_off + slot] = rgba[channel];
                }
            }
        }
        self.write_pixels(device, dst_pixels);
    }

    /// Pixels in canonical RGBA order, whatever the storage format is.
    pub fn export_pixels(&self, device: &mut dyn GraphicsDevice) -> Vec<u8> {
        let mut pixels = self.current_pixels(device);
        if self.desc.format == TextureFormat::Bgra8 {
            for pixel in pixels.chunks_exact_mut(4) {
                pixel.swap(0, 2);
            }
        }
        pixels
    }

    /// Device-lost half of the recovery contract: render targets pull their
    /// pixels into the backup, everything releases its device object.
    pub fn on_device_lost(&mut self, device: &mut dyn GraphicsDevice) {
        if let Some(id) = self.device_id.take() {
            if self.desc.render_target {
                self.backup = device.read_texture(id);
            }
            device.destroy_texture(id);
        }
    }

    /// Device-reset half: recreate the device object at the same size and
    /// format and refill it from the backup (render targets) or the managed
    /// CPU copy.
    pub fn on_device_reset(&mut self, device: &mut dyn GraphicsDevice) {
        if self.device_id.is_some() {
            return;
        }
        let initial = if self.desc.render_target {
            self.backup.take()
        } else {
            Some(self.pixels.clone())
        };
        self.device_id = device.create_texture(&self.desc, initial.as_deref());
        if self.device_id.is_none() {
            Log::err("failed to restore texture after device reset");
        }
    }
}

// Maps storage slots to canonical RGBA channel numbers.
fn channel_layout(format: TextureFormat) -> [usize; 4] {
    match format {
        TextureFormat::Rgba8 => [0, 1, 2, 3],
        TextureFormat::Bgra8 => [2, 1, 0, 3],
    }
}

fn channel_bit(channel: usize) -> ColorMask {
    match channel {
        0 => ColorMask::R,
        1 => ColorMask::G,
        2 => ColorMask::B,
        _ => ColorMask::A,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::renderer::device::NullDevice;

    #[test]
    fn fill_respects_channel_mask() {
        let mut device = NullDevice::new();
        let texture = Texture::create(&mut device, 2, 1, TextureFormat::Rgba8).unwrap();
        let mut t = texture.lock();
        t.fill(&mut device, Color::new(1.0, 0.5, 0.0, 1.0), ColorMask::R | ColorMask::A);
        let pixels = t.export_pixels(&mut device);
        assert_eq!(&pixels[..4], &[255, 0, 0, 255]);
    }

    #[test]
    fn lock_unlock_round_trip() {
        let mut device = NullDevice::new();
        let texture = Texture::create(&mut device, 1, 1, TextureFormat::Rgba8).unwrap();
        let mut t = texture.lock();
        assert!(t.lock(&mut device));
        t.locked_pixels().unwrap().copy_from_slice(&[1, 2, 3, 4]);
        t.unlock(&mut device);
        assert_eq!(t.export_pixels(&mut device), vec![1, 2, 3, 4]);
    }

    #[test]
    fn export_normalises_bgra() {
        let mut device = NullDevice::new();
        let texture = Texture::create(&mut device, 1, 1, TextureFormat::Bgra8).unwrap();
        let mut t = texture.lock();
        assert!(t.lock(&mut device));
        t.locked_pixels().unwrap().copy_from_slice(&[10, 20, 30, 40]);
        t.unlock(&mut device);
        // Stored BGRA, exported RGBA.
        assert_eq!(t.export_pixels(&mut device), vec![30, 20, 10, 40]);
    }

    #[test]
    fn render_target_survives_device_loss() {
        let mut device = NullDevice::new();
        let texture = Texture::create_render_target(&mut device, 1, 1, TextureFormat::Rgba8)
            .unwrap();
        let mut t = texture.lock();
        assert!(t.lock(&mut device));
        t.locked_pixels().unwrap().copy_from_slice(&[9, 8, 7, 6]);
        t.unlock(&mut device);

        t.on_device_lost(&mut device);
        assert!(t.device_id().is_none());
        t.on_device_reset(&mut device);
        assert!(t.device_id().is_some());
        assert_eq!(t.export_pixels(&mut device), vec![9, 8, 7, 6]);
    }

    #[test]
    fn managed_texture_survives_device_loss() {
        let mut device = NullDevice::new();
        let texture = Texture::create(&mut device, 1, 1, TextureFormat::Rgba8).unwrap();
        let mut t = texture.lock();
        t.fill(&mut device, Color::WHITE, ColorMask::all());
        t.on_device_lost(&mut device);
        t.on_device_reset(&mut device);
        assert_eq!(t.export_pixels(&mut device), vec![255, 255, 255, 255]);
    }

    #[test]
    fn blit_copies_with_modulation() {
        let mut device = NullDevice::new();
        let src = Texture::create(&mut device, 1, 1, TextureFormat::Rgba8).unwrap();
        let dst = Texture::create(&mut device, 2, 1, TextureFormat::Rgba8).unwrap();
        src.lock()
            .fill(&mut device, Color::new(1.0, 1.0, 1.0, 1.0), ColorMask::all());

        let material = Material {
            diffuse: Color::new(0.5, 1.0, 1.0, 1.0),
            ..Default::default()
        };
        dst.lock()
            .blit(&mut device, &src.lock(), 1, 0, Some(&material));
        let pixels = dst.lock().export_pixels(&mut device);
        assert_eq!(&pixels[..4], &[0, 0, 0, 0], "untouched destination pixel");
        assert_eq!(&pixels[4..], &[127, 255, 255, 255]);
    }
}
