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

//! The draw list: accumulates primitive batches and fuses compatible
//! neighbours so the device sees as few submissions as possible.
//!
//! Two consecutive batches fuse when a single device state setup draws both:
//! compatible materials, equal primitive of a concatenable kind (`lines` or
//! `triangles`), matching stencil and colour-mask state, transform and
//! projection equal within a small tolerance, and the same indexing mode.

use crate::{
    renderer::{
        device::{ColorMask, GraphicsDevice, StencilSettings},
        material::{Material, COMPAT_COLOR_TOLERANCE},
        shader::{names, ShaderValue},
    },
    scene::mesh::{Mesh, Primitive, Vertex},
};
use crate::core::{
    algebra::{Matrix4, Vector2},
    log::Log,
    sstorage::ImmutableString,
};
use crate::math::m4x4_approx_eq_eps;

/// Transform/projection tolerance of batch fusion.
pub const MATRIX_TOLERANCE: f32 = 0.01;

/// One run of primitives drawn with a single device setup.
#[derive(Clone)]
pub struct DrawListItem {
    pub material: Material,
    pub projection: Matrix4<f32>,
    pub transform: Matrix4<f32>,
    pub primitive: Primitive,
    pub stencil: Option<StencilSettings>,
    pub color_mask: ColorMask,

    pub vertex_start: usize,
    pub vertex_count: usize,
    pub index_start: usize,
    pub index_count: usize,
    pub with_index: bool,
}

// The mutable draw state applied to batches as they are added.
#[derive(Clone)]
struct PendingState {
    material: Material,
    projection: Matrix4<f32>,
    transform: Matrix4<f32>,
    primitive: Primitive,
    stencil: Option<StencilSettings>,
    color_mask: ColorMask,
}

impl Default for PendingState {
    fn default() -> Self {
        Self {
            material: Material::default(),
            projection: Matrix4::identity(),
            transform: Matrix4::identity(),
            primitive: Primitive::Triangles,
            stencil: None,
            color_mask: ColorMask::all(),
        }
    }
}

/// See module docs.
#[derive(Default)]
pub struct DrawList {
    items: Vec<DrawListItem>,
    vertices: Vec<Vertex>,
    indices: Vec<u32>,
    next: PendingState,
    open: Option<DrawListItem>,
}

impl DrawList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops every item and resets the draw state to defaults.
    pub fn clear(&mut self) {
        self.items.clear();
        self.vertices.clear();
        self.indices.clear();
        self.next = PendingState::default();
        self.open = None;
    }

    /// Amount of closed items. Call [`Self::end_list`] first for a final
    /// count.
    pub fn len(&self) -> usize {
        self.items.len() + usize::from(self.open.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn items(&self) -> impl Iterator<Item = &DrawListItem> {
        self.items.iter().chain(self.open.iter())
    }

    // State setters; the values persist until `clear`.

    pub fn set_material(&mut self, material: Material) {
        self.next.material = material;
    }

    pub fn set_transform(&mut self, transform: Matrix4<f32>) {
        self.next.transform = transform;
    }

    pub fn set_projection(&mut self, projection: Matrix4<f32>) {
        self.next.projection = projection;
    }

    pub fn set_primitive(&mut self, primitive: Primitive) {
        self.next.primitive = primitive;
    }

    pub fn set_stencil(&mut self, stencil: Option<StencilSettings>) {
        self.next.stencil = stencil;
    }

    pub fn set_color_mask(&mut self, mask: ColorMask) {
        self.next.color_mask = mask;
    }

    fn fresh_item(&self, with_index: bool) -> DrawListItem {
        DrawListItem {
            material: self.next.material.clone(),
            projection: self.next.projection,
            transform: self.next.transform,
            primitive: self.next.primitive,
            stencil: self.next.stencil,
            color_mask: self.next.color_mask,
            vertex_start: self.vertices.len(),
            vertex_count: 0,
            index_start: self.indices.len(),
            index_count: 0,
            with_index,
        }
    }

    // Whether the open item can absorb a batch drawn with the pending state.
    fn can_fuse(&self, with_index: bool) -> bool {
        let Some(open) = &self.open else {
            return false;
        };
        // A callback forces its own submission.
        if self.next.material.callback.is_some() {
            return false;
        }
        // Only list topologies concatenate; strips and fans would weld.
        if !self.next.primitive.is_concatenable() {
            return false;
        }
        if open.primitive != self.next.primitive {
            return false;
        }
        // An indexed run never merges with a non-indexed one.
        if open.with_index != with_index {
            return false;
        }
        if open.stencil != self.next.stencil {
            return false;
        }
        if open.color_mask != self.next.color_mask {
            return false;
        }
        if !Material::is_compatible(&open.material, &self.next.material, COMPAT_COLOR_TOLERANCE) {
            return false;
        }
        m4x4_approx_eq_eps(&open.transform, &self.next.transform, MATRIX_TOLERANCE)
            && m4x4_approx_eq_eps(&open.projection, &self.next.projection, MATRIX_TOLERANCE)
    }

    fn close_open(&mut self) {
        if let Some(item) = self.open.take() {
            self.items.push(item);
        }
    }

    fn reopen_unless_fusable(&mut self, with_index: bool) {
        if !self.can_fuse(with_index) {
            self.close_open();
            self.open = Some(self.fresh_item(with_index));
        }
    }

    /// Adds a non-indexed batch: either extends the open item or starts a
    /// new one.
    pub fn add_vertices(&mut self, vertices: &[Vertex]) {
        if vertices.is_empty() {
            return;
        }
        self.reopen_unless_fusable(false);
        if let Some(item) = self.open.as_mut() {
            item.vertex_count += vertices.len();
        }
        self.vertices.extend_from_slice(vertices);
    }

    /// Adds an indexed batch. Indices are relative to `vertices` and are
    /// rebased by the accumulated vertex count.
    pub fn add_vertices_indexed(&mut self, vertices: &[Vertex], indices: &[u32]) {
        if vertices.is_empty() || indices.is_empty() {
            return;
        }
        let base = self.vertices.len() as u32;
        self.reopen_unless_fusable(true);
        if let Some(item) = self.open.as_mut() {
            item.vertex_count += vertices.len();
            item.index_count += indices.len();
        }
        self.vertices.extend_from_slice(vertices);
        self.indices.extend(indices.iter().map(|&i| i + base));
    }

    /// Adds one submesh of a mesh. The submesh's own material (when present)
    /// replaces the pending material for this batch and the ones after it.
    pub fn add_mesh(&mut self, mesh: &Mesh, submesh_index: usize) {
        let Some(submesh) = mesh.submeshes().get(submesh_index) else {
            Log::err(format!("no submesh {submesh_index}"));
            return;
        };
        if let Some(material) = &submesh.material {
            self.next.material = material.clone();
        }
        self.next.primitive = submesh.primitive;

        if mesh.indices().is_empty() {
            let range = mesh
                .vertices()
                .get(submesh.start..submesh.start + submesh.count)
                .unwrap_or_default();
            self.add_vertices(range);
        } else {
            let Some(index_range) = mesh
                .indices()
                .get(submesh.start..submesh.start + submesh.count)
            else {
                Log::err("submesh index range out of bounds");
                return;
            };
            // Lift out just the vertex span the indices touch.
            let min = index_range.iter().copied().min().unwrap_or(0) as usize;
            let max = index_range.iter().copied().max().unwrap_or(0) as usize;
            let Some(vertex_span) = mesh.vertices().get(min..=max) else {
                Log::err("submesh indices point past the vertex array");
                return;
            };
            let rebased: Vec<u32> = index_range.iter().map(|&i| i - min as u32).collect();
            self.add_vertices_indexed(vertex_span, &rebased);
        }
    }

    /// Closes the item under accumulation; further adds start a new one.
    pub fn end_list(&mut self) {
        self.close_open();
    }

    /// Submits the list in insertion order: one state setup plus one
    /// primitive call per item.
    pub fn draw(&mut self, device: &mut dyn GraphicsDevice) {
        self.close_open();
        for item in &self.items {
            bind_item_state(device, item);

            if let Some(callback) = &item.material.callback {
                callback.on_draw(&item.material);
            }

            let vertices =
                &self.vertices[item.vertex_start..item.vertex_start + item.vertex_count];
            if item.with_index {
                let indices: Vec<u32> = self.indices
                    [item.index_start..item.index_start + item.index_count]
                    .iter()
                    .map(|&i| i - item.vertex_start as u32)
                    .collect();
                device.draw_indexed(item.primitive, vertices, &indices);
            } else {
                device.draw_vertices(item.primitive, vertices);
            }
        }
    }
}

fn bind_item_state(device: &mut dyn GraphicsDevice, item: &DrawListItem) {
    let material = &item.material;

    device.set_projection(&item.projection);
    device.set_view(&item.transform);
    device.set_blend(material.blend);
    device.set_filter(material.filter);
    device.set_wrap(material.wrap);
    device.set_color_mask(item.color_mask);
    device.set_stencil(item.stencil);

    let texture_id = material.texture.as_ref().and_then(|t| t.lock().device_id());
    device.bind_texture(texture_id);

    if let Some(shader) = &material.shader {
        let shader = shader.lock();
        device.bind_shader(shader.device_id());

        device.set_shader_param(
            &ImmutableString::new(names::PROJECTION),
            &ShaderValue::Matrix(Box::new(item.projection)),
        );
        device.set_shader_param(
            &ImmutableString::new(names::VIEW),
            &ShaderValue::Matrix(Box::new(item.transform)),
        );
        device.set_shader_param(
            &ImmutableString::new(names::DIFFUSE),
            &ShaderValue::Color(material.diffuse),
        );
        device.set_shader_param(
            &ImmutableString::new(names::SPECULAR),
            &ShaderValue::Color(material.specular),
        );
        device.set_shader_param(
            &ImmutableString::new(names::MAIN_TEXTURE),
            &ShaderValue::Texture(texture_id),
        );
        if let Some(texture) = &material.texture {
            let t = texture.lock();
            device.set_shader_param(
                &ImmutableString::new(names::MAIN_TEXTURE_SIZE),
                &ShaderValue::Vector2(Vector2::new(t.width() as f32, t.height() as f32)),
            );
        }
        for (name, value) in shader.params() {
            device.set_shader_param(name, value);
        }
    } else {
        device.bind_shader(None);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::renderer::device::{Blend, NullDevice};
    use crate::scene::mesh::shapes;
    use crate::core::color::Color32;

    fn triangle() -> [Vertex; 3] {
        [Vertex::default(); 3]
    }

    #[test]
    fn compatible_triangle_batches_fuse() {
        let mut list = DrawList::new();
        list.set_primitive(Primitive::Triangles);
        list.add_vertices(&triangle());
        list.add_vertices(&triangle());
        list.end_list();
        assert_eq!(list.len(), 1);

        let mut device = NullDevice::new();
        list.draw(&mut device);
        assert_eq!(device.draws.len(), 1);
        assert_eq!(device.draws[0].vertex_count, 6);
    }

    #[test]
    fn strips_never_fuse() {
        let mut list = DrawList::new();
        list.set_primitive(Primitive::TriangleStrip);
        list.add_vertices(&[Vertex::default(); 4]);
        list.add_vertices(&[Vertex::default(); 4]);
        list.end_list();
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn material_change_splits_batches() {
        let mut list = DrawList::new();
        list.set_primitive(Primitive::Triangles);
        list.add_vertices(&triangle());
        list.set_material(Material {
            blend: Blend::Add,
            ..Default::default()
        });
        list.add_vertices(&triangle());
        list.end_list();
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn transform_within_tolerance_fuses() {
        let mut list = DrawList::new();
        list.set_primitive(Primitive::Triangles);
        list.add_vertices(&triangle());
        let mut nudged = Matrix4::identity();
        nudged[(0, 3)] = 0.001;
        list.set_transform(nudged);
        list.add_vertices(&triangle());
        list.end_list();
        assert_eq!(list.len(), 1);

        // Past the tolerance the batch splits.
        let mut moved = Matrix4::identity();
        moved[(0, 3)] = 5.0;
        list.set_transform(moved);
        list.add_vertices(&triangle());
        list.end_list();
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn indexed_and_plain_never_fuse() {
        let mut list = DrawList::new();
        list.set_primitive(Primitive::Triangles);
        list.add_vertices(&triangle());
        list.add_vertices_indexed(&triangle(), &[0, 1, 2]);
        list.end_list();
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn indices_are_rebased_on_fusion() {
        let mut list = DrawList::new();
        list.set_primitive(Primitive::Triangles);
        list.add_vertices_indexed(&triangle(), &[0, 1, 2]);
        list.add_vertices_indexed(&triangle(), &[0, 1, 2]);
        list.end_list();
        assert_eq!(list.len(), 1);

        let mut device = NullDevice::new();
        list.draw(&mut device);
        assert_eq!(device.draws.len(), 1);
        assert_eq!(device.draws[0].vertex_count, 6);
        assert_eq!(device.draws[0].index_count, 6);
    }

    #[test]
    fn stencil_change_splits_batches() {
        let mut list = DrawList::new();
        list.set_primitive(Primitive::Lines);
        list.add_vertices(&[Vertex::default(); 2]);
        list.set_stencil(Some(StencilSettings::default()));
        list.add_vertices(&[Vertex::default(); 2]);
        list.end_list();
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn hundred_quads_one_submission() {
        let mut mesh = Mesh::new();
        for i in 0..100 {
            let x = i as f32;
            shapes::make_quad(
                &mut mesh,
                Vector2::new(x, 0.0),
                Vector2::new(x + 1.0, 1.0),
                Vector2::new(0.0, 0.0),
                Vector2::new(1.0, 1.0),
                Color32::WHITE,
            );
        }

        let mut list = DrawList::new();
        for i in 0..100 {
            list.add_mesh(&mesh, i);
        }
        list.end_list();
        assert_eq!(list.len(), 1);

        let mut device = NullDevice::new();
        list.draw(&mut device);
        assert_eq!(device.draws.len(), 1);
        assert_eq!(device.draws[0].index_count, 600);
        assert_eq!(device.draws[0].vertex_count, 400);
    }

    #[test]
    fn clear_resets_state() {
        let mut list = DrawList::new();
        list.set_primitive(Primitive::Lines);
        list.add_vertices(&[Vertex::default(); 2]);
        list.clear();
        assert!(list.is_empty());
    }
}
