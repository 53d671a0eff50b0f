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

//! Mesh data: the shared vertex layout, append-only vertex/index arrays,
//! submesh records and the lazily cached bounding boxes.

use crate::renderer::material::Material;
use bytemuck::{Pod, Zeroable};
use crate::core::{
    algebra::{Vector2, Vector3},
    color::Color32,
};
use crate::math::aabb::AxisAlignedBoundingBox;
use std::cell::RefCell;

/// The one vertex layout of the engine, shared by every mesh and the device
/// contract. Field order is the wire order; little-endian.
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct Vertex {
    pub position: [f32; 3],
    pub diffuse: Color32,
    pub specular: Color32,
    pub uv0: [f32; 2],
    pub uv1: [f32; 2],
}

impl Vertex {
    pub fn at(position: Vector3<f32>) -> Self {
        Self {
            position: position.into(),
            diffuse: Color32::WHITE,
            specular: Color32::BLACK,
            uv0: [0.0, 0.0],
            uv1: [0.0, 0.0],
        }
    }

    pub fn with_uv0(mut self, uv: Vector2<f32>) -> Self {
        self.uv0 = uv.into();
        self
    }

    pub fn with_diffuse(mut self, diffuse: Color32) -> Self {
        self.diffuse = diffuse;
        self
    }
}

/// Primitive topology of a submesh or draw-list item.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Primitive {
    Points,
    Lines,
    LineStrip,
    Triangles,
    TriangleStrip,
    TriangleFan,
}

impl Primitive {
    /// Only list topologies can be concatenated back to back; strips and
    /// fans carry implicit connectivity that joining would corrupt.
    #[inline]
    pub fn is_concatenable(self) -> bool {
        matches!(self, Primitive::Lines | Primitive::Triangles)
    }
}

/// A contiguous run of the vertex (or index) array drawn with one material.
#[derive(Clone, Debug)]
pub struct SubMesh {
    pub start: usize,
    pub count: usize,
    pub primitive: Primitive,
    pub material: Option<Material>,
}

#[derive(Default)]
struct AabbCache {
    // (start, count) -> box of that vertex range; whole mesh uses (0, len).
    entries: Vec<(usize, usize, AxisAlignedBoundingBox)>,
}

/// See module docs.
#[derive(Default)]
pub struct Mesh {
    vertices: Vec<Vertex>,
    indices: Vec<u32>,
    submeshes: Vec<SubMesh>,
    aabb_cache: RefCell<AabbCache>,
}

impl Mesh {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    #[inline]
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    #[inline]
    pub fn submeshes(&self) -> &[SubMesh] {
        &self.submeshes
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn clear(&mut self) {
        self.vertices.clear();
        self.indices.clear();
        self.submeshes.clear();
        self.invalidate_bounds();
    }

    pub fn append_vertices(&mut self, vertices: &[Vertex]) {
        self.vertices.extend_from_slice(vertices);
        self.invalidate_bounds();
    }

    pub fn append_indices(&mut self, indices: &[u32]) {
        self.indices.extend_from_slice(indices);
    }

    pub fn add_submesh(&mut self, submesh: SubMesh) {
        self.submeshes.push(submesh);
    }

    /// Bulk positional write over a contiguous vertex range.
    pub fn set_positions(&mut self, start: usize, positions: &[Vector3<f32>]) {
        for (i, p) in positions.iter().enumerate() {
            if let Some(v) = self.vertices.get_mut(start + i) {
                v.position = (*p).into();
            }
        }
        self.invalidate_bounds();
    }

    pub fn set_position(&mut self, index: usize, position: Vector3<f32>) {
        if let Some(v) = self.vertices.get_mut(index) {
            v.position = position.into();
            self.invalidate_bounds();
        }
    }

    pub fn set_diffuse(&mut self, index: usize, color: Color32) {
        if let Some(v) = self.vertices.get_mut(index) {
            v.diffuse = color;
        }
    }

    pub fn set_specular(&mut self, index: usize, color: Color32) {
        if let Some(v) = self.vertices.get_mut(index) {
            v.specular = color;
        }
    }

    pub fn set_uv0(&mut self, index: usize, uv: Vector2<f32>) {
        if let Some(v) = self.vertices.get_mut(index) {
            v.uv0 = uv.into();
        }
    }

    pub fn set_uv1(&mut self, index: usize, uv: Vector2<f32>) {
        if let Some(v) = self.vertices.get_mut(index) {
            v.uv1 = uv.into();
        }
    }

    fn invalidate_bounds(&mut self) {
        self.aabb_cache.borrow_mut().entries.clear();
    }

    /// Bounding box of the whole vertex array. Lazily computed and cached
    /// until the next vertex write.
    pub fn aabb(&self) -> AxisAlignedBoundingBox {
        self.aabb_of_range(0, self.vertices.len())
    }

    /// Bounding box of a contiguous vertex range.
    pub fn aabb_of_range(&self, start: usize, count: usize) -> AxisAlignedBoundingBox {
        {
            let cache = self.aabb_cache.borrow();
            if let Some((_, _, aabb)) = cache
                .entries
                .iter()
                .find(|(s, c, _)| *s == start && *c == count)
            {
                return *aabb;
            }
        }
        let mut aabb = AxisAlignedBoundingBox::default();
        for v in self.vertices.iter().skip(start).take(count) {
            aabb.add_point(Vector3::new(v.position[0], v.position[1], v.position[2]));
        }
        self.aabb_cache
            .borrow_mut()
            .entries
            .push((start, count, aabb));
        aabb
    }
}

/// Shape construction helpers used by simple drawables and tests.
pub mod shapes {
    use super::*;

    /// Axis-aligned rectangle as a four-vertex triangle strip, the classic
    /// sprite shape.
    pub fn make_rect(
        mesh: &mut Mesh,
        p0: Vector2<f32>,
        p1: Vector2<f32>,
        uv0: Vector2<f32>,
        uv1: Vector2<f32>,
        color: Color32,
    ) {
        let start = mesh.vertex_count();
        mesh.append_vertices(&[
            Vertex::at(Vector3::new(p0.x, p1.y, 0.0))
                .with_uv0(Vector2::new(uv0.x, uv1.y))
                .with_diffuse(color),
            Vertex::at(Vector3::new(p1.x, p1.y, 0.0))
                .with_uv0(Vector2::new(uv1.x, uv1.y))
                .with_diffuse(color),
            Vertex::at(Vector3::new(p0.x, p0.y, 0.0))
                .with_uv0(Vector2::new(uv0.x, uv0.y))
                .with_diffuse(color),
            Vertex::at(Vector3::new(p1.x, p0.y, 0.0))
                .with_uv0(Vector2::new(uv1.x, uv0.y))
                .with_diffuse(color),
        ]);
        mesh.add_submesh(SubMesh {
            start,
            count: 4,
            primitive: Primitive::TriangleStrip,
            material: None,
        });
    }

    /// Axis-aligned rectangle as two indexed triangles. Unlike
    /// [`make_rect`], the result can be fused with other quads in the
    /// draw list.
    pub fn make_quad(
        mesh: &mut Mesh,
        p0: Vector2<f32>,
        p1: Vector2<f32>,
        uv0: Vector2<f32>,
        uv1: Vector2<f32>,
        color: Color32,
    ) {
        let base = mesh.vertex_count() as u32;
        let index_start = mesh.indices().len();
        mesh.append_vertices(&[
            Vertex::at(Vector3::new(p0.x, p0.y, 0.0))
                .with_uv0(Vector2::new(uv0.x, uv0.y))
                .with_diffuse(color),
            Vertex::at(Vector3::new(p1.x, p0.y, 0.0))
                .with_uv0(Vector2::new(uv1.x, uv0.y))
                .with_diffuse(color),
            Vertex::at(Vector3::new(p1.x, p1.y, 0.0))
                .with_uv0(Vector2::new(uv1.x, uv1.y))
                .with_diffuse(color),
            Vertex::at(Vector3::new(p0.x, p1.y, 0.0))
                .with_uv0(Vector2::new(uv0.x, uv1.y))
                .with_diffuse(color),
        ]);
        mesh.append_indices(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        mesh.add_submesh(SubMesh {
            start: index_start,
            count: 6,
            primitive: Primitive::Triangles,
            material: None,
        });
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn aabb_is_cached_and_invalidated() {
        let mut mesh = Mesh::new();
        mesh.append_vertices(&[
            Vertex::at(Vector3::new(-1.0, 0.0, 0.0)),
            Vertex::at(Vector3::new(2.0, 3.0, 0.0)),
        ]);
        let aabb = mesh.aabb();
        assert_eq!(aabb.min, Vector3::new(-1.0, 0.0, 0.0));
        assert_eq!(aabb.max, Vector3::new(2.0, 3.0, 0.0));

        mesh.set_position(0, Vector3::new(-5.0, 0.0, 0.0));
        assert_eq!(mesh.aabb().min.x, -5.0);
    }

    #[test]
    fn aabb_of_subrange() {
        let mut mesh = Mesh::new();
        mesh.append_vertices(&[
            Vertex::at(Vector3::new(0.0, 0.0, 0.0)),
            Vertex::at(Vector3::new(10.0, 0.0, 0.0)),
            Vertex::at(Vector3::new(20.0, 0.0, 0.0)),
        ]);
        let aabb = mesh.aabb_of_range(1, 2);
        assert_eq!(aabb.min.x, 10.0);
        assert_eq!(aabb.max.x, 20.0);
    }

    #[test]
    fn quad_indices() {
        let mut mesh = Mesh::new();
        shapes::make_quad(
            &mut mesh,
            Vector2::new(0.0, 0.0),
            Vector2::new(1.0, 1.0),
            Vector2::new(0.0, 0.0),
            Vector2::new(1.0, 1.0),
            Color32::WHITE,
        );
        shapes::make_quad(
            &mut mesh,
            Vector2::new(2.0, 0.0),
            Vector2::new(3.0, 1.0),
            Vector2::new(0.0, 0.0),
            Vector2::new(1.0, 1.0),
            Color32::WHITE,
        );
        assert_eq!(mesh.vertex_count(), 8);
        assert_eq!(mesh.indices().len(), 12);
        // The second quad's indices are rebased past the first one's
        // vertices.
        assert_eq!(&mesh.indices()[6..], &[4, 5, 6, 4, 6, 7]);
        assert_eq!(mesh.submeshes().len(), 2);
    }

    #[test]
    fn vertex_layout_size() {
        // position(12) + diffuse(4) + specular(4) + uv0(8) + uv1(8)
        assert_eq!(std::mem::size_of::<Vertex>(), 36);
    }
}
