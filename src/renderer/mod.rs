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

//! The render-command layer: resource creation and bookkeeping, the render
//! build (walking the node tree in render order and collecting draw
//! commands), and the flush to the device.
//!
//! Render ordering: nodes are grouped into units keyed by their
//! tree-combined layer and priority and stably sorted, so equal keys keep
//! tree order. An atomic subtree forms one unit and is never interleaved
//! with outside nodes; within it only the local rules apply. A node with
//! `render_after_children` emits its own drawing after its children's.

pub mod device;
pub mod draw_list;
pub mod material;
pub mod shader;
pub mod texture;

use crate::{
    renderer::{
        device::{GraphicsDevice, TextureFormat},
        draw_list::DrawList,
        shader::{names, Shader, ShaderHandle, ShaderValue},
        texture::{Texture, TextureHandle},
    },
    scene::{
        graph::Graph,
        node::{LocalRenderOrder, Node, RenderContext},
    },
};
use crate::core::{
    algebra::Vector2,
    pool::Handle,
    shared::WeakShared,
    sstorage::ImmutableString,
};
use crate::math::aabb::AxisAlignedBoundingBox;

/// See module docs.
pub struct Renderer {
    pub draw_list: DrawList,

    // Weak registry used to run device-lost recovery over every live
    // resource without extending lifetimes.
    textures: Vec<WeakShared<Texture>>,
    shaders: Vec<WeakShared<Shader>>,

    screen_cache: Option<TextureHandle>,
    frame_size: (u32, u32),
    view_bounds: Option<AxisAlignedBoundingBox>,
}

impl Renderer {
    pub fn new(frame_size: (u32, u32)) -> Self {
        Self {
            draw_list: DrawList::new(),
            textures: Vec::new(),
            shaders: Vec::new(),
            screen_cache: None,
            frame_size,
            view_bounds: None,
        }
    }

    #[inline]
    pub fn frame_size(&self) -> (u32, u32) {
        self.frame_size
    }

    /// Updates the backbuffer size, e.g. after a window resize. The screen
    /// texture cache is recreated on the next use.
    pub fn set_frame_size(&mut self, size: (u32, u32)) {
        self.frame_size = size;
    }

    /// World-space view volume used by per-node view culling; `None`
    /// disables culling entirely.
    pub fn set_view_bounds(&mut self, bounds: Option<AxisAlignedBoundingBox>) {
        self.view_bounds = bounds;
    }

    pub fn create_texture(
        &mut self,
        device: &mut dyn GraphicsDevice,
        width: u32,
        height: u32,
        format: TextureFormat,
    ) -> Option<TextureHandle> {
        let texture = Texture::create(device, width, height, format)?;
        self.textures.push(texture.downgrade());
        Some(texture)
    }

    pub fn create_render_target(
        &mut self,
        device: &mut dyn GraphicsDevice,
        width: u32,
        height: u32,
        format: TextureFormat,
    ) -> Option<TextureHandle> {
        let texture = Texture::create_render_target(device, width, height, format)?;
        self.textures.push(texture.downgrade());
        Some(texture)
    }

    pub fn create_shader(
        &mut self,
        device: &mut dyn GraphicsDevice,
        source: &str,
    ) -> Option<ShaderHandle> {
        let shader = Shader::from_source(device, source)?;
        self.shaders.push(shader.downgrade());
        Some(shader)
    }

    /// Device-lost notification: every live resource backs itself up and
    /// releases its device object. The screen cache is simply dropped.
    pub fn on_device_lost(&mut self, device: &mut dyn GraphicsDevice) {
        self.screen_cache = None;
        self.textures.retain(|weak| match weak.upgrade() {
            Some(texture) => {
                texture.lock().on_device_lost(device);
                true
            }
            None => false,
        });
        self.shaders.retain(|weak| match weak.upgrade() {
            Some(shader) => {
                shader.lock().on_device_lost(device);
                true
            }
            None => false,
        });
    }

    /// Device-reset notification: recreate device objects from backups and
    /// source text.
    pub fn on_device_reset(&mut self, device: &mut dyn GraphicsDevice) {
        self.textures.retain(|weak| match weak.upgrade() {
            Some(texture) => {
                texture.lock().on_device_reset(device);
                true
            }
            None => false,
        });
        self.shaders.retain(|weak| match weak.upgrade() {
            Some(shader) => {
                shader.lock().on_device_reset(device);
                true
            }
            None => false,
        });
    }

    fn renderable(graph: &Graph, handle: Handle<Node>) -> bool {
        graph
            .try_get(handle)
            .is_some_and(|n| !n.is_invalid() && n.in_tree && n.tree.visible)
    }

    fn ordered_children(graph: &Graph, handle: Handle<Node>) -> Vec<Handle<Node>> {
        let node = &graph[handle];
        let mut children: Vec<Handle<Node>> = node
            .children()
            .iter()
            .copied()
            .filter(|&c| Self::renderable(graph, c))
            .collect();
        if node.render_attributes.local_render_order == LocalRenderOrder::Default {
            // Stable: equal keys keep tree order.
            children.sort_by_key(|&c| (graph[c].tree.layer, graph[c].tree.priority));
        }
        children
    }

    // Emits a fully ordered subtree: the contiguous block of an atomic node.
    fn collect_block(graph: &Graph, handle: Handle<Node>, out: &mut Vec<Handle<Node>>) {
        if !Self::renderable(graph, handle) {
            return;
        }
        let after = graph[handle].render_attributes.render_after_children;
        if !after {
            out.push(handle);
        }
        for child in Self::ordered_children(graph, handle) {
            Self::collect_block(graph, child, out);
        }
        if after {
            out.push(handle);
        }
    }

    fn gather_units(
        graph: &Graph,
        handle: Handle<Node>,
        units: &mut Vec<(i32, i32, Vec<Handle<Node>>)>,
    ) {
        if !Self::renderable(graph, handle) {
            return;
        }
        let node = &graph[handle];
        let key = (node.tree.layer, node.tree.priority);

        // An atomic ancestor wins over everything inside it: the whole
        // subtree becomes one unit and local flags only reorder within.
        if node.render_attributes.atomic_subtree {
            let mut block = Vec::new();
            Self::collect_block(graph, handle, &mut block);
            units.push((key.0, key.1, block));
            return;
        }

        let after = node.render_attributes.render_after_children;
        if !after {
            units.push((key.0, key.1, vec![handle]));
        }
        for child in Self::ordered_children(graph, handle) {
            Self::gather_units(graph, child, units);
        }
        if after {
            units.push((key.0, key.1, vec![handle]));
        }
    }

    /// The full render order of the graph. Public mostly for tests and
    /// debug overlays.
    pub fn build_render_order(graph: &mut Graph) -> Vec<Handle<Node>> {
        graph.update_hierarchical_data();
        let mut units = Vec::new();
        Self::gather_units(graph, graph.root(), &mut units);
        units.sort_by_key(|&(layer, priority, _)| (layer, priority));
        units.into_iter().flat_map(|(_, _, block)| block).collect()
    }

    /// Render-build phase: fires the will-render hooks, then walks the
    /// ordered nodes letting each behavior emit draw commands. In-frame
    /// mutations after this point only affect the next frame.
    pub fn build(&mut self, graph: &mut Graph, time_seconds: f32) {
        let order = Self::build_render_order(graph);
        graph.tick_will_render(&order, 0.0);

        for &handle in &order {
            let Some(mut behavior) = graph
                .try_get_mut(handle)
                .and_then(|n| n.behavior.take())
            else {
                continue;
            };

            let culled = {
                let node = &graph[handle];
                match (node.render_attributes.view_culling, self.view_bounds) {
                    (true, Some(view)) => behavior
                        .render_bounds(node)
                        .is_some_and(|bounds| !bounds.intersects_aabb(&view)),
                    _ => false,
                }
            };

            if !culled {
                let mut ctx = RenderContext {
                    graph,
                    handle,
                    draw_list: &mut self.draw_list,
                    view_bounds: self.view_bounds,
                    time_seconds,
                };
                behavior.on_render(&mut ctx);
            }

            if let Some(node) = graph.try_get_mut(handle) {
                if node.behavior.is_none() {
                    node.behavior = Some(behavior);
                }
            }
        }
    }

    /// Render-flush phase: captures the screen texture when some item's
    /// shader asks for it, submits the draw list, and clears it.
    pub fn flush(&mut self, device: &mut dyn GraphicsDevice, time_seconds: f32) {
        self.prepare_screen_texture(device);

        // The elapsed-time auto parameter.
        let time_name = ImmutableString::new(names::TIME_SECONDS);
        device.set_shader_param(&time_name, &ShaderValue::Float(time_seconds));

        self.draw_list.draw(device);
        self.draw_list.clear();
    }

    // The screen-texture contract: when a queued shader references the
    // screen texture, the current render target is copied into a
    // size-matching cache right before the pass. The cache is recreated on
    // any size mismatch and never aliases the active target.
    fn prepare_screen_texture(&mut self, device: &mut dyn GraphicsDevice) {
        let shaders_wanting_screen: Vec<ShaderHandle> = self
            .draw_list
            .items()
            .filter_map(|item| item.material.shader.clone())
            .filter(|shader| shader.lock().uses_screen_texture())
            .collect();
        if shaders_wanting_screen.is_empty() {
            return;
        }

        let (width, height) = self.frame_size;
        let stale = self
            .screen_cache
            .as_ref()
            .map(|cache| {
                let cache = cache.lock();
                cache.width() != width || cache.height() != height
            })
            .unwrap_or(true);
        if stale {
            self.screen_cache = Texture::create(device, width, height, TextureFormat::Rgba8);
        }

        let Some(cache) = &self.screen_cache else {
            return;
        };
        let cache_id = cache.lock().device_id();
        if let Some(id) = cache_id {
            device.copy_render_target(id);
        }

        let size = ShaderValue::Vector2(Vector2::new(width as f32, height as f32));
        for shader in shaders_wanting_screen {
            let mut shader = shader.lock();
            shader.set_param(names::SCREEN_TEXTURE, ShaderValue::Texture(cache_id));
            shader.set_param(names::SCREEN_TEXTURE_SIZE, size.clone());
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::scene::node::{NodeBuilder, RenderAttributes};

    fn named(graph: &mut Graph, parent: Handle<Node>, name: &str) -> Handle<Node> {
        let node = NodeBuilder::new().with_name(name).build();
        graph.add_node_to(parent, node)
    }

    fn order_names(graph: &mut Graph) -> Vec<String> {
        Renderer::build_render_order(graph)
            .into_iter()
            .filter(|&h| h != graph.root())
            .map(|h| graph[h].name().to_owned())
            .collect()
    }

    #[test]
    fn tree_order_by_default() {
        let mut graph = Graph::new();
        let root = graph.root();
        let a = named(&mut graph, root, "a");
        named(&mut graph, a, "a1");
        named(&mut graph, root, "b");
        assert_eq!(order_names(&mut graph), vec!["a", "a1", "b"]);
    }

    #[test]
    fn layers_reorder_across_the_tree() {
        let mut graph = Graph::new();
        let root = graph.root();
        let a = named(&mut graph, root, "back");
        graph[a].render_attributes_mut().layer = 2;
        let b = named(&mut graph, root, "front");
        graph[b].render_attributes_mut().layer = 1;
        assert_eq!(order_names(&mut graph), vec!["front", "back"]);
    }

    #[test]
    fn atomic_subtree_stays_contiguous() {
        let mut graph = Graph::new();
        let root = graph.root();
        let block = named(&mut graph, root, "block");
        graph[block].render_attributes_mut().atomic_subtree = true;
        // A child with an extreme layer would normally sort far away.
        let inner = named(&mut graph, block, "inner");
        graph[inner].render_attributes_mut().layer = 100;
        let other = named(&mut graph, root, "other");
        graph[other].render_attributes_mut().layer = 50;

        assert_eq!(order_names(&mut graph), vec!["block", "inner", "other"]);
    }

    #[test]
    fn render_after_children_flips_order() {
        let mut graph = Graph::new();
        let root = graph.root();
        let parent = named(&mut graph, root, "parent");
        graph[parent].render_attributes_mut().render_after_children = true;
        named(&mut graph, parent, "child");
        assert_eq!(order_names(&mut graph), vec!["child", "parent"]);
    }

    #[test]
    fn invisible_subtrees_are_skipped() {
        let mut graph = Graph::new();
        let root = graph.root();
        let hidden = named(&mut graph, root, "hidden");
        graph[hidden].insert_flags(crate::scene::node::NodeFlags::INVISIBLE);
        named(&mut graph, hidden, "inside");
        named(&mut graph, root, "shown");
        assert_eq!(order_names(&mut graph), vec!["shown"]);
    }

    #[test]
    fn device_loss_cycle_restores_registered_resources() {
        use crate::renderer::device::{NullDevice, TextureFormat};

        let mut device = NullDevice::new();
        let mut renderer = Renderer::new((64, 64));
        let texture = renderer
            .create_texture(&mut device, 4, 4, TextureFormat::Rgba8)
            .unwrap();
        let shader = renderer
            .create_shader(&mut device, "void main() {}")
            .unwrap();

        renderer.on_device_lost(&mut device);
        assert!(texture.lock().device_id().is_none());
        assert!(shader.lock().device_id().is_none());

        renderer.on_device_reset(&mut device);
        assert!(texture.lock().device_id().is_some());
        assert!(shader.lock().device_id().is_some());
    }

    #[test]
    fn priority_breaks_ties_within_layer() {
        let mut graph = Graph::new();
        let root = graph.root();
        let a = named(&mut graph, root, "late");
        graph[a].render_attributes_mut().priority = 5;
        let b = named(&mut graph, root, "early");
        graph[b].render_attributes_mut().priority = 1;
        assert_eq!(order_names(&mut graph), vec!["early", "late"]);
    }
}
