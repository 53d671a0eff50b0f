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

//! Scene node: the entity of the engine.
//!
//! A node is a bag of inheritable state (transform, colour, flags, tags,
//! render attributes), an optional behavior that receives the per-phase
//! hooks, and an action slot pair. Nodes own their children; the parent link
//! is a plain handle that the graph keeps consistent.

use crate::{
    renderer::draw_list::DrawList,
    scene::{
        action::{Action, ActionSlots},
        graph::Graph,
        signal::Signal,
        transform::Transform,
    },
};
use bitflags::bitflags;
use crate::core::{
    algebra::Matrix4,
    color::Color,
    pool::Handle,
    sstorage::ImmutableString,
    uuid::Uuid,
};
use crate::math::aabb::AxisAlignedBoundingBox;
use fxhash::FxHashSet;

/// Unique id of a node, never reused within a process run, unlike pool
/// handles whose indices are recycled.
#[derive(Clone, Copy, Eq, Hash, Ord, PartialEq, PartialOrd, Debug)]
#[repr(transparent)]
pub struct NodeId(pub Uuid);

impl NodeId {
    pub(crate) fn new_unique() -> Self {
        Self(Uuid::new_v4())
    }
}

bitflags! {
    /// Per-node state bits. `MARK_REMOVED` and `INVALID` are set by the
    /// engine and never clear.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
    pub struct NodeFlags: u16 {
        /// Excluded from rendering (subtree included, via inheritance).
        const INVISIBLE    = 0b0000_0001;
        /// Excluded from the gameplay tick.
        const NOT_UPDATED  = 0b0000_0010;
        /// Disabled entirely: no tick, no render hooks.
        const NOT_ENABLED  = 0b0000_0100;
        /// Ticked by the system pass, which runs even under debug pause.
        const SYSTEM       = 0b0000_1000;
        /// Scheduled for deferred destruction.
        const MARK_REMOVED = 0b0100_0000;
        /// Destroyed or about to be; skipped by every pass.
        const INVALID      = 0b1000_0000;
    }
}

/// How the children of a node are ordered during the render build.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum LocalRenderOrder {
    /// Children sorted by their tree layer/priority.
    #[default]
    Default,
    /// Children drawn in tree (insertion) order, priorities ignored.
    Tree,
}

/// Sentinel layer/priority meaning "inherit whatever the tree says".
pub const RENDER_VALUE_DEFAULT: i32 = 0;

/// Render-ordering attributes of a node.
#[derive(Clone, Debug)]
pub struct RenderAttributes {
    /// Coarse ordering bucket; [`RENDER_VALUE_DEFAULT`] inherits the tree value.
    pub layer: i32,
    /// Ordering within a layer; [`RENDER_VALUE_DEFAULT`] inherits the tree value.
    pub priority: i32,
    /// Render this node's subtree as one contiguous block.
    pub atomic_subtree: bool,
    /// Emit this node's own drawing after its children.
    pub render_after_children: bool,
    /// Skip the node when its render bounds fall outside the view.
    pub view_culling: bool,
    /// Ordering rule for direct children.
    pub local_render_order: LocalRenderOrder,
}

impl Default for RenderAttributes {
    fn default() -> Self {
        Self {
            layer: RENDER_VALUE_DEFAULT,
            priority: RENDER_VALUE_DEFAULT,
            atomic_subtree: false,
            render_after_children: false,
            view_culling: false,
            local_render_order: LocalRenderOrder::Default,
        }
    }
}

/// Environment handed to every behavior and action hook.
pub struct BehaviorContext<'a> {
    pub graph: &'a mut Graph,
    /// Handle of the node the hook runs for.
    pub handle: Handle<Node>,
    /// Seconds since the previous gameplay tick.
    pub dt: f32,
    /// Scheduler frame counter.
    pub frame: u64,
}

/// Environment of the render-build hook.
pub struct RenderContext<'a> {
    pub graph: &'a Graph,
    pub handle: Handle<Node>,
    pub draw_list: &'a mut DrawList,
    /// World-space view volume for culling, when the host supplied one.
    pub view_bounds: Option<AxisAlignedBoundingBox>,
    /// Seconds since engine start.
    pub time_seconds: f32,
}

/// The per-kind hook set of a node. Every hook is optional; a plain pivot
/// node has no behavior at all.
#[allow(unused_variables)]
pub trait NodeBehavior: 'static {
    /// The node was attached to a live tree.
    fn on_ready(&mut self, ctx: &mut BehaviorContext) {}

    /// First gameplay tick after attach.
    fn on_start(&mut self, ctx: &mut BehaviorContext) {}

    /// Gameplay tick.
    fn on_step(&mut self, ctx: &mut BehaviorContext) {}

    /// Second gameplay sub-pass, after every node has stepped.
    fn on_late_step(&mut self, ctx: &mut BehaviorContext) {}

    /// System tick; runs even under debug pause.
    fn on_system_step(&mut self, ctx: &mut BehaviorContext) {}

    /// A signal arrived. Return `true` to consume it, which stops
    /// parent-chain broadcasts.
    fn on_signal(&mut self, ctx: &mut BehaviorContext, signal: &Signal) -> bool {
        false
    }

    /// Called right before the render build visits the node.
    fn on_will_render(&mut self, ctx: &mut BehaviorContext) {}

    /// Emit draw commands for the node.
    fn on_render(&mut self, ctx: &mut RenderContext) {}

    /// The node was marked for removal.
    fn on_removed(&mut self, ctx: &mut BehaviorContext) {}

    /// World-space bounds used by view culling; `None` disables culling for
    /// the node regardless of its flag.
    fn render_bounds(&self, node: &Node) -> Option<AxisAlignedBoundingBox> {
        None
    }
}

// Derived state cached per node and recomputed lazily down the tree.
#[derive(Clone, Debug)]
pub(crate) struct TreeState {
    pub world_matrix: Matrix4<f32>,
    pub color: Color,
    pub specular: Color,
    pub visible: bool,
    pub enabled: bool,
    pub updated: bool,
    pub layer: i32,
    pub priority: i32,
    pub inherited_tags: FxHashSet<ImmutableString>,
}

impl Default for TreeState {
    fn default() -> Self {
        Self {
            world_matrix: Matrix4::identity(),
            color: Color::WHITE,
            specular: Color::WHITE,
            visible: true,
            enabled: true,
            updated: true,
            layer: RENDER_VALUE_DEFAULT,
            priority: RENDER_VALUE_DEFAULT,
            inherited_tags: Default::default(),
        }
    }
}

/// See module docs.
pub struct Node {
    id: NodeId,
    name: String,

    pub(crate) parent: Handle<Node>,
    pub(crate) children: Vec<Handle<Node>>,

    local_transform: Transform,
    pub(crate) inherit_transform: bool,

    color: Color,
    specular: Color,
    pub(crate) inherit_color: bool,
    pub(crate) inherit_specular: bool,

    flags: NodeFlags,

    tags: FxHashSet<ImmutableString>,
    pub(crate) tags_inheritable: bool,

    pub render_attributes: RenderAttributes,

    pub(crate) behavior: Option<Box<dyn NodeBehavior>>,
    pub(crate) actions: ActionSlots,

    // Lifecycle bookkeeping.
    pub(crate) in_tree: bool,
    pub(crate) ready_fired: bool,
    pub(crate) start_fired: bool,

    // Derived state; valid only while `hierarchy_dirty` is false.
    pub(crate) tree: TreeState,
    pub(crate) hierarchy_dirty: bool,
}

impl Default for Node {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("parent", &self.parent)
            .field("children", &self.children)
            .field("flags", &self.flags)
            .finish()
    }
}

impl Node {
    /// Creates a detached node. Attach it with [`Graph::add_node`] or
    /// [`Graph::link_nodes`].
    pub fn new() -> Self {
        Self {
            id: NodeId::new_unique(),
            name: String::new(),
            parent: Handle::NONE,
            children: Vec::new(),
            local_transform: Transform::identity(),
            inherit_transform: true,
            color: Color::WHITE,
            specular: Color::WHITE,
            inherit_color: true,
            inherit_specular: true,
            flags: NodeFlags::empty(),
            tags: Default::default(),
            tags_inheritable: false,
            render_attributes: Default::default(),
            behavior: None,
            actions: Default::default(),
            in_tree: false,
            ready_fired: false,
            start_fired: false,
            tree: Default::default(),
            hierarchy_dirty: true,
        }
    }

    #[inline]
    pub fn id(&self) -> NodeId {
        self.id
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn set_name<S: Into<String>>(&mut self, name: S) {
        self.name = name.into();
    }

    #[inline]
    pub fn parent(&self) -> Handle<Node> {
        self.parent
    }

    #[inline]
    pub fn children(&self) -> &[Handle<Node>] {
        &self.children
    }

    #[inline]
    pub fn local_transform(&self) -> &Transform {
        &self.local_transform
    }

    /// Mutable access to the local transform. Derived state of the subtree
    /// is re-evaluated lazily on the next read.
    #[inline]
    pub fn local_transform_mut(&mut self) -> &mut Transform {
        self.hierarchy_dirty = true;
        &mut self.local_transform
    }

    #[inline]
    pub fn inherit_transform(&self) -> bool {
        self.inherit_transform
    }

    #[inline]
    pub fn set_inherit_transform(&mut self, inherit: bool) {
        if self.inherit_transform != inherit {
            self.inherit_transform = inherit;
            self.hierarchy_dirty = true;
        }
    }

    #[inline]
    pub fn color(&self) -> Color {
        self.color
    }

    #[inline]
    pub fn set_color(&mut self, color: Color) {
        self.color = color;
        self.hierarchy_dirty = true;
    }

    #[inline]
    pub fn specular(&self) -> Color {
        self.specular
    }

    #[inline]
    pub fn set_specular(&mut self, specular: Color) {
        self.specular = specular;
        self.hierarchy_dirty = true;
    }

    #[inline]
    pub fn set_inherit_color(&mut self, inherit: bool) {
        self.inherit_color = inherit;
        self.hierarchy_dirty = true;
    }

    #[inline]
    pub fn set_inherit_specular(&mut self, inherit: bool) {
        self.inherit_specular = inherit;
        self.hierarchy_dirty = true;
    }

    #[inline]
    pub fn flags(&self) -> NodeFlags {
        self.flags
    }

    /// Sets user flags. `MARK_REMOVED` and `INVALID` are monotonic: once set
    /// they cannot be cleared through this method.
    pub fn set_flags(&mut self, flags: NodeFlags) {
        let sticky = self.flags & (NodeFlags::MARK_REMOVED | NodeFlags::INVALID);
        self.flags = flags | sticky;
        self.hierarchy_dirty = true;
    }

    pub fn insert_flags(&mut self, flags: NodeFlags) {
        self.flags |= flags;
        self.hierarchy_dirty = true;
    }

    pub fn remove_flags(&mut self, flags: NodeFlags) {
        let flags = flags - (NodeFlags::MARK_REMOVED | NodeFlags::INVALID);
        self.flags -= flags;
        self.hierarchy_dirty = true;
    }

    pub(crate) fn mark_removed(&mut self) {
        self.flags |= NodeFlags::MARK_REMOVED | NodeFlags::INVALID;
    }

    #[inline]
    pub fn is_marked_removed(&self) -> bool {
        self.flags.contains(NodeFlags::MARK_REMOVED)
    }

    #[inline]
    pub fn is_invalid(&self) -> bool {
        self.flags.contains(NodeFlags::INVALID)
    }

    #[inline]
    pub fn is_system(&self) -> bool {
        self.flags.contains(NodeFlags::SYSTEM)
    }

    /// A node is live once it sits in a rooted tree and was not marked for
    /// removal.
    #[inline]
    pub fn is_live(&self) -> bool {
        self.in_tree && !self.is_invalid()
    }

    #[inline]
    pub fn tags(&self) -> &FxHashSet<ImmutableString> {
        &self.tags
    }

    pub fn add_tag<S: AsRef<str>>(&mut self, tag: S) {
        self.tags.insert(ImmutableString::new(tag));
        self.hierarchy_dirty = true;
    }

    pub fn remove_tag<S: AsRef<str>>(&mut self, tag: S) {
        self.tags.remove(&ImmutableString::new(tag));
        self.hierarchy_dirty = true;
    }

    #[inline]
    pub fn has_own_tag<S: AsRef<str>>(&self, tag: S) -> bool {
        self.tags.contains(&ImmutableString::new(tag))
    }

    /// Whether this node's own tags are visible to its descendants.
    pub fn set_tags_inheritable(&mut self, inheritable: bool) {
        self.tags_inheritable = inheritable;
        self.hierarchy_dirty = true;
    }

    #[inline]
    pub fn behavior(&self) -> Option<&dyn NodeBehavior> {
        self.behavior.as_deref()
    }

    pub fn set_behavior(&mut self, behavior: Option<Box<dyn NodeBehavior>>) {
        self.behavior = behavior;
    }

    /// Stages an action into the "next" slot. See [`Action`] for the
    /// promotion protocol.
    pub fn set_action(&mut self, action: Option<Box<dyn Action>>, update_now: bool) {
        self.actions.stage(action, update_now);
    }

    #[inline]
    pub fn has_action(&self) -> bool {
        self.actions.current.is_some() || self.actions.next.is_some()
    }

    pub fn render_attributes_mut(&mut self) -> &mut RenderAttributes {
        self.hierarchy_dirty = true;
        &mut self.render_attributes
    }
}

/// Builder used to configure a node before it enters the graph.
pub struct NodeBuilder {
    node: Node,
}

impl Default for NodeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeBuilder {
    pub fn new() -> Self {
        Self { node: Node::new() }
    }

    pub fn with_name<S: Into<String>>(mut self, name: S) -> Self {
        self.node.set_name(name);
        self
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        *self.node.local_transform_mut() = transform;
        self
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.node.set_color(color);
        self
    }

    pub fn with_flags(mut self, flags: NodeFlags) -> Self {
        self.node.set_flags(flags);
        self
    }

    pub fn with_tag<S: AsRef<str>>(mut self, tag: S) -> Self {
        self.node.add_tag(tag);
        self
    }

    pub fn with_inheritable_tags(mut self) -> Self {
        self.node.set_tags_inheritable(true);
        self
    }

    pub fn with_behavior<B: NodeBehavior>(mut self, behavior: B) -> Self {
        self.node.set_behavior(Some(Box::new(behavior)));
        self
    }

    pub fn with_render_attributes(mut self, attributes: RenderAttributes) -> Self {
        self.node.render_attributes = attributes;
        self
    }

    pub fn build(self) -> Node {
        self.node
    }

    /// Builds the node and adds it to the graph as a child of the root.
    pub fn build_in(self, graph: &mut Graph) -> Handle<Node> {
        graph.add_node(self.node)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn removal_flags_are_sticky() {
        let mut node = Node::new();
        node.mark_removed();
        assert!(node.is_marked_removed());
        assert!(node.is_invalid());
        node.set_flags(NodeFlags::empty());
        assert!(node.is_marked_removed());
        assert!(node.is_invalid());
        node.remove_flags(NodeFlags::MARK_REMOVED | NodeFlags::INVALID);
        assert!(node.is_invalid());
    }

    #[test]
    fn ids_are_unique() {
        assert_ne!(Node::new().id(), Node::new().id());
    }

    #[test]
    fn tags_are_interned_sets() {
        let mut node = Node::new();
        node.add_tag("enemy");
        node.add_tag("enemy");
        assert_eq!(node.tags().len(), 1);
        assert!(node.has_own_tag("enemy"));
        node.remove_tag("enemy");
        assert!(!node.has_own_tag("enemy"));
    }
}
