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

//! The scene graph: a pool-backed tree of nodes with lazily evaluated
//! inherited state, a tag index, deferred destruction and the signal queues.
//!
//! Derived ("tree-combined") state of a node is a fold of the attribute over
//! its ancestor chain. Mutators only flip a per-node dirty bit; the first
//! read walks up to the nearest clean ancestor and re-evaluates down the
//! queried path, pushing the dirty bit onto the side branches it skips.

use crate::scene::{
    node::{BehaviorContext, Node, NodeFlags, NodeId, TreeState, RENDER_VALUE_DEFAULT},
    signal::{DelayedSignal, PendingSignal, Signal},
};
use crate::core::{
    algebra::{Matrix4, Vector3},
    color::Color,
    log::Log,
    pool::{Handle, Pool},
    sstorage::ImmutableString,
};
use fxhash::{FxHashMap, FxHashSet};
use std::collections::VecDeque;

bitflags::bitflags! {
    /// Switches of a single gameplay tick.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
    pub struct TickFlags: u8 {
        /// Tick nodes whose tree-combined enabled flag is off.
        const DONT_CARE_ENABLE = 0b001;
        /// Tick nodes whose tree-combined updated flag is off.
        const DONT_CARE_PAUSED = 0b010;
        /// Run only the action promotion and the first step of freshly
        /// promoted actions.
        const ENTER_ONLY       = 0b100;
    }
}

/// A helper type alias for the node pool.
pub type NodePool = Pool<Node>;

/// See module docs.
pub struct Graph {
    pool: NodePool,
    root: Handle<Node>,

    id_map: FxHashMap<NodeId, Handle<Node>>,
    tag_index: FxHashMap<ImmutableString, FxHashSet<Handle<Node>>>,
    // What the index currently holds per node, for cheap diffing.
    indexed_tags: FxHashMap<Handle<Node>, FxHashSet<ImmutableString>>,

    delayed_signals: VecDeque<DelayedSignal>,
    pending_signals: VecDeque<PendingSignal>,

    frame: u64,
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl Graph {
    /// Creates a new graph with a single root node.
    pub fn new() -> Self {
        let mut root_node = Node::new();
        root_node.set_name("__ROOT__");
        root_node.in_tree = true;
        root_node.ready_fired = true;
        root_node.start_fired = true;

        let id = root_node.id();
        let mut pool = Pool::new();
        let root = pool.spawn(root_node);

        Self {
            pool,
            root,
            id_map: FxHashMap::from_iter([(id, root)]),
            tag_index: Default::default(),
            indexed_tags: Default::default(),
            delayed_signals: Default::default(),
            pending_signals: Default::default(),
            frame: 0,
        }
    }

    #[inline]
    pub fn root(&self) -> Handle<Node> {
        self.root
    }

    #[inline]
    pub fn frame(&self) -> u64 {
        self.frame
    }

    #[inline]
    pub fn is_valid_handle(&self, handle: Handle<Node>) -> bool {
        self.pool.is_valid_handle(handle)
    }

    #[inline]
    pub fn try_get(&self, handle: Handle<Node>) -> Option<&Node> {
        self.pool.try_borrow(handle)
    }

    #[inline]
    pub fn try_get_mut(&mut self, handle: Handle<Node>) -> Option<&mut Node> {
        self.pool.try_borrow_mut(handle)
    }

    #[inline]
    pub fn node_by_id(&self, id: NodeId) -> Option<Handle<Node>> {
        self.id_map.get(&id).copied()
    }

    /// Amount of nodes in the graph, the root included.
    #[inline]
    pub fn node_count(&self) -> u32 {
        self.pool.alive_count()
    }

    pub fn pair_iter(&self) -> impl Iterator<Item = (Handle<Node>, &Node)> {
        self.pool.pair_iter()
    }

    // ------------------------------------------------------------------
    // Structure
    // ------------------------------------------------------------------

    /// Adds the node as a child of the root and returns its handle.
    pub fn add_node(&mut self, node: Node) -> Handle<Node> {
        let root = self.root;
        self.add_node_to(root, node)
    }

    /// Adds the node as a child of `parent`.
    pub fn add_node_to(&mut self, parent: Handle<Node>, node: Node) -> Handle<Node> {
        let handle = self.add_detached(node);
        self.link_nodes(handle, parent);
        handle
    }

    /// Puts the node into the pool without attaching it to the tree. The
    /// node is not live until linked under the root.
    pub fn add_detached(&mut self, node: Node) -> Handle<Node> {
        let id = node.id();
        let handle = self.pool.spawn(node);
        self.id_map.insert(id, handle);
        handle
    }

    /// Attaches `child` to `parent`, unlinking it from its previous parent
    /// first. A link that would create a cycle, or that targets a dead or
    /// removed node, is rejected with a log message.
    pub fn link_nodes(&mut self, child: Handle<Node>, parent: Handle<Node>) {
        if child == parent {
            Log::err("cannot link a node to itself");
            return;
        }
        if !self.pool.is_valid_handle(child) || !self.pool.is_valid_handle(parent) {
            Log::err("link_nodes: stale handle");
            return;
        }
        if self.pool[parent].is_invalid() {
            Log::err("link_nodes: parent is marked for removal");
            return;
        }
        // Reject cycles: the new parent must not be a descendant of child.
        let mut cursor = parent;
        while cursor.is_some() {
            if cursor == child {
                Log::err("link_nodes: refusing to create a cycle");
                return;
            }
            cursor = self.pool[cursor].parent;
        }

        self.unlink_internal(child);
        self.pool[child].parent = parent;
        self.pool[parent].children.push(child);

        let parent_in_tree = self.pool[parent].in_tree;
        self.propagate_in_tree(child, parent_in_tree);
        self.mark_subtree_dirty(child);

        if parent_in_tree {
            self.fire_ready_callbacks(child);
        }
    }

    /// Detaches the node from its parent, keeping it (and its subtree) in
    /// the pool. The subtree stops being live until relinked.
    pub fn unlink_node(&mut self, handle: Handle<Node>) {
        self.unlink_internal(handle);
        self.propagate_in_tree(handle, false);
        self.mark_subtree_dirty(handle);
    }

    fn unlink_internal(&mut self, handle: Handle<Node>) {
        let parent = match self.pool.try_borrow(handle) {
            Some(node) => node.parent,
            None => return,
        };
        if parent.is_some() {
            if let Some(parent) = self.pool.try_borrow_mut(parent) {
                parent.children.retain(|&c| c != handle);
            }
            self.pool[handle].parent = Handle::NONE;
        }
    }

    fn propagate_in_tree(&mut self, from: Handle<Node>, in_tree: bool) {
        let mut stack = vec![from];
        while let Some(handle) = stack.pop() {
            if let Some(node) = self.pool.try_borrow_mut(handle) {
                node.in_tree = in_tree;
                stack.extend(node.children.iter().copied());
            }
        }
    }

    fn fire_ready_callbacks(&mut self, from: Handle<Node>) {
        for handle in self.pre_order(from) {
            let fire = self
                .pool
                .try_borrow_mut(handle)
                .filter(|n| n.in_tree && !n.ready_fired)
                .map(|n| {
                    n.ready_fired = true;
                })
                .is_some();
            if fire {
                self.with_behavior(handle, 0.0, |behavior, ctx| behavior.on_ready(ctx));
            }
        }
    }

    /// Pre-order traversal snapshot starting at (and including) `from`.
    /// Safe to hold while mutating the graph: stale handles are skipped by
    /// the users of the snapshot.
    pub fn pre_order(&self, from: Handle<Node>) -> Vec<Handle<Node>> {
        let mut out = Vec::new();
        let mut stack = vec![from];
        while let Some(handle) = stack.pop() {
            if let Some(node) = self.pool.try_borrow(handle) {
                out.push(handle);
                // Reverse so the first child is popped first.
                stack.extend(node.children.iter().rev().copied());
            }
        }
        out
    }

    /// Calls `visitor` for every ancestor of the node, nearest first, until
    /// it returns `false`.
    pub fn traverse_parents<F>(&self, from: Handle<Node>, mut visitor: F)
    where
        F: FnMut(Handle<Node>, &Node) -> bool,
    {
        let mut cursor = match self.pool.try_borrow(from) {
            Some(node) => node.parent,
            None => return,
        };
        while let Some(node) = self.pool.try_borrow(cursor) {
            if node.is_invalid() || !visitor(cursor, node) {
                break;
            }
            cursor = node.parent;
        }
    }

    /// Calls `visitor` for the children of the node in pre-order. Removed
    /// nodes are skipped. With `recursive` set, the whole subtree is
    /// visited.
    pub fn traverse_children<F>(&self, from: Handle<Node>, recursive: bool, visitor: &mut F)
    where
        F: FnMut(Handle<Node>, &Node),
    {
        let children = match self.pool.try_borrow(from) {
            Some(node) => node.children.clone(),
            None => return,
        };
        for child in children {
            if let Some(node) = self.pool.try_borrow(child) {
                if node.is_invalid() {
                    continue;
                }
                visitor(child, node);
                if recursive {
                    self.traverse_children(child, true, visitor);
                }
            }
        }
    }

    /// Linear scan of direct children by name.
    pub fn find_child(&self, parent: Handle<Node>, name: &str) -> Handle<Node> {
        self.pool
            .try_borrow(parent)
            .and_then(|node| {
                node.children
                    .iter()
                    .find(|&&c| self.pool.try_borrow(c).is_some_and(|n| n.name() == name))
                    .copied()
            })
            .unwrap_or(Handle::NONE)
    }

    /// Pre-order scan of the whole subtree by name, `parent` excluded.
    pub fn find_child_in_tree(&self, parent: Handle<Node>, name: &str) -> Handle<Node> {
        for handle in self.pre_order(parent) {
            if handle == parent {
                continue;
            }
            if self.pool[handle].name() == name {
                return handle;
            }
        }
        Handle::NONE
    }

    // ------------------------------------------------------------------
    // Deferred removal
    // ------------------------------------------------------------------

    /// Marks the node and all its descendants for deferred destruction and
    /// fires their removal hooks. The nodes stay in the pool (mutable but
    /// skipped by every pass) until the scheduler's destruction phase.
    pub fn remove_node(&mut self, handle: Handle<Node>) {
        if handle == self.root {
            Log::err("the root node cannot be removed");
            return;
        }
        let subtree = self.pre_order(handle);
        for &h in &subtree {
            let newly_marked = self
                .pool
                .try_borrow_mut(h)
                .filter(|n| !n.is_marked_removed())
                .map(|n| n.mark_removed())
                .is_some();
            if newly_marked {
                self.unindex_node(h);
                self.with_behavior(h, 0.0, |behavior, ctx| behavior.on_removed(ctx));
            }
        }
        // Queued signals for removed nodes are dropped right away.
        self.delayed_signals
            .retain(|s| !subtree.contains(&s.target));
        self.pending_signals
            .retain(|s| !subtree.contains(&s.target));
    }

    /// Destroys every node marked for removal. `removing` receives the
    /// contiguous batch of doomed handles before anything is freed, so user
    /// databases can still resolve them.
    pub fn sweep_removed<F>(&mut self, mut removing: F)
    where
        F: FnMut(&Graph, &[Handle<Node>]),
    {
        let doomed: Vec<Handle<Node>> = self
            .pool
            .pair_iter()
            .filter(|(_, n)| n.is_marked_removed())
            .map(|(h, _)| h)
            .collect();
        if doomed.is_empty() {
            return;
        }

        removing(self, &doomed);

        // Detach and exit actions first; the hooks may look at the graph.
        for &handle in &doomed {
            self.exit_actions(handle);
        }

        for &handle in &doomed {
            // The subtree root may hang under a live parent.
            let parent = self
                .pool
                .try_borrow(handle)
                .map(|n| n.parent)
                .unwrap_or_default();
            if let Some(parent) = self.pool.try_borrow_mut(parent) {
                if !parent.is_marked_removed() {
                    parent.children.retain(|&c| c != handle);
                }
            }
            if let Some(node) = self.pool.free(handle) {
                self.id_map.remove(&node.id());
            }
            self.unindex_node(handle);
        }
    }

    fn exit_actions(&mut self, handle: Handle<Node>) {
        let Some(node) = self.pool.try_borrow_mut(handle) else {
            return;
        };
        let mut current = node.actions.current.take();
        node.actions.next = None;
        node.actions.swap_requested = false;
        if let Some(action) = current.as_mut() {
            let frame = self.frame;
            let mut ctx = BehaviorContext {
                graph: self,
                handle,
                dt: 0.0,
                frame,
            };
            action.on_exit(&mut ctx);
        }
    }

    // ------------------------------------------------------------------
    // Hierarchical (tree-combined) state
    // ------------------------------------------------------------------

    /// Marks the whole subtree as needing re-evaluation. Used by mutators
    /// that graph-external code cannot express with a single node bit.
    pub fn mark_subtree_dirty(&mut self, from: Handle<Node>) {
        let mut stack = vec![from];
        while let Some(handle) = stack.pop() {
            if let Some(node) = self.pool.try_borrow_mut(handle) {
                node.hierarchy_dirty = true;
                stack.extend(node.children.iter().copied());
            }
        }
    }

    /// Recomputes derived state for every dirty node in the graph. Called by
    /// the scheduler once per frame right before the render build, and by
    /// queries that need a globally consistent view (the tag index).
    pub fn update_hierarchical_data(&mut self) {
        self.update_recursive(self.root, false);
    }

    fn update_recursive(&mut self, handle: Handle<Node>, mut force: bool) {
        let Some(node) = self.pool.try_borrow(handle) else {
            return;
        };
        force |= node.hierarchy_dirty;
        let children = node.children.clone();
        if force {
            self.evaluate_node(handle);
        }
        for child in children {
            self.update_recursive(child, force);
        }
    }

    /// Re-evaluates the queried node if any node on its ancestor chain is
    /// dirty: walk up to the topmost dirty ancestor, then re-evaluate down
    /// the path, pushing dirt onto skipped siblings.
    fn ensure_clean(&mut self, handle: Handle<Node>) {
        let mut chain = Vec::new();
        let mut cursor = handle;
        while let Some(node) = self.pool.try_borrow(cursor) {
            chain.push(cursor);
            cursor = node.parent;
        }
        // Topmost dirty entry of the chain decides where evaluation starts.
        let Some(start) = chain
            .iter()
            .rposition(|&h| self.pool[h].hierarchy_dirty)
        else {
            return;
        };
        for &h in chain[..=start].iter().rev() {
            // Children keep their stale caches; flag them so their own reads
            // re-evaluate.
            let children = self.pool[h].children.clone();
            for child in children {
                if let Some(node) = self.pool.try_borrow_mut(child) {
                    node.hierarchy_dirty = true;
                }
            }
            self.evaluate_node(h);
        }
    }

    // Folds the parent's tree-combined state with the node's own state.
    fn evaluate_node(&mut self, handle: Handle<Node>) {
        let parent_state = self
            .pool
            .try_borrow(handle)
            .and_then(|n| self.pool.try_borrow(n.parent))
            .map(|p| p.tree.clone())
            .unwrap_or_default();

        let Some(node) = self.pool.try_borrow_mut(handle) else {
            return;
        };

        let local = node.local_transform().matrix();
        let mut tree = TreeState {
            world_matrix: if node.inherit_transform {
                parent_state.world_matrix * local
            } else {
                local
            },
            color: if node.inherit_color {
                parent_state.color * node.color()
            } else {
                node.color()
            },
            specular: if node.inherit_specular {
                parent_state.specular * node.specular()
            } else {
                node.specular()
            },
            visible: parent_state.visible && !node.flags().contains(NodeFlags::INVISIBLE),
            enabled: parent_state.enabled && !node.flags().contains(NodeFlags::NOT_ENABLED),
            updated: parent_state.updated && !node.flags().contains(NodeFlags::NOT_UPDATED),
            layer: if node.render_attributes.layer != RENDER_VALUE_DEFAULT {
                node.render_attributes.layer
            } else {
                parent_state.layer
            },
            priority: if node.render_attributes.priority != RENDER_VALUE_DEFAULT {
                node.render_attributes.priority
            } else {
                parent_state.priority
            },
            inherited_tags: Default::default(),
        };

        // Tags flow down from every ancestor that marks its own set
        // inheritable; the parent's combined view already folded the chain.
        let parent_node = self.pool.try_borrow(self.pool[handle].parent);
        if let Some(parent) = parent_node {
            tree.inherited_tags = parent.tree.inherited_tags.clone();
            if parent.tags_inheritable {
                tree.inherited_tags.extend(parent.tags().iter().cloned());
            }
        }

        let node = &mut self.pool[handle];
        node.tree = tree;
        node.hierarchy_dirty = false;

        self.reindex_node(handle);
    }

    fn reindex_node(&mut self, handle: Handle<Node>) {
        let Some(node) = self.pool.try_borrow(handle) else {
            return;
        };
        let new_tags: FxHashSet<ImmutableString> = if node.is_live() {
            node.tags()
                .iter()
                .chain(node.tree.inherited_tags.iter())
                .cloned()
                .collect()
        } else {
            Default::default()
        };
        let old_tags = self.indexed_tags.entry(handle).or_default();

        for tag in old_tags.difference(&new_tags) {
            if let Some(set) = self.tag_index.get_mut(tag) {
                set.remove(&handle);
                if set.is_empty() {
                    self.tag_index.remove(tag);
                }
            }
        }
        for tag in new_tags.difference(old_tags) {
            self.tag_index
                .entry(tag.clone())
                .or_default()
                .insert(handle);
        }
        if new_tags.is_empty() {
            self.indexed_tags.remove(&handle);
        } else {
            self.indexed_tags.insert(handle, new_tags);
        }
    }

    fn unindex_node(&mut self, handle: Handle<Node>) {
        if let Some(old_tags) = self.indexed_tags.remove(&handle) {
            for tag in old_tags {
                if let Some(set) = self.tag_index.get_mut(&tag) {
                    set.remove(&handle);
                    if set.is_empty() {
                        self.tag_index.remove(&tag);
                    }
                }
            }
        }
    }

    /// World matrix of the node: `parent_world * local` when transform
    /// inheritance is on, `local` otherwise.
    pub fn world_matrix(&mut self, handle: Handle<Node>) -> Matrix4<f32> {
        self.ensure_clean(handle);
        self.pool
            .try_borrow(handle)
            .map(|n| n.tree.world_matrix)
            .unwrap_or_else(Matrix4::identity)
    }

    /// World-space position of the node origin.
    pub fn world_position(&mut self, handle: Handle<Node>) -> Vector3<f32> {
        let m = self.world_matrix(handle);
        Vector3::new(m[(0, 3)], m[(1, 3)], m[(2, 3)])
    }

    /// Sets the local position so that the node lands at the given world
    /// position under its current parent.
    pub fn set_world_position(&mut self, handle: Handle<Node>, position: Vector3<f32>) {
        let parent = match self.pool.try_borrow(handle) {
            Some(node) => node.parent,
            None => return,
        };
        let local = if parent.is_some() {
            let parent_world = self.world_matrix(parent);
            let (inv, ok) = crate::math::try_invert(&parent_world);
            if ok {
                inv.transform_point(&position.into()).coords
            } else {
                position
            }
        } else {
            position
        };
        if let Some(node) = self.pool.try_borrow_mut(handle) {
            node.local_transform_mut().set_position(local);
        }
        self.mark_subtree_dirty(handle);
    }

    pub fn tree_color(&mut self, handle: Handle<Node>) -> Color {
        self.ensure_clean(handle);
        self.pool
            .try_borrow(handle)
            .map(|n| n.tree.color)
            .unwrap_or(Color::WHITE)
    }

    pub fn tree_specular(&mut self, handle: Handle<Node>) -> Color {
        self.ensure_clean(handle);
        self.pool
            .try_borrow(handle)
            .map(|n| n.tree.specular)
            .unwrap_or(Color::WHITE)
    }

    pub fn is_visible_in_tree(&mut self, handle: Handle<Node>) -> bool {
        self.ensure_clean(handle);
        self.pool
            .try_borrow(handle)
            .is_some_and(|n| n.tree.visible)
    }

    pub fn is_enabled_in_tree(&mut self, handle: Handle<Node>) -> bool {
        self.ensure_clean(handle);
        self.pool
            .try_borrow(handle)
            .is_some_and(|n| n.tree.enabled)
    }

    pub fn is_updated_in_tree(&mut self, handle: Handle<Node>) -> bool {
        self.ensure_clean(handle);
        self.pool
            .try_borrow(handle)
            .is_some_and(|n| n.tree.updated)
    }

    pub fn tree_layer(&mut self, handle: Handle<Node>) -> i32 {
        self.ensure_clean(handle);
        self.pool
            .try_borrow(handle)
            .map(|n| n.tree.layer)
            .unwrap_or(RENDER_VALUE_DEFAULT)
    }

    pub fn tree_priority(&mut self, handle: Handle<Node>) -> i32 {
        self.ensure_clean(handle);
        self.pool
            .try_borrow(handle)
            .map(|n| n.tree.priority)
            .unwrap_or(RENDER_VALUE_DEFAULT)
    }

    /// True when the tag is in the node's tree-combined tag set.
    pub fn has_tag_in_tree<S: AsRef<str>>(&mut self, handle: Handle<Node>, tag: S) -> bool {
        self.ensure_clean(handle);
        let tag = ImmutableString::new(tag);
        self.pool
            .try_borrow(handle)
            .is_some_and(|n| n.tags().contains(&tag) || n.tree.inherited_tags.contains(&tag))
    }

    /// Every live node whose tree-combined tag set contains the tag. O(1)
    /// lookup plus O(k) copy once the dirty subtrees are re-evaluated.
    pub fn get_nodes_by_tag<S: AsRef<str>>(&mut self, tag: S) -> Vec<Handle<Node>> {
        self.update_hierarchical_data();
        self.tag_index
            .get(&ImmutableString::new(tag))
            .map(|set| {
                let mut nodes: Vec<Handle<Node>> = set.iter().copied().collect();
                nodes.sort();
                nodes
            })
            .unwrap_or_default()
    }

    // ------------------------------------------------------------------
    // Signals
    // ------------------------------------------------------------------

    /// Sends the signal to one node, immediately when the target is live.
    /// A target that exists but has not yet joined the tree keeps the
    /// signal queued until it does; a dead target drops it.
    pub fn send_signal(&mut self, target: Handle<Node>, signal: Signal) {
        match self.pool.try_borrow(target) {
            Some(node) if node.is_live() => {
                self.dispatch_signal(target, &signal);
            }
            Some(node) if !node.is_invalid() => {
                self.pending_signals.push_back(PendingSignal { target, signal });
            }
            _ => {}
        }
    }

    /// Queues the signal for delivery `frames` scheduler ticks from now.
    pub fn send_signal_delayed(&mut self, target: Handle<Node>, signal: Signal, frames: u32) {
        self.delayed_signals.push_back(DelayedSignal {
            target,
            signal,
            frames_left: frames,
        });
    }

    /// Delivers the signal to every live node whose tree-combined tag set
    /// contains the signal's tag, in pre-order.
    pub fn broadcast_signal(&mut self, signal: Signal) {
        self.update_hierarchical_data();
        let tag = signal.tag().clone();
        for handle in self.pre_order(self.root) {
            let matches = self.pool.try_borrow(handle).is_some_and(|n| {
                n.is_live()
                    && (n.tags().contains(&tag) || n.tree.inherited_tags.contains(&tag))
            });
            if matches {
                self.dispatch_signal(handle, &signal);
            }
        }
    }

    /// Walks the ancestor chain of `from`, nearest parent first, until some
    /// node consumes the signal or the root is passed.
    pub fn broadcast_signal_to_parents(&mut self, from: Handle<Node>, signal: Signal) {
        let mut cursor = match self.pool.try_borrow(from) {
            Some(node) => node.parent,
            None => return,
        };
        while self.pool.is_valid_handle(cursor) {
            let next = self.pool[cursor].parent;
            if self.pool[cursor].is_live() && self.dispatch_signal(cursor, &signal) {
                break;
            }
            cursor = next;
        }
    }

    /// Delivers the signal to the subtree below `from` in pre-order.
    pub fn broadcast_signal_to_children(&mut self, from: Handle<Node>, signal: Signal) {
        for handle in self.pre_order(from) {
            if handle == from {
                continue;
            }
            if self.pool.try_borrow(handle).is_some_and(Node::is_live) {
                self.dispatch_signal(handle, &signal);
            }
        }
    }

    /// The scheduler's signal phase: counts down the delay queue and
    /// re-examines signals parked for not-yet-live targets. FIFO order per
    /// target is preserved by the queues themselves.
    pub fn deliver_queued_signals(&mut self) {
        // Delayed first: decrement and deliver expired entries. The queue is
        // swapped out so hooks can enqueue fresh signals while it drains;
        // those are folded back at the end, undecremented.
        let mut draining = std::mem::take(&mut self.delayed_signals);
        let mut still_waiting = VecDeque::new();
        while let Some(mut entry) = draining.pop_front() {
            if entry.frames_left > 0 {
                entry.frames_left -= 1;
            }
            if entry.frames_left == 0 {
                let live = self
                    .pool
                    .try_borrow(entry.target)
                    .is_some_and(Node::is_live);
                if live {
                    self.dispatch_signal(entry.target, &entry.signal);
                }
                // A dead target drops the signal silently.
            } else {
                still_waiting.push_back(entry);
            }
        }
        still_waiting.append(&mut self.delayed_signals);
        self.delayed_signals = still_waiting;

        // Parked sends: deliver to targets that became live, drop dead ones.
        let mut draining = std::mem::take(&mut self.pending_signals);
        let mut parked = VecDeque::new();
        while let Some(entry) = draining.pop_front() {
            match self.pool.try_borrow(entry.target) {
                Some(node) if node.is_live() => {
                    self.dispatch_signal(entry.target, &entry.signal);
                }
                Some(node) if !node.is_invalid() => parked.push_back(entry),
                _ => {}
            }
        }
        parked.append(&mut self.pending_signals);
        self.pending_signals = parked;
    }

    /// Runs the node's signal hook. Returns true when the node consumed the
    /// signal.
    pub fn dispatch_signal(&mut self, handle: Handle<Node>, signal: &Signal) -> bool {
        let mut consumed = false;
        self.with_behavior(handle, 0.0, |behavior, ctx| {
            consumed = behavior.on_signal(ctx, signal);
        });
        consumed
    }

    // ------------------------------------------------------------------
    // Ticking
    // ------------------------------------------------------------------

    // The take-call-return dance: the behavior is lifted out of the node so
    // the hook can borrow the graph mutably.
    fn with_behavior<F>(&mut self, handle: Handle<Node>, dt: f32, f: F)
    where
        F: FnOnce(&mut dyn crate::scene::node::NodeBehavior, &mut BehaviorContext),
    {
        let Some(mut behavior) = self
            .pool
            .try_borrow_mut(handle)
            .and_then(|n| n.behavior.take())
        else {
            return;
        };
        let was_marked = self.pool[handle].is_marked_removed();
        let frame = self.frame;
        let mut ctx = BehaviorContext {
            graph: self,
            handle,
            dt,
            frame,
        };
        f(behavior.as_mut(), &mut ctx);

        // A hook may have removed its own node; with the behavior lifted
        // out, `remove_node` could not reach the removal hook, so fire it
        // here.
        let now_marked = self
            .pool
            .try_borrow(handle)
            .is_some_and(Node::is_marked_removed);
        if now_marked && !was_marked {
            let mut ctx = BehaviorContext {
                graph: self,
                handle,
                dt,
                frame,
            };
            behavior.on_removed(&mut ctx);
        }

        if let Some(node) = self.pool.try_borrow_mut(handle) {
            if node.behavior.is_none() {
                node.behavior = Some(behavior);
            }
        }
    }

    /// System tick: pre-order pass over nodes carrying the SYSTEM flag. It
    /// ignores pause and enable states and only skips invalid nodes.
    pub fn tick_system(&mut self, dt: f32) {
        for handle in self.pre_order(self.root) {
            let is_system = self
                .pool
                .try_borrow(handle)
                .is_some_and(|n| n.is_system() && !n.is_invalid() && n.in_tree);
            if is_system {
                self.with_behavior(handle, dt, |behavior, ctx| behavior.on_system_step(ctx));
            }
        }
    }

    /// Gameplay tick. Two sub-passes over a stable snapshot of the live
    /// tree: action promotion + step + step hooks, then the late-step hooks.
    /// Nodes added during the tick are not visited until the next frame.
    pub fn tick_gameplay(&mut self, dt: f32, flags: TickFlags) {
        self.frame += 1;
        self.update_hierarchical_data();

        let snapshot = self.pre_order(self.root);

        for &handle in &snapshot {
            if !self.should_tick(handle, flags) {
                continue;
            }
            self.tick_actions(handle, dt, flags);
            if flags.contains(TickFlags::ENTER_ONLY) {
                continue;
            }
            let start = self
                .pool
                .try_borrow_mut(handle)
                .filter(|n| !n.start_fired)
                .map(|n| n.start_fired = true)
                .is_some();
            if start {
                self.with_behavior(handle, dt, |behavior, ctx| behavior.on_start(ctx));
            }
            self.with_behavior(handle, dt, |behavior, ctx| behavior.on_step(ctx));
        }

        if flags.contains(TickFlags::ENTER_ONLY) {
            return;
        }

        for &handle in &snapshot {
            if !self.should_tick(handle, flags) {
                continue;
            }
            self.with_behavior(handle, dt, |behavior, ctx| behavior.on_late_step(ctx));
        }
    }

    fn should_tick(&mut self, handle: Handle<Node>, flags: TickFlags) -> bool {
        self.ensure_clean(handle);
        let Some(node) = self.pool.try_borrow(handle) else {
            return false;
        };
        if node.is_invalid() || !node.in_tree {
            return false;
        }
        if !node.tree.enabled && !flags.contains(TickFlags::DONT_CARE_ENABLE) {
            return false;
        }
        if !node.tree.updated && !flags.contains(TickFlags::DONT_CARE_PAUSED) {
            return false;
        }
        true
    }

    // Promotion protocol: exit the current action, move next into current,
    // enter it, step it. Deferred stagings sit out exactly one tick.
    fn tick_actions(&mut self, handle: Handle<Node>, dt: f32, flags: TickFlags) {
        enum Plan {
            Promote(Option<Box<dyn crate::scene::action::Action>>),
            StepCurrent,
            Nothing,
        }

        let plan = {
            let Some(node) = self.pool.try_borrow_mut(handle) else {
                return;
            };
            if node.actions.swap_requested {
                if node.actions.defer_promotion {
                    node.actions.defer_promotion = false;
                    if node.actions.current.is_some() {
                        Plan::StepCurrent
                    } else {
                        Plan::Nothing
                    }
                } else {
                    node.actions.swap_requested = false;
                    Plan::Promote(node.actions.next.take())
                }
            } else if node.actions.current.is_some() {
                Plan::StepCurrent
            } else {
                Plan::Nothing
            }
        };

        match plan {
            Plan::Promote(next) => {
                // Exit the old action first; it is never re-entered.
                let old = self
                    .pool
                    .try_borrow_mut(handle)
                    .and_then(|n| n.actions.current.take());
                if let Some(mut old) = old {
                    self.with_action_ctx(handle, dt, |ctx| old.on_exit(ctx));
                }
                let mut next = next;
                if let Some(action) = next.as_mut() {
                    self.with_action_ctx(handle, dt, |ctx| action.on_enter(ctx));
                    self.with_action_ctx(handle, dt, |ctx| action.on_step(ctx));
                }
                if let Some(node) = self.pool.try_borrow_mut(handle) {
                    node.actions.current = next;
                }
            }
            Plan::StepCurrent => {
                if flags.contains(TickFlags::ENTER_ONLY) {
                    return;
                }
                let current = self
                    .pool
                    .try_borrow_mut(handle)
                    .and_then(|n| n.actions.current.take());
                if let Some(mut current) = current {
                    self.with_action_ctx(handle, dt, |ctx| current.on_step(ctx));
                    if let Some(node) = self.pool.try_borrow_mut(handle) {
                        if node.actions.current.is_none() {
                            node.actions.current = Some(current);
                        }
                    }
                }
            }
            Plan::Nothing => {}
        }
    }

    fn with_action_ctx<F>(&mut self, handle: Handle<Node>, dt: f32, f: F)
    where
        F: FnOnce(&mut BehaviorContext),
    {
        let frame = self.frame;
        let mut ctx = BehaviorContext {
            graph: self,
            handle,
            dt,
            frame,
        };
        f(&mut ctx);
    }

    /// Polls every live current action for a requested stage transition;
    /// the first answer wins.
    pub fn query_requested_stage(&self) -> Option<crate::stage::StageId> {
        for (_, node) in self.pool.pair_iter() {
            if !node.is_live() {
                continue;
            }
            if let Some(stage) = node
                .actions
                .current
                .as_ref()
                .and_then(|a| a.query_next_stage())
            {
                return Some(stage);
            }
        }
        None
    }

    /// Fires the will-render hooks and returns the node handles to render,
    /// fully ordered.
    pub fn tick_will_render(&mut self, handles: &[Handle<Node>], dt: f32) {
        for &handle in handles {
            self.with_behavior(handle, dt, |behavior, ctx| behavior.on_will_render(ctx));
        }
    }
}

impl std::ops::Index<Handle<Node>> for Graph {
    type Output = Node;

    #[inline]
    fn index(&self, index: Handle<Node>) -> &Self::Output {
        &self.pool[index]
    }
}

impl std::ops::IndexMut<Handle<Node>> for Graph {
    #[inline]
    fn index_mut(&mut self, index: Handle<Node>) -> &mut Self::Output {
        &mut self.pool[index]
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::scene::node::NodeBuilder;

    #[test]
    fn world_matrix_composition() {
        let mut graph = Graph::new();
        let a = NodeBuilder::new().build_in(&mut graph);
        let b = graph.add_node_to(a, Node::new());

        graph[a]
            .local_transform_mut()
            .set_position(Vector3::new(100.0, 0.0, 0.0));
        graph[b]
            .local_transform_mut()
            .set_position(Vector3::new(10.0, 0.0, 0.0));

        assert_eq!(graph.world_position(b), Vector3::new(110.0, 0.0, 0.0));

        // Without transform inheritance the world matrix equals the local one.
        graph[b].set_inherit_transform(false);
        graph.mark_subtree_dirty(b);
        assert_eq!(graph.world_position(b), Vector3::new(10.0, 0.0, 0.0));
    }

    #[test]
    fn lazy_evaluation_propagates_to_descendants() {
        let mut graph = Graph::new();
        let a = graph.add_node(Node::new());
        let b = graph.add_node_to(a, Node::new());
        let c = graph.add_node_to(b, Node::new());

        assert_eq!(graph.world_position(c), Vector3::zeros());

        // Mutating an ancestor must invalidate the grandchild's cache.
        graph[a]
            .local_transform_mut()
            .set_position(Vector3::new(5.0, 0.0, 0.0));
        assert_eq!(graph.world_position(c), Vector3::new(5.0, 0.0, 0.0));
    }

    #[test]
    fn color_inheritance_is_modulation() {
        let mut graph = Graph::new();
        let a = graph.add_node(Node::new());
        let b = graph.add_node_to(a, Node::new());
        graph[a].set_color(Color::new(0.5, 1.0, 1.0, 1.0));
        graph[b].set_color(Color::new(1.0, 0.5, 1.0, 1.0));
        assert_eq!(graph.tree_color(b), Color::new(0.5, 0.5, 1.0, 1.0));

        graph[b].set_inherit_color(false);
        assert_eq!(graph.tree_color(b), Color::new(1.0, 0.5, 1.0, 1.0));
    }

    #[test]
    fn cycles_are_rejected() {
        let mut graph = Graph::new();
        let a = graph.add_node(Node::new());
        let b = graph.add_node_to(a, Node::new());
        let c = graph.add_node_to(b, Node::new());

        graph.link_nodes(a, c);
        // The structure is unchanged.
        assert_eq!(graph[a].parent(), graph.root());
        assert_eq!(graph[c].parent(), b);
    }

    #[test]
    fn layer_priority_default_sentinel() {
        let mut graph = Graph::new();
        let a = graph.add_node(Node::new());
        let b = graph.add_node_to(a, Node::new());
        graph[a].render_attributes_mut().layer = 3;
        graph[a].render_attributes_mut().priority = 7;
        // The child holds the default sentinel, so the tree values flow down.
        assert_eq!(graph.tree_layer(b), 3);
        assert_eq!(graph.tree_priority(b), 7);

        graph[b].render_attributes_mut().layer = 1;
        assert_eq!(graph.tree_layer(b), 1);
        assert_eq!(graph.tree_priority(b), 7);
    }

    #[test]
    fn tag_index_tracks_tree_tags() {
        let mut graph = Graph::new();
        let a = NodeBuilder::new()
            .with_tag("enemy")
            .with_inheritable_tags()
            .build_in(&mut graph);
        let b = graph.add_node_to(a, Node::new());

        let tagged = graph.get_nodes_by_tag("enemy");
        assert!(tagged.contains(&a));
        assert!(tagged.contains(&b), "inherited tag must index the child");

        // Non-inheritable tags stay with their owner.
        let c = NodeBuilder::new().with_tag("solo").build_in(&mut graph);
        let d = graph.add_node_to(c, Node::new());
        let tagged = graph.get_nodes_by_tag("solo");
        assert!(tagged.contains(&c));
        assert!(!tagged.contains(&d));
    }

    #[test]
    fn tag_index_drops_removed_nodes() {
        let mut graph = Graph::new();
        let a = NodeBuilder::new().with_tag("enemy").build_in(&mut graph);
        assert_eq!(graph.get_nodes_by_tag("enemy"), vec![a]);

        graph.remove_node(a);
        assert!(graph.get_nodes_by_tag("enemy").is_empty());
        graph.sweep_removed(|_, _| {});
        assert!(graph.get_nodes_by_tag("enemy").is_empty());
    }

    #[test]
    fn removal_is_deferred_and_sticky() {
        let mut graph = Graph::new();
        let a = graph.add_node(Node::new());
        let b = graph.add_node_to(a, Node::new());

        graph.remove_node(a);
        assert!(graph[a].is_invalid());
        assert!(graph[b].is_invalid(), "descendants are marked too");
        assert!(graph.is_valid_handle(a), "still in the pool until the sweep");

        let mut batch = Vec::new();
        graph.sweep_removed(|_, doomed| batch.extend_from_slice(doomed));
        assert_eq!(batch.len(), 2);
        assert!(!graph.is_valid_handle(a));
        assert!(!graph.is_valid_handle(b));
    }

    #[test]
    fn find_children() {
        let mut graph = Graph::new();
        let a = NodeBuilder::new().with_name("a").build_in(&mut graph);
        let b = graph.add_node_to(a, NodeBuilder::new().with_name("b").build());
        let c = graph.add_node_to(b, NodeBuilder::new().with_name("c").build());

        assert_eq!(graph.find_child(graph.root(), "a"), a);
        assert_eq!(graph.find_child(graph.root(), "c"), Handle::NONE);
        assert_eq!(graph.find_child_in_tree(graph.root(), "c"), c);
    }

    #[test]
    fn delayed_signal_counts_frames() {
        struct Recorder;
        impl crate::scene::node::NodeBehavior for Recorder {
            fn on_signal(&mut self, ctx: &mut BehaviorContext, signal: &Signal) -> bool {
                if signal.is("ping") {
                    let x = signal.int_arg("x").unwrap_or_default();
                    ctx.graph[ctx.handle].set_name(format!("got-{x}"));
                }
                false
            }
        }

        let mut graph = Graph::new();
        let n = NodeBuilder::new().with_behavior(Recorder).build_in(&mut graph);

        graph.send_signal_delayed(n, Signal::new("ping").with_arg("x", 7i64), 3);

        for phase in 1..=2 {
            graph.deliver_queued_signals();
            assert_eq!(graph[n].name(), "", "no delivery at phase {phase}");
        }
        graph.deliver_queued_signals();
        assert_eq!(graph[n].name(), "got-7");
        // Exactly once.
        graph[n].set_name("");
        graph.deliver_queued_signals();
        assert_eq!(graph[n].name(), "");
    }

    #[test]
    fn removed_target_discards_delayed_signal() {
        struct Recorder;
        impl crate::scene::node::NodeBehavior for Recorder {
            fn on_signal(&mut self, ctx: &mut BehaviorContext, _signal: &Signal) -> bool {
                ctx.graph[ctx.handle].set_name("delivered");
                false
            }
        }

        let mut graph = Graph::new();
        let n = NodeBuilder::new().with_behavior(Recorder).build_in(&mut graph);
        graph.send_signal_delayed(n, Signal::new("ping"), 2);
        graph.remove_node(n);
        graph.deliver_queued_signals();
        graph.deliver_queued_signals();
        assert!(graph.try_get(n).is_some_and(|node| node.name().is_empty()));
    }

    #[test]
    fn traversals_skip_removed_nodes() {
        let mut graph = Graph::new();
        let a = NodeBuilder::new().with_name("a").build_in(&mut graph);
        let b = graph.add_node_to(a, NodeBuilder::new().with_name("b").build());
        let c = graph.add_node_to(b, NodeBuilder::new().with_name("c").build());
        let d = graph.add_node_to(a, NodeBuilder::new().with_name("d").build());

        let mut seen = Vec::new();
        graph.traverse_children(a, true, &mut |_, node| seen.push(node.name().to_owned()));
        assert_eq!(seen, vec!["b", "c", "d"]);

        let mut parents = Vec::new();
        graph.traverse_parents(c, |_, node| {
            parents.push(node.name().to_owned());
            true
        });
        assert_eq!(parents, vec!["b", "a", "__ROOT__"]);

        graph.remove_node(b);
        let mut seen = Vec::new();
        graph.traverse_children(a, true, &mut |_, node| seen.push(node.name().to_owned()));
        assert_eq!(seen, vec!["d"]);
    }

    #[test]
    fn world_position_round_trip() {
        let mut graph = Graph::new();
        let a = graph.add_node(Node::new());
        let b = graph.add_node_to(a, Node::new());
        graph[a]
            .local_transform_mut()
            .set_position(Vector3::new(30.0, -4.0, 1.0));

        let target = Vector3::new(7.5, 2.25, -3.0);
        graph.set_world_position(b, target);
        let result = graph.world_position(b);
        assert!((result - target).norm() < 1e-4);
    }

    #[test]
    fn child_broadcast_covers_subtree() {
        struct Recorder;
        impl crate::scene::node::NodeBehavior for Recorder {
            fn on_signal(&mut self, ctx: &mut BehaviorContext, _signal: &Signal) -> bool {
                ctx.graph[ctx.handle].set_name("hit");
                false
            }
        }

        let mut graph = Graph::new();
        let top = NodeBuilder::new().with_behavior(Recorder).build_in(&mut graph);
        let mid = graph.add_node_to(top, NodeBuilder::new().with_behavior(Recorder).build());
        let leaf = graph.add_node_to(mid, NodeBuilder::new().with_behavior(Recorder).build());

        graph.broadcast_signal_to_children(top, Signal::new("wave"));
        assert_eq!(graph[top].name(), "", "the origin is excluded");
        assert_eq!(graph[mid].name(), "hit");
        assert_eq!(graph[leaf].name(), "hit");
    }

    #[test]
    fn parent_broadcast_stops_at_consumer() {
        struct Consumer;
        impl crate::scene::node::NodeBehavior for Consumer {
            fn on_signal(&mut self, ctx: &mut BehaviorContext, _signal: &Signal) -> bool {
                ctx.graph[ctx.handle].set_name("consumed");
                true
            }
        }
        struct Recorder;
        impl crate::scene::node::NodeBehavior for Recorder {
            fn on_signal(&mut self, ctx: &mut BehaviorContext, _signal: &Signal) -> bool {
                ctx.graph[ctx.handle].set_name("reached");
                false
            }
        }

        let mut graph = Graph::new();
        let top = NodeBuilder::new().with_behavior(Recorder).build_in(&mut graph);
        let mid = graph.add_node_to(top, NodeBuilder::new().with_behavior(Consumer).build());
        let leaf = graph.add_node_to(mid, Node::new());

        graph.broadcast_signal_to_parents(leaf, Signal::new("bubble"));
        assert_eq!(graph[mid].name(), "consumed");
        assert_eq!(graph[top].name(), "", "consumed before reaching the top");
    }
}
