use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use glam::Vec3;

use crate::device::{Device, PolygonMode};
use crate::model::Model;
use crate::storage::StorageStrategy;

thread_local! {
    static NEXT_NODE_ID: Cell<u64> = const { Cell::new(1) };
}

/// Identity of a render node, unique on the thread that created it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    fn next() -> Self {
        NEXT_NODE_ID.with(|next| {
            let id = next.get();
            next.set(id + 1);
            NodeId(id)
        })
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Shared model and the strategy that draws it
///
/// The model always comes from the strategy, so a node can never hold one
/// without the other.
#[derive(Clone)]
pub struct RenderBinding {
    storage: Rc<dyn StorageStrategy>,
}

impl RenderBinding {
    pub fn new(storage: Rc<dyn StorageStrategy>) -> Self {
        Self { storage }
    }

    pub fn model(&self) -> &Rc<Model> {
        self.storage.model()
    }

    pub fn storage(&self) -> &Rc<dyn StorageStrategy> {
        &self.storage
    }
}

impl fmt::Debug for RenderBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderBinding")
            .field("model", &self.model().name)
            .field("storage", &self.storage.kind())
            .finish()
    }
}

/// Per-node animation
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Behavior {
    #[default]
    Static,
    /// Continuous rotation of the node's own geometry around `axis`
    Spin {
        axis: Vec3,
        degrees_per_second: f32,
        angle: f32,
    },
}

impl Behavior {
    pub fn spin(axis: Vec3, degrees_per_second: f32) -> Self {
        Behavior::Spin {
            axis,
            degrees_per_second,
            angle: 0.0,
        }
    }
}

/// Node of the render tree
///
/// Children are owned; the parent link is a plain id used for navigation only.
#[derive(Debug)]
pub struct RenderNode {
    tag: String,
    id: NodeId,
    transform_relative: Vec3,
    visible: bool,
    selected: bool,
    selectable: bool,
    persistable: bool,
    polygon_mode: PolygonMode,
    polygon_mode_forced: bool,
    children: Vec<RenderNode>,
    parent: Option<NodeId>,
    binding: Option<RenderBinding>,
    behavior: Behavior,
}

impl RenderNode {
    /// New grouping node of type `tag`
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            id: NodeId::next(),
            transform_relative: Vec3::ZERO,
            visible: true,
            selected: false,
            selectable: true,
            persistable: true,
            polygon_mode: PolygonMode::Fill,
            polygon_mode_forced: false,
            children: Vec::new(),
            parent: None,
            binding: None,
            behavior: Behavior::Static,
        }
    }

    pub fn with_binding(mut self, binding: RenderBinding) -> Self {
        self.binding = Some(binding);
        self
    }

    pub fn with_behavior(mut self, behavior: Behavior) -> Self {
        self.behavior = behavior;
        self
    }

    pub fn with_position(mut self, position: Vec3) -> Self {
        self.transform_relative = position;
        self
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn position(&self) -> Vec3 {
        self.transform_relative
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.transform_relative = position;
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    pub fn is_selected(&self) -> bool {
        self.selected && self.selectable
    }

    /// Ignored (left deselected) when the node is not selectable
    pub fn set_selected(&mut self, selected: bool) {
        self.selected = selected && self.selectable;
    }

    pub fn is_selectable(&self) -> bool {
        self.selectable
    }

    pub fn set_selectable(&mut self, selectable: bool) {
        self.selectable = selectable;
        self.selected &= selectable;
    }

    pub fn is_persistable(&self) -> bool {
        self.persistable
    }

    pub fn set_persistable(&mut self, persistable: bool) {
        self.persistable = persistable;
    }

    pub fn polygon_mode(&self) -> PolygonMode {
        self.polygon_mode
    }

    pub fn is_polygon_mode_forced(&self) -> bool {
        self.polygon_mode_forced
    }

    pub fn binding(&self) -> Option<&RenderBinding> {
        self.binding.as_ref()
    }

    pub fn model(&self) -> Option<&Rc<Model>> {
        self.binding.as_ref().map(RenderBinding::model)
    }

    pub fn behavior(&self) -> &Behavior {
        &self.behavior
    }

    pub fn set_behavior(&mut self, behavior: Behavior) {
        self.behavior = behavior;
    }

    pub fn children(&self) -> &[RenderNode] {
        &self.children
    }

    /// 1 for a leaf, otherwise 1 + the deepest child
    pub fn depth(&self) -> usize {
        1 + self.children.iter().map(RenderNode::depth).max().unwrap_or(0)
    }

    /// Drop every child; the node's own binding is kept
    pub fn clear(&mut self) {
        self.children.clear();
    }

    /// Remove the subtree rooted at `target` anywhere below this node
    pub fn erase(&mut self, target: NodeId) -> bool {
        self.detach(target).is_some()
    }

    /// Like [`erase`](Self::erase) but hands the subtree back, parentless
    pub fn detach(&mut self, target: NodeId) -> Option<RenderNode> {
        if let Some(index) = self.children.iter().position(|c| c.id == target) {
            let mut node = self.children.remove(index);
            node.parent = None;
            return Some(node);
        }
        self.children.iter_mut().find_map(|c| c.detach(target))
    }

    /// First node of type `tag` in pre-order, self included
    pub fn find(&self, tag: &str) -> Option<&RenderNode> {
        if self.tag == tag {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(tag))
    }

    pub fn find_mut(&mut self, tag: &str) -> Option<&mut RenderNode> {
        if self.tag == tag {
            return Some(self);
        }
        self.children.iter_mut().find_map(|c| c.find_mut(tag))
    }

    pub fn find_id(&self, id: NodeId) -> Option<&RenderNode> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find_id(id))
    }

    pub fn find_id_mut(&mut self, id: NodeId) -> Option<&mut RenderNode> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter_mut().find_map(|c| c.find_id_mut(id))
    }

    /// Direct child at `index`
    pub fn child(&self, index: usize) -> Option<&RenderNode> {
        self.children.get(index)
    }

    pub fn child_mut(&mut self, index: usize) -> Option<&mut RenderNode> {
        self.children.get_mut(index)
    }

    /// Append `child`, taking ownership
    ///
    /// A node that already has a parent is handed back untouched.
    pub fn add(&mut self, mut child: RenderNode) -> Result<NodeId, RenderNode> {
        if child.parent.is_some() {
            return Err(child);
        }
        debug_assert_ne!(child.id, self.id);
        child.parent = Some(self.id);
        let id = child.id;
        self.children.push(child);
        Ok(id)
    }

    pub fn count_children(&self) -> usize {
        self.children.len()
    }

    /// Flip this node's own selection
    pub fn toggle_selection(&mut self) {
        if self.selectable {
            self.selected = !self.selected;
        }
    }

    /// Deselect this node and its whole subtree
    pub fn clear_selection(&mut self) {
        self.walk_mut(&mut |node| node.selected = false);
    }

    pub fn select_all(&mut self) {
        self.walk_mut(&mut |node| node.set_selected(true));
    }

    pub fn deselect_all(&mut self) {
        self.walk_mut(&mut |node| node.set_selected(false));
    }

    /// Remove every selected descendant together with its subtree
    ///
    /// Returns the number of subtrees removed. The node itself is never removed.
    pub fn erase_selection(&mut self) -> usize {
        let before = self.children.len();
        self.children.retain(|c| !c.is_selected());
        let mut removed = before - self.children.len();
        for child in &mut self.children {
            removed += child.erase_selection();
        }
        removed
    }

    /// Whether this node or any descendant is selected
    pub fn has_selection(&self) -> bool {
        self.is_selected() || self.children.iter().any(RenderNode::has_selection)
    }

    /// Change the default mode of this subtree, leaving forced nodes alone
    pub fn set_polygon_mode(&mut self, mode: PolygonMode) {
        self.walk_mut(&mut |node| {
            if !node.polygon_mode_forced {
                node.polygon_mode = mode;
            }
        });
    }

    /// Mark (or unmark) this subtree as carrying a user-chosen mode
    pub fn force_polygon_mode(&mut self, forced: bool) {
        self.walk_mut(&mut |node| node.polygon_mode_forced = forced);
    }

    /// Cycle Fill/Line on selected nodes, or on every node when `force` is set
    ///
    /// Cycled nodes are marked forced so later default changes skip them.
    pub fn cycle_polygon_mode(&mut self, force: bool) {
        self.walk_mut(&mut |node| {
            if force || node.is_selected() {
                node.polygon_mode = node.polygon_mode.cycled();
                node.polygon_mode_forced = true;
            }
        });
    }

    /// Draw this subtree; invisible nodes skip their whole subtree
    pub fn render(&self, device: &mut dyn Device) {
        if !self.visible {
            return;
        }

        device.push_matrix();
        device.translate(self.transform_relative);
        device.polygon_mode(self.polygon_mode);

        self.render_concrete(device);
        for child in &self.children {
            child.render(device);
        }

        device.pop_matrix();
    }

    /// Draw this node's own geometry, if it has any
    pub fn render_concrete(&self, device: &mut dyn Device) {
        let Some(binding) = &self.binding else {
            return;
        };

        match self.behavior {
            Behavior::Static => binding.storage.draw(device),
            Behavior::Spin { axis, angle, .. } => {
                device.push_matrix();
                device.rotate(angle, axis);
                binding.storage.draw(device);
                device.pop_matrix();
            }
        }
    }

    /// Advance this node's animation by `dt` seconds; children are not visited
    pub fn animate(&mut self, dt: f32) {
        if let Behavior::Spin {
            degrees_per_second,
            angle,
            ..
        } = &mut self.behavior
        {
            *angle = (*angle + *degrees_per_second * dt).rem_euclid(360.0);
        }
    }

    /// Pre-order visit of this subtree
    pub fn walk<'a>(&'a self, f: &mut impl FnMut(&'a RenderNode)) {
        f(self);
        for child in &self.children {
            child.walk(f);
        }
    }

    pub fn walk_mut(&mut self, f: &mut impl FnMut(&mut RenderNode)) {
        f(self);
        for child in &mut self.children {
            child.walk_mut(f);
        }
    }
}
