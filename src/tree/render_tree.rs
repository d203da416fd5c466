use std::collections::HashMap;
use std::fmt::Write as _;
use std::rc::Rc;

use anyhow::Context;
use glam::Vec3;

use super::factory::{FactoryRegistry, GroupFactory, ModelFactory, NodeFactory};
use super::node::{Behavior, NodeId, RenderNode};
use crate::config::{default_layout, LayoutNode, ModelSource, SceneConfig};
use crate::device::Device;
use crate::error::Result;
use crate::loaders;
use crate::model::{primitives, Model};
use crate::storage::StorageStrategy;

/// Tag of the root node owned by every tree
pub const ROOT: &str = "root";
/// Stock structural object of the default scene
pub const SPIDER: &str = "spider";
/// Stock object placed on the spider
pub const CONE_CUBE: &str = "cone_cube";
/// Spin rate of the stock cone_cube, degrees per second
pub const CONE_CUBE_SPIN: f32 = 45.0;

/// The scene's node hierarchy and the factories that populate it
pub struct RenderTree {
    root: RenderNode,
    registry: FactoryRegistry,
    config: SceneConfig,
    models: HashMap<String, Rc<Model>>,
    /// Strategies of replaced factories, released once no node uses them
    retired: Vec<Rc<dyn StorageStrategy>>,
}

impl RenderTree {
    /// Empty tree with no factories
    pub fn new() -> Self {
        Self {
            root: Self::new_root(),
            registry: FactoryRegistry::new(),
            config: SceneConfig::empty(),
            models: HashMap::new(),
            retired: Vec::new(),
        }
    }

    /// Resolve every configured model up front; `initialize` builds the tree
    pub fn from_config(config: SceneConfig) -> anyhow::Result<Self> {
        let mut models = HashMap::new();
        for factory in &config.factories {
            let model = match &factory.model {
                ModelSource::None => continue,
                ModelSource::Builtin { name } => primitives::builtin(name)
                    .with_context(|| format!("factory `{}`: unknown builtin model `{}`", factory.tag, name))?,
                ModelSource::Gltf { path } => loaders::load_model(path)
                    .with_context(|| format!("factory `{}`: failed to load model", factory.tag))?,
            };
            models.insert(factory.tag.clone(), Rc::new(model));
        }

        log::debug!("resolved {} models for {} factories", models.len(), config.factories.len());

        Ok(Self {
            root: Self::new_root(),
            registry: FactoryRegistry::new(),
            config,
            models,
            retired: Vec::new(),
        })
    }

    fn new_root() -> RenderNode {
        let mut root = RenderNode::new(ROOT);
        root.set_selectable(false);
        root.set_persistable(false);
        root
    }

    /// Rebuild the scene from scratch: factories first, then the configured layout
    ///
    /// On error the previous hierarchy is left in place.
    pub fn initialize(&mut self) -> Result<()> {
        let factories: Vec<Box<dyn NodeFactory>> = self
            .config
            .factories
            .iter()
            .map(|fc| -> Box<dyn NodeFactory> {
                match self.models.get(&fc.tag) {
                    Some(model) => Box::new(
                        ModelFactory::new(fc.tag.as_str(), model.clone(), fc.storage.unwrap_or(self.config.storage))
                            .with_behavior(fc.behavior.to_behavior())
                            .with_selectable(fc.selectable)
                            .with_persistable(fc.persistable),
                    ),
                    None => Box::new(GroupFactory::new(fc.tag.as_str())),
                }
            })
            .collect();
        for factory in factories {
            let tag = factory.tag().to_string();
            self.register_factory(tag, factory);
        }
        self.register_stock_factories();

        let layout = if self.config.layout.is_empty() {
            default_layout()
        } else {
            self.config.layout.clone()
        };
        let nodes = layout
            .iter()
            .map(|entry| self.build(entry))
            .collect::<Result<Vec<_>>>()?;

        self.root.clear();
        for node in nodes {
            let _ = self.root.add(node);
        }

        self.root.set_polygon_mode(self.config.default_polygon_mode);

        log::info!(
            "render tree initialized: {} factories, {} nodes, depth {}",
            self.registry.len(),
            self.node_count(),
            self.depth()
        );
        Ok(())
    }

    /// Spider and cone_cube factories for configs that leave them out
    fn register_stock_factories(&mut self) {
        let storage = self.config.storage;
        if !self.registry.contains(SPIDER) {
            let model = self.stock_model(SPIDER, primitives::spider);
            self.register_factory(SPIDER, Box::new(ModelFactory::new(SPIDER, model, storage)));
        }
        if !self.registry.contains(CONE_CUBE) {
            let model = self.stock_model(CONE_CUBE, primitives::cone_cube);
            self.register_factory(
                CONE_CUBE,
                Box::new(
                    ModelFactory::new(CONE_CUBE, model, storage)
                        .with_behavior(Behavior::spin(Vec3::Y, CONE_CUBE_SPIN)),
                ),
            );
        }
    }

    fn stock_model(&mut self, tag: &str, build: fn() -> Model) -> Rc<Model> {
        self.models
            .entry(tag.to_string())
            .or_insert_with(|| Rc::new(build()))
            .clone()
    }

    fn build(&self, entry: &LayoutNode) -> Result<RenderNode> {
        let mut node = self.registry.create(&entry.tag)?;
        node.set_position(Vec3::from_array(entry.position));
        node.set_visible(entry.visible);
        for child in &entry.children {
            let child = self.build(child)?;
            // freshly created nodes have no parent
            let _ = node.add(child);
        }
        Ok(node)
    }

    pub fn render(&self, device: &mut dyn Device) {
        self.root.render(device);
    }

    /// Attach `node` directly under the root
    pub fn add(&mut self, node: RenderNode) -> std::result::Result<NodeId, RenderNode> {
        self.root.add(node)
    }

    /// Attach `node` under `parent`; the node comes back if `parent` is not in the tree
    pub fn add_to(&mut self, parent: NodeId, node: RenderNode) -> std::result::Result<NodeId, RenderNode> {
        match self.root.find_id_mut(parent) {
            Some(parent) => parent.add(node),
            None => Err(node),
        }
    }

    pub fn find(&self, tag: &str) -> Option<&RenderNode> {
        self.root.find(tag)
    }

    pub fn find_mut(&mut self, tag: &str) -> Option<&mut RenderNode> {
        self.root.find_mut(tag)
    }

    pub fn find_id(&self, id: NodeId) -> Option<&RenderNode> {
        self.root.find_id(id)
    }

    pub fn find_id_mut(&mut self, id: NodeId) -> Option<&mut RenderNode> {
        self.root.find_id_mut(id)
    }

    pub fn erase(&mut self, id: NodeId) -> bool {
        self.root.erase(id)
    }

    /// Drop every node but the root
    pub fn clear(&mut self) {
        self.root.clear();
    }

    /// New, unattached node from the factory registered under `tag`
    pub fn create_node(&self, tag: &str) -> Result<RenderNode> {
        self.registry.create(tag)
    }

    /// Register `factory`; a replaced factory's storage is retired
    pub fn register_factory(&mut self, tag: impl Into<String>, factory: Box<dyn NodeFactory>) {
        if let Some(old) = self.registry.register(tag, factory) {
            if let Some(storage) = old.storage() {
                self.retired.push(storage.clone());
            }
        }
    }

    /// Advance the animation of every node by `dt` seconds
    pub fn animate(&mut self, dt: f32) {
        self.root.walk_mut(&mut |node| node.animate(dt));
    }

    /// Load every registered storage, settling retired ones first
    ///
    /// Retired storages still bound to nodes stay loaded; the rest are released.
    pub fn load_resources(&mut self, device: &mut dyn Device) -> Result<()> {
        self.release_retired(device);
        for storage in &self.retired {
            storage.load(device)?;
        }
        self.registry.load_all(device)
    }

    pub fn release_resources(&mut self, device: &mut dyn Device) {
        for storage in self.retired.drain(..) {
            storage.release(device);
        }
        self.registry.release_all(device);
    }

    fn release_retired(&mut self, device: &mut dyn Device) {
        self.retired.retain(|storage| {
            if Rc::strong_count(storage) > 1 {
                return true;
            }
            storage.release(device);
            false
        });
    }

    /// Pending storages of replaced factories
    pub fn retired_count(&self) -> usize {
        self.retired.len()
    }

    pub fn parent_of(&self, id: NodeId) -> Option<NodeId> {
        self.root.find_id(id).and_then(RenderNode::parent)
    }

    /// Number of nodes below the root
    pub fn node_count(&self) -> usize {
        let mut count = 0;
        self.root.walk(&mut |_| count += 1);
        count - 1
    }

    pub fn depth(&self) -> usize {
        self.root.depth()
    }

    /// Select everything, or deselect everything when a selection exists
    pub fn toggle_select_all(&mut self) {
        if self.root.has_selection() {
            self.root.deselect_all();
        } else {
            self.root.select_all();
        }
    }

    pub fn root(&self) -> &RenderNode {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut RenderNode {
        &mut self.root
    }

    pub fn registry(&self) -> &FactoryRegistry {
        &self.registry
    }

    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    /// Indented one-line-per-node dump of the tree
    pub fn describe(&self) -> String {
        let mut out = String::new();
        describe_node(&self.root, 0, &mut out);
        out
    }
}

impl Default for RenderTree {
    fn default() -> Self {
        Self::new()
    }
}

fn describe_node(node: &RenderNode, indent: usize, out: &mut String) {
    let _ = write!(out, "{:indent$}{} {}", "", node.tag(), node.id(), indent = indent * 2);
    if let Some(model) = node.model() {
        let _ = write!(out, " model={}", model.name);
    }
    let p = node.position();
    if p != Vec3::ZERO {
        let _ = write!(out, " at=({}, {}, {})", p.x, p.y, p.z);
    }
    if !node.is_visible() {
        out.push_str(" hidden");
    }
    if node.is_selected() {
        out.push_str(" selected");
    }
    if node.is_polygon_mode_forced() {
        let _ = write!(out, " mode={:?}", node.polygon_mode());
    }
    out.push('\n');

    for child in node.children() {
        describe_node(child, indent + 1, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_is_not_selectable() {
        let mut tree = RenderTree::new();
        tree.root_mut().select_all();
        assert!(!tree.root().has_selection());
    }

    #[test]
    fn stock_factories_fill_in_for_an_empty_config() {
        let mut tree = RenderTree::new();
        tree.initialize().unwrap();
        assert!(tree.registry().contains(SPIDER));
        assert!(tree.registry().contains(CONE_CUBE));

        let spider = tree.registry().get(SPIDER).unwrap().storage().unwrap().clone();
        tree.initialize().unwrap();
        assert!(Rc::ptr_eq(
            &spider,
            tree.registry().get(SPIDER).unwrap().storage().unwrap()
        ));
    }

    #[test]
    fn describe_indents_children() {
        let mut tree = RenderTree::from_config(SceneConfig::default()).unwrap();
        tree.initialize().unwrap();
        let text = tree.describe();
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].starts_with("root "));
        assert!(lines[1].starts_with("  spider "));
        assert!(lines[2].starts_with("    cone_cube "));
    }
}
