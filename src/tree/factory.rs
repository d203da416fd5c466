use std::collections::HashMap;
use std::rc::Rc;

use super::node::{Behavior, RenderBinding, RenderNode};
use crate::device::Device;
use crate::error::{Result, SceneError};
use crate::model::Model;
use crate::storage::{StorageKind, StorageStrategy};

/// Builds default-configured nodes of one type
pub trait NodeFactory {
    fn tag(&self) -> &str;

    fn create(&self) -> RenderNode;

    /// Strategy shared by every node this factory creates
    fn storage(&self) -> Option<&Rc<dyn StorageStrategy>> {
        None
    }
}

/// Structural nodes without geometry
pub struct GroupFactory {
    tag: String,
}

impl GroupFactory {
    pub fn new(tag: impl Into<String>) -> Self {
        Self { tag: tag.into() }
    }
}

impl NodeFactory for GroupFactory {
    fn tag(&self) -> &str {
        &self.tag
    }

    fn create(&self) -> RenderNode {
        RenderNode::new(self.tag.as_str())
    }
}

/// Nodes bound to one shared model and storage strategy
pub struct ModelFactory {
    tag: String,
    storage: Rc<dyn StorageStrategy>,
    behavior: Behavior,
    selectable: bool,
    persistable: bool,
}

impl ModelFactory {
    /// The strategy is picked here, once, and shared by every created node
    pub fn new(tag: impl Into<String>, model: Rc<Model>, kind: StorageKind) -> Self {
        Self {
            tag: tag.into(),
            storage: kind.instantiate(model),
            behavior: Behavior::Static,
            selectable: true,
            persistable: true,
        }
    }

    pub fn with_behavior(mut self, behavior: Behavior) -> Self {
        self.behavior = behavior;
        self
    }

    pub fn with_selectable(mut self, selectable: bool) -> Self {
        self.selectable = selectable;
        self
    }

    pub fn with_persistable(mut self, persistable: bool) -> Self {
        self.persistable = persistable;
        self
    }

    pub fn model(&self) -> &Rc<Model> {
        self.storage.model()
    }
}

impl NodeFactory for ModelFactory {
    fn tag(&self) -> &str {
        &self.tag
    }

    fn create(&self) -> RenderNode {
        let mut node = RenderNode::new(self.tag.as_str())
            .with_binding(RenderBinding::new(self.storage.clone()))
            .with_behavior(self.behavior);
        node.set_selectable(self.selectable);
        node.set_persistable(self.persistable);
        node
    }

    fn storage(&self) -> Option<&Rc<dyn StorageStrategy>> {
        Some(&self.storage)
    }
}

/// Type tag to factory lookup
#[derive(Default)]
pub struct FactoryRegistry {
    factories: HashMap<String, Box<dyn NodeFactory>>,
}

impl FactoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the factory for `tag`, returning the replaced one
    pub fn register(&mut self, tag: impl Into<String>, factory: Box<dyn NodeFactory>) -> Option<Box<dyn NodeFactory>> {
        let tag = tag.into();
        if factory.tag() != tag {
            log::warn!(
                "factory for `{}` registered under `{}`; created nodes keep their own tag",
                factory.tag(),
                tag
            );
        }
        self.factories.insert(tag, factory)
    }

    /// New node from the factory registered under `tag`
    pub fn create(&self, tag: &str) -> Result<RenderNode> {
        self.factories
            .get(tag)
            .map(|factory| factory.create())
            .ok_or_else(|| SceneError::NoSuchFactory(tag.to_string()))
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.factories.contains_key(tag)
    }

    pub fn get(&self, tag: &str) -> Option<&dyn NodeFactory> {
        self.factories.get(tag).map(Box::as_ref)
    }

    /// Registered tags, sorted
    pub fn tags(&self) -> Vec<&str> {
        let mut tags: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        tags.sort_unstable();
        tags
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Load every factory's storage onto `device`
    pub fn load_all(&self, device: &mut dyn Device) -> Result<()> {
        for tag in self.tags() {
            if let Some(storage) = self.factories.get(tag).and_then(|f| f.storage()) {
                storage.load(device)?;
            }
        }
        Ok(())
    }

    pub fn release_all(&self, device: &mut dyn Device) {
        for factory in self.factories.values() {
            if let Some(storage) = factory.storage() {
                storage.release(device);
            }
        }
    }

    /// Remove every factory, handing them back
    pub fn drain(&mut self) -> Vec<Box<dyn NodeFactory>> {
        self.factories.drain().map(|(_, factory)| factory).collect()
    }
}
