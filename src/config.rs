//! Scene configuration: which factories exist and what `initialize` builds.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::device::PolygonMode;
use crate::storage::StorageKind;
use crate::tree::{Behavior, CONE_CUBE, CONE_CUBE_SPIN, SPIDER};

/// Where a factory's model comes from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelSource {
    /// Grouping nodes, no geometry
    #[default]
    None,
    Builtin { name: String },
    Gltf { path: PathBuf },
}

/// Animation assigned to every node of a factory
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BehaviorConfig {
    #[default]
    Static,
    Spin { axis: [f32; 3], degrees_per_second: f32 },
}

impl BehaviorConfig {
    pub fn to_behavior(self) -> Behavior {
        match self {
            BehaviorConfig::Static => Behavior::Static,
            BehaviorConfig::Spin {
                axis,
                degrees_per_second,
            } => Behavior::spin(Vec3::from_array(axis).normalize_or(Vec3::Y), degrees_per_second),
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactoryConfig {
    pub tag: String,
    #[serde(default)]
    pub model: ModelSource,
    #[serde(default)]
    pub behavior: BehaviorConfig,
    #[serde(default = "default_true")]
    pub selectable: bool,
    #[serde(default = "default_true")]
    pub persistable: bool,
    /// Overrides the scene-wide storage strategy for this factory
    #[serde(default)]
    pub storage: Option<StorageKind>,
}

impl FactoryConfig {
    pub fn group(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            model: ModelSource::None,
            behavior: BehaviorConfig::Static,
            selectable: true,
            persistable: true,
            storage: None,
        }
    }

    pub fn builtin(tag: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            model: ModelSource::Builtin { name: name.into() },
            ..Self::group(tag)
        }
    }
}

/// One node of the hierarchy built by `initialize`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutNode {
    pub tag: String,
    #[serde(default)]
    pub position: [f32; 3],
    #[serde(default = "default_true")]
    pub visible: bool,
    #[serde(default)]
    pub children: Vec<LayoutNode>,
}

impl LayoutNode {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            position: [0.0; 3],
            visible: true,
            children: Vec::new(),
        }
    }

    pub fn at(mut self, position: [f32; 3]) -> Self {
        self.position = position;
        self
    }

    pub fn with_child(mut self, child: LayoutNode) -> Self {
        self.children.push(child);
        self
    }
}

/// Stock hierarchy: a spider carrying a cone-cube
pub fn default_layout() -> Vec<LayoutNode> {
    vec![LayoutNode::new(SPIDER).with_child(LayoutNode::new(CONE_CUBE).at([0.0, 0.8, 0.0]))]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// Strategy for factories that do not pick their own
    pub storage: StorageKind,
    /// Cap on live display lists, unbounded when absent
    pub max_display_lists: Option<usize>,
    pub default_polygon_mode: PolygonMode,
    pub factories: Vec<FactoryConfig>,
    /// Empty means the stock layout
    pub layout: Vec<LayoutNode>,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            storage: StorageKind::CommandList,
            max_display_lists: None,
            default_polygon_mode: PolygonMode::Fill,
            factories: vec![
                FactoryConfig::builtin(SPIDER, "spider"),
                FactoryConfig {
                    behavior: BehaviorConfig::Spin {
                        axis: [0.0, 1.0, 0.0],
                        degrees_per_second: CONE_CUBE_SPIN,
                    },
                    ..FactoryConfig::builtin(CONE_CUBE, "cone_cube")
                },
                FactoryConfig::builtin("cube", "cube"),
                FactoryConfig::group("group"),
            ],
            layout: default_layout(),
        }
    }
}

impl SceneConfig {
    /// Config with no factories and no layout
    pub fn empty() -> Self {
        Self {
            factories: Vec::new(),
            layout: Vec::new(),
            ..Self::default()
        }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .context(format!("Failed to read scene config: {:?}", path))?;
        Self::from_json(&text).context(format!("Failed to parse scene config: {:?}", path))
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, self.to_json()?)
            .context(format!("Failed to write scene config: {:?}", path))
    }

    pub fn factory(&self, tag: &str) -> Option<&FactoryConfig> {
        self.factories.iter().find(|f| f.tag == tag)
    }
}
