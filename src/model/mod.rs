//! Shared, immutable 3D models
//!
//! A [`Model`] has its own transform hierarchy ([`ModelNode`]), independent of
//! the render tree. Meshes may lack any subset of their attribute arrays, so
//! every array is an `Option`.

pub mod primitives;

use std::collections::HashMap;

use glam::{Mat4, Vec2, Vec3, Vec4};

use crate::device::MaterialState;

/// Device texture identifier as exposed by a model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub u32);

/// Surface description referenced by meshes
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub name: String,
    pub diffuse: Vec4,
    pub specular: Vec4,
    pub ambient: Vec4,
    pub emission: Vec4,
    pub shininess: f32,
    pub shininess_strength: f32,
    pub wireframe: bool,
    pub two_sided: bool,
    /// Name of the texture in the owning model, if any
    pub texture: Option<String>,
}

impl Material {
    /// Plain colored material with sensible lighting defaults
    pub fn colored(name: impl Into<String>, diffuse: Vec4) -> Self {
        Self {
            name: name.into(),
            diffuse,
            specular: Vec4::new(0.3, 0.3, 0.3, 1.0),
            ambient: diffuse * 0.25,
            emission: Vec4::new(0.0, 0.0, 0.0, 1.0),
            shininess: 32.0,
            shininess_strength: 1.0,
            wireframe: false,
            two_sided: false,
            texture: None,
        }
    }

    /// Device state for this material; shininess is scaled by its strength
    pub fn state(&self) -> MaterialState {
        MaterialState {
            diffuse: self.diffuse,
            specular: self.specular,
            ambient: self.ambient,
            emission: self.emission,
            shininess: self.shininess * self.shininess_strength,
        }
    }
}

impl Default for Material {
    fn default() -> Self {
        Self::colored("default", Vec4::new(0.8, 0.8, 0.8, 1.0))
    }
}

/// Triangle mesh with optional per-vertex attributes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    pub faces: Vec<[u32; 3]>,
    pub positions: Option<Vec<Vec3>>,
    pub normals: Option<Vec<Vec3>>,
    pub colors: Option<Vec<Vec4>>,
    pub tex_coords: Option<Vec<Vec2>>,
    /// Index into the owning model's materials
    pub material: usize,
}

impl Mesh {
    pub fn has_positions(&self) -> bool {
        self.positions.is_some()
    }

    pub fn has_normals(&self) -> bool {
        self.normals.is_some()
    }

    pub fn has_colors(&self) -> bool {
        self.colors.is_some()
    }

    pub fn has_tex_coords(&self) -> bool {
        self.tex_coords.is_some()
    }

    pub fn triangle_count(&self) -> usize {
        self.faces.len()
    }
}

/// Node of a model's internal hierarchy
#[derive(Debug, Clone, PartialEq)]
pub struct ModelNode {
    pub name: String,
    pub transform: Mat4,
    pub meshes: Vec<Mesh>,
    pub children: Vec<ModelNode>,
}

impl ModelNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transform: Mat4::IDENTITY,
            meshes: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn with_transform(mut self, transform: Mat4) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_mesh(mut self, mesh: Mesh) -> Self {
        self.meshes.push(mesh);
        self
    }

    pub fn with_child(mut self, child: ModelNode) -> Self {
        self.children.push(child);
        self
    }

    fn visit<'a>(&'a self, f: &mut impl FnMut(&'a ModelNode)) {
        f(self);
        for child in &self.children {
            child.visit(f);
        }
    }
}

/// Immutable model shared by every render node of one type
#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    pub name: String,
    pub root: ModelNode,
    pub materials: Vec<Material>,
    pub textures: HashMap<String, TextureHandle>,
}

impl Model {
    pub fn new(name: impl Into<String>, root: ModelNode, materials: Vec<Material>) -> Self {
        Self {
            name: name.into(),
            root,
            materials,
            textures: HashMap::new(),
        }
    }

    /// Material of `mesh`, falling back to a default when the index is dangling
    pub fn material(&self, mesh: &Mesh) -> std::borrow::Cow<'_, Material> {
        match self.materials.get(mesh.material) {
            Some(material) => std::borrow::Cow::Borrowed(material),
            None => {
                log::warn!(
                    "model `{}`: mesh references missing material {}",
                    self.name,
                    mesh.material
                );
                std::borrow::Cow::Owned(Material::default())
            }
        }
    }

    pub fn has_texture(&self, name: &str) -> bool {
        self.textures.contains_key(name)
    }

    pub fn texture_handle(&self, name: &str) -> Option<TextureHandle> {
        self.textures.get(name).copied()
    }

    /// Total meshes across the whole hierarchy
    pub fn mesh_count(&self) -> usize {
        let mut count = 0;
        self.root.visit(&mut |node| count += node.meshes.len());
        count
    }

    /// Total triangles across the whole hierarchy
    pub fn triangle_count(&self) -> usize {
        let mut count = 0;
        self.root
            .visit(&mut |node| count += node.meshes.iter().map(Mesh::triangle_count).sum::<usize>());
        count
    }
}
