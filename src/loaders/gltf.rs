use anyhow::{Context, Result};
use glam::{Mat4, Vec2, Vec3, Vec4};
use std::path::Path;

use crate::model::{Material, Mesh, Model, ModelNode, TextureHandle};

/// Loads a glTF file as a shared render-tree model
///
/// The node hierarchy is kept as-is (local transforms, not flattened); each
/// triangle primitive becomes one mesh carrying whichever attributes the file
/// provides. Textures are exposed by name only.
pub fn load_model(path: impl AsRef<Path>) -> Result<Model> {
    let path = path.as_ref();
    log::info!("loading glTF model {:?}", path);

    let (gltf, buffers, images) =
        gltf::import(path).context(format!("Failed to load glTF file: {:?}", path))?;

    log::debug!(
        "glTF {:?}: {} nodes, {} meshes, {} materials, {} images",
        path,
        gltf.nodes().count(),
        gltf.meshes().count(),
        gltf.materials().count(),
        images.len()
    );

    let mut materials: Vec<Material> = gltf.materials().map(|m| convert_material(&m)).collect();
    // primitives without a material point past the file's own materials
    let fallback_material = materials.len();
    materials.push(Material::default());

    let name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("gltf")
        .to_string();

    let mut root = ModelNode::new(name.as_str());
    let scene = gltf
        .default_scene()
        .or_else(|| gltf.scenes().next())
        .context(format!("glTF file has no scene: {:?}", path))?;

    for node in scene.nodes() {
        root.children.push(process_node(&node, &buffers, fallback_material)?);
    }

    let mut model = Model::new(name, root, materials);
    for texture in gltf.textures() {
        model
            .textures
            .insert(texture_name(&texture), TextureHandle(texture.index() as u32 + 1));
    }

    log::info!(
        "loaded `{}`: {} meshes, {} triangles",
        model.name,
        model.mesh_count(),
        model.triangle_count()
    );
    Ok(model)
}

/// Recursively converts a glTF node and its children
fn process_node(
    node: &gltf::Node,
    buffers: &[gltf::buffer::Data],
    fallback_material: usize,
) -> Result<ModelNode> {
    let name = node
        .name()
        .map(str::to_string)
        .unwrap_or_else(|| format!("node_{}", node.index()));
    let mut model_node =
        ModelNode::new(name).with_transform(Mat4::from_cols_array_2d(&node.transform().matrix()));

    if let Some(mesh) = node.mesh() {
        process_mesh(&mesh, buffers, fallback_material, &mut model_node.meshes)?;
    }

    for child in node.children() {
        model_node.children.push(process_node(&child, buffers, fallback_material)?);
    }

    Ok(model_node)
}

/// Converts every triangle primitive of a glTF mesh
fn process_mesh(
    mesh: &gltf::Mesh,
    buffers: &[gltf::buffer::Data],
    fallback_material: usize,
    meshes: &mut Vec<Mesh>,
) -> Result<()> {
    for primitive in mesh.primitives() {
        if primitive.mode() != gltf::mesh::Mode::Triangles {
            log::warn!(
                "mesh {:?}: skipping {:?} primitive",
                mesh.name(),
                primitive.mode()
            );
            continue;
        }

        let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(|d| &d.0[..]));

        let positions: Option<Vec<Vec3>> = reader
            .read_positions()
            .map(|p| p.map(Vec3::from_array).collect());
        let normals: Option<Vec<Vec3>> = reader
            .read_normals()
            .map(|n| n.map(Vec3::from_array).collect());
        let colors: Option<Vec<Vec4>> = reader
            .read_colors(0)
            .map(|c| c.into_rgba_f32().map(Vec4::from_array).collect());
        let tex_coords: Option<Vec<Vec2>> = reader
            .read_tex_coords(0)
            .map(|t| t.into_f32().map(Vec2::from_array).collect());

        let vertex_count = positions.as_ref().map_or(0, Vec::len);
        let indices: Vec<u32> = match reader.read_indices() {
            Some(indices) => indices.into_u32().collect(),
            // No indices - treat as triangle list
            None => (0..vertex_count as u32).collect(),
        };

        let faces = indices
            .chunks_exact(3)
            .map(|t| [t[0], t[1], t[2]])
            .collect();

        meshes.push(Mesh {
            faces,
            positions,
            normals,
            colors,
            tex_coords,
            material: primitive.material().index().unwrap_or(fallback_material),
        });
    }

    Ok(())
}

/// Maps PBR factors onto the fixed-function material model
fn convert_material(material: &gltf::Material) -> Material {
    let pbr = material.pbr_metallic_roughness();
    let base = Vec4::from_array(pbr.base_color_factor());
    let gloss = 1.0 - pbr.roughness_factor();
    let [er, eg, eb] = material.emissive_factor();

    let name = material
        .name()
        .map(str::to_string)
        .unwrap_or_else(|| format!("material_{}", material.index().unwrap_or(0)));

    Material {
        name,
        diffuse: base,
        specular: Vec3::splat(gloss).lerp(base.truncate(), pbr.metallic_factor()).extend(1.0),
        ambient: (base.truncate() * 0.2).extend(base.w),
        emission: Vec4::new(er, eg, eb, 1.0),
        shininess: 128.0 * gloss,
        shininess_strength: 1.0,
        wireframe: false,
        two_sided: material.double_sided(),
        texture: pbr.base_color_texture().map(|info| texture_name(&info.texture())),
    }
}

fn texture_name(texture: &gltf::Texture) -> String {
    texture
        .name()
        .or_else(|| texture.source().name())
        .map(str::to_string)
        .unwrap_or_else(|| format!("texture_{}", texture.index()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRIANGLE_GLTF: &str = r#"{
        "asset": { "version": "2.0" },
        "scene": 0,
        "scenes": [ { "nodes": [0] } ],
        "nodes": [ { "name": "tri", "mesh": 0, "translation": [0.0, 2.0, 0.0] } ],
        "meshes": [ { "primitives": [ { "attributes": { "POSITION": 0 } } ] } ],
        "buffers": [ {
            "byteLength": 36,
            "uri": "data:application/octet-stream;base64,AAAAAAAAAAAAAAAAAACAPwAAAAAAAAAAAAAAAAAAgD8AAAAA"
        } ],
        "bufferViews": [ { "buffer": 0, "byteLength": 36 } ],
        "accessors": [ {
            "bufferView": 0,
            "componentType": 5126,
            "count": 3,
            "type": "VEC3",
            "min": [0.0, 0.0, 0.0],
            "max": [1.0, 1.0, 0.0]
        } ]
    }"#;

    #[test]
    fn missing_file_is_an_error() {
        assert!(load_model("does/not/exist.gltf").is_err());
    }

    #[test]
    fn loads_unindexed_triangle_without_normals() {
        let path = std::env::temp_dir().join(format!("render_tree_tri_{}.gltf", std::process::id()));
        std::fs::write(&path, TRIANGLE_GLTF).unwrap();

        let model = load_model(&path).unwrap();
        std::fs::remove_file(&path).ok();

        let node = &model.root.children[0];
        assert_eq!(node.name, "tri");
        assert_eq!(node.transform, Mat4::from_translation(Vec3::new(0.0, 2.0, 0.0)));

        let mesh = &node.meshes[0];
        assert_eq!(mesh.faces, vec![[0, 1, 2]]);
        assert!(mesh.has_positions());
        assert!(!mesh.has_normals());
        assert!(!mesh.has_colors());
        assert_eq!(model.material(mesh).name, "default");
    }
}
