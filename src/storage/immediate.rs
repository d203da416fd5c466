use std::rc::Rc;

use glam::Vec2;

use super::{StorageKind, StorageStrategy};
use crate::device::{Capability, Device, DrawCommand, PolygonMode};
use crate::error::Result;
use crate::model::{Material, Mesh, Model, ModelNode};

/// Draws straight from the CPU-side model every time
///
/// Holds no device state: `load` and `release` do nothing and the strategy is
/// always ready to draw.
pub struct ImmediateStorage {
    model: Rc<Model>,
}

impl ImmediateStorage {
    pub fn new(model: Rc<Model>) -> Self {
        Self { model }
    }
}

impl StorageStrategy for ImmediateStorage {
    fn kind(&self) -> StorageKind {
        StorageKind::Immediate
    }

    fn model(&self) -> &Rc<Model> {
        &self.model
    }

    fn load(&self, _device: &mut dyn Device) -> Result<()> {
        Ok(())
    }

    fn draw(&self, device: &mut dyn Device) {
        draw_model(&self.model, device);
    }

    fn release(&self, _device: &mut dyn Device) {}

    fn is_loaded(&self) -> bool {
        true
    }
}

/// Submit the whole model hierarchy as immediate commands
pub fn draw_model(model: &Model, device: &mut dyn Device) {
    draw_node(model, &model.root, device);
}

fn draw_node(model: &Model, node: &ModelNode, device: &mut dyn Device) {
    device.push_matrix();
    device.mult_matrix(node.transform);

    for mesh in &node.meshes {
        let material = model.material(mesh);
        apply_material(model, &material, device);

        // wireframe materials override the node's mode for this mesh only
        if material.wireframe {
            device.push_attrib();
            device.polygon_mode(PolygonMode::Line);
        }
        draw_mesh(mesh, device);
        if material.wireframe {
            device.pop_attrib();
        }
    }

    for child in &node.children {
        draw_node(model, child, device);
    }

    device.pop_matrix();
}

fn draw_mesh(mesh: &Mesh, device: &mut dyn Device) {
    let has_normals = mesh.has_normals();
    let has_colors = mesh.has_colors();

    device.toggle(Capability::Lighting, has_normals);
    device.toggle(Capability::ColorMaterial, has_colors);

    device.execute(DrawCommand::BeginTriangles);
    for face in &mesh.faces {
        for &index in face {
            let i = index as usize;
            if let Some(color) = mesh.colors.as_ref().and_then(|c| c.get(i)) {
                device.execute(DrawCommand::Color(*color));
            }
            if let Some(normal) = mesh.normals.as_ref().and_then(|n| n.get(i)) {
                device.execute(DrawCommand::Normal(*normal));
            }
            if let Some(uv) = mesh.tex_coords.as_ref().and_then(|t| t.get(i)) {
                // model images have their origin at the top, the device at the bottom
                device.execute(DrawCommand::TexCoord(Vec2::new(uv.x, 1.0 - uv.y)));
            }
            if let Some(position) = mesh.positions.as_ref().and_then(|p| p.get(i)) {
                device.execute(DrawCommand::Vertex(*position));
            }
        }
    }
    device.execute(DrawCommand::End);

    // vertex colors must not leak into the next mesh's material
    if has_colors {
        device.disable(Capability::ColorMaterial);
    }
    if has_normals {
        device.disable(Capability::Lighting);
    }
}

fn apply_material(model: &Model, material: &Material, device: &mut dyn Device) {
    match material.texture.as_deref().and_then(|name| model.texture_handle(name)) {
        Some(handle) => {
            device.enable(Capability::Texture2D);
            device.bind_texture(Some(handle));
        }
        None => {
            device.bind_texture(None);
            device.disable(Capability::Texture2D);
        }
    }

    device.set_material(material.state());
    device.toggle(Capability::CullFace, !material.two_sided);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::CommandRecorder;
    use crate::model::{primitives, TextureHandle};
    use glam::{Vec3, Vec4};

    #[test]
    fn load_and_release_touch_nothing() {
        let storage = ImmediateStorage::new(Rc::new(primitives::cone_cube()));
        let mut recorder = CommandRecorder::new();
        storage.load(&mut recorder).unwrap();
        storage.release(&mut recorder);
        assert!(recorder.commands().is_empty());
        assert!(storage.is_loaded());
    }

    #[test]
    fn flips_v_coordinate() {
        let mesh = Mesh {
            faces: vec![[0, 0, 0]],
            positions: Some(vec![Vec3::ZERO]),
            tex_coords: Some(vec![Vec2::new(0.25, 0.25)]),
            ..Default::default()
        };
        let model = Model::new("m", ModelNode::new("root").with_mesh(mesh), vec![]);
        let mut recorder = CommandRecorder::new();
        draw_model(&model, &mut recorder);

        let uv = recorder.commands().iter().find_map(|c| match c {
            DrawCommand::TexCoord(uv) => Some(*uv),
            _ => None,
        });
        assert_eq!(uv, Some(Vec2::new(0.25, 0.75)));
    }

    #[test]
    fn textured_material_binds_its_handle() {
        let mut material = Material::colored("m", Vec4::ONE);
        material.texture = Some("checker".to_string());
        let mut model = Model::new(
            "m",
            ModelNode::new("root").with_mesh(primitives::box_mesh(Vec3::ONE, 0)),
            vec![material],
        );
        model.textures.insert("checker".to_string(), TextureHandle(9));

        let mut recorder = CommandRecorder::new();
        draw_model(&model, &mut recorder);
        assert_eq!(recorder.enable_count(Capability::Texture2D), 1);
        assert!(recorder
            .commands()
            .contains(&DrawCommand::BindTexture(Some(TextureHandle(9)))));
    }

    #[test]
    fn missing_texture_disables_texturing() {
        let mut material = Material::colored("m", Vec4::ONE);
        material.texture = Some("absent".to_string());
        let model = Model::new(
            "m",
            ModelNode::new("root").with_mesh(primitives::box_mesh(Vec3::ONE, 0)),
            vec![material],
        );

        let mut recorder = CommandRecorder::new();
        draw_model(&model, &mut recorder);
        assert_eq!(recorder.enable_count(Capability::Texture2D), 0);
        assert!(recorder.commands().contains(&DrawCommand::BindTexture(None)));
    }

    #[test]
    fn vertex_color_and_lighting_are_undone_per_mesh() {
        let model = primitives::cone_cube();
        let mut recorder = CommandRecorder::new();
        draw_model(&model, &mut recorder);

        // the cone carries colors, the cube does not
        assert_eq!(recorder.enable_count(Capability::ColorMaterial), 1);
        let last_color_toggle = recorder
            .commands()
            .iter()
            .rev()
            .find(|c| matches!(c, DrawCommand::Enable(Capability::ColorMaterial) | DrawCommand::Disable(Capability::ColorMaterial)));
        assert_eq!(last_color_toggle, Some(&DrawCommand::Disable(Capability::ColorMaterial)));

        let last_lighting_toggle = recorder
            .commands()
            .iter()
            .rev()
            .find(|c| matches!(c, DrawCommand::Enable(Capability::Lighting) | DrawCommand::Disable(Capability::Lighting)));
        assert_eq!(last_lighting_toggle, Some(&DrawCommand::Disable(Capability::Lighting)));
    }

    #[test]
    fn out_of_range_indices_are_skipped() {
        let mesh = Mesh {
            faces: vec![[0, 1, 5]],
            positions: Some(vec![Vec3::ZERO, Vec3::X]),
            ..Default::default()
        };
        let model = Model::new("m", ModelNode::new("root").with_mesh(mesh), vec![Material::default()]);
        let mut recorder = CommandRecorder::new();
        draw_model(&model, &mut recorder);
        assert_eq!(recorder.stats().vertices, 2);
    }

    #[test]
    fn wireframe_and_two_sided_map_to_device_state() {
        let mut material = Material::colored("m", Vec4::ONE);
        material.wireframe = true;
        material.two_sided = true;
        let model = Model::new(
            "m",
            ModelNode::new("root").with_mesh(primitives::box_mesh(Vec3::ONE, 0)),
            vec![material],
        );

        let mut recorder = CommandRecorder::new();
        draw_model(&model, &mut recorder);
        assert!(recorder.commands().contains(&DrawCommand::PolygonMode(PolygonMode::Line)));
        assert!(recorder.commands().contains(&DrawCommand::Disable(Capability::CullFace)));
        assert_eq!(recorder.batch_modes(), &[PolygonMode::Line]);
        assert_eq!(recorder.count(|c| *c == DrawCommand::PushAttrib), 1);
        assert_eq!(recorder.count(|c| *c == DrawCommand::PopAttrib), 1);
        assert_eq!(recorder.current_polygon_mode(), PolygonMode::Fill);
    }

    #[test]
    fn plain_materials_inherit_the_polygon_mode() {
        let mut recorder = CommandRecorder::new();
        recorder.polygon_mode(PolygonMode::Line);
        draw_model(&primitives::cone_cube(), &mut recorder);

        assert_eq!(recorder.count(|c| matches!(c, DrawCommand::PolygonMode(_))), 1);
        assert_eq!(recorder.batch_modes(), &[PolygonMode::Line, PolygonMode::Line]);
    }

    #[test]
    fn model_hierarchy_keeps_stack_balanced() {
        let mut recorder = CommandRecorder::new();
        draw_model(&primitives::spider(), &mut recorder);
        let stats = recorder.stats();
        assert_eq!(stats.pushes, stats.pops);
        assert_eq!(stats.underflows, 0);
        assert!(stats.max_depth >= 3);
    }
}
