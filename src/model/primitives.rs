//! Procedural models used by the stock scene.

use glam::{Mat4, Vec2, Vec3, Vec4};

use super::{Material, Mesh, Model, ModelNode};

/// Axis-aligned box centered on the origin, flat-shaded with UVs per face
pub fn box_mesh(half_extents: Vec3, material: usize) -> Mesh {
    let h = half_extents;
    // (normal, u axis, v axis) per face
    let faces = [
        (Vec3::X, Vec3::NEG_Z, Vec3::Y),
        (Vec3::NEG_X, Vec3::Z, Vec3::Y),
        (Vec3::Y, Vec3::X, Vec3::NEG_Z),
        (Vec3::NEG_Y, Vec3::X, Vec3::Z),
        (Vec3::Z, Vec3::X, Vec3::Y),
        (Vec3::NEG_Z, Vec3::NEG_X, Vec3::Y),
    ];

    let mut positions = Vec::with_capacity(24);
    let mut normals = Vec::with_capacity(24);
    let mut tex_coords = Vec::with_capacity(24);
    let mut triangles = Vec::with_capacity(12);

    for (normal, u, v) in faces {
        let base = positions.len() as u32;
        for (su, sv) in [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
            let corner = normal + u * su + v * sv;
            positions.push(corner * h);
            normals.push(normal);
            tex_coords.push(Vec2::new((su + 1.0) * 0.5, (sv + 1.0) * 0.5));
        }
        triangles.push([base, base + 1, base + 2]);
        triangles.push([base, base + 2, base + 3]);
    }

    Mesh {
        faces: triangles,
        positions: Some(positions),
        normals: Some(normals),
        colors: None,
        tex_coords: Some(tex_coords),
        material,
    }
}

/// Cone standing on the XZ plane, apex on +Y, with a vertical color ramp
pub fn cone_mesh(radius: f32, height: f32, segments: u32, base: Vec4, tip: Vec4, material: usize) -> Mesh {
    let segments = segments.max(3);
    let apex = Vec3::new(0.0, height, 0.0);
    let slope = radius / height;

    let mut positions = Vec::new();
    let mut normals = Vec::new();
    let mut colors = Vec::new();
    let mut faces = Vec::new();

    for i in 0..segments {
        let a0 = i as f32 / segments as f32 * std::f32::consts::TAU;
        let a1 = (i + 1) as f32 / segments as f32 * std::f32::consts::TAU;
        let p0 = Vec3::new(a0.cos() * radius, 0.0, a0.sin() * radius);
        let p1 = Vec3::new(a1.cos() * radius, 0.0, a1.sin() * radius);
        let n0 = Vec3::new(a0.cos(), slope, a0.sin()).normalize();
        let n1 = Vec3::new(a1.cos(), slope, a1.sin()).normalize();

        // side, wound counter-clockwise seen from outside
        let start = positions.len() as u32;
        positions.extend([p0, apex, p1]);
        normals.extend([n0, (n0 + n1).normalize(), n1]);
        colors.extend([base, tip, base]);
        faces.push([start, start + 1, start + 2]);

        // base cap
        let start = positions.len() as u32;
        positions.extend([Vec3::ZERO, p0, p1]);
        normals.extend([Vec3::NEG_Y; 3]);
        colors.extend([base; 3]);
        faces.push([start, start + 1, start + 2]);
    }

    Mesh {
        faces,
        positions: Some(positions),
        normals: Some(normals),
        colors: Some(colors),
        tex_coords: None,
        material,
    }
}

/// Cube with a cone sitting on its top face
pub fn cone_cube() -> Model {
    let materials = vec![
        Material::colored("cube", Vec4::new(0.2, 0.45, 0.85, 1.0)),
        Material::colored("cone", Vec4::new(0.95, 0.6, 0.1, 1.0)),
    ];

    let cone = ModelNode::new("cone")
        .with_transform(Mat4::from_translation(Vec3::new(0.0, 0.5, 0.0)))
        .with_mesh(cone_mesh(
            0.5,
            1.0,
            24,
            Vec4::new(0.95, 0.6, 0.1, 1.0),
            Vec4::new(1.0, 0.95, 0.4, 1.0),
            1,
        ));

    let root = ModelNode::new("cone_cube")
        .with_mesh(box_mesh(Vec3::splat(0.5), 0))
        .with_child(cone);

    Model::new("cone_cube", root, materials)
}

/// Stylized spider: body and head boxes with eight jointed legs
pub fn spider() -> Model {
    let materials = vec![
        Material::colored("body", Vec4::new(0.25, 0.2, 0.2, 1.0)),
        Material::colored("leg", Vec4::new(0.15, 0.12, 0.1, 1.0)),
    ];

    let mut root = ModelNode::new("spider")
        .with_mesh(box_mesh(Vec3::new(0.6, 0.3, 0.8), 0))
        .with_child(
            ModelNode::new("head")
                .with_transform(Mat4::from_translation(Vec3::new(0.0, 0.05, 1.05)))
                .with_mesh(box_mesh(Vec3::new(0.35, 0.25, 0.3), 0)),
        );

    for side in [-1.0f32, 1.0] {
        for pair in 0..4 {
            let z = 0.6 - pair as f32 * 0.4;
            let splay = (pair as f32 - 1.5) * 0.35;
            let upper = Mat4::from_translation(Vec3::new(side * 0.6, 0.1, z))
                * Mat4::from_rotation_y(side * splay)
                * Mat4::from_rotation_z(side * 0.5);
            let lower = Mat4::from_translation(Vec3::new(side * 0.9, 0.0, 0.0))
                * Mat4::from_rotation_z(side * -1.4);

            let leg = ModelNode::new(format!("leg_{}{}", if side < 0.0 { 'l' } else { 'r' }, pair))
                .with_transform(upper)
                .with_mesh(box_mesh(Vec3::new(0.45, 0.05, 0.05), 1).translated(Vec3::new(side * 0.45, 0.0, 0.0)))
                .with_child(
                    ModelNode::new("tibia")
                        .with_transform(lower)
                        .with_mesh(box_mesh(Vec3::new(0.5, 0.04, 0.04), 1).translated(Vec3::new(side * 0.5, 0.0, 0.0))),
                );
            root = root.with_child(leg);
        }
    }

    Model::new("spider", root, materials)
}

/// Single unlit triangle without normals, mostly useful in tests
pub fn flat_triangle() -> Model {
    let mesh = Mesh {
        faces: vec![[0, 1, 2]],
        positions: Some(vec![Vec3::ZERO, Vec3::X, Vec3::Y]),
        ..Default::default()
    };
    Model::new(
        "flat_triangle",
        ModelNode::new("flat_triangle").with_mesh(mesh),
        vec![Material::default()],
    )
}

/// Look up a builtin model by name
pub fn builtin(name: &str) -> Option<Model> {
    match name {
        "cone_cube" => Some(cone_cube()),
        "spider" => Some(spider()),
        "cube" => {
            let materials = vec![Material::default()];
            Some(Model::new(
                "cube",
                ModelNode::new("cube").with_mesh(box_mesh(Vec3::splat(0.5), 0)),
                materials,
            ))
        }
        "flat_triangle" => Some(flat_triangle()),
        _ => None,
    }
}

impl Mesh {
    /// Same mesh with every position offset by `offset`
    pub fn translated(mut self, offset: Vec3) -> Self {
        if let Some(positions) = &mut self.positions {
            for p in positions.iter_mut() {
                *p += offset;
            }
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn box_has_twelve_triangles_with_all_attributes_but_color() {
        let mesh = box_mesh(Vec3::ONE, 0);
        assert_eq!(mesh.triangle_count(), 12);
        assert!(mesh.has_positions() && mesh.has_normals() && mesh.has_tex_coords());
        assert!(!mesh.has_colors());
    }

    #[test]
    fn box_faces_wind_outward() {
        let mesh = box_mesh(Vec3::ONE, 0);
        let positions = mesh.positions.as_ref().unwrap();
        let normals = mesh.normals.as_ref().unwrap();
        for [a, b, c] in &mesh.faces {
            let (a, b, c) = (*a as usize, *b as usize, *c as usize);
            let geometric = (positions[b] - positions[a]).cross(positions[c] - positions[a]);
            assert!(geometric.dot(normals[a]) > 0.0);
        }
    }

    #[test]
    fn cone_carries_vertex_colors() {
        let mesh = cone_mesh(1.0, 1.0, 8, Vec4::ONE, Vec4::ZERO, 0);
        assert!(mesh.has_colors());
        assert_eq!(mesh.triangle_count(), 16);
    }

    #[test]
    fn builtins_resolve() {
        for name in ["cone_cube", "spider", "cube", "flat_triangle"] {
            assert!(builtin(name).is_some(), "{name} should be builtin");
        }
        assert!(builtin("teapot").is_none());
    }

    #[test]
    fn spider_has_eight_legs() {
        let model = spider();
        let legs = model.root.children.iter().filter(|c| c.name.starts_with("leg_")).count();
        assert_eq!(legs, 8);
    }
}
