//! Immediate-mode device abstraction.
//!
//! Everything the render tree and the storage strategies ask of the GPU goes
//! through [`Device`]: a transform stack, a handful of fixed-function
//! capabilities, material state, per-vertex submission and display lists.
//! Commands are plain data ([`DrawCommand`]) so that a display list is just a
//! recorded sequence of them.

mod display_lists;
mod recorder;
mod wgpu_device;

pub use display_lists::DisplayLists;
pub use recorder::{CommandRecorder, DrawStats};
pub use wgpu_device::{FixedFunction, FrameGeometry, GpuVertex, WgpuDevice};

use glam::{Vec2, Vec3, Vec4};
use serde::{Deserialize, Serialize};

use crate::model::TextureHandle;

/// Fixed-function state that can be toggled on the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Lighting,
    ColorMaterial,
    Texture2D,
    CullFace,
}

/// Rasterization mode for filled primitives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolygonMode {
    #[default]
    Fill,
    Line,
}

impl PolygonMode {
    /// Next mode in the Fill -> Line -> Fill cycle
    pub fn cycled(self) -> Self {
        match self {
            PolygonMode::Fill => PolygonMode::Line,
            PolygonMode::Line => PolygonMode::Fill,
        }
    }
}

/// Material colors as submitted to the device
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaterialState {
    pub diffuse: Vec4,
    pub specular: Vec4,
    pub ambient: Vec4,
    pub emission: Vec4,
    /// Already scaled by the material's shininess strength
    pub shininess: f32,
}

impl Default for MaterialState {
    fn default() -> Self {
        Self {
            diffuse: Vec4::new(0.8, 0.8, 0.8, 1.0),
            specular: Vec4::new(0.0, 0.0, 0.0, 1.0),
            ambient: Vec4::new(0.2, 0.2, 0.2, 1.0),
            emission: Vec4::new(0.0, 0.0, 0.0, 1.0),
            shininess: 0.0,
        }
    }
}

/// Device-resident display list identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListHandle(pub u32);

impl ListHandle {
    /// Sentinel returned when no list could be allocated
    pub const INVALID: ListHandle = ListHandle(0);

    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }
}

/// One immediate-mode device command
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    PushMatrix,
    PopMatrix,
    MultMatrix(glam::Mat4),
    Translate(Vec3),
    Rotate { degrees: f32, axis: Vec3 },
    Enable(Capability),
    Disable(Capability),
    /// `None` unbinds the current texture
    BindTexture(Option<TextureHandle>),
    Material(MaterialState),
    PolygonMode(PolygonMode),
    /// Save the current polygon mode
    PushAttrib,
    /// Restore the polygon mode saved by the matching `PushAttrib`
    PopAttrib,
    /// Starts a triangle batch; every three vertices form a face
    BeginTriangles,
    End,
    Color(Vec4),
    Normal(Vec3),
    TexCoord(Vec2),
    Vertex(Vec3),
    CallList(ListHandle),
}

/// The device-draw collaborator
///
/// Implementors handle [`DrawCommand`]s in `execute` (including replaying
/// `CallList`) and manage display lists. While a list is being compiled,
/// executed commands are captured into it instead of taking effect.
pub trait Device {
    /// Execute (or capture, while compiling a list) one command
    fn execute(&mut self, command: DrawCommand);

    /// Allocate a display list, `ListHandle::INVALID` when exhausted
    fn gen_list(&mut self) -> ListHandle;

    /// Start capturing commands into `handle`
    fn begin_list(&mut self, handle: ListHandle);

    /// Stop capturing and store the compiled list
    fn end_list(&mut self);

    /// Free a display list; unknown handles are ignored
    fn delete_list(&mut self, handle: ListHandle);

    fn push_matrix(&mut self) {
        self.execute(DrawCommand::PushMatrix);
    }

    fn pop_matrix(&mut self) {
        self.execute(DrawCommand::PopMatrix);
    }

    fn mult_matrix(&mut self, matrix: glam::Mat4) {
        self.execute(DrawCommand::MultMatrix(matrix));
    }

    fn translate(&mut self, offset: Vec3) {
        self.execute(DrawCommand::Translate(offset));
    }

    fn rotate(&mut self, degrees: f32, axis: Vec3) {
        self.execute(DrawCommand::Rotate { degrees, axis });
    }

    fn enable(&mut self, capability: Capability) {
        self.execute(DrawCommand::Enable(capability));
    }

    fn disable(&mut self, capability: Capability) {
        self.execute(DrawCommand::Disable(capability));
    }

    /// Enable or disable `capability` depending on `on`
    fn toggle(&mut self, capability: Capability, on: bool) {
        if on {
            self.enable(capability);
        } else {
            self.disable(capability);
        }
    }

    fn bind_texture(&mut self, texture: Option<TextureHandle>) {
        self.execute(DrawCommand::BindTexture(texture));
    }

    fn set_material(&mut self, material: MaterialState) {
        self.execute(DrawCommand::Material(material));
    }

    fn polygon_mode(&mut self, mode: PolygonMode) {
        self.execute(DrawCommand::PolygonMode(mode));
    }

    fn push_attrib(&mut self) {
        self.execute(DrawCommand::PushAttrib);
    }

    fn pop_attrib(&mut self) {
        self.execute(DrawCommand::PopAttrib);
    }

    fn call_list(&mut self, handle: ListHandle) {
        self.execute(DrawCommand::CallList(handle));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn polygon_mode_cycles_between_fill_and_line() {
        assert_eq!(PolygonMode::Fill.cycled(), PolygonMode::Line);
        assert_eq!(PolygonMode::Line.cycled(), PolygonMode::Fill);
    }

    #[test]
    fn invalid_list_handle_is_zero() {
        assert!(!ListHandle::INVALID.is_valid());
        assert!(ListHandle(3).is_valid());
    }

    #[test]
    fn polygon_mode_serializes_snake_case() {
        let json = serde_json::to_string(&PolygonMode::Line).unwrap();
        assert_eq!(json, "\"line\"");
    }
}
