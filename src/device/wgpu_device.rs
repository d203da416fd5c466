use std::sync::Arc;

use anyhow::{Context, Result};
use glam::{Mat3, Mat4, Vec3, Vec4};
use wgpu::util::DeviceExt;
use winit::window::Window;

use super::{Capability, Device, DisplayLists, DrawCommand, ListHandle, MaterialState, PolygonMode};
use crate::model::TextureHandle;

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
const CLEAR_COLOR: wgpu::Color = wgpu::Color {
    r: 0.08,
    g: 0.09,
    b: 0.12,
    a: 1.0,
};

/// Vertex as uploaded to the GPU, already in world space
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GpuVertex {
    position: [f32; 3],
    /// 1.0 when lighting applies to this vertex
    lit: f32,
    normal: [f32; 3],
    _pad: f32,
    color: [f32; 4],
}

impl GpuVertex {
    const ATTRIBUTES: [wgpu::VertexAttribute; 4] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32, 2 => Float32x3, 3 => Float32x4];

    fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<GpuVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

/// Uniform buffer data for GPU
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct SceneUniform {
    view_proj: [[f32; 4]; 4],
    light_dir: [f32; 4],
}

/// Geometry collected during one frame
#[derive(Debug, Default)]
pub struct FrameGeometry {
    pub culled: Vec<GpuVertex>,
    pub two_sided: Vec<GpuVertex>,
    pub lines: Vec<GpuVertex>,
}

impl FrameGeometry {
    pub fn triangle_count(&self) -> usize {
        (self.culled.len() + self.two_sided.len()) / 3
    }

    fn clear(&mut self) {
        self.culled.clear();
        self.two_sided.clear();
        self.lines.clear();
    }
}

/// CPU emulation of the fixed-function pipeline
///
/// Keeps the transform stack, capabilities and material state, and turns
/// immediate-mode vertices into world-space triangle and line lists.
#[derive(Debug)]
pub struct FixedFunction {
    stack: Vec<Mat4>,
    current: Mat4,
    normal_matrix: Mat3,
    lighting: bool,
    color_material: bool,
    texture_2d: bool,
    cull_face: bool,
    texture: Option<TextureHandle>,
    material: MaterialState,
    polygon_mode: PolygonMode,
    attrib_stack: Vec<PolygonMode>,
    color: Vec4,
    normal: Vec3,
    batch: Option<Vec<GpuVertex>>,
    lists: DisplayLists,
    geometry: FrameGeometry,
}

impl FixedFunction {
    pub fn new(max_display_lists: Option<usize>) -> Self {
        Self {
            stack: Vec::new(),
            current: Mat4::IDENTITY,
            normal_matrix: Mat3::IDENTITY,
            lighting: false,
            color_material: false,
            texture_2d: false,
            cull_face: false,
            texture: None,
            material: MaterialState::default(),
            polygon_mode: PolygonMode::Fill,
            attrib_stack: Vec::new(),
            color: Vec4::ONE,
            normal: Vec3::Z,
            batch: None,
            lists: DisplayLists::with_capacity(max_display_lists),
            geometry: FrameGeometry::default(),
        }
    }

    /// Reset per-frame state; compiled display lists survive
    pub fn begin_frame(&mut self) {
        if !self.stack.is_empty() {
            log::warn!("{} matrices left on the stack at end of frame", self.stack.len());
        }
        self.stack.clear();
        self.attrib_stack.clear();
        self.current = Mat4::IDENTITY;
        self.normal_matrix = Mat3::IDENTITY;
        self.batch = None;
        self.geometry.clear();
    }

    pub fn geometry(&self) -> &FrameGeometry {
        &self.geometry
    }

    pub fn current_matrix(&self) -> Mat4 {
        self.current
    }

    pub fn bound_texture(&self) -> Option<TextureHandle> {
        if self.texture_2d {
            self.texture
        } else {
            None
        }
    }

    pub fn lists(&self) -> &DisplayLists {
        &self.lists
    }

    fn set_current(&mut self, matrix: Mat4) {
        self.current = matrix;
        self.normal_matrix = Mat3::from_mat4(matrix).inverse().transpose();
    }

    fn set_capability(&mut self, capability: Capability, on: bool) {
        match capability {
            Capability::Lighting => self.lighting = on,
            Capability::ColorMaterial => self.color_material = on,
            Capability::Texture2D => self.texture_2d = on,
            Capability::CullFace => self.cull_face = on,
        }
    }

    fn vertex(&mut self, position: Vec3) {
        let color = if self.lighting && !self.color_material {
            self.material.diffuse
        } else {
            self.color
        };
        let vertex = GpuVertex {
            position: self.current.transform_point3(position).to_array(),
            lit: if self.lighting { 1.0 } else { 0.0 },
            normal: (self.normal_matrix * self.normal).normalize_or_zero().to_array(),
            _pad: 0.0,
            color: color.to_array(),
        };
        match &mut self.batch {
            Some(batch) => batch.push(vertex),
            None => log::warn!("vertex submitted outside of a triangle batch"),
        }
    }

    fn end_batch(&mut self) {
        let Some(batch) = self.batch.take() else {
            return;
        };
        let triangles = batch.chunks_exact(3);

        match self.polygon_mode {
            PolygonMode::Line => {
                for t in triangles {
                    self.geometry.lines.extend([t[0], t[1], t[1], t[2], t[2], t[0]]);
                }
            }
            PolygonMode::Fill => {
                let target = if self.cull_face {
                    &mut self.geometry.culled
                } else {
                    &mut self.geometry.two_sided
                };
                for t in triangles {
                    target.extend_from_slice(t);
                }
            }
        }
    }
}

impl Device for FixedFunction {
    fn execute(&mut self, command: DrawCommand) {
        let Some(command) = self.lists.capture(command) else {
            return;
        };

        match command {
            DrawCommand::PushMatrix => self.stack.push(self.current),
            DrawCommand::PopMatrix => match self.stack.pop() {
                Some(matrix) => self.set_current(matrix),
                None => log::warn!("transform stack underflow"),
            },
            DrawCommand::MultMatrix(matrix) => self.set_current(self.current * matrix),
            DrawCommand::Translate(offset) => self.set_current(self.current * Mat4::from_translation(offset)),
            DrawCommand::Rotate { degrees, axis } => {
                let axis = axis.normalize_or(Vec3::Y);
                self.set_current(self.current * Mat4::from_axis_angle(axis, degrees.to_radians()));
            }
            DrawCommand::Enable(capability) => self.set_capability(capability, true),
            DrawCommand::Disable(capability) => self.set_capability(capability, false),
            DrawCommand::BindTexture(texture) => self.texture = texture,
            DrawCommand::Material(material) => self.material = material,
            DrawCommand::PolygonMode(mode) => self.polygon_mode = mode,
            DrawCommand::PushAttrib => self.attrib_stack.push(self.polygon_mode),
            DrawCommand::PopAttrib => match self.attrib_stack.pop() {
                Some(mode) => self.polygon_mode = mode,
                None => log::warn!("attribute stack underflow"),
            },
            DrawCommand::BeginTriangles => self.batch = Some(Vec::new()),
            DrawCommand::End => self.end_batch(),
            DrawCommand::Color(color) => self.color = color,
            DrawCommand::Normal(normal) => self.normal = normal,
            // texture sampling is not emulated
            DrawCommand::TexCoord(_) => {}
            DrawCommand::Vertex(position) => self.vertex(position),
            DrawCommand::CallList(handle) => {
                if let Some(commands) = self.lists.commands(handle) {
                    for command in commands.iter() {
                        self.execute(command.clone());
                    }
                }
            }
        }
    }

    fn gen_list(&mut self) -> ListHandle {
        self.lists.generate()
    }

    fn begin_list(&mut self, handle: ListHandle) {
        self.lists.begin(handle);
    }

    fn end_list(&mut self) {
        self.lists.end();
    }

    fn delete_list(&mut self, handle: ListHandle) {
        self.lists.delete(handle);
    }
}

/// Windowed device drawing the emulated pipeline's output with wgpu
pub struct WgpuDevice {
    device: wgpu::Device,
    queue: wgpu::Queue,
    surface: wgpu::Surface<'static>,
    surface_config: wgpu::SurfaceConfiguration,
    depth_view: wgpu::TextureView,
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    culled_pipeline: wgpu::RenderPipeline,
    two_sided_pipeline: wgpu::RenderPipeline,
    line_pipeline: wgpu::RenderPipeline,
    state: FixedFunction,
    light_dir: Vec3,
}

impl WgpuDevice {
    pub async fn new(window: Arc<Window>, max_display_lists: Option<usize>) -> Result<Self> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let surface = instance.create_surface(window).context("Failed to create surface")?;
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("Failed to find appropriate adapter")?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("Render Tree Device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: Default::default(),
                experimental_features: Default::default(),
                trace: Default::default(),
            })
            .await
            .context("Failed to create device")?;

        let surface_config = Self::create_surface_config(&surface, &adapter, size.width, size.height);
        surface.configure(&device, &surface_config);

        let depth_view = Self::create_depth_view(&device, surface_config.width, surface_config.height);

        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Scene Uniforms"),
            contents: bytemuck::cast_slice(&[SceneUniform {
                view_proj: Mat4::IDENTITY.to_cols_array_2d(),
                light_dir: [0.0; 4],
            }]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Scene Bind Group Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Scene Bind Group"),
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Scene Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("scene.wgsl").into()),
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Scene Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let format = surface_config.format;
        let culled_pipeline = Self::create_pipeline(
            &device,
            &pipeline_layout,
            &shader,
            format,
            wgpu::PrimitiveTopology::TriangleList,
            Some(wgpu::Face::Back),
        );
        let two_sided_pipeline = Self::create_pipeline(
            &device,
            &pipeline_layout,
            &shader,
            format,
            wgpu::PrimitiveTopology::TriangleList,
            None,
        );
        let line_pipeline = Self::create_pipeline(
            &device,
            &pipeline_layout,
            &shader,
            format,
            wgpu::PrimitiveTopology::LineList,
            None,
        );

        log::info!(
            "wgpu device ready: {:?} {}x{}",
            adapter.get_info().backend,
            surface_config.width,
            surface_config.height
        );

        Ok(Self {
            device,
            queue,
            surface,
            surface_config,
            depth_view,
            uniform_buffer,
            bind_group,
            culled_pipeline,
            two_sided_pipeline,
            line_pipeline,
            state: FixedFunction::new(max_display_lists),
            light_dir: Vec3::new(-0.4, -1.0, -0.6),
        })
    }

    fn create_surface_config(
        surface: &wgpu::Surface,
        adapter: &wgpu::Adapter,
        width: u32,
        height: u32,
    ) -> wgpu::SurfaceConfiguration {
        let surface_caps = surface.get_capabilities(adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .unwrap_or(surface_caps.formats[0]);

        wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: width.max(1),
            height: height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        }
    }

    fn create_depth_view(device: &wgpu::Device, width: u32, height: u32) -> wgpu::TextureView {
        device
            .create_texture(&wgpu::TextureDescriptor {
                label: Some("Depth Texture"),
                size: wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: DEPTH_FORMAT,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
                view_formats: &[],
            })
            .create_view(&wgpu::TextureViewDescriptor::default())
    }

    fn create_pipeline(
        device: &wgpu::Device,
        layout: &wgpu::PipelineLayout,
        shader: &wgpu::ShaderModule,
        format: wgpu::TextureFormat,
        topology: wgpu::PrimitiveTopology,
        cull_mode: Option<wgpu::Face>,
    ) -> wgpu::RenderPipeline {
        device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Scene Pipeline"),
            layout: Some(layout),
            vertex: wgpu::VertexState {
                module: shader,
                entry_point: Some("vs_main"),
                buffers: &[GpuVertex::layout()],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        })
    }

    /// Start collecting a new frame
    pub fn begin_frame(&mut self) {
        self.state.begin_frame();
    }

    /// Draw everything collected since `begin_frame` and present it
    pub fn present(&mut self, view_proj: Mat4) -> Result<()> {
        let output = match self.surface.get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.surface.configure(&self.device, &self.surface_config);
                return Ok(());
            }
            Err(e) => return Err(e).context("Failed to acquire surface texture"),
        };
        let view = output.texture.create_view(&wgpu::TextureViewDescriptor::default());

        self.queue.write_buffer(
            &self.uniform_buffer,
            0,
            bytemuck::cast_slice(&[SceneUniform {
                view_proj: view_proj.to_cols_array_2d(),
                light_dir: self.light_dir.extend(0.0).to_array(),
            }]),
        );

        let geometry = self.state.geometry();
        let batches = [
            (&self.culled_pipeline, self.vertex_buffer("Culled Triangles", &geometry.culled)),
            (&self.two_sided_pipeline, self.vertex_buffer("Two-Sided Triangles", &geometry.two_sided)),
            (&self.line_pipeline, self.vertex_buffer("Lines", &geometry.lines)),
        ];

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Scene Encoder"),
        });

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Scene Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(CLEAR_COLOR),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            render_pass.set_bind_group(0, &self.bind_group, &[]);
            for (pipeline, batch) in &batches {
                if let Some((buffer, count)) = batch {
                    render_pass.set_pipeline(pipeline);
                    render_pass.set_vertex_buffer(0, buffer.slice(..));
                    render_pass.draw(0..*count, 0..1);
                }
            }
        }

        self.queue.submit(Some(encoder.finish()));
        output.present();
        Ok(())
    }

    fn vertex_buffer(&self, label: &str, vertices: &[GpuVertex]) -> Option<(wgpu::Buffer, u32)> {
        if vertices.is_empty() {
            return None;
        }
        let buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents: bytemuck::cast_slice(vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        Some((buffer, vertices.len() as u32))
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.surface_config.width = width;
        self.surface_config.height = height;
        self.surface.configure(&self.device, &self.surface_config);
        self.depth_view = Self::create_depth_view(&self.device, width, height);
    }

    pub fn aspect(&self) -> f32 {
        self.surface_config.width as f32 / self.surface_config.height as f32
    }

    /// Triangles collected for the current frame
    pub fn triangle_count(&self) -> usize {
        self.state.geometry().triangle_count()
    }
}

impl Device for WgpuDevice {
    fn execute(&mut self, command: DrawCommand) {
        self.state.execute(command);
    }

    fn gen_list(&mut self) -> ListHandle {
        self.state.gen_list()
    }

    fn begin_list(&mut self, handle: ListHandle) {
        self.state.begin_list(handle);
    }

    fn end_list(&mut self) {
        self.state.end_list();
    }

    fn delete_list(&mut self, handle: ListHandle) {
        self.state.delete_list(handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle(device: &mut FixedFunction) {
        device.execute(DrawCommand::BeginTriangles);
        device.execute(DrawCommand::Vertex(Vec3::ZERO));
        device.execute(DrawCommand::Vertex(Vec3::X));
        device.execute(DrawCommand::Vertex(Vec3::Y));
        device.execute(DrawCommand::End);
    }

    #[test]
    fn gpu_vertex_is_tightly_packed() {
        assert_eq!(std::mem::size_of::<GpuVertex>(), 48);
    }

    #[test]
    fn vertices_are_transformed_to_world_space() {
        let mut device = FixedFunction::new(None);
        device.push_matrix();
        device.translate(Vec3::new(0.0, 0.0, 5.0));
        triangle(&mut device);
        device.pop_matrix();

        let first = device.geometry().two_sided[0];
        assert_eq!(first.position, [0.0, 0.0, 5.0]);
        assert_eq!(device.current_matrix(), Mat4::IDENTITY);
    }

    #[test]
    fn cull_face_routes_to_culled_batch() {
        let mut device = FixedFunction::new(None);
        device.enable(Capability::CullFace);
        triangle(&mut device);
        device.disable(Capability::CullFace);
        triangle(&mut device);

        assert_eq!(device.geometry().culled.len(), 3);
        assert_eq!(device.geometry().two_sided.len(), 3);
    }

    #[test]
    fn line_mode_emits_edges() {
        let mut device = FixedFunction::new(None);
        device.polygon_mode(PolygonMode::Line);
        triangle(&mut device);
        assert_eq!(device.geometry().lines.len(), 6);
        assert_eq!(device.geometry().triangle_count(), 0);
    }

    #[test]
    fn pop_attrib_restores_line_mode() {
        let mut device = FixedFunction::new(None);
        device.polygon_mode(PolygonMode::Line);
        device.push_attrib();
        device.polygon_mode(PolygonMode::Fill);
        triangle(&mut device);
        device.pop_attrib();
        triangle(&mut device);

        assert_eq!(device.geometry().triangle_count(), 1);
        assert_eq!(device.geometry().lines.len(), 6);
    }

    #[test]
    fn lit_vertices_take_material_color_unless_color_material() {
        let mut device = FixedFunction::new(None);
        let material = MaterialState {
            diffuse: Vec4::new(1.0, 0.0, 0.0, 1.0),
            ..MaterialState::default()
        };
        device.set_material(material);
        device.execute(DrawCommand::Color(Vec4::new(0.0, 1.0, 0.0, 1.0)));

        device.enable(Capability::Lighting);
        triangle(&mut device);
        device.enable(Capability::ColorMaterial);
        triangle(&mut device);

        let vertices = &device.geometry().two_sided;
        assert_eq!(vertices[0].color, [1.0, 0.0, 0.0, 1.0]);
        assert_eq!(vertices[0].lit, 1.0);
        assert_eq!(vertices[3].color, [0.0, 1.0, 0.0, 1.0]);
    }

    #[test]
    fn display_lists_replay_and_survive_frames() {
        let mut device = FixedFunction::new(None);
        let handle = device.gen_list();
        device.begin_list(handle);
        triangle(&mut device);
        device.end_list();
        assert_eq!(device.geometry().triangle_count(), 0);

        device.call_list(handle);
        device.begin_frame();
        device.call_list(handle);
        assert_eq!(device.geometry().triangle_count(), 1);
    }

    #[test]
    fn texture_binding_is_tracked_only_when_enabled() {
        let mut device = FixedFunction::new(None);
        device.bind_texture(Some(TextureHandle(2)));
        assert_eq!(device.bound_texture(), None);
        device.enable(Capability::Texture2D);
        assert_eq!(device.bound_texture(), Some(TextureHandle(2)));
    }
}
