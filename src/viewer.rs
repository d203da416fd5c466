use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use winit::{
    application::ApplicationHandler,
    event::*,
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowId},
};

use crate::camera::OrbitCamera;
use crate::device::WgpuDevice;
use crate::frame::FpsCounter;
use crate::tree::RenderTree;

const INITIAL_WINDOW_WIDTH: u32 = 1024;
const INITIAL_WINDOW_HEIGHT: u32 = 768;

struct App {
    tree: RenderTree,
    max_display_lists: Option<usize>,
    window: Option<Arc<Window>>,
    device: Option<WgpuDevice>,
    camera: OrbitCamera,
    last_frame_time: Instant,
    fps: FpsCounter,
}

impl App {
    fn new(tree: RenderTree, max_display_lists: Option<usize>) -> Self {
        Self {
            tree,
            max_display_lists,
            window: None,
            device: None,
            camera: OrbitCamera::new(),
            last_frame_time: Instant::now(),
            fps: FpsCounter::new(),
        }
    }

    fn handle_command_key(&mut self, key: KeyCode) {
        match key {
            KeyCode::Tab => {
                self.tree.toggle_select_all();
                log::info!("selection: {}", self.tree.root().has_selection());
            }
            KeyCode::KeyP => self.tree.root_mut().cycle_polygon_mode(false),
            KeyCode::KeyR => {
                if let Err(e) = self.reinitialize() {
                    log::error!("reinitialize failed: {}", e);
                }
            }
            _ => {}
        }
    }

    fn reinitialize(&mut self) -> Result<()> {
        self.tree.initialize()?;
        if let Some(device) = &mut self.device {
            self.tree.load_resources(device)?;
        }
        Ok(())
    }

    fn redraw(&mut self) {
        let now = Instant::now();
        let delta = now.duration_since(self.last_frame_time).as_secs_f32();
        self.last_frame_time = now;

        if let Some(fps) = self.fps.tick(delta) {
            log::debug!("FPS: {:.1}", fps);
        }
        self.camera.update(delta);
        self.tree.animate(delta);

        if let Some(device) = &mut self.device {
            device.begin_frame();
            self.tree.render(device);
            if let Err(e) = device.present(self.camera.view_projection(device.aspect())) {
                log::error!("Render error: {}", e);
            }
        }
    }

    fn shutdown(&mut self) {
        if let Some(device) = &mut self.device {
            self.tree.release_resources(device);
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let window = match event_loop.create_window(
            Window::default_attributes()
                .with_title("Render Tree")
                .with_inner_size(winit::dpi::LogicalSize::new(
                    INITIAL_WINDOW_WIDTH,
                    INITIAL_WINDOW_HEIGHT,
                )),
        ) {
            Ok(w) => Arc::new(w),
            Err(e) => {
                log::error!("Failed to create window: {}", e);
                event_loop.exit();
                return;
            }
        };

        let mut device = match pollster::block_on(WgpuDevice::new(window.clone(), self.max_display_lists)) {
            Ok(device) => device,
            Err(e) => {
                log::error!("Failed to initialize device: {:#}", e);
                event_loop.exit();
                return;
            }
        };

        if let Err(e) = self.tree.load_resources(&mut device) {
            log::error!("Failed to load scene resources: {}", e);
            event_loop.exit();
            return;
        }

        self.window = Some(window);
        self.device = Some(device);
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested
            | WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        state: ElementState::Pressed,
                        physical_key: PhysicalKey::Code(KeyCode::Escape),
                        ..
                    },
                ..
            } => {
                self.shutdown();
                event_loop.exit();
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if let (ElementState::Pressed, false, PhysicalKey::Code(key)) =
                    (event.state, event.repeat, event.physical_key)
                {
                    self.handle_command_key(key);
                }
                self.camera.process_keyboard(&event);
            }
            WindowEvent::Resized(size) => {
                if let Some(device) = &mut self.device {
                    device.resize(size.width, size.height);
                }
            }
            WindowEvent::RedrawRequested => self.redraw(),
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}

/// Open a window and run the scene until it is closed
pub fn run(tree: RenderTree, max_display_lists: Option<usize>) -> Result<()> {
    let event_loop = EventLoop::new()?;
    let mut app = App::new(tree, max_display_lists);

    log::info!("controls: WASD orbit, Q/E zoom, arrows pan, Tab select, P polygon mode, R reset, Esc quit");
    event_loop.run_app(&mut app)?;

    Ok(())
}
