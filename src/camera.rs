use glam::{Mat4, Vec3};
use winit::event::KeyEvent;
use winit::keyboard::{KeyCode, PhysicalKey};

pub const ORBIT_SPEED: f32 = 1.5;
pub const ZOOM_SPEED: f32 = 4.0;
pub const PAN_SPEED: f32 = 2.0;
pub const MIN_DISTANCE: f32 = 1.0;
pub const MAX_DISTANCE: f32 = 60.0;
const MAX_PITCH: f32 = 1.5;

#[derive(Default, Clone, Copy)]
pub struct MovementState {
    pub orbit_left: bool,
    pub orbit_right: bool,
    pub orbit_up: bool,
    pub orbit_down: bool,
    pub zoom_in: bool,
    pub zoom_out: bool,
    pub pan_left: bool,
    pub pan_right: bool,
    pub pan_up: bool,
    pub pan_down: bool,
}

impl MovementState {
    const fn to_direction(&self, positive: bool, negative: bool) -> f32 {
        match (positive, negative) {
            (true, false) => 1.0,
            (false, true) => -1.0,
            _ => 0.0,
        }
    }

    /// (yaw, pitch) directions
    const fn orbit(&self) -> (f32, f32) {
        (
            self.to_direction(self.orbit_right, self.orbit_left),
            self.to_direction(self.orbit_up, self.orbit_down),
        )
    }

    const fn zoom(&self) -> f32 {
        self.to_direction(self.zoom_out, self.zoom_in)
    }

    const fn pan(&self) -> (f32, f32) {
        (
            self.to_direction(self.pan_right, self.pan_left),
            self.to_direction(self.pan_up, self.pan_down),
        )
    }
}

/// Camera orbiting a target point
pub struct OrbitCamera {
    pub target: Vec3,
    pub distance: f32,
    pub yaw: f32,
    pub pitch: f32,
    pub fov_y: f32,
    pub movement: MovementState,
}

impl OrbitCamera {
    pub fn new() -> Self {
        Self {
            target: Vec3::new(0.0, 0.5, 0.0),
            distance: 8.0,
            yaw: 0.6,
            pitch: 0.45,
            fov_y: 45f32.to_radians(),
            movement: MovementState::default(),
        }
    }

    pub fn eye(&self) -> Vec3 {
        let offset = Vec3::new(
            self.yaw.sin() * self.pitch.cos(),
            self.pitch.sin(),
            self.yaw.cos() * self.pitch.cos(),
        );
        self.target + offset * self.distance
    }

    pub fn right(&self) -> Vec3 {
        (self.target - self.eye()).cross(Vec3::Y).normalize_or_zero()
    }

    /// Advance by `dt` seconds of held keys
    pub fn update(&mut self, dt: f32) {
        let (yaw, pitch) = self.movement.orbit();
        self.yaw += yaw * ORBIT_SPEED * dt;
        self.pitch = (self.pitch + pitch * ORBIT_SPEED * dt).clamp(-MAX_PITCH, MAX_PITCH);

        self.distance = (self.distance + self.movement.zoom() * ZOOM_SPEED * dt).clamp(MIN_DISTANCE, MAX_DISTANCE);

        let (right, up) = self.movement.pan();
        self.target += (self.right() * right + Vec3::Y * up) * PAN_SPEED * dt;
    }

    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye(), self.target, Vec3::Y)
    }

    pub fn projection(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh(self.fov_y, aspect.max(0.01), 0.1, 500.0)
    }

    pub fn view_projection(&self, aspect: f32) -> Mat4 {
        self.projection(aspect) * self.view()
    }

    pub fn process_keyboard(&mut self, event: &KeyEvent) {
        let is_pressed = event.state.is_pressed();
        if let PhysicalKey::Code(keycode) = event.physical_key {
            match keycode {
                KeyCode::KeyA => self.movement.orbit_left = is_pressed,
                KeyCode::KeyD => self.movement.orbit_right = is_pressed,
                KeyCode::KeyW => self.movement.orbit_up = is_pressed,
                KeyCode::KeyS => self.movement.orbit_down = is_pressed,
                KeyCode::KeyQ => self.movement.zoom_in = is_pressed,
                KeyCode::KeyE => self.movement.zoom_out = is_pressed,
                KeyCode::ArrowLeft => self.movement.pan_left = is_pressed,
                KeyCode::ArrowRight => self.movement.pan_right = is_pressed,
                KeyCode::ArrowUp => self.movement.pan_up = is_pressed,
                KeyCode::ArrowDown => self.movement.pan_down = is_pressed,
                _ => {}
            }
        }
    }
}

impl Default for OrbitCamera {
    fn default() -> Self {
        Self::new()
    }
}
