use glam::{Mat4, Vec2, Vec3};

/// Default eye position when a new model arrives.
const HOME_EYE: Vec3 = Vec3::new(150.0, 150.0, 150.0);

/// Orbit camera around a movable target. Yaw/pitch/distance define the eye
/// position; panning shifts the target in the view plane.
pub struct Camera {
    pub target: Vec3,
    pub yaw: f32,
    pub pitch: f32,
    pub distance: f32,

    pub fov: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,

    pub orbit_sensitivity: f32,
    pub pan_sensitivity: f32,
    pub zoom_speed: f32,
}

impl Default for Camera {
    fn default() -> Self {
        let mut camera = Self {
            target: Vec3::ZERO,
            yaw: 0.0,
            pitch: 0.0,
            distance: 0.0,

            fov: 75.0_f32.to_radians(),
            aspect: 16.0 / 9.0,
            near: 0.1,
            far: 50000.0,

            orbit_sensitivity: 0.005,
            pan_sensitivity: 0.0015,
            zoom_speed: 12.0,
        };
        camera.reset();
        camera
    }
}

impl Camera {
    /// Return to the home framing. Called whenever new geometry is shown so
    /// every model starts from the same view.
    pub fn reset(&mut self) {
        self.target = Vec3::ZERO;
        self.distance = HOME_EYE.length();

        let dir = HOME_EYE.normalize();
        self.yaw = dir.z.atan2(dir.x);
        self.pitch = dir.y.asin();
    }

    pub fn eye(&self) -> Vec3 {
        self.target
            + Vec3::new(
                self.distance * self.yaw.cos() * self.pitch.cos(),
                self.distance * self.pitch.sin(),
                self.distance * self.yaw.sin() * self.pitch.cos(),
            )
    }

    pub fn orbit(&mut self, delta: Vec2) {
        self.yaw += delta.x * self.orbit_sensitivity;
        self.pitch += delta.y * self.orbit_sensitivity;

        let max_pitch = 89.0_f32.to_radians();
        self.pitch = self.pitch.clamp(-max_pitch, max_pitch);
    }

    /// Shift the target along the view-plane axes, scaled by the current
    /// distance so panning feels uniform at any zoom level.
    pub fn pan(&mut self, delta: Vec2) {
        let forward = (self.target - self.eye()).normalize();
        let right = forward.cross(Vec3::Y).normalize();
        let up = right.cross(forward).normalize();

        let scale = self.distance * self.pan_sensitivity;
        self.target += right * (-delta.x * scale) + up * (delta.y * scale);
    }

    pub fn zoom(&mut self, delta: f32) {
        self.distance = (self.distance - delta * self.zoom_speed).clamp(1.0, 10000.0);
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye(), self.target, Vec3::Y)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov, self.aspect, self.near, self.far)
    }

    pub fn view_projection_matrix(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    pub fn set_aspect(&mut self, width: f32, height: f32) {
        self.aspect = width / height;
    }
}

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniform {
    pub view_proj: [[f32; 4]; 4],
    pub camera_pos: [f32; 3],
    pub _padding: f32,
}

impl CameraUniform {
    pub fn from_camera(camera: &Camera) -> Self {
        Self {
            view_proj: camera.view_projection_matrix().to_cols_array_2d(),
            camera_pos: camera.eye().to_array(),
            _padding: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_restores_home_eye() {
        let mut camera = Camera::default();
        camera.orbit(Vec2::new(120.0, -45.0));
        camera.pan(Vec2::new(30.0, 10.0));
        camera.zoom(5.0);

        camera.reset();
        let eye = camera.eye();
        assert!((eye - HOME_EYE).length() < 1e-3);
        assert_eq!(camera.target, Vec3::ZERO);
    }

    #[test]
    fn zoom_is_clamped_to_positive_distance() {
        let mut camera = Camera::default();
        for _ in 0..1000 {
            camera.zoom(100.0);
        }
        assert!(camera.distance >= 1.0);

        for _ in 0..10000 {
            camera.zoom(-100.0);
        }
        assert!(camera.distance <= 10000.0);
    }

    #[test]
    fn pitch_never_reaches_the_pole() {
        let mut camera = Camera::default();
        camera.orbit(Vec2::new(0.0, 1e6));
        assert!(camera.pitch < 90.0_f32.to_radians());
        // Eye must stay distinct from a straight-down view so look_at keeps
        // a valid up vector.
        assert!(camera.eye().distance(camera.target) > 1.0);
    }
}
