//! Orbit camera for the mesh viewer

use nalgebra::{Matrix4, Perspective3, Point3, Vector3};

/// Closest the camera may get to its target, relative to the framed radius
const MIN_DISTANCE_FACTOR: f32 = 0.01;
/// Keeps the orbit away from the poles so `up` never aligns with the view
const MAX_PITCH: f32 = std::f32::consts::FRAC_PI_2 - 0.01;

/// A 3D camera orbiting a target point
#[derive(Debug, Clone)]
pub struct Camera {
    pub position: Point3<f32>,
    pub target: Point3<f32>,
    pub up: Vector3<f32>,
    pub fov: f32,
    pub aspect_ratio: f32,
    pub near: f32,
    pub far: f32,
    home: (Point3<f32>, Point3<f32>),
    scene_radius: f32,
}

impl Camera {
    /// Create a new camera
    pub fn new(
        position: Point3<f32>,
        target: Point3<f32>,
        up: Vector3<f32>,
        fov: f32,
        aspect_ratio: f32,
        near: f32,
        far: f32,
    ) -> Self {
        Self {
            position,
            target,
            up,
            fov,
            aspect_ratio,
            near,
            far,
            home: (position, target),
            scene_radius: (position - target).norm().max(f32::EPSILON),
        }
    }

    /// Get the view matrix
    pub fn view_matrix(&self) -> Matrix4<f32> {
        Matrix4::look_at_rh(&self.position, &self.target, &self.up)
    }

    /// Get the projection matrix
    pub fn projection_matrix(&self) -> Matrix4<f32> {
        let perspective = Perspective3::new(self.aspect_ratio, self.fov, self.near, self.far);
        perspective.into_inner()
    }

    /// Combined projection * view
    pub fn view_projection(&self) -> Matrix4<f32> {
        self.projection_matrix() * self.view_matrix()
    }

    pub fn distance(&self) -> f32 {
        (self.position - self.target).norm()
    }

    /// Rotate the camera around the target by yaw and pitch angles in radians
    pub fn orbit(&mut self, horizontal: f32, vertical: f32) {
        let offset = self.position - self.target;
        let radius = offset.norm();
        if radius <= f32::EPSILON {
            return;
        }

        let yaw = offset.x.atan2(offset.z) - horizontal;
        let pitch = ((offset.y / radius).clamp(-1.0, 1.0).asin() + vertical).clamp(-MAX_PITCH, MAX_PITCH);

        let direction = Vector3::new(pitch.cos() * yaw.sin(), pitch.sin(), pitch.cos() * yaw.cos());
        self.position = self.target + direction * radius;
    }

    /// Translate camera and target in the view plane. Deltas are fractions
    /// of the current distance.
    pub fn pan(&mut self, dx: f32, dy: f32) {
        let forward = (self.target - self.position).normalize();
        let right = match forward.cross(&self.up).try_normalize(f32::EPSILON) {
            Some(r) => r,
            None => return,
        };
        let up = right.cross(&forward);
        let shift = (right * -dx + up * dy) * self.distance();
        self.position += shift;
        self.target += shift;
    }

    /// Move towards (positive) or away from (negative) the target
    pub fn zoom(&mut self, amount: f32) {
        let offset = self.position - self.target;
        let min_distance = self.scene_radius * MIN_DISTANCE_FACTOR;
        let distance = (offset.norm() * (1.0 - amount)).max(min_distance);
        if let Some(dir) = offset.try_normalize(f32::EPSILON) {
            self.position = self.target + dir * distance;
        }
    }

    /// Return to the framing set by `new` or the last `fit_to_bounds`
    pub fn reset(&mut self) {
        self.position = self.home.0;
        self.target = self.home.1;
    }

    /// Frame a sphere of `radius` around `center` and make that the home view
    pub fn fit_to_bounds(&mut self, center: Point3<f32>, radius: f32) {
        let radius = if radius.is_finite() && radius > f32::EPSILON { radius } else { 1.0 };
        let distance = radius / (self.fov * 0.5).sin() * 1.1;
        let direction = Vector3::new(1.0, 0.8, 1.5).normalize();

        self.target = center;
        self.position = center + direction * distance;
        self.near = (distance - radius).max(distance * 0.001) * 0.5;
        self.far = (distance + radius) * 4.0;
        self.scene_radius = radius;
        self.home = (self.position, self.target);
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(
            Point3::new(0.0, 0.0, 5.0),
            Point3::new(0.0, 0.0, 0.0),
            Vector3::new(0.0, 1.0, 0.0),
            std::f32::consts::FRAC_PI_4,
            16.0 / 9.0,
            0.1,
            100.0,
        )
    }
}
