//! Perspective camera and per-pixel ray construction
//!
//! Rays are built from the four frustum corner directions in the order
//! top-left, top-right, bottom-right, bottom-left. Both the CPU kernel and
//! the GPU camera uniforms interpolate the same corners, so a pixel gets the
//! same ray on either backend.

use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

use crate::sdf::Aabb;

/// A world-space ray
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    /// Unit direction
    pub direction: Vec3,
}

/// An orbital perspective camera
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Camera {
    /// Camera position in world space
    pub position: Vec3,
    /// Point the camera is looking at
    pub target: Vec3,
    /// Up vector (usually Y-up)
    pub up: Vec3,
    /// Vertical field of view in radians
    pub fov: f32,
    /// Aspect ratio (width / height)
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vec3::new(4.0, 3.0, 6.0),
            target: Vec3::ZERO,
            up: Vec3::Y,
            fov: 60.0_f32.to_radians(),
            aspect: 16.0 / 9.0,
            near: 0.3,
            far: 1000.0,
        }
    }
}

impl Camera {
    /// Create a camera looking at a target from a position
    pub fn look_at(position: Vec3, target: Vec3) -> Self {
        Self {
            position,
            target,
            ..Default::default()
        }
    }

    pub fn with_aspect(mut self, aspect: f32) -> Self {
        self.aspect = aspect;
        self
    }

    /// Get the view matrix (world to camera transform)
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, self.up)
    }

    /// Camera to world transform
    pub fn view_to_world(&self) -> Mat4 {
        self.view_matrix().inverse()
    }

    /// Get the forward direction (normalized)
    pub fn forward(&self) -> Vec3 {
        (self.target - self.position).normalize_or(Vec3::NEG_Z)
    }

    /// Get the right direction (normalized)
    pub fn right(&self) -> Vec3 {
        self.forward().cross(self.up).normalize_or(Vec3::X)
    }

    /// Get the actual up direction (may differ from self.up due to camera orientation)
    pub fn actual_up(&self) -> Vec3 {
        self.right().cross(self.forward())
    }

    /// Get distance from camera to target
    pub fn distance(&self) -> f32 {
        (self.position - self.target).length()
    }

    /// View-space directions through the far corners of a unit-depth frustum
    ///
    /// Order: top-left, top-right, bottom-right, bottom-left. The camera looks
    /// down -Z.
    pub fn frustum_corners(&self) -> [Vec3; 4] {
        let half_height = (self.fov * 0.5).tan();
        let to_right = Vec3::X * half_height * self.aspect;
        let to_top = Vec3::Y * half_height;
        let forward = Vec3::NEG_Z;

        [
            forward - to_right + to_top,
            forward + to_right + to_top,
            forward + to_right - to_top,
            forward - to_right - to_top,
        ]
    }

    /// Frustum corner directions rotated into world space
    pub fn world_frustum_corners(&self) -> [Vec3; 4] {
        let to_world = self.view_to_world();
        self.frustum_corners()
            .map(|corner| to_world.transform_vector3(corner))
    }

    /// Ray through normalized screen coordinates
    ///
    /// `u` runs left to right and `v` bottom to top, both in `0..=1`.
    pub fn ray(&self, u: f32, v: f32) -> Ray {
        ray_through(self.position, self.world_frustum_corners(), u, v)
    }

    /// Orbit around the target point
    ///
    /// - `delta_x`: Horizontal rotation (positive = rotate right)
    /// - `delta_y`: Vertical rotation (positive = rotate up)
    pub fn orbit(&mut self, delta_x: f32, delta_y: f32) {
        let radius = self.distance();
        if radius <= f32::EPSILON {
            return;
        }

        // Spherical coordinates around the target
        let offset = self.position - self.target;
        let mut theta = offset.x.atan2(offset.z);
        let mut phi = (offset.y / radius).clamp(-0.999, 0.999).acos();

        theta -= delta_x;
        phi = (phi - delta_y).clamp(0.01, std::f32::consts::PI - 0.01);

        self.position = self.target
            + Vec3::new(
                radius * phi.sin() * theta.sin(),
                radius * phi.cos(),
                radius * phi.sin() * theta.cos(),
            );
    }

    /// Zoom in/out (positive = closer)
    pub fn zoom(&mut self, delta: f32) {
        let dir = (self.position - self.target).normalize_or(Vec3::Z);
        let new_distance = (self.distance() - delta).clamp(0.1, self.far * 0.5);
        self.position = self.target + dir * new_distance;
    }

    /// Pan the camera (move both position and target)
    pub fn pan(&mut self, delta_x: f32, delta_y: f32) {
        let offset = self.right() * delta_x + self.actual_up() * delta_y;
        self.position += offset;
        self.target += offset;
    }

    /// Frame a bounding box (adjust camera to see the entire volume)
    pub fn frame_bounds(&mut self, bounds: &Aabb, padding: f32) {
        let center = bounds.center();
        let size = bounds.size().max_element().max(0.1);
        let distance = (size * 0.5 * (1.0 + padding)) / (self.fov * 0.5).tan();

        self.target = center;
        self.position = center + Vec3::new(0.55, 0.45, 0.7).normalize() * distance;
    }
}

/// Bilinear blend of the corner directions at `(u, v)`, `v` bottom to top
pub fn ray_through(origin: Vec3, corners: [Vec3; 4], u: f32, v: f32) -> Ray {
    let [top_left, top_right, bottom_right, bottom_left] = corners;
    let top = top_left.lerp(top_right, u);
    let bottom = bottom_left.lerp(bottom_right, u);
    Ray {
        origin,
        direction: bottom.lerp(top, v).normalize_or(Vec3::Y),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_camera_orbit() {
        let mut camera = Camera::default();
        let initial_distance = camera.distance();

        camera.orbit(0.1, 0.0);

        // Distance should remain the same
        assert!((camera.distance() - initial_distance).abs() < 0.001);
    }

    #[test]
    fn test_camera_zoom() {
        let mut camera = Camera::default();
        let initial_distance = camera.distance();

        camera.zoom(0.5);

        assert!(camera.distance() < initial_distance);
    }

    #[test]
    fn test_camera_pan() {
        let mut camera = Camera::default();
        let initial_target = camera.target;

        camera.pan(1.0, 0.0);

        assert_ne!(camera.target, initial_target);
    }

    #[test]
    fn test_center_ray_points_at_target() {
        let camera = Camera::look_at(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO);
        let ray = camera.ray(0.5, 0.5);

        assert_eq!(ray.origin, camera.position);
        assert_relative_eq!(ray.direction.x, 0.0, epsilon = 1e-6);
        assert_relative_eq!(ray.direction.y, 0.0, epsilon = 1e-6);
        assert_relative_eq!(ray.direction.z, -1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_corner_order() {
        let camera = Camera::look_at(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO).with_aspect(1.0);
        let [top_left, top_right, bottom_right, bottom_left] = camera.world_frustum_corners();

        assert!(top_left.x < 0.0 && top_left.y > 0.0);
        assert!(top_right.x > 0.0 && top_right.y > 0.0);
        assert!(bottom_right.x > 0.0 && bottom_right.y < 0.0);
        assert!(bottom_left.x < 0.0 && bottom_left.y < 0.0);

        // Corners sit on the edge of the vertical field of view
        let half = (camera.fov * 0.5).tan();
        assert_relative_eq!(top_left.y, half, epsilon = 1e-5);
    }

    #[test]
    fn test_ray_corners_match_frustum() {
        let camera = Camera::default();
        let corners = camera.world_frustum_corners();

        let top_left = camera.ray(0.0, 1.0).direction;
        assert_relative_eq!(top_left.dot(corners[0].normalize()), 1.0, epsilon = 1e-5);

        let bottom_right = camera.ray(1.0, 0.0).direction;
        assert_relative_eq!(bottom_right.dot(corners[2].normalize()), 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_frame_bounds_targets_center() {
        let mut camera = Camera::default();
        let bounds = Aabb::new(Vec3::new(1.0, 1.0, 1.0), Vec3::new(3.0, 3.0, 3.0));

        camera.frame_bounds(&bounds, 0.2);

        assert_eq!(camera.target, Vec3::splat(2.0));
        assert!(camera.distance() > 2.0);
    }
}
