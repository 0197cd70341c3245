//! Orbit camera that trails the local avatar.
//!
//! Owned by the client loop, not by the controller: the controller only
//! reads it through [`CameraPose`]. After each tick the camera is carried by
//! the avatar's horizontal displacement and re-aimed just above the model.

use avatar_shared::{math::Vec3, render::CameraPose};

/// Orbit camera with distance limits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FollowCamera {
    pub position: Vec3,
    pub target: Vec3,
    pub min_distance: f32,
    pub max_distance: f32,
    /// Aim point height above the model origin.
    pub target_height: f32,
}

impl FollowCamera {
    pub fn new(position: Vec3, target: Vec3) -> Self {
        let mut cam = Self {
            position,
            target,
            min_distance: 5.0,
            max_distance: 15.0,
            target_height: 1.0,
        };
        cam.clamp_distance();
        cam
    }

    /// Carries the camera along with the avatar and re-targets it.
    pub fn follow(&mut self, displacement: Vec3, model_position: Vec3) {
        self.position.x += displacement.x;
        self.position.z += displacement.z;
        self.target = model_position + Vec3::new(0.0, self.target_height, 0.0);
        self.clamp_distance();
    }

    /// Swings the camera around the target about +Y.
    pub fn orbit(&mut self, yaw: f32) {
        let arm = (self.position - self.target).rotate_y(yaw);
        self.position = self.target + arm;
    }

    fn clamp_distance(&mut self) {
        let arm = self.position - self.target;
        let dist = arm.length();
        let dir = if dist > 0.0 {
            arm * (1.0 / dist)
        } else {
            Vec3::new(0.0, 0.0, -1.0)
        };
        let clamped = dist.clamp(self.min_distance, self.max_distance);
        if clamped != dist {
            self.position = self.target + dir * clamped;
        }
    }
}

impl CameraPose for FollowCamera {
    fn position(&self) -> Vec3 {
        self.position
    }

    fn world_direction(&self) -> Vec3 {
        (self.target - self.position).normalize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn follow_moves_with_avatar_and_aims_above_it() {
        let mut cam = FollowCamera::new(Vec3::new(0.0, 5.0, -5.0), Vec3::new(0.0, 1.0, 0.0));
        cam.follow(Vec3::new(0.5, 0.0, 1.0), Vec3::new(0.5, 0.0, 1.0));
        assert_eq!(cam.position, Vec3::new(0.5, 5.0, -4.0));
        assert_eq!(cam.target, Vec3::new(0.5, 1.0, 1.0));
    }

    #[test]
    fn distance_is_clamped() {
        let cam = FollowCamera::new(Vec3::new(0.0, 0.0, -1.0), Vec3::ZERO);
        assert!((cam.position.distance(cam.target) - 5.0).abs() < 1e-5);

        let mut far = FollowCamera::new(Vec3::new(0.0, 0.0, -10.0), Vec3::ZERO);
        far.follow(Vec3::ZERO, Vec3::new(0.0, -1.0, 20.0));
        assert!((far.position.distance(far.target) - 15.0).abs() < 1e-4);
    }

    #[test]
    fn orbit_keeps_distance() {
        let mut cam = FollowCamera::new(Vec3::new(0.0, 3.0, -6.0), Vec3::ZERO);
        let before = cam.position.distance(cam.target);
        cam.orbit(1.0);
        assert!((cam.position.distance(cam.target) - before).abs() < 1e-5);
    }
}
