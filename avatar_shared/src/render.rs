//! Rendering abstraction.
//!
//! This crate intentionally does not depend on a graphics backend.
//! The avatar controller mutates scene nodes and reads the camera only
//! through the capability traits below; a renderer redraws whatever the
//! nodes hold once per frame.

use crate::math::{EulerXyz, Quat, Vec3};

/// The rendered character model.
pub trait VisualModelHandle {
    fn position(&self) -> Vec3;
    fn set_position(&mut self, position: Vec3);
    fn orientation(&self) -> Quat;
    fn set_orientation(&mut self, orientation: Quat);

    /// Orientation as XYZ Euler angles, the shape sent over the relay.
    fn rotation(&self) -> EulerXyz {
        self.orientation().to_euler_xyz()
    }
}

/// A floating node (e.g. the player's name text) that billboards.
pub trait LabelHandle {
    fn position(&self) -> Vec3;
    fn set_position(&mut self, position: Vec3);
    fn set_orientation(&mut self, orientation: Quat);

    /// Turns the node so its local +Z faces `target`.
    fn look_at(&mut self, target: Vec3) {
        let q = Quat::look_at(self.position(), target, Vec3::Y);
        self.set_orientation(q);
    }
}

/// Read-only view of the active camera.
pub trait CameraPose {
    fn position(&self) -> Vec3;
    /// Unit vector the camera looks along.
    fn world_direction(&self) -> Vec3;
}

/// Plain scene-graph node for headless runs and tests.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SceneNode {
    pub name: String,
    pub position: Vec3,
    pub orientation: Quat,
}

impl SceneNode {
    pub fn new(name: &str, position: Vec3) -> Self {
        Self {
            name: name.to_string(),
            position,
            orientation: Quat::IDENTITY,
        }
    }
}

impl VisualModelHandle for SceneNode {
    fn position(&self) -> Vec3 {
        self.position
    }

    fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }

    fn orientation(&self) -> Quat {
        self.orientation
    }

    fn set_orientation(&mut self, orientation: Quat) {
        self.orientation = orientation;
    }
}

impl LabelHandle for SceneNode {
    fn position(&self) -> Vec3 {
        self.position
    }

    fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }

    fn set_orientation(&mut self, orientation: Quat) {
        self.orientation = orientation;
    }
}

/// Camera fixed in place, looking along a given direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedCamera {
    pub position: Vec3,
    pub direction: Vec3,
}

impl FixedCamera {
    /// Camera at `position` looking at `target`.
    pub fn looking_at(position: Vec3, target: Vec3) -> Self {
        Self {
            position,
            direction: (target - position).normalize(),
        }
    }
}

impl CameraPose for FixedCamera {
    fn position(&self) -> Vec3 {
        self.position
    }

    fn world_direction(&self) -> Vec3 {
        self.direction
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_look_at_faces_target() {
        let mut label = SceneNode::new("label", Vec3::new(0.0, 1.5, 0.0));
        let camera = Vec3::new(0.0, 1.5, 10.0);
        LabelHandle::look_at(&mut label, camera);
        let facing = label.orientation.rotate(Vec3::new(0.0, 0.0, 1.0));
        assert!((facing.z - 1.0).abs() < 1e-5);
    }

    #[test]
    fn fixed_camera_direction_is_unit() {
        let cam = FixedCamera::looking_at(Vec3::new(0.0, 5.0, -5.0), Vec3::ZERO);
        assert!((cam.world_direction().length() - 1.0).abs() < 1e-5);
    }
}
