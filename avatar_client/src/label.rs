//! Floating name label.

use avatar_shared::{
    math::Vec3,
    render::{CameraPose, LabelHandle},
};

/// Keeps a label hovering above the model, facing the camera.
#[derive(Debug, Clone, Copy, Default)]
pub struct NameLabelFollower {
    /// Height above the model origin; differs per rig scale.
    pub offset: f32,
}

impl NameLabelFollower {
    pub fn new(offset: f32) -> Self {
        Self { offset }
    }

    pub fn follow<L>(&self, model_position: Vec3, camera: &dyn CameraPose, label: &mut L)
    where
        L: LabelHandle + ?Sized,
    {
        label.set_position(model_position + Vec3::new(0.0, self.offset, 0.0));
        label.look_at(camera.position());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use avatar_shared::render::{FixedCamera, SceneNode};

    #[test]
    fn label_hovers_and_faces_camera() {
        let camera = FixedCamera::looking_at(Vec3::new(4.0, 3.0, -4.0), Vec3::ZERO);
        let mut label = SceneNode::new("name", Vec3::ZERO);
        NameLabelFollower::new(0.5).follow(Vec3::new(1.0, 0.0, 1.0), &camera, &mut label);

        assert_eq!(label.position, Vec3::new(1.0, 0.5, 1.0));
        let facing = label.orientation.rotate(Vec3::new(0.0, 0.0, 1.0));
        let wanted = (camera.position - label.position).normalize();
        assert!(facing.distance(wanted) < 1e-5);
    }
}
