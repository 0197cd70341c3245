//! Physics → visual pose reconciliation.
//!
//! Runs after the physics step in two ordered phases:
//! 1. position flows from the body to the model (minus the rig pivot offset);
//! 2. orientation flows from the model to the body.
//!
//! Phase 2 can only be reached through the [`PositionSynced`] token that
//! phase 1 returns, so the order cannot be swapped by a caller.

use avatar_shared::{math::Vec3, physics::PhysicsBodyHandle, render::VisualModelHandle};

/// Copies body transforms onto the model and back.
#[derive(Debug, Clone, Copy, Default)]
pub struct PoseReconciler {
    /// Vertical distance from the collider center down to the rig origin.
    pub pivot_offset: f32,
}

/// Phase-one receipt.
#[must_use = "orientation must be synced back to the body"]
#[derive(Debug)]
pub struct PositionSynced {
    model_position: Vec3,
}

impl PoseReconciler {
    pub fn new(pivot_offset: f32) -> Self {
        Self { pivot_offset }
    }

    /// Phase 1: model position = body position − pivot offset (vertical).
    pub fn sync_position<B, M>(&self, body: &B, model: &mut M) -> PositionSynced
    where
        B: PhysicsBodyHandle + ?Sized,
        M: VisualModelHandle + ?Sized,
    {
        let mut position = body.position();
        position.y -= self.pivot_offset;
        model.set_position(position);
        PositionSynced {
            model_position: position,
        }
    }

    /// Both phases in order. Returns the model's new position.
    pub fn reconcile<B, M>(&self, body: &mut B, model: &mut M) -> Vec3
    where
        B: PhysicsBodyHandle + ?Sized,
        M: VisualModelHandle + ?Sized,
    {
        self.sync_position(body, model).sync_orientation(model, body)
    }
}

impl PositionSynced {
    /// Phase 2: body orientation = model orientation. The body never rotates
    /// the character on its own.
    pub fn sync_orientation<B, M>(self, model: &M, body: &mut B) -> Vec3
    where
        B: PhysicsBodyHandle + ?Sized,
        M: VisualModelHandle + ?Sized,
    {
        body.set_orientation(model.orientation());
        self.model_position
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use avatar_shared::{math::Quat, physics::RigidBody, render::SceneNode};

    #[test]
    fn position_from_body_orientation_from_model() {
        let mut body = RigidBody::new(Vec3::new(1.0, 2.0, 3.0), Vec3::new(0.3, 0.5, 1.2), 1.0);
        body.orientation = Quat::from_yaw(2.0);
        let mut model = SceneNode::new("dino", Vec3::ZERO);
        model.orientation = Quat::from_yaw(0.5);

        let placed = PoseReconciler::new(0.5).reconcile(&mut body, &mut model);

        assert_eq!(placed, Vec3::new(1.0, 1.5, 3.0));
        assert_eq!(model.position, Vec3::new(1.0, 1.5, 3.0));
        assert_eq!(body.orientation, Quat::from_yaw(0.5));
        assert_eq!(model.orientation, Quat::from_yaw(0.5));
        assert_eq!(body.position, Vec3::new(1.0, 2.0, 3.0));
    }
}
