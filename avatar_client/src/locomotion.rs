//! Camera-relative movement, turning and jumping.
//!
//! Horizontal movement is kinematic: the displacement is written straight
//! into the physics body's X/Z position. The physics engine only owns the
//! vertical axis (gravity, jump impulse) and collision response.

use serde::{Deserialize, Serialize};
use tracing::trace;

use avatar_shared::{
    math::{Quat, Vec3},
    physics::PhysicsBodyHandle,
    render::{CameraPose, VisualModelHandle},
};

use crate::{anim::LocomotionState, direction::direction_offset, input::KeyState};

/// Speed, jump and turn tuning for one character.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocomotionParams {
    /// Units per second while walking.
    pub walk_velocity: f32,
    /// Units per second while running.
    pub run_velocity: f32,
    /// Magnitude of the upward jump impulse.
    pub jump_impulse: f32,
    /// Jump allowed while vertical velocity is at or below this.
    pub jump_velocity_threshold: f32,
    /// Jump allowed while the body's height is at or below this.
    pub jump_height_threshold: f32,
    /// Largest model rotation per tick, radians.
    pub turn_step: f32,
}

impl Default for LocomotionParams {
    fn default() -> Self {
        Self {
            walk_velocity: 2.0,
            run_velocity: 5.0,
            jump_impulse: 4.0,
            jump_velocity_threshold: 0.5,
            jump_height_threshold: 0.5,
            turn_step: 0.2,
        }
    }
}

impl LocomotionParams {
    /// Ground speed for a state; zero while surveying.
    pub fn speed(&self, state: LocomotionState) -> f32 {
        match state {
            LocomotionState::Survey => 0.0,
            LocomotionState::Walk => self.walk_velocity,
            LocomotionState::Run => self.run_velocity,
        }
    }

    /// Whether a jump impulse may be applied to a body in this state.
    ///
    /// Both checks are loose: a body falling back through the height
    /// threshold passes them before it touches down, so holding jump can
    /// fire a second impulse mid-air.
    pub fn can_jump(&self, vertical_velocity: f32, height: f32) -> bool {
        vertical_velocity <= self.jump_velocity_threshold && height <= self.jump_height_threshold
    }
}

/// What one integration pass did.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Integration {
    /// Yaw of the camera → model line, radians.
    pub camera_yaw: f32,
    /// Key-derived yaw offset, radians.
    pub offset: f32,
    /// Horizontal displacement applied to the body.
    pub displacement: Vec3,
    pub jumped: bool,
}

/// Yaw that looks from the camera toward the model.
pub fn camera_yaw(model: Vec3, camera: Vec3) -> f32 {
    (model.x - camera.x).atan2(model.z - camera.z)
}

/// Horizontal unit direction of travel: camera forward flattened, turned by
/// `offset` about +Y.
pub fn walk_direction(camera_forward: Vec3, offset: f32) -> Vec3 {
    camera_forward.horizontal().normalize().rotate_y(offset)
}

/// Per-tick movement integrator.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocomotionIntegrator {
    pub params: LocomotionParams,
}

impl LocomotionIntegrator {
    pub fn new(params: LocomotionParams) -> Self {
        Self { params }
    }

    /// Turns the model toward the camera-relative heading, moves the body
    /// horizontally for moving states and applies a jump impulse when allowed.
    pub fn integrate<B, M>(
        &self,
        state: LocomotionState,
        keys: KeyState,
        delta: f32,
        camera: &dyn CameraPose,
        model: &mut M,
        body: &mut B,
    ) -> Integration
    where
        B: PhysicsBodyHandle + ?Sized,
        M: VisualModelHandle + ?Sized,
    {
        let camera_yaw = camera_yaw(model.position(), camera.position());
        let offset = direction_offset(keys);

        let target = Quat::from_yaw(camera_yaw + offset);
        let turned = model
            .orientation()
            .rotate_towards(target, self.params.turn_step);
        model.set_orientation(turned);

        let mut displacement = Vec3::ZERO;
        if state.is_moving() {
            let direction = walk_direction(camera.world_direction(), offset);
            displacement = direction * (self.params.speed(state) * delta);
            let mut position = body.position();
            position.x += displacement.x;
            position.z += displacement.z;
            body.set_position(position);
        }

        let mut jumped = false;
        if keys.jump() && self.params.can_jump(body.velocity().y, body.position().y) {
            body.apply_impulse(Vec3::new(0.0, self.params.jump_impulse, 0.0));
            jumped = true;
        }

        trace!(camera_yaw, offset, dx = displacement.x, dz = displacement.z, jumped, "Integrated");
        Integration {
            camera_yaw,
            offset,
            displacement,
            jumped,
        }
    }
}
