//! Physics abstraction.
//!
//! The avatar controller talks to the physics engine only through
//! [`PhysicsBodyHandle`]. [`GroundPhysics`] is a deliberately tiny backend
//! (gravity, a ground plane and square world walls) used by the headless
//! client and by tests; a real engine plugs in behind the same traits.

use crate::math::{Quat, Vec3};

/// Read/write access to one rigid body owned by the physics engine.
pub trait PhysicsBodyHandle {
    fn position(&self) -> Vec3;
    fn set_position(&mut self, position: Vec3);
    fn velocity(&self) -> Vec3;
    fn orientation(&self) -> Quat;
    fn set_orientation(&mut self, orientation: Quat);
    /// Applies an instantaneous impulse at the center of mass.
    fn apply_impulse(&mut self, impulse: Vec3);
}

/// Physics parameters.
#[derive(Debug, Clone, Copy)]
pub struct PhysicsConfig {
    pub gravity: Vec3,
    /// Height of the ground plane.
    pub ground_height: f32,
    /// Walls sit at `±world_half_extent` on X and Z.
    pub world_half_extent: f32,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: Vec3::new(0.0, -9.82, 0.0),
            ground_height: 0.0,
            world_half_extent: 50.0,
        }
    }
}

/// Box-shaped dynamic body.
#[derive(Debug, Clone, PartialEq)]
pub struct RigidBody {
    pub position: Vec3,
    pub velocity: Vec3,
    pub orientation: Quat,
    pub half_extents: Vec3,
    pub mass: f32,
}

impl RigidBody {
    pub fn new(position: Vec3, half_extents: Vec3, mass: f32) -> Self {
        Self {
            position,
            velocity: Vec3::ZERO,
            orientation: Quat::IDENTITY,
            half_extents,
            mass,
        }
    }
}

impl PhysicsBodyHandle for RigidBody {
    fn position(&self) -> Vec3 {
        self.position
    }

    fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }

    fn velocity(&self) -> Vec3 {
        self.velocity
    }

    fn orientation(&self) -> Quat {
        self.orientation
    }

    fn set_orientation(&mut self, orientation: Quat) {
        self.orientation = orientation;
    }

    fn apply_impulse(&mut self, impulse: Vec3) {
        if self.mass > 0.0 {
            self.velocity += impulse * (1.0 / self.mass);
        }
    }
}

/// Physics stepper trait.
pub trait PhysicsBackend: Send + Sync {
    fn step(&mut self, body: &mut RigidBody, dt_sec: f32);
}

/// Gravity + ground plane + world walls.
#[derive(Debug, Default)]
pub struct GroundPhysics {
    pub cfg: PhysicsConfig,
}

impl GroundPhysics {
    pub fn new(cfg: PhysicsConfig) -> Self {
        Self { cfg }
    }

    /// Height of a body's center when it rests on the ground.
    pub fn resting_height(&self, body: &RigidBody) -> f32 {
        self.cfg.ground_height + body.half_extents.y
    }
}

impl PhysicsBackend for GroundPhysics {
    fn step(&mut self, body: &mut RigidBody, dt_sec: f32) {
        if !dt_sec.is_finite() || dt_sec <= 0.0 {
            return;
        }

        body.velocity += self.cfg.gravity * dt_sec;
        body.position += body.velocity * dt_sec;

        let floor = self.resting_height(body);
        if body.position.y <= floor {
            body.position.y = floor;
            if body.velocity.y < 0.0 {
                body.velocity.y = 0.0;
            }
        }

        let limit = self.cfg.world_half_extent;
        if body.position.x.abs() > limit {
            body.position.x = body.position.x.clamp(-limit, limit);
            body.velocity.x = 0.0;
        }
        if body.position.z.abs() > limit {
            body.position.z = body.position.z.clamp(-limit, limit);
            body.velocity.z = 0.0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_falls_and_rests_on_ground() {
        let mut physics = GroundPhysics::default();
        let mut body = RigidBody::new(Vec3::new(0.0, 5.0, 0.0), Vec3::new(0.1, 0.1, 0.1), 1.0);
        for _ in 0..600 {
            physics.step(&mut body, 1.0 / 60.0);
        }
        assert!((body.position.y - 0.1).abs() < 1e-6);
        assert_eq!(body.velocity.y, 0.0);
    }

    #[test]
    fn impulse_scales_with_inverse_mass() {
        let mut body = RigidBody::new(Vec3::ZERO, Vec3::new(0.5, 0.5, 0.5), 2.0);
        body.apply_impulse(Vec3::new(0.0, 4.0, 0.0));
        assert_eq!(body.velocity, Vec3::new(0.0, 2.0, 0.0));
    }

    #[test]
    fn walls_clamp_horizontal_position() {
        let mut physics = GroundPhysics::default();
        let mut body = RigidBody::new(Vec3::new(60.0, 0.1, -70.0), Vec3::new(0.1, 0.1, 0.1), 1.0);
        physics.step(&mut body, 1.0 / 60.0);
        assert_eq!(body.position.x, 50.0);
        assert_eq!(body.position.z, -50.0);
    }

    #[test]
    fn non_positive_dt_is_ignored() {
        let mut physics = GroundPhysics::default();
        let mut body = RigidBody::new(Vec3::new(0.0, 3.0, 0.0), Vec3::new(0.1, 0.1, 0.1), 1.0);
        let before = body.clone();
        physics.step(&mut body, 0.0);
        physics.step(&mut body, f32::NAN);
        assert_eq!(body, before);
    }
}
