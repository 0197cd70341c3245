//! Third-person character controller.
//!
//! One [`CharacterController`] drives one avatar. Each tick runs, in order:
//!
//! 1. animation state selection (may cross-fade clips) and mixer advance;
//! 2. heading, turning, horizontal displacement and jump on the body;
//! 3. the caller-supplied physics step;
//! 4. pose reconciliation (body → model position, model → body orientation);
//! 5. name label placement.
//!
//! The network emit happens after the tick, in the client loop.

use tracing::{debug, warn};

use avatar_shared::{
    math::Vec3,
    physics::PhysicsBodyHandle,
    render::{CameraPose, LabelHandle, VisualModelHandle},
};

use crate::{
    anim::{AnimationMixer, AnimationStateMachine, ClipResolver, LocomotionState, Transition},
    error::ControllerError,
    input::KeyState,
    label::NameLabelFollower,
    locomotion::{Integration, LocomotionIntegrator},
    profile::CharacterProfile,
    reconcile::PoseReconciler,
};

/// Engine handles for one avatar.
#[derive(Debug, Clone, Default)]
pub struct Avatar<B, M, L> {
    pub body: B,
    pub model: M,
    pub label: L,
}

/// What a completed tick did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickReport {
    pub state: LocomotionState,
    pub transition: Transition,
    pub integration: Integration,
    /// Model position after reconciliation.
    pub model_position: Vec3,
}

/// Locomotion + animation controller for one character.
pub struct CharacterController<X> {
    mixer: X,
    animation: AnimationStateMachine,
    run_toggle: bool,
    integrator: LocomotionIntegrator,
    reconciler: PoseReconciler,
    label: NameLabelFollower,
}

impl<X: AnimationMixer> CharacterController<X> {
    /// Creates the controller and starts the initial state's clip.
    pub fn new(
        profile: &CharacterProfile,
        mut mixer: X,
        clips: Box<dyn ClipResolver>,
    ) -> Result<Self, ControllerError> {
        let animation = AnimationStateMachine::start(
            profile.initial_state,
            profile.fade_duration,
            clips,
            &mut mixer,
        )?;
        debug!(rig = %profile.rig, state = %profile.initial_state, "Controller created");
        Ok(Self {
            mixer,
            animation,
            run_toggle: profile.start_running,
            integrator: LocomotionIntegrator::new(profile.locomotion),
            reconciler: PoseReconciler::new(profile.pivot_offset),
            label: NameLabelFollower::new(profile.label_offset),
        })
    }

    pub fn state(&self) -> LocomotionState {
        self.animation.current()
    }

    pub fn run_toggle(&self) -> bool {
        self.run_toggle
    }

    /// Flips between walking and running. Takes effect on the next tick.
    pub fn switch_run_toggle(&mut self) {
        self.run_toggle = !self.run_toggle;
        debug!(run = self.run_toggle, "Run toggle");
    }

    pub fn is_animation_halted(&self) -> bool {
        self.animation.is_halted()
    }

    pub fn mixer(&self) -> &X {
        &self.mixer
    }

    pub fn pivot_offset(&self) -> f32 {
        self.reconciler.pivot_offset
    }

    /// Aligns model and label with the body without moving anything
    /// (spawn, teleport).
    pub fn settle<B, M, L>(&self, camera: &dyn CameraPose, avatar: &mut Avatar<B, M, L>) -> Vec3
    where
        B: PhysicsBodyHandle,
        M: VisualModelHandle,
        L: LabelHandle,
    {
        let placed = self.reconciler.reconcile(&mut avatar.body, &mut avatar.model);
        self.label.follow(placed, camera, &mut avatar.label);
        placed
    }

    /// Runs one full tick. `physics_step` advances the physics world by the
    /// given seconds and is called between integration and reconciliation.
    ///
    /// Errors are returned after reconciliation and label placement ran:
    /// - `InvalidDelta`: no movement, turning, jump, mixer advance or physics
    ///   step happened this tick.
    /// - `ClipNotFound`: the transition was abandoned, the prior clip keeps
    ///   playing and animation updates stop for this character. Later ticks
    ///   move at the speed of the state the keys select, not the frozen one.
    pub fn tick<B, M, L, P>(
        &mut self,
        delta: f32,
        keys: KeyState,
        camera: &dyn CameraPose,
        avatar: &mut Avatar<B, M, L>,
        physics_step: P,
    ) -> Result<TickReport, ControllerError>
    where
        B: PhysicsBodyHandle,
        M: VisualModelHandle,
        L: LabelHandle,
        P: FnOnce(&mut B, f32),
    {
        let delta_ok = delta.is_finite() && delta >= 0.0;
        if !delta_ok {
            warn!(delta, "Rejecting tick delta");
        }

        let selected = self
            .animation
            .select(keys, self.run_toggle, &mut self.mixer);
        let transition = *selected.as_ref().unwrap_or(&Transition::Unchanged);
        if delta_ok && !self.animation.is_halted() {
            self.mixer.update(delta);
        }

        // A halted animation no longer tracks the keys; movement still does.
        let motion = if self.animation.is_halted() {
            LocomotionState::select(keys, self.run_toggle)
        } else {
            self.animation.current()
        };
        let integration = if delta_ok && selected.is_ok() {
            self.integrator.integrate(
                motion,
                keys,
                delta,
                camera,
                &mut avatar.model,
                &mut avatar.body,
            )
        } else {
            Integration::default()
        };

        if delta_ok {
            physics_step(&mut avatar.body, delta);
        }

        let model_position = self.settle(camera, avatar);

        selected?;
        if !delta_ok {
            return Err(ControllerError::InvalidDelta(delta));
        }
        Ok(TickReport {
            state: self.animation.current(),
            transition,
            integration,
            model_position,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anim::tests::{direct_table, RecordingMixer};
    use crate::input::Key;
    use avatar_shared::{
        physics::RigidBody,
        render::{FixedCamera, SceneNode},
    };

    type TestAvatar = Avatar<RigidBody, SceneNode, SceneNode>;

    fn spawn() -> (CharacterController<RecordingMixer>, TestAvatar, FixedCamera) {
        let profile = CharacterProfile::fox();
        let controller =
            CharacterController::new(&profile, RecordingMixer::default(), Box::new(direct_table()))
                .unwrap();
        let avatar = Avatar {
            body: RigidBody::new(Vec3::new(0.0, 0.1, 0.0), profile.half_extents, 1.0),
            model: SceneNode::new("fox", Vec3::ZERO),
            label: SceneNode::new("name", Vec3::ZERO),
        };
        let camera = FixedCamera::looking_at(Vec3::new(0.0, 2.0, -5.0), Vec3::ZERO);
        (controller, avatar, camera)
    }

    fn no_physics(_: &mut RigidBody, _: f32) {}

    #[test]
    fn run_toggle_starts_on_and_flips() {
        let (mut c, _, _) = spawn();
        assert!(c.run_toggle());
        c.switch_run_toggle();
        assert!(!c.run_toggle());
    }

    #[test]
    fn tick_keeps_model_below_body_by_pivot() {
        let (mut c, mut avatar, camera) = spawn();
        let keys = KeyState::from_keys(&[Key::W, Key::A]);
        for _ in 0..5 {
            c.tick(0.016, keys, &camera, &mut avatar, no_physics).unwrap();
            let expected = avatar.body.position - Vec3::new(0.0, c.pivot_offset(), 0.0);
            assert_eq!(avatar.model.position, expected);
            assert_eq!(avatar.body.orientation, avatar.model.orientation);
        }
    }

    #[test]
    fn invalid_delta_skips_integration_but_reconciles() {
        let (mut c, mut avatar, camera) = spawn();
        avatar.model.position = Vec3::new(9.0, 9.0, 9.0);
        let body_before = avatar.body.position;
        let mut stepped = false;

        let err = c
            .tick(f32::NAN, KeyState::from_keys(&[Key::W]), &camera, &mut avatar, |_, _| {
                stepped = true
            })
            .unwrap_err();

        assert!(matches!(err, ControllerError::InvalidDelta(d) if d.is_nan()));
        assert!(!stepped);
        assert_eq!(avatar.body.position, body_before);
        assert_eq!(avatar.model.position, Vec3::new(0.0, 0.0, 0.0));
        assert_eq!(avatar.label.position, Vec3::new(0.0, 0.5, 0.0));
    }

    #[test]
    fn negative_delta_is_rejected() {
        let (mut c, mut avatar, camera) = spawn();
        let err = c
            .tick(-0.1, KeyState::NONE, &camera, &mut avatar, no_physics)
            .unwrap_err();
        assert_eq!(err, ControllerError::InvalidDelta(-0.1));
    }

    #[test]
    fn physics_step_runs_between_integration_and_reconcile() {
        let (mut c, mut avatar, camera) = spawn();
        c.tick(0.1, KeyState::NONE, &camera, &mut avatar, |body, dt| {
            body.position.y += dt * 10.0;
        })
        .unwrap();
        assert!((avatar.model.position.y - 1.0).abs() < 1e-6);
    }
}
