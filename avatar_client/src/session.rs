//! The local player's avatar and everything its frame loop touches.

use avatar_shared::{
    math::Vec3,
    net::{PlayerId, PoseUpdate},
    physics::{GroundPhysics, PhysicsBackend, RigidBody},
    render::{SceneNode, VisualModelHandle},
};
use tracing::info;

use crate::{
    anim::AnimationMixer,
    camera::FollowCamera,
    controller::{Avatar, CharacterController, TickReport},
    error::ControllerError,
    input::{KeyAction, KeyboardState},
    mixer::BlendMixer,
    profile::CharacterProfile,
};

pub type LocalAvatar = Avatar<RigidBody, SceneNode, SceneNode>;

/// Controller, handles, camera, physics and keyboard for one local player.
pub struct LocalSession<X> {
    pub controller: CharacterController<X>,
    pub avatar: LocalAvatar,
    pub camera: FollowCamera,
    pub physics: GroundPhysics,
    pub keyboard: KeyboardState,
}

impl LocalSession<BlendMixer> {
    /// Spawns the profile's rig at its spawn point with a headless mixer.
    pub fn spawn(profile: &CharacterProfile, player_name: &str) -> Result<Self, ControllerError> {
        let (mixer, clips) = BlendMixer::with_clips(profile.clips.iter().map(String::as_str));
        let resolver = profile.clip_resolver(clips);
        let controller = CharacterController::new(profile, mixer, resolver)?;

        let body = profile.spawn_body();
        let model_origin = body.position - Vec3::new(0.0, profile.pivot_offset, 0.0);
        let avatar = Avatar {
            body,
            model: SceneNode::new(&profile.rig, model_origin),
            label: SceneNode::new(player_name, model_origin),
        };
        let camera = FollowCamera::new(
            Vec3::new(0.0, 5.0, 5.0),
            model_origin + Vec3::new(0.0, 1.0, 0.0),
        );

        let mut session = Self {
            controller,
            avatar,
            camera,
            physics: GroundPhysics::default(),
            keyboard: KeyboardState::new(),
        };
        session.controller.settle(&session.camera, &mut session.avatar);
        info!(rig = %profile.rig, name = player_name, "Local avatar spawned");
        Ok(session)
    }
}

impl<X: AnimationMixer> LocalSession<X> {
    pub fn key_down(&mut self, symbol: &str, shift_held: bool) {
        if self.keyboard.key_down(symbol, shift_held) == KeyAction::ToggleRun {
            self.controller.switch_run_toggle();
        }
    }

    pub fn key_up(&mut self, symbol: &str) {
        self.keyboard.key_up(symbol);
    }

    /// One frame: controller tick (with the physics step inside it), then
    /// the camera catches up.
    pub fn frame(&mut self, delta: f32) -> Result<TickReport, ControllerError> {
        let keys = self.keyboard.snapshot();
        let physics = &mut self.physics;
        let report = self
            .controller
            .tick(delta, keys, &self.camera, &mut self.avatar, |body, dt| {
                physics.step(body, dt)
            });

        let displacement = match &report {
            Ok(r) => r.integration.displacement,
            Err(_) => Vec3::ZERO,
        };
        self.camera.follow(displacement, self.avatar.model.position);
        report
    }

    /// This frame's pose in relay form.
    pub fn pose(&self, player_id: PlayerId) -> PoseUpdate {
        PoseUpdate {
            player_id,
            position: self.avatar.model.position,
            rotation: self.avatar.model.rotation(),
        }
    }
}
