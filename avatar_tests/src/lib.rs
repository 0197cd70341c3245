//! Shared fixtures for the integration tests.

use avatar_client::{
    anim::ClipId,
    controller::{Avatar, CharacterController},
    mixer::BlendMixer,
    profile::CharacterProfile,
};
use avatar_shared::{
    math::Vec3,
    physics::RigidBody,
    render::{FixedCamera, SceneNode},
};
use std::collections::HashMap;

pub type TestAvatar = Avatar<RigidBody, SceneNode, SceneNode>;

/// Installs a test-writer subscriber once per process.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("info")
        .with_test_writer()
        .try_init();
}

/// A character resting on the ground at the origin, with the camera five
/// units behind it (the model faces +Z, away from the camera).
pub struct Rig {
    pub controller: CharacterController<BlendMixer>,
    pub avatar: TestAvatar,
    pub camera: FixedCamera,
    pub clips: HashMap<String, ClipId>,
}

impl Rig {
    pub fn spawn(profile: &CharacterProfile) -> anyhow::Result<Self> {
        let (mixer, clips) = BlendMixer::with_clips(profile.clips.iter().map(String::as_str));
        let controller =
            CharacterController::new(profile, mixer, profile.clip_resolver(clips.clone()))?;
        let body_height = profile.half_extents.y;
        let body_center = Vec3::new(0.0, body_height, 0.0);
        let model_origin = Vec3::new(0.0, body_height - profile.pivot_offset, 0.0);
        let avatar = Avatar {
            body: RigidBody::new(body_center, profile.half_extents, profile.mass),
            model: SceneNode::new(&profile.rig, model_origin),
            label: SceneNode::new("Player 1", Vec3::ZERO),
        };
        let camera = FixedCamera::looking_at(Vec3::new(0.0, 2.0, -5.0), Vec3::ZERO);
        Ok(Self {
            controller,
            avatar,
            camera,
            clips,
        })
    }

    pub fn clip(&self, name: &str) -> Option<ClipId> {
        self.clips.get(name).copied()
    }
}
