//! Per-rig character configuration.
//!
//! Rigs differ in scale, collider size, where their origin sits relative to
//! the collider and what their animation clips are called. Everything the
//! controller needs to know about a rig lives in a [`CharacterProfile`].

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use avatar_shared::{math::Vec3, physics::RigidBody};

use crate::{
    anim::{ClipId, ClipResolver, DirectClips, LocomotionState, NamedClips},
    locomotion::LocomotionParams,
};

/// Character rig + controller tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterProfile {
    pub rig: String,
    /// Animation clips shipped with the rig.
    pub clips: Vec<String>,
    /// State → clip-name table for rigs whose clips are not named after
    /// the states. `None` means clips are looked up by state name.
    #[serde(default)]
    pub clip_names: Option<HashMap<LocomotionState, String>>,
    #[serde(default = "default_fade_duration")]
    pub fade_duration: f32,
    #[serde(default)]
    pub locomotion: LocomotionParams,
    #[serde(default = "default_initial_state")]
    pub initial_state: LocomotionState,
    /// Run toggle at spawn.
    #[serde(default = "default_start_running")]
    pub start_running: bool,
    /// Collider center height above the rig origin.
    pub pivot_offset: f32,
    /// Name label height above the rig origin.
    pub label_offset: f32,
    /// Collider half extents.
    pub half_extents: Vec3,
    #[serde(default = "default_mass")]
    pub mass: f32,
    pub spawn: Vec3,
}

fn default_fade_duration() -> f32 {
    0.2
}

fn default_initial_state() -> LocomotionState {
    LocomotionState::Survey
}

fn default_start_running() -> bool {
    true
}

fn default_mass() -> f32 {
    1.0
}

impl CharacterProfile {
    /// Small rig whose clips are named after the states.
    pub fn fox() -> Self {
        Self {
            rig: "fox".to_string(),
            clips: vec!["Survey".into(), "Walk".into(), "Run".into()],
            clip_names: None,
            fade_duration: default_fade_duration(),
            locomotion: LocomotionParams::default(),
            initial_state: default_initial_state(),
            start_running: default_start_running(),
            pivot_offset: 0.1,
            label_offset: 0.5,
            half_extents: Vec3::new(0.08, 0.1, 0.5),
            mass: default_mass(),
            spawn: Vec3::new(0.0, 5.0, 0.0),
        }
    }

    /// Large rig with exporter-named clips.
    pub fn velociraptor() -> Self {
        let clip = |suffix: &str| format!("Armature|Velociraptor_{suffix}");
        Self {
            rig: "velociraptor".to_string(),
            clips: vec![clip("Idle"), clip("Walk"), clip("Run"), clip("Jump")],
            clip_names: Some(HashMap::from([
                (LocomotionState::Survey, clip("Idle")),
                (LocomotionState::Walk, clip("Walk")),
                (LocomotionState::Run, clip("Run")),
            ])),
            fade_duration: default_fade_duration(),
            locomotion: LocomotionParams::default(),
            initial_state: default_initial_state(),
            start_running: default_start_running(),
            pivot_offset: 0.5,
            label_offset: 1.5,
            half_extents: Vec3::new(0.3, 0.5, 1.2),
            mass: default_mass(),
            spawn: Vec3::new(1.0, 3.0, 1.0),
        }
    }

    /// The monster plays the velociraptor; everyone else the fox.
    pub fn for_role(is_monster: bool) -> Self {
        if is_monster {
            Self::velociraptor()
        } else {
            Self::fox()
        }
    }

    pub fn from_json_str(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }

    /// Builds the clip resolver for this rig over the mixer's clip handles.
    pub fn clip_resolver(&self, clips: HashMap<String, ClipId>) -> Box<dyn ClipResolver> {
        match &self.clip_names {
            Some(names) => Box::new(NamedClips::new(names.clone(), clips)),
            None => Box::new(DirectClips::new(clips)),
        }
    }

    /// Physics body at the spawn point.
    pub fn spawn_body(&self) -> RigidBody {
        RigidBody::new(self.spawn, self.half_extents, self.mass)
    }
}
