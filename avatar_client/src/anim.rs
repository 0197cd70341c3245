//! Locomotion animation states and clip cross-fading.
//!
//! The state machine owns only the *choice* of clip. Clip playback lives in
//! an [`AnimationMixer`]; clips are addressed by opaque [`ClipId`] handles
//! obtained through a [`ClipResolver`] chosen when the character spawns.

use std::{collections::HashMap, fmt};

use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::{error::ControllerError, input::KeyState};

/// Discrete locomotion category driving both animation and speed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LocomotionState {
    Survey,
    Walk,
    Run,
}

impl LocomotionState {
    pub const ALL: [LocomotionState; 3] = [
        LocomotionState::Survey,
        LocomotionState::Walk,
        LocomotionState::Run,
    ];

    /// Clip key used by rigs whose clips are named after the states.
    pub fn name(self) -> &'static str {
        match self {
            LocomotionState::Survey => "Survey",
            LocomotionState::Walk => "Walk",
            LocomotionState::Run => "Run",
        }
    }

    /// State implied by the held keys and the run toggle.
    pub fn select(keys: KeyState, run_toggle: bool) -> Self {
        match (keys.any_direction(), run_toggle) {
            (true, true) => LocomotionState::Run,
            (true, false) => LocomotionState::Walk,
            (false, _) => LocomotionState::Survey,
        }
    }

    pub fn is_moving(self) -> bool {
        self != LocomotionState::Survey
    }
}

impl fmt::Display for LocomotionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Opaque handle to a clip action registered with a mixer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClipId(pub u32);

/// Animation playback service for one character.
pub trait AnimationMixer {
    fn play(&mut self, clip: ClipId);
    /// Rewinds the clip to its start.
    fn reset(&mut self, clip: ClipId);
    fn fade_in(&mut self, clip: ClipId, duration: f32);
    fn fade_out(&mut self, clip: ClipId, duration: f32);
    /// Advances playback and any running fades.
    fn update(&mut self, delta: f32);
}

/// Maps a locomotion state to a clip.
pub trait ClipResolver: Send {
    fn resolve(&self, state: LocomotionState) -> Result<ClipId, ControllerError>;
}

/// Clips keyed directly by state name (`"Survey"`, `"Walk"`, `"Run"`).
#[derive(Debug, Clone, Default)]
pub struct DirectClips {
    clips: HashMap<String, ClipId>,
}

impl DirectClips {
    pub fn new(clips: HashMap<String, ClipId>) -> Self {
        Self { clips }
    }
}

impl ClipResolver for DirectClips {
    fn resolve(&self, state: LocomotionState) -> Result<ClipId, ControllerError> {
        self.clips
            .get(state.name())
            .copied()
            .ok_or_else(|| ControllerError::ClipNotFound {
                state,
                key: state.name().to_string(),
            })
    }
}

/// Clips looked up through a rig-specific state → clip-name table.
#[derive(Debug, Clone, Default)]
pub struct NamedClips {
    names: HashMap<LocomotionState, String>,
    clips: HashMap<String, ClipId>,
}

impl NamedClips {
    pub fn new(names: HashMap<LocomotionState, String>, clips: HashMap<String, ClipId>) -> Self {
        Self { names, clips }
    }
}

impl ClipResolver for NamedClips {
    fn resolve(&self, state: LocomotionState) -> Result<ClipId, ControllerError> {
        let name = self
            .names
            .get(&state)
            .ok_or_else(|| ControllerError::ClipNotFound {
                state,
                key: state.name().to_string(),
            })?;
        self.clips
            .get(name)
            .copied()
            .ok_or_else(|| ControllerError::ClipNotFound {
                state,
                key: name.clone(),
            })
    }
}

/// Outcome of one selection pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Unchanged,
    CrossFaded {
        from: LocomotionState,
        to: LocomotionState,
    },
    /// A previous clip lookup failed; animation updates are stopped.
    Halted,
}

/// Picks the active locomotion state and cross-fades clips on change.
pub struct AnimationStateMachine {
    current: LocomotionState,
    fade_duration: f32,
    resolver: Box<dyn ClipResolver>,
    halted: bool,
}

impl AnimationStateMachine {
    /// Resolves and plays the initial state's clip.
    pub fn start(
        initial: LocomotionState,
        fade_duration: f32,
        resolver: Box<dyn ClipResolver>,
        mixer: &mut dyn AnimationMixer,
    ) -> Result<Self, ControllerError> {
        let clip = resolver.resolve(initial)?;
        mixer.play(clip);
        Ok(Self {
            current: initial,
            fade_duration,
            resolver,
            halted: false,
        })
    }

    pub fn current(&self) -> LocomotionState {
        self.current
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Evaluates the transition rule and cross-fades if the state changes.
    ///
    /// Both clips are resolved before any clip operation, so a lookup miss
    /// leaves the current clip playing and the current state unchanged.
    pub fn select(
        &mut self,
        keys: KeyState,
        run_toggle: bool,
        mixer: &mut dyn AnimationMixer,
    ) -> Result<Transition, ControllerError> {
        if self.halted {
            return Ok(Transition::Halted);
        }

        let target = LocomotionState::select(keys, run_toggle);
        if target == self.current {
            return Ok(Transition::Unchanged);
        }

        let clips = self
            .resolver
            .resolve(target)
            .and_then(|to| Ok((self.resolver.resolve(self.current)?, to)));
        let (from_clip, to_clip) = match clips {
            Ok(pair) => pair,
            Err(e) => {
                error!(
                    from = %self.current,
                    to = %target,
                    error = %e,
                    "Clip lookup failed; halting animation"
                );
                self.halted = true;
                return Err(e);
            }
        };

        mixer.fade_out(from_clip, self.fade_duration);
        mixer.reset(to_clip);
        mixer.fade_in(to_clip, self.fade_duration);
        mixer.play(to_clip);

        let from = self.current;
        self.current = target;
        debug!(%from, to = %target, "Cross-fade");
        Ok(Transition::CrossFaded { from, to: target })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::input::Key;

    /// Mixer that records every call.
    #[derive(Debug, Default)]
    pub(crate) struct RecordingMixer {
        pub calls: Vec<String>,
    }

    impl AnimationMixer for RecordingMixer {
        fn play(&mut self, clip: ClipId) {
            self.calls.push(format!("play {}", clip.0));
        }
        fn reset(&mut self, clip: ClipId) {
            self.calls.push(format!("reset {}", clip.0));
        }
        fn fade_in(&mut self, clip: ClipId, duration: f32) {
            self.calls.push(format!("fade_in {} {duration}", clip.0));
        }
        fn fade_out(&mut self, clip: ClipId, duration: f32) {
            self.calls.push(format!("fade_out {} {duration}", clip.0));
        }
        fn update(&mut self, _delta: f32) {}
    }

    pub(crate) fn direct_table() -> DirectClips {
        DirectClips::new(HashMap::from([
            ("Survey".to_string(), ClipId(0)),
            ("Walk".to_string(), ClipId(1)),
            ("Run".to_string(), ClipId(2)),
        ]))
    }

    #[test]
    fn selection_rule() {
        let w = KeyState::from_keys(&[Key::W]);
        assert_eq!(LocomotionState::select(w, true), LocomotionState::Run);
        assert_eq!(LocomotionState::select(w, false), LocomotionState::Walk);
        assert_eq!(LocomotionState::select(KeyState::NONE, true), LocomotionState::Survey);
        let jump_only = KeyState::from_keys(&[Key::Space]);
        assert_eq!(LocomotionState::select(jump_only, true), LocomotionState::Survey);
    }

    #[test]
    fn start_plays_initial_clip() {
        let mut mixer = RecordingMixer::default();
        let sm = AnimationStateMachine::start(
            LocomotionState::Survey,
            0.2,
            Box::new(direct_table()),
            &mut mixer,
        )
        .unwrap();
        assert_eq!(sm.current(), LocomotionState::Survey);
        assert_eq!(mixer.calls, vec!["play 0"]);
    }

    #[test]
    fn transition_cross_fades_once() {
        let mut mixer = RecordingMixer::default();
        let mut sm = AnimationStateMachine::start(
            LocomotionState::Survey,
            0.2,
            Box::new(direct_table()),
            &mut mixer,
        )
        .unwrap();
        mixer.calls.clear();

        let w = KeyState::from_keys(&[Key::W]);
        let t = sm.select(w, false, &mut mixer).unwrap();
        assert_eq!(
            t,
            Transition::CrossFaded {
                from: LocomotionState::Survey,
                to: LocomotionState::Walk
            }
        );
        assert_eq!(
            mixer.calls,
            vec!["fade_out 0 0.2", "reset 1", "fade_in 1 0.2", "play 1"]
        );

        mixer.calls.clear();
        assert_eq!(sm.select(w, false, &mut mixer).unwrap(), Transition::Unchanged);
        assert!(mixer.calls.is_empty());
    }

    #[test]
    fn named_table_resolves_through_names() {
        let names = HashMap::from([
            (LocomotionState::Survey, "Armature|Idle".to_string()),
            (LocomotionState::Walk, "Armature|Walk".to_string()),
        ]);
        let clips = HashMap::from([("Armature|Idle".to_string(), ClipId(7))]);
        let table = NamedClips::new(names, clips);

        assert_eq!(table.resolve(LocomotionState::Survey).unwrap(), ClipId(7));
        assert_eq!(
            table.resolve(LocomotionState::Walk).unwrap_err(),
            ControllerError::ClipNotFound {
                state: LocomotionState::Walk,
                key: "Armature|Walk".to_string()
            }
        );
        assert_eq!(
            table.resolve(LocomotionState::Run).unwrap_err(),
            ControllerError::ClipNotFound {
                state: LocomotionState::Run,
                key: "Run".to_string()
            }
        );
    }

    #[test]
    fn missing_clip_halts_without_touching_current() {
        let mut table = direct_table();
        table.clips.remove("Walk");
        let mut mixer = RecordingMixer::default();
        let mut sm =
            AnimationStateMachine::start(LocomotionState::Survey, 0.2, Box::new(table), &mut mixer)
                .unwrap();
        mixer.calls.clear();

        let w = KeyState::from_keys(&[Key::W]);
        let err = sm.select(w, false, &mut mixer).unwrap_err();
        assert!(matches!(err, ControllerError::ClipNotFound { state: LocomotionState::Walk, .. }));
        assert!(mixer.calls.is_empty());
        assert_eq!(sm.current(), LocomotionState::Survey);
        assert!(sm.is_halted());

        // Even a state whose clip exists is no longer played.
        assert_eq!(sm.select(w, true, &mut mixer).unwrap(), Transition::Halted);
        assert!(mixer.calls.is_empty());
    }

    #[test]
    fn missing_initial_clip_fails_start() {
        let mut mixer = RecordingMixer::default();
        let result = AnimationStateMachine::start(
            LocomotionState::Survey,
            0.2,
            Box::new(DirectClips::default()),
            &mut mixer,
        );
        assert!(result.is_err());
        assert!(mixer.calls.is_empty());
    }
}
