//! Headless animation mixer.
//!
//! Tracks per-clip playback time, weight and linear weight fades without
//! sampling any skeleton. Used by the headless client and tests; a renderer
//! integration would implement [`AnimationMixer`] over its own clip actions.

use std::collections::HashMap;

use tracing::debug;

use crate::anim::{AnimationMixer, ClipId};

#[derive(Debug, Clone, Copy, PartialEq)]
struct Fade {
    from: f32,
    to: f32,
    elapsed: f32,
    duration: f32,
}

/// Playback state of one clip.
#[derive(Debug, Clone, PartialEq)]
pub struct ClipAction {
    pub name: String,
    pub time: f32,
    pub weight: f32,
    pub playing: bool,
    fade: Option<Fade>,
}

impl ClipAction {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            time: 0.0,
            weight: 1.0,
            playing: false,
            fade: None,
        }
    }

    pub fn is_fading(&self) -> bool {
        self.fade.is_some()
    }

    fn schedule_fade(&mut self, from: f32, to: f32, duration: f32) {
        if duration <= 0.0 {
            self.weight = to;
            self.fade = None;
            return;
        }
        self.weight = from;
        self.fade = Some(Fade {
            from,
            to,
            elapsed: 0.0,
            duration,
        });
    }

    fn advance(&mut self, delta: f32) {
        if !self.playing {
            return;
        }
        self.time += delta;

        if let Some(mut fade) = self.fade.take() {
            fade.elapsed += delta;
            let t = (fade.elapsed / fade.duration).min(1.0);
            self.weight = fade.from + (fade.to - fade.from) * t;
            if t < 1.0 {
                self.fade = Some(fade);
            } else if fade.to == 0.0 {
                self.playing = false;
            }
        }
    }
}

/// Clip registry plus blend state.
#[derive(Debug, Clone, Default)]
pub struct BlendMixer {
    actions: Vec<ClipAction>,
}

impl BlendMixer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers clips by name (as imported from the rig) and returns the
    /// name → handle table used to build a clip resolver.
    pub fn with_clips<'a>(
        names: impl IntoIterator<Item = &'a str>,
    ) -> (Self, HashMap<String, ClipId>) {
        let mut mixer = Self::new();
        let table = names
            .into_iter()
            .map(|name| (name.to_string(), mixer.add_clip(name)))
            .collect();
        (mixer, table)
    }

    pub fn add_clip(&mut self, name: &str) -> ClipId {
        self.actions.push(ClipAction::new(name));
        ClipId(self.actions.len() as u32 - 1)
    }

    pub fn action(&self, clip: ClipId) -> Option<&ClipAction> {
        self.actions.get(clip.0 as usize)
    }

    /// Clips currently contributing to the pose.
    pub fn playing(&self) -> impl Iterator<Item = &ClipAction> {
        self.actions.iter().filter(|a| a.playing)
    }

    fn action_mut(&mut self, clip: ClipId) -> Option<&mut ClipAction> {
        let found = self.actions.get_mut(clip.0 as usize);
        if found.is_none() {
            debug!(clip = clip.0, "Mixer call for unregistered clip");
        }
        found
    }
}

impl AnimationMixer for BlendMixer {
    fn play(&mut self, clip: ClipId) {
        if let Some(a) = self.action_mut(clip) {
            a.playing = true;
        }
    }

    fn reset(&mut self, clip: ClipId) {
        if let Some(a) = self.action_mut(clip) {
            a.time = 0.0;
            a.fade = None;
        }
    }

    fn fade_in(&mut self, clip: ClipId, duration: f32) {
        if let Some(a) = self.action_mut(clip) {
            a.schedule_fade(0.0, 1.0, duration);
        }
    }

    fn fade_out(&mut self, clip: ClipId, duration: f32) {
        if let Some(a) = self.action_mut(clip) {
            let from = a.weight;
            a.schedule_fade(from, 0.0, duration);
            if duration <= 0.0 {
                a.playing = false;
            }
        }
    }

    fn update(&mut self, delta: f32) {
        for a in &mut self.actions {
            a.advance(delta);
        }
    }
}
