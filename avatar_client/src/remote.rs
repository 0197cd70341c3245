//! Other players as seen by this client.
//!
//! Inbound poses are written straight onto the remote avatar: no buffering,
//! no interpolation, no ordering checks. A late or duplicated datagram simply
//! overwrites whatever arrived before it.

use std::collections::BTreeMap;

use tracing::{debug, info};

use avatar_shared::{
    math::{EulerXyz, Quat, Vec3},
    net::{PlayerId, PlayerInfo, PoseUpdate},
    render::{SceneNode, VisualModelHandle},
};

/// A remote player's visual stand-in.
#[derive(Debug, Clone, PartialEq)]
pub struct RemotePlayer {
    pub info: PlayerInfo,
    pub model: SceneNode,
    /// Number of pose updates applied.
    pub updates: u64,
}

impl RemotePlayer {
    pub fn rotation(&self) -> EulerXyz {
        self.model.rotation()
    }
}

/// Roster keyed by player id.
#[derive(Debug, Clone, Default)]
pub struct RemotePlayers {
    players: BTreeMap<PlayerId, RemotePlayer>,
}

impl RemotePlayers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) a player announced by the relay.
    pub fn join(&mut self, info: PlayerInfo) {
        let rig = if info.is_monster { "velociraptor" } else { "fox" };
        info!(player_id = ?info.id, rig, "Remote player joined");
        let model = SceneNode::new(rig, info.position);
        self.players.insert(
            info.id,
            RemotePlayer {
                info,
                model,
                updates: 0,
            },
        );
    }

    /// Drops a player whose control stream closed. Returns false if unknown.
    pub fn leave(&mut self, id: PlayerId) -> bool {
        let removed = self.players.remove(&id).is_some();
        if removed {
            info!(player_id = ?id, "Remote player left");
        }
        removed
    }

    /// Applies a pose as-is. Returns false for players not in the roster.
    pub fn apply(&mut self, update: &PoseUpdate) -> bool {
        let Some(player) = self.players.get_mut(&update.player_id) else {
            debug!(player_id = ?update.player_id, "Pose for unknown player dropped");
            return false;
        };
        player.model.set_position(update.position);
        player
            .model
            .set_orientation(Quat::from_euler_xyz(update.rotation));
        player.info.position = update.position;
        player.updates += 1;
        true
    }

    pub fn get(&self, id: PlayerId) -> Option<&RemotePlayer> {
        self.players.get(&id)
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RemotePlayer> {
        self.players.values()
    }

    /// Position of the monster, if one is in the roster.
    pub fn monster_position(&self) -> Option<Vec3> {
        self.iter()
            .find(|p| p.info.is_monster)
            .map(|p| p.model.position)
    }
}
