//! Relay client.
//!
//! The client maintains:
//! - A reliable control stream (handshake + roster announcements), read by a
//!   background task so the frame loop never blocks on it
//! - An unreliable datagram socket for pose updates, both directions
//! - The roster of remote players

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use avatar_shared::{
    config::AppConfig,
    net::{NetMsg, PlayerId, PoseSink, PoseUpdate, ReliableConn, UnreliableConn, PROTOCOL_VERSION},
};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info, warn};

use crate::remote::RemotePlayers;

/// Client connection state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientState {
    /// Handshake done; relaying.
    Connected,
    /// Control stream closed or server said goodbye.
    Disconnected,
}

/// Connection to the position relay.
pub struct GameClient {
    pub player_id: PlayerId,
    /// Whether the relay made this player the monster.
    pub is_monster: bool,
    pub state: ClientState,
    pub remotes: RemotePlayers,

    pub unreliable: UnreliableConn,
    reliable_rx: mpsc::Receiver<NetMsg>,
    /// Owns the control stream; aborting it closes the TCP connection.
    reader: JoinHandle<()>,
    frames_sent: u64,
}

impl GameClient {
    /// Connects to the relay and performs the handshake.
    pub async fn connect(cfg: &AppConfig) -> anyhow::Result<Self> {
        let server_addr: SocketAddr = cfg.server_addr.parse().context("parse server_addr")?;

        info!(server = %server_addr, "Connecting to relay");

        let mut reliable = ReliableConn::connect(server_addr).await?;

        // The relay knows us by the control stream's source IP plus the port
        // announced below, so datagrams must leave from that same interface.
        let local_ip = reliable.local_addr().context("tcp local_addr")?.ip();
        let unreliable =
            UnreliableConn::connect(SocketAddr::new(local_ip, 0), server_addr).await?;
        let client_udp_port = unreliable.local_addr().context("udp local_addr")?.port();

        reliable
            .send(&NetMsg::Hello {
                protocol: PROTOCOL_VERSION,
            })
            .await?;
        reliable.send(&NetMsg::UdpHello { client_udp_port }).await?;

        let (player_id, is_monster, players) = match reliable.recv().await? {
            NetMsg::Welcome {
                player_id,
                is_monster,
                players,
            } => (player_id, is_monster, players),
            NetMsg::Disconnect { reason } => anyhow::bail!("relay refused connection: {reason}"),
            other => anyhow::bail!("expected Welcome, got {other:?}"),
        };

        info!(player_id = ?player_id, is_monster, roster = players.len(), "Joined relay");

        let mut remotes = RemotePlayers::new();
        for p in players {
            remotes.join(p);
        }

        let (tx, reliable_rx) = mpsc::channel(32);
        let reader = tokio::spawn(async move {
            loop {
                match reliable.recv().await {
                    Ok(msg) => {
                        if tx.send(msg).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        debug!(error = %e, "Reliable stream closed");
                        break;
                    }
                }
            }
        });

        Ok(Self {
            player_id,
            is_monster,
            state: ClientState::Connected,
            remotes,
            unreliable,
            reliable_rx,
            reader,
            frames_sent: 0,
        })
    }

    /// Handles every control message that has arrived since the last call.
    pub fn poll_reliable(&mut self) {
        loop {
            match self.reliable_rx.try_recv() {
                Ok(msg) => self.handle_reliable_message(msg),
                Err(mpsc::error::TryRecvError::Empty) => break,
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    if self.state != ClientState::Disconnected {
                        warn!("Relay control stream lost");
                        self.state = ClientState::Disconnected;
                    }
                    break;
                }
            }
        }
    }

    /// Waits up to `timeout` for one control message.
    pub async fn wait_reliable(&mut self, timeout: Duration) -> bool {
        match tokio::time::timeout(timeout, self.reliable_rx.recv()).await {
            Ok(Some(msg)) => {
                self.handle_reliable_message(msg);
                true
            }
            Ok(None) => {
                self.state = ClientState::Disconnected;
                false
            }
            Err(_) => false,
        }
    }

    fn handle_reliable_message(&mut self, msg: NetMsg) {
        match msg {
            NetMsg::PlayerJoined(info) => self.remotes.join(info),
            NetMsg::PlayerLeft(id) => {
                self.remotes.leave(id);
            }
            NetMsg::Disconnect { reason } => {
                info!(reason = %reason, "Disconnected by relay");
                self.state = ClientState::Disconnected;
            }
            other => debug!(?other, "Unhandled reliable message"),
        }
    }

    /// Applies every pose datagram already queued. Returns how many applied.
    pub fn recv_updates(&mut self) -> anyhow::Result<usize> {
        let mut applied = 0;
        for msg in self.unreliable.try_recv_all()? {
            applied += self.handle_datagram(msg) as usize;
        }
        Ok(applied)
    }

    /// Waits up to `timeout` for one datagram and applies it.
    pub async fn recv_update_timeout(&mut self, timeout: Duration) -> anyhow::Result<bool> {
        match self.unreliable.recv_timeout(timeout).await? {
            Some(msg) => Ok(self.handle_datagram(msg)),
            None => Ok(false),
        }
    }

    fn handle_datagram(&mut self, msg: NetMsg) -> bool {
        match msg {
            NetMsg::PlayerPositionUpdate(update) => self.remotes.apply(&update),
            other => {
                debug!(?other, "Unexpected UDP message");
                false
            }
        }
    }

    /// Broadcasts this frame's pose. Fire-and-forget.
    pub async fn emit(&mut self, pose: PoseUpdate) -> anyhow::Result<()> {
        let pose = PoseUpdate {
            player_id: self.player_id,
            ..pose
        };
        self.unreliable.emit(pose).await?;
        self.frames_sent += 1;
        Ok(())
    }

    pub fn frames_sent(&self) -> u64 {
        self.frames_sent
    }
}

impl Drop for GameClient {
    fn drop(&mut self) {
        self.reader.abort();
    }
}
