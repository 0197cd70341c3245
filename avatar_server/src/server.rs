//! Relay server.
//!
//! The relay holds no game state beyond a roster. It supports:
//! - Handshake over TCP with role assignment (first player is the monster)
//! - Roster announcements (`PlayerJoined`, `PlayerLeft`) over TCP
//! - Pose relay: every UDP pose datagram is forwarded to all other players
//! - Console commands (status, quit)
//!
//! Poses are not validated, ordered or reconciled. The last relayed position
//! per player is kept only so that later joiners see where everyone is.

use anyhow::Context;
use avatar_shared::{
    config::AppConfig,
    math::Vec3,
    net::{
        decode_from_bytes, encode_to_bytes, NetMsg, PlayerId, PlayerInfo, ReliableConn,
        ReliableListener, ReliableReader, ReliableWriter, MAX_PAYLOAD, PROTOCOL_VERSION,
    },
};
use std::{
    collections::BTreeMap,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    time::Duration,
};
use tokio::{net::UdpSocket, sync::mpsc, time::Instant};
use tracing::{debug, info, warn};

/// How long a new connection gets to finish `Hello` + `UdpHello`.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(2);

/// Connected player.
struct PlayerSlot {
    info: PlayerInfo,
    reliable: ReliableWriter,
    udp_peer: SocketAddr,
    /// Pose datagrams received from this player.
    poses_in: u64,
}

/// Server lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerState {
    Running,
    /// `quit` was issued; the owner should stop stepping.
    ShuttingDown,
}

/// Position relay.
pub struct RelayServer {
    pub cfg: AppConfig,
    players: BTreeMap<PlayerId, PlayerSlot>,

    tcp: ReliableListener,
    udp: UdpSocket,

    tick: u64,
    state: ServerState,
    next_player_id: u32,
    /// Set once the first player has been made the monster. Never cleared.
    monster_assigned: bool,
    relayed: u64,
    pub handshake_timeout: Duration,

    /// Control-stream readers report departed players here.
    left_tx: mpsc::Sender<PlayerId>,
    left_rx: mpsc::Receiver<PlayerId>,

    /// Channel for console commands from stdin.
    console_rx: Option<mpsc::Receiver<String>>,
}

impl RelayServer {
    /// Binds TCP and UDP on the configured address.
    pub async fn new(cfg: AppConfig) -> anyhow::Result<Self> {
        let addr: SocketAddr = cfg.server_addr.parse().context("parse server_addr")?;
        let tcp = ReliableListener::bind(addr).await?;
        // With port 0 the TCP listener picks the port; UDP must share it.
        let udp_bind = SocketAddr::new(addr.ip(), tcp.local_addr()?.port());
        let udp = UdpSocket::bind(udp_bind).await.context("udp bind")?;
        Ok(Self::from_sockets(cfg, tcp, udp))
    }

    fn from_sockets(cfg: AppConfig, tcp: ReliableListener, udp: UdpSocket) -> Self {
        let (left_tx, left_rx) = mpsc::channel(64);
        Self {
            cfg,
            players: BTreeMap::new(),
            tcp,
            udp,
            tick: 0,
            state: ServerState::Running,
            next_player_id: 1,
            monster_assigned: false,
            relayed: 0,
            handshake_timeout: HANDSHAKE_TIMEOUT,
            left_tx,
            left_rx,
            console_rx: None,
        }
    }

    /// Sets the console input receiver.
    pub fn set_console_input(&mut self, rx: mpsc::Receiver<String>) {
        self.console_rx = Some(rx);
    }

    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        self.tcp.local_addr()
    }

    pub fn state(&self) -> &ServerState {
        &self.state
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Current roster, in join order.
    pub fn roster(&self) -> Vec<PlayerInfo> {
        self.players.values().map(|p| p.info.clone()).collect()
    }

    /// Total pose datagrams forwarded (one per recipient).
    pub fn relayed(&self) -> u64 {
        self.relayed
    }

    /// Accepts exactly one player (handshake + roster).
    pub async fn accept_one(&mut self) -> anyhow::Result<PlayerId> {
        let (conn, peer) = self.tcp.accept().await?;
        self.handle_new_connection(conn, peer).await
    }

    /// Accepts a player if one connects within `timeout`.
    pub async fn try_accept(&mut self, timeout: Duration) -> anyhow::Result<Option<PlayerId>> {
        match tokio::time::timeout(timeout, self.tcp.accept()).await {
            Ok(Ok((conn, peer))) => self.handle_new_connection(conn, peer).await.map(Some),
            Ok(Err(e)) => Err(e),
            Err(_) => Ok(None),
        }
    }

    async fn handle_new_connection(
        &mut self,
        mut conn: ReliableConn,
        peer: SocketAddr,
    ) -> anyhow::Result<PlayerId> {
        match self.recv_handshake(&mut conn).await? {
            NetMsg::Hello { protocol } if protocol == PROTOCOL_VERSION => {}
            NetMsg::Hello { protocol } => {
                let reason =
                    format!("protocol mismatch: server {PROTOCOL_VERSION}, client {protocol}");
                let _ = conn
                    .send(&NetMsg::Disconnect {
                        reason: reason.clone(),
                    })
                    .await;
                warn!(%peer, protocol, "Rejected client");
                anyhow::bail!(reason);
            }
            other => anyhow::bail!("unexpected handshake msg: {other:?}"),
        }

        let client_udp_port = match self.recv_handshake(&mut conn).await? {
            NetMsg::UdpHello { client_udp_port } => client_udp_port,
            other => anyhow::bail!("expected UdpHello, got {other:?}"),
        };

        let id = PlayerId(self.next_player_id);
        self.next_player_id += 1;
        let is_monster = !self.monster_assigned;
        self.monster_assigned = true;

        let info = PlayerInfo {
            id,
            is_monster,
            position: Vec3::ZERO,
        };

        conn.send(&NetMsg::Welcome {
            player_id: id,
            is_monster,
            players: self.roster(),
        })
        .await?;

        self.broadcast(&NetMsg::PlayerJoined(info.clone())).await;

        let (reader, writer) = conn.into_split();
        tokio::spawn(watch_control_stream(id, reader, self.left_tx.clone()));

        let udp_peer = SocketAddr::new(peer.ip(), client_udp_port);
        self.players.insert(
            id,
            PlayerSlot {
                info,
                reliable: writer,
                udp_peer,
                poses_in: 0,
            },
        );

        info!(player_id = ?id, is_monster, %udp_peer, "Player joined");
        Ok(id)
    }

    async fn recv_handshake(&self, conn: &mut ReliableConn) -> anyhow::Result<NetMsg> {
        tokio::time::timeout(self.handshake_timeout, conn.recv())
            .await
            .context("handshake timed out")?
    }

    /// Sends a control message to every player. Players whose control stream
    /// is gone are dropped.
    async fn broadcast(&mut self, msg: &NetMsg) {
        let mut gone = Vec::new();
        for (id, slot) in self.players.iter_mut() {
            if let Err(e) = slot.reliable.send(msg).await {
                warn!(player_id = ?id, error = %e, "Dropping player");
                gone.push(*id);
            }
        }
        for id in gone {
            self.players.remove(&id);
        }
    }

    /// Removes players whose control stream closed and tells the rest.
    async fn prune_departed(&mut self) {
        while let Ok(id) = self.left_rx.try_recv() {
            if self.players.remove(&id).is_some() {
                info!(player_id = ?id, "Player left");
                self.broadcast(&NetMsg::PlayerLeft(id)).await;
            }
        }
    }

    /// Runs the server for a number of ticks.
    pub async fn run_for_ticks(&mut self, ticks: u32) -> anyhow::Result<()> {
        let dt = Duration::from_secs_f32(self.cfg.tick_secs());
        let mut next = Instant::now();

        for _ in 0..ticks {
            next += dt;
            self.step().await?;
            tokio::time::sleep_until(next).await;
        }
        Ok(())
    }

    /// Handles console input and relays every queued pose datagram.
    pub async fn step(&mut self) -> anyhow::Result<()> {
        self.process_console_commands()?;
        self.prune_departed().await;
        self.relay_poses().await?;
        self.tick += 1;
        Ok(())
    }

    fn process_console_commands(&mut self) -> anyhow::Result<()> {
        let lines: Vec<String> = if let Some(ref mut rx) = self.console_rx {
            let mut collected = Vec::new();
            while let Ok(line) = rx.try_recv() {
                collected.push(line);
            }
            collected
        } else {
            Vec::new()
        };

        for line in lines {
            for out in self.exec_console(&line)? {
                println!("{}", out);
            }
        }
        Ok(())
    }

    /// Executes a console command.
    pub fn exec_console(&mut self, line: &str) -> anyhow::Result<Vec<String>> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let Some(&first) = tokens.first() else {
            return Ok(Vec::new());
        };

        match first {
            "status" => {
                let mut out = Vec::new();
                out.push(format!("Server state: {:?}", self.state));
                out.push(format!("Tick: {}", self.tick));
                out.push(format!("Players: {}", self.players.len()));
                out.push(format!("Relayed: {}", self.relayed));
                for (id, slot) in &self.players {
                    out.push(format!(
                        "  {:?}: udp={} monster={} pos={:?} poses={}",
                        id, slot.udp_peer, slot.info.is_monster, slot.info.position, slot.poses_in
                    ));
                }
                Ok(out)
            }
            "quit" | "exit" => {
                info!("Server shutting down");
                self.state = ServerState::ShuttingDown;
                Ok(vec!["Shutting down".to_string()])
            }
            other => Ok(vec![format!("Unknown command: {other}")]),
        }
    }

    async fn relay_poses(&mut self) -> anyhow::Result<()> {
        let mut buf = vec![0u8; MAX_PAYLOAD];
        loop {
            match self.udp.try_recv_from(&mut buf) {
                Ok((n, from)) => match decode_from_bytes(&buf[..n]) {
                    Ok(msg) => self.handle_udp_message(from, msg).await,
                    Err(e) => debug!(%from, error = %e, "Dropping malformed datagram"),
                },
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => break,
                Err(e) => return Err(e).context("udp recv"),
            }
        }
        Ok(())
    }

    async fn handle_udp_message(&mut self, from: SocketAddr, msg: NetMsg) {
        let mut update = match msg {
            NetMsg::PlayerPositionUpdate(update) => update,
            other => {
                debug!(?other, "Unexpected UDP message");
                return;
            }
        };

        let Some((&sender, slot)) = self.players.iter_mut().find(|(_, s)| s.udp_peer == from)
        else {
            debug!(%from, "Pose from unknown peer dropped");
            return;
        };
        slot.info.position = update.position;
        slot.poses_in += 1;
        update.player_id = sender;

        let payload = match encode_to_bytes(&NetMsg::PlayerPositionUpdate(update)) {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, "Failed to encode pose");
                return;
            }
        };

        for (id, slot) in &self.players {
            if *id == sender {
                continue;
            }
            match self.udp.send_to(&payload, slot.udp_peer).await {
                Ok(_) => self.relayed += 1,
                Err(e) => debug!(player_id = ?id, error = %e, "Pose send failed"),
            }
        }
    }
}

/// Reads a player's control stream until it closes, then reports the player
/// as gone. Clients send nothing after the handshake except `Disconnect`.
async fn watch_control_stream(
    id: PlayerId,
    mut reader: ReliableReader,
    left: mpsc::Sender<PlayerId>,
) {
    loop {
        match reader.recv().await {
            Ok(NetMsg::Disconnect { reason }) => {
                debug!(player_id = ?id, %reason, "Player said goodbye");
                break;
            }
            Ok(other) => debug!(player_id = ?id, ?other, "Ignoring control message"),
            Err(e) => {
                debug!(player_id = ?id, error = %e, "Control stream closed");
                break;
            }
        }
    }
    let _ = left.send(id).await;
}

/// Helper for tests: bind to an ephemeral port.
pub async fn bind_ephemeral(tick_hz: u32) -> anyhow::Result<(RelayServer, AppConfig)> {
    let cfg = AppConfig {
        server_addr: format!("{}:{}", IpAddr::V4(Ipv4Addr::LOCALHOST), 0),
        tick_hz,
        ..Default::default()
    };

    // Bind TCP first to get an ephemeral port, then bind UDP to that same port.
    let tcp = ReliableListener::bind(cfg.server_addr.parse()?).await?;
    let addr = tcp.local_addr()?;
    let mut cfg = cfg;
    cfg.server_addr = addr.to_string();

    let udp_bind = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), addr.port());
    let udp = UdpSocket::bind(udp_bind).await?;

    Ok((RelayServer::from_sockets(cfg.clone(), tcp, udp), cfg))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn console_quit_stops_server() -> anyhow::Result<()> {
        let (mut server, _cfg) = bind_ephemeral(60).await?;
        assert_eq!(server.state(), &ServerState::Running);
        let out = server.exec_console("status")?;
        assert!(out.iter().any(|l| l == "Players: 0"));
        server.exec_console("quit")?;
        assert_eq!(server.state(), &ServerState::ShuttingDown);
        Ok(())
    }

    #[tokio::test]
    async fn unknown_command_is_reported() -> anyhow::Result<()> {
        let (mut server, _cfg) = bind_ephemeral(60).await?;
        let out = server.exec_console("map de_dust")?;
        assert_eq!(out, vec!["Unknown command: map".to_string()]);
        assert!(server.exec_console("   ")?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn silent_peer_times_out_during_handshake() -> anyhow::Result<()> {
        let (mut server, _cfg) = bind_ephemeral(60).await?;
        server.handshake_timeout = Duration::from_millis(200);

        // Connects but never says Hello.
        let _silent = tokio::net::TcpStream::connect(server.local_addr()?).await?;

        let outcome = tokio::time::timeout(
            Duration::from_secs(2),
            server.try_accept(Duration::from_millis(100)),
        )
        .await
        .context("accept stalled on a silent peer")?;
        let err = outcome.unwrap_err();
        assert!(err.to_string().contains("handshake timed out"), "got {err:#}");
        assert_eq!(server.player_count(), 0);

        // The loop carries on.
        assert_eq!(server.try_accept(Duration::from_millis(10)).await?, None);
        server.step().await?;
        Ok(())
    }
}
