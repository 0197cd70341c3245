//! Networking primitives for the position relay.
//!
//! Goals:
//! - A reliable (TCP) control plane for the handshake and roster changes.
//! - An unreliable (UDP) plane for per-frame pose updates.
//! - Keep serialization explicit and versionable (JSON payloads).
//!
//! Pose updates are fire-and-forget: no sequencing, no timestamps, no
//! acknowledgement. Receivers apply whatever arrives, in arrival order.

use anyhow::Context;
use async_trait::async_trait;
use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    net::{
        tcp::{OwnedReadHalf, OwnedWriteHalf},
        TcpListener, TcpStream, UdpSocket,
    },
    time,
};

use crate::math::{EulerXyz, Vec3};

/// Protocol version for compatibility checks.
pub const PROTOCOL_VERSION: u32 = 1;

/// Largest accepted frame/datagram payload.
pub const MAX_PAYLOAD: usize = 64 * 1024;

/// Identifies a connected player. Assigned by the relay in join order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlayerId(pub u32);

/// Roster entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlayerInfo {
    pub id: PlayerId,
    pub is_monster: bool,
    /// Last position relayed for this player.
    pub position: Vec3,
}

/// One frame's resolved avatar pose.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PoseUpdate {
    pub player_id: PlayerId,
    pub position: Vec3,
    pub rotation: EulerXyz,
}

/// High-level message envelope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum NetMsg {
    // ─── Connection handshake ───
    Hello {
        protocol: u32,
    },
    /// Client announces its UDP port to the server.
    UdpHello {
        client_udp_port: u16,
    },
    /// Server accepts the player, assigns a role and sends the current roster.
    Welcome {
        player_id: PlayerId,
        is_monster: bool,
        players: Vec<PlayerInfo>,
    },

    // ─── Roster ───
    /// Server -> clients: someone else joined.
    PlayerJoined(PlayerInfo),
    /// Server -> clients: a player's control stream closed.
    PlayerLeft(PlayerId),

    // ─── Gameplay ───
    /// Client -> server -> other clients: pose after this client's tick.
    PlayerPositionUpdate(PoseUpdate),

    // ─── Disconnect ───
    Disconnect {
        reason: String,
    },
}

/// Encodes a message as a length-prefixed frame.
pub fn encode_frame(msg: &NetMsg) -> anyhow::Result<Bytes> {
    let payload = serde_json::to_vec(msg).context("serialize msg")?;
    anyhow::ensure!(payload.len() <= MAX_PAYLOAD, "frame too large: {}", payload.len());
    let mut buf = BytesMut::with_capacity(4 + payload.len());
    buf.put_u32(payload.len() as u32);
    buf.extend_from_slice(&payload);
    Ok(buf.freeze())
}

async fn write_frame<W>(w: &mut W, msg: &NetMsg) -> anyhow::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let frame = encode_frame(msg)?;
    w.write_all(&frame).await.context("tcp write")?;
    Ok(())
}

async fn read_frame<R>(r: &mut R) -> anyhow::Result<NetMsg>
where
    R: AsyncRead + Unpin,
{
    let len = r.read_u32().await.context("tcp read len")? as usize;
    anyhow::ensure!(len <= MAX_PAYLOAD, "frame too large: {len}");
    let mut payload = vec![0u8; len];
    r.read_exact(&mut payload)
        .await
        .context("tcp read payload")?;
    decode_from_bytes(&payload)
}

/// Reliable connection over TCP with length-prefixed frames.
#[derive(Debug)]
pub struct ReliableConn {
    stream: TcpStream,
}

impl ReliableConn {
    pub fn new(stream: TcpStream) -> Self {
        Self { stream }
    }

    pub async fn connect(addr: SocketAddr) -> anyhow::Result<Self> {
        let stream = TcpStream::connect(addr).await.context("tcp connect")?;
        Ok(Self::new(stream))
    }

    pub async fn send(&mut self, msg: &NetMsg) -> anyhow::Result<()> {
        write_frame(&mut self.stream, msg).await
    }

    pub async fn recv(&mut self) -> anyhow::Result<NetMsg> {
        read_frame(&mut self.stream).await
    }

    pub fn peer_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.stream.peer_addr()?)
    }

    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.stream.local_addr()?)
    }

    /// Splits into halves that can be owned by different tasks.
    pub fn into_split(self) -> (ReliableReader, ReliableWriter) {
        let (read, write) = self.stream.into_split();
        (ReliableReader { stream: read }, ReliableWriter { stream: write })
    }
}

/// Receiving half of a [`ReliableConn`].
#[derive(Debug)]
pub struct ReliableReader {
    stream: OwnedReadHalf,
}

impl ReliableReader {
    pub async fn recv(&mut self) -> anyhow::Result<NetMsg> {
        read_frame(&mut self.stream).await
    }
}

/// Sending half of a [`ReliableConn`].
#[derive(Debug)]
pub struct ReliableWriter {
    stream: OwnedWriteHalf,
}

impl ReliableWriter {
    pub async fn send(&mut self, msg: &NetMsg) -> anyhow::Result<()> {
        write_frame(&mut self.stream, msg).await
    }
}

/// Unreliable channel over UDP, connected to one peer.
#[derive(Debug)]
pub struct UnreliableConn {
    socket: UdpSocket,
    peer: SocketAddr,
}

impl UnreliableConn {
    pub async fn connect(bind_addr: SocketAddr, peer: SocketAddr) -> anyhow::Result<Self> {
        let socket = UdpSocket::bind(bind_addr).await.context("udp bind")?;
        socket.connect(peer).await.context("udp connect")?;
        Ok(Self { socket, peer })
    }

    pub async fn send(&self, msg: &NetMsg) -> anyhow::Result<()> {
        let payload = encode_to_bytes(msg)?;
        self.socket.send(&payload).await.context("udp send")?;
        Ok(())
    }

    /// Receives a datagram within the given timeout.
    pub async fn recv_timeout(
        &self,
        timeout: std::time::Duration,
    ) -> anyhow::Result<Option<NetMsg>> {
        let mut buf = vec![0u8; MAX_PAYLOAD];
        match time::timeout(timeout, self.socket.recv(&mut buf)).await {
            Ok(Ok(n)) => decode_from_bytes(&buf[..n]).map(Some),
            Ok(Err(e)) => Err(e).context("udp recv"),
            Err(_) => Ok(None),
        }
    }

    /// Drains every datagram already queued on the socket without waiting.
    pub fn try_recv_all(&self) -> anyhow::Result<Vec<NetMsg>> {
        let mut buf = vec![0u8; MAX_PAYLOAD];
        let mut out = Vec::new();
        loop {
            match self.socket.try_recv(&mut buf) {
                Ok(n) => match decode_from_bytes(&buf[..n]) {
                    Ok(msg) => out.push(msg),
                    Err(e) => tracing::debug!(error = %e, "Dropping malformed datagram"),
                },
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => break,
                Err(e) => return Err(e).context("udp recv"),
            }
        }
        Ok(out)
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }
}

/// Destination for the per-frame pose broadcast.
#[async_trait]
pub trait PoseSink: Send + Sync {
    async fn emit(&self, update: PoseUpdate) -> anyhow::Result<()>;
}

#[async_trait]
impl PoseSink for UnreliableConn {
    async fn emit(&self, update: PoseUpdate) -> anyhow::Result<()> {
        self.send(&NetMsg::PlayerPositionUpdate(update)).await
    }
}

/// TCP server listener.
pub struct ReliableListener {
    listener: TcpListener,
}

impl ReliableListener {
    pub async fn bind(addr: SocketAddr) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(addr).await.context("tcp bind")?;
        Ok(Self { listener })
    }

    pub async fn accept(&self) -> anyhow::Result<(ReliableConn, SocketAddr)> {
        let (stream, addr) = self.listener.accept().await.context("tcp accept")?;
        Ok((ReliableConn::new(stream), addr))
    }

    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }
}

/// Encodes a message as a bare JSON payload (datagram form).
pub fn encode_to_bytes(msg: &NetMsg) -> anyhow::Result<Bytes> {
    let payload = serde_json::to_vec(msg).context("serialize")?;
    Ok(Bytes::from(payload))
}

pub fn decode_from_bytes(b: &[u8]) -> anyhow::Result<NetMsg> {
    serde_json::from_slice(b).context("deserialize")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_carries_big_endian_length_prefix() {
        let msg = NetMsg::Hello {
            protocol: PROTOCOL_VERSION,
        };
        let frame = encode_frame(&msg).unwrap();
        let len = u32::from_be_bytes([frame[0], frame[1], frame[2], frame[3]]) as usize;
        assert_eq!(len, frame.len() - 4);
        assert_eq!(decode_from_bytes(&frame[4..]).unwrap(), msg);
    }

    #[test]
    fn pose_update_wire_shape_uses_xyz_objects() {
        let msg = NetMsg::PlayerPositionUpdate(PoseUpdate {
            player_id: PlayerId(2),
            position: Vec3::new(1.0, 0.5, -3.0),
            rotation: EulerXyz::new(0.0, 1.25, 0.0),
        });
        let json: serde_json::Value =
            serde_json::from_slice(&encode_to_bytes(&msg).unwrap()).unwrap();
        let update = &json["PlayerPositionUpdate"];
        assert_eq!(update["position"]["z"], -3.0);
        assert_eq!(update["rotation"]["y"], 1.25);
    }

    #[test]
    fn garbage_fails_to_decode() {
        assert!(decode_from_bytes(b"not json").is_err());
    }
}
